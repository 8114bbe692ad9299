//! Heap objects: reference-counted cells allocated in the VM's per-run
//! arena, holding the six payload variants from the data model (§3):
//! `Buffer`, `Map`, `List`, `MapEntry`, `ListIterator`, `MapIterator`.
//!
//! Grounded on `melbi-core`'s `values/raw.rs`, which arena-allocates
//! `ArrayData`/`RecordData`/`MapData` behind thin pointer handles. Melbi's
//! containers are immutable (an "insert" there allocates a whole new map),
//! which fits a statically-typed, side-effect-free expression language. This
//! runtime needs in-place mutation (`Buffer` grows, `Map` updates a key in
//! place without moving it, §3 Invariants) plus iterators that must keep
//! their container alive, so each heap object additionally carries a strong
//! reference count next to its payload instead of relying purely on arena
//! lifetime.

use std::cell::{Cell, RefCell};
use std::fmt;

use bumpalo::Bump;
use indexmap::IndexMap;
use smallvec::SmallVec;

use super::key::{Key, KeyHasher};
use super::value::Value;

pub type Map<'code, 'arena> = IndexMap<Key<'code>, Value<'code, 'arena>, KeyHasher>;
pub type List<'code, 'arena> = Vec<Value<'code, 'arena>>;

/// A growable byte buffer, inline up to 16 bytes before spilling to the
/// arena's backing allocator -- short strings (a handful of interpolated
/// characters) are the common case for template output fragments. Mirrors
/// melbi's `types::encoding::BufferType` (`SmallVec<[u8; 16]>`).
pub type Buffer = SmallVec<[u8; 16]>;

pub enum Payload<'code, 'arena> {
    Buffer(RefCell<Buffer>),
    Map(RefCell<Map<'code, 'arena>>),
    List(RefCell<List<'code, 'arena>>),
    /// A live view of one entry of a map, produced only by map iteration.
    /// Indexing is by position, not by a raw pointer, so out-of-range
    /// access after the map shrinks is detected rather than dangling.
    MapEntry {
        map: Ref<'code, 'arena>,
        index: usize,
    },
    ListIterator {
        list: Ref<'code, 'arena>,
        index: Cell<usize>,
    },
    MapIterator {
        map: Ref<'code, 'arena>,
        cursor: Cell<usize>,
    },
}

pub struct HeapObject<'code, 'arena> {
    refcount: Cell<u32>,
    pub payload: Payload<'code, 'arena>,
}

/// A strong reference to an arena-allocated [`HeapObject`].
///
/// Cloning increments the refcount; dropping decrements it. The arena
/// itself never frees the object early -- the count exists purely to
/// satisfy the data model's refcount invariant (§3) and to give
/// iterators a well-defined notion of "the container is still alive",
/// not to drive deallocation.
pub struct Ref<'code, 'arena>(&'arena HeapObject<'code, 'arena>);

impl<'code, 'arena> Ref<'code, 'arena> {
    pub fn new_in(arena: &'arena Bump, payload: Payload<'code, 'arena>) -> Self {
        let object = arena.alloc(HeapObject {
            refcount: Cell::new(1),
            payload,
        });
        Ref(object)
    }

    pub fn payload(&self) -> &Payload<'code, 'arena> {
        &self.0.payload
    }

    pub fn strong_count(&self) -> u32 {
        self.0.refcount.get()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        core::ptr::eq(self.0, other.0)
    }

    /// A stable ordinal used only to order distinct ref kinds against each
    /// other when their tags differ (§4.1 Ordering). Iterators sort before
    /// any other ref kind.
    pub fn kind_ordinal(&self) -> u8 {
        match &self.0.payload {
            Payload::ListIterator { .. } | Payload::MapIterator { .. } => 0,
            Payload::Buffer(_) => 1,
            Payload::List(_) => 2,
            Payload::Map(_) => 3,
            Payload::MapEntry { .. } => 4,
        }
    }

    pub fn is_iterator(&self) -> bool {
        matches!(
            &self.0.payload,
            Payload::ListIterator { .. } | Payload::MapIterator { .. }
        )
    }
}

impl<'code, 'arena> Clone for Ref<'code, 'arena> {
    fn clone(&self) -> Self {
        let next = self
            .0
            .refcount
            .get()
            .checked_add(1)
            .expect("heap object refcount overflow");
        self.0.refcount.set(next);
        Ref(self.0)
    }
}

impl<'code, 'arena> Drop for Ref<'code, 'arena> {
    fn drop(&mut self) {
        let current = self.0.refcount.get();
        debug_assert!(current >= 1, "refcount underflow on heap object drop");
        self.0.refcount.set(current.saturating_sub(1));
    }
}

impl<'code, 'arena> fmt::Debug for Ref<'code, 'arena> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.payload {
            Payload::Buffer(b) => write!(f, "Buffer({} bytes)", b.borrow().len()),
            Payload::Map(m) => write!(f, "Map({} entries)", m.borrow().len()),
            Payload::List(l) => write!(f, "List({} elements)", l.borrow().len()),
            Payload::MapEntry { index, .. } => write!(f, "MapEntry(#{index})"),
            Payload::ListIterator { index, .. } => write!(f, "ListIterator(@{})", index.get()),
            Payload::MapIterator { cursor, .. } => write!(f, "MapIterator(@{})", cursor.get()),
        }
    }
}

/// Resolve a possibly-negative sequence index against a length, per the
/// negative-index rule in §4.3 (`-1` is the last element).
pub fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let resolved = if index < 0 { index + len } else { index };
    if resolved < 0 || resolved >= len {
        None
    } else {
        Some(resolved as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_index_handles_negative_and_out_of_range() {
        assert_eq!(resolve_index(0, 3), Some(0));
        assert_eq!(resolve_index(-1, 3), Some(2));
        assert_eq!(resolve_index(-3, 3), Some(0));
        assert_eq!(resolve_index(-4, 3), None);
        assert_eq!(resolve_index(3, 3), None);
    }

    #[test]
    fn ref_clone_and_drop_track_strong_count() {
        let arena = Bump::new();
        let r = Ref::new_in(&arena, Payload::Buffer(RefCell::new(Buffer::from_slice(&[1, 2, 3]))));
        assert_eq!(r.strong_count(), 1);
        let r2 = r.clone();
        assert_eq!(r.strong_count(), 2);
        drop(r2);
        assert_eq!(r.strong_count(), 1);
    }
}
