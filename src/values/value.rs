//! The tagged runtime value (§3 Value, §4.1 Value Operations).
//!
//! Melbi's `values/value.rs` pairs a `RawValue` union with a side-channel
//! static `Type` so call sites know which union arm is live. This language
//! has no static types -- every opcode must be able to ask "what is this at
//! runtime" -- so `Value` carries its own tag as a normal Rust `enum`
//! instead of an untagged union.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::io;

use bumpalo::Bump;

use super::heap::{Buffer, List, Map, Payload, Ref};
use super::key::Key;

pub enum Value<'code, 'arena> {
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
    Str(&'code [u8]),
    Ref(Ref<'code, 'arena>),
}

/// Two values of incompatible kinds were compared for equality (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Incompatible;

impl<'code, 'arena> Clone for Value<'code, 'arena> {
    fn clone(&self) -> Self {
        match self {
            Value::Int(v) => Value::Int(*v),
            Value::Float(v) => Value::Float(*v),
            Value::Bool(v) => Value::Bool(*v),
            Value::Null => Value::Null,
            Value::Str(s) => Value::Str(s),
            Value::Ref(r) => Value::Ref(r.clone()),
        }
    }
}

impl<'code, 'arena> Value<'code, 'arena> {
    pub fn buffer(arena: &'arena Bump, bytes: impl Into<Buffer>) -> Self {
        Value::Ref(Ref::new_in(arena, Payload::Buffer(RefCell::new(bytes.into()))))
    }

    pub fn list(arena: &'arena Bump, elements: List<'code, 'arena>) -> Self {
        Value::Ref(Ref::new_in(arena, Payload::List(RefCell::new(elements))))
    }

    pub fn map(arena: &'arena Bump, entries: Map<'code, 'arena>) -> Self {
        Value::Ref(Ref::new_in(arena, Payload::Map(RefCell::new(entries))))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Null => "null",
            Value::Str(_) => "string",
            Value::Ref(r) => match r.payload() {
                Payload::Buffer(_) => "string",
                Payload::List(_) => "list",
                Payload::Map(_) => "map",
                Payload::MapEntry { .. } => "map entry",
                Payload::ListIterator { .. } => "iterator",
                Payload::MapIterator { .. } => "iterator",
            },
        }
    }

    /// Borrow this value as raw bytes if it is a `Str` or a `Ref(Buffer)`,
    /// normalizing the two per the equality/ordering rules in §4.1 rule 1.
    fn as_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Option<R> {
        match self {
            Value::Str(bytes) => Some(f(bytes)),
            Value::Ref(r) => match r.payload() {
                Payload::Buffer(buf) => Some(f(&buf.borrow())),
                _ => None,
            },
            _ => None,
        }
    }

    fn is_bytes_like(&self) -> bool {
        matches!(self, Value::Str(_))
            || matches!(self, Value::Ref(r) if matches!(r.payload(), Payload::Buffer(_)))
    }

    fn is_iterator_value(&self) -> bool {
        matches!(self, Value::Ref(r) if r.is_iterator())
    }

    pub fn is_true(&self) -> bool {
        matches!(self, Value::Bool(true))
    }

    /// Equality per §4.1: numeric cross-promotion, `Buffer`/`Str`
    /// interchangeability, structural list/map/entry comparison, and
    /// `Incompatible` for any other pairing. Iterators are never equal to
    /// anything, including themselves.
    pub fn equal(&self, other: &Self) -> Result<bool, Incompatible> {
        if self.is_bytes_like() && other.is_bytes_like() {
            let eq = self
                .as_bytes(|a| other.as_bytes(|b| a == b))
                .flatten()
                .expect("both sides checked bytes-like");
            return Ok(eq);
        }

        if self.is_iterator_value() || other.is_iterator_value() {
            return Ok(false);
        }

        match (self, other) {
            (Value::Null, Value::Null) => Ok(true),
            (Value::Null, _) | (_, Value::Null) => Ok(false),
            (Value::Int(a), Value::Int(b)) => Ok(a == b),
            (Value::Float(a), Value::Float(b)) => Ok(a == b),
            (Value::Bool(a), Value::Bool(b)) => Ok(a == b),
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                Ok(*a as f64 == *b)
            }
            (Value::Ref(a), Value::Ref(b)) => {
                match (a.payload(), b.payload()) {
                    (Payload::List(xs), Payload::List(ys)) => {
                        let xs = xs.borrow();
                        let ys = ys.borrow();
                        if xs.len() != ys.len() {
                            return Ok(false);
                        }
                        for (x, y) in xs.iter().zip(ys.iter()) {
                            if !x.equal(y).unwrap_or(false) {
                                return Ok(false);
                            }
                        }
                        Ok(true)
                    }
                    (Payload::Map(xs), Payload::Map(ys)) => {
                        let xs = xs.borrow();
                        let ys = ys.borrow();
                        if xs.len() != ys.len() {
                            return Ok(false);
                        }
                        for (k, v) in xs.iter() {
                            match ys.get(k) {
                                Some(other_v) if v.equal(other_v).unwrap_or(false) => continue,
                                _ => return Ok(false),
                            }
                        }
                        Ok(true)
                    }
                    (
                        Payload::MapEntry { map: m1, index: i1 },
                        Payload::MapEntry { map: m2, index: i2 },
                    ) => {
                        let (k1, v1) = map_entry_at(m1, *i1);
                        let (k2, v2) = map_entry_at(m2, *i2);
                        let keys_equal = match (k1, k2) {
                            (Some(k1), Some(k2)) => {
                                key_value(&k1).equal(&key_value(&k2)).unwrap_or(false)
                            }
                            _ => false,
                        };
                        Ok(keys_equal && matches!((v1, v2), (Some(v1), Some(v2)) if v1.equal(&v2).unwrap_or(false)))
                    }
                    _ => Err(Incompatible),
                }
            }
            _ => Err(Incompatible),
        }
    }

    /// Total order per §4.1: numeric promotion across tags, otherwise a
    /// fixed tag ordinal, with the documented per-tag comparison inside.
    pub fn order(&self, other: &Self) -> Ordering {
        if self.is_bytes_like() && other.is_bytes_like() {
            return self
                .as_bytes(|a| other.as_bytes(|b| a.cmp(b)))
                .flatten()
                .expect("both sides checked bytes-like");
        }

        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).total_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.total_cmp(&(*b as f64)),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Ref(a), Value::Ref(b)) => order_refs(a, b),
            _ => self.tag_ordinal().cmp(&other.tag_ordinal()),
        }
    }

    fn tag_ordinal(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) | Value::Float(_) => 2,
            Value::Str(_) => 3,
            Value::Ref(r) => 4 + r.kind_ordinal(),
        }
    }

    /// Format this value per §4.1: scalars human-readable, strings/buffers
    /// raw or HTML-escaped, lists/maps bracketed and recursively escaped,
    /// iterators as an opaque placeholder.
    pub fn write<W: io::Write>(&self, w: &mut W, escape: bool) -> io::Result<()> {
        match self {
            Value::Int(v) => write!(w, "{v}"),
            Value::Float(v) => write!(w, "{}", format_float(*v)),
            Value::Bool(v) => write!(w, "{v}"),
            Value::Null => Ok(()),
            Value::Str(bytes) => write_bytes(w, bytes, escape),
            Value::Ref(r) => match r.payload() {
                Payload::Buffer(buf) => write_bytes(w, &buf.borrow(), escape),
                Payload::List(items) => {
                    write!(w, "[")?;
                    for (i, item) in items.borrow().iter().enumerate() {
                        if i > 0 {
                            write!(w, ", ")?;
                        }
                        item.write(w, escape)?;
                    }
                    write!(w, "]")
                }
                Payload::Map(entries) => {
                    write!(w, "{{")?;
                    for (i, (k, v)) in entries.borrow().iter().enumerate() {
                        if i > 0 {
                            write!(w, ", ")?;
                        }
                        key_value(k).write(w, escape)?;
                        write!(w, ": ")?;
                        v.write(w, escape)?;
                    }
                    write!(w, "}}")
                }
                Payload::MapEntry { .. } => write!(w, "{{...}}"),
                Payload::ListIterator { .. } => write!(w, "[...]"),
                Payload::MapIterator { .. } => write!(w, "{{...}}"),
            },
        }
    }
}

fn order_refs<'code, 'arena>(a: &Ref<'code, 'arena>, b: &Ref<'code, 'arena>) -> Ordering {
    match (a.payload(), b.payload()) {
        (Payload::List(xs), Payload::List(ys)) => {
            let xs = xs.borrow();
            let ys = ys.borrow();
            xs.len().cmp(&ys.len()).then_with(|| {
                for (x, y) in xs.iter().zip(ys.iter()) {
                    let ord = x.order(y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            })
        }
        (Payload::Map(xs), Payload::Map(ys)) => xs.borrow().len().cmp(&ys.borrow().len()),
        (Payload::MapEntry { map: m1, index: i1 }, Payload::MapEntry { map: m2, index: i2 }) => {
            let (k1, v1) = map_entry_at(m1, *i1);
            let (k2, v2) = map_entry_at(m2, *i2);
            match (k1, k2) {
                (Some(k1), Some(k2)) => key_value(&k1).order(&key_value(&k2)).then_with(|| {
                    match (v1, v2) {
                        (Some(v1), Some(v2)) => v1.order(&v2),
                        _ => Ordering::Equal,
                    }
                }),
                _ => Ordering::Equal,
            }
        }
        _ => {
            if a.is_iterator() && b.is_iterator() {
                Ordering::Equal
            } else {
                a.kind_ordinal().cmp(&b.kind_ordinal())
            }
        }
    }
}

fn map_entry_at<'code, 'arena>(
    map: &Ref<'code, 'arena>,
    index: usize,
) -> (Option<Key<'code>>, Option<Value<'code, 'arena>>) {
    match map.payload() {
        Payload::Map(entries) => {
            let entries = entries.borrow();
            match entries.get_index(index) {
                Some((k, v)) => (Some(*k), Some(v.clone())),
                None => (None, None),
            }
        }
        _ => (None, None),
    }
}

pub fn key_value<'code, 'arena>(key: &Key<'code>) -> Value<'code, 'arena> {
    match key {
        Key::Int(v) => Value::Int(*v),
        Key::Str(bytes) => Value::Str(bytes),
    }
}

/// Format a float with the host's shortest round-trip representation.
/// Rust's `{}` formatting of `f64` is already shortest-round-trip.
fn format_float(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v.is_infinite() {
        if v.is_sign_positive() {
            "inf".to_string()
        } else {
            "-inf".to_string()
        }
    } else {
        format!("{v}")
    }
}

fn write_bytes<W: io::Write>(w: &mut W, bytes: &[u8], escape: bool) -> io::Result<()> {
    if !escape {
        return w.write_all(bytes);
    }
    for &b in bytes {
        match b {
            b'&' => w.write_all(b"&amp;")?,
            b'<' => w.write_all(b"&lt;")?,
            b'>' => w.write_all(b"&gt;")?,
            b'"' => w.write_all(b"&#34;")?,
            b'\'' => w.write_all(b"&#39;")?,
            _ => w.write_all(&[b])?,
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "value_test.rs"]
mod value_test;
