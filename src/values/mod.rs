//! The value model (spec §3, §4.1): a tagged union of immediate scalars
//! and a reference-counted heap-object handle.

pub mod heap;
pub mod key;
mod value;

pub use heap::{List, Map, Payload, Ref, resolve_index};
pub use key::{Key, KeyHasher, WyHasher};
pub use value::{Incompatible, Value, key_value};
