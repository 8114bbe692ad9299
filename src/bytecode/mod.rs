//! The bytecode artifact (§4.2, §6): an in-memory byte image with an
//! 8-byte header, a code section, and a data section holding
//! length-prefixed string literals and function descriptors.
//!
//! Grounded on `melbi-core`'s `vm/code.rs` (`Code`, bundling instructions,
//! constants and frame sizing into one compiled unit) for the *shape* of a
//! compiled artifact. Melbi's `Code` is an already-decoded in-process
//! struct handed straight from its own compiler to its own VM; this crate's
//! `Bytecode` instead models the serialized byte buffer itself, since §1
//! treats the compiler producing it as an external collaborator -- a host
//! may hand this VM bytes produced by any compiler that honors §4.2's
//! layout, not only one built in this crate.

mod builder;
mod image;

pub use builder::Builder;
pub use image::{Bytecode, BytecodeError, FunctionDescriptor, HEADER_LEN};
