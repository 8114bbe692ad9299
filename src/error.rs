//! Runtime error surface (§7): a closed taxonomy of typed failures, each
//! carrying a human-readable description.
//!
//! Grounded on `melbi-core`'s `evaluator/error.rs` (`EvalError`): a plain
//! enum with a hand-written `Display` and a direct `std::error::Error`
//! impl, no `thiserror`/`anyhow` in the runtime path.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    /// Operand kinds incompatible with the requested operation.
    TypeError,
    /// Integer index outside `[-len, len)`.
    OutOfRange,
    /// `frame_count` would exceed `max_call_frames`.
    StackOverflow,
    /// The per-run arena is exhausted.
    OutOfMemory,
}

impl fmt::Display for RuntimeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuntimeErrorKind::TypeError => "TypeError",
            RuntimeErrorKind::OutOfRange => "OutOfRange",
            RuntimeErrorKind::StackOverflow => "StackOverflow",
            RuntimeErrorKind::OutOfMemory => "OutOfMemory",
        };
        f.write_str(name)
    }
}

/// A terminating runtime failure (§7). Propagates by ending `run`
/// immediately -- the language has no try/catch construct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub description: String,
}

impl RuntimeError {
    pub fn new(kind: RuntimeErrorKind, description: impl Into<String>) -> Self {
        RuntimeError {
            kind,
            description: description.into(),
        }
    }

    pub fn type_error(description: impl Into<String>) -> Self {
        RuntimeError::new(RuntimeErrorKind::TypeError, description)
    }

    pub fn out_of_range(description: impl Into<String>) -> Self {
        RuntimeError::new(RuntimeErrorKind::OutOfRange, description)
    }

    pub fn stack_overflow(description: impl Into<String>) -> Self {
        RuntimeError::new(RuntimeErrorKind::StackOverflow, description)
    }

    pub fn out_of_memory(description: impl Into<String>) -> Self {
        RuntimeError::new(RuntimeErrorKind::OutOfMemory, description)
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.description)
    }
}

impl std::error::Error for RuntimeError {}

/// An opaque boundary marker for the external compiler's error type
/// (§1, §6 `compile()`). This crate does not implement a compiler; a host
/// embedding this crate alongside its own front end can report its
/// diagnostics through this trait object without this crate inventing a
/// shape for them.
///
/// Grounded on `melbi-core`'s split between its internal `EvalError` and
/// the public `api::error::Error` facade that additionally wraps
/// compilation diagnostics.
pub type CompileError = Box<dyn std::error::Error + Send + Sync + 'static>;
