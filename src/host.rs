//! Host hook interfaces (§4.4): the two extension points the core VM
//! defers to its embedder. Neither is part of the 21-opcode table itself --
//! `CALL_HOST` is reserved but not decoded by this crate's VM -- so these
//! are pure trait boundaries plus a no-op double for this crate's own
//! tests, per SPEC_FULL.md §6.5.

use crate::error::RuntimeError;
use crate::values::Value;

/// The callout behind the compiler's reserved `CALL_HOST` extension:
/// `call(function_id, argv)` returning a value or a runtime error.
pub trait HostFunctions<'code, 'arena> {
    fn call(
        &mut self,
        function_id: u32,
        argv: &[Value<'code, 'arena>],
    ) -> Result<Value<'code, 'arena>, RuntimeError>;
}

/// The callout behind `@include`: given the including template's key and
/// the partial's key, returns the partial's source text and its own key
/// (for further nested includes), or `None` if it cannot be resolved.
pub trait PartialResolver {
    fn resolve_partial(&mut self, template_key: &str, include_key: &str) -> Option<(Vec<u8>, String)>;
}

/// A host that resolves no partials and exposes no host functions.
/// Used by this crate's own VM tests, which never touch §4.4.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHost;

impl<'code, 'arena> HostFunctions<'code, 'arena> for NoHost {
    fn call(
        &mut self,
        function_id: u32,
        _argv: &[Value<'code, 'arena>],
    ) -> Result<Value<'code, 'arena>, RuntimeError> {
        Err(RuntimeError::type_error(format!(
            "no host function registered for id {function_id}"
        )))
    }
}

impl PartialResolver for NoHost {
    fn resolve_partial(&mut self, _template_key: &str, _include_key: &str) -> Option<(Vec<u8>, String)> {
        None
    }
}
