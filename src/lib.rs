//! Runtime core for a small embeddable, ERB-style template language:
//! a tagged value model, a compact self-describing bytecode artifact, and
//! the stack-based virtual machine that executes it.
//!
//! The template-text scanner, expression parser/codegen, `@include`
//! resolution, and host `call()` extension mechanism are external
//! collaborators referenced here only through the [`bytecode::Bytecode`]
//! artifact and the [`host`] traits.

pub mod bytecode;
pub mod config;
pub mod error;
pub mod host;
pub mod values;
pub mod vm;

pub use bytecode::{Builder, Bytecode, BytecodeError, FunctionDescriptor};
pub use config::{Config, DebugLevel};
pub use error::{CompileError, RuntimeError, RuntimeErrorKind};
pub use host::{HostFunctions, NoHost, PartialResolver};
pub use values::{Incompatible, Key, Value};
pub use vm::Vm;

/// Test utilities for this crate's own unit tests. `#[cfg(test)]` items are
/// invisible to the `tests/` integration crate, so this is colocated-test-only.
#[cfg(test)]
pub mod test_utils {
    /// Initializes a `tracing` subscriber at `debug` level for tests that
    /// want to see the VM's frame-push/pop and arena-growth spans.
    pub fn init_test_logging() {
        use tracing_subscriber::{EnvFilter, fmt};

        let _ = fmt()
            .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
            .with_test_writer()
            .try_init();
    }
}
