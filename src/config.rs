//! VM configuration (§6 External Interfaces): the compile-time constants a
//! compiler and this VM must agree on.
//!
//! Grounded on `melbi-core`'s `api/options.rs`: a plain `Default`-derived
//! struct rather than a builder macro or feature-flagged const generics.

use crate::vm::instruction::LocalIndexWidth;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugLevel {
    None,
    Minimal,
    Full,
}

impl Default for DebugLevel {
    fn default() -> Self {
        DebugLevel::None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Cap on locals per frame; selects the local-index operand width.
    pub max_locals: u32,
    /// Fixed size of the call-frame array.
    pub max_call_frames: usize,
    /// Compile-side hint only; unused by the VM itself.
    pub initial_code_size: usize,
    /// Compile-side hint only; unused by the VM itself.
    pub initial_data_size: usize,
    /// Compile-side setting only; unused by the VM itself.
    pub deduplicate_string_literals: bool,
    /// Compile-side setting only; unused by the VM itself.
    pub escape_by_default: bool,
    pub debug: DebugLevel,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_locals: 256,
            max_call_frames: 255,
            initial_code_size: 512,
            initial_data_size: 512,
            deduplicate_string_literals: true,
            escape_by_default: false,
            debug: DebugLevel::default(),
        }
    }
}

impl Config {
    pub fn local_index_width(&self) -> LocalIndexWidth {
        LocalIndexWidth::from_max_locals(self.max_locals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_external_interface_table() {
        let config = Config::default();
        assert_eq!(config.max_locals, 256);
        assert_eq!(config.max_call_frames, 255);
        assert_eq!(config.local_index_width(), LocalIndexWidth::One);
    }
}
