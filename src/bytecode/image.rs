//! Parsing and section access for the §4.2 byte layout.

use std::fmt;

/// Size in bytes of the fixed header: `code_section_end: u32` followed by
/// `entry_offset: u32`, both little-endian.
pub const HEADER_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BytecodeError {
    TooShortForHeader { len: usize },
    CodeSectionEndOutOfRange { code_section_end: u32, buffer_len: usize },
    EntryOffsetOutOfRange { entry_offset: u32, code_len: usize },
    StringOffsetOutOfRange { data_offset: u32, data_len: usize },
    StringLengthOutOfRange { data_offset: u32, end: u32, data_len: usize },
    FunctionOffsetOutOfRange { data_offset: u32, data_len: usize },
}

impl fmt::Display for BytecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BytecodeError::TooShortForHeader { len } => {
                write!(f, "bytecode buffer of {len} bytes is shorter than the {HEADER_LEN}-byte header")
            }
            BytecodeError::CodeSectionEndOutOfRange { code_section_end, buffer_len } => write!(
                f,
                "header code_section_end {code_section_end} is out of range for a {buffer_len}-byte buffer"
            ),
            BytecodeError::EntryOffsetOutOfRange { entry_offset, code_len } => write!(
                f,
                "header entry_offset {entry_offset} is out of range for a {code_len}-byte code section"
            ),
            BytecodeError::StringOffsetOutOfRange { data_offset, data_len } => write!(
                f,
                "string data_offset {data_offset} is out of range for a {data_len}-byte data section"
            ),
            BytecodeError::StringLengthOutOfRange { data_offset, end, data_len } => write!(
                f,
                "string at data_offset {data_offset} declares end {end} beyond the {data_len}-byte data section"
            ),
            BytecodeError::FunctionOffsetOutOfRange { data_offset, data_len } => write!(
                f,
                "function descriptor data_offset {data_offset} is out of range for a {data_len}-byte data section"
            ),
        }
    }
}

impl std::error::Error for BytecodeError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionDescriptor {
    pub arity: u8,
    pub code_offset: u32,
}

/// A validated, immutable bytecode image: header + code section + data
/// section, per §4.2. Read-only after construction; §5 notes multiple VM
/// instances may share one across threads.
pub struct Bytecode {
    bytes: Vec<u8>,
}

impl Bytecode {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, BytecodeError> {
        if bytes.len() < HEADER_LEN {
            return Err(BytecodeError::TooShortForHeader { len: bytes.len() });
        }
        let code_section_end = read_u32(&bytes, 0);
        if (code_section_end as usize) < HEADER_LEN || (code_section_end as usize) > bytes.len() {
            return Err(BytecodeError::CodeSectionEndOutOfRange {
                code_section_end,
                buffer_len: bytes.len(),
            });
        }
        let entry_offset = read_u32(&bytes, 4);
        let code_len = code_section_end as usize - HEADER_LEN;
        if entry_offset as usize > code_len {
            return Err(BytecodeError::EntryOffsetOutOfRange {
                entry_offset,
                code_len,
            });
        }
        Ok(Bytecode { bytes })
    }

    pub fn code_section_end(&self) -> u32 {
        read_u32(&self.bytes, 0)
    }

    pub fn entry_offset(&self) -> u32 {
        read_u32(&self.bytes, 4)
    }

    pub fn code(&self) -> &[u8] {
        &self.bytes[HEADER_LEN..self.code_section_end() as usize]
    }

    pub fn data(&self) -> &[u8] {
        &self.bytes[self.code_section_end() as usize..]
    }

    /// Read a length-prefixed string literal at `data_offset` (relative to
    /// the start of the data section), per §4.2.
    pub fn read_string(&self, data_offset: u32) -> Result<&[u8], BytecodeError> {
        let data = self.data();
        let start = data_offset as usize;
        if start.checked_add(4).is_none_or(|end| end > data.len()) {
            return Err(BytecodeError::StringOffsetOutOfRange {
                data_offset,
                data_len: data.len(),
            });
        }
        let end = read_u32(data, start);
        if end as usize > data.len() || (end as usize) < start + 4 {
            return Err(BytecodeError::StringLengthOutOfRange {
                data_offset,
                end,
                data_len: data.len(),
            });
        }
        Ok(&data[start + 4..end as usize])
    }

    /// Read a function descriptor (`arity: u8`, `code_offset: u32`) at
    /// `data_offset` (relative to the start of the data section), per
    /// §4.2. `code_offset` is itself relative to the start of the code
    /// section.
    pub fn read_function(&self, data_offset: u32) -> Result<FunctionDescriptor, BytecodeError> {
        let data = self.data();
        let start = data_offset as usize;
        if start.checked_add(5).is_none_or(|end| end > data.len()) {
            return Err(BytecodeError::FunctionOffsetOutOfRange {
                data_offset,
                data_len: data.len(),
            });
        }
        let arity = data[start];
        let code_offset = read_u32(data, start + 1);
        Ok(FunctionDescriptor { arity, code_offset })
    }
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::Builder;

    #[test]
    fn rejects_buffers_shorter_than_header() {
        assert_eq!(
            Bytecode::from_bytes(vec![0, 1, 2]),
            Err(BytecodeError::TooShortForHeader { len: 3 })
        );
    }

    #[test]
    fn round_trips_a_string_literal() {
        let mut b = Builder::new();
        let offset = b.push_string(b"hi");
        let image = b.finish(0);
        assert_eq!(image.read_string(offset).unwrap(), b"hi");
    }

    #[test]
    fn round_trips_a_function_descriptor() {
        let mut b = Builder::new();
        let offset = b.push_function(2, 42);
        let image = b.finish(0);
        let descriptor = image.read_function(offset).unwrap();
        assert_eq!(descriptor.arity, 2);
        assert_eq!(descriptor.code_offset, 42);
    }
}
