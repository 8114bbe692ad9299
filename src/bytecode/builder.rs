//! A minimal assembler for the §4.2 byte layout.
//!
//! This is not the expression compiler (§1 explicitly keeps that external);
//! it is the bytecode-artifact writer itself, used by this crate's own
//! tests and available to any host that wants to emit §4.2-conformant
//! images without hand-rolling byte offsets. Grounded on melbi-core's
//! `compiler/bytecode.rs` `BytecodeCompiler`, trimmed down to just the
//! byte-emission responsibilities (no AST, no type checking, no scope
//! resolution -- those stay with the external front end).

use crate::bytecode::image::{Bytecode, HEADER_LEN};
use crate::vm::instruction::{LocalIndexWidth, Opcode};

pub struct Builder {
    code: Vec<u8>,
    data: Vec<u8>,
    local_index_width: LocalIndexWidth,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    pub fn new() -> Self {
        Builder::with_local_index_width(LocalIndexWidth::One)
    }

    pub fn with_local_index_width(local_index_width: LocalIndexWidth) -> Self {
        Builder {
            code: Vec::new(),
            data: Vec::new(),
            local_index_width,
        }
    }

    /// Current length of the code section -- a code-relative offset
    /// suitable as a jump target or function `code_offset`.
    pub fn here(&self) -> u32 {
        self.code.len() as u32
    }

    fn local_index(&mut self, index: u32) {
        match self.local_index_width {
            LocalIndexWidth::One => self.code.push(index as u8),
            LocalIndexWidth::Two => self.code.extend_from_slice(&(index as u16).to_le_bytes()),
        }
    }

    pub fn pop(&mut self) -> &mut Self {
        self.code.push(Opcode::Pop as u8);
        self
    }

    pub fn constant_i64(&mut self, value: i64) -> &mut Self {
        self.code.push(Opcode::ConstantI64 as u8);
        self.code.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn constant_f64(&mut self, value: f64) -> &mut Self {
        self.code.push(Opcode::ConstantF64 as u8);
        self.code.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn constant_bool(&mut self, value: bool) -> &mut Self {
        self.code.push(Opcode::ConstantBool as u8);
        self.code.push(value as u8);
        self
    }

    pub fn constant_string(&mut self, data_offset: u32) -> &mut Self {
        self.code.push(Opcode::ConstantString as u8);
        self.code.extend_from_slice(&data_offset.to_le_bytes());
        self
    }

    pub fn constant_null(&mut self) -> &mut Self {
        self.code.push(Opcode::ConstantNull as u8);
        self
    }

    pub fn get_local(&mut self, index: u32) -> &mut Self {
        self.code.push(Opcode::GetLocal as u8);
        self.local_index(index);
        self
    }

    pub fn set_local(&mut self, index: u32) -> &mut Self {
        self.code.push(Opcode::SetLocal as u8);
        self.local_index(index);
        self
    }

    /// `delta == 0` is the encoded sentinel for `-1` (§4.3 `INCR`).
    pub fn incr(&mut self, delta: u8, index: u32) -> &mut Self {
        self.code.push(Opcode::Incr as u8);
        self.code.push(delta);
        self.local_index(index);
        self
    }

    pub fn add(&mut self) -> &mut Self {
        self.code.push(Opcode::Add as u8);
        self
    }

    pub fn subtract(&mut self) -> &mut Self {
        self.code.push(Opcode::Subtract as u8);
        self
    }

    pub fn multiply(&mut self) -> &mut Self {
        self.code.push(Opcode::Multiply as u8);
        self
    }

    pub fn divide(&mut self) -> &mut Self {
        self.code.push(Opcode::Divide as u8);
        self
    }

    pub fn modulus(&mut self) -> &mut Self {
        self.code.push(Opcode::Modulus as u8);
        self
    }

    pub fn negate(&mut self) -> &mut Self {
        self.code.push(Opcode::Negate as u8);
        self
    }

    pub fn not(&mut self) -> &mut Self {
        self.code.push(Opcode::Not as u8);
        self
    }

    pub fn equal(&mut self) -> &mut Self {
        self.code.push(Opcode::Equal as u8);
        self
    }

    pub fn greater(&mut self) -> &mut Self {
        self.code.push(Opcode::Greater as u8);
        self
    }

    pub fn lesser(&mut self) -> &mut Self {
        self.code.push(Opcode::Lesser as u8);
        self
    }

    /// Emits a `JUMP` with a placeholder offset and returns the byte
    /// position of that operand, to be fixed up with [`Builder::patch_jump`]
    /// once the target address is known.
    pub fn jump(&mut self) -> usize {
        self.code.push(Opcode::Jump as u8);
        let at = self.code.len();
        self.code.extend_from_slice(&0i16.to_le_bytes());
        at
    }

    pub fn jump_if_false(&mut self) -> usize {
        self.code.push(Opcode::JumpIfFalse as u8);
        let at = self.code.len();
        self.code.extend_from_slice(&0i16.to_le_bytes());
        at
    }

    /// Patches a jump operand written at `at` (as returned by
    /// [`Builder::jump`]/[`Builder::jump_if_false`]) so it lands on
    /// `target`, measuring the offset from the byte immediately after the
    /// operand, per §4.3 Branch semantics.
    pub fn patch_jump(&mut self, at: usize, target: u32) -> &mut Self {
        let from = (at + 2) as i64;
        let offset = target as i64 - from;
        let offset: i16 = offset.try_into().expect("jump offset out of i16 range");
        self.code[at..at + 2].copy_from_slice(&offset.to_le_bytes());
        self
    }

    pub fn initialize_array(&mut self, count: u32) -> &mut Self {
        self.code.push(Opcode::InitializeArray as u8);
        self.code.extend_from_slice(&count.to_le_bytes());
        self
    }

    pub fn index_get(&mut self) -> &mut Self {
        self.code.push(Opcode::IndexGet as u8);
        self
    }

    pub fn call(&mut self, data_offset: u32) -> &mut Self {
        self.code.push(Opcode::Call as u8);
        self.code.extend_from_slice(&data_offset.to_le_bytes());
        self
    }

    pub fn ret(&mut self) -> &mut Self {
        self.code.push(Opcode::Return as u8);
        self
    }

    pub fn print(&mut self) -> &mut Self {
        self.code.push(Opcode::Print as u8);
        self
    }

    pub fn debug(&mut self, payload: &[u8]) -> &mut Self {
        self.code.push(Opcode::Debug as u8);
        let length = (payload.len() + 2) as u16;
        self.code.extend_from_slice(&length.to_le_bytes());
        self.code.extend_from_slice(payload);
        self
    }

    /// Writes a length-prefixed string literal into the data section and
    /// returns its data-section-relative offset (§4.2).
    pub fn push_string(&mut self, bytes: &[u8]) -> u32 {
        let start = self.data.len() as u32;
        self.data.extend_from_slice(&0u32.to_le_bytes());
        self.data.extend_from_slice(bytes);
        let end = self.data.len() as u32;
        self.data[start as usize..start as usize + 4].copy_from_slice(&end.to_le_bytes());
        start
    }

    /// Writes a function descriptor into the data section and returns its
    /// data-section-relative offset (§4.2).
    pub fn push_function(&mut self, arity: u8, code_offset: u32) -> u32 {
        let start = self.data.len() as u32;
        self.data.push(arity);
        self.data.extend_from_slice(&code_offset.to_le_bytes());
        start
    }

    /// Assembles the header, code section and data section into a single
    /// bytecode image with `entry_offset` as the main-script entry point.
    pub fn finish(self, entry_offset: u32) -> Bytecode {
        let code_section_end = (HEADER_LEN + self.code.len()) as u32;
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.code.len() + self.data.len());
        bytes.extend_from_slice(&code_section_end.to_le_bytes());
        bytes.extend_from_slice(&entry_offset.to_le_bytes());
        bytes.extend_from_slice(&self.code);
        bytes.extend_from_slice(&self.data);
        Bytecode::from_bytes(bytes).expect("Builder always emits a well-formed header")
    }
}
