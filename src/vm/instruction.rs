//! The instruction set (§4.3): one opcode byte followed by inline,
//! little-endian operands. `L` denotes the configured local-index width
//! (1 byte for `max_locals <= 256`, 2 bytes otherwise, §4.3/§6).
//!
//! Grounded on `melbi-core`'s `vm/instruction_set.rs`, whose `Instruction`
//! enum fixes every opcode+operand pair at 16 bits via `#[repr(C, u8)]`.
//! This instruction set instead uses §4.3's variable-width encoding
//! (operands range from 0 bytes to 8), so the opcode is a plain `#[repr(u8)]`
//! tag decoded by the VM's fetch loop rather than a single fixed-size enum
//! that carries its operand inline.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Pop = 0,
    ConstantI64 = 1,
    ConstantF64 = 2,
    ConstantBool = 3,
    ConstantString = 4,
    ConstantNull = 5,
    GetLocal = 6,
    SetLocal = 7,
    Incr = 8,
    Add = 9,
    Subtract = 10,
    Multiply = 11,
    Divide = 12,
    Modulus = 13,
    Negate = 14,
    Not = 15,
    Equal = 16,
    Greater = 17,
    Lesser = 18,
    Jump = 19,
    JumpIfFalse = 20,
    InitializeArray = 21,
    IndexGet = 22,
    Call = 23,
    Return = 24,
    Print = 25,
    Debug = 26,
}

static_assertions::assert_eq_size!(Opcode, u8);

impl Opcode {
    pub fn from_byte(byte: u8) -> Option<Opcode> {
        use Opcode::*;
        Some(match byte {
            0 => Pop,
            1 => ConstantI64,
            2 => ConstantF64,
            3 => ConstantBool,
            4 => ConstantString,
            5 => ConstantNull,
            6 => GetLocal,
            7 => SetLocal,
            8 => Incr,
            9 => Add,
            10 => Subtract,
            11 => Multiply,
            12 => Divide,
            13 => Modulus,
            14 => Negate,
            15 => Not,
            16 => Equal,
            17 => Greater,
            18 => Lesser,
            19 => Jump,
            20 => JumpIfFalse,
            21 => InitializeArray,
            22 => IndexGet,
            23 => Call,
            24 => Return,
            25 => Print,
            26 => Debug,
            _ => return None,
        })
    }
}

/// The four arithmetic binary operators dispatched by `Add`/`Subtract`/
/// `Multiply`/`Divide`/`Modulus` -- kept as a single enum of opcodes above
/// rather than one parameterized opcode (§4.3's table lists them
/// separately, unlike melbi's operand-encoded `IntBinOp(u8)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulus,
}

impl BinaryOp {
    pub fn from_opcode(op: Opcode) -> Option<BinaryOp> {
        match op {
            Opcode::Add => Some(BinaryOp::Add),
            Opcode::Subtract => Some(BinaryOp::Subtract),
            Opcode::Multiply => Some(BinaryOp::Multiply),
            Opcode::Divide => Some(BinaryOp::Divide),
            Opcode::Modulus => Some(BinaryOp::Modulus),
            _ => None,
        }
    }
}

/// Width, in bytes, of a local-slot index operand -- selected at compile
/// time from `max_locals` (§4.3, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalIndexWidth {
    One,
    Two,
}

impl LocalIndexWidth {
    pub fn from_max_locals(max_locals: u32) -> Self {
        if max_locals <= 256 {
            LocalIndexWidth::One
        } else {
            LocalIndexWidth::Two
        }
    }

    pub fn bytes(self) -> usize {
        match self {
            LocalIndexWidth::One => 1,
            LocalIndexWidth::Two => 2,
        }
    }
}
