//! The stack virtual machine (§4.3, §5): instruction set, call frames,
//! value stack, and the decode/dispatch loop.

pub mod frame;
pub mod instruction;
mod runtime;
mod stack;

pub use frame::Frame;
pub use instruction::{BinaryOp, LocalIndexWidth, Opcode};
pub use runtime::Vm;
pub use stack::Stack;
