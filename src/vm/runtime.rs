//! The decode/dispatch loop (§4.3): fetch an opcode, decode its inline
//! operands, execute, advance or jump.
//!
//! Grounded on `melbi-core`'s `vm/runtime.rs` `VM::run_internal`: a single
//! `match` over the decoded opcode driven by a cursor into the code buffer,
//! with arithmetic and comparisons that pop the stack and push back the
//! result. Melbi decodes an already-fixed-width instruction behind a raw
//! pointer; this VM instead walks the raw byte buffer directly (`ip` is a
//! `usize` index, not a pointer) since §4.3's operands are variable-width
//! per opcode rather than packed into one `#[repr(C, u8)]` enum.

use std::io;

use bumpalo::Bump;

use crate::bytecode::Bytecode;
use crate::config::Config;
use crate::error::RuntimeError;
use crate::values::{Key, Payload, Value, resolve_index};
use crate::vm::frame::Frame;
use crate::vm::instruction::{BinaryOp, LocalIndexWidth, Opcode};
use crate::vm::stack::Stack;

/// A stack-based virtual machine attached to one bytecode image and one
/// per-run arena (§5 Allocation policy). Not safe to share across
/// concurrent `run` calls; build a fresh `Vm` per render.
pub struct Vm<'code, 'arena, W> {
    bytecode: &'code Bytecode,
    arena: &'arena Bump,
    config: Config,
    stack: Stack<Value<'code, 'arena>>,
    frames: Vec<Frame>,
    frame_pointer: usize,
    frame_count: usize,
    ip: usize,
    output: W,
    /// Arena usage as of the last `warn_on_arena_growth` report, so growth
    /// is logged on doublings rather than on every single allocation.
    last_logged_arena_bytes: usize,
}

impl<'code, 'arena, W: io::Write> Vm<'code, 'arena, W> {
    pub fn new(bytecode: &'code Bytecode, arena: &'arena Bump, config: Config, output: W) -> Self {
        let ip = bytecode.entry_offset() as usize;
        let stack = Stack::with_capacity(config.max_locals as usize);
        Vm {
            bytecode,
            arena,
            config,
            stack,
            frames: Vec::new(),
            frame_pointer: 0,
            frame_count: 0,
            ip,
            output,
            last_logged_arena_bytes: 0,
        }
    }

    /// Executes from the image's entry point (§6 `Vm::run`). On success
    /// returns the value left by the top-level `RETURN`; the stack is
    /// empty again per the §8 property that a normal run restores it.
    pub fn run(&mut self) -> Result<Value<'code, 'arena>, RuntimeError> {
        let result = self.run_internal();
        debug_assert!(
            result.is_err() || self.stack.is_empty(),
            "stack must be empty after a normal top-level RETURN"
        );
        result
    }

    fn run_internal(&mut self) -> Result<Value<'code, 'arena>, RuntimeError> {
        loop {
            let code = self.bytecode.code();
            let opcode_byte = code[self.ip];
            let opcode = Opcode::from_byte(opcode_byte).ok_or_else(|| {
                RuntimeError::type_error(format!("unknown opcode byte {opcode_byte:#x}"))
            })?;
            self.ip += 1;

            if let Some(binary_op) = BinaryOp::from_opcode(opcode) {
                self.exec_binary_op(binary_op)?;
                continue;
            }

            match opcode {
                Opcode::Pop => {
                    self.stack.pop();
                }
                Opcode::ConstantI64 => {
                    let value = self.read_i64();
                    self.stack.push(Value::Int(value));
                }
                Opcode::ConstantF64 => {
                    let value = self.read_f64();
                    self.stack.push(Value::Float(value));
                }
                Opcode::ConstantBool => {
                    let byte = self.read_u8();
                    self.stack.push(Value::Bool(byte != 0));
                }
                Opcode::ConstantString => {
                    let data_offset = self.read_u32();
                    let bytes = self
                        .bytecode
                        .read_string(data_offset)
                        .map_err(|e| RuntimeError::type_error(e.to_string()))?;
                    self.stack.push(Value::Str(bytes));
                }
                Opcode::ConstantNull => {
                    self.stack.push(Value::Null);
                }
                Opcode::GetLocal => {
                    let index = self.read_local_index();
                    let value = self.stack[self.frame_pointer + index].clone();
                    self.stack.push(value);
                }
                Opcode::SetLocal => {
                    let index = self.read_local_index();
                    let value = self
                        .stack
                        .peek()
                        .expect("SET_LOCAL requires a value on the stack")
                        .clone();
                    self.stack[self.frame_pointer + index] = value;
                }
                Opcode::Incr => self.exec_incr()?,
                Opcode::Negate => self.exec_negate()?,
                Opcode::Not => self.exec_not()?,
                Opcode::Equal => {
                    let (a, b) = self.pop_two();
                    let result = a.equal(&b).map_err(|_| {
                        RuntimeError::type_error(format!(
                            "cannot compare {} and {} for equality",
                            a.type_name(),
                            b.type_name()
                        ))
                    })?;
                    self.stack.push(Value::Bool(result));
                }
                Opcode::Greater => {
                    let (a, b) = self.pop_two();
                    self.stack.push(Value::Bool(a.order(&b) == std::cmp::Ordering::Greater));
                }
                Opcode::Lesser => {
                    let (a, b) = self.pop_two();
                    self.stack.push(Value::Bool(a.order(&b) == std::cmp::Ordering::Less));
                }
                Opcode::Jump => {
                    let offset = self.read_i16();
                    self.jump(offset)?;
                }
                Opcode::JumpIfFalse => {
                    let offset = self.read_i16();
                    let top = self.stack.peek().expect("JUMP_IF_FALSE requires a value on the stack");
                    if !top.is_true() {
                        self.jump(offset)?;
                    }
                }
                Opcode::InitializeArray => {
                    let count = self.read_u32() as usize;
                    let start = self.stack.len() - count;
                    let mut elements = Vec::with_capacity(count);
                    for i in 0..count {
                        elements.push(self.stack[start + i].clone());
                    }
                    self.stack.truncate(start);
                    self.stack.push(Value::list(self.arena, elements));
                    self.warn_on_arena_growth();
                }
                Opcode::IndexGet => self.exec_index_get()?,
                Opcode::Call => self.exec_call()?,
                Opcode::Return => {
                    if let Some(value) = self.exec_return()? {
                        return Ok(value);
                    }
                }
                Opcode::Print => {
                    let value = self.stack.pop().expect("PRINT requires a value on the stack");
                    value.write(&mut self.output, false).map_err(|e| {
                        RuntimeError::type_error(format!("failed writing PRINT output: {e}"))
                    })?;
                }
                Opcode::Debug => {
                    let length = self.read_u16() as usize;
                    self.ip += length - 2;
                }
                Opcode::Add | Opcode::Subtract | Opcode::Multiply | Opcode::Divide | Opcode::Modulus => {
                    unreachable!("handled by BinaryOp::from_opcode above")
                }
            }
        }
    }

    fn pop_two(&mut self) -> (Value<'code, 'arena>, Value<'code, 'arena>) {
        let b = self.stack.pop().expect("binary operator requires two operands");
        let a = self.stack.pop().expect("binary operator requires two operands");
        (a, b)
    }

    fn exec_binary_op(&mut self, op: BinaryOp) -> Result<(), RuntimeError> {
        let (a, b) = self.pop_two();
        let result = match op {
            BinaryOp::Add => numeric_op(&a, &b, "add", i64::wrapping_add, |x, y| x + y)?,
            BinaryOp::Subtract => numeric_op(&a, &b, "subtract", i64::wrapping_sub, |x, y| x - y)?,
            BinaryOp::Multiply => numeric_op(&a, &b, "multiply", i64::wrapping_mul, |x, y| x * y)?,
            BinaryOp::Divide => self.exec_divide(&a, &b)?,
            BinaryOp::Modulus => self.exec_modulus(&a, &b)?,
        };
        self.stack.push(result);
        Ok(())
    }

    fn exec_divide(&self, a: &Value<'code, 'arena>, b: &Value<'code, 'arena>) -> Result<Value<'code, 'arena>, RuntimeError> {
        match (a, b) {
            (Value::Int(_), Value::Int(0)) => {
                Err(RuntimeError::type_error("integer division by zero"))
            }
            (Value::Int(x), Value::Int(y)) => Ok(Value::Int(x.wrapping_div(*y))),
            (Value::Float(x), Value::Float(y)) => Ok(Value::Float(x / y)),
            (Value::Int(x), Value::Float(y)) => Ok(Value::Float(*x as f64 / y)),
            (Value::Float(x), Value::Int(y)) => Ok(Value::Float(x / *y as f64)),
            _ => Err(RuntimeError::type_error(format!(
                "cannot divide non-numeric value: {} / {}",
                a.type_name(),
                b.type_name()
            ))),
        }
    }

    fn exec_modulus(&self, a: &Value<'code, 'arena>, b: &Value<'code, 'arena>) -> Result<Value<'code, 'arena>, RuntimeError> {
        match (a, b) {
            (Value::Int(_), Value::Int(0)) => Err(RuntimeError::type_error("integer modulus by zero")),
            (Value::Int(x), Value::Int(y)) => Ok(Value::Int(floor_mod(*x, *y))),
            _ => Err(RuntimeError::type_error(format!(
                "MODULUS requires both operands to be int, got {} and {}",
                a.type_name(),
                b.type_name()
            ))),
        }
    }

    fn exec_negate(&mut self) -> Result<(), RuntimeError> {
        let value = self.stack.pop().expect("NEGATE requires a value on the stack");
        let result = match value {
            Value::Int(v) => Value::Int(v.wrapping_neg()),
            Value::Float(v) => Value::Float(-v),
            other => {
                return Err(RuntimeError::type_error(format!(
                    "cannot negate non-numeric value: {}",
                    other.type_name()
                )));
            }
        };
        self.stack.push(result);
        Ok(())
    }

    fn exec_not(&mut self) -> Result<(), RuntimeError> {
        let value = self.stack.pop().expect("NOT requires a value on the stack");
        match value {
            Value::Bool(v) => self.stack.push(Value::Bool(!v)),
            other => {
                return Err(RuntimeError::type_error(format!(
                    "cannot apply NOT to non-bool value: {}",
                    other.type_name()
                )));
            }
        }
        Ok(())
    }

    fn exec_incr(&mut self) -> Result<(), RuntimeError> {
        let delta = self.read_u8();
        let index = self.read_local_index();
        let delta = if delta == 0 { -1i64 } else { delta as i64 };
        let slot = self.frame_pointer + index;
        let new_value = match &self.stack[slot] {
            Value::Int(v) => Value::Int(v.wrapping_add(delta)),
            other => {
                return Err(RuntimeError::type_error(format!(
                    "cannot INCR non-int local: {}",
                    other.type_name()
                )));
            }
        };
        self.stack[slot] = new_value.clone();
        self.stack.push(new_value);
        Ok(())
    }

    fn exec_index_get(&mut self) -> Result<(), RuntimeError> {
        let index = self.stack.pop().expect("INDEX_GET requires an index on the stack");
        let target = self.stack.pop().expect("INDEX_GET requires a target on the stack");
        let value = match &target {
            Value::Ref(r) if matches!(r.payload(), Payload::List(_)) => {
                let Payload::List(list) = r.payload() else { unreachable!() };
                let i = expect_int(&index)?;
                let list = list.borrow();
                let resolved = resolve_index(i, list.len())
                    .ok_or_else(|| RuntimeError::out_of_range(format!("list index {i} out of range")))?;
                list[resolved].clone()
            }
            Value::Str(bytes) => {
                let i = expect_int(&index)?;
                let resolved = resolve_index(i, bytes.len())
                    .ok_or_else(|| RuntimeError::out_of_range(format!("string index {i} out of range")))?;
                Value::Str(&bytes[resolved..resolved + 1])
            }
            Value::Ref(r) if matches!(r.payload(), Payload::Buffer(_)) => {
                let Payload::Buffer(buf) = r.payload() else { unreachable!() };
                let i = expect_int(&index)?;
                let buf = buf.borrow();
                let resolved = resolve_index(i, buf.len())
                    .ok_or_else(|| RuntimeError::out_of_range(format!("string index {i} out of range")))?;
                Value::buffer(self.arena, vec![buf[resolved]])
            }
            Value::Ref(r) if matches!(r.payload(), Payload::Map(_)) => {
                let Payload::Map(map) = r.payload() else { unreachable!() };
                let key = value_to_key(&index)?;
                let map = map.borrow();
                map.get(&key).cloned().unwrap_or(Value::Null)
            }
            other => {
                return Err(RuntimeError::type_error(format!(
                    "cannot index into non-indexable value: {}",
                    other.type_name()
                )));
            }
        };
        self.stack.push(value);
        Ok(())
    }

    fn exec_call(&mut self) -> Result<(), RuntimeError> {
        let data_offset = self.read_u32();
        let descriptor = self
            .bytecode
            .read_function(data_offset)
            .map_err(|e| RuntimeError::type_error(e.to_string()))?;
        if self.frame_count >= self.config.max_call_frames {
            return Err(RuntimeError::stack_overflow(format!(
                "call depth exceeded max_call_frames ({})",
                self.config.max_call_frames
            )));
        }
        let arity = descriptor.arity as usize;
        let new_frame_pointer = self.stack.len() - arity;
        self.frames.push(Frame {
            return_ip: self.ip,
            frame_pointer: self.frame_pointer,
        });
        self.frame_count += 1;
        self.frame_pointer = new_frame_pointer;
        self.ip = descriptor.code_offset as usize;
        tracing::debug!(
            depth = self.frame_count,
            arity,
            code_offset = descriptor.code_offset,
            "CALL pushed frame"
        );
        Ok(())
    }

    /// Returns `Some(value)` when the top-level script itself returns;
    /// otherwise resumes the caller and the decode loop continues.
    fn exec_return(&mut self) -> Result<Option<Value<'code, 'arena>>, RuntimeError> {
        let value = self.stack.pop().expect("RETURN requires a value on the stack");
        if self.frame_count == 0 {
            return Ok(Some(value));
        }
        self.stack.truncate(self.frame_pointer);
        let frame = self.frames.pop().expect("frame_count > 0 implies a saved frame");
        self.frame_count -= 1;
        self.ip = frame.return_ip;
        self.frame_pointer = frame.frame_pointer;
        self.stack.push(value);
        tracing::debug!(depth = self.frame_count, "RETURN popped frame");
        Ok(None)
    }

    /// Applies a `JUMP`/`JUMP_IF_FALSE` relative offset, measured from the
    /// byte immediately after the 16-bit operand (§4.3 Branch semantics),
    /// and asserts the result stays inside the code section.
    fn jump(&mut self, offset: i16) -> Result<(), RuntimeError> {
        let target = self.ip as i64 + offset as i64;
        let code_len = self.bytecode.code().len() as i64;
        if target < 0 || target >= code_len {
            return Err(RuntimeError::type_error(format!(
                "jump target {target} lands outside the code section"
            )));
        }
        self.ip = target as usize;
        Ok(())
    }

    fn read_u8(&mut self) -> u8 {
        let byte = self.bytecode.code()[self.ip];
        self.ip += 1;
        byte
    }

    fn read_u16(&mut self) -> u16 {
        let bytes = &self.bytecode.code()[self.ip..self.ip + 2];
        self.ip += 2;
        u16::from_le_bytes(bytes.try_into().unwrap())
    }

    fn read_i16(&mut self) -> i16 {
        self.read_u16() as i16
    }

    fn read_u32(&mut self) -> u32 {
        let bytes = &self.bytecode.code()[self.ip..self.ip + 4];
        self.ip += 4;
        u32::from_le_bytes(bytes.try_into().unwrap())
    }

    fn read_i64(&mut self) -> i64 {
        let bytes = &self.bytecode.code()[self.ip..self.ip + 8];
        self.ip += 8;
        i64::from_le_bytes(bytes.try_into().unwrap())
    }

    fn read_f64(&mut self) -> f64 {
        let bytes = &self.bytecode.code()[self.ip..self.ip + 8];
        self.ip += 8;
        f64::from_le_bytes(bytes.try_into().unwrap())
    }

    /// Logs a `warn!` when arena usage has at least doubled since the last
    /// report (SPEC_FULL.md §6.1) -- a signal that a single render is
    /// accumulating substantially more live data than before, useful for a
    /// host tuning its arena's initial chunk size. Checked on doublings
    /// rather than on every allocation so this does not turn into
    /// per-opcode log spam.
    fn warn_on_arena_growth(&mut self) {
        let bytes_after = self.arena.allocated_bytes();
        if bytes_after >= self.last_logged_arena_bytes.saturating_mul(2).max(4096) {
            tracing::warn!(
                bytes_before = self.last_logged_arena_bytes,
                bytes_after,
                "VM arena usage doubled"
            );
            self.last_logged_arena_bytes = bytes_after;
        }
    }

    fn read_local_index(&mut self) -> usize {
        match self.config.local_index_width() {
            LocalIndexWidth::One => self.read_u8() as usize,
            LocalIndexWidth::Two => self.read_u16() as usize,
        }
    }
}

fn expect_int(value: &Value<'_, '_>) -> Result<i64, RuntimeError> {
    match value {
        Value::Int(v) => Ok(*v),
        other => Err(RuntimeError::type_error(format!(
            "expected an int index, got {}",
            other.type_name()
        ))),
    }
}

/// Resolves an `INDEX_GET` key against a `Map`. Int keys borrow nothing;
/// `Str` keys reuse the bytecode-borrowed slice directly. A `Buffer` index
/// value cannot become a `Key<'code>` -- its bytes live only as long as
/// the per-run arena, not the bytecode image -- so it is rejected with
/// `TypeError` rather than unsoundly extending its lifetime.
fn value_to_key<'code>(value: &Value<'code, '_>) -> Result<Key<'code>, RuntimeError> {
    match value {
        Value::Int(v) => Ok(Key::Int(*v)),
        Value::Str(bytes) => Ok(Key::Str(bytes)),
        other => Err(RuntimeError::type_error(format!(
            "cannot use {} as a map key", other.type_name()
        ))),
    }
}

/// `a.rem_euclid`-style floor modulus: the result takes the sign of the
/// divisor (§3 Invariants), unlike Rust's `%` which takes the sign of the
/// dividend.
fn floor_mod(a: i64, b: i64) -> i64 {
    let r = a.wrapping_rem(b);
    if r != 0 && (r < 0) != (b < 0) {
        r.wrapping_add(b)
    } else {
        r
    }
}

fn numeric_op<'code, 'arena>(
    a: &Value<'code, 'arena>,
    b: &Value<'code, 'arena>,
    op_name: &str,
    int_op: impl Fn(i64, i64) -> i64,
    float_op: impl Fn(f64, f64) -> f64,
) -> Result<Value<'code, 'arena>, RuntimeError> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(Value::Int(int_op(*x, *y))),
        (Value::Float(x), Value::Float(y)) => Ok(Value::Float(float_op(*x, *y))),
        (Value::Int(x), Value::Float(y)) => Ok(Value::Float(float_op(*x as f64, *y))),
        (Value::Float(x), Value::Int(y)) => Ok(Value::Float(float_op(*x, *y as f64))),
        _ => Err(RuntimeError::type_error(format!(
            "cannot {op_name} non-numeric value: {} {op_name} {}",
            a.type_name(),
            b.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::Builder;

    /// Smoke-tests the decode loop's own `debug!`/`warn!` instrumentation
    /// (§6.1) alongside a recursive call/return, colocated with the VM
    /// itself rather than only covered by the crate's integration tests.
    #[test]
    fn call_and_return_logging_does_not_disturb_the_result() {
        crate::test_utils::init_test_logging();

        let mut b = Builder::new();
        let add_entry = b.here();
        b.get_local(0).get_local(1).add().ret();
        let descriptor_offset = b.push_function(2, add_entry);
        let main_entry = b.here();
        b.constant_i64(40).constant_i64(2).call(descriptor_offset).ret();
        let bytecode = b.finish(main_entry);

        let arena = Bump::new();
        let mut output = Vec::new();
        let mut vm = Vm::new(&bytecode, &arena, Config::default(), &mut output);
        let value = vm.run().unwrap();
        assert!(matches!(value, Value::Int(42)));
    }

    #[test]
    fn arena_growth_is_reported_only_on_doubling() {
        let mut b = Builder::new();
        b.constant_null();
        let bytecode = b.finish(0);
        let arena = Bump::new();
        let mut output = Vec::new();
        let mut vm = Vm::new(&bytecode, &arena, Config::default(), &mut output);

        assert_eq!(vm.last_logged_arena_bytes, 0);
        vm.warn_on_arena_growth();
        assert_eq!(vm.last_logged_arena_bytes, 0, "an empty arena has nothing to report");

        vm.last_logged_arena_bytes = 100;
        vm.warn_on_arena_growth();
        assert_eq!(
            vm.last_logged_arena_bytes, 100,
            "no new allocation happened, so there is nothing to double against"
        );
    }
}
