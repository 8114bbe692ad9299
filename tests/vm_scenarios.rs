//! End-to-end bytecode scenarios (§8) assembled with the `Builder` and run
//! to completion against a fresh `Vm`.

use bumpalo::Bump;
use parchment::{Builder, Config, HostFunctions, NoHost, RuntimeErrorKind, Value, Vm};

fn run(bytecode: parchment::Bytecode) -> Result<(Value<'_, '_>, Vec<u8>), parchment::RuntimeError> {
    run_with(bytecode, Config::default())
}

fn run_with(
    bytecode: parchment::Bytecode,
    config: Config,
) -> Result<(Value<'_, '_>, Vec<u8>), parchment::RuntimeError> {
    let arena = Bump::new();
    let mut output = Vec::new();
    // Safety valve for the lifetime juggling below: bytecode and arena both
    // outlive this function's body, so we leak them into `'static` storage
    // scoped to the test process -- acceptable in tests, never in library
    // code.
    let bytecode: &'static parchment::Bytecode = Box::leak(Box::new(bytecode));
    let arena: &'static Bump = Box::leak(Box::new(arena));
    let mut vm = Vm::new(bytecode, arena, config, &mut output);
    let value = vm.run()?;
    Ok((value, output))
}

#[test]
fn adds_two_ints() {
    let mut b = Builder::new();
    b.constant_i64(1).constant_i64(2).add().ret();
    let (value, _) = run(b.finish(0)).unwrap();
    assert!(matches!(value, Value::Int(3)));
}

#[test]
fn multiplies_float_by_int() {
    let mut b = Builder::new();
    b.constant_f64(1.5).constant_i64(2).multiply().ret();
    let (value, _) = run(b.finish(0)).unwrap();
    match value {
        Value::Float(v) => assert_eq!(v, 3.0),
        other => panic!("expected Float(3.0), got {other:?}"),
    }
}

#[test]
fn negative_index_reaches_last_list_element() {
    let mut b = Builder::new();
    b.constant_i64(10)
        .constant_i64(20)
        .constant_i64(30)
        .initialize_array(3)
        .constant_i64(-1)
        .index_get()
        .ret();
    let (value, _) = run(b.finish(0)).unwrap();
    assert!(matches!(value, Value::Int(30)));
}

#[test]
fn maps_with_different_insertion_order_are_equal() {
    let mut b = Builder::new();
    // first map: {a: 1, b: 2}, via two MapEntry-less construction is not
    // wired as an opcode (§4.3 has no MAKE_MAP); build the two maps inside
    // the arena directly instead, then push them.
    b.constant_null().ret();
    let bytecode = b.finish(0);
    let arena = Bump::new();
    let mut map_a: parchment::values::Map = Default::default();
    map_a.insert(parchment::Key::Str(b"a"), Value::Int(1));
    map_a.insert(parchment::Key::Str(b"b"), Value::Int(2));
    let mut map_b: parchment::values::Map = Default::default();
    map_b.insert(parchment::Key::Str(b"b"), Value::Int(2));
    map_b.insert(parchment::Key::Str(b"a"), Value::Int(1));
    let a = Value::map(&arena, map_a);
    let b_val = Value::map(&arena, map_b);
    assert!(a.equal(&b_val).unwrap());
    let _ = bytecode;
}

#[test]
fn escapes_ampersand() {
    let mut b = Builder::new();
    let offset = b.push_string(b"a&b");
    b.constant_string(offset).ret();
    let (value, _) = run(b.finish(0)).unwrap();
    let mut out = Vec::new();
    value.write(&mut out, true).unwrap();
    assert_eq!(out, b"a&amp;b");
}

#[test]
fn calls_a_two_argument_function_and_returns_to_depth_zero() {
    let mut b = Builder::new();
    // fn add(a, b) { return a + b; }
    let add_entry = b.here();
    b.get_local(0).get_local(1).add().ret();
    let descriptor_offset = b.push_function(2, add_entry);

    // main script: push args, call add(2, 3), return result.
    let main_entry = b.here();
    b.constant_i64(2).constant_i64(3).call(descriptor_offset).ret();
    let bytecode = b.finish(main_entry);
    let (value, _) = run(bytecode).unwrap();
    assert!(matches!(value, Value::Int(5)));
}

#[test]
fn index_get_at_minus_len_minus_one_is_out_of_range() {
    let mut b = Builder::new();
    b.constant_i64(10).initialize_array(1).constant_i64(-2).index_get().ret();
    let err = run(b.finish(0)).unwrap_err();
    assert_eq!(err.kind, RuntimeErrorKind::OutOfRange);
}

#[test]
fn stack_overflow_past_configured_frame_depth() {
    let mut b = Builder::new();
    let entry = b.here();
    // an endlessly recursive function: call itself with zero args forever.
    let descriptor_offset = b.push_function(0, entry);
    b.call(descriptor_offset);
    b.ret();
    let main_entry = b.here();
    b.call(descriptor_offset).ret();
    let config = Config {
        max_call_frames: 4,
        ..Config::default()
    };
    let err = run_with(b.finish(main_entry), config).unwrap_err();
    assert_eq!(err.kind, RuntimeErrorKind::StackOverflow);
}

#[test]
fn integer_divide_by_zero_is_a_type_error() {
    let mut b = Builder::new();
    b.constant_i64(1).constant_i64(0).divide().ret();
    let err = run(b.finish(0)).unwrap_err();
    assert_eq!(err.kind, RuntimeErrorKind::TypeError);
}

#[test]
fn modulus_with_a_float_operand_is_a_type_error() {
    let mut b = Builder::new();
    b.constant_f64(1.5).constant_i64(2).modulus().ret();
    let err = run(b.finish(0)).unwrap_err();
    assert_eq!(err.kind, RuntimeErrorKind::TypeError);
}

#[test]
fn jump_if_false_branches_on_int_zero_because_only_bool_true_is_truthy() {
    let mut b = Builder::new();
    b.constant_i64(0);
    let at = b.jump_if_false();
    // JUMP_IF_FALSE never pops its operand (§4.3): each arm pops it
    // explicitly before pushing its own result.
    b.pop().constant_i64(1).ret();
    let target = b.here();
    b.patch_jump(at, target);
    b.pop().constant_i64(99).ret();
    let (value, _) = run(b.finish(0)).unwrap();
    assert!(matches!(value, Value::Int(99)));
}

#[test]
fn no_host_function_registered_reports_a_type_error() {
    let mut host = NoHost;
    let err = host.call(7, &[]).unwrap_err();
    assert_eq!(err.kind, RuntimeErrorKind::TypeError);
}
