use super::*;
use crate::values::heap::resolve_index;
use bumpalo::Bump;
use pretty_assertions::assert_eq;

fn render(value: &Value, escape: bool) -> String {
    let mut out = Vec::new();
    value.write(&mut out, escape).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn int_equals_itself() {
    assert_eq!(Value::Int(3).equal(&Value::Int(3)), Ok(true));
    assert_eq!(Value::Int(3).equal(&Value::Int(4)), Ok(false));
}

#[test]
fn int_and_float_cross_promote_for_equality() {
    assert_eq!(Value::Int(3).equal(&Value::Float(3.0)), Ok(true));
    assert_eq!(Value::Float(3.0).equal(&Value::Int(3)), Ok(true));
    assert_eq!(Value::Int(3).equal(&Value::Float(3.5)), Ok(false));
}

#[test]
fn null_is_never_incompatible() {
    assert_eq!(Value::Null.equal(&Value::Null), Ok(true));
    assert_eq!(Value::Null.equal(&Value::Int(0)), Ok(false));
    assert_eq!(Value::Int(0).equal(&Value::Null), Ok(false));
}

#[test]
fn incompatible_kinds_error() {
    assert_eq!(Value::Int(1).equal(&Value::Bool(true)), Err(Incompatible));
    assert_eq!(Value::Str(b"x").equal(&Value::Int(1)), Err(Incompatible));
}

#[test]
fn buffer_and_str_compare_as_interchangeable() {
    let arena = Bump::new();
    let buf = Value::buffer(&arena, b"hello".to_vec());
    let s = Value::Str(b"hello");
    assert_eq!(buf.equal(&s), Ok(true));
    assert_eq!(buf.order(&s), Ordering::Equal);
}

#[test]
fn list_equality_is_structural() {
    let arena = Bump::new();
    let xs = Value::list(&arena, vec![Value::Int(1), Value::Int(2)]);
    let ys = Value::list(&arena, vec![Value::Int(1), Value::Int(2)]);
    let zs = Value::list(&arena, vec![Value::Int(1), Value::Int(3)]);
    assert_eq!(xs.equal(&ys), Ok(true));
    assert_eq!(xs.equal(&zs), Ok(false));
}

#[test]
fn map_equality_ignores_insertion_order() {
    let arena = Bump::new();
    let mut left = Map::default();
    left.insert(Key::Str(b"a"), Value::Int(1));
    left.insert(Key::Str(b"b"), Value::Int(2));

    let mut right = Map::default();
    right.insert(Key::Str(b"b"), Value::Int(2));
    right.insert(Key::Str(b"a"), Value::Int(1));

    let a = Value::map(&arena, left);
    let b = Value::map(&arena, right);
    assert_eq!(a.equal(&b), Ok(true));
}

#[test]
fn iterators_are_never_equal() {
    let arena = Bump::new();
    let list = Value::list(&arena, vec![Value::Int(1)]);
    let list_ref = match &list {
        Value::Ref(r) => r.clone(),
        _ => unreachable!(),
    };
    let iter = Value::Ref(Ref::new_in(
        &arena,
        Payload::ListIterator {
            list: list_ref,
            index: std::cell::Cell::new(0),
        },
    ));
    assert_eq!(iter.equal(&iter), Ok(false));
}

#[test]
fn ordering_orders_lists_by_length_then_elements() {
    let arena = Bump::new();
    let short = Value::list(&arena, vec![Value::Int(9)]);
    let long = Value::list(&arena, vec![Value::Int(1), Value::Int(1)]);
    assert_eq!(short.order(&long), Ordering::Less);

    let a = Value::list(&arena, vec![Value::Int(1), Value::Int(2)]);
    let b = Value::list(&arena, vec![Value::Int(1), Value::Int(3)]);
    assert_eq!(a.order(&b), Ordering::Less);
}

#[test]
fn bool_ordering_is_false_then_true() {
    assert_eq!(Value::Bool(false).order(&Value::Bool(true)), Ordering::Less);
}

#[test]
fn only_bool_true_is_truthy() {
    assert!(Value::Bool(true).is_true());
    assert!(!Value::Bool(false).is_true());
    assert!(!Value::Int(1).is_true());
    assert!(!Value::Int(0).is_true());
    assert!(!Value::Null.is_true());
    let arena = Bump::new();
    assert!(!Value::list(&arena, vec![]).is_true());
}

#[test]
fn escape_replaces_html_special_characters() {
    let v = Value::Str(b"a&b<c>d\"e'f");
    assert_eq!(render(&v, true), "a&amp;b&lt;c&gt;d&#34;e&#39;f");
    assert_eq!(render(&v, false), "a&b<c>d\"e'f");
}

#[test]
fn float_formatting_always_has_shortest_round_trip() {
    assert_eq!(render(&Value::Float(3.0), false), "3");
    assert_eq!(render(&Value::Float(1.5), false), "1.5");
}

#[test]
fn list_and_map_formatting_nests_and_escapes() {
    let arena = Bump::new();
    let list = Value::list(
        &arena,
        vec![Value::Str(b"<x>"), Value::Int(2), Value::Null],
    );
    assert_eq!(render(&list, true), "[&lt;x&gt;, 2, ]");

    let mut entries = Map::default();
    entries.insert(Key::Str(b"k"), Value::Str(b"<v>"));
    let map = Value::map(&arena, entries);
    assert_eq!(render(&map, true), "{k: &lt;v&gt;}");
}

#[test]
fn resolve_index_matches_value_negative_index_rules() {
    assert_eq!(resolve_index(-1, 3), Some(2));
    assert_eq!(resolve_index(-4, 3), None);
}
