//! Integration tests for Value and Type
//!
//! Tests construction, equality, ordering, truthiness, and type acceptance.

use std::collections::HashSet;

use rulebook_foundation::{Multifield, Type, Value};

// =============================================================================
// Construction
// =============================================================================

#[test]
fn from_conversions() {
    assert_eq!(Value::from(3), Value::Int(3));
    assert_eq!(Value::from(3_i64), Value::Int(3));
    assert_eq!(Value::from(true), Value::Bool(true));
    assert_eq!(Value::from("hi").as_str(), Some("hi"));
    assert_eq!(Value::from(String::from("hi")), Value::from("hi"));
    assert_eq!(
        Value::from(vec![1, 2]),
        Value::list([Value::Int(1), Value::Int(2)])
    );
}

#[test]
fn nil_is_a_symbol() {
    let nil = Value::nil();
    assert!(nil.is_nil());
    assert_eq!(nil.as_symbol(), Some("nil"));
    assert_eq!(nil.value_type(), Type::Symbol);
}

#[test]
fn strings_and_symbols_differ() {
    assert_ne!(Value::from("red"), Value::symbol("red"));
}

// =============================================================================
// Equality and Ordering
// =============================================================================

#[test]
fn int_and_float_are_not_equal() {
    assert_ne!(Value::Int(1), Value::Float(1.0));
    assert!(Value::Int(1) < Value::Float(1.5));
}

#[test]
fn nan_equals_itself() {
    let nan = Value::Float(f64::NAN);
    assert_eq!(nan, nan.clone());
}

#[test]
fn incomparable_values_have_no_order() {
    assert_eq!(Value::Int(1).partial_cmp(&Value::from("a")), None);
    assert!(!(Value::Int(1) < Value::from("a")));
}

#[test]
fn values_hash_consistently() {
    let mut set = HashSet::new();
    set.insert(Value::symbol("a"));
    set.insert(Value::symbol("a"));
    set.insert(Value::list([Value::Int(1)]));
    set.insert(Value::list([Value::Int(1)]));
    assert_eq!(set.len(), 2);
}

// =============================================================================
// Truthiness
// =============================================================================

#[test]
fn only_false_and_nil_are_falsy() {
    assert!(!Value::Bool(false).is_truthy());
    assert!(!Value::nil().is_truthy());
    assert!(Value::Int(0).is_truthy());
    assert!(Value::from("").is_truthy());
    assert!(Value::list([]).is_truthy());
}

// =============================================================================
// Display
// =============================================================================

#[test]
fn display_forms() {
    assert_eq!(Value::Int(-4).to_string(), "-4");
    assert_eq!(Value::Float(2.0).to_string(), "2.0");
    assert_eq!(Value::from("a b").to_string(), "\"a b\"");
    assert_eq!(Value::symbol("red").to_string(), "red");
    assert_eq!(
        Value::list([Value::Int(1), Value::symbol("x")]).to_string(),
        "(1 x)"
    );
}

// =============================================================================
// Types
// =============================================================================

#[test]
fn type_acceptance() {
    assert!(Type::Any.accepts(Type::List));
    assert!(Type::Number.accepts(Type::Int));
    assert!(Type::Number.accepts(Type::Float));
    assert!(Type::Float.accepts(Type::Int));
    assert!(!Type::Int.accepts(Type::Float));
    assert!(!Type::String.accepts(Type::Symbol));
}

#[test]
fn list_values_share_structure() {
    let base: Multifield = [Value::Int(1)].into_iter().collect();
    let extended = base.appended(Value::Int(2));
    assert_eq!(base.len(), 1);
    assert_eq!(extended.get(1), Some(&Value::Int(2)));
    assert_eq!(Value::List(extended).as_list().map(Multifield::len), Some(2));
}
