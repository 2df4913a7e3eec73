//! Tests for template definitions and slot resolution.

use rulebook_foundation::{ErrorKind, Type, Value};
use rulebook_storage::{SlotDef, Template};

fn person() -> Template {
    Template::new("person")
        .with_slot(SlotDef::single("name").with_type(Type::String).required())
        .with_slot(SlotDef::single("age").with_type(Type::Int))
        .with_slot(SlotDef::single("nick").with_type(Type::String))
        .with_slot(SlotDef::multi("tags").with_type(Type::Symbol))
        .with_slot(SlotDef::single("city").with_default("paris"))
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn well_formed_template_validates() {
    assert!(person().validate().is_ok());
}

#[test]
fn empty_name_is_rejected() {
    assert!(Template::new("").validate().unwrap_err().is_constraint());
}

#[test]
fn default_must_satisfy_its_slot() {
    let t = Template::new("t").with_slot(
        SlotDef::single("n")
            .with_type(Type::Int)
            .with_default("not a number"),
    );
    assert!(t.validate().is_err());
}

// =============================================================================
// Slot resolution
// =============================================================================

#[test]
fn omitted_slots_take_defaults() {
    let values = person()
        .resolve_slots(&[("name", Value::from("Ada"))])
        .unwrap();
    assert_eq!(
        values,
        vec![
            Value::from("Ada"),
            Value::Int(0),
            Value::from(""),
            Value::list([]),
            Value::from("paris"),
        ]
    );
}

#[test]
fn assignment_order_does_not_matter() {
    let t = person();
    let a = t
        .resolve_slots(&[("age", Value::Int(3)), ("name", Value::from("x"))])
        .unwrap();
    let b = t
        .resolve_slots(&[("name", Value::from("x")), ("age", Value::Int(3))])
        .unwrap();
    assert_eq!(a, b);
}

#[test]
fn missing_required_slot_fails() {
    let err = person()
        .resolve_slots(&[("age", Value::Int(3))])
        .unwrap_err();
    assert!(err.is_constraint());
    assert!(err.to_string().contains("name"));
}

#[test]
fn unknown_slot_fails() {
    let err = person()
        .resolve_slots(&[("name", Value::from("x")), ("height", Value::Int(2))])
        .unwrap_err();
    assert!(err.to_string().contains("height"));
}

#[test]
fn repeated_slot_fails() {
    let err = person()
        .resolve_slots(&[("name", Value::from("x")), ("name", Value::from("y"))])
        .unwrap_err();
    assert!(err.is_constraint());
}

// =============================================================================
// Value checks
// =============================================================================

#[test]
fn check_values_rejects_wrong_arity() {
    let err = person().check_values(&[Value::from("x")]).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Constraint(_)));
}

#[test]
fn check_values_rejects_wrong_type() {
    let t = person();
    let mut values = t.resolve_slots(&[("name", Value::from("x"))]).unwrap();
    values[1] = Value::from("old");
    let err = t.check_values(&values).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::TypeMismatch { .. }));
}

#[test]
fn single_slot_rejects_list() {
    let slot = SlotDef::single("x");
    assert!(slot.check(&Value::list([Value::Int(1)])).is_err());
    assert!(slot.check(&Value::Int(1)).is_ok());
}

#[test]
fn multi_slot_checks_each_element() {
    let slot = SlotDef::multi("tags").with_type(Type::Symbol);
    assert!(slot.check(&Value::list([Value::symbol("a"), Value::symbol("b")])).is_ok());
    assert!(slot.check(&Value::list([Value::symbol("a"), Value::Int(1)])).is_err());
    assert!(slot.check(&Value::symbol("a")).is_err());
}

#[test]
fn multi_slot_rejects_nested_lists() {
    let slot = SlotDef::multi("xs");
    let nested = Value::list([Value::list([Value::Int(1)])]);
    assert!(slot.check(&nested).is_err());
}

#[test]
fn number_type_accepts_int_and_float() {
    let slot = SlotDef::single("n").with_type(Type::Number);
    assert!(slot.check(&Value::Int(1)).is_ok());
    assert!(slot.check(&Value::Float(1.5)).is_ok());
    assert!(slot.check(&Value::from("1")).is_err());
}
