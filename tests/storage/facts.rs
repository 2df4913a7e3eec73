//! Tests for the fact store.

use rulebook_foundation::{FactId, Type, Value};
use rulebook_storage::{Assertion, FactStore, SlotDef, Template};

fn store() -> FactStore {
    let mut store = FactStore::new();
    store
        .define_template(
            Template::new("point")
                .with_slot(SlotDef::single("x").with_type(Type::Int))
                .with_slot(SlotDef::single("y").with_type(Type::Int)),
        )
        .unwrap();
    store
}

fn point(store: &mut FactStore, x: i64, y: i64) -> FactId {
    store
        .assert_slots("point", &[("x", Value::Int(x)), ("y", Value::Int(y))])
        .unwrap()
        .id()
}

// =============================================================================
// Assertion
// =============================================================================

#[test]
fn ids_are_monotonic() {
    let mut store = store();
    let a = point(&mut store, 1, 2);
    let b = point(&mut store, 3, 4);
    assert!(b > a);
    assert_eq!(store.next_id(), FactId::new(b.index() + 1));
}

#[test]
fn ordered_fact_keeps_relation() {
    let mut store = store();
    let id = store
        .assert(None, vec![Value::symbol("color"), Value::symbol("red")])
        .unwrap()
        .id();
    let fact = store.get(id).unwrap();
    assert!(fact.is_ordered());
    assert_eq!(fact.relation(), Some("color"));
}

#[test]
fn empty_ordered_fact_is_rejected() {
    let mut store = store();
    assert!(store.assert(None, vec![]).unwrap_err().is_constraint());
}

#[test]
fn unknown_template_is_not_found() {
    let mut store = store();
    let err = store.assert(Some("nope"), vec![]).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn ill_typed_assertion_leaves_store_unchanged() {
    let mut store = store();
    let before = store.next_id();
    assert!(store
        .assert_slots("point", &[("x", Value::from("one"))])
        .is_err());
    assert!(store.is_empty());
    assert_eq!(store.next_id(), before);
}

// =============================================================================
// Duplicates
// =============================================================================

#[test]
fn duplicates_allowed_by_default() {
    let mut store = store();
    let a = point(&mut store, 1, 1);
    let b = point(&mut store, 1, 1);
    assert_ne!(a, b);
    assert_eq!(store.len(), 2);
}

#[test]
fn duplicate_suppression_returns_existing_id() {
    let mut store = FactStore::with_duplicates(false);
    let first = store.assert(None, vec![Value::symbol("a")]).unwrap();
    let second = store.assert(None, vec![Value::symbol("a")]).unwrap();
    assert!(matches!(first, Assertion::Asserted(_)));
    assert!(matches!(second, Assertion::Duplicate(id) if id == first.id()));
    assert_eq!(store.len(), 1);
}

#[test]
fn retracted_content_can_be_reasserted_without_duplicates() {
    let mut store = FactStore::with_duplicates(false);
    let id = store.assert(None, vec![Value::symbol("a")]).unwrap().id();
    store.retract(id).unwrap();
    let again = store.assert(None, vec![Value::symbol("a")]).unwrap();
    assert!(matches!(again, Assertion::Asserted(_)));
    assert_ne!(again.id(), id);
}

// =============================================================================
// Retraction and modification
// =============================================================================

#[test]
fn retract_returns_fact_and_removes_it() {
    let mut store = store();
    let id = point(&mut store, 5, 6);
    let fact = store.retract(id).unwrap();
    assert_eq!(fact.values, vec![Value::Int(5), Value::Int(6)]);
    assert!(!store.contains(id));
    assert!(store.retract(id).unwrap_err().is_not_found());
}

#[test]
fn modified_values_do_not_touch_the_fact() {
    let mut store = store();
    let id = point(&mut store, 1, 2);
    let values = store.modified_values(id, &[("y", Value::Int(9))]).unwrap();
    assert_eq!(values, vec![Value::Int(1), Value::Int(9)]);
    assert_eq!(store.get(id).unwrap().values[1], Value::Int(2));
}

#[test]
fn modified_values_validate_changes() {
    let mut store = store();
    let id = point(&mut store, 1, 2);
    assert!(store.modified_values(id, &[("z", Value::Int(0))]).is_err());
    assert!(store.modified_values(id, &[("y", Value::from("s"))]).is_err());
}

#[test]
fn ordered_facts_cannot_be_modified() {
    let mut store = store();
    let id = store.assert(None, vec![Value::symbol("a")]).unwrap().id();
    assert!(store.modified_values(id, &[("x", Value::Int(1))]).is_err());
}

// =============================================================================
// Queries and clearing
// =============================================================================

#[test]
fn facts_of_filters_by_template_in_id_order() {
    let mut store = store();
    let a = point(&mut store, 1, 1);
    store.assert(None, vec![Value::symbol("noise")]).unwrap();
    let b = point(&mut store, 2, 2);
    let ids: Vec<_> = store.facts_of("point").map(|f| f.id).collect();
    assert_eq!(ids, vec![a, b]);
}

#[test]
fn clear_facts_keeps_templates_and_ids_advance() {
    let mut store = store();
    let last = point(&mut store, 1, 1);
    store.clear_facts();
    assert!(store.is_empty());
    assert!(store.template("point").is_some());
    assert!(point(&mut store, 1, 1) > last);
}

#[test]
fn template_in_use_cannot_be_removed_or_changed() {
    let mut store = store();
    point(&mut store, 1, 1);
    assert!(store.undefine_template("point").is_err());
    let changed = Template::new("point").with_slot(SlotDef::single("x"));
    assert!(store.define_template(changed).is_err());
}

#[test]
fn identical_redefinition_is_accepted() {
    let mut store = store();
    point(&mut store, 1, 1);
    let same = Template::new("point")
        .with_slot(SlotDef::single("x").with_type(Type::Int))
        .with_slot(SlotDef::single("y").with_type(Type::Int));
    assert!(store.define_template(same).is_ok());
}
