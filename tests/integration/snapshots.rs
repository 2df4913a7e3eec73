//! Tests for capturing and restoring working memory.

use std::path::PathBuf;

use rulebook_engine::{Environment, Pattern, Rule};
use rulebook_foundation::{ErrorKind, Value};
use rulebook_storage::{SlotDef, Template};
use rulebook_runtime::{Snapshot, from_bytes, load_from_file, save_to_file, to_bytes};

use super::tasks;

fn populated() -> Environment {
    let mut env = tasks();
    env.define_global("version", Value::Int(7));
    env.assert_slots("task", &[("name", "a".into()), ("priority", Value::Int(2))])
        .unwrap();
    env.assert_slots("task", &[("name", "b".into())]).unwrap();
    env.assert_ordered([Value::symbol("note"), Value::from("hi")])
        .unwrap();
    env
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("rulebook-{}-{name}.rbs", std::process::id()))
}

fn contents(env: &Environment) -> Vec<(Option<String>, Vec<Value>)> {
    env.facts()
        .map(|f| (f.template.as_deref().map(str::to_string), f.values.clone()))
        .collect()
}

#[test]
fn bytes_round_trip_into_fresh_environment() {
    let source = populated();
    let bytes = to_bytes(&Snapshot::capture(&source)).unwrap();

    let mut target = Environment::new();
    let ids = from_bytes(&bytes).unwrap().restore(&mut target).unwrap();
    assert_eq!(ids.len(), 3);
    assert_eq!(contents(&target), contents(&source));
    assert_eq!(target.global("version").unwrap(), &Value::Int(7));
    assert!(target.template("task").is_some());
}

#[test]
fn restore_activates_existing_rules() {
    let source = populated();
    let snapshot = Snapshot::capture(&source);

    let mut target = tasks();
    target
        .define_rule(Rule::new("any-task").when(Pattern::template("task")))
        .unwrap();
    snapshot.restore(&mut target).unwrap();
    assert_eq!(target.agenda().len(), 2);
}

#[test]
fn restore_replaces_working_memory() {
    let snapshot = Snapshot::capture(&populated());
    let mut target = tasks();
    target
        .assert_slots("task", &[("name", "stale".into())])
        .unwrap();
    snapshot.restore(&mut target).unwrap();
    assert_eq!(target.fact_count(), 3);
    assert!(target
        .facts()
        .all(|f| f.values.first() != Some(&Value::from("stale"))));
}

#[test]
fn failed_restore_leaves_working_memory_alone() {
    let mut source = Environment::new();
    source
        .define_template(Template::new("t").with_slot(SlotDef::single("b")))
        .unwrap();
    source.assert_fact(Some("t"), vec![Value::Int(1)]).unwrap();
    let snapshot = Snapshot::capture(&source);

    let mut target = Environment::new();
    target
        .define_template(Template::new("t").with_slot(SlotDef::single("a")))
        .unwrap();
    target
        .define_rule(Rule::new("r").when(Pattern::template("t")))
        .unwrap();
    target.define_global("version", Value::Int(1));
    let kept = target.assert_ordered([Value::symbol("keep")]).unwrap();

    let err = snapshot.restore(&mut target).unwrap_err();
    assert!(err.is_constraint());
    assert_eq!(err.operation(), Some("restore"));
    assert_eq!(target.fact_count(), 1);
    assert!(target.fact(kept).is_ok());
    assert_eq!(target.template("t").unwrap().slots[0].name.as_ref(), "a");
    assert_eq!(target.global("version").unwrap(), &Value::Int(1));
}

#[test]
fn unsupported_version_is_rejected() {
    let mut snapshot = Snapshot::capture(&populated());
    snapshot.version = 99;
    let err = snapshot.restore(&mut Environment::new()).unwrap_err();
    assert!(err.is_constraint());
}

#[test]
fn garbage_bytes_fail_to_decode() {
    let err = from_bytes(&[0xc1, 0x00, 0x13]).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::SerializationError(_)));
}

#[test]
fn file_round_trip() {
    let path = temp_path("round-trip");
    let source = populated();
    save_to_file(&source, &path).unwrap();

    let mut target = Environment::new();
    load_from_file(&mut target, &path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(contents(&target), contents(&source));
}

#[test]
fn missing_file_is_an_io_error() {
    let err = load_from_file(&mut Environment::new(), temp_path("missing")).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::IoError(_)));
}
