//! Tests for user functions and failure containment.

use rulebook_engine::{Action, Expr, Pattern, Rule, StopReason};
use rulebook_foundation::{CallbackError, ErrorKind, Value};

use super::tasks;

fn calling(function: &str) -> Rule {
    Rule::new(format!("call-{function}"))
        .when(Pattern::template("task").bind("name", "n"))
        .then(Action::call_into("r", function, [Expr::var("n")]))
        .then(Action::assert_ordered([Expr::sym("result"), Expr::var("r")]))
}

#[test]
fn function_result_flows_into_facts() {
    let mut env = tasks();
    env.define_function("shout", |args| {
        let s = args.first().and_then(Value::as_str).unwrap_or_default();
        Ok(Value::from(s.to_uppercase()))
    });
    env.define_rule(calling("shout")).unwrap();
    env.assert_slots("task", &[("name", "ship".into())]).unwrap();
    env.run(None).unwrap();

    let result = env.facts().find(|f| f.relation() == Some("result")).unwrap();
    assert_eq!(result.values[1], Value::from("SHIP"));
}

#[test]
fn failing_function_does_not_stop_the_run() {
    let mut env = tasks();
    env.define_function("fail", |_| Err(CallbackError::new("IOError", "disk full")));
    env.define_rule(calling("fail")).unwrap();
    env.assert_slots("task", &[("name", "a".into())]).unwrap();
    env.assert_slots("task", &[("name", "b".into())]).unwrap();

    let outcome = env.run(None).unwrap();
    assert_eq!(outcome.fired, 2);
    assert_eq!(outcome.stop, StopReason::AgendaEmpty);

    let diagnostics = env.take_diagnostics();
    assert_eq!(diagnostics.len(), 2);
    assert_eq!(&*diagnostics[0].function, "fail");
    assert_eq!(diagnostics[0].rule.as_deref(), Some("call-fail"));
    let result = env.facts().find(|f| f.relation() == Some("result")).unwrap();
    assert_eq!(result.values[1], Value::from(diagnostics[0].message()));
}

#[test]
fn panicking_function_is_contained() {
    let mut env = tasks();
    env.define_function("boom", |_| panic!("kaboom"));
    env.define_rule(calling("boom")).unwrap();
    env.assert_slots("task", &[("name", "a".into())]).unwrap();

    assert_eq!(env.run(None).unwrap().fired, 1);
    let diagnostic = env.diagnostics().next().unwrap();
    assert!(diagnostic.message().contains("kaboom"));
}

#[test]
fn unknown_function_in_rule_yields_diagnostic() {
    let mut env = tasks();
    env.define_rule(calling("missing")).unwrap();
    env.assert_slots("task", &[("name", "a".into())]).unwrap();

    assert_eq!(env.run(None).unwrap().fired, 1);
    assert_eq!(env.diagnostics().count(), 1);
}

#[test]
fn host_call_propagates_failure() {
    let mut env = tasks();
    env.define_function("fail", |_| Err(CallbackError::msg("nope")));

    let err = env.call_function("fail", &[]).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Callback(_)));
    assert!(env.call_function("missing", &[]).unwrap_err().is_not_found());
}

#[test]
fn undefined_function_is_gone() {
    let mut env = tasks();
    env.define_function("f", |_| Ok(Value::nil()));
    assert!(env.undefine_function("f"));
    assert!(!env.has_function("f"));
    assert!(!env.undefine_function("f"));
}
