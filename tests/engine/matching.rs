//! Tests for pattern matching through the network.

use std::sync::{Arc, Mutex};

use rulebook_engine::{
    Action, CompareOp, EngineEvent, EventLog, EventSink, Expr, Pattern, Rule, SlotConstraint,
};
use rulebook_foundation::Value;

use super::household;

fn owns_pet() -> Rule {
    Rule::new("owns-pet")
        .when(Pattern::template("person").bind("name", "n"))
        .when(Pattern::template("pet").bind("owner", "n"))
}

// =============================================================================
// Single patterns
// =============================================================================

#[test]
fn literal_constraint_filters_facts() {
    let mut env = household();
    env.define_rule(
        Rule::new("red").when(Pattern::ordered([
            SlotConstraint::sym("color"),
            SlotConstraint::sym("red"),
        ])),
    )
    .unwrap();

    env.assert_ordered([Value::symbol("color"), Value::symbol("blue")])
        .unwrap();
    assert!(env.agenda().is_empty());
    env.assert_ordered([Value::symbol("color"), Value::symbol("red")])
        .unwrap();
    assert_eq!(env.agenda().len(), 1);
}

#[test]
fn ordered_pattern_requires_exact_length() {
    let mut env = household();
    env.define_rule(Rule::new("pair").when(Pattern::ordered([
        SlotConstraint::sym("pair"),
        SlotConstraint::Any,
    ])))
    .unwrap();

    env.assert_ordered([Value::symbol("pair"), Value::Int(1), Value::Int(2)])
        .unwrap();
    assert!(env.agenda().is_empty());
}

#[test]
fn comparison_against_constant() {
    let mut env = household();
    env.define_rule(
        Rule::new("adult").when(
            Pattern::template("person").slot("age", SlotConstraint::cmp(CompareOp::Ge, 18)),
        ),
    )
    .unwrap();

    env.assert_slots("person", &[("name", "kid".into()), ("age", Value::Int(9))])
        .unwrap();
    env.assert_slots("person", &[("name", "ada".into()), ("age", Value::Int(36))])
        .unwrap();
    assert_eq!(env.agenda().len(), 1);
}

#[test]
fn equality_comparison_is_numeric() {
    let mut env = household();
    let cases = [
        ("eq", SlotConstraint::cmp(CompareOp::Eq, 2)),
        ("ne", SlotConstraint::cmp(CompareOp::Ne, 2)),
        ("le", SlotConstraint::cmp(CompareOp::Le, 2)),
        ("ge", SlotConstraint::cmp(CompareOp::Ge, 2)),
        ("literal", SlotConstraint::lit(2)),
    ];
    for (name, constraint) in cases {
        env.define_rule(
            Rule::new(name).when(Pattern::ordered([SlotConstraint::sym("n"), constraint])),
        )
        .unwrap();
    }

    env.assert_ordered([Value::symbol("n"), Value::Float(2.0)])
        .unwrap();
    let mut matched: Vec<&str> = env.agenda().iter().map(|a| a.rule.as_ref()).collect();
    matched.sort_unstable();
    assert_eq!(matched, vec!["eq", "ge", "le"]);
}

#[test]
fn rule_defined_after_facts_sees_them() {
    let mut env = household();
    env.assert_slots("person", &[("name", "ada".into())]).unwrap();
    env.assert_slots("pet", &[("name", "rex".into()), ("owner", "ada".into())])
        .unwrap();
    env.define_rule(owns_pet()).unwrap();
    assert_eq!(env.agenda().len(), 1);
}

// =============================================================================
// Joins
// =============================================================================

#[test]
fn shared_variable_joins_patterns() {
    let mut env = household();
    env.define_rule(owns_pet()).unwrap();

    env.assert_slots("person", &[("name", "ada".into())]).unwrap();
    env.assert_slots("pet", &[("name", "rex".into()), ("owner", "ada".into())])
        .unwrap();
    assert_eq!(env.agenda().len(), 1);
}

#[test]
fn mismatched_join_produces_nothing() {
    let mut env = household();
    env.define_rule(owns_pet()).unwrap();

    env.assert_slots("person", &[("name", "ada".into())]).unwrap();
    env.assert_slots("pet", &[("name", "rex".into()), ("owner", "bob".into())])
        .unwrap();
    assert!(env.agenda().is_empty());
}

#[test]
fn join_bindings_reach_the_activation() {
    let mut env = household();
    env.define_rule(owns_pet()).unwrap();
    let person = env.assert_slots("person", &[("name", "ada".into())]).unwrap();
    let pet = env
        .assert_slots("pet", &[("name", "rex".into()), ("owner", "ada".into())])
        .unwrap();

    let activation = env.agenda().peek().unwrap();
    assert_eq!(activation.facts, vec![Some(person), Some(pet)]);
    assert_eq!(activation.bindings.get("n"), Some(&Value::from("ada")));
}

#[test]
fn variable_comparison_across_patterns() {
    let mut env = household();
    env.define_rule(
        Rule::new("older")
            .when(Pattern::template("person").bind("age", "a"))
            .when(Pattern::template("person").slot("age", SlotConstraint::cmp_var(CompareOp::Gt, "a"))),
    )
    .unwrap();

    for age in [10, 20, 30] {
        env.assert_slots("person", &[("age", Value::Int(age))]).unwrap();
    }
    // (10,20) (10,30) (20,30)
    assert_eq!(env.agenda().len(), 3);
}

#[test]
fn retract_removes_dependent_activations() {
    let mut env = household();
    env.define_rule(owns_pet()).unwrap();
    let ada = env.assert_slots("person", &[("name", "ada".into())]).unwrap();
    env.assert_slots("pet", &[("name", "rex".into()), ("owner", "ada".into())])
        .unwrap();
    env.assert_slots("pet", &[("name", "tom".into()), ("owner", "ada".into())])
        .unwrap();
    assert_eq!(env.agenda().len(), 2);

    env.retract(ada).unwrap();
    assert!(env.agenda().is_empty());
    assert_eq!(env.network_stats().tokens, 0);
}

// =============================================================================
// Negation
// =============================================================================

fn petless() -> Rule {
    Rule::new("petless")
        .when(Pattern::template("person").bind("name", "n"))
        .when(Pattern::template("pet").bind("owner", "n").negated())
}

#[test]
fn negated_pattern_matches_absence() {
    let mut env = household();
    env.define_rule(petless()).unwrap();
    env.assert_slots("person", &[("name", "ada".into())]).unwrap();

    let activation = env.agenda().peek().unwrap();
    assert_eq!(activation.facts.len(), 2);
    assert_eq!(activation.facts[1], None);
}

#[test]
fn blocking_fact_removes_and_restores_activation() {
    let mut env = household();
    env.define_rule(petless()).unwrap();
    env.assert_slots("person", &[("name", "ada".into())]).unwrap();

    let rex = env
        .assert_slots("pet", &[("name", "rex".into()), ("owner", "ada".into())])
        .unwrap();
    assert!(env.agenda().is_empty());

    env.retract(rex).unwrap();
    assert_eq!(env.agenda().len(), 1);
}

#[test]
fn unrelated_fact_does_not_block() {
    let mut env = household();
    env.define_rule(petless()).unwrap();
    env.assert_slots("person", &[("name", "ada".into())]).unwrap();
    env.assert_slots("pet", &[("name", "rex".into()), ("owner", "bob".into())])
        .unwrap();
    assert_eq!(env.agenda().len(), 1);
}

struct SharedLog(Arc<Mutex<EventLog>>);

impl EventSink for SharedLog {
    fn record(&mut self, event: &EngineEvent) {
        self.0.lock().unwrap().record(event);
    }
}

#[test]
fn blocked_match_is_never_scheduled() {
    let mut env = household();
    env.define_rule(
        Rule::new("lonely")
            .when(Pattern::ordered([SlotConstraint::sym("a"), SlotConstraint::var("x")]))
            .when(
                Pattern::ordered([SlotConstraint::sym("b"), SlotConstraint::var("x")]).negated(),
            )
            .when(Pattern::ordered([SlotConstraint::sym("b"), SlotConstraint::var("y")])),
    )
    .unwrap();
    env.assert_ordered([Value::symbol("a"), Value::Int(1)])
        .unwrap();

    let log = Arc::new(Mutex::new(EventLog::default()));
    env.set_event_sink(Box::new(SharedLog(log.clone())));
    env.assert_ordered([Value::symbol("b"), Value::Int(1)])
        .unwrap();

    let types: Vec<&str> = log
        .lock()
        .unwrap()
        .events
        .iter()
        .map(EngineEvent::event_type)
        .collect();
    assert_eq!(types, vec!["fact-asserted"]);
    assert!(env.agenda().is_empty());
}

// =============================================================================
// Firing and sharing
// =============================================================================

#[test]
fn modify_in_rule_reactivates_until_test_fails() {
    let mut env = household();
    env.define_rule(
        Rule::new("grow")
            .when(
                Pattern::template("person")
                    .bind("age", "a")
                    .slot("age", SlotConstraint::cmp(CompareOp::Lt, 3))
                    .as_fact("p"),
            )
            .then(Action::modify(
                "p",
                [("age", Expr::call("inc", [Expr::var("a")]))],
            )),
    )
    .unwrap();
    env.define_function("inc", |args| {
        let n = args.first().and_then(Value::as_int).unwrap_or(0);
        Ok(Value::Int(n + 1))
    });
    env.assert_slots("person", &[("name", "ada".into())]).unwrap();

    let outcome = env.run(None).unwrap();
    assert_eq!(outcome.fired, 3);
    let person = env.facts_of("person").next().unwrap();
    assert_eq!(person.values[1], Value::Int(3));
}

#[test]
fn identical_patterns_share_alpha_nodes() {
    let mut env = household();
    env.define_rule(Rule::new("a").when(Pattern::template("person").eq("name", "ada")))
        .unwrap();
    env.define_rule(Rule::new("b").when(Pattern::template("person").eq("name", "ada")))
        .unwrap();

    let stats = env.network_stats();
    assert_eq!(stats.rules, 2);
    assert_eq!(stats.alpha_nodes, 1);
    assert_eq!(stats.join_nodes, 2);
}

#[test]
fn undefining_rule_releases_nodes() {
    let mut env = household();
    env.define_rule(owns_pet()).unwrap();
    env.assert_slots("person", &[("name", "ada".into())]).unwrap();
    env.undefine_rule("owns-pet").unwrap();

    let stats = env.network_stats();
    assert_eq!(stats.rules, 0);
    assert_eq!(stats.alpha_nodes, 0);
    assert!(env.agenda().is_empty());
}

#[test]
fn zero_pattern_rule_activates_once() {
    let mut env = household();
    env.define_rule(Rule::new("boot")).unwrap();
    assert_eq!(env.agenda().len(), 1);
    env.assert_slots("person", &[("name", "ada".into())]).unwrap();
    assert_eq!(env.agenda().len(), 1);
    assert_eq!(env.run(None).unwrap().fired, 1);
    assert_eq!(env.run(None).unwrap().fired, 0);
}
