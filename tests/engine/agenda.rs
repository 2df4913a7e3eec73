//! Tests for conflict resolution.

use rulebook_engine::{Action, EngineConfig, Environment, Expr, Pattern, Rule, SlotConstraint, Strategy};
use rulebook_foundation::Value;

use super::recorder;

fn item_rule(name: &str, salience: i32) -> Rule {
    Rule::new(name)
        .with_salience(salience)
        .when(Pattern::ordered([SlotConstraint::sym("item"), SlotConstraint::var("x")]))
        .then(Action::call("record", [Expr::var("x")]))
}

fn fire_order(strategy: Strategy, items: &[i64]) -> Vec<Value> {
    let mut env = Environment::with_config(EngineConfig::new().with_strategy(strategy));
    let seen = recorder(&mut env);
    env.define_rule(item_rule("r", 0)).unwrap();
    for &i in items {
        env.assert_ordered([Value::symbol("item"), Value::Int(i)]).unwrap();
    }
    env.run(None).unwrap();
    seen.lock().unwrap().clone()
}

fn ints(values: &[i64]) -> Vec<Value> {
    values.iter().copied().map(Value::Int).collect()
}

// =============================================================================
// Strategies
// =============================================================================

#[test]
fn depth_fires_newest_first() {
    assert_eq!(fire_order(Strategy::Depth, &[1, 2, 3]), ints(&[3, 2, 1]));
}

#[test]
fn breadth_fires_oldest_first() {
    assert_eq!(fire_order(Strategy::Breadth, &[1, 2, 3]), ints(&[1, 2, 3]));
}

#[test]
fn lex_prefers_recent_facts() {
    assert_eq!(fire_order(Strategy::Lex, &[1, 2, 3]), ints(&[3, 2, 1]));
}

#[test]
fn lex_compares_fact_tuples() {
    let mut env = Environment::with_config(EngineConfig::new().with_strategy(Strategy::Lex));
    let seen = recorder(&mut env);
    env.define_rule(
        Rule::new("pair")
            .when(Pattern::ordered([SlotConstraint::sym("a"), SlotConstraint::var("x")]))
            .when(Pattern::ordered([SlotConstraint::sym("b"), SlotConstraint::var("y")]))
            .then(Action::call("record", [Expr::List(vec![Expr::var("x"), Expr::var("y")])])),
    )
    .unwrap();
    env.assert_ordered([Value::symbol("a"), Value::Int(1)]).unwrap();
    env.assert_ordered([Value::symbol("b"), Value::Int(1)]).unwrap();
    env.assert_ordered([Value::symbol("a"), Value::Int(2)]).unwrap();

    env.run(None).unwrap();
    let seen = seen.lock().unwrap();
    // (a 2)(b 1) holds the newest fact, so it goes first.
    assert_eq!(seen[0], Value::list(ints(&[2, 1])));
    assert_eq!(seen[1], Value::list(ints(&[1, 1])));
}

#[test]
fn mea_prefers_recent_first_pattern() {
    let mut env = Environment::with_config(EngineConfig::new().with_strategy(Strategy::Mea));
    let seen = recorder(&mut env);
    env.define_rule(
        Rule::new("goal")
            .when(Pattern::ordered([SlotConstraint::sym("goal"), SlotConstraint::var("g")]))
            .when(Pattern::ordered([SlotConstraint::sym("data"), SlotConstraint::Any]))
            .then(Action::call("record", [Expr::var("g")])),
    )
    .unwrap();
    env.assert_ordered([Value::symbol("goal"), Value::Int(1)]).unwrap();
    env.assert_ordered([Value::symbol("goal"), Value::Int(2)]).unwrap();
    env.assert_ordered([Value::symbol("data"), Value::Int(0)]).unwrap();

    env.run(None).unwrap();
    assert_eq!(*seen.lock().unwrap(), ints(&[2, 1]));
}

// =============================================================================
// Salience
// =============================================================================

#[test]
fn salience_dominates_every_strategy() {
    for strategy in Strategy::ALL {
        let mut env = Environment::with_config(EngineConfig::new().with_strategy(strategy));
        let seen = recorder(&mut env);
        env.define_rule(item_rule("low", -5)).unwrap();
        env.define_rule(
            Rule::new("high")
                .with_salience(5)
                .when(Pattern::ordered([SlotConstraint::sym("item"), SlotConstraint::Any]))
                .then(Action::call("record", [Expr::sym("high")])),
        )
        .unwrap();
        env.assert_ordered([Value::symbol("item"), Value::Int(1)]).unwrap();
        env.run(None).unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![Value::symbol("high"), Value::Int(1)],
            "strategy {strategy}"
        );
    }
}

// =============================================================================
// Switching and bookkeeping
// =============================================================================

#[test]
fn switching_strategy_reorders_pending() {
    let mut env = Environment::new();
    let seen = recorder(&mut env);
    env.define_rule(item_rule("r", 0)).unwrap();
    for i in 1..=3 {
        env.assert_ordered([Value::symbol("item"), Value::Int(i)]).unwrap();
    }
    assert_eq!(env.strategy(), Strategy::Depth);
    env.set_strategy(Strategy::Breadth);
    assert_eq!(env.agenda().len(), 3);

    env.run(None).unwrap();
    assert_eq!(*seen.lock().unwrap(), ints(&[1, 2, 3]));
}

#[test]
fn strategy_names_parse() {
    for strategy in Strategy::ALL {
        assert_eq!(strategy.name().parse::<Strategy>().unwrap(), strategy);
    }
    assert!("random".parse::<Strategy>().is_err());
}

#[test]
fn fired_activation_is_not_rescheduled() {
    let mut env = Environment::new();
    recorder(&mut env);
    env.define_rule(item_rule("r", 0)).unwrap();
    env.assert_ordered([Value::symbol("item"), Value::Int(1)]).unwrap();
    assert_eq!(env.run(None).unwrap().fired, 1);
    assert!(env.agenda().is_empty());
}

#[test]
fn refresh_reschedules_fired_matches() {
    let mut env = Environment::new();
    let seen = recorder(&mut env);
    env.define_rule(item_rule("r", 0)).unwrap();
    env.assert_ordered([Value::symbol("item"), Value::Int(1)]).unwrap();
    env.run(None).unwrap();

    assert_eq!(env.refresh("r").unwrap(), 1);
    env.run(None).unwrap();
    assert_eq!(seen.lock().unwrap().len(), 2);
    assert!(env.refresh("missing").unwrap_err().is_not_found());
}

#[test]
fn activation_ids_increase() {
    let mut env = Environment::new();
    env.define_rule(
        Rule::new("r").when(Pattern::ordered([SlotConstraint::sym("item"), SlotConstraint::Any])),
    )
    .unwrap();
    env.assert_ordered([Value::symbol("item"), Value::Int(1)]).unwrap();
    env.assert_ordered([Value::symbol("item"), Value::Int(2)]).unwrap();

    let mut ids: Vec<_> = env.agenda().iter().map(|a| a.id).collect();
    ids.sort();
    assert!(ids[0] < ids[1]);
}
