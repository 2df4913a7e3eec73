//! Tests for execution tracing attached to an environment.

use rulebook_debug::{HumanFormatter, JsonFormatter, TraceFormatter, TraceHandle, TracerConfig};
use rulebook_engine::{Action, EngineEvent, Pattern, Rule};

use super::tasks;

fn traced_run(config: TracerConfig) -> TraceHandle {
    let handle = TraceHandle::new(config);
    let mut env = tasks();
    handle.attach(&mut env);
    env.define_rule(
        Rule::new("finish")
            .when(Pattern::template("task").as_fact("t"))
            .then(Action::retract("t")),
    )
    .unwrap();
    env.assert_slots("task", &[("name", "a".into())]).unwrap();
    env.run(None).unwrap();
    handle
}

#[test]
fn trace_records_a_full_run() {
    let handle = traced_run(TracerConfig::new().enabled());
    let types: Vec<&str> = handle.with(|t| {
        t.buffer()
            .iter()
            .map(|r| r.event.event_type())
            .collect()
    });
    assert_eq!(
        types,
        vec![
            "rule-defined",
            "fact-asserted",
            "activation-added",
            "run-start",
            "rule-firing",
            "fact-retracted",
            "rule-complete",
            "run-end",
        ]
    );
}

#[test]
fn records_inside_a_run_carry_its_number() {
    let handle = traced_run(TracerConfig::new().enabled());
    handle.with(|t| {
        let buffer = t.buffer();
        assert_eq!(buffer.runs(), vec![0, 1]);
        assert_eq!(buffer.records_for_run(1).len(), 5);
        assert_eq!(buffer.records_for_run(0).len(), 3);
        assert_eq!(t.current_run(), 0);
    });
}

#[test]
fn retraction_names_the_rule() {
    let handle = traced_run(TracerConfig::new().enabled());
    handle.with(|t| {
        let retracted = t.buffer().by_event_type("fact-retracted");
        assert_eq!(retracted.len(), 1);
        assert!(matches!(
            &retracted[0].event,
            EngineEvent::FactRetracted { rule: Some(rule), .. } if &**rule == "finish"
        ));
        assert!(t.buffer().by_rule("finish").len() >= 4);
    });
}

#[test]
fn event_filter_keeps_only_requested_types() {
    let handle = traced_run(TracerConfig::new().enabled().filter_events(["rule-firing"]));
    handle.with(|t| {
        assert_eq!(t.buffer().len(), 1);
        assert_eq!(t.stats().record_count, 1);
    });
}

#[test]
fn disabled_tracer_records_nothing() {
    let handle = traced_run(TracerConfig::new());
    handle.with(|t| assert!(t.buffer().is_empty()));
}

#[test]
fn buffer_evicts_oldest_records() {
    let handle = traced_run(TracerConfig::new().enabled().with_buffer_size(2));
    handle.with(|t| {
        let types: Vec<_> = t.buffer().iter().map(|r| r.event.event_type()).collect();
        assert_eq!(types, vec!["rule-complete", "run-end"]);
    });
}

#[test]
fn formatters_render_records() {
    let handle = traced_run(TracerConfig::new().enabled());
    handle.with(|t| {
        let firing = t.buffer().by_event_type("rule-firing")[0];
        let human = HumanFormatter::new().format(firing);
        assert!(human.contains("FIRE"));
        assert!(human.contains("finish"));

        let json = JsonFormatter::new().format(firing);
        assert!(json.starts_with('{'));
        assert!(json.contains("\"type\":\"rule-firing\""));
    });
}
