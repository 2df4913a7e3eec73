//! Rendering trace records as text.
//!
//! [`HumanFormatter`] produces the watch-style lines a user reads while rules
//! fire. [`JsonFormatter`] produces one JSON object per record for tools.

use std::fmt::Write;
use std::time::Duration;

use rulebook_engine::EngineEvent;
use rulebook_foundation::{FactId, Value};
use rulebook_storage::Fact;

use super::record::TraceRecord;

/// Turns a [`TraceRecord`] into a line of output.
pub trait TraceFormatter {
    /// Renders one record.
    fn format(&self, record: &TraceRecord) -> String;

    /// Renders `records` in order. The default joins single lines with `\n`.
    fn format_many(&self, records: &[&TraceRecord]) -> String {
        let mut out = String::new();
        for (i, record) in records.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(&self.format(record));
        }
        out
    }
}

/// Watch-style text such as `R0001   FIRE a-4 greet: f-1,f-2`.
///
/// Every line starts with the run tag. Record ids and elapsed time are opt-in
/// prefixes.
#[derive(Clone, Debug, Default)]
pub struct HumanFormatter {
    /// Print elapsed time since the tracer started.
    pub show_timestamps: bool,
    /// Print record ids.
    pub show_ids: bool,
}

impl HumanFormatter {
    /// Creates a formatter with ids and timestamps off.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefix each line with time since the tracer started.
    #[must_use]
    pub fn with_timestamps(self) -> Self {
        Self { show_timestamps: true, ..self }
    }

    /// Prefix each line with its zero-padded record id.
    #[must_use]
    pub fn with_ids(self) -> Self {
        Self { show_ids: true, ..self }
    }

    fn elapsed(ns: u64) -> String {
        let elapsed = Duration::from_nanos(ns);
        if elapsed >= Duration::from_secs(1) {
            format!("{:.3}s", elapsed.as_secs_f64())
        } else if elapsed >= Duration::from_millis(1) {
            format!("{:.3}ms", elapsed.as_secs_f64() * 1e3)
        } else {
            format!("{}us", elapsed.as_micros())
        }
    }

    fn by_rule(rule: Option<&str>) -> String {
        rule.map(|r| format!(" ({r})")).unwrap_or_default()
    }

    fn fact_tuple(facts: &[Option<FactId>]) -> String {
        let ids: Vec<String> = facts
            .iter()
            .map(|f| f.map_or_else(|| "-".to_string(), |id| id.to_string()))
            .collect();
        ids.join(",")
    }
}

impl TraceFormatter for HumanFormatter {
    fn format(&self, record: &TraceRecord) -> String {
        let mut line = String::new();
        if self.show_ids {
            let _ = write!(line, "[{:06}] ", record.id);
        }
        let _ = write!(line, "R{:04} ", record.run);
        if self.show_timestamps {
            let _ = write!(line, "{:>10} ", Self::elapsed(record.timestamp_ns));
        }

        let text = match &record.event {
            EngineEvent::RunStart { run } => format!("=== RUN {run} START ==="),
            EngineEvent::RunEnd { run, fired, stop } => match stop {
                Some(stop) => format!("=== RUN {run} END ({fired} fired, {stop}) ==="),
                None => format!("=== RUN {run} END ({fired} fired, FAILED) ==="),
            },
            EngineEvent::FactAsserted { fact, rule } => {
                format!("    ==>{} {fact}", Self::by_rule(rule.as_deref()))
            }
            EngineEvent::FactRetracted { fact, rule } => {
                format!("    <=={} {fact}", Self::by_rule(rule.as_deref()))
            }
            EngineEvent::ActivationAdded { activation, rule } => {
                format!("  ==> ACTIVATION {activation} {rule}")
            }
            EngineEvent::ActivationRemoved { activation, rule } => {
                format!("  <== ACTIVATION {activation} {rule}")
            }
            EngineEvent::RuleFiring {
                rule,
                activation,
                facts,
            } => format!("  FIRE {activation} {rule}: {}", Self::fact_tuple(facts)),
            EngineEvent::RuleComplete { rule } => format!("  COMPLETE {rule}"),
            EngineEvent::CallbackFailed {
                function,
                error,
                rule,
            } => format!(
                "    CALLBACK{} {function} FAILED: {error}",
                Self::by_rule(rule.as_deref())
            ),
            EngineEvent::RuleDefined { rule } => format!("DEFRULE {rule}"),
            EngineEvent::RuleRemoved { rule } => format!("UNDEFRULE {rule}"),
            EngineEvent::Halted { rule } => {
                format!("HALT{}", Self::by_rule(rule.as_deref()))
            }
            EngineEvent::Reset => "RESET".to_string(),
            EngineEvent::Cleared => "CLEAR".to_string(),
        };
        line.push_str(&text);
        line
    }
}

/// One compact JSON object per record.
///
/// Every object has `id`, `run`, `timestamp_ns` and `type`; the remaining
/// keys depend on the event. Non-finite floats are written as strings.
#[derive(Clone, Debug, Default)]
pub struct JsonFormatter {
    /// In `format_many`, put each object on its own indented line.
    pub pretty: bool,
}

impl JsonFormatter {
    /// Creates a compact formatter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Puts each object of `format_many` on its own line.
    #[must_use]
    pub fn pretty(self) -> Self {
        Self { pretty: true }
    }

    fn escape_string(s: &str) -> String {
        let mut out = String::with_capacity(s.len());
        for c in s.chars() {
            match c {
                '\\' => out.push_str("\\\\"),
                '"' => out.push_str("\\\""),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                c if u32::from(c) < 0x20 => {
                    let _ = write!(out, "\\u{:04x}", u32::from(c));
                }
                c => out.push(c),
            }
        }
        out
    }

    fn string(s: &str) -> String {
        format!("\"{}\"", Self::escape_string(s))
    }

    fn format_value(value: &Value) -> String {
        match value {
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) if f.is_finite() => format!("{f:?}"),
            Value::Float(f) if f.is_nan() => Self::string("NaN"),
            Value::Float(f) => Self::string(if *f > 0.0 { "Infinity" } else { "-Infinity" }),
            Value::String(s) | Value::Symbol(s) => Self::string(s),
            Value::List(items) => {
                let items: Vec<String> = items.iter().map(Self::format_value).collect();
                format!("[{}]", items.join(","))
            }
        }
    }

    fn format_fact(fact: &Fact) -> String {
        let template = fact
            .template
            .as_deref()
            .map_or_else(|| "null".to_string(), Self::string);
        let values: Vec<String> = fact.values.iter().map(Self::format_value).collect();
        format!(
            "{{\"id\":{},\"template\":{template},\"values\":[{}]}}",
            fact.id.index(),
            values.join(",")
        )
    }

    fn rule_field(rule: Option<&str>) -> String {
        rule.map(|r| format!(",\"rule\":{}", Self::string(r)))
            .unwrap_or_default()
    }
}

impl TraceFormatter for JsonFormatter {
    fn format(&self, record: &TraceRecord) -> String {
        let event_data = match &record.event {
            EngineEvent::RunStart { run } => format!(",\"run_number\":{run}"),
            EngineEvent::RunEnd { run, fired, stop } => {
                let stop = stop.map_or_else(|| "null".to_string(), |s| Self::string(&s.to_string()));
                format!(",\"run_number\":{run},\"fired\":{fired},\"stop\":{stop}")
            }
            EngineEvent::FactAsserted { fact, rule } | EngineEvent::FactRetracted { fact, rule } => {
                format!(
                    ",\"fact\":{}{}",
                    Self::format_fact(fact),
                    Self::rule_field(rule.as_deref())
                )
            }
            EngineEvent::ActivationAdded { activation, rule }
            | EngineEvent::ActivationRemoved { activation, rule } => format!(
                ",\"activation\":{},\"rule\":{}",
                activation.index(),
                Self::string(rule)
            ),
            EngineEvent::RuleFiring {
                rule,
                activation,
                facts,
            } => {
                let facts: Vec<String> = facts
                    .iter()
                    .map(|f| f.map_or_else(|| "null".to_string(), |id| id.index().to_string()))
                    .collect();
                format!(
                    ",\"activation\":{},\"rule\":{},\"facts\":[{}]",
                    activation.index(),
                    Self::string(rule),
                    facts.join(",")
                )
            }
            EngineEvent::RuleComplete { rule }
            | EngineEvent::RuleDefined { rule }
            | EngineEvent::RuleRemoved { rule } => format!(",\"rule\":{}", Self::string(rule)),
            EngineEvent::CallbackFailed {
                function,
                error,
                rule,
            } => format!(
                ",\"function\":{},\"error_kind\":{},\"message\":{}{}",
                Self::string(function),
                Self::string(&error.kind),
                Self::string(&error.message),
                Self::rule_field(rule.as_deref())
            ),
            EngineEvent::Halted { rule } => Self::rule_field(rule.as_deref()),
            EngineEvent::Reset | EngineEvent::Cleared => String::new(),
        };

        format!(
            "{{\"id\":{},\"run\":{},\"timestamp_ns\":{},\"type\":\"{}\"{}}}",
            record.id,
            record.run,
            record.timestamp_ns,
            record.event_type(),
            event_data
        )
    }

    fn format_many(&self, records: &[&TraceRecord]) -> String {
        let objects: Vec<_> = records.iter().map(|r| self.format(r)).collect();
        match (self.pretty, objects.is_empty()) {
            (_, true) => "[]".to_string(),
            (true, false) => format!("[\n  {}\n]", objects.join(",\n  ")),
            (false, false) => format!("[{}]", objects.join(",")),
        }
    }
}
