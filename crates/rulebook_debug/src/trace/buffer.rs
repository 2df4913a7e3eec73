//! Bounded storage for trace records.

use std::collections::{HashMap, VecDeque};

use rulebook_engine::EngineEvent;

use super::record::TraceRecord;

/// Ring of the newest trace records, oldest first.
///
/// Record ids keep counting across evictions and [`clear`](Self::clear), so a
/// gap in ids shows how much was lost.
#[derive(Clone, Debug)]
pub struct TraceBuffer {
    records: VecDeque<TraceRecord>,
    capacity: usize,
    issued: u64,
}

impl TraceBuffer {
    /// A buffer holding at most `capacity` records. Zero keeps none.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            issued: 0,
        }
    }

    /// Stores `event` and returns its record id.
    pub fn push(&mut self, run: u64, timestamp_ns: u64, event: EngineEvent) -> u64 {
        let id = self.issued;
        self.issued += 1;
        if self.capacity > 0 {
            if self.records.len() == self.capacity {
                self.records.pop_front();
            }
            self.records.push_back(TraceRecord::new(id, run, timestamp_ns, event));
        }
        id
    }

    /// Returns the number of kept records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if nothing is kept.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drops every record. Ids keep increasing.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Iterates records, oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &TraceRecord> {
        self.records.iter()
    }

    /// Returns the newest record.
    #[must_use]
    pub fn last(&self) -> Option<&TraceRecord> {
        self.records.back()
    }

    /// The last `count` records, oldest first.
    #[must_use]
    pub fn recent(&self, count: usize) -> Vec<&TraceRecord> {
        let skip = self.records.len().saturating_sub(count);
        self.records.range(skip..).collect()
    }

    /// Records satisfying `keep`, in buffer order.
    pub fn filter(&self, keep: impl Fn(&TraceRecord) -> bool) -> Vec<&TraceRecord> {
        self.records.iter().filter(|r| keep(r)).collect()
    }

    /// Records tagged with `run`. Run 0 collects events outside any run.
    #[must_use]
    pub fn records_for_run(&self, run: u64) -> Vec<&TraceRecord> {
        self.filter(|r| r.run == run)
    }

    /// Returns records of one event type.
    #[must_use]
    pub fn by_event_type(&self, event_type: &str) -> Vec<&TraceRecord> {
        self.filter(|r| r.event_type() == event_type)
    }

    /// Records whose event names `rule`: firings, activations, and facts
    /// asserted or retracted by its actions.
    #[must_use]
    pub fn by_rule(&self, rule: &str) -> Vec<&TraceRecord> {
        self.filter(|r| rule_of(&r.event) == Some(rule))
    }

    /// Run tags in buffer order, with consecutive repeats collapsed.
    #[must_use]
    pub fn runs(&self) -> Vec<u64> {
        let mut runs: Vec<u64> = Vec::new();
        for record in &self.records {
            if runs.last() != Some(&record.run) {
                runs.push(record.run);
            }
        }
        runs
    }

    /// Summarizes the buffer.
    #[must_use]
    pub fn stats(&self) -> TraceBufferStats {
        let mut event_counts: HashMap<&'static str, usize> = HashMap::new();
        for record in &self.records {
            *event_counts.entry(record.event_type()).or_default() += 1;
        }
        TraceBufferStats {
            record_count: self.records.len(),
            max_size: self.capacity,
            oldest_run: self.records.front().map(|r| r.run),
            newest_run: self.records.back().map(|r| r.run),
            event_counts,
        }
    }
}

impl Default for TraceBuffer {
    fn default() -> Self {
        Self::new(super::DEFAULT_BUFFER_SIZE)
    }
}

fn rule_of(event: &EngineEvent) -> Option<&str> {
    match event {
        EngineEvent::FactAsserted { rule, .. }
        | EngineEvent::FactRetracted { rule, .. }
        | EngineEvent::CallbackFailed { rule, .. }
        | EngineEvent::Halted { rule } => rule.as_deref(),
        EngineEvent::ActivationAdded { rule, .. }
        | EngineEvent::ActivationRemoved { rule, .. }
        | EngineEvent::RuleFiring { rule, .. }
        | EngineEvent::RuleComplete { rule }
        | EngineEvent::RuleDefined { rule }
        | EngineEvent::RuleRemoved { rule } => Some(rule),
        EngineEvent::RunStart { .. }
        | EngineEvent::RunEnd { .. }
        | EngineEvent::Reset
        | EngineEvent::Cleared => None,
    }
}

/// Snapshot of a buffer's contents.
#[derive(Clone, Debug)]
pub struct TraceBufferStats {
    /// Records kept.
    pub record_count: usize,
    /// Capacity.
    pub max_size: usize,
    /// Run of the oldest record.
    pub oldest_run: Option<u64>,
    /// Run of the newest record.
    pub newest_run: Option<u64>,
    /// Kept records per event type name.
    pub event_counts: HashMap<&'static str, usize>,
}
