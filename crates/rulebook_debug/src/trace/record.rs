//! One kept engine event.

use rulebook_engine::EngineEvent;

/// An [`EngineEvent`] stamped with where and when it was seen.
#[derive(Clone, Debug, PartialEq)]
pub struct TraceRecord {
    /// Sequence number from the owning buffer, starting at 0.
    pub id: u64,
    /// Run the event happened in. Events between runs carry 0.
    pub run: u64,
    /// Nanoseconds since the tracer was created.
    pub timestamp_ns: u64,
    /// The engine event.
    pub event: EngineEvent,
}

impl TraceRecord {
    /// Creates a record.
    #[must_use]
    pub fn new(id: u64, run: u64, timestamp_ns: u64, event: EngineEvent) -> Self {
        Self { id, run, timestamp_ns, event }
    }

    /// Kebab-case name of the wrapped event, e.g. `"fact-asserted"`.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        self.event.event_type()
    }
}
