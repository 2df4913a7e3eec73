//! Watching an environment as it works.
//!
//! [`Tracer`] implements [`EventSink`]. Installed on an environment, it keeps
//! the most recent engine events in a [`TraceBuffer`], tagging each with the
//! run it happened in, and can echo every kept record to stderr as it
//! arrives. While disabled it drops events after a single flag check.
//!
//! ```
//! use rulebook_debug::{TraceHandle, TracerConfig};
//! use rulebook_engine::Environment;
//!
//! let mut env = Environment::new();
//! let trace = TraceHandle::new(TracerConfig::new().enabled());
//! trace.attach(&mut env);
//! env.run(None).unwrap();
//! assert_eq!(trace.with(|t| t.buffer().len()), 2);
//! ```

pub mod buffer;
pub mod format;
pub mod record;

pub use buffer::{TraceBuffer, TraceBufferStats};
pub use format::{HumanFormatter, JsonFormatter, TraceFormatter};
pub use record::TraceRecord;

use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use rulebook_engine::{EngineEvent, Environment, EventSink};

/// Records kept when no size is configured.
pub const DEFAULT_BUFFER_SIZE: usize = 10_000;

/// Echo destination for records as they are kept.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TraceOutput {
    /// Keep records in the buffer only.
    #[default]
    None,
    /// Also write each record to stderr, one per line.
    Stderr,
}

/// Settings for a [`Tracer`]. Starts disabled.
#[derive(Clone, Debug)]
pub struct TracerConfig {
    /// Record events at all.
    pub enabled: bool,
    /// Capacity of the ring; older records are evicted first.
    pub buffer_size: usize,
    /// Where kept records are echoed.
    pub output: TraceOutput,
    /// Render echoed records as JSON lines instead of text.
    pub json_format: bool,
    /// Event type names to keep, such as `"rule-firing"`. Empty keeps all.
    pub event_filter: Vec<String>,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            buffer_size: DEFAULT_BUFFER_SIZE,
            output: TraceOutput::None,
            json_format: false,
            event_filter: Vec::new(),
        }
    }
}

impl TracerConfig {
    /// Creates a disabled configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Turns recording on.
    #[must_use]
    pub fn enabled(self) -> Self {
        Self { enabled: true, ..self }
    }

    /// Sets the ring capacity.
    #[must_use]
    pub fn with_buffer_size(self, buffer_size: usize) -> Self {
        Self { buffer_size, ..self }
    }

    /// Echo every kept record to stderr.
    #[must_use]
    pub fn to_stderr(self) -> Self {
        Self { output: TraceOutput::Stderr, ..self }
    }

    /// Formats records as JSON.
    #[must_use]
    pub fn json(self) -> Self {
        Self { json_format: true, ..self }
    }

    /// Keep only events whose type name is listed.
    #[must_use]
    pub fn filter_events<S: Into<String>>(self, types: impl IntoIterator<Item = S>) -> Self {
        Self {
            event_filter: types.into_iter().map(Into::into).collect(),
            ..self
        }
    }

    fn keeps(&self, event_type: &str) -> bool {
        self.event_filter.is_empty() || self.event_filter.iter().any(|t| t == event_type)
    }
}

/// An event sink that remembers what the engine did.
#[derive(Debug)]
pub struct Tracer {
    config: TracerConfig,
    buffer: TraceBuffer,
    /// Run number from the last `run-start`, cleared by `run-end`.
    run: u64,
    epoch: Instant,
    human: HumanFormatter,
    json: JsonFormatter,
}

impl Tracer {
    /// Creates a tracer.
    #[must_use]
    pub fn new(config: TracerConfig) -> Self {
        Self {
            buffer: TraceBuffer::new(config.buffer_size),
            config,
            run: 0,
            epoch: Instant::now(),
            human: HumanFormatter::new().with_timestamps(),
            json: JsonFormatter::new(),
        }
    }

    /// Returns true if events are recorded.
    #[must_use]
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Starts recording.
    pub fn enable(&mut self) {
        self.config.enabled = true;
    }

    /// Stops recording; kept records stay.
    pub fn disable(&mut self) {
        self.config.enabled = false;
    }

    /// The settings in effect. Changes apply to the next event.
    #[must_use]
    pub fn config(&self) -> &TracerConfig {
        &self.config
    }

    /// Mutable access to the settings. `buffer_size` is fixed at creation.
    pub fn config_mut(&mut self) -> &mut TracerConfig {
        &mut self.config
    }

    /// The run in progress, or 0 between runs.
    #[must_use]
    pub fn current_run(&self) -> u64 {
        self.run
    }

    /// Keeps `event` if tracing is on and the filter allows it.
    #[inline]
    pub fn record(&mut self, event: &EngineEvent) {
        if self.config.enabled {
            self.observe(event);
        }
    }

    fn observe(&mut self, event: &EngineEvent) {
        if let EngineEvent::RunStart { run } = event {
            self.run = *run;
        }

        if self.config.keeps(event.event_type()) {
            let elapsed = u64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(u64::MAX);
            self.buffer.push(self.run, elapsed, event.clone());
            if self.config.output == TraceOutput::Stderr {
                self.echo();
            }
        }

        if matches!(event, EngineEvent::RunEnd { .. }) {
            self.run = 0;
        }
    }

    fn echo(&self) {
        if let Some(record) = self.buffer.last() {
            // A closed stderr is not worth failing a run over.
            let _ = writeln!(std::io::stderr().lock(), "{}", self.format_record(record));
        }
    }

    fn formatter(&self) -> &dyn TraceFormatter {
        if self.config.json_format { &self.json } else { &self.human }
    }

    /// Renders one record in the configured format.
    #[must_use]
    pub fn format_record(&self, record: &TraceRecord) -> String {
        self.formatter().format(record)
    }

    /// Renders several records in the configured format.
    #[must_use]
    pub fn format_records(&self, records: &[&TraceRecord]) -> String {
        self.formatter().format_many(records)
    }

    /// Returns the kept records.
    #[must_use]
    pub fn buffer(&self) -> &TraceBuffer {
        &self.buffer
    }

    /// Drops every kept record. Record ids continue from where they were.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Summarizes the kept records.
    #[must_use]
    pub fn stats(&self) -> TraceBufferStats {
        self.buffer.stats()
    }
}

impl Default for Tracer {
    fn default() -> Self {
        Self::new(TracerConfig::default())
    }
}

impl EventSink for Tracer {
    fn record(&mut self, event: &EngineEvent) {
        Tracer::record(self, event);
    }
}

/// A [`Tracer`] the host can read while an environment owns a clone of it.
#[derive(Clone, Debug, Default)]
pub struct TraceHandle(Arc<Mutex<Tracer>>);

impl TraceHandle {
    /// Creates a shared tracer.
    #[must_use]
    pub fn new(config: TracerConfig) -> Self {
        Self(Arc::new(Mutex::new(Tracer::new(config))))
    }

    /// Makes this tracer `env`'s event sink, replacing any previous one.
    pub fn attach(&self, env: &mut Environment) {
        env.set_event_sink(Box::new(self.clone()));
    }

    fn lock(&self) -> MutexGuard<'_, Tracer> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reads the tracer.
    pub fn with<R>(&self, f: impl FnOnce(&Tracer) -> R) -> R {
        f(&self.lock())
    }

    /// Changes the tracer, e.g. to clear its buffer between runs.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut Tracer) -> R) -> R {
        f(&mut self.lock())
    }
}

impl EventSink for TraceHandle {
    fn record(&mut self, event: &EngineEvent) {
        self.with_mut(|tracer| tracer.record(event));
    }
}
