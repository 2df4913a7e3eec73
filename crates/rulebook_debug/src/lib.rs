//! Execution tracing for Rulebook.
//!
//! This crate provides:
//! - [`Tracer`] - An event sink recording engine events
//! - [`TraceBuffer`] - Bounded storage for trace records
//! - [`HumanFormatter`] / [`JsonFormatter`] - Trace output formats

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod trace;

pub use trace::{
    HumanFormatter, JsonFormatter, TraceBuffer, TraceBufferStats, TraceFormatter, TraceHandle,
    TraceOutput, TraceRecord, Tracer, TracerConfig,
};
