//! Rete matching, agenda, and the execution loop for Rulebook.
//!
//! This crate provides:
//! - [`Environment`] - An engine instance owning facts, rules, and functions
//! - [`Rule`] / [`Pattern`] / [`Action`] - The rule authoring model
//! - [`ReteNetwork`] - Incremental pattern matching
//! - [`Agenda`] - Conflict resolution under a [`Strategy`]
//! - [`EngineEvent`] / [`EventSink`] - Observation hooks for tracing

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod agenda;
pub mod config;
pub mod environment;
pub mod event;
pub mod executor;
pub mod function;
pub mod network;
pub mod pattern;
pub mod rule;

pub use agenda::{Activation, ActivationId, Agenda, AgendaChange, Strategy};
pub use config::EngineConfig;
pub use environment::{Environment, FactSpec};
pub use event::{EngineEvent, EventLog, EventSink};
pub use executor::{Diagnostic, ExecutionState, RunOutcome, StopReason};
pub use function::{FunctionRegistry, UserFunction};
pub use network::{NetworkStats, ReteNetwork, Token};
pub use pattern::{Bindings, CompareOp, Pattern, PatternTarget, SlotConstraint, SlotKey, Term, TestOp};
pub use rule::{Action, CompiledRule, Expr, MAX_SALIENCE, MIN_SALIENCE, Rule, RuleCompiler};
