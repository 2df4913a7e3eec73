//! Engine events and the sink that receives them.
//!
//! The environment reports every working-memory change, agenda change and
//! rule firing to an optional [`EventSink`]. Without a sink no events are
//! built at all.

use std::sync::Arc;

use rulebook_foundation::{CallbackError, FactId};
use rulebook_storage::Fact;

use crate::agenda::ActivationId;
use crate::executor::StopReason;

/// Something observable that happened inside an environment.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    /// A run started.
    RunStart {
        /// Run number, counting from 1 per environment.
        run: u64,
    },

    /// A run ended.
    RunEnd {
        /// Run number.
        run: u64,
        /// Rules fired during the run.
        fired: usize,
        /// Why the run stopped, or `None` if it failed with an error.
        stop: Option<StopReason>,
    },

    /// A fact entered working memory.
    FactAsserted {
        /// The new fact.
        fact: Arc<Fact>,
        /// The rule whose action asserted it, if any.
        rule: Option<Arc<str>>,
    },

    /// A fact left working memory.
    FactRetracted {
        /// The removed fact.
        fact: Arc<Fact>,
        /// The rule whose action retracted it, if any.
        rule: Option<Arc<str>>,
    },

    /// An activation was placed on the agenda.
    ActivationAdded {
        /// The activation.
        activation: ActivationId,
        /// Its rule.
        rule: Arc<str>,
    },

    /// An activation left the agenda without firing.
    ActivationRemoved {
        /// The activation.
        activation: ActivationId,
        /// Its rule.
        rule: Arc<str>,
    },

    /// A rule is about to execute its actions.
    RuleFiring {
        /// The rule.
        rule: Arc<str>,
        /// The activation being fired.
        activation: ActivationId,
        /// Facts matched by the rule's patterns.
        facts: Vec<Option<FactId>>,
    },

    /// A rule finished executing its actions.
    RuleComplete {
        /// The rule.
        rule: Arc<str>,
    },

    /// A user function failed and its failure was contained.
    CallbackFailed {
        /// Function name.
        function: Arc<str>,
        /// The failure.
        error: CallbackError,
        /// The rule calling it, if any.
        rule: Option<Arc<str>>,
    },

    /// A rule was defined or replaced.
    RuleDefined {
        /// The rule.
        rule: Arc<str>,
    },

    /// A rule was removed.
    RuleRemoved {
        /// The rule.
        rule: Arc<str>,
    },

    /// A halt was requested.
    Halted {
        /// The rule requesting it, or `None` for a host request.
        rule: Option<Arc<str>>,
    },

    /// The environment was reset.
    Reset,

    /// The environment was cleared.
    Cleared,
}

impl EngineEvent {
    /// Returns a short name for the event type.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::RunStart { .. } => "run-start",
            Self::RunEnd { .. } => "run-end",
            Self::FactAsserted { .. } => "fact-asserted",
            Self::FactRetracted { .. } => "fact-retracted",
            Self::ActivationAdded { .. } => "activation-added",
            Self::ActivationRemoved { .. } => "activation-removed",
            Self::RuleFiring { .. } => "rule-firing",
            Self::RuleComplete { .. } => "rule-complete",
            Self::CallbackFailed { .. } => "callback-failed",
            Self::RuleDefined { .. } => "rule-defined",
            Self::RuleRemoved { .. } => "rule-removed",
            Self::Halted { .. } => "halted",
            Self::Reset => "reset",
            Self::Cleared => "cleared",
        }
    }

    /// Returns true for run boundaries.
    #[must_use]
    pub fn is_run_boundary(&self) -> bool {
        matches!(self, Self::RunStart { .. } | Self::RunEnd { .. })
    }

    /// Returns true for working-memory changes.
    #[must_use]
    pub fn is_fact_event(&self) -> bool {
        matches!(self, Self::FactAsserted { .. } | Self::FactRetracted { .. })
    }

    /// Returns true for agenda and firing events.
    #[must_use]
    pub fn is_rule_event(&self) -> bool {
        matches!(
            self,
            Self::ActivationAdded { .. }
                | Self::ActivationRemoved { .. }
                | Self::RuleFiring { .. }
                | Self::RuleComplete { .. }
        )
    }
}

/// Receives engine events.
pub trait EventSink: Send {
    /// Handles one event.
    fn record(&mut self, event: &EngineEvent);
}

/// Collects events into a vector.
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    /// Recorded events, oldest first.
    pub events: Vec<EngineEvent>,
}

impl EventSink for EventLog {
    fn record(&mut self, event: &EngineEvent) {
        self.events.push(event.clone());
    }
}
