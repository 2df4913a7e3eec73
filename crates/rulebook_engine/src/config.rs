//! Engine configuration.

use crate::agenda::Strategy;

/// Configuration for an [`Environment`](crate::Environment).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Conflict-resolution strategy the agenda starts with.
    pub strategy: Strategy,
    /// Whether identical facts may be asserted more than once.
    pub fact_duplication: bool,
    /// Maximum rule firings in one run (kill switch). `None` is unbounded.
    pub activation_limit: Option<usize>,
    /// How many callback diagnostics to retain.
    pub diagnostics_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Depth,
            fact_duplication: true,
            activation_limit: None,
            diagnostics_capacity: 256,
        }
    }
}

impl EngineConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Builder method to allow or forbid duplicate facts.
    #[must_use]
    pub fn with_fact_duplication(mut self, allowed: bool) -> Self {
        self.fact_duplication = allowed;
        self
    }

    /// Builder method to set the activation limit.
    #[must_use]
    pub fn with_activation_limit(mut self, limit: usize) -> Self {
        self.activation_limit = Some(limit);
        self
    }

    /// Builder method to set the diagnostics capacity.
    #[must_use]
    pub fn with_diagnostics_capacity(mut self, capacity: usize) -> Self {
        self.diagnostics_capacity = capacity;
        self
    }
}
