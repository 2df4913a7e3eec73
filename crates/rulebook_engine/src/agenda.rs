//! The agenda: activations waiting to fire, in firing order.
//!
//! Order is salience descending, then the conflict-resolution strategy, then
//! activation id ascending. Every activation carries a precomputed sort key,
//! so switching strategy rebuilds the queue once and `pop` stays logarithmic.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rulebook_foundation::{Error, FactId, Result};

use crate::pattern::Bindings;

// =============================================================================
// Strategy
// =============================================================================

/// Conflict-resolution strategy among activations of equal salience.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Newest activation first.
    #[default]
    Depth,
    /// Oldest activation first.
    Breadth,
    /// Most recent facts first, compared tuple-wise.
    Lex,
    /// Most recent first-pattern fact first, then as `Lex`.
    Mea,
}

impl Strategy {
    /// All strategies, in declaration order.
    pub const ALL: [Self; 4] = [Self::Depth, Self::Breadth, Self::Lex, Self::Mea];

    /// Returns the strategy's name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Depth => "depth",
            Self::Breadth => "breadth",
            Self::Lex => "lex",
            Self::Mea => "mea",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Strategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.name() == s)
            .ok_or_else(|| Error::constraint(format!("unknown strategy: {s}")))
    }
}

// =============================================================================
// Activation
// =============================================================================

/// Identifier of an activation, increasing in creation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActivationId(u64);

impl ActivationId {
    /// Creates an activation id from its raw counter value.
    #[must_use]
    pub const fn new(index: u64) -> Self {
        Self(index)
    }

    /// Returns the raw counter value.
    #[must_use]
    pub fn index(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ActivationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a-{}", self.0)
    }
}

/// A rule instantiation ready to fire.
#[derive(Clone, Debug)]
pub struct Activation {
    /// Assigned when the activation is scheduled.
    pub id: ActivationId,
    /// Which rule
    pub rule: Arc<str>,
    /// Rule salience
    pub salience: i32,
    /// One entry per pattern; `None` for negated patterns
    pub facts: Vec<Option<FactId>>,
    /// Variable bindings from the match
    pub bindings: Bindings,
}

impl Activation {
    /// Creates an activation. Its id is assigned by [`Agenda::insert`].
    #[must_use]
    pub fn new(rule: Arc<str>, salience: i32, facts: Vec<Option<FactId>>, bindings: Bindings) -> Self {
        Self {
            id: ActivationId(0),
            rule,
            salience,
            facts,
            bindings,
        }
    }

    /// Returns true if any pattern matched the fact.
    #[must_use]
    pub fn references(&self, fact: FactId) -> bool {
        self.facts.contains(&Some(fact))
    }

    /// Matched fact ids, most recent first.
    #[must_use]
    pub fn recency(&self) -> Vec<FactId> {
        let mut ids: Vec<FactId> = self.facts.iter().flatten().copied().collect();
        ids.sort_unstable_by(|a, b| b.cmp(a));
        ids
    }

    fn key(&self) -> ActivationKey {
        (self.rule.clone(), self.facts.clone())
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<6} {}: ", self.salience, self.rule)?;
        for (i, fact) in self.facts.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            match fact {
                Some(id) => write!(f, "{id}")?,
                None => write!(f, "*")?,
            }
        }
        Ok(())
    }
}

type ActivationKey = (Arc<str>, Vec<Option<FactId>>);

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Rank {
    Newest(Reverse<ActivationId>),
    Oldest(ActivationId),
    Recent(Reverse<Vec<FactId>>),
    Means(Reverse<Option<FactId>>, Reverse<Vec<FactId>>),
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct OrderKey {
    salience: Reverse<i32>,
    rank: Rank,
    id: ActivationId,
}

impl OrderKey {
    fn of(activation: &Activation, strategy: Strategy) -> Self {
        let rank = match strategy {
            Strategy::Depth => Rank::Newest(Reverse(activation.id)),
            Strategy::Breadth => Rank::Oldest(activation.id),
            Strategy::Lex => Rank::Recent(Reverse(activation.recency())),
            Strategy::Mea => Rank::Means(
                Reverse(activation.facts.first().copied().flatten()),
                Reverse(activation.recency()),
            ),
        };
        Self {
            salience: Reverse(activation.salience),
            rank,
            id: activation.id,
        }
    }
}

// =============================================================================
// Agenda
// =============================================================================

/// A change to the agenda, journaled for event reporting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AgendaChange {
    /// An activation was scheduled.
    Added(ActivationId, Arc<str>),
    /// An activation was dropped before firing.
    Removed(ActivationId, Arc<str>),
}

/// Ordered set of pending activations.
#[derive(Debug, Default)]
pub struct Agenda {
    strategy: Strategy,
    queue: BTreeMap<OrderKey, Activation>,
    index: HashMap<ActivationKey, OrderKey>,
    next_id: u64,
    journal: Option<Vec<AgendaChange>>,
}

impl Agenda {
    /// Creates an empty agenda using the default strategy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty agenda with a strategy.
    #[must_use]
    pub fn with_strategy(strategy: Strategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    /// Returns the active strategy.
    #[must_use]
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Switches strategy and re-sorts pending activations.
    pub fn set_strategy(&mut self, strategy: Strategy) {
        if strategy == self.strategy {
            return;
        }
        self.strategy = strategy;
        let pending = std::mem::take(&mut self.queue);
        self.index.clear();
        for activation in pending.into_values() {
            let key = OrderKey::of(&activation, strategy);
            self.index.insert(activation.key(), key.clone());
            self.queue.insert(key, activation);
        }
    }

    /// Schedules an activation, assigning its id.
    ///
    /// Returns `None` if the same rule is already scheduled for the same fact
    /// tuple.
    pub fn insert(&mut self, mut activation: Activation) -> Option<ActivationId> {
        let key = activation.key();
        if self.index.contains_key(&key) {
            return None;
        }
        self.next_id += 1;
        activation.id = ActivationId(self.next_id);
        let id = activation.id;
        let order = OrderKey::of(&activation, self.strategy);
        if let Some(journal) = &mut self.journal {
            journal.push(AgendaChange::Added(id, activation.rule.clone()));
        }
        self.index.insert(key, order.clone());
        self.queue.insert(order, activation);
        Some(id)
    }

    /// Removes the activation of a rule for a fact tuple.
    pub fn remove(&mut self, rule: &str, facts: &[Option<FactId>]) -> Option<Activation> {
        let key: ActivationKey = (Arc::from(rule), facts.to_vec());
        let order = self.index.remove(&key)?;
        let activation = self.queue.remove(&order)?;
        self.record_removal(&activation);
        Some(activation)
    }

    /// Removes every activation of a rule. Returns how many were removed.
    pub fn remove_rule(&mut self, rule: &str) -> usize {
        self.remove_where(|a| &*a.rule == rule)
    }

    /// Removes every activation that matched a fact.
    pub fn remove_fact(&mut self, fact: FactId) -> usize {
        self.remove_where(|a| a.references(fact))
    }

    fn remove_where(&mut self, pred: impl Fn(&Activation) -> bool) -> usize {
        let doomed: Vec<OrderKey> = self
            .queue
            .iter()
            .filter(|(_, a)| pred(a))
            .map(|(k, _)| k.clone())
            .collect();
        for order in &doomed {
            if let Some(activation) = self.queue.remove(order) {
                self.index.remove(&activation.key());
                self.record_removal(&activation);
            }
        }
        doomed.len()
    }

    fn record_removal(&mut self, activation: &Activation) {
        if let Some(journal) = &mut self.journal {
            journal.push(AgendaChange::Removed(activation.id, activation.rule.clone()));
        }
    }

    /// Returns true if the rule is scheduled for the fact tuple.
    #[must_use]
    pub fn contains(&self, rule: &str, facts: &[Option<FactId>]) -> bool {
        let key: ActivationKey = (Arc::from(rule), facts.to_vec());
        self.index.contains_key(&key)
    }

    /// Returns the activation that would fire next.
    #[must_use]
    pub fn peek(&self) -> Option<&Activation> {
        self.queue.first_key_value().map(|(_, a)| a)
    }

    /// Removes and returns the activation that fires next.
    pub fn pop(&mut self) -> Option<Activation> {
        let (_, activation) = self.queue.pop_first()?;
        self.index.remove(&activation.key());
        Some(activation)
    }

    /// Iterates pending activations in firing order.
    pub fn iter(&self) -> impl Iterator<Item = &Activation> {
        self.queue.values()
    }

    /// Returns the number of pending activations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns true if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drops every pending activation without journaling.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.index.clear();
    }

    /// Turns change journaling on or off.
    pub fn set_journaling(&mut self, enabled: bool) {
        self.journal = enabled.then(Vec::new);
    }

    /// Takes the changes journaled since the last call.
    pub fn drain_changes(&mut self) -> Vec<AgendaChange> {
        self.journal.as_mut().map(std::mem::take).unwrap_or_default()
    }
}

// =============================================================================
// Tests
// =============================================================================
