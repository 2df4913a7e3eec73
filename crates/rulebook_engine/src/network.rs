//! Incremental pattern matching (Rete network).
//!
//! The network is two arenas addressed by index:
//!
//! - **Alpha nodes** hold the facts passing one [`AlphaKey`]. They are shared
//!   between every rule pattern with the same key and indexed by target, so
//!   a fact only visits alpha nodes that could accept it.
//! - **Rule nets** hold one join node per rule pattern. Each join node keeps
//!   the tokens (fact-id tuples plus bindings) that passed it; the last one
//!   keeps the rule's complete matches, which mirror its activations.
//!
//! Changes propagate synchronously and push activations onto the agenda as
//! a side effect.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use rulebook_foundation::FactId;
use rulebook_storage::{Fact, FactStore};
use tracing::trace;

use crate::agenda::{Activation, Agenda};
use crate::pattern::{AlphaKey, Bindings, CompiledPattern, PatternTarget};
use crate::rule::{CompiledRule, Rule};

// =============================================================================
// Tokens
// =============================================================================

/// A partial match: one entry per pattern matched so far.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    /// Matched facts; `None` where a negated pattern passed.
    pub facts: Vec<Option<FactId>>,
    /// Bindings accumulated along the way.
    pub bindings: Bindings,
}

impl Token {
    /// The empty match every rule starts from.
    #[must_use]
    pub fn root() -> Self {
        Self {
            facts: Vec::new(),
            bindings: Bindings::new(),
        }
    }

    fn extend(&self, fact: Option<FactId>, bindings: Bindings) -> Self {
        let mut facts = Vec::with_capacity(self.facts.len() + 1);
        facts.extend_from_slice(&self.facts);
        facts.push(fact);
        Self { facts, bindings }
    }

    fn has_prefix(&self, prefix: &[Option<FactId>]) -> bool {
        self.facts.len() > prefix.len() && self.facts[..prefix.len()] == *prefix
    }
}

// =============================================================================
// Nodes
// =============================================================================

/// Index of an alpha node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AlphaId(usize);

#[derive(Debug)]
struct AlphaNode {
    key: AlphaKey,
    memory: BTreeMap<FactId, Arc<Fact>>,
    /// (rule slot, level) pairs fed by this node.
    successors: Vec<(usize, usize)>,
}

#[derive(Debug)]
struct JoinNode {
    alpha: AlphaId,
    pattern: CompiledPattern,
    /// Tokens that passed this level (unused at the last level).
    memory: Vec<Token>,
}

#[derive(Debug)]
struct RuleNet {
    rule: Arc<Rule>,
    levels: Vec<JoinNode>,
    matches: Vec<Token>,
    root: [Token; 1],
}

impl RuleNet {
    fn left(&self, level: usize) -> &[Token] {
        match level.checked_sub(1) {
            None => &self.root,
            Some(parent) => &self.levels[parent].memory,
        }
    }

    fn output(&self, level: usize) -> &[Token] {
        if level + 1 == self.levels.len() {
            &self.matches
        } else {
            &self.levels[level].memory
        }
    }

    fn activation(&self, token: &Token) -> Activation {
        Activation::new(
            self.rule.name.clone(),
            self.rule.salience,
            token.facts.clone(),
            token.bindings.clone(),
        )
    }
}

/// Node and memory counts, for inspection and tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NetworkStats {
    /// Rules in the network.
    pub rules: usize,
    /// Live alpha nodes.
    pub alpha_nodes: usize,
    /// Join nodes across all rules.
    pub join_nodes: usize,
    /// Facts held across all alpha memories.
    pub alpha_facts: usize,
    /// Tokens held across all beta memories and match sets.
    pub tokens: usize,
}

// =============================================================================
// Network
// =============================================================================

/// The pattern-matching network.
#[derive(Debug, Default)]
pub struct ReteNetwork {
    alphas: Vec<Option<AlphaNode>>,
    alpha_index: HashMap<AlphaKey, AlphaId>,
    by_target: HashMap<PatternTarget, Vec<AlphaId>>,
    rules: Vec<Option<RuleNet>>,
    rule_index: HashMap<Arc<str>, usize>,
}

impl ReteNetwork {
    /// Creates an empty network.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a compiled rule, replacing any rule with the same name, and
    /// primes it against the facts already present.
    pub fn add_rule(&mut self, compiled: CompiledRule, facts: &FactStore, agenda: &mut Agenda) {
        let CompiledRule { rule, patterns } = compiled;
        self.remove_rule(&rule.name, agenda);

        let slot = match self.rules.iter().position(Option::is_none) {
            Some(free) => free,
            None => {
                self.rules.push(None);
                self.rules.len() - 1
            }
        };

        let mut levels = Vec::with_capacity(patterns.len());
        for (level, pattern) in patterns.into_iter().enumerate() {
            let alpha = self.alpha_for(&pattern.alpha, facts);
            if let Some(node) = self.alpha_mut(alpha) {
                node.successors.push((slot, level));
            }
            levels.push(JoinNode {
                alpha,
                pattern,
                memory: Vec::new(),
            });
        }

        trace!(rule = %rule.name, levels = levels.len(), "rule added to network");
        self.rule_index.insert(rule.name.clone(), slot);
        self.rules[slot] = Some(RuleNet {
            rule,
            levels,
            matches: Vec::new(),
            root: [Token::root()],
        });
        self.left_activate(slot, 0, Token::root(), agenda);
    }

    /// Removes a rule and its activations. Returns false if no rule has the
    /// name.
    pub fn remove_rule(&mut self, name: &str, agenda: &mut Agenda) -> bool {
        let Some(slot) = self.rule_index.remove(name) else {
            return false;
        };
        let Some(net) = self.rules.get_mut(slot).and_then(Option::take) else {
            return false;
        };
        agenda.remove_rule(name);

        for (level, join) in net.levels.iter().enumerate() {
            let orphaned = match self.alpha_mut(join.alpha) {
                Some(node) => {
                    node.successors.retain(|&s| s != (slot, level));
                    node.successors.is_empty()
                }
                None => false,
            };
            if orphaned {
                self.drop_alpha(join.alpha);
            }
        }
        trace!(rule = name, "rule removed from network");
        true
    }

    /// Returns true if a rule has the name.
    #[must_use]
    pub fn contains_rule(&self, name: &str) -> bool {
        self.rule_index.contains_key(name)
    }

    /// Propagates a newly asserted fact.
    pub fn assert_fact(&mut self, fact: &Arc<Fact>, agenda: &mut Agenda) {
        let Some(ids) = self.by_target.get(&PatternTarget::of(fact)) else {
            return;
        };

        let mut successors = Vec::new();
        for id in ids {
            if let Some(node) = self.alphas.get_mut(id.0).and_then(Option::as_mut) {
                if node.key.accepts(fact) {
                    node.memory.insert(fact.id, fact.clone());
                    successors.extend(node.successors.iter().copied());
                }
            }
        }

        // Within a rule, negated levels block first so no match is completed
        // and then withdrawn. Positive levels go deeper first, so a fact
        // feeding two of them is joined with itself exactly once.
        successors.sort_unstable_by_key(|&(slot, level)| {
            (slot, !self.is_negated(slot, level), Reverse(level))
        });
        for (slot, level) in successors {
            self.right_activate(slot, level, fact, agenda);
        }
    }

    /// Propagates a retraction: drops every token and activation that
    /// matched the fact, then re-checks negated patterns it was blocking.
    pub fn retract_fact(&mut self, fact: &Fact, agenda: &mut Agenda) {
        let Some(ids) = self.by_target.get(&PatternTarget::of(fact)) else {
            return;
        };

        let mut successors = Vec::new();
        for id in ids {
            if let Some(node) = self.alphas.get_mut(id.0).and_then(Option::as_mut) {
                if node.memory.remove(&fact.id).is_some() {
                    successors.extend(node.successors.iter().copied());
                }
            }
        }
        successors.sort_unstable();

        let mut slots: Vec<usize> = successors.iter().map(|&(slot, _)| slot).collect();
        slots.dedup();
        let matched = Some(fact.id);
        for slot in slots {
            self.remove_tokens(slot, 0, |t| t.facts.contains(&matched), agenda);
        }

        for (slot, level) in successors {
            if self.is_negated(slot, level) {
                self.unblock(slot, level, agenda);
            }
        }
    }

    /// Re-schedules a rule's complete matches that are not on the agenda.
    ///
    /// Returns the number scheduled, or `None` if no rule has the name.
    pub fn refresh(&self, name: &str, agenda: &mut Agenda) -> Option<usize> {
        let net = self.rule_net(*self.rule_index.get(name)?)?;
        Some(
            net.matches
                .iter()
                .filter_map(|token| agenda.insert(net.activation(token)))
                .count(),
        )
    }

    /// Returns a rule's complete matches.
    #[must_use]
    pub fn matches(&self, name: &str) -> Option<&[Token]> {
        let net = self.rule_net(*self.rule_index.get(name)?)?;
        Some(&net.matches)
    }

    /// Empties every memory and re-primes the rules, as after a reset.
    ///
    /// Rules whose first patterns are negated or that have no patterns are
    /// activated again.
    pub fn reset(&mut self, agenda: &mut Agenda) {
        for node in self.alphas.iter_mut().flatten() {
            node.memory.clear();
        }
        for net in self.rules.iter_mut().flatten() {
            net.matches.clear();
            for level in &mut net.levels {
                level.memory.clear();
            }
        }
        let mut slots: Vec<usize> = self.rule_index.values().copied().collect();
        slots.sort_unstable();
        for slot in slots {
            self.left_activate(slot, 0, Token::root(), agenda);
        }
    }

    /// Drops every rule and node.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Returns node and memory counts.
    #[must_use]
    pub fn stats(&self) -> NetworkStats {
        let mut stats = NetworkStats {
            rules: self.rule_index.len(),
            ..NetworkStats::default()
        };
        for node in self.alphas.iter().flatten() {
            stats.alpha_nodes += 1;
            stats.alpha_facts += node.memory.len();
        }
        for net in self.rules.iter().flatten() {
            stats.join_nodes += net.levels.len();
            stats.tokens += net.matches.len();
            stats.tokens += net.levels.iter().map(|l| l.memory.len()).sum::<usize>();
        }
        stats
    }

    // -------------------------------------------------------------------------
    // Alpha arena
    // -------------------------------------------------------------------------

    fn alpha(&self, id: AlphaId) -> Option<&AlphaNode> {
        self.alphas.get(id.0).and_then(Option::as_ref)
    }

    fn alpha_mut(&mut self, id: AlphaId) -> Option<&mut AlphaNode> {
        self.alphas.get_mut(id.0).and_then(Option::as_mut)
    }

    fn alpha_for(&mut self, key: &AlphaKey, facts: &FactStore) -> AlphaId {
        if let Some(&id) = self.alpha_index.get(key) {
            return id;
        }
        let memory = facts
            .all()
            .filter(|f| key.accepts(f))
            .map(|f| (f.id, f.clone()))
            .collect();
        let node = AlphaNode {
            key: key.clone(),
            memory,
            successors: Vec::new(),
        };
        let id = match self.alphas.iter().position(Option::is_none) {
            Some(free) => {
                self.alphas[free] = Some(node);
                AlphaId(free)
            }
            None => {
                self.alphas.push(Some(node));
                AlphaId(self.alphas.len() - 1)
            }
        };
        self.alpha_index.insert(key.clone(), id);
        self.by_target.entry(key.target.clone()).or_default().push(id);
        trace!(alpha = id.0, target = ?key.target, "alpha node created");
        id
    }

    fn drop_alpha(&mut self, id: AlphaId) {
        let Some(node) = self.alphas.get_mut(id.0).and_then(Option::take) else {
            return;
        };
        self.alpha_index.remove(&node.key);
        if let Some(ids) = self.by_target.get_mut(&node.key.target) {
            ids.retain(|&other| other != id);
            if ids.is_empty() {
                self.by_target.remove(&node.key.target);
            }
        }
        trace!(alpha = id.0, "alpha node dropped");
    }

    // -------------------------------------------------------------------------
    // Beta propagation
    // -------------------------------------------------------------------------

    fn rule_net(&self, slot: usize) -> Option<&RuleNet> {
        self.rules.get(slot).and_then(Option::as_ref)
    }

    fn is_negated(&self, slot: usize, level: usize) -> bool {
        self.rule_net(slot)
            .and_then(|net| net.levels.get(level))
            .is_some_and(|join| join.pattern.negated)
    }

    /// A new token reached `level` from above.
    fn left_activate(&mut self, slot: usize, level: usize, token: Token, agenda: &mut Agenda) {
        let Some(net) = self.rule_net(slot) else {
            return;
        };
        let Some(join) = net.levels.get(level) else {
            // Only reachable for rules without patterns.
            self.complete(slot, token, agenda);
            return;
        };
        let Some(alpha) = self.alpha(join.alpha) else {
            return;
        };

        if join.pattern.negated {
            let blocked = alpha
                .memory
                .values()
                .any(|f| join.pattern.join(&token.bindings, f).is_some());
            if !blocked {
                let passed = token.extend(None, token.bindings.clone());
                self.emit(slot, level, passed, agenda);
            }
        } else {
            let extended: Vec<Token> = alpha
                .memory
                .values()
                .filter_map(|f| {
                    join.pattern
                        .join(&token.bindings, f)
                        .map(|b| token.extend(Some(f.id), b))
                })
                .collect();
            for passed in extended {
                self.emit(slot, level, passed, agenda);
            }
        }
    }

    /// A new fact reached `level` from its alpha node.
    fn right_activate(&mut self, slot: usize, level: usize, fact: &Arc<Fact>, agenda: &mut Agenda) {
        let Some(net) = self.rule_net(slot) else {
            return;
        };
        let Some(join) = net.levels.get(level) else {
            return;
        };

        if join.pattern.negated {
            let blocked: Vec<Vec<Option<FactId>>> = net
                .output(level)
                .iter()
                .filter(|t| join.pattern.join(&t.bindings, fact).is_some())
                .map(|t| t.facts[..level].to_vec())
                .collect();
            for prefix in blocked {
                self.remove_tokens(slot, level, |t| t.has_prefix(&prefix), agenda);
            }
        } else {
            let extended: Vec<Token> = net
                .left(level)
                .iter()
                .filter_map(|t| {
                    join.pattern
                        .join(&t.bindings, fact)
                        .map(|b| t.extend(Some(fact.id), b))
                })
                .collect();
            for passed in extended {
                self.emit(slot, level, passed, agenda);
            }
        }
    }

    /// Passes left tokens through a negated level whose blocking fact left.
    fn unblock(&mut self, slot: usize, level: usize, agenda: &mut Agenda) {
        let Some(net) = self.rule_net(slot) else {
            return;
        };
        let Some(join) = net.levels.get(level) else {
            return;
        };
        let Some(alpha) = self.alpha(join.alpha) else {
            return;
        };

        let output = net.output(level);
        let freed: Vec<Token> = net
            .left(level)
            .iter()
            .filter(|left| !output.iter().any(|t| t.has_prefix(&left.facts)))
            .filter(|left| {
                !alpha
                    .memory
                    .values()
                    .any(|f| join.pattern.join(&left.bindings, f).is_some())
            })
            .map(|left| left.extend(None, left.bindings.clone()))
            .collect();
        for passed in freed {
            self.emit(slot, level, passed, agenda);
        }
    }

    /// Stores a token that passed `level` and sends it further down.
    fn emit(&mut self, slot: usize, level: usize, token: Token, agenda: &mut Agenda) {
        let Some(net) = self.rules.get_mut(slot).and_then(Option::as_mut) else {
            return;
        };
        if level + 1 >= net.levels.len() {
            self.complete(slot, token, agenda);
        } else {
            net.levels[level].memory.push(token.clone());
            self.left_activate(slot, level + 1, token, agenda);
        }
    }

    fn complete(&mut self, slot: usize, token: Token, agenda: &mut Agenda) {
        if let Some(net) = self.rules.get_mut(slot).and_then(Option::as_mut) {
            agenda.insert(net.activation(&token));
            net.matches.push(token);
        }
    }

    /// Drops tokens at `from` and below, and the activations of dropped
    /// complete matches.
    fn remove_tokens(
        &mut self,
        slot: usize,
        from: usize,
        doomed: impl Fn(&Token) -> bool,
        agenda: &mut Agenda,
    ) {
        let Some(net) = self.rules.get_mut(slot).and_then(Option::as_mut) else {
            return;
        };
        for level in net.levels.iter_mut().skip(from) {
            level.memory.retain(|t| !doomed(t));
        }
        let rule = net.rule.name.clone();
        net.matches.retain(|t| {
            if doomed(t) {
                agenda.remove(&rule, &t.facts);
                false
            } else {
                true
            }
        });
    }
}

// =============================================================================
// Tests
// =============================================================================
