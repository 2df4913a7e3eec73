//! The environment: owner of every engine component.
//!
//! An [`Environment`] holds the fact store, rule registry, Rete network,
//! agenda, user functions, globals and deffacts. Nothing is shared between
//! environments; every handle (fact ids, rule names) is resolved through the
//! environment that issued it.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use rulebook_foundation::{CallbackError, Error, FactId, Missing, Result, Value};
use rulebook_storage::{Assertion, Fact, FactStore, Template};
use tracing::{debug, info};

use crate::agenda::{Agenda, AgendaChange, Strategy};
use crate::config::EngineConfig;
use crate::event::{EngineEvent, EventSink};
use crate::executor::{Diagnostic, ExecutionState};
use crate::function::FunctionRegistry;
use crate::network::{NetworkStats, ReteNetwork};
use crate::rule::{Rule, RuleCompiler};

// =============================================================================
// Deffacts and Globals
// =============================================================================

/// A fact asserted on every reset.
#[derive(Clone, Debug, PartialEq)]
pub enum FactSpec {
    /// An ordered fact.
    Ordered(Vec<Value>),
    /// A templated fact from named slots; omitted slots take defaults.
    Template {
        /// Template name.
        name: Arc<str>,
        /// Slot assignments.
        slots: Vec<(Arc<str>, Value)>,
    },
}

impl FactSpec {
    /// An ordered fact.
    #[must_use]
    pub fn ordered(values: impl IntoIterator<Item = Value>) -> Self {
        Self::Ordered(values.into_iter().collect())
    }

    /// A templated fact.
    #[must_use]
    pub fn template<S: AsRef<str>>(
        name: impl AsRef<str>,
        slots: impl IntoIterator<Item = (S, Value)>,
    ) -> Self {
        Self::Template {
            name: Arc::from(name.as_ref()),
            slots: slots
                .into_iter()
                .map(|(slot, value)| (Arc::from(slot.as_ref()), value))
                .collect(),
        }
    }
}

#[derive(Clone, Debug)]
struct Global {
    initial: Value,
    current: Value,
}

// =============================================================================
// Environment
// =============================================================================

/// A rule engine instance.
pub struct Environment {
    pub(crate) config: EngineConfig,
    pub(crate) facts: FactStore,
    pub(crate) rules: BTreeMap<Arc<str>, Arc<Rule>>,
    pub(crate) network: ReteNetwork,
    pub(crate) agenda: Agenda,
    pub(crate) functions: FunctionRegistry,
    globals: BTreeMap<Arc<str>, Global>,
    deffacts: BTreeMap<Arc<str>, Vec<FactSpec>>,
    pub(crate) state: ExecutionState,
    pub(crate) halt_pending: bool,
    pub(crate) runs: u64,
    pub(crate) diagnostics: VecDeque<Diagnostic>,
    sink: Option<Box<dyn EventSink>>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("state", &self.state)
            .field("facts", &self.facts.len())
            .field("rules", &self.rules.len())
            .field("agenda", &self.agenda.len())
            .field("functions", &self.functions)
            .finish_non_exhaustive()
    }
}

impl Environment {
    /// Creates an environment with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Creates an environment with a configuration.
    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        let mut agenda = Agenda::with_strategy(config.strategy);
        agenda.set_journaling(true);
        info!(strategy = %config.strategy, duplicates = config.fact_duplication, "environment created");
        Self {
            facts: FactStore::with_duplicates(config.fact_duplication),
            rules: BTreeMap::new(),
            network: ReteNetwork::new(),
            agenda,
            functions: FunctionRegistry::new(),
            globals: BTreeMap::new(),
            deffacts: BTreeMap::new(),
            state: ExecutionState::Idle,
            halt_pending: false,
            runs: 0,
            diagnostics: VecDeque::new(),
            sink: None,
            config,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the execution state.
    #[must_use]
    pub fn state(&self) -> ExecutionState {
        self.state
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Clears working memory and the agenda, restores globals, and asserts
    /// every deffacts group. Templates, rules and functions are kept.
    ///
    /// # Errors
    /// Returns an error if a deffacts entry no longer fits its template.
    pub fn reset(&mut self) -> Result<()> {
        self.agenda.clear();
        self.facts.clear_facts();
        self.network.reset(&mut self.agenda);
        for global in self.globals.values_mut() {
            global.current = global.initial.clone();
        }
        self.state = ExecutionState::Idle;
        self.halt_pending = false;
        info!(deffacts = self.deffacts.len(), "environment reset");
        self.emit(|| EngineEvent::Reset);
        self.flush_agenda();

        let specs: Vec<FactSpec> = self.deffacts.values().flatten().cloned().collect();
        for spec in specs {
            self.assert_spec(&spec).map_err(|e| e.in_operation("reset"))?;
        }
        Ok(())
    }

    /// Drops everything except user functions and the event sink.
    pub fn clear(&mut self) {
        self.agenda.clear();
        self.agenda.drain_changes();
        self.facts.clear();
        self.rules.clear();
        self.network.clear();
        self.globals.clear();
        self.deffacts.clear();
        self.diagnostics.clear();
        self.state = ExecutionState::Idle;
        self.halt_pending = false;
        info!("environment cleared");
        self.emit(|| EngineEvent::Cleared);
    }

    /// Consumes the environment, releasing everything it owns.
    pub fn destroy(self) {
        info!(facts = self.facts.len(), rules = self.rules.len(), "environment destroyed");
    }

    /// Requests a halt. The environment stays halted until `reset` or
    /// `clear`.
    pub fn halt(&mut self) {
        if self.state == ExecutionState::Running {
            self.halt_pending = true;
        } else {
            self.state = ExecutionState::Halted;
        }
        info!("halt requested by host");
        self.emit(|| EngineEvent::Halted { rule: None });
    }

    // -------------------------------------------------------------------------
    // Templates
    // -------------------------------------------------------------------------

    /// Defines or replaces a template.
    ///
    /// # Errors
    /// Returns a constraint error if the template is malformed, or if it
    /// would change a template that facts or rules still use.
    pub fn define_template(&mut self, template: Template) -> Result<()> {
        self.check_template(&template)
            .map_err(|e| e.in_operation("define_template"))?;
        self.facts
            .define_template(template)
            .map(|_| ())
            .map_err(|e| e.in_operation("define_template"))
    }

    /// Checks that a template is well formed and that no rule depends on a
    /// different definition under the same name. Facts still using the old
    /// definition are only checked by `define_template`.
    ///
    /// # Errors
    /// Returns a constraint error for a malformed template or one whose
    /// change a rule would observe.
    pub fn check_template(&self, template: &Template) -> Result<()> {
        template.validate()?;
        let Some(existing) = self.facts.template(&template.name) else {
            return Ok(());
        };
        if **existing == *template {
            return Ok(());
        }
        match self.rules.values().find(|r| r.uses_template(&template.name)) {
            Some(rule) => Err(Error::constraint(format!(
                "template {} is in use by rule {}",
                template.name, rule.name
            ))),
            None => Ok(()),
        }
    }

    /// Removes a template.
    ///
    /// # Errors
    /// Returns not-found for an unknown name and a constraint error if
    /// facts or rules still use it.
    pub fn undefine_template(&mut self, name: &str) -> Result<()> {
        if let Some(rule) = self.rules.values().find(|r| r.uses_template(name)) {
            return Err(Error::constraint(format!(
                "template {name} is in use by rule {}",
                rule.name
            ))
            .in_operation("undefine_template"));
        }
        self.facts
            .undefine_template(name)
            .map_err(|e| e.in_operation("undefine_template"))
    }

    /// Returns a template by name.
    #[must_use]
    pub fn template(&self, name: &str) -> Option<&Arc<Template>> {
        self.facts.template(name)
    }

    /// Iterates templates in name order.
    pub fn templates(&self) -> impl Iterator<Item = &Arc<Template>> {
        self.facts.templates()
    }

    // -------------------------------------------------------------------------
    // Facts
    // -------------------------------------------------------------------------

    /// Asserts a fact from positional values.
    ///
    /// With fact duplication disabled, asserting a fact identical to one in
    /// working memory returns the existing id and changes nothing.
    ///
    /// # Errors
    /// Returns not-found for an unknown template and a constraint error for
    /// values that violate it.
    pub fn assert_fact(&mut self, template: Option<&str>, values: Vec<Value>) -> Result<FactId> {
        self.insert_fact(template, values, None)
            .map_err(|e| e.in_operation("assert"))
    }

    /// Asserts an ordered fact.
    ///
    /// # Errors
    /// Returns a constraint error if `values` is empty.
    pub fn assert_ordered(&mut self, values: impl IntoIterator<Item = Value>) -> Result<FactId> {
        self.assert_fact(None, values.into_iter().collect())
    }

    /// Asserts a templated fact from named slots, filling the rest from
    /// defaults.
    ///
    /// # Errors
    /// Returns not-found for an unknown template and a constraint error for
    /// unknown, missing-required or ill-typed slots.
    pub fn assert_slots(&mut self, template: &str, slots: &[(&str, Value)]) -> Result<FactId> {
        let result = self
            .facts
            .require_template(template)
            .and_then(|t| t.resolve_slots(slots));
        result
            .and_then(|values| self.insert_fact(Some(template), values, None))
            .map_err(|e| e.in_operation("assert"))
    }

    /// Retracts a fact, returning it.
    ///
    /// # Errors
    /// Returns not-found if the fact is not in working memory.
    pub fn retract(&mut self, id: FactId) -> Result<Arc<Fact>> {
        self.remove_fact(id, None)
            .map_err(|e| e.in_operation("retract"))
    }

    /// Replaces a templated fact with a copy whose named slots are changed.
    /// The replacement has a new id.
    ///
    /// # Errors
    /// Returns not-found for an unknown fact and a constraint error for an
    /// ordered fact or an invalid change. The original is kept on error.
    pub fn modify(&mut self, id: FactId, changes: &[(&str, Value)]) -> Result<FactId> {
        self.replace_fact(id, changes, None)
            .map_err(|e| e.in_operation("modify"))
    }

    /// Asserts a copy of a templated fact with some slots changed, keeping
    /// the original.
    ///
    /// # Errors
    /// Returns not-found for an unknown fact and a constraint error for an
    /// ordered fact or an invalid change.
    pub fn duplicate(&mut self, id: FactId, changes: &[(&str, Value)]) -> Result<FactId> {
        let result = self.facts.modified_values(id, changes).and_then(|values| {
            let template = self.facts.get(id)?.template.clone();
            self.insert_fact(template.as_deref(), values, None)
        });
        result.map_err(|e| e.in_operation("duplicate"))
    }

    /// Returns a fact by id.
    ///
    /// # Errors
    /// Returns not-found if the fact is not in working memory.
    pub fn fact(&self, id: FactId) -> Result<&Arc<Fact>> {
        self.facts.get(id)
    }

    /// Iterates facts in id order.
    pub fn facts(&self) -> impl Iterator<Item = &Arc<Fact>> {
        self.facts.all()
    }

    /// Iterates the facts of one template in id order.
    pub fn facts_of<'a>(&'a self, template: &'a str) -> impl Iterator<Item = &'a Arc<Fact>> + 'a {
        self.facts.facts_of(template)
    }

    /// Returns the number of facts in working memory.
    #[must_use]
    pub fn fact_count(&self) -> usize {
        self.facts.len()
    }

    pub(crate) fn insert_fact(
        &mut self,
        template: Option<&str>,
        values: Vec<Value>,
        rule: Option<&Arc<str>>,
    ) -> Result<FactId> {
        match self.facts.assert(template, values)? {
            Assertion::Asserted(fact) => {
                self.emit(|| EngineEvent::FactAsserted {
                    fact: fact.clone(),
                    rule: rule.cloned(),
                });
                self.network.assert_fact(&fact, &mut self.agenda);
                self.flush_agenda();
                Ok(fact.id)
            }
            Assertion::Duplicate(id) => {
                debug!(fact = %id, "duplicate assertion ignored");
                Ok(id)
            }
        }
    }

    pub(crate) fn remove_fact(&mut self, id: FactId, rule: Option<&Arc<str>>) -> Result<Arc<Fact>> {
        let fact = self.facts.retract(id)?;
        self.emit(|| EngineEvent::FactRetracted {
            fact: fact.clone(),
            rule: rule.cloned(),
        });
        self.network.retract_fact(&fact, &mut self.agenda);
        self.flush_agenda();
        Ok(fact)
    }

    pub(crate) fn replace_fact(
        &mut self,
        id: FactId,
        changes: &[(&str, Value)],
        rule: Option<&Arc<str>>,
    ) -> Result<FactId> {
        let values = self.facts.modified_values(id, changes)?;
        let fact = self.remove_fact(id, rule)?;
        self.insert_fact(fact.template.as_deref(), values, rule)
    }

    fn assert_spec(&mut self, spec: &FactSpec) -> Result<FactId> {
        match spec {
            FactSpec::Ordered(values) => self.insert_fact(None, values.clone(), None),
            FactSpec::Template { name, slots } => {
                let assigned: Vec<(&str, Value)> =
                    slots.iter().map(|(s, v)| (s.as_ref(), v.clone())).collect();
                let values = self.facts.require_template(name)?.resolve_slots(&assigned)?;
                self.insert_fact(Some(name.as_ref()), values, None)
            }
        }
    }

    // -------------------------------------------------------------------------
    // Rules
    // -------------------------------------------------------------------------

    /// Defines a rule, replacing any rule with the same name. The rule is
    /// matched against the facts already present.
    ///
    /// # Errors
    /// Returns not-found for an unknown template and `InvalidRule` for a
    /// malformed rule.
    pub fn define_rule(&mut self, rule: Rule) -> Result<()> {
        let compiled = RuleCompiler::new(&self.facts)
            .compile(rule)
            .map_err(|e| e.in_operation("define_rule"))?;
        let rule = compiled.rule.clone();
        self.network.add_rule(compiled, &self.facts, &mut self.agenda);
        self.rules.insert(rule.name.clone(), rule.clone());
        debug!(rule = %rule.name, salience = rule.salience, "rule defined");
        self.emit(|| EngineEvent::RuleDefined {
            rule: rule.name.clone(),
        });
        self.flush_agenda();
        Ok(())
    }

    /// Removes a rule and its activations.
    ///
    /// # Errors
    /// Returns not-found if no rule has the name.
    pub fn undefine_rule(&mut self, name: &str) -> Result<()> {
        let Some((name, _)) = self.rules.remove_entry(name) else {
            return Err(Error::not_found(Missing::Rule(name.to_string())).in_operation("undefine_rule"));
        };
        self.network.remove_rule(&name, &mut self.agenda);
        debug!(rule = %name, "rule removed");
        self.emit(|| EngineEvent::RuleRemoved { rule: name.clone() });
        self.flush_agenda();
        Ok(())
    }

    /// Returns a rule by name.
    #[must_use]
    pub fn rule(&self, name: &str) -> Option<&Arc<Rule>> {
        self.rules.get(name)
    }

    /// Iterates rules in name order.
    pub fn rules(&self) -> impl Iterator<Item = &Arc<Rule>> {
        self.rules.values()
    }

    /// Puts a rule's current complete matches back on the agenda, including
    /// ones that already fired. Returns how many were scheduled.
    ///
    /// # Errors
    /// Returns not-found if no rule has the name.
    pub fn refresh(&mut self, name: &str) -> Result<usize> {
        let scheduled = self
            .network
            .refresh(name, &mut self.agenda)
            .ok_or_else(|| Error::not_found(Missing::Rule(name.to_string())).in_operation("refresh"))?;
        self.flush_agenda();
        Ok(scheduled)
    }

    /// Returns network node and memory counts.
    #[must_use]
    pub fn network_stats(&self) -> NetworkStats {
        self.network.stats()
    }

    // -------------------------------------------------------------------------
    // Agenda
    // -------------------------------------------------------------------------

    /// Returns the agenda.
    #[must_use]
    pub fn agenda(&self) -> &Agenda {
        &self.agenda
    }

    /// Returns the conflict-resolution strategy.
    #[must_use]
    pub fn strategy(&self) -> Strategy {
        self.agenda.strategy()
    }

    /// Changes the conflict-resolution strategy and re-sorts the agenda.
    pub fn set_strategy(&mut self, strategy: Strategy) {
        debug!(%strategy, "strategy changed");
        self.agenda.set_strategy(strategy);
    }

    // -------------------------------------------------------------------------
    // User Functions
    // -------------------------------------------------------------------------

    /// Binds a user function, replacing any previous binding.
    pub fn define_function<F>(&mut self, name: impl AsRef<str>, function: F)
    where
        F: Fn(&[Value]) -> std::result::Result<Value, CallbackError> + Send + Sync + 'static,
    {
        debug!(function = name.as_ref(), "function defined");
        self.functions.define(name, function);
    }

    /// Removes a user function. Returns true if it existed.
    pub fn undefine_function(&mut self, name: &str) -> bool {
        self.functions.undefine(name)
    }

    /// Returns true if a user function has the name.
    #[must_use]
    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains(name)
    }

    /// Calls a user function from the host.
    ///
    /// # Errors
    /// Returns not-found for an unknown name and a callback error if the
    /// function fails or panics.
    pub fn call_function(&self, name: &str, args: &[Value]) -> Result<Value> {
        if !self.functions.contains(name) {
            return Err(Error::not_found(Missing::Function(name.to_string())).in_operation("call_function"));
        }
        self.functions
            .invoke(name, args)
            .map_err(|e| Error::from(e).in_operation("call_function"))
    }

    // -------------------------------------------------------------------------
    // Globals
    // -------------------------------------------------------------------------

    /// Defines a global, or redefines it with a new initial value.
    pub fn define_global(&mut self, name: impl AsRef<str>, value: Value) {
        let name: Arc<str> = Arc::from(name.as_ref());
        debug!(global = %name, %value, "global defined");
        self.globals.insert(
            name,
            Global {
                initial: value.clone(),
                current: value,
            },
        );
    }

    /// Removes a global. Returns true if it existed.
    pub fn undefine_global(&mut self, name: &str) -> bool {
        self.globals.remove(name).is_some()
    }

    /// Returns a global's current value.
    ///
    /// # Errors
    /// Returns not-found for an undefined global.
    pub fn global(&self, name: &str) -> Result<&Value> {
        self.globals
            .get(name)
            .map(|g| &g.current)
            .ok_or_else(|| Error::not_found(Missing::Global(name.to_string())))
    }

    /// Sets a global's current value. `reset` restores the initial value.
    ///
    /// # Errors
    /// Returns not-found for an undefined global.
    pub fn set_global(&mut self, name: &str, value: Value) -> Result<()> {
        let global = self
            .globals
            .get_mut(name)
            .ok_or_else(|| Error::not_found(Missing::Global(name.to_string())))?;
        global.current = value;
        Ok(())
    }

    /// Iterates globals and their current values in name order.
    pub fn globals(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.globals.iter().map(|(name, g)| (name.as_ref(), &g.current))
    }

    // -------------------------------------------------------------------------
    // Deffacts
    // -------------------------------------------------------------------------

    /// Defines a named group of facts asserted on every `reset`, replacing
    /// any group with the same name.
    ///
    /// # Errors
    /// Returns not-found for an unknown template and a constraint error for
    /// an entry that does not fit its template.
    pub fn define_facts(&mut self, name: impl AsRef<str>, facts: Vec<FactSpec>) -> Result<()> {
        for spec in &facts {
            self.check_spec(spec).map_err(|e| e.in_operation("define_facts"))?;
        }
        self.deffacts.insert(Arc::from(name.as_ref()), facts);
        Ok(())
    }

    /// Removes a deffacts group. Returns true if it existed.
    pub fn undefine_facts(&mut self, name: &str) -> bool {
        self.deffacts.remove(name).is_some()
    }

    /// Iterates deffacts group names.
    pub fn deffacts(&self) -> impl Iterator<Item = &str> {
        self.deffacts.keys().map(|name| name.as_ref())
    }

    fn check_spec(&self, spec: &FactSpec) -> Result<()> {
        match spec {
            FactSpec::Ordered(values) if values.is_empty() => {
                Err(Error::constraint("ordered fact has no values"))
            }
            FactSpec::Ordered(_) => Ok(()),
            FactSpec::Template { name, slots } => {
                let template = self.facts.require_template(name)?;
                let assigned: Vec<(&str, Value)> =
                    slots.iter().map(|(s, v)| (s.as_ref(), v.clone())).collect();
                template.check_values(&template.resolve_slots(&assigned)?)
            }
        }
    }

    // -------------------------------------------------------------------------
    // Observation
    // -------------------------------------------------------------------------

    /// Iterates retained callback diagnostics, oldest first.
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    /// Takes and clears the retained diagnostics.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        self.diagnostics.drain(..).collect()
    }

    /// Installs an event sink, returning the previous one.
    pub fn set_event_sink(&mut self, sink: Box<dyn EventSink>) -> Option<Box<dyn EventSink>> {
        self.sink.replace(sink)
    }

    /// Removes the event sink.
    pub fn take_event_sink(&mut self) -> Option<Box<dyn EventSink>> {
        self.sink.take()
    }

    pub(crate) fn emit(&mut self, event: impl FnOnce() -> EngineEvent) {
        if let Some(sink) = &mut self.sink {
            sink.record(&event());
        }
    }

    fn flush_agenda(&mut self) {
        for change in self.agenda.drain_changes() {
            match change {
                AgendaChange::Added(activation, rule) => {
                    debug!(%activation, rule = %rule, "activation added");
                    self.emit(|| EngineEvent::ActivationAdded { activation, rule });
                }
                AgendaChange::Removed(activation, rule) => {
                    debug!(%activation, rule = %rule, "activation removed");
                    self.emit(|| EngineEvent::ActivationRemoved { activation, rule });
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
