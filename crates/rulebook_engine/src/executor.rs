//! The execution loop: pop the top activation, run its actions, repeat.
//!
//! User-function failures never escape a firing. They come back to the
//! rule as a diagnostic string, are logged, and are kept in the
//! environment's diagnostics. Anything else an action raises (a bad fact,
//! a missing global) aborts the run with the rule attached as context.

use std::fmt;
use std::sync::Arc;

use rulebook_foundation::{CallbackError, Error, ErrorKind, FactId, Missing, Result, SemanticLimit, Value};
use tracing::{debug, info, warn};

use crate::agenda::Activation;
use crate::environment::Environment;
use crate::event::EngineEvent;
use crate::pattern::Bindings;
use crate::rule::{Action, Expr};

// =============================================================================
// States and Outcomes
// =============================================================================

/// Execution state of an environment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExecutionState {
    /// Not running; `run` may be called.
    #[default]
    Idle,
    /// Inside `run`.
    Running,
    /// Stopped by a halt; only `reset` or `clear` leave this state.
    Halted,
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Halted => write!(f, "halted"),
        }
    }
}

/// Why a run stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// Nothing left to fire.
    AgendaEmpty,
    /// The requested number of firings completed.
    StepLimit,
    /// A halt was requested.
    Halted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AgendaEmpty => write!(f, "agenda empty"),
            Self::StepLimit => write!(f, "step limit"),
            Self::Halted => write!(f, "halted"),
        }
    }
}

/// Result of a completed run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunOutcome {
    /// Rules fired.
    pub fired: usize,
    /// Why the run stopped.
    pub stop: StopReason,
}

/// A contained user-function failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    /// The rule whose action made the call, if any.
    pub rule: Option<Arc<str>>,
    /// The function called.
    pub function: Arc<str>,
    /// What went wrong.
    pub error: CallbackError,
}

impl Diagnostic {
    /// The value handed back to the rule in place of a result.
    #[must_use]
    pub fn message(&self) -> String {
        self.error.diagnostic()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(rule) = &self.rule {
            write!(f, "[{rule}] ")?;
        }
        write!(f, "{}: {}", self.function, self.error)
    }
}

// =============================================================================
// Execution Loop
// =============================================================================

impl Environment {
    /// Fires activations until the agenda empties, `max_steps` rules have
    /// fired, or a halt is requested.
    ///
    /// # Errors
    /// Returns `HaltRequested` if the environment is halted, `LimitExceeded`
    /// if the configured activation limit is reached, and any error raised
    /// by a rule action. The state is `Idle` after an error.
    pub fn run(&mut self, max_steps: Option<usize>) -> Result<RunOutcome> {
        if self.state == ExecutionState::Halted {
            return Err(Error::halt_requested().in_operation("run"));
        }

        self.runs += 1;
        let run = self.runs;
        self.state = ExecutionState::Running;
        self.halt_pending = false;
        info!(run, pending = self.agenda.len(), "run started");
        self.emit(|| EngineEvent::RunStart { run });

        let (fired, result) = self.run_loop(max_steps);

        self.state = match result {
            Ok(StopReason::Halted) => ExecutionState::Halted,
            _ => ExecutionState::Idle,
        };
        self.halt_pending = false;
        let stop = result.as_ref().ok().copied();
        info!(run, fired, stop = ?stop, "run finished");
        self.emit(|| EngineEvent::RunEnd { run, fired, stop });

        result.map(|stop| RunOutcome { fired, stop })
    }

    fn run_loop(&mut self, max_steps: Option<usize>) -> (usize, Result<StopReason>) {
        let mut fired = 0;
        loop {
            if max_steps.is_some_and(|max| fired >= max) {
                return (fired, Ok(StopReason::StepLimit));
            }
            let Some(next) = self.agenda.peek() else {
                return (fired, Ok(StopReason::AgendaEmpty));
            };
            if let Some(limit) = self.config.activation_limit {
                if fired >= limit {
                    let err = Error::limit_exceeded(SemanticLimit::MaxActivations {
                        limit,
                        rule: Some(next.rule.to_string()),
                    });
                    return (fired, Err(err.in_operation("run")));
                }
            }
            let Some(activation) = self.agenda.pop() else {
                return (fired, Ok(StopReason::AgendaEmpty));
            };

            fired += 1;
            if let Err(err) = self.fire(activation) {
                return (fired, Err(err.in_operation("run")));
            }
            if self.halt_pending {
                return (fired, Ok(StopReason::Halted));
            }
        }
    }

    fn fire(&mut self, activation: Activation) -> Result<()> {
        let Some(rule) = self.rules.get(&activation.rule).cloned() else {
            return Err(Error::new(ErrorKind::Internal(format!(
                "activation {} refers to missing rule {}",
                activation.id, activation.rule
            ))));
        };

        debug!(rule = %rule.name, activation = %activation.id, "rule firing");
        self.emit(|| EngineEvent::RuleFiring {
            rule: rule.name.clone(),
            activation: activation.id,
            facts: activation.facts.clone(),
        });

        let mut bindings = activation.bindings;
        for action in &rule.actions {
            self.execute(&rule.name, action, &mut bindings)
                .map_err(|err| err.in_rule(rule.name.as_ref()))?;
        }

        self.emit(|| EngineEvent::RuleComplete {
            rule: rule.name.clone(),
        });
        Ok(())
    }

    fn execute(&mut self, rule: &Arc<str>, action: &Action, bindings: &mut Bindings) -> Result<()> {
        match action {
            Action::Assert { template, values } => {
                let values = self.eval_all(rule, values, bindings)?;
                self.insert_fact(template.as_deref(), values, Some(rule))?;
            }
            Action::AssertSlots { template, slots } => {
                let assigned = self.eval_slots(rule, slots, bindings)?;
                let values = self
                    .facts
                    .require_template(template)?
                    .resolve_slots(&assignments(&assigned))?;
                self.insert_fact(Some(template.as_ref()), values, Some(rule))?;
            }
            Action::Retract(var) => {
                let id = fact_var(bindings, var)?;
                self.remove_fact(id, Some(rule))?;
            }
            Action::Modify { fact, slots } => {
                let id = fact_var(bindings, fact)?;
                let assigned = self.eval_slots(rule, slots, bindings)?;
                let replacement = self.replace_fact(id, &assignments(&assigned), Some(rule))?;
                bindings.set_fact(fact.clone(), replacement);
            }
            Action::Bind { var, expr } => {
                let value = self.eval(rule, expr, bindings)?;
                bindings.set(var.clone(), value);
            }
            Action::Call {
                function,
                args,
                bind,
            } => {
                let args = self.eval_all(rule, args, bindings)?;
                let value = self.call_contained(Some(rule), function, &args);
                if let Some(var) = bind {
                    bindings.set(var.clone(), value);
                }
            }
            Action::SetGlobal { name, expr } => {
                let value = self.eval(rule, expr, bindings)?;
                self.set_global(name, value)?;
            }
            Action::Halt => {
                debug!(rule = %rule, "halt requested");
                self.halt_pending = true;
                self.emit(|| EngineEvent::Halted {
                    rule: Some(rule.clone()),
                });
            }
        }
        Ok(())
    }

    fn eval(&mut self, rule: &Arc<str>, expr: &Expr, bindings: &Bindings) -> Result<Value> {
        match expr {
            Expr::Value(value) => Ok(value.clone()),
            Expr::Var(name) => bindings
                .get(name)
                .cloned()
                .ok_or_else(|| Error::not_found(Missing::Variable(name.to_string()))),
            Expr::Global(name) => self.global(name).cloned(),
            Expr::List(items) => Ok(Value::list(self.eval_all(rule, items, bindings)?)),
            Expr::Call { function, args } => {
                let args = self.eval_all(rule, args, bindings)?;
                Ok(self.call_contained(Some(rule), function, &args))
            }
        }
    }

    fn eval_all(&mut self, rule: &Arc<str>, exprs: &[Expr], bindings: &Bindings) -> Result<Vec<Value>> {
        exprs.iter().map(|e| self.eval(rule, e, bindings)).collect()
    }

    fn eval_slots(
        &mut self,
        rule: &Arc<str>,
        slots: &[(Arc<str>, Expr)],
        bindings: &Bindings,
    ) -> Result<Vec<(Arc<str>, Value)>> {
        slots
            .iter()
            .map(|(name, e)| Ok((name.clone(), self.eval(rule, e, bindings)?)))
            .collect()
    }

    /// Calls a user function, turning any failure into a diagnostic value.
    pub(crate) fn call_contained(&mut self, rule: Option<&Arc<str>>, function: &Arc<str>, args: &[Value]) -> Value {
        match self.functions.invoke(function, args) {
            Ok(value) => value,
            Err(error) => {
                warn!(function = %function, rule = ?rule, %error, "user function failed");
                let value = Value::from(error.diagnostic());
                self.emit(|| EngineEvent::CallbackFailed {
                    function: function.clone(),
                    error: error.clone(),
                    rule: rule.cloned(),
                });
                self.record_diagnostic(Diagnostic {
                    rule: rule.cloned(),
                    function: function.clone(),
                    error,
                });
                value
            }
        }
    }

    fn record_diagnostic(&mut self, diagnostic: Diagnostic) {
        if self.config.diagnostics_capacity == 0 {
            return;
        }
        while self.diagnostics.len() >= self.config.diagnostics_capacity {
            self.diagnostics.pop_front();
        }
        self.diagnostics.push_back(diagnostic);
    }
}

fn fact_var(bindings: &Bindings, var: &str) -> Result<FactId> {
    bindings
        .get_fact(var)
        .ok_or_else(|| Error::not_found(Missing::Variable(var.to_string())))
}

fn assignments(assigned: &[(Arc<str>, Value)]) -> Vec<(&str, Value)> {
    assigned
        .iter()
        .map(|(name, value)| (name.as_ref(), value.clone()))
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
