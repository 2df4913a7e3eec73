//! Rule compiler - checks a rule and splits its patterns into network tests.
//!
//! Constant constraints become alpha tests; anything mentioning a variable
//! becomes a join test. Variable scoping is resolved here so the network
//! never meets an unbound variable at match time.

use std::collections::HashSet;
use std::sync::Arc;

use rulebook_foundation::{Error, Missing, Result};
use rulebook_storage::FactStore;

use crate::pattern::{
    AlphaKey, AlphaTest, CompiledPattern, JoinTest, Pattern, PatternTarget, SlotConstraint,
    SlotKey, Term, TestOp,
};

use super::{MAX_SALIENCE, MIN_SALIENCE, Rule};

// =============================================================================
// Compiled Rule
// =============================================================================

/// A rule whose patterns have been compiled against the current templates.
#[derive(Clone, Debug)]
pub struct CompiledRule {
    /// The source rule
    pub rule: Arc<Rule>,
    /// One compiled pattern per rule pattern
    pub patterns: Vec<CompiledPattern>,
}

// =============================================================================
// Compiler
// =============================================================================

/// Compiles rules against a fact store's templates.
pub struct RuleCompiler<'a> {
    facts: &'a FactStore,
}

struct Scope {
    values: HashSet<Arc<str>>,
    facts: HashSet<Arc<str>>,
}

impl Scope {
    fn is_bound(&self, var: &Arc<str>, local: &HashSet<Arc<str>>) -> bool {
        self.values.contains(var) || local.contains(var)
    }
}

impl<'a> RuleCompiler<'a> {
    /// Creates a compiler resolving templates through `facts`.
    #[must_use]
    pub fn new(facts: &'a FactStore) -> Self {
        Self { facts }
    }

    /// Compiles a rule.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown template and `InvalidRule` for an
    /// out-of-range salience, an unknown slot, a variable used before it is
    /// bound, or a fact variable that is misplaced or reused.
    pub fn compile(&self, rule: Rule) -> Result<CompiledRule> {
        if rule.name.is_empty() {
            return Err(Error::invalid_rule("", "rule name is empty"));
        }
        if !(MIN_SALIENCE..=MAX_SALIENCE).contains(&rule.salience) {
            return Err(Error::invalid_rule(
                rule.name.as_ref(),
                format!(
                    "salience {} outside {MIN_SALIENCE}..={MAX_SALIENCE}",
                    rule.salience
                ),
            ));
        }

        let mut scope = Scope {
            values: HashSet::new(),
            facts: HashSet::new(),
        };
        let patterns = rule
            .patterns
            .iter()
            .map(|p| self.compile_pattern(&rule, p, &mut scope))
            .collect::<Result<Vec<_>>>()?;

        check_actions(&rule, &mut scope)?;

        Ok(CompiledRule {
            rule: Arc::new(rule),
            patterns,
        })
    }

    fn compile_pattern(&self, rule: &Rule, pattern: &Pattern, scope: &mut Scope) -> Result<CompiledPattern> {
        let invalid = |message: String| Error::invalid_rule(rule.name.as_ref(), message);

        let template = match &pattern.target {
            PatternTarget::Template(name) => Some(
                self.facts
                    .template(name)
                    .ok_or_else(|| Error::not_found(Missing::Template(name.to_string())))?,
            ),
            PatternTarget::Ordered(0) => {
                return Err(invalid("ordered pattern has no fields".to_string()));
            }
            PatternTarget::Ordered(_) => None,
        };

        let mut alpha = Vec::new();
        let mut joins = Vec::new();
        let mut local: HashSet<Arc<str>> = HashSet::new();

        for (key, constraint) in &pattern.constraints {
            let slot = match (key, template) {
                (SlotKey::Name(name), Some(t)) => t.slot_index(name).ok_or_else(|| {
                    invalid(format!("template {} has no slot {name}", t.name))
                })?,
                (SlotKey::Name(name), None) => {
                    return Err(invalid(format!("ordered pattern cannot name slot {name}")));
                }
                (SlotKey::Index(i), Some(t)) if *i < t.slots.len() => *i,
                (SlotKey::Index(i), None) if matches!(pattern.target, PatternTarget::Ordered(n) if *i < n) => *i,
                (SlotKey::Index(i), _) => {
                    return Err(invalid(format!("field {i} is out of range")));
                }
            };

            match constraint {
                SlotConstraint::Any => {}
                SlotConstraint::Literal(value) => alpha.push(AlphaTest {
                    slot,
                    op: TestOp::Same,
                    value: value.clone(),
                }),
                SlotConstraint::NotLiteral(value) => alpha.push(AlphaTest {
                    slot,
                    op: TestOp::Differs,
                    value: value.clone(),
                }),
                SlotConstraint::Compare(op, Term::Value(value)) => alpha.push(AlphaTest {
                    slot,
                    op: TestOp::Compare(*op),
                    value: value.clone(),
                }),
                SlotConstraint::Compare(op, Term::Var(var)) => {
                    if !scope.is_bound(var, &local) {
                        return Err(invalid(format!("variable ?{var} is used before it is bound")));
                    }
                    joins.push(JoinTest::Test {
                        slot,
                        op: TestOp::Compare(*op),
                        var: var.clone(),
                    });
                }
                SlotConstraint::Bind(var) => {
                    if scope.facts.contains(var) {
                        return Err(invalid(format!("?{var} is already a fact variable")));
                    }
                    if scope.is_bound(var, &local) {
                        joins.push(JoinTest::Test {
                            slot,
                            op: TestOp::Same,
                            var: var.clone(),
                        });
                    } else {
                        local.insert(var.clone());
                        joins.push(JoinTest::Bind {
                            slot,
                            var: var.clone(),
                        });
                    }
                }
            }
        }

        if let Some(var) = &pattern.fact_var {
            if pattern.negated {
                return Err(invalid(format!("negated pattern cannot bind fact variable ?{var}")));
            }
            if scope.facts.contains(var) || scope.values.contains(var) || local.contains(var) {
                return Err(invalid(format!("?{var} is bound twice")));
            }
            scope.facts.insert(var.clone());
        }

        if !pattern.negated {
            scope.values.extend(local);
        }

        Ok(CompiledPattern {
            alpha: AlphaKey {
                target: pattern.target.clone(),
                tests: alpha,
            },
            joins,
            fact_var: pattern.fact_var.clone(),
            negated: pattern.negated,
        })
    }
}

fn check_actions(rule: &Rule, scope: &mut Scope) -> Result<()> {
    let invalid = |message: String| Error::invalid_rule(rule.name.as_ref(), message);
    for action in &rule.actions {
        for var in action.reads() {
            if !scope.values.contains(var) {
                return Err(invalid(format!("variable ?{var} is used before it is bound")));
            }
        }
        match action {
            super::Action::Retract(var) | super::Action::Modify { fact: var, .. } => {
                if !scope.facts.contains(var) {
                    return Err(invalid(format!("?{var} is not a fact variable")));
                }
            }
            _ => {}
        }
        if let Some(var) = action.binds() {
            scope.values.insert(var.clone());
        }
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
