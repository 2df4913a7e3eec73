//! Rule left-hand-side patterns.
//!
//! A [`Pattern`] is what a rule author writes: a target (a template or an
//! ordered fact shape) plus per-slot constraints. Compilation splits each
//! pattern into constant tests, which run once per fact in an alpha node,
//! and variable tests, which run per token in a join node.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use rulebook_foundation::{FactId, Value};
use rulebook_storage::Fact;

// =============================================================================
// Authoring Types
// =============================================================================

/// Comparison operator used by slot constraints.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompareOp {
    /// Equal.
    Eq,
    /// Not equal.
    Ne,
    /// Less than.
    Lt,
    /// Less than or equal.
    Le,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Ge,
}

impl CompareOp {
    /// Applies the operator. An integer and a float compare by numeric
    /// value, so `2.0 = 2` holds. Ordering comparisons between incomparable
    /// values (e.g. a string and an integer) are false.
    #[must_use]
    pub fn eval(self, left: &Value, right: &Value) -> bool {
        match self {
            Self::Eq => Self::equal(left, right),
            Self::Ne => !Self::equal(left, right),
            Self::Lt => left < right,
            Self::Le => left <= right,
            Self::Gt => left > right,
            Self::Ge => left >= right,
        }
    }

    fn equal(left: &Value, right: &Value) -> bool {
        match (left, right) {
            (Value::Int(_), Value::Float(_)) | (Value::Float(_), Value::Int(_)) => {
                left.partial_cmp(right) == Some(Ordering::Equal)
            }
            _ => left == right,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        };
        f.write_str(s)
    }
}

/// Right-hand operand of a comparison constraint.
#[derive(Clone, Debug, PartialEq)]
pub enum Term {
    /// A constant.
    Value(Value),
    /// A variable bound earlier in the rule.
    Var(Arc<str>),
}

/// A constraint on one slot of a fact.
#[derive(Clone, Debug, PartialEq)]
pub enum SlotConstraint {
    /// Matches anything.
    Any,
    /// Slot must equal the value.
    Literal(Value),
    /// Slot must differ from the value.
    NotLiteral(Value),
    /// Binds the slot to a variable, or tests equality if already bound.
    Bind(Arc<str>),
    /// Slot must compare against the term.
    Compare(CompareOp, Term),
}

/// Where a constraint applies.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlotKey {
    /// A template slot by name.
    Name(Arc<str>),
    /// An ordered fact field by position.
    Index(usize),
}

/// Which facts a pattern looks at.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PatternTarget {
    /// Facts of a template.
    Template(Arc<str>),
    /// Ordered facts with exactly this many fields.
    Ordered(usize),
}

/// One left-hand-side pattern of a rule.
#[derive(Clone, Debug, PartialEq)]
pub struct Pattern {
    /// Which facts are considered.
    pub target: PatternTarget,
    /// Constraints in evaluation order.
    pub constraints: Vec<(SlotKey, SlotConstraint)>,
    /// Variable receiving the matched fact's id (`?f <- ...`).
    pub fact_var: Option<Arc<str>>,
    /// Matches when no consistent fact exists.
    pub negated: bool,
}

impl Pattern {
    /// Starts a pattern over facts of a template.
    #[must_use]
    pub fn template(name: impl AsRef<str>) -> Self {
        Self {
            target: PatternTarget::Template(Arc::from(name.as_ref())),
            constraints: Vec::new(),
            fact_var: None,
            negated: false,
        }
    }

    /// Creates a pattern over ordered facts, one constraint per field.
    #[must_use]
    pub fn ordered(fields: impl IntoIterator<Item = SlotConstraint>) -> Self {
        let constraints: Vec<_> = fields
            .into_iter()
            .enumerate()
            .map(|(i, c)| (SlotKey::Index(i), c))
            .collect();
        Self {
            target: PatternTarget::Ordered(constraints.len()),
            constraints,
            fact_var: None,
            negated: false,
        }
    }

    /// Adds a constraint on a named slot.
    #[must_use]
    pub fn slot(mut self, name: impl AsRef<str>, constraint: SlotConstraint) -> Self {
        self.constraints
            .push((SlotKey::Name(Arc::from(name.as_ref())), constraint));
        self
    }

    /// Binds a named slot to a variable.
    #[must_use]
    pub fn bind(self, name: impl AsRef<str>, var: impl AsRef<str>) -> Self {
        self.slot(name, SlotConstraint::var(var))
    }

    /// Requires a named slot to equal a value.
    #[must_use]
    pub fn eq(self, name: impl AsRef<str>, value: impl Into<Value>) -> Self {
        self.slot(name, SlotConstraint::Literal(value.into()))
    }

    /// Binds the matched fact's id to a variable.
    #[must_use]
    pub fn as_fact(mut self, var: impl AsRef<str>) -> Self {
        self.fact_var = Some(Arc::from(var.as_ref()));
        self
    }

    /// Negates the pattern.
    #[must_use]
    pub fn negated(mut self) -> Self {
        self.negated = true;
        self
    }
}

impl SlotConstraint {
    /// Shorthand for [`SlotConstraint::Bind`].
    #[must_use]
    pub fn var(name: impl AsRef<str>) -> Self {
        Self::Bind(Arc::from(name.as_ref()))
    }

    /// Shorthand for [`SlotConstraint::Literal`].
    #[must_use]
    pub fn lit(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    /// Shorthand for a literal symbol.
    #[must_use]
    pub fn sym(name: impl AsRef<str>) -> Self {
        Self::Literal(Value::symbol(name))
    }

    /// Compares against a constant.
    #[must_use]
    pub fn cmp(op: CompareOp, value: impl Into<Value>) -> Self {
        Self::Compare(op, Term::Value(value.into()))
    }

    /// Compares against a bound variable.
    #[must_use]
    pub fn cmp_var(op: CompareOp, var: impl AsRef<str>) -> Self {
        Self::Compare(op, Term::Var(Arc::from(var.as_ref())))
    }
}

// =============================================================================
// Compiled Tests
// =============================================================================

/// Operator of a compiled test.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TestOp {
    /// Structural equality: literals and repeated variables.
    Same,
    /// Structural inequality: negated literals.
    Differs,
    /// A comparison constraint.
    Compare(CompareOp),
}

impl TestOp {
    /// Applies the operator.
    #[must_use]
    pub fn eval(self, left: &Value, right: &Value) -> bool {
        match self {
            Self::Same => left == right,
            Self::Differs => left != right,
            Self::Compare(op) => op.eval(left, right),
        }
    }
}

/// A constant test evaluated once per fact.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AlphaTest {
    /// Slot position.
    pub slot: usize,
    /// Operator.
    pub op: TestOp,
    /// Constant operand.
    pub value: Value,
}

impl AlphaTest {
    /// Evaluates the test against a fact.
    #[must_use]
    pub fn passes(&self, fact: &Fact) -> bool {
        fact.value(self.slot)
            .is_some_and(|v| self.op.eval(v, &self.value))
    }
}

/// Identity of an alpha node: target plus constant tests.
///
/// Two patterns with equal keys share one alpha node.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AlphaKey {
    /// Which facts are considered.
    pub target: PatternTarget,
    /// Constant tests, all of which must pass.
    pub tests: Vec<AlphaTest>,
}

impl AlphaKey {
    /// Returns true if the fact passes the target check and every test.
    #[must_use]
    pub fn accepts(&self, fact: &Fact) -> bool {
        self.target.accepts(fact) && self.tests.iter().all(|t| t.passes(fact))
    }
}

impl PatternTarget {
    /// Returns the target a fact belongs to.
    #[must_use]
    pub fn of(fact: &Fact) -> Self {
        match &fact.template {
            Some(name) => Self::Template(name.clone()),
            None => Self::Ordered(fact.values.len()),
        }
    }

    /// Returns true if the fact belongs to this target.
    #[must_use]
    pub fn accepts(&self, fact: &Fact) -> bool {
        match (self, &fact.template) {
            (Self::Template(name), Some(t)) => name == t,
            (Self::Ordered(arity), None) => *arity == fact.values.len(),
            _ => false,
        }
    }
}

/// A variable test evaluated per token.
#[derive(Clone, Debug, PartialEq)]
pub enum JoinTest {
    /// Bind the slot to a fresh variable.
    Bind {
        /// Slot position.
        slot: usize,
        /// Variable name.
        var: Arc<str>,
    },
    /// Compare the slot with an already bound variable.
    Test {
        /// Slot position.
        slot: usize,
        /// Operator.
        op: TestOp,
        /// Variable name.
        var: Arc<str>,
    },
}

/// A pattern split into its alpha and join parts.
#[derive(Clone, Debug, PartialEq)]
pub struct CompiledPattern {
    /// Constant part, shared between rules where possible.
    pub alpha: AlphaKey,
    /// Variable part, in evaluation order.
    pub joins: Vec<JoinTest>,
    /// Variable receiving the fact id.
    pub fact_var: Option<Arc<str>>,
    /// Negated pattern.
    pub negated: bool,
}

impl CompiledPattern {
    /// Extends bindings with a fact, or returns `None` if a join test fails.
    #[must_use]
    pub fn join(&self, bindings: &Bindings, fact: &Fact) -> Option<Bindings> {
        let mut out = bindings.clone();
        for test in &self.joins {
            match test {
                JoinTest::Bind { slot, var } => {
                    let value = fact.value(*slot)?;
                    out = out.with(var.clone(), value.clone());
                }
                JoinTest::Test { slot, op, var } => {
                    let value = fact.value(*slot)?;
                    let bound = out.get(var)?;
                    if !op.eval(value, bound) {
                        return None;
                    }
                }
            }
        }
        if let Some(var) = &self.fact_var {
            out = out.with_fact(var.clone(), fact.id);
        }
        Some(out)
    }
}

// =============================================================================
// Bindings
// =============================================================================

/// Variable bindings accumulated by a partial match.
///
/// Backed by persistent maps so extending a token's bindings shares
/// structure with its parent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Bindings {
    values: im::OrdMap<Arc<str>, Value>,
    facts: im::OrdMap<Arc<str>, FactId>,
}

impl Bindings {
    /// Create empty bindings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value binding by variable name.
    #[must_use]
    pub fn get(&self, var: &str) -> Option<&Value> {
        self.values.get(var)
    }

    /// Get a fact binding by variable name.
    #[must_use]
    pub fn get_fact(&self, var: &str) -> Option<FactId> {
        self.facts.get(var).copied()
    }

    /// Returns a copy with a value bound.
    #[must_use]
    pub fn with(&self, var: Arc<str>, value: Value) -> Self {
        Self {
            values: self.values.update(var, value),
            facts: self.facts.clone(),
        }
    }

    /// Returns a copy with a fact bound.
    #[must_use]
    pub fn with_fact(&self, var: Arc<str>, id: FactId) -> Self {
        Self {
            values: self.values.clone(),
            facts: self.facts.update(var, id),
        }
    }

    /// Binds a value in place.
    pub fn set(&mut self, var: Arc<str>, value: Value) {
        self.values.insert(var, value);
    }

    /// Binds a fact in place.
    pub fn set_fact(&mut self, var: Arc<str>, id: FactId) {
        self.facts.insert(var, id);
    }

    /// Iterate value bindings in variable-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&Arc<str>, &Value)> {
        self.values.iter()
    }

    /// Iterate fact bindings in variable-name order.
    pub fn iter_facts(&self) -> impl Iterator<Item = (&Arc<str>, &FactId)> {
        self.facts.iter()
    }

    /// Returns the number of value bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.facts.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================
