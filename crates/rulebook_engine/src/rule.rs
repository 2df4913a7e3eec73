//! Production rules: patterns on the left, actions on the right.
//!
//! Rules are immutable once defined. [`compiler`] checks a rule against the
//! current templates and splits its patterns into network tests.

pub mod compiler;

pub use compiler::{CompiledRule, RuleCompiler};

use std::fmt;
use std::sync::Arc;

use rulebook_foundation::Value;

use crate::pattern::Pattern;

/// Lowest salience a rule may declare.
pub const MIN_SALIENCE: i32 = -10_000;

/// Highest salience a rule may declare.
pub const MAX_SALIENCE: i32 = 10_000;

// =============================================================================
// Expressions
// =============================================================================

/// A right-hand-side expression.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// A constant.
    Value(Value),
    /// A variable bound by the patterns or an earlier action.
    Var(Arc<str>),
    /// A global variable.
    Global(Arc<str>),
    /// A list built from sub-expressions.
    List(Vec<Expr>),
    /// A user function call.
    Call {
        /// Function name.
        function: Arc<str>,
        /// Arguments, evaluated left to right.
        args: Vec<Expr>,
    },
}

impl Expr {
    /// A constant expression.
    #[must_use]
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    /// A constant symbol.
    #[must_use]
    pub fn sym(name: impl AsRef<str>) -> Self {
        Self::Value(Value::symbol(name))
    }

    /// A variable reference.
    #[must_use]
    pub fn var(name: impl AsRef<str>) -> Self {
        Self::Var(Arc::from(name.as_ref()))
    }

    /// A global reference.
    #[must_use]
    pub fn global(name: impl AsRef<str>) -> Self {
        Self::Global(Arc::from(name.as_ref()))
    }

    /// A user function call.
    #[must_use]
    pub fn call(function: impl AsRef<str>, args: impl IntoIterator<Item = Expr>) -> Self {
        Self::Call {
            function: Arc::from(function.as_ref()),
            args: args.into_iter().collect(),
        }
    }

    fn variables<'a>(&'a self, out: &mut Vec<&'a Arc<str>>) {
        match self {
            Self::Value(_) | Self::Global(_) => {}
            Self::Var(name) => out.push(name),
            Self::List(items) | Self::Call { args: items, .. } => {
                for item in items {
                    item.variables(out);
                }
            }
        }
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

// =============================================================================
// Actions
// =============================================================================

/// A right-hand-side action.
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    /// Assert a fact from positional values.
    Assert {
        /// Template, or `None` for an ordered fact.
        template: Option<Arc<str>>,
        /// Slot values.
        values: Vec<Expr>,
    },
    /// Assert a templated fact from named slots.
    AssertSlots {
        /// Template name.
        template: Arc<str>,
        /// Slot assignments; omitted slots take their defaults.
        slots: Vec<(Arc<str>, Expr)>,
    },
    /// Retract the fact bound to a fact variable.
    Retract(Arc<str>),
    /// Replace the fact bound to a fact variable with a changed copy.
    ///
    /// The fact variable is rebound to the replacement.
    Modify {
        /// Fact variable.
        fact: Arc<str>,
        /// Slots to change.
        slots: Vec<(Arc<str>, Expr)>,
    },
    /// Bind a variable for the rest of the action list.
    Bind {
        /// Variable name.
        var: Arc<str>,
        /// Value expression.
        expr: Expr,
    },
    /// Call a user function, optionally binding its result.
    Call {
        /// Function name.
        function: Arc<str>,
        /// Arguments.
        args: Vec<Expr>,
        /// Variable receiving the result.
        bind: Option<Arc<str>>,
    },
    /// Set a global variable.
    SetGlobal {
        /// Global name.
        name: Arc<str>,
        /// Value expression.
        expr: Expr,
    },
    /// Stop the run after this action list completes.
    Halt,
}

impl Action {
    /// Asserts an ordered fact.
    #[must_use]
    pub fn assert_ordered(values: impl IntoIterator<Item = Expr>) -> Self {
        Self::Assert {
            template: None,
            values: values.into_iter().collect(),
        }
    }

    /// Asserts a templated fact from named slots.
    #[must_use]
    pub fn assert_slots<S: AsRef<str>>(
        template: impl AsRef<str>,
        slots: impl IntoIterator<Item = (S, Expr)>,
    ) -> Self {
        Self::AssertSlots {
            template: Arc::from(template.as_ref()),
            slots: named(slots),
        }
    }

    /// Retracts a fact variable.
    #[must_use]
    pub fn retract(fact: impl AsRef<str>) -> Self {
        Self::Retract(Arc::from(fact.as_ref()))
    }

    /// Modifies a fact variable.
    #[must_use]
    pub fn modify<S: AsRef<str>>(
        fact: impl AsRef<str>,
        slots: impl IntoIterator<Item = (S, Expr)>,
    ) -> Self {
        Self::Modify {
            fact: Arc::from(fact.as_ref()),
            slots: named(slots),
        }
    }

    /// Binds a variable.
    #[must_use]
    pub fn bind(var: impl AsRef<str>, expr: Expr) -> Self {
        Self::Bind {
            var: Arc::from(var.as_ref()),
            expr,
        }
    }

    /// Calls a function for its side effects.
    #[must_use]
    pub fn call(function: impl AsRef<str>, args: impl IntoIterator<Item = Expr>) -> Self {
        Self::Call {
            function: Arc::from(function.as_ref()),
            args: args.into_iter().collect(),
            bind: None,
        }
    }

    /// Calls a function and binds its result.
    #[must_use]
    pub fn call_into(
        var: impl AsRef<str>,
        function: impl AsRef<str>,
        args: impl IntoIterator<Item = Expr>,
    ) -> Self {
        Self::Call {
            function: Arc::from(function.as_ref()),
            args: args.into_iter().collect(),
            bind: Some(Arc::from(var.as_ref())),
        }
    }

    /// Sets a global.
    #[must_use]
    pub fn set_global(name: impl AsRef<str>, expr: Expr) -> Self {
        Self::SetGlobal {
            name: Arc::from(name.as_ref()),
            expr,
        }
    }

    /// Variables this action reads.
    pub(crate) fn reads(&self) -> Vec<&Arc<str>> {
        let mut out = Vec::new();
        match self {
            Self::Assert { values, .. } => values.iter().for_each(|e| e.variables(&mut out)),
            Self::AssertSlots { slots, .. } | Self::Modify { slots, .. } => {
                slots.iter().for_each(|(_, e)| e.variables(&mut out));
            }
            Self::Bind { expr, .. } | Self::SetGlobal { expr, .. } => expr.variables(&mut out),
            Self::Call { args, .. } => args.iter().for_each(|e| e.variables(&mut out)),
            Self::Retract(_) | Self::Halt => {}
        }
        out
    }

    /// Variable this action binds, if any.
    pub(crate) fn binds(&self) -> Option<&Arc<str>> {
        match self {
            Self::Bind { var, .. } => Some(var),
            Self::Call { bind, .. } => bind.as_ref(),
            _ => None,
        }
    }
}

fn named<S: AsRef<str>>(slots: impl IntoIterator<Item = (S, Expr)>) -> Vec<(Arc<str>, Expr)> {
    slots
        .into_iter()
        .map(|(name, expr)| (Arc::from(name.as_ref()), expr))
        .collect()
}

// =============================================================================
// Rule
// =============================================================================

/// A production rule.
#[derive(Clone, Debug, PartialEq)]
pub struct Rule {
    /// Rule name
    pub name: Arc<str>,
    /// Priority (higher fires first)
    pub salience: i32,
    /// Left-hand side, matched in order
    pub patterns: Vec<Pattern>,
    /// Right-hand side, executed in order
    pub actions: Vec<Action>,
}

impl Rule {
    /// Creates a rule with no patterns or actions.
    #[must_use]
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: Arc::from(name.as_ref()),
            salience: 0,
            patterns: Vec::new(),
            actions: Vec::new(),
        }
    }

    /// Sets the salience (priority).
    #[must_use]
    pub fn with_salience(mut self, salience: i32) -> Self {
        self.salience = salience;
        self
    }

    /// Adds a pattern.
    #[must_use]
    pub fn when(mut self, pattern: Pattern) -> Self {
        self.patterns.push(pattern);
        self
    }

    /// Adds an action.
    #[must_use]
    pub fn then(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    /// Returns true if any pattern targets the template.
    #[must_use]
    pub fn uses_template(&self, template: &str) -> bool {
        use crate::pattern::PatternTarget;
        self.patterns
            .iter()
            .any(|p| matches!(&p.target, PatternTarget::Template(t) if &**t == template))
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (salience {}, {} patterns, {} actions)",
            self.name,
            self.salience,
            self.patterns.len(),
            self.actions.len()
        )
    }
}
