//! Error types for the Rulebook system.
//!
//! Uses `thiserror` for ergonomic error definition with rich context.

use std::fmt;

use thiserror::Error;

use crate::fact_id::FactId;
use crate::types::Type;

/// The main error type for Rulebook operations.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional context about where the error occurred.
    pub context: Option<ErrorContext>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Adds context to this error.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Tags this error with the operation it originated from.
    ///
    /// An operation tag that is already present is kept; the outermost
    /// caller only fills it in when nothing deeper did.
    #[must_use]
    pub fn in_operation(mut self, operation: &'static str) -> Self {
        let context = self.context.get_or_insert_with(ErrorContext::new);
        if context.operation.is_none() {
            context.operation = Some(operation);
        }
        self
    }

    /// Records the rule whose actions raised this error.
    #[must_use]
    pub fn in_rule(mut self, rule: impl Into<String>) -> Self {
        let rule = rule.into();
        let context = self.context.get_or_insert_with(ErrorContext::new);
        context.stack.push(format!("rule {rule}"));
        if context.rule.is_none() {
            context.rule = Some(rule);
        }
        self
    }

    /// Returns the originating operation tag, if known.
    #[must_use]
    pub fn operation(&self) -> Option<&'static str> {
        self.context.as_ref().and_then(|c| c.operation)
    }

    /// Creates a constraint violation error.
    #[must_use]
    pub fn constraint(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Constraint(message.into()))
    }

    /// Creates a slot type mismatch error.
    #[must_use]
    pub fn type_mismatch(slot: impl Into<String>, expected: Vec<Type>, actual: Type) -> Self {
        Self::new(ErrorKind::TypeMismatch {
            slot: slot.into(),
            expected,
            actual,
        })
    }

    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(missing: Missing) -> Self {
        Self::new(ErrorKind::NotFound(missing))
    }

    /// Creates an unknown fact error.
    #[must_use]
    pub fn fact_not_found(id: FactId) -> Self {
        Self::not_found(Missing::Fact(id))
    }

    /// Creates an invalid rule error.
    #[must_use]
    pub fn invalid_rule(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRule {
            rule: rule.into(),
            message: message.into(),
        })
    }

    /// Creates the error returned when running a halted environment.
    #[must_use]
    pub fn halt_requested() -> Self {
        Self::new(ErrorKind::HaltRequested)
    }

    /// Creates a semantic limit exceeded error.
    #[must_use]
    pub fn limit_exceeded(limit: SemanticLimit) -> Self {
        Self::new(ErrorKind::LimitExceeded(limit))
    }

    /// Returns true if this is a constraint or type error.
    #[must_use]
    pub fn is_constraint(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Constraint(_) | ErrorKind::TypeMismatch { .. }
        )
    }

    /// Returns true if this is a not-found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, ErrorKind::NotFound(_))
    }
}

impl From<CallbackError> for Error {
    fn from(err: CallbackError) -> Self {
        Self::new(ErrorKind::Callback(err))
    }
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// A fact or template violates a shape constraint.
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// A slot value has a type the slot does not allow.
    #[error("type mismatch in slot {slot}: expected one of {expected:?}, got {actual}")]
    TypeMismatch {
        /// The slot being filled.
        slot: String,
        /// The types the slot allows.
        expected: Vec<Type>,
        /// The type of the offending value.
        actual: Type,
    },

    /// A named or numbered item does not exist.
    #[error("not found: {0}")]
    NotFound(Missing),

    /// The environment was halted and must be reset before running again.
    #[error("execution halted; reset required")]
    HaltRequested,

    /// A user function failed.
    #[error("callback failed: {0}")]
    Callback(CallbackError),

    /// A rule definition is malformed.
    #[error("invalid rule {rule}: {message}")]
    InvalidRule {
        /// The rule being defined.
        rule: String,
        /// What is wrong with it.
        message: String,
    },

    /// Semantic limit exceeded (kill switch triggered).
    #[error("limit exceeded: {0}")]
    LimitExceeded(SemanticLimit),

    /// Snapshot encoding or decoding failed.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Reading or writing a file failed.
    #[error("I/O error: {0}")]
    IoError(String),

    /// Internal error (should not happen).
    #[error("internal error: {0}")]
    Internal(String),
}

/// What a not-found error was looking for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Missing {
    /// A fact id.
    Fact(FactId),
    /// A template name.
    Template(String),
    /// A rule name.
    Rule(String),
    /// A user function name.
    Function(String),
    /// A global variable name.
    Global(String),
    /// A rule variable that was never bound.
    Variable(String),
}

impl fmt::Display for Missing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fact(id) => write!(f, "fact {id}"),
            Self::Template(name) => write!(f, "template {name}"),
            Self::Rule(name) => write!(f, "rule {name}"),
            Self::Function(name) => write!(f, "function {name}"),
            Self::Global(name) => write!(f, "global ?*{name}*"),
            Self::Variable(name) => write!(f, "variable ?{name}"),
        }
    }
}

/// A failure raised by a user-defined function.
///
/// Inside the execution loop this never propagates: it is rendered as the
/// diagnostic string `"<kind>: <message>"` and handed back to the rule as
/// the call's result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct CallbackError {
    /// Short classification of the failure (e.g. `ValueError`, `Panic`).
    pub kind: String,
    /// Human-readable message.
    pub message: String,
}

impl CallbackError {
    /// Creates a callback error with an explicit kind.
    #[must_use]
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Creates a callback error of the generic `Error` kind.
    #[must_use]
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new("Error", message)
    }

    /// Creates the error reported for a callback that panicked.
    #[must_use]
    pub fn panicked(message: impl Into<String>) -> Self {
        Self::new("Panic", message)
    }

    /// Creates the error reported when no function has the given name.
    #[must_use]
    pub fn unknown_function(name: &str) -> Self {
        Self::new("NotFound", format!("no function named {name}"))
    }

    /// Renders the diagnostic value handed back to the rule.
    #[must_use]
    pub fn diagnostic(&self) -> String {
        self.to_string()
    }
}

/// Semantic limits (kill switches) that can be exceeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SemanticLimit {
    /// Maximum rule firings within one run exceeded.
    MaxActivations {
        /// The configured limit.
        limit: usize,
        /// The rule that would have fired next.
        rule: Option<String>,
    },
}

impl fmt::Display for SemanticLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaxActivations { limit, rule } => {
                write!(f, "max activations ({limit}) exceeded")?;
                if let Some(rule) = rule {
                    write!(f, " at rule {rule}")?;
                }
                Ok(())
            }
        }
    }
}

/// Context about where an error occurred.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The public operation that failed (e.g. `assert`, `run`).
    pub operation: Option<&'static str>,
    /// The rule whose actions were executing.
    pub rule: Option<String>,
    /// Frames from innermost to outermost.
    pub stack: Vec<String>,
}

impl ErrorContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the operation tag.
    #[must_use]
    pub fn with_operation(mut self, operation: &'static str) -> Self {
        self.operation = Some(operation);
        self
    }

    /// Adds a stack frame.
    #[must_use]
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.stack.push(frame.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(operation) = self.operation {
            write!(f, "in {operation}")?;
        }
        if !self.stack.is_empty() {
            writeln!(f)?;
            for frame in &self.stack {
                writeln!(f, "  in {frame}")?;
            }
        }
        Ok(())
    }
}
