//! Slot type constraints.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A type a template slot may allow.
///
/// A slot lists the types it allows; a value fits if any of them
/// [`accepts`](Type::accepts) the value's own [`value_type`](crate::Value::value_type).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Type {
    /// Integer.
    Int,
    /// Floating point.
    Float,
    /// Either numeric kind.
    Number,
    /// String.
    String,
    /// Symbol, including `nil`.
    Symbol,
    /// Boolean.
    Bool,
    /// Multifield.
    List,
    /// No restriction.
    Any,
}

impl Type {
    /// Lower-case name used in diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Int => "integer",
            Self::Float => "float",
            Self::Number => "number",
            Self::String => "string",
            Self::Symbol => "symbol",
            Self::Bool => "boolean",
            Self::List => "list",
            Self::Any => "any",
        }
    }

    /// Whether a slot of this type takes a value of type `actual`.
    ///
    /// Ints are accepted where floats are expected; the reverse is not.
    #[must_use]
    pub fn accepts(self, actual: Type) -> bool {
        match self {
            Self::Any => true,
            Self::Number => matches!(actual, Self::Int | Self::Float),
            Self::Float => matches!(actual, Self::Int | Self::Float),
            exact => exact == actual,
        }
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
