//! Asserted facts.

use std::fmt;
use std::sync::Arc;

use rulebook_foundation::{FactId, Value};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An asserted fact.
///
/// Facts are immutable. Changing one means retracting it and asserting a
/// replacement, which receives a fresh id.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Fact {
    /// Identifier assigned at assertion.
    pub id: FactId,
    /// Template name, or `None` for an ordered fact.
    pub template: Option<Arc<str>>,
    /// Slot values in template order (or list order for ordered facts).
    pub values: Vec<Value>,
}

impl Fact {
    /// Returns true if this is an ordered (template-less) fact.
    #[must_use]
    pub fn is_ordered(&self) -> bool {
        self.template.is_none()
    }

    /// Returns the value at a slot position.
    #[must_use]
    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Returns the relation name of an ordered fact (its leading symbol).
    #[must_use]
    pub fn relation(&self) -> Option<&str> {
        if self.is_ordered() {
            self.values.first().and_then(Value::as_symbol)
        } else {
            None
        }
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (", self.id)?;
        if let Some(template) = &self.template {
            write!(f, "{template}")?;
            if !self.values.is_empty() {
                write!(f, " ")?;
            }
        }
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{value}")?;
        }
        write!(f, ")")
    }
}
