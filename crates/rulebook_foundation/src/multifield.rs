//! Multifield slot values.
//!
//! Backed by `im::Vector` so that a fact's list slots are shared, not copied,
//! when the fact is cloned into tokens, activations, and snapshots.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// An ordered sequence of values stored in a single slot.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Multifield(im::Vector<Value>);

impl Multifield {
    /// The empty multifield.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for `()`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Element at `index`, if any.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    /// Leading element.
    #[must_use]
    pub fn first(&self) -> Option<&Value> {
        self.0.front()
    }

    /// Membership by value equality.
    #[must_use]
    pub fn contains(&self, value: &Value) -> bool {
        self.0.iter().any(|v| v == value)
    }

    /// A copy with `value` added at the end. `self` is left as it was.
    #[must_use]
    pub fn appended(&self, value: Value) -> Self {
        let mut items = self.0.clone();
        items.push_back(value);
        Self(items)
    }

    /// Iterates in slot order.
    pub fn iter(&self) -> im::vector::Iter<'_, Value> {
        self.0.iter()
    }

    /// Copies the elements out into a plain `Vec`.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.iter().cloned().collect()
    }
}

impl fmt::Debug for Multifield {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

impl FromIterator<Value> for Multifield {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Multifield {
    type Item = &'a Value;
    type IntoIter = im::vector::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
