//! Template definitions for structured facts.
//!
//! A template names an ordered list of slots. Each slot constrains the types
//! it accepts, whether it holds one value or a list, and what to fill in when
//! an assertion leaves it out.

use std::collections::HashSet;
use std::sync::Arc;

use rulebook_foundation::{Error, Result, Type, Value};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Whether a slot holds a single value or a list of values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Multiplicity {
    /// Exactly one non-list value.
    Single,
    /// A list whose elements each satisfy the slot's types.
    Multi,
}

/// What a slot holds when an assertion does not name it.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SlotDefault {
    /// Derive a default from the slot's first allowed type.
    Derived,
    /// Use this value.
    Value(Value),
    /// The slot must always be given explicitly.
    Required,
}

/// Schema definition for a template slot.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SlotDef {
    /// Slot name.
    pub name: Arc<str>,
    /// Single value or list.
    pub multiplicity: Multiplicity,
    /// Allowed types (empty means any).
    pub types: Vec<Type>,
    /// Default when omitted.
    pub default: SlotDefault,
}

impl SlotDef {
    /// Creates a single-value slot accepting any type.
    #[must_use]
    pub fn single(name: impl AsRef<str>) -> Self {
        Self {
            name: Arc::from(name.as_ref()),
            multiplicity: Multiplicity::Single,
            types: Vec::new(),
            default: SlotDefault::Derived,
        }
    }

    /// Creates a list slot accepting any element type.
    #[must_use]
    pub fn multi(name: impl AsRef<str>) -> Self {
        Self {
            multiplicity: Multiplicity::Multi,
            ..Self::single(name)
        }
    }

    /// Restricts the slot to the given types.
    #[must_use]
    pub fn with_types(mut self, types: impl IntoIterator<Item = Type>) -> Self {
        self.types = types.into_iter().collect();
        self
    }

    /// Restricts the slot to a single type.
    #[must_use]
    pub fn with_type(self, ty: Type) -> Self {
        self.with_types([ty])
    }

    /// Sets an explicit default value.
    #[must_use]
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = SlotDefault::Value(value.into());
        self
    }

    /// Marks the slot as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.default = SlotDefault::Required;
        self
    }

    fn accepts_type(&self, ty: Type) -> bool {
        self.types.is_empty() || self.types.iter().any(|t| t.accepts(ty))
    }

    /// Checks a value against this slot's type and multiplicity.
    ///
    /// # Errors
    /// Returns a constraint error on a multiplicity violation and a type
    /// mismatch when the value (or a list element) has a disallowed type.
    pub fn check(&self, value: &Value) -> Result<()> {
        match (self.multiplicity, value) {
            (Multiplicity::Single, Value::List(_)) => Err(Error::constraint(format!(
                "slot {} holds a single value, got a list",
                self.name
            ))),
            (Multiplicity::Single, v) => {
                if self.accepts_type(v.value_type()) {
                    Ok(())
                } else {
                    Err(Error::type_mismatch(
                        self.name.as_ref(),
                        self.types.clone(),
                        v.value_type(),
                    ))
                }
            }
            (Multiplicity::Multi, Value::List(items)) => {
                for item in items {
                    if let Value::List(_) = item {
                        return Err(Error::constraint(format!(
                            "slot {} cannot nest lists",
                            self.name
                        )));
                    }
                    if !self.accepts_type(item.value_type()) {
                        return Err(Error::type_mismatch(
                            self.name.as_ref(),
                            self.types.clone(),
                            item.value_type(),
                        ));
                    }
                }
                Ok(())
            }
            (Multiplicity::Multi, _) => Err(Error::constraint(format!(
                "slot {} holds a list, got a single value",
                self.name
            ))),
        }
    }

    /// Returns the value used when an assertion omits this slot.
    ///
    /// # Errors
    /// Returns a constraint error if the slot is required.
    pub fn default_value(&self) -> Result<Value> {
        match &self.default {
            SlotDefault::Value(v) => Ok(v.clone()),
            SlotDefault::Required => Err(Error::constraint(format!(
                "slot {} requires a value",
                self.name
            ))),
            SlotDefault::Derived => Ok(match self.multiplicity {
                Multiplicity::Multi => Value::list([]),
                Multiplicity::Single => match self.types.first() {
                    Some(Type::Int | Type::Number) => Value::Int(0),
                    Some(Type::Float) => Value::Float(0.0),
                    Some(Type::String) => Value::from(""),
                    Some(Type::Bool) => Value::Bool(false),
                    Some(Type::Symbol | Type::List | Type::Any) | None => Value::nil(),
                },
            }),
        }
    }
}

/// Named schema constraining a fact's slots.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Template {
    /// Template name.
    pub name: Arc<str>,
    /// Slot definitions, in fact value order.
    pub slots: Vec<SlotDef>,
}

impl Template {
    /// Creates a template with no slots.
    #[must_use]
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: Arc::from(name.as_ref()),
            slots: Vec::new(),
        }
    }

    /// Adds a slot.
    #[must_use]
    pub fn with_slot(mut self, slot: SlotDef) -> Self {
        self.slots.push(slot);
        self
    }

    /// Returns the position of a slot by name.
    #[must_use]
    pub fn slot_index(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|s| &*s.name == name)
    }

    /// Returns a slot definition by name.
    #[must_use]
    pub fn slot(&self, name: &str) -> Option<&SlotDef> {
        self.slots.iter().find(|s| &*s.name == name)
    }

    /// Checks that the template itself is well formed.
    ///
    /// # Errors
    /// Returns a constraint error for an empty name, duplicate slot names,
    /// or an explicit default that violates its own slot.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::constraint("template name is empty"));
        }
        let mut seen = HashSet::new();
        for slot in &self.slots {
            if !seen.insert(slot.name.clone()) {
                return Err(Error::constraint(format!(
                    "template {} declares slot {} twice",
                    self.name, slot.name
                )));
            }
            if let SlotDefault::Value(v) = &slot.default {
                slot.check(v)?;
            }
        }
        Ok(())
    }

    /// Checks positional values against the slots.
    ///
    /// # Errors
    /// Returns a constraint error on an arity mismatch or any slot violation.
    pub fn check_values(&self, values: &[Value]) -> Result<()> {
        if values.len() != self.slots.len() {
            return Err(Error::constraint(format!(
                "template {} has {} slots, got {} values",
                self.name,
                self.slots.len(),
                values.len()
            )));
        }
        for (slot, value) in self.slots.iter().zip(values) {
            slot.check(value)?;
        }
        Ok(())
    }

    /// Builds positional values from named slot assignments, filling the rest
    /// from slot defaults.
    ///
    /// # Errors
    /// Returns a constraint error for unknown or repeated slot names, and for
    /// omitted required slots.
    pub fn resolve_slots(&self, assignments: &[(&str, Value)]) -> Result<Vec<Value>> {
        let mut values: Vec<Option<Value>> = vec![None; self.slots.len()];
        for (name, value) in assignments {
            let idx = self.slot_index(name).ok_or_else(|| {
                Error::constraint(format!("template {} has no slot {name}", self.name))
            })?;
            if values[idx].is_some() {
                return Err(Error::constraint(format!("slot {name} assigned twice")));
            }
            values[idx] = Some(value.clone());
        }
        self.slots
            .iter()
            .zip(values)
            .map(|(slot, value)| match value {
                Some(v) => Ok(v),
                None => slot.default_value(),
            })
            .collect()
    }
}
