//! Working memory.
//!
//! The fact store owns every asserted fact and the templates they reference.
//! It validates facts against their templates and hands out monotonically
//! increasing ids. Keeping the pattern network in step with it is the
//! caller's job; the store knows nothing about rules.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use rulebook_foundation::{Error, FactId, Missing, Result, Value};
use tracing::debug;

use crate::fact::Fact;
use crate::template::Template;

/// Result of an assertion.
#[derive(Clone, Debug)]
pub enum Assertion {
    /// A new fact entered working memory.
    Asserted(Arc<Fact>),
    /// Duplication is disabled and an identical fact already exists.
    Duplicate(FactId),
}

impl Assertion {
    /// Returns the id of the asserted or pre-existing fact.
    #[must_use]
    pub fn id(&self) -> FactId {
        match self {
            Self::Asserted(fact) => fact.id,
            Self::Duplicate(id) => *id,
        }
    }
}

type FactKey = (Option<Arc<str>>, Vec<Value>);

/// Working memory: templates plus asserted facts.
#[derive(Clone, Debug)]
pub struct FactStore {
    templates: BTreeMap<Arc<str>, Arc<Template>>,
    facts: BTreeMap<FactId, Arc<Fact>>,
    /// Content index, only maintained when duplication is disabled.
    content: HashMap<FactKey, FactId>,
    allow_duplicates: bool,
    next_id: u64,
}

impl Default for FactStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FactStore {
    /// Creates an empty store that allows duplicate facts.
    #[must_use]
    pub fn new() -> Self {
        Self::with_duplicates(true)
    }

    /// Creates an empty store with the given duplication policy.
    #[must_use]
    pub fn with_duplicates(allow_duplicates: bool) -> Self {
        Self {
            templates: BTreeMap::new(),
            facts: BTreeMap::new(),
            content: HashMap::new(),
            allow_duplicates,
            next_id: 1,
        }
    }

    /// Returns whether identical facts may coexist.
    #[must_use]
    pub fn allows_duplicates(&self) -> bool {
        self.allow_duplicates
    }

    // -------------------------------------------------------------------------
    // Templates
    // -------------------------------------------------------------------------

    /// Defines or replaces a template.
    ///
    /// # Errors
    /// Returns a constraint error if the template is malformed, or if it
    /// would replace a different template that facts still reference.
    pub fn define_template(&mut self, template: Template) -> Result<Arc<Template>> {
        template.validate()?;
        if let Some(existing) = self.templates.get(&template.name) {
            if **existing == template {
                return Ok(existing.clone());
            }
            if self.facts_of(&template.name).next().is_some() {
                return Err(Error::constraint(format!(
                    "template {} is in use by existing facts",
                    template.name
                )));
            }
        }
        let template = Arc::new(template);
        self.templates
            .insert(template.name.clone(), template.clone());
        debug!(template = %template.name, slots = template.slots.len(), "template defined");
        Ok(template)
    }

    /// Removes a template.
    ///
    /// # Errors
    /// Returns not-found for an unknown name and a constraint error if facts
    /// still reference it.
    pub fn undefine_template(&mut self, name: &str) -> Result<()> {
        if !self.templates.contains_key(name) {
            return Err(Error::not_found(Missing::Template(name.to_string())));
        }
        if self.facts_of(name).next().is_some() {
            return Err(Error::constraint(format!(
                "template {name} is in use by existing facts"
            )));
        }
        self.templates.remove(name);
        Ok(())
    }

    /// Returns a template by name.
    #[must_use]
    pub fn template(&self, name: &str) -> Option<&Arc<Template>> {
        self.templates.get(name)
    }

    /// Returns a template by name or a not-found error.
    ///
    /// # Errors
    /// Returns not-found for an unknown name.
    pub fn require_template(&self, name: &str) -> Result<&Arc<Template>> {
        self.template(name)
            .ok_or_else(|| Error::not_found(Missing::Template(name.to_string())))
    }

    /// Iterates templates in name order.
    pub fn templates(&self) -> impl Iterator<Item = &Arc<Template>> {
        self.templates.values()
    }

    // -------------------------------------------------------------------------
    // Facts
    // -------------------------------------------------------------------------

    /// Asserts a fact with positional values.
    ///
    /// # Errors
    /// Returns not-found for an unknown template and a constraint error if
    /// the values violate it (or an ordered fact is empty).
    pub fn assert(&mut self, template: Option<&str>, values: Vec<Value>) -> Result<Assertion> {
        let template = match template {
            Some(name) => {
                let t = self.require_template(name)?;
                t.check_values(&values)?;
                Some(t.name.clone())
            }
            None => {
                if values.is_empty() {
                    return Err(Error::constraint("ordered fact has no values"));
                }
                None
            }
        };

        if !self.allow_duplicates {
            let key = (template.clone(), values.clone());
            if let Some(existing) = self.content.get(&key) {
                return Ok(Assertion::Duplicate(*existing));
            }
        }

        let id = FactId::new(self.next_id);
        self.next_id += 1;
        let fact = Arc::new(Fact {
            id,
            template,
            values,
        });
        if !self.allow_duplicates {
            self.content
                .insert((fact.template.clone(), fact.values.clone()), id);
        }
        self.facts.insert(id, fact.clone());
        debug!(fact = %fact, "fact asserted");
        Ok(Assertion::Asserted(fact))
    }

    /// Asserts a templated fact from named slot assignments.
    ///
    /// # Errors
    /// Returns not-found for an unknown template and a constraint error for
    /// unknown, repeated, missing-required, or ill-typed slots.
    pub fn assert_slots(&mut self, template: &str, slots: &[(&str, Value)]) -> Result<Assertion> {
        let values = self.require_template(template)?.resolve_slots(slots)?;
        self.assert(Some(template), values)
    }

    /// Retracts a fact, returning it.
    ///
    /// # Errors
    /// Returns not-found if the id is not in working memory.
    pub fn retract(&mut self, id: FactId) -> Result<Arc<Fact>> {
        let fact = self.facts.remove(&id).ok_or_else(|| Error::fact_not_found(id))?;
        if !self.allow_duplicates {
            self.content
                .remove(&(fact.template.clone(), fact.values.clone()));
        }
        debug!(fact = %fact, "fact retracted");
        Ok(fact)
    }

    /// Computes the values of a templated fact with some slots replaced.
    ///
    /// The fact itself is left untouched; callers retract and reassert.
    ///
    /// # Errors
    /// Returns not-found for an unknown fact, and a constraint error if the
    /// fact is ordered or a change names an unknown slot or violates it.
    pub fn modified_values(&self, id: FactId, changes: &[(&str, Value)]) -> Result<Vec<Value>> {
        let fact = self.get(id)?;
        let Some(name) = &fact.template else {
            return Err(Error::constraint(format!(
                "fact {id} is ordered and has no named slots"
            )));
        };
        let template = self.require_template(name)?;
        let mut values = fact.values.clone();
        for (slot, value) in changes {
            let idx = template.slot_index(slot).ok_or_else(|| {
                Error::constraint(format!("template {name} has no slot {slot}"))
            })?;
            template.slots[idx].check(value)?;
            values[idx] = value.clone();
        }
        Ok(values)
    }

    /// Returns a fact by id.
    ///
    /// # Errors
    /// Returns not-found if the id is not in working memory.
    pub fn get(&self, id: FactId) -> Result<&Arc<Fact>> {
        self.facts.get(&id).ok_or_else(|| Error::fact_not_found(id))
    }

    /// Returns true if the fact is in working memory.
    #[must_use]
    pub fn contains(&self, id: FactId) -> bool {
        self.facts.contains_key(&id)
    }

    /// Iterates all facts in id (assertion) order.
    pub fn all(&self) -> impl Iterator<Item = &Arc<Fact>> {
        self.facts.values()
    }

    /// Iterates the facts of one template in id order.
    pub fn facts_of<'a>(&'a self, template: &'a str) -> impl Iterator<Item = &'a Arc<Fact>> + 'a {
        self.facts
            .values()
            .filter(move |f| f.template.as_deref() == Some(template))
    }

    /// Returns the number of facts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.facts.len()
    }

    /// Returns true if working memory is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Returns the id the next assertion will receive.
    #[must_use]
    pub fn next_id(&self) -> FactId {
        FactId::new(self.next_id)
    }

    /// Removes every fact, keeping templates. Ids are not reused afterwards.
    pub fn clear_facts(&mut self) {
        self.facts.clear();
        self.content.clear();
    }

    /// Removes every fact and template. Ids are not reused afterwards.
    pub fn clear(&mut self) {
        self.clear_facts();
        self.templates.clear();
    }
}
