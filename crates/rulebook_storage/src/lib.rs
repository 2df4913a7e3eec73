//! Templates and the fact store for Rulebook.
//!
//! This crate provides:
//! - [`Template`] - Named slot schemas constraining templated facts
//! - [`Fact`] - An immutable asserted datum
//! - [`FactStore`] - Working memory with monotonic fact ids

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod fact;
pub mod store;
pub mod template;

pub use fact::Fact;
pub use store::{Assertion, FactStore};
pub use template::{Multiplicity, SlotDef, SlotDefault, Template};
