//! Core values, identifiers, and errors for Rulebook.
//!
//! This crate provides:
//! - [`Value`] - The tagged union carried by facts, bindings, and callbacks
//! - [`FactId`] - Monotonic fact identifiers
//! - [`Type`] - Type descriptors for template slot constraints
//! - [`Error`] - Typed errors with operation context
//! - [`Multifield`] - Shared list storage for multifield slots

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod fact_id;
pub mod multifield;
pub mod types;
pub mod value;

pub use error::{CallbackError, Error, ErrorContext, ErrorKind, Missing, SemanticLimit};
pub use fact_id::FactId;
pub use multifield::Multifield;
pub use types::Type;
pub use value::Value;

/// Result type alias using the Rulebook error type.
pub type Result<T> = std::result::Result<T, Error>;
