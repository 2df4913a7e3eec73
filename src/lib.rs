//! Rulebook - Forward-chaining production rule engine
//!
//! This crate re-exports all layers of the Rulebook system for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 4: rulebook_debug      - Event tracing and trace formatting
//! Layer 3: rulebook_runtime    - Snapshots, CLI
//! Layer 2: rulebook_engine     - Rete network, agenda, execution loop, Environment
//! Layer 1: rulebook_storage    - Templates and the fact store
//! Layer 0: rulebook_foundation - Core types (Value, FactId, Error)
//! ```

pub use rulebook_debug as debug;
pub use rulebook_engine as engine;
pub use rulebook_foundation as foundation;
pub use rulebook_runtime as runtime;
pub use rulebook_storage as storage;
