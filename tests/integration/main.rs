//! End-to-end tests across the engine, tracing, and snapshot crates.

mod callbacks;
mod snapshots;
mod traces;

use rulebook_engine::Environment;
use rulebook_foundation::{Type, Value};
use rulebook_storage::{SlotDef, Template};

/// An environment with a `task` template.
pub fn tasks() -> Environment {
    let mut env = Environment::new();
    env.define_template(
        Template::new("task")
            .with_slot(SlotDef::single("name").with_type(Type::String).required())
            .with_slot(
                SlotDef::single("status")
                    .with_type(Type::Symbol)
                    .with_default(Value::symbol("open")),
            )
            .with_slot(SlotDef::single("priority").with_type(Type::Int)),
    )
    .unwrap();
    env
}
