//! Engine layer integration tests: matching, conflict resolution, and rule
//! compilation.

mod agenda;
mod matching;

use std::sync::{Arc, Mutex};

use rulebook_engine::Environment;
use rulebook_foundation::{Type, Value};
use rulebook_storage::{SlotDef, Template};

/// An environment with `person` and `pet` templates.
pub fn household() -> Environment {
    let mut env = Environment::new();
    env.define_template(
        Template::new("person")
            .with_slot(SlotDef::single("name").with_type(Type::String))
            .with_slot(SlotDef::single("age").with_type(Type::Int)),
    )
    .unwrap();
    env.define_template(
        Template::new("pet")
            .with_slot(SlotDef::single("name").with_type(Type::String))
            .with_slot(SlotDef::single("owner").with_type(Type::String)),
    )
    .unwrap();
    env
}

/// Registers a `record` function that collects its first argument.
pub fn recorder(env: &mut Environment) -> Arc<Mutex<Vec<Value>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    env.define_function("record", move |args| {
        let value = args.first().cloned().unwrap_or_else(Value::nil);
        sink.lock().unwrap().push(value);
        Ok(Value::nil())
    });
    seen
}
