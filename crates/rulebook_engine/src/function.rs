//! User-defined functions callable from rule actions.
//!
//! A function failing in any way (an error result, a panic, or simply not
//! existing) is reported as a [`CallbackError`] at the call boundary. The
//! executor turns that into a diagnostic value; the host-facing
//! [`Environment::call_function`](crate::Environment::call_function)
//! propagates it instead.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use rulebook_foundation::{CallbackError, Value};

/// A host callback.
pub type UserFunction = Arc<dyn Fn(&[Value]) -> Result<Value, CallbackError> + Send + Sync>;

/// Named user functions.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: BTreeMap<Arc<str>, UserFunction>,
}

impl FunctionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a name to a callback, replacing any previous binding.
    pub fn define<F>(&mut self, name: impl AsRef<str>, function: F)
    where
        F: Fn(&[Value]) -> Result<Value, CallbackError> + Send + Sync + 'static,
    {
        self.functions
            .insert(Arc::from(name.as_ref()), Arc::new(function));
    }

    /// Removes a binding. Returns true if it existed.
    pub fn undefine(&mut self, name: &str) -> bool {
        self.functions.remove(name).is_some()
    }

    /// Returns true if a function has the name.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Iterates function names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(|name| &**name)
    }

    /// Returns the number of functions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Returns true if no functions are defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Calls a function, containing every failure.
    ///
    /// # Errors
    /// Returns the callback's own error, a `Panic` error if it panicked, or a
    /// `NotFound` error if no function has the name.
    pub fn invoke(&self, name: &str, args: &[Value]) -> Result<Value, CallbackError> {
        let function = self
            .functions
            .get(name)
            .ok_or_else(|| CallbackError::unknown_function(name))?;
        panic::catch_unwind(AssertUnwindSafe(|| function(args)))
            .unwrap_or_else(|payload| Err(CallbackError::panicked(panic_message(payload.as_ref()))))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "callback panicked".to_string()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}
