//! Environment variable declarations.
//!
//! The module declares named variables with initial values; the player
//! keeps a mutable runtime copy that trigger expressions read.

use std::collections::HashMap;

use compas_core::value::Value;

/// Declared environment variables with initial values.
#[derive(Debug, Clone, Default)]
pub struct EnvVars {
    vars: HashMap<String, Value>,
}

impl EnvVars {
    /// Creates an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a variable with its initial value.
    pub fn declare(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    /// Returns the initial value of a variable.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Iterates over all declarations.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.vars.iter()
    }
}
