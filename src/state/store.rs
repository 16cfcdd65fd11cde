// SPDX-License-Identifier: MIT

//! Runtime state storage for graph execution

use serde_json::Value;
use std::collections::HashMap;

use super::schema::{Reducer, StateSchema};

/// A partial update produced by one node in one superstep.
///
/// Only the fields present merge into state; absent fields stay untouched.
pub type StateUpdate = HashMap<String, Value>;

/// Runtime workflow state with reducer support
#[derive(Debug, Clone)]
pub struct WorkflowState {
    /// Current state values
    fields: HashMap<String, Value>,
    /// Reducers for each field
    reducers: HashMap<String, Reducer>,
}

impl WorkflowState {
    /// Create a new WorkflowState from a schema, with defaults applied
    pub fn new(schema: &StateSchema) -> Self {
        let mut fields = HashMap::new();
        let mut reducers = HashMap::new();

        for (name, def) in &schema.fields {
            if let Some(default) = &def.default {
                fields.insert(name.clone(), default.clone());
            }
            reducers.insert(name.clone(), def.reducer);
        }

        Self { fields, reducers }
    }

    /// Create an empty WorkflowState
    pub fn empty() -> Self {
        Self {
            fields: HashMap::new(),
            reducers: HashMap::new(),
        }
    }

    /// Rehydrate from a checkpoint snapshot.
    ///
    /// Snapshot fields are authoritative: they land as-is, bypassing both
    /// reducers and schema defaults. Fields the schema gained since the
    /// snapshot was taken still pick up their defaults.
    pub fn from_snapshot(schema: &StateSchema, snapshot: HashMap<String, Value>) -> Self {
        let mut state = Self::new(schema);
        state.fields.extend(snapshot);
        state
    }

    /// Update a field using the appropriate reducer
    pub fn update(&mut self, key: &str, value: Value) {
        let reducer = self.reducers.get(key).copied().unwrap_or(Reducer::Replace);

        match reducer {
            Reducer::Replace => {
                self.fields.insert(key.to_string(), value);
            }
            Reducer::Append => {
                let arr = self
                    .fields
                    .entry(key.to_string())
                    .or_insert(Value::Array(vec![]));
                if let Value::Array(a) = arr {
                    match value {
                        Value::Array(new_items) => a.extend(new_items),
                        other => a.push(other),
                    }
                }
            }
        }
    }

    /// Merge a whole partial update, field by field
    pub fn apply(&mut self, update: StateUpdate) {
        for (key, value) in update {
            self.update(&key, value);
        }
    }

    /// Get a field value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Get a nested field value using dot notation (e.g., "result.intent")
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let parts: Vec<&str> = path.split('.').collect();
        if parts.is_empty() {
            return None;
        }

        let mut current = self.fields.get(parts[0])?;
        for part in &parts[1..] {
            current = current.get(part)?;
        }
        Some(current)
    }

    /// The serializable field map stored in checkpoints
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.fields.clone()
    }
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self::empty()
    }
}
