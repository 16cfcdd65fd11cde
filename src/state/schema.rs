// SPDX-License-Identifier: MIT

//! State schema definitions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Schema defining the workflow state structure.
///
/// Declared once at graph definition time; the engine derives each field's
/// merge behavior from it for the whole run.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct StateSchema {
    /// Field definitions
    #[serde(flatten)]
    pub fields: HashMap<String, FieldDef>,
}

/// Definition of a single state field
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct FieldDef {
    /// Reducer for merging values
    #[serde(default)]
    pub reducer: Reducer,
    /// Default value
    pub default: Option<serde_json::Value>,
}

/// Merge rules for folding partial updates into state
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Reducer {
    /// Replace the value (default)
    #[default]
    Replace,
    /// Append to array
    Append,
}

impl StateSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field with the given reducer.
    pub fn field(mut self, name: impl Into<String>, reducer: Reducer) -> Self {
        self.fields.insert(
            name.into(),
            FieldDef {
                reducer,
                default: None,
            },
        );
        self
    }

    /// Declare a field with a reducer and a default value.
    pub fn field_with_default(
        mut self,
        name: impl Into<String>,
        reducer: Reducer,
        default: serde_json::Value,
    ) -> Self {
        self.fields.insert(
            name.into(),
            FieldDef {
                reducer,
                default: Some(default),
            },
        );
        self
    }
}
