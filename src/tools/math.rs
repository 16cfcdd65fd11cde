// SPDX-License-Identifier: MIT

use crate::error::WeftError;
use crate::tools::Tool;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

static TRIPLE_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "num": {
                "type": "number",
                "description": "The number to triple"
            }
        },
        "required": ["num"]
    })
});

#[derive(Debug, Serialize, Deserialize)]
pub struct TripleArgs {
    pub num: f64,
}

/// Multiplies a number by three. Mostly useful for proving that multi-tool
/// dispatch and async execution work end to end.
pub struct TripleTool;

#[async_trait]
impl Tool for TripleTool {
    fn name(&self) -> &str {
        "triple"
    }

    fn description(&self) -> &str {
        "Triples the given number: returns num multiplied by 3."
    }

    fn schema(&self) -> &Value {
        &TRIPLE_SCHEMA
    }

    async fn execute(&self, input: Value) -> Result<Value, WeftError> {
        let args: TripleArgs = serde_json::from_value(input)?;
        Ok(json!({ "result": args.num * 3.0 }))
    }
}
