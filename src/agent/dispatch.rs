// SPDX-License-Identifier: MIT

//! Tool dispatcher node

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future;

use crate::error::WeftError;
use crate::graph::Node;
use crate::llm::Message;
use crate::state::{StateUpdate, WorkflowState};
use crate::tools::Tool;

use super::{conversation, message_update};

/// Executes every tool call requested by the latest assistant turn.
///
/// Calls run concurrently; responses land in request order, each keyed to its
/// call id. Tool failures are recoverable: an unknown tool name or an
/// execution error becomes an `Error: ...` tool message the model sees on the
/// next reasoning turn, and the run continues.
pub struct ToolNode {
    tools: HashMap<String, Arc<dyn Tool>>,
    /// Corrective instruction appended after a batch containing failures
    failure_hook: Option<String>,
}

impl ToolNode {
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Self {
        let tools = tools
            .into_iter()
            .map(|t| (t.name().to_string(), t))
            .collect();
        Self {
            tools,
            failure_hook: None,
        }
    }

    /// Append `nudge` as a system message whenever a batch contains at least
    /// one failed call.
    pub fn with_failure_hook(mut self, nudge: impl Into<String>) -> Self {
        self.failure_hook = Some(nudge.into());
        self
    }
}

#[async_trait]
impl Node for ToolNode {
    async fn run(&self, state: &WorkflowState) -> Result<StateUpdate, WeftError> {
        let history = conversation(state)?;
        let calls = history
            .last()
            .map(|m| m.tool_calls.clone())
            .unwrap_or_default();

        if calls.is_empty() {
            log::warn!("tool dispatcher ran with no pending tool calls");
            return Ok(StateUpdate::new());
        }

        log::info!("dispatching {} tool call(s)", calls.len());

        let mut handles = Vec::with_capacity(calls.len());
        for call in calls {
            let tool = self.tools.get(&call.name).cloned();
            handles.push(tokio::spawn(async move {
                let content = match tool {
                    Some(tool) => match tool.execute(call.arguments).await {
                        Ok(value) => value.to_string(),
                        Err(e) => {
                            log::error!("tool '{}' failed: {}", call.name, e);
                            format!("Error: {e}")
                        }
                    },
                    None => {
                        log::error!("model requested unknown tool '{}'", call.name);
                        format!("Error: tool '{}' is not registered", call.name)
                    }
                };
                Message::tool(call.id, content)
            }));
        }

        let mut responses = Vec::with_capacity(handles.len());
        for joined in future::join_all(handles).await {
            let message =
                joined.map_err(|e| WeftError::other(format!("tool task aborted: {e}")))?;
            responses.push(message);
        }

        if responses.iter().any(|m| m.is_error()) {
            if let Some(nudge) = &self.failure_hook {
                responses.push(Message::system(nudge.clone()));
            }
        }

        message_update(responses)
    }
}
