// SPDX-License-Identifier: MIT

//! Reasoning node - one model call per superstep

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::WeftError;
use crate::graph::Node;
use crate::llm::{Message, Model};
use crate::state::{StateUpdate, WorkflowState};
use crate::tools::Tool;

use super::{conversation, message_update};

/// Calls the reasoning model over the conversation so far.
///
/// The system instruction is prepended on every call rather than stored in
/// state, so checkpointed threads pick up instruction changes on resume. The
/// model's reply, whether plain text or a tool-call request, is appended to
/// the `messages` field. Model errors are fatal: they propagate and the
/// engine halts the run without writing a checkpoint.
pub struct ReasonNode {
    model: Arc<dyn Model>,
    instruction: String,
    tools: Vec<Arc<dyn Tool>>,
}

impl ReasonNode {
    pub fn new(
        model: Arc<dyn Model>,
        instruction: impl Into<String>,
        tools: Vec<Arc<dyn Tool>>,
    ) -> Self {
        Self {
            model,
            instruction: instruction.into(),
            tools,
        }
    }
}

#[async_trait]
impl Node for ReasonNode {
    async fn run(&self, state: &WorkflowState) -> Result<StateUpdate, WeftError> {
        let mut history = vec![Message::system(&self.instruction)];
        history.extend(conversation(state)?);

        log::debug!("reasoning over {} prior messages", history.len() - 1);
        let response = self.model.generate(&history, &self.tools).await?;

        if response.has_tool_calls() {
            log::info!(
                "model requested {} tool call(s): {:?}",
                response.tool_calls.len(),
                response
                    .tool_calls
                    .iter()
                    .map(|c| c.name.as_str())
                    .collect::<Vec<_>>()
            );
        }

        message_update(vec![response])
    }
}
