// SPDX-License-Identifier: MIT

//! Prebuilt reason/act agent loop
//!
//! Wires a [`ReasonNode`] and a [`ToolNode`] into the classic two-node cycle:
//! the model reasons, a conditional edge inspects its reply, tool calls are
//! dispatched, and results loop back for another reasoning turn until the
//! model answers in plain text. Conversation history lives in the `messages`
//! state field under the append reducer, so every superstep's contribution
//! accumulates and survives checkpointing.

pub mod dispatch;
pub mod reason;

pub use dispatch::ToolNode;
pub use reason::ReasonNode;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{EngineError, GraphError, WeftError};
use crate::graph::{CompiledGraph, GraphBuilder, END};
use crate::llm::{Message, Model};
use crate::state::{Reducer, StateSchema, StateUpdate, WorkflowState};
use crate::tools::Tool;

/// Node id of the reasoning step.
pub const AGENT_REASON: &str = "agent_reason";

/// Node id of the tool dispatch step.
pub const ACT: &str = "act";

/// State field holding the conversation history.
pub const MESSAGES: &str = "messages";

/// Default instruction prepended to every reasoning call.
pub const SYSTEM_INSTRUCTION: &str = "You are a helpful assistant. \
Use the available tools whenever a question needs current or computed \
information instead of guessing. If a tool call fails, read the error \
message, correct the arguments, and try again. Answer in plain text once \
you have what you need.";

/// Injected after a tool batch that contained failures.
pub const CORRECTIVE_NUDGE: &str = "One or more tool calls failed. Inspect \
the error messages, fix the arguments and retry, or answer from what you \
already know.";

/// Deserialize the conversation history out of state.
///
/// A missing `messages` field reads as an empty conversation; a present but
/// malformed one is an error, since it means some node wrote garbage.
pub fn conversation(state: &WorkflowState) -> Result<Vec<Message>, WeftError> {
    match state.get(MESSAGES) {
        None => Ok(Vec::new()),
        Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
            EngineError::InvalidState(format!("'{MESSAGES}' is not a message list: {e}")).into()
        }),
    }
}

/// Wrap new messages as a partial update against the `messages` field.
pub fn message_update(messages: Vec<Message>) -> Result<StateUpdate, WeftError> {
    let mut update = StateUpdate::new();
    update.insert(MESSAGES.to_string(), serde_json::to_value(messages)?);
    Ok(update)
}

/// Route after a reasoning turn: dispatch tools if the model asked for any,
/// otherwise finish.
///
/// Reads the raw JSON rather than deserializing, so a malformed history
/// degrades to termination instead of a panic inside a decision function.
pub fn should_continue(state: &WorkflowState) -> Vec<String> {
    let wants_tools = state
        .get(MESSAGES)
        .and_then(Value::as_array)
        .and_then(|messages| messages.last())
        .and_then(|last| last.get("tool_calls"))
        .and_then(Value::as_array)
        .map(|calls| !calls.is_empty())
        .unwrap_or(false);

    if wants_tools {
        vec![ACT.to_string()]
    } else {
        vec![END.to_string()]
    }
}

/// Assemble the reason/act loop over `model` and `tools`.
pub fn build_react_graph(
    model: Arc<dyn Model>,
    tools: Vec<Arc<dyn Tool>>,
) -> Result<CompiledGraph, GraphError> {
    let reason = ReasonNode::new(model, SYSTEM_INSTRUCTION, tools.clone());
    let act = ToolNode::new(tools).with_failure_hook(CORRECTIVE_NUDGE);

    GraphBuilder::new(StateSchema::new().field(MESSAGES, Reducer::Append))
        .add_node(AGENT_REASON, Arc::new(reason))
        .add_node(ACT, Arc::new(act))
        .set_entry(AGENT_REASON)
        .add_conditional_edge(
            AGENT_REASON,
            should_continue,
            HashMap::from([
                (ACT.to_string(), ACT.to_string()),
                (END.to_string(), END.to_string()),
            ]),
        )
        .add_edge(ACT, AGENT_REASON)
        .compile()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::MemorySaver;
    use crate::engine::Engine;
    use crate::error::ModelError;
    use crate::llm::ToolCall;
    use crate::tools::TripleTool;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Plays back a scripted sequence of replies, one per call.
    struct ScriptedModel {
        turns: Vec<Message>,
        cursor: AtomicUsize,
    }

    impl ScriptedModel {
        fn new(turns: Vec<Message>) -> Self {
            Self {
                turns,
                cursor: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Model for ScriptedModel {
        async fn generate(
            &self,
            _history: &[Message],
            _tools: &[Arc<dyn Tool>],
        ) -> Result<Message, ModelError> {
            let i = self.cursor.fetch_add(1, Ordering::SeqCst);
            self.turns
                .get(i)
                .cloned()
                .ok_or_else(|| ModelError::Api {
                    provider: "scripted".to_string(),
                    message: format!("no scripted turn {i}"),
                })
        }
    }

    fn history_state(messages: Vec<Message>) -> WorkflowState {
        let mut state = WorkflowState::empty();
        state.update(MESSAGES, serde_json::to_value(messages).unwrap());
        state
    }

    #[test]
    fn test_routes_to_act_on_tool_calls() {
        let state = history_state(vec![Message::assistant_with_calls(
            "",
            vec![ToolCall::new("triple", json!({"num": 2}))],
        )]);
        assert_eq!(should_continue(&state), vec![ACT.to_string()]);
    }

    #[test]
    fn test_routes_to_end_on_plain_answer() {
        let state = history_state(vec![Message::assistant("done")]);
        assert_eq!(should_continue(&state), vec![END.to_string()]);
    }

    #[test]
    fn test_routes_to_end_on_empty_history() {
        assert_eq!(should_continue(&WorkflowState::empty()), vec![END.to_string()]);
    }

    #[test]
    fn test_conversation_rejects_garbage() {
        let mut state = WorkflowState::empty();
        state.update(MESSAGES, json!([{"not": "a message"}]));
        assert!(conversation(&state).is_err());
        assert!(conversation(&WorkflowState::empty()).unwrap().is_empty());
    }

    #[test]
    fn test_graph_topology() {
        let model = Arc::new(ScriptedModel::new(Vec::new()));
        let graph = build_react_graph(model, vec![Arc::new(TripleTool)]).unwrap();

        assert_eq!(graph.entry(), AGENT_REASON);
        assert_eq!(graph.edges_from(ACT), &[AGENT_REASON.to_string()]);
        let rendered = graph.to_mermaid();
        assert!(rendered.contains("agent_reason -. act .-> act"));
        assert!(rendered.contains("agent_reason -. __end__ .-> __end__([end])"));
    }

    #[tokio::test]
    async fn test_full_loop_with_tool_round() {
        let call = ToolCall::new("triple", json!({"num": 7}));
        let model = Arc::new(ScriptedModel::new(vec![
            Message::assistant_with_calls("", vec![call]),
            Message::assistant("21"),
        ]));
        let graph = build_react_graph(model, vec![Arc::new(TripleTool)]).unwrap();
        let engine = Engine::new(graph, Arc::new(MemorySaver::new()));

        let result = engine
            .invoke("t1", message_update(vec![Message::user("triple 7?")]).unwrap())
            .await
            .unwrap();

        assert!(result.is_terminated());
        let history = conversation(result.state()).unwrap();
        assert_eq!(history.len(), 4);
        assert!(history[1].has_tool_calls());
        assert_eq!(history[2].tool_call_id, Some(history[1].tool_calls[0].id.clone()));
        assert!(history[2].content.contains("21"));
        assert_eq!(history[3].content, "21");
    }

    #[tokio::test]
    async fn test_loop_retries_after_tool_error() {
        let bad = ToolCall::new("triple", json!({"num": "seven"}));
        let good = ToolCall::new("triple", json!({"num": 7.0}));
        let model = Arc::new(ScriptedModel::new(vec![
            Message::assistant_with_calls("", vec![bad]),
            Message::assistant_with_calls("", vec![good]),
            Message::assistant("21"),
        ]));
        let graph = build_react_graph(model, vec![Arc::new(TripleTool)]).unwrap();
        let engine = Engine::new(graph, Arc::new(MemorySaver::new()));

        let result = engine
            .invoke("t1", message_update(vec![Message::user("triple 7?")]).unwrap())
            .await
            .unwrap();

        assert!(result.is_terminated());
        let history = conversation(result.state()).unwrap();
        // user, bad call, error + nudge, retry call, result, answer
        assert!(history.iter().any(|m| m.is_error()));
        assert!(history
            .iter()
            .any(|m| m.role == crate::llm::Role::System && m.content == CORRECTIVE_NUDGE));
        assert_eq!(history.last().unwrap().content, "21");
    }
}
