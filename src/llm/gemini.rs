// SPDX-License-Identifier: MIT

//! Gemini Model - Google's Gemini API implementation

use super::{Message, Model, Role, ToolCall};
use crate::error::ModelError;
use crate::tools::Tool;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;

/// Google Gemini model implementation
pub struct GeminiModel {
    client: Client,
    api_key: String,
    model_name: String,
}

impl GeminiModel {
    pub fn new(model_name: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model_name: model_name.into(),
        }
    }
}

#[async_trait]
impl Model for GeminiModel {
    async fn generate(
        &self,
        history: &[Message],
        tools: &[Arc<dyn Tool>],
    ) -> Result<Message, ModelError> {
        if self.api_key.is_empty() {
            return Err(ModelError::ApiKeyMissing("gemini".to_string()));
        }

        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model_name, self.api_key
        );

        let (system_instruction, contents) = build_contents(history);

        let mut body = json!({ "contents": contents });
        if let Some(instruction) = system_instruction {
            body["systemInstruction"] = instruction;
        }

        if !tools.is_empty() {
            let function_declarations: Vec<Value> = tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name(),
                        "description": t.description(),
                        "parameters": t.schema()
                    })
                })
                .collect();

            body["tools"] = json!([{
                "function_declarations": function_declarations
            }]);
        }

        log::debug!(
            "Gemini request body: {}",
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );

        let resp = self.client.post(&url).json(&body).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(classify_api_error(status.as_u16(), &text));
        }

        let resp_json: Value = resp.json().await?;
        log::debug!("Gemini response: {}", resp_json);

        parse_response(&resp_json)
    }
}

/// Split a message history into Gemini's `systemInstruction` and `contents`.
///
/// System messages fold into the instruction; user turns map to role `user`,
/// assistant turns to role `model` (with `functionCall` parts for tool
/// calls), and tool turns to role `user` with a `functionResponse` part. The
/// function name for a response is resolved through the call id, since
/// Gemini keys responses by name rather than id.
pub fn build_contents(history: &[Message]) -> (Option<Value>, Vec<Value>) {
    let system_texts: Vec<&str> = history
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();
    let system_instruction = if system_texts.is_empty() {
        None
    } else {
        Some(json!({ "parts": [{ "text": system_texts.join("\n\n") }] }))
    };

    let mut contents = Vec::new();
    for message in history {
        match message.role {
            Role::System => {}
            Role::User => {
                contents.push(json!({
                    "role": "user",
                    "parts": [{ "text": message.content }]
                }));
            }
            Role::Assistant => {
                let mut parts = Vec::new();
                if !message.content.is_empty() {
                    parts.push(json!({ "text": message.content }));
                }
                for call in &message.tool_calls {
                    parts.push(json!({
                        "functionCall": { "name": call.name, "args": call.arguments }
                    }));
                }
                contents.push(json!({ "role": "model", "parts": parts }));
            }
            Role::Tool => {
                let name = message
                    .tool_call_id
                    .as_deref()
                    .and_then(|id| call_name_for(history, id))
                    .unwrap_or_else(|| "unknown".to_string());
                contents.push(json!({
                    "role": "user",
                    "parts": [{
                        "functionResponse": {
                            "name": name,
                            "response": response_payload(&message.content)
                        }
                    }]
                }));
            }
        }
    }

    (system_instruction, contents)
}

/// Find the tool name behind a call id by scanning assistant turns.
fn call_name_for(history: &[Message], call_id: &str) -> Option<String> {
    history.iter().rev().find_map(|m| {
        m.tool_calls
            .iter()
            .find(|c| c.id == call_id)
            .map(|c| c.name.clone())
    })
}

/// Gemini requires the response payload to be a JSON object.
fn response_payload(content: &str) -> Value {
    match serde_json::from_str::<Value>(content) {
        Ok(Value::Object(obj)) => Value::Object(obj),
        Ok(other) => json!({ "content": other }),
        Err(_) => json!({ "content": content }),
    }
}

/// Map an HTTP failure to a [`ModelError`]. Quota exhaustion is fatal and
/// carries remediation hints for the operator.
pub fn classify_api_error(status: u16, body: &str) -> ModelError {
    if status == 429 || body.contains("RESOURCE_EXHAUSTED") {
        return ModelError::QuotaExhausted {
            provider: "gemini".to_string(),
            message: body.to_string(),
        };
    }
    ModelError::Api {
        provider: "gemini".to_string(),
        message: format!("HTTP {status}: {body}"),
    }
}

/// Turn a Gemini response body into an assistant [`Message`].
pub fn parse_response(resp: &Value) -> Result<Message, ModelError> {
    let candidates = resp["candidates"]
        .as_array()
        .ok_or_else(|| ModelError::InvalidResponse("no candidates in response".to_string()))?;
    let candidate = candidates
        .first()
        .ok_or_else(|| ModelError::InvalidResponse("empty candidates".to_string()))?;

    if let Some(finish_reason) = candidate.get("finishReason").and_then(|v| v.as_str()) {
        log::debug!("Gemini finish reason: {finish_reason}");
        if finish_reason == "SAFETY" {
            return Err(ModelError::InvalidResponse(
                "response blocked by safety filters".to_string(),
            ));
        }
        if finish_reason == "MALFORMED_FUNCTION_CALL" {
            // The model asked for a tool it cannot have; surface as text so
            // the conversation can recover.
            let msg = candidate
                .get("finishMessage")
                .and_then(|m| m.as_str())
                .unwrap_or("the requested tool call was malformed");
            log::warn!("Gemini malformed function call: {msg}");
            return Ok(Message::assistant(format!(
                "I tried to use a tool that isn't available. {msg}"
            )));
        }
    }

    let parts = candidate
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .ok_or_else(|| {
            ModelError::InvalidResponse(format!("no content parts in candidate: {candidate}"))
        })?;

    let mut text_chunks: Vec<&str> = Vec::new();
    let mut tool_calls = Vec::new();
    for part in parts {
        if let Some(text) = part["text"].as_str() {
            text_chunks.push(text);
        } else if let Some(fc) = part.get("functionCall") {
            let name = fc["name"].as_str().unwrap_or_default().to_string();
            tool_calls.push(ToolCall::new(name, fc["args"].clone()));
        }
    }

    Ok(Message::assistant_with_calls(
        text_chunks.join(""),
        tool_calls,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    // === Request building ===

    #[test]
    fn test_system_message_becomes_system_instruction() {
        let history = vec![Message::system("be helpful"), Message::user("hi")];
        let (instruction, contents) = build_contents(&history);

        assert_eq!(
            instruction.unwrap()["parts"][0]["text"],
            json!("be helpful")
        );
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[0]["parts"][0]["text"], "hi");
    }

    #[test]
    fn test_assistant_tool_calls_serialize_as_function_calls() {
        let history = vec![Message::assistant_with_calls(
            "",
            vec![ToolCall::new("triple", json!({"num": 2}))],
        )];
        let (_, contents) = build_contents(&history);

        assert_eq!(contents[0]["role"], "model");
        let part = &contents[0]["parts"][0];
        assert_eq!(part["functionCall"]["name"], "triple");
        assert_eq!(part["functionCall"]["args"]["num"], 2);
    }

    #[test]
    fn test_tool_response_resolves_name_through_call_id() {
        let call = ToolCall::new("triple", json!({"num": 2}));
        let call_id = call.id.clone();
        let history = vec![
            Message::assistant_with_calls("", vec![call]),
            Message::tool(call_id, r#"{"result": 6.0}"#),
        ];
        let (_, contents) = build_contents(&history);

        let part = &contents[1]["parts"][0];
        assert_eq!(contents[1]["role"], "user");
        assert_eq!(part["functionResponse"]["name"], "triple");
        assert_eq!(part["functionResponse"]["response"]["result"], 6.0);
    }

    #[test]
    fn test_plain_text_tool_response_is_wrapped() {
        let history = vec![Message::tool("unknown-id", "Error: no such tool")];
        let (_, contents) = build_contents(&history);

        let response = &contents[0]["parts"][0]["functionResponse"]["response"];
        assert_eq!(response["content"], "Error: no such tool");
    }

    // === Response parsing ===

    #[test]
    fn test_parse_text_response() {
        let resp = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "hello " }, { "text": "there" }] }
            }]
        });
        let message = parse_response(&resp).unwrap();
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.content, "hello there");
        assert!(!message.has_tool_calls());
    }

    #[test]
    fn test_parse_function_call_response() {
        let resp = json!({
            "candidates": [{
                "content": { "parts": [{
                    "functionCall": { "name": "tavily_search", "args": { "query": "rust" } }
                }] }
            }]
        });
        let message = parse_response(&resp).unwrap();
        assert_eq!(message.tool_calls.len(), 1);
        assert_eq!(message.tool_calls[0].name, "tavily_search");
        assert_eq!(message.tool_calls[0].arguments["query"], "rust");
        assert!(!message.tool_calls[0].id.is_empty());
    }

    #[test]
    fn test_parse_empty_candidates_is_invalid() {
        let err = parse_response(&json!({ "candidates": [] })).unwrap_err();
        assert!(matches!(err, ModelError::InvalidResponse(_)));
    }

    #[test]
    fn test_malformed_function_call_degrades_to_text() {
        let resp = json!({
            "candidates": [{
                "finishReason": "MALFORMED_FUNCTION_CALL",
                "finishMessage": "no tool named frobnicate"
            }]
        });
        let message = parse_response(&resp).unwrap();
        assert!(message.content.contains("no tool named frobnicate"));
        assert!(!message.has_tool_calls());
    }

    // === Error classification ===

    #[tokio::test]
    async fn test_empty_api_key_fails_before_any_request() {
        let model = GeminiModel::new("gemini-2.5-flash-lite", "");
        let err = model
            .generate(&[Message::user("hi")], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::ApiKeyMissing(_)));
        assert!(err.remediation().is_some());
    }

    #[test]
    fn test_429_is_quota_exhaustion() {
        let err = classify_api_error(429, "slow down");
        assert!(matches!(err, ModelError::QuotaExhausted { .. }));
        assert!(err.remediation().is_some());
    }

    #[test]
    fn test_resource_exhausted_body_is_quota_exhaustion() {
        let err = classify_api_error(
            403,
            r#"{"error": {"status": "RESOURCE_EXHAUSTED", "message": "quota"}}"#,
        );
        assert!(matches!(err, ModelError::QuotaExhausted { .. }));
    }

    #[test]
    fn test_other_status_is_api_error() {
        let err = classify_api_error(500, "internal");
        assert!(matches!(err, ModelError::Api { .. }));
        assert!(err.remediation().is_none());
    }
}
