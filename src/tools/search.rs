// SPDX-License-Identifier: MIT

use crate::error::WeftError;
use crate::tools::Tool;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

// --- Static schema ---

static TAVILY_SEARCH_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": "The search query"
            }
        },
        "required": ["query"]
    })
});

#[derive(Debug, Serialize, Deserialize)]
pub struct TavilySearchArgs {
    pub query: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TavilySearchResult {
    pub results: Vec<SearchResult>,
    pub query: String,
}

/// Web search via the Tavily API.
pub struct TavilySearchTool {
    client: Client,
    api_key: String,
    max_results: u32,
}

impl TavilySearchTool {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            max_results: 1,
        }
    }

    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results;
        self
    }
}

#[async_trait]
impl Tool for TavilySearchTool {
    fn name(&self) -> &str {
        "tavily_search"
    }

    fn description(&self) -> &str {
        "Searches the web for up-to-date information. Returns relevant results with titles, URLs, and content snippets."
    }

    fn schema(&self) -> &Value {
        &TAVILY_SEARCH_SCHEMA
    }

    async fn execute(&self, input: Value) -> Result<Value, WeftError> {
        let args: TavilySearchArgs = serde_json::from_value(input)?;

        let resp = self
            .client
            .post("https://api.tavily.com/search")
            .json(&json!({
                "api_key": self.api_key,
                "query": args.query,
                "max_results": self.max_results,
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(WeftError::other(format!(
                "Tavily API error ({status}): {text}"
            )));
        }

        let body: Value = resp.json().await?;

        let results_json = body
            .get("results")
            .ok_or_else(|| WeftError::other("Invalid response format: missing results"))?;

        let results: Vec<SearchResult> = serde_json::from_value(results_json.clone())?;

        let result = TavilySearchResult {
            results,
            query: args.query,
        };

        Ok(serde_json::to_value(result)?)
    }
}
