// SPDX-License-Identifier: MIT

//! Environment-driven runtime configuration
//!
//! All environment access happens here, once, at startup. The rest of the
//! crate takes explicit values so library users are never surprised by
//! hidden globals.

use std::env;

use crate::error::WeftError;

/// Model used when `GEMINI_MODEL` is not set.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash-lite";

/// Settings resolved from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Gemini model name, from `GEMINI_MODEL`
    pub model_name: String,
    /// From `GEMINI_API_KEY`, falling back to `GOOGLE_API_KEY`
    pub gemini_api_key: String,
    /// From `TAVILY_API_KEY`; web search is skipped when absent
    pub tavily_api_key: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, WeftError> {
        let gemini_api_key = env::var("GEMINI_API_KEY")
            .or_else(|_| env::var("GOOGLE_API_KEY"))
            .map_err(|_| WeftError::config("GEMINI_API_KEY or GOOGLE_API_KEY must be set"))?;

        let model_name =
            env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_GEMINI_MODEL.to_string());

        let tavily_api_key = env::var("TAVILY_API_KEY").ok();
        if tavily_api_key.is_none() {
            log::warn!("TAVILY_API_KEY not set, web search tool disabled");
        }

        Ok(Self {
            model_name,
            gemini_api_key,
            tavily_api_key,
        })
    }
}
