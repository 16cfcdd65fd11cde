// SPDX-License-Identifier: MIT

//! Typed error handling for weft-rs
//!
//! One enum per layer (graph construction, engine execution, checkpoint
//! storage, model calls), unified under [`WeftError`] with `#[from]`
//! conversions so `?` works across layer boundaries.

use thiserror::Error;

/// Top-level error type for weft-rs
#[derive(Debug, Error)]
pub enum WeftError {
    /// Graph construction/compilation errors
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// Errors raised while driving a compiled graph
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Checkpoint persistence errors
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// Reasoning-model errors (fatal ones abort the run)
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// Tool not found during direct registry lookup
    #[error("Tool '{name}' not found")]
    ToolNotFound { name: String },

    /// Configuration errors (missing env vars, invalid flags)
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Generic error wrapper for compatibility
    #[error("{0}")]
    Other(String),
}

/// Errors detected while building or compiling a graph.
///
/// All of these surface at [`compile`](crate::graph::GraphBuilder::compile)
/// time; a compiled graph can no longer produce them.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    /// No entry node was designated
    #[error("entry node is not set")]
    EntryNotSet,

    /// The entry node names no registered node
    #[error("entry node '{0}' is not defined")]
    UnknownEntry(String),

    /// A node id was registered more than once
    #[error("node '{0}' is defined twice")]
    DuplicateNode(String),

    /// An edge endpoint names no registered node
    #[error("edge {from} -> {to} references unknown node '{node}'")]
    UnknownEdgeNode {
        from: String,
        to: String,
        node: String,
    },

    /// A conditional route targets no registered node
    #[error("route '{key}' from '{from}' targets unknown node '{target}'")]
    UnknownRouteTarget {
        from: String,
        key: String,
        target: String,
    },

    /// A conditional edge was attached to an unknown source node
    #[error("conditional edge source '{0}' is not defined")]
    UnknownConditionSource(String),
}

/// Errors raised by the execution engine at run time.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A decision function returned a key absent from its route map
    #[error("node '{node}' routed to '{key}', which is not in its route map")]
    MissingRoute { node: String, key: String },

    /// resume() was called for a thread with no checkpoint
    #[error("no checkpoint found for thread '{0}'")]
    UnknownThread(String),

    /// A resume override redirected to a node the graph does not define
    #[error("resume override targets unknown node '{0}'")]
    UnknownOverrideTarget(String),

    /// The drive loop exceeded its superstep ceiling
    #[error("exceeded {limit} supersteps on thread '{thread}'; aborting")]
    SuperstepLimit { thread: String, limit: u32 },

    /// A node task panicked or was cancelled
    #[error("node '{node}' aborted: {message}")]
    NodePanicked { node: String, message: String },

    /// State contents did not match what a node expected
    #[error("invalid state: {0}")]
    InvalidState(String),
}

/// Checkpoint store errors.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// SQLite-level failure
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    /// Checkpoint state could not be (de)serialized
    #[error(transparent)]
    Serde(#[from] serde_json::Error),

    /// Anything else the backing store reports
    #[error("checkpoint store: {0}")]
    Storage(String),
}

/// Model/LLM-specific errors
#[derive(Debug, Error)]
pub enum ModelError {
    /// API key not configured
    #[error("API key not configured for provider: {0}")]
    ApiKeyMissing(String),

    /// Upstream quota exhausted; fatal, the run halts without a checkpoint
    #[error("{provider} quota exhausted: {message}")]
    QuotaExhausted { provider: String, message: String },

    /// Non-quota API error from the provider
    #[error("API error from {provider}: {message}")]
    Api { provider: String, message: String },

    /// Invalid response from model
    #[error("Invalid response from model: {0}")]
    InvalidResponse(String),

    /// HTTP transport failure
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl ModelError {
    /// Operator guidance for errors that cannot be retried blindly.
    pub fn remediation(&self) -> Option<String> {
        match self {
            ModelError::QuotaExhausted { provider, .. } => Some(format!(
                "{provider} quota is exhausted. Check your plan and billing details, \
                 switch to a model with free quota remaining, or retry once the \
                 quota window resets."
            )),
            ModelError::ApiKeyMissing(provider) => Some(format!(
                "Set the API key environment variable for {provider} before running."
            )),
            _ => None,
        }
    }
}

impl WeftError {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a tool not found error
    pub fn tool_not_found(name: impl Into<String>) -> Self {
        Self::ToolNotFound { name: name.into() }
    }

    /// Create from a generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// Remediation hint, when the underlying error carries one.
    pub fn remediation(&self) -> Option<String> {
        match self {
            WeftError::Model(e) => e.remediation(),
            _ => None,
        }
    }
}

impl From<&str> for WeftError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

impl From<String> for WeftError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for WeftError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self::Other(err.to_string())
    }
}
