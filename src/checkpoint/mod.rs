// SPDX-License-Identifier: MIT

//! Checkpoint persistence
//!
//! After every completed superstep the engine writes a [`Checkpoint`]: the
//! merged state plus the ids of the nodes scheduled next. Stores are
//! append-only and keyed by thread id; `load` always returns the entry with
//! the highest sequence number. Whether a thread is awaiting approval is
//! derived from `next_nodes`, never stored.

mod memory;
mod sqlite;

pub use memory::MemorySaver;
pub use sqlite::SqliteSaver;

use crate::error::CheckpointError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A single checkpoint snapshot. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Thread (session) this checkpoint belongs to.
    pub thread_id: String,
    /// Strictly monotonic per thread.
    pub seq: u64,
    /// Merged state as of the end of the superstep.
    pub state: HashMap<String, Value>,
    /// Frontier scheduled for the next superstep; empty means the run
    /// terminated.
    pub next_nodes: Vec<String>,
    /// When the checkpoint was created.
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(
        thread_id: impl Into<String>,
        seq: u64,
        state: HashMap<String, Value>,
        next_nodes: Vec<String>,
    ) -> Self {
        Self {
            thread_id: thread_id.into(),
            seq,
            state,
            next_nodes,
            created_at: Utc::now(),
        }
    }
}

/// Storage backend for checkpoints.
#[async_trait]
pub trait Checkpointer: Send + Sync {
    /// Append a checkpoint. Implementations never overwrite earlier entries.
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError>;

    /// Latest checkpoint for a thread, or `None` for an unknown thread.
    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, CheckpointError>;
}
