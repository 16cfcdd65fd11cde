// SPDX-License-Identifier: MIT

//! In-memory checkpoint store

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::CheckpointError;

use super::{Checkpoint, Checkpointer};

/// In-memory checkpoint store: per-thread append-only history.
///
/// Clone-cheap; clones share the same storage. The default choice for tests
/// and ephemeral runs.
#[derive(Clone, Default)]
pub struct MemorySaver {
    threads: Arc<RwLock<HashMap<String, Vec<Checkpoint>>>>,
}

impl MemorySaver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full checkpoint history for a thread, oldest first.
    pub async fn history(&self, thread_id: &str) -> Vec<Checkpoint> {
        self.threads
            .read()
            .await
            .get(thread_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl Checkpointer for MemorySaver {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        let mut threads = self.threads.write().await;
        threads
            .entry(checkpoint.thread_id.clone())
            .or_default()
            .push(checkpoint.clone());
        Ok(())
    }

    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, CheckpointError> {
        let threads = self.threads.read().await;
        Ok(threads
            .get(thread_id)
            .and_then(|history| history.iter().max_by_key(|cp| cp.seq))
            .cloned())
    }
}
