// SPDX-License-Identifier: MIT

//! SQLite-backed checkpoint store

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::CheckpointError;

use super::{Checkpoint, Checkpointer};

/// Durable checkpoint store backed by SQLite.
///
/// One row per checkpoint; rows are only ever inserted, so the history of a
/// thread survives process restarts intact. State and the pending frontier
/// are stored as JSON text.
pub struct SqliteSaver {
    conn: Mutex<Connection>,
}

impl SqliteSaver {
    /// Open or create the checkpoint database.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CheckpointError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    CheckpointError::Storage(format!(
                        "failed to create checkpoint directory: {e}"
                    ))
                })?;
            }
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;

             CREATE TABLE IF NOT EXISTS checkpoints (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 thread_id TEXT NOT NULL,
                 seq INTEGER NOT NULL,
                 state TEXT NOT NULL,
                 next_nodes TEXT NOT NULL,
                 created_at TEXT NOT NULL
             );

             CREATE INDEX IF NOT EXISTS idx_cp_thread_seq
                 ON checkpoints(thread_id, seq DESC);",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

#[async_trait]
impl Checkpointer for SqliteSaver {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        let state = serde_json::to_string(&checkpoint.state)?;
        let next_nodes = serde_json::to_string(&checkpoint.next_nodes)?;

        let conn = self
            .conn
            .lock()
            .map_err(|e| CheckpointError::Storage(e.to_string()))?;
        conn.execute(
            "INSERT INTO checkpoints (thread_id, seq, state, next_nodes, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                checkpoint.thread_id,
                checkpoint.seq as i64,
                state,
                next_nodes,
                checkpoint.created_at.to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, CheckpointError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| CheckpointError::Storage(e.to_string()))?;
        let mut stmt = conn.prepare(
            "SELECT thread_id, seq, state, next_nodes, created_at
             FROM checkpoints
             WHERE thread_id = ?1
             ORDER BY seq DESC
             LIMIT 1",
        )?;

        let row = stmt
            .query_row(params![thread_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .optional()?;

        match row {
            None => Ok(None),
            Some((thread_id, seq, state, next_nodes, created_at)) => Ok(Some(Checkpoint {
                thread_id,
                seq: seq as u64,
                state: serde_json::from_str(&state)?,
                next_nodes: serde_json::from_str(&next_nodes)?,
                created_at: DateTime::parse_from_rfc3339(&created_at)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn temp_db() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("weft_checkpoint_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join("checkpoints.db")
    }

    fn cp(thread: &str, seq: u64, pending: &[&str]) -> Checkpoint {
        let mut state = HashMap::new();
        state.insert("messages".to_string(), json!([{"role": "user", "content": "hi"}]));
        state.insert("seq_marker".to_string(), json!(seq));
        Checkpoint::new(
            thread,
            seq,
            state,
            pending.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[tokio::test]
    async fn test_save_and_load_latest() {
        let saver = SqliteSaver::open(&temp_db()).unwrap();

        saver.save(&cp("sess-1", 0, &["act"])).await.unwrap();
        saver.save(&cp("sess-1", 1, &[])).await.unwrap();

        let loaded = saver.load("sess-1").await.unwrap().unwrap();
        assert_eq!(loaded.seq, 1);
        assert_eq!(loaded.state["seq_marker"], json!(1));
        assert!(loaded.next_nodes.is_empty());
    }

    #[tokio::test]
    async fn test_latest_is_by_seq_not_insert_order() {
        let saver = SqliteSaver::open(&temp_db()).unwrap();

        saver.save(&cp("sess-1", 5, &["a"])).await.unwrap();
        saver.save(&cp("sess-1", 3, &["b"])).await.unwrap();

        let loaded = saver.load("sess-1").await.unwrap().unwrap();
        assert_eq!(loaded.seq, 5);
    }

    #[tokio::test]
    async fn test_threads_are_isolated() {
        let saver = SqliteSaver::open(&temp_db()).unwrap();

        saver.save(&cp("sess-a", 0, &["x"])).await.unwrap();
        saver.save(&cp("sess-b", 7, &["y"])).await.unwrap();

        assert_eq!(saver.load("sess-a").await.unwrap().unwrap().seq, 0);
        assert_eq!(saver.load("sess-b").await.unwrap().unwrap().seq, 7);
    }

    #[tokio::test]
    async fn test_load_nonexistent() {
        let saver = SqliteSaver::open(&temp_db()).unwrap();
        assert!(saver.load("nonexistent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let path = temp_db();

        {
            let saver = SqliteSaver::open(&path).unwrap();
            saver.save(&cp("sess-1", 2, &["act"])).await.unwrap();
        }

        let reopened = SqliteSaver::open(&path).unwrap();
        let loaded = reopened.load("sess-1").await.unwrap().unwrap();
        assert_eq!(loaded.seq, 2);
        assert_eq!(loaded.next_nodes, vec!["act".to_string()]);
        assert_eq!(
            loaded.state["messages"],
            json!([{"role": "user", "content": "hi"}])
        );
    }
}
