//! Durable checkpointing of thread snapshots.
//!
//! Wraps a [`CheckpointStore`] + [`CheckpointLog`] pair. Every durable step
//! overwrites the latest snapshot for the thread and then appends one audit
//! record describing it.

use std::sync::Arc;

use tinker_types::agent_loop::LoopState;
use tinker_types::error::RepositoryError;
use tinker_types::session::{CheckpointRecord, SnapshotKind, ThreadSnapshot};
use tinker_types::task::TaskState;

use crate::repository::{CheckpointLog, CheckpointStore};

// ---------------------------------------------------------------------------
// Checkpointer
// ---------------------------------------------------------------------------

/// Saves and restores thread snapshots.
///
/// Generic over the store so it works with any backend (SQLite, in-memory).
pub struct Checkpointer<S> {
    store: Arc<S>,
}

impl<S> Clone for Checkpointer<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: CheckpointStore + CheckpointLog> Checkpointer<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Access the underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Overwrite the latest snapshot, then append its audit record.
    pub async fn save(&self, snapshot: &ThreadSnapshot) -> Result<CheckpointRecord, CheckpointError> {
        let thread_id = snapshot.thread_id();
        self.store.put(thread_id, snapshot).await?;

        let record = CheckpointRecord::for_snapshot(snapshot);
        self.store.append(&record).await?;

        tracing::debug!(
            thread_id,
            checkpoint_id = %record.checkpoint_id,
            kind = %record.kind,
            marker = record.resumption_marker.as_deref().unwrap_or("-"),
            status = %record.execution_status,
            "checkpointed thread"
        );

        Ok(record)
    }

    pub async fn save_task(&self, state: &TaskState) -> Result<CheckpointRecord, CheckpointError> {
        self.save(&ThreadSnapshot::Task(state.clone())).await
    }

    pub async fn save_loop(&self, state: &LoopState) -> Result<CheckpointRecord, CheckpointError> {
        self.save(&ThreadSnapshot::Loop(state.clone())).await
    }

    /// The latest snapshot for a thread, of either kind.
    pub async fn load(&self, thread_id: &str) -> Result<Option<ThreadSnapshot>, CheckpointError> {
        Ok(self.store.get(thread_id).await?)
    }

    /// The latest task snapshot. Errors if the thread holds a loop snapshot.
    pub async fn load_task(&self, thread_id: &str) -> Result<Option<TaskState>, CheckpointError> {
        match self.load(thread_id).await? {
            None => Ok(None),
            Some(ThreadSnapshot::Task(state)) => Ok(Some(state)),
            Some(other) => Err(CheckpointError::SnapshotKind {
                thread_id: thread_id.to_string(),
                expected: SnapshotKind::Task,
                found: other.kind(),
            }),
        }
    }

    /// The latest loop snapshot. Errors if the thread holds a task snapshot.
    pub async fn load_loop(&self, thread_id: &str) -> Result<Option<LoopState>, CheckpointError> {
        match self.load(thread_id).await? {
            None => Ok(None),
            Some(ThreadSnapshot::Loop(state)) => Ok(Some(state)),
            Some(other) => Err(CheckpointError::SnapshotKind {
                thread_id: thread_id.to_string(),
                expected: SnapshotKind::Loop,
                found: other.kind(),
            }),
        }
    }

    /// Checkpoint metadata for a thread, newest first.
    pub async fn history(
        &self,
        thread_id: &str,
        limit: Option<u32>,
    ) -> Result<Vec<CheckpointRecord>, CheckpointError> {
        Ok(self.store.list_for_thread(thread_id, limit).await?)
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can occur during checkpoint operations.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// Underlying repository operation failed.
    #[error("checkpoint repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// The thread holds a snapshot produced by the other graph.
    #[error("thread {thread_id} holds a {found} snapshot, expected {expected}")]
    SnapshotKind {
        thread_id: String,
        expected: SnapshotKind,
        found: SnapshotKind,
    },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
