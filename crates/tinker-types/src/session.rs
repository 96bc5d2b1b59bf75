//! Thread sessions and the checkpoint audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

use crate::agent_loop::LoopState;
use crate::task::{ExecutionStatus, TaskState};

/// Maximum length of a session summary derived from the task text.
pub const SESSION_SUMMARY_MAX_CHARS: usize = 100;

/// Lifecycle status of a session.
///
/// Maps to the CHECK constraint in the SQLite schema:
/// `CHECK (status IN ('active', 'archived'))`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Active,
    Archived,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Active => write!(f, "active"),
            SessionStatus::Archived => write!(f, "archived"),
        }
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(SessionStatus::Active),
            "archived" => Ok(SessionStatus::Archived),
            other => Err(format!("invalid session status: '{other}'")),
        }
    }
}

/// Per-thread lifecycle record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub thread_id: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub summary: String,
    pub status: SessionStatus,
}

/// Build a session summary from task text (first 100 characters).
pub fn summarize(text: &str) -> String {
    text.chars().take(SESSION_SUMMARY_MAX_CHARS).collect()
}

/// Which graph produced a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotKind {
    Task,
    Loop,
}

impl fmt::Display for SnapshotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotKind::Task => write!(f, "task"),
            SnapshotKind::Loop => write!(f, "loop"),
        }
    }
}

impl FromStr for SnapshotKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "task" => Ok(SnapshotKind::Task),
            "loop" => Ok(SnapshotKind::Loop),
            other => Err(format!("invalid snapshot kind: '{other}'")),
        }
    }
}

/// The latest durable state of a thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "state", rename_all = "lowercase")]
pub enum ThreadSnapshot {
    Task(TaskState),
    Loop(LoopState),
}

impl ThreadSnapshot {
    pub fn kind(&self) -> SnapshotKind {
        match self {
            ThreadSnapshot::Task(_) => SnapshotKind::Task,
            ThreadSnapshot::Loop(_) => SnapshotKind::Loop,
        }
    }

    pub fn thread_id(&self) -> &str {
        match self {
            ThreadSnapshot::Task(state) => state.thread_id(),
            ThreadSnapshot::Loop(state) => &state.thread_id,
        }
    }

    /// The step tag recorded in the checkpoint log.
    ///
    /// Tasks use their resumption marker; loops use the phase they will run next
    /// (or `finished`).
    pub fn resumption_marker(&self) -> Option<String> {
        match self {
            ThreadSnapshot::Task(state) => {
                state.resumption_marker.as_ref().map(ToString::to_string)
            }
            ThreadSnapshot::Loop(state) if state.is_finished() => Some("finished".to_string()),
            ThreadSnapshot::Loop(state) => Some(state.phase.to_string()),
        }
    }

    pub fn execution_status(&self) -> ExecutionStatus {
        match self {
            ThreadSnapshot::Task(state) => state.execution_status,
            ThreadSnapshot::Loop(state) if state.error.is_some() => ExecutionStatus::Failed,
            ThreadSnapshot::Loop(state) if state.is_finished() => ExecutionStatus::Completed,
            ThreadSnapshot::Loop(_) => ExecutionStatus::Running,
        }
    }
}

/// Append-only audit entry written alongside every snapshot overwrite.
///
/// Not the source of truth; the snapshot store is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub checkpoint_id: Uuid,
    pub thread_id: String,
    pub created_at: DateTime<Utc>,
    pub kind: SnapshotKind,
    pub resumption_marker: Option<String>,
    pub execution_status: ExecutionStatus,
}

impl CheckpointRecord {
    /// A fresh record describing `snapshot`.
    pub fn for_snapshot(snapshot: &ThreadSnapshot) -> Self {
        Self {
            checkpoint_id: Uuid::now_v7(),
            thread_id: snapshot.thread_id().to_string(),
            created_at: Utc::now(),
            kind: snapshot.kind(),
            resumption_marker: snapshot.resumption_marker(),
            execution_status: snapshot.execution_status(),
        }
    }
}
