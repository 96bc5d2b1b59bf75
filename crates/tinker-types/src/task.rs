//! Pipeline task state: the record that flows through analyze -> execute -> complete.
//!
//! A `TaskState` is persisted after every pipeline step. The
//! [`ResumptionMarker`] records which step produced the snapshot so a resumed
//! run re-enters the graph at the right node instead of starting over.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

use crate::message::ConversationMessage;

/// Default working directory handed to the executor.
pub const DEFAULT_WORKING_DIR: &str = "/workspace";

/// Action kind used for the safe fallback action planned when the oracle fails.
pub const NOOP_ACTION_KIND: &str = "noop";

/// Action kind for shell commands.
pub const SHELL_ACTION_KIND: &str = "shell";

// ---------------------------------------------------------------------------
// ExecutionStatus
// ---------------------------------------------------------------------------

/// Coarse lifecycle status of a task execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Analyzing,
    Executing,
    Completed,
    Failed,
}

impl ExecutionStatus {
    /// Whether no further pipeline steps will run for this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Failed)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStatus::Running => write!(f, "running"),
            ExecutionStatus::Analyzing => write!(f, "analyzing"),
            ExecutionStatus::Executing => write!(f, "executing"),
            ExecutionStatus::Completed => write!(f, "completed"),
            ExecutionStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "running" => Ok(ExecutionStatus::Running),
            "analyzing" => Ok(ExecutionStatus::Analyzing),
            "executing" => Ok(ExecutionStatus::Executing),
            "completed" => Ok(ExecutionStatus::Completed),
            "failed" => Ok(ExecutionStatus::Failed),
            other => Err(format!("invalid execution status: '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// ResumptionMarker
// ---------------------------------------------------------------------------

/// Identifies the last durable pipeline step.
///
/// Serialized as a plain string (`"task_analyzed"`, `"tools_executed"`,
/// `"completed"`, or `"error: <message>"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ResumptionMarker {
    TaskAnalyzed,
    ToolsExecuted,
    Completed,
    Error(String),
}

impl ResumptionMarker {
    const ERROR_PREFIX: &'static str = "error: ";
}

impl fmt::Display for ResumptionMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResumptionMarker::TaskAnalyzed => write!(f, "task_analyzed"),
            ResumptionMarker::ToolsExecuted => write!(f, "tools_executed"),
            ResumptionMarker::Completed => write!(f, "completed"),
            ResumptionMarker::Error(msg) => write!(f, "{}{msg}", Self::ERROR_PREFIX),
        }
    }
}

impl FromStr for ResumptionMarker {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "task_analyzed" => Ok(ResumptionMarker::TaskAnalyzed),
            "tools_executed" => Ok(ResumptionMarker::ToolsExecuted),
            "completed" => Ok(ResumptionMarker::Completed),
            other => other
                .strip_prefix(Self::ERROR_PREFIX)
                .map(|msg| ResumptionMarker::Error(msg.to_string()))
                .ok_or_else(|| format!("invalid resumption marker: '{other}'")),
        }
    }
}

impl From<ResumptionMarker> for String {
    fn from(marker: ResumptionMarker) -> Self {
        marker.to_string()
    }
}

impl TryFrom<String> for ResumptionMarker {
    type Error = String;

    fn try_from(value: String) -> Result<Self, String> {
        value.parse()
    }
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// An action proposed by the oracle, executed verbatim by the executor.
///
/// Parameters are opaque to the engine; the executor owns their validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedAction {
    pub kind: String,
    #[serde(default)]
    pub params: Value,
}

impl PlannedAction {
    pub fn new(kind: impl Into<String>, params: Value) -> Self {
        Self {
            kind: kind.into(),
            params,
        }
    }

    /// A shell command action (`{"command": ..}`).
    pub fn shell(command: impl Into<String>) -> Self {
        Self::new(
            SHELL_ACTION_KIND,
            serde_json::json!({ "command": command.into() }),
        )
    }

    /// The safe fallback action describing why nothing else was planned.
    pub fn noop(reason: impl Into<String>) -> Self {
        Self::new(NOOP_ACTION_KIND, serde_json::json!({ "reason": reason.into() }))
    }

    /// The `command` parameter, when present.
    pub fn command(&self) -> Option<&str> {
        self.params.get("command").and_then(Value::as_str)
    }

    pub fn is_noop(&self) -> bool {
        self.kind == NOOP_ACTION_KIND
    }
}

/// What the executor reported for a single action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub success: bool,
    #[serde(default)]
    pub payload: Value,
    pub error: Option<String>,
}

impl ActionOutcome {
    pub fn succeeded(payload: Value) -> Self {
        Self {
            success: true,
            payload,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>, payload: Value) -> Self {
        Self {
            success: false,
            payload,
            error: Some(error.into()),
        }
    }

    /// Text written to stdout by a shell action, or the empty string.
    pub fn stdout(&self) -> &str {
        self.payload
            .get("stdout")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Text written to stderr by a shell action, or the empty string.
    pub fn stderr(&self) -> &str {
        self.payload
            .get("stderr")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }
}

/// A recorded action execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub request: PlannedAction,
    pub outcome: ActionOutcome,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

impl ActionResult {
    pub fn new(request: PlannedAction, outcome: ActionOutcome) -> Self {
        Self {
            success: outcome.success,
            request,
            outcome,
            timestamp: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// TaskState
// ---------------------------------------------------------------------------

/// The record flowing through the pipeline graph.
///
/// `conversation_history` is append-only. `action_results` only grows within
/// one execution pass. `thread_id` is fixed at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskState {
    pub task_content: String,
    #[serde(default)]
    pub conversation_history: Vec<ConversationMessage>,
    #[serde(default)]
    pub planned_actions: Vec<PlannedAction>,
    #[serde(default)]
    pub action_results: Vec<ActionResult>,
    pub pending_narrative: Option<String>,
    /// Whether `pending_narrative` has been appended to the history.
    #[serde(default)]
    pub narrative_emitted: bool,
    pub current_directory: String,
    pub execution_status: ExecutionStatus,
    pub resumption_marker: Option<ResumptionMarker>,
    thread_id: String,
    pub checkpoint_id: Option<Uuid>,
}

impl TaskState {
    /// A fresh state for `task_content` on `thread_id`.
    pub fn new(thread_id: impl Into<String>, task_content: impl Into<String>) -> Self {
        Self {
            task_content: task_content.into(),
            conversation_history: Vec::new(),
            planned_actions: Vec::new(),
            action_results: Vec::new(),
            pending_narrative: None,
            narrative_emitted: false,
            current_directory: DEFAULT_WORKING_DIR.to_string(),
            execution_status: ExecutionStatus::Running,
            resumption_marker: None,
            thread_id: thread_id.into(),
            checkpoint_id: None,
        }
    }

    /// Start a new task on a thread that already has history.
    ///
    /// Carries the conversation over; everything belonging to the previous
    /// execution pass (plan, results, markers, checkpoint id) is reset.
    pub fn continue_from(previous: &TaskState, task_content: impl Into<String>) -> Self {
        let mut state = Self::new(previous.thread_id.clone(), task_content);
        state.conversation_history = previous.conversation_history.clone();
        state.current_directory = previous.current_directory.clone();
        state
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// Mark the state as terminally failed with a descriptive marker.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.execution_status = ExecutionStatus::Failed;
        self.resumption_marker = Some(ResumptionMarker::Error(error.into()));
    }

    /// Number of recorded actions that failed.
    pub fn failed_action_count(&self) -> usize {
        self.action_results.iter().filter(|r| !r.success).count()
    }
}
