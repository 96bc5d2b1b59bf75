//! State for the open-ended think -> act -> observe -> decide loop.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::ConversationMessage;
use crate::task::ActionOutcome;

/// Iteration bound used when the caller does not supply one.
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// Working-memory key holding whether the last command succeeded.
pub const LAST_COMMAND_SUCCESS_KEY: &str = "last_command_success";

/// Phase the loop will run next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopPhase {
    Think,
    Act,
    Observe,
    Decide,
}

impl fmt::Display for LoopPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopPhase::Think => write!(f, "think"),
            LoopPhase::Act => write!(f, "act"),
            LoopPhase::Observe => write!(f, "observe"),
            LoopPhase::Decide => write!(f, "decide"),
        }
    }
}

impl FromStr for LoopPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "think" => Ok(LoopPhase::Think),
            "act" => Ok(LoopPhase::Act),
            "observe" => Ok(LoopPhase::Observe),
            "decide" => Ok(LoopPhase::Decide),
            other => Err(format!("invalid loop phase: '{other}'")),
        }
    }
}

/// Why a loop stopped. Both are expected outcomes, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    GoalAchieved,
    IterationLimitReached,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::GoalAchieved => write!(f, "goal achieved"),
            ExitReason::IterationLimitReached => write!(f, "max iterations reached"),
        }
    }
}

/// The loop's persisted state.
///
/// Observations are bounded in length by the observe phase so the state stays
/// small across many persisted iterations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopState {
    pub thread_id: String,
    pub goal: String,
    pub iteration_count: u32,
    pub max_iterations: u32,
    #[serde(default)]
    pub working_memory: BTreeMap<String, Value>,
    #[serde(default)]
    pub observations: Vec<String>,
    /// Queue of things to try, shown to the oracle while thinking.
    #[serde(default)]
    pub planned_actions: Vec<String>,
    pub last_reasoning: Option<String>,
    pub last_action: Option<String>,
    pub last_result: Option<ActionOutcome>,
    pub should_continue: bool,
    pub exit_reason: Option<ExitReason>,
    pub phase: LoopPhase,
    #[serde(default)]
    pub messages: Vec<ConversationMessage>,
    /// Set when the loop was stopped by an internal error rather than an exit reason.
    pub error: Option<String>,
}

impl LoopState {
    /// A new loop for `goal`, starting at iteration 1 in the think phase.
    pub fn new(thread_id: impl Into<String>, goal: impl Into<String>, max_iterations: u32) -> Self {
        let goal = goal.into();
        Self {
            thread_id: thread_id.into(),
            messages: vec![
                ConversationMessage::user(goal.clone()),
                ConversationMessage::assistant(format!(
                    "Starting continuous reasoning loop for goal: {goal}"
                )),
            ],
            goal,
            iteration_count: 1,
            max_iterations,
            working_memory: BTreeMap::new(),
            observations: Vec::new(),
            planned_actions: Vec::new(),
            last_reasoning: None,
            last_action: None,
            last_result: None,
            should_continue: true,
            exit_reason: None,
            phase: LoopPhase::Think,
            error: None,
        }
    }

    /// Stop the loop because of an internal error.
    pub fn fail(&mut self, error: impl Into<String>) {
        let error = error.into();
        self.messages
            .push(ConversationMessage::assistant(format!("[ERROR] {error}")));
        self.should_continue = false;
        self.error = Some(error);
    }

    /// Whether the loop has stopped.
    pub fn is_finished(&self) -> bool {
        !self.should_continue
    }

    /// The most recent `n` observations, oldest first.
    pub fn recent_observations(&self, n: usize) -> &[String] {
        let start = self.observations.len().saturating_sub(n);
        &self.observations[start..]
    }
}
