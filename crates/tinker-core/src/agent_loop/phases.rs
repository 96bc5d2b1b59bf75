//! The four loop phases.
//!
//! Each phase records what it did in `messages` with a bracketed tag
//! (`[THINKING]`, `[ACTION]`, `[OBSERVE]`, `[DECIDE]`, `[ERROR]`) and sets
//! `phase` to the one that should run next.

use std::sync::Arc;

use serde_json::Value;

use tinker_types::agent_loop::{ExitReason, LoopPhase, LoopState, LAST_COMMAND_SUCCESS_KEY};
use tinker_types::message::ConversationMessage;
use tinker_types::task::PlannedAction;

use crate::executor::{execute_recorded, ActionContext, ActionExecutor};
use crate::oracle::{OracleQuery, ReasoningOracle};

/// Observations keep at most this many characters of stdout and stderr each.
pub const OBSERVATION_MAX_CHARS: usize = 500;

/// Number of recent observations shown to the oracle while thinking.
pub const THINK_OBSERVATION_WINDOW: usize = 5;

/// The loop's phase bodies, bound to an oracle and executor.
pub struct LoopAgent<O, E> {
    oracle: Arc<O>,
    executor: Arc<E>,
    working_dir: String,
}

impl<O: ReasoningOracle, E: ActionExecutor> LoopAgent<O, E> {
    pub fn new(oracle: Arc<O>, executor: Arc<E>, working_dir: impl Into<String>) -> Self {
        Self {
            oracle,
            executor,
            working_dir: working_dir.into(),
        }
    }

    /// Reason about progress. A `done` answer ends the loop via decide.
    pub async fn think(&self, state: &mut LoopState) {
        let query = OracleQuery::Think {
            goal: &state.goal,
            iteration: state.iteration_count,
            max_iterations: state.max_iterations,
            working_memory: &state.working_memory,
            recent_observations: state.recent_observations(THINK_OBSERVATION_WINDOW),
            planned_actions: &state.planned_actions,
            last_action: state.last_action.as_deref(),
            last_result: state.last_result.as_ref(),
        };
        let response = self.oracle.consult(&query).await;

        match response {
            Ok(response) => {
                push(state, format!("[THINKING] {}", response.narrative));
                state.last_reasoning = Some(response.narrative);
                if response.done {
                    tracing::info!(
                        thread_id = %state.thread_id,
                        iteration = state.iteration_count,
                        "goal achieved"
                    );
                    state.should_continue = false;
                    state.exit_reason = Some(ExitReason::GoalAchieved);
                    state.phase = LoopPhase::Decide;
                } else {
                    state.phase = LoopPhase::Act;
                }
            }
            Err(e) => {
                tracing::warn!(thread_id = %state.thread_id, error = %e, "think phase failed");
                push(state, format!("[ERROR] Think phase failed: {e}"));
                state.last_reasoning = None;
                state.phase = LoopPhase::Act;
            }
        }
    }

    /// Ask for one action and run it. Always hands over to observe.
    pub async fn act(&self, state: &mut LoopState) {
        let reasoning = state.last_reasoning.clone().unwrap_or_default();
        let query = OracleQuery::SelectAction {
            goal: &state.goal,
            reasoning: &reasoning,
        };
        let response = self.oracle.consult(&query).await;

        match response {
            Ok(response) => {
                match response.actions.into_iter().find(|a| !a.is_noop()) {
                    Some(action) => self.run_action(state, &action).await,
                    None => {
                        state.last_result = None;
                        push(state, "[ACTION] No action needed".to_string());
                    }
                }
            }
            Err(e) => {
                tracing::warn!(thread_id = %state.thread_id, error = %e, "act phase failed");
                state.last_result = None;
                push(state, format!("[ERROR] Act phase failed: {e}"));
            }
        }
        state.phase = LoopPhase::Observe;
    }

    async fn run_action(&self, state: &mut LoopState, action: &PlannedAction) {
        let ctx = ActionContext {
            thread_id: &state.thread_id,
            working_dir: &self.working_dir,
        };
        let outcome = execute_recorded(self.executor.as_ref(), action, &ctx).await;

        let label = action.command().unwrap_or(action.kind.as_str()).to_string();
        tracing::info!(
            thread_id = %state.thread_id,
            action = %label,
            success = outcome.success,
            "loop action executed"
        );
        push(state, format!("[ACTION] Executed: {label}"));
        state.last_action = Some(label);
        state.last_result = Some(outcome);
    }

    /// Record a bounded observation of the last result, if there is one.
    pub fn observe(&self, state: &mut LoopState) {
        if let Some(result) = &state.last_result {
            let mut observation = format!("Command result - Success: {}", result.success);
            let stdout = result.stdout();
            if !stdout.is_empty() {
                observation.push_str("\nOutput: ");
                observation.push_str(&truncate(stdout));
            }
            let stderr = result.stderr();
            let error_text = if stderr.is_empty() {
                result.error.as_deref().unwrap_or_default()
            } else {
                stderr
            };
            if !error_text.is_empty() {
                observation.push_str("\nError: ");
                observation.push_str(&truncate(error_text));
            }

            let success = result.success;
            state
                .working_memory
                .insert(LAST_COMMAND_SUCCESS_KEY.to_string(), Value::Bool(success));
            push(state, format!("[OBSERVE] {observation}"));
            state.observations.push(observation);
        }
        state.phase = LoopPhase::Decide;
    }

    /// Stop at the iteration bound or on a recorded exit reason; else loop.
    ///
    /// At the bound an earlier exit reason (goal achieved on the last
    /// iteration) is kept.
    pub fn decide(&self, state: &mut LoopState) {
        if state.iteration_count >= state.max_iterations {
            state.should_continue = false;
            state.exit_reason = Some(ExitReason::IterationLimitReached);
            push(state, format!("[DECIDE] Stopping - {}", ExitReason::IterationLimitReached));
        } else if let Some(reason) = state.exit_reason {
            state.should_continue = false;
            push(state, format!("[DECIDE] Stopping - {reason}"));
        } else {
            state.should_continue = true;
            state.iteration_count += 1;
            state.phase = LoopPhase::Think;
            let message = format!("[DECIDE] Continuing to iteration {}", state.iteration_count);
            push(state, message);
        }
    }
}

fn push(state: &mut LoopState, content: String) {
    state.messages.push(ConversationMessage::assistant(content));
}

fn truncate(text: &str) -> String {
    text.chars().take(OBSERVATION_MAX_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{OracleError, OracleResponse};
    use crate::testing::{ScriptedExecutor, ScriptedOracle};
    use tinker_types::task::ActionOutcome;

    fn agent(oracle: ScriptedOracle) -> LoopAgent<ScriptedOracle, ScriptedExecutor> {
        LoopAgent::new(
            Arc::new(oracle),
            Arc::new(ScriptedExecutor::default()),
            "/workspace",
        )
    }

    fn last_message(state: &LoopState) -> &str {
        &state.messages.last().unwrap().content
    }

    #[tokio::test]
    async fn think_done_skips_to_decide() {
        let a = agent(ScriptedOracle::new(|_| {
            Ok(OracleResponse::narrative("found it").finished())
        }));
        let mut state = LoopState::new("t", "find README", 3);
        a.think(&mut state).await;

        assert!(!state.should_continue);
        assert_eq!(state.exit_reason, Some(ExitReason::GoalAchieved));
        assert_eq!(state.phase, LoopPhase::Decide);
        assert_eq!(last_message(&state), "[THINKING] found it");
    }

    #[tokio::test]
    async fn think_failure_degrades_to_act() {
        let a = agent(ScriptedOracle::new(|_| Err(OracleError::Request("503".into()))));
        let mut state = LoopState::new("t", "g", 3);
        a.think(&mut state).await;

        assert!(state.should_continue);
        assert_eq!(state.phase, LoopPhase::Act);
        assert!(last_message(&state).starts_with("[ERROR] Think phase failed"));
    }

    #[tokio::test]
    async fn act_runs_one_command() {
        let a = agent(ScriptedOracle::new(|query| match query {
            OracleQuery::SelectAction { .. } => Ok(OracleResponse::default().with_actions(vec![
                PlannedAction::shell("echo hi"),
                PlannedAction::shell("echo ignored"),
            ])),
            _ => Ok(OracleResponse::default()),
        }));
        let mut state = LoopState::new("t", "g", 3);
        a.act(&mut state).await;

        assert_eq!(state.last_action.as_deref(), Some("echo hi"));
        assert!(state.last_result.as_ref().unwrap().success);
        assert_eq!(state.phase, LoopPhase::Observe);
        assert_eq!(a.executor.executed(), vec!["echo hi"]);
    }

    #[tokio::test]
    async fn act_noop_clears_stale_result() {
        let a = agent(ScriptedOracle::new(|_| {
            Ok(OracleResponse::default().with_actions(vec![PlannedAction::noop("nothing to do")]))
        }));
        let mut state = LoopState::new("t", "g", 3);
        state.last_result = Some(ActionOutcome::succeeded(Value::Null));
        a.act(&mut state).await;

        assert!(state.last_result.is_none());
        assert_eq!(last_message(&state), "[ACTION] No action needed");
        assert_eq!(state.phase, LoopPhase::Observe);
    }

    #[tokio::test]
    async fn act_failure_still_observes() {
        let a = agent(ScriptedOracle::new(|_| Err(OracleError::InvalidResponse("garbled".into()))));
        let mut state = LoopState::new("t", "g", 3);
        a.act(&mut state).await;
        assert_eq!(state.phase, LoopPhase::Observe);
        assert!(last_message(&state).starts_with("[ERROR] Act phase failed"));
    }

    #[test]
    fn observe_truncates_output() {
        let a = agent(ScriptedOracle::planning(Vec::new()));
        let mut state = LoopState::new("t", "g", 3);
        state.last_result = Some(ActionOutcome::failed(
            "exit status 2",
            serde_json::json!({"stdout": "x".repeat(2000), "stderr": "e".repeat(700)}),
        ));
        a.observe(&mut state);

        let observation = &state.observations[0];
        assert!(observation.starts_with("Command result - Success: false"));
        let output = observation.split("\nOutput: ").nth(1).unwrap();
        let stdout_part = output.split("\nError: ").next().unwrap();
        assert_eq!(stdout_part.len(), OBSERVATION_MAX_CHARS);
        assert_eq!(
            state.working_memory.get(LAST_COMMAND_SUCCESS_KEY),
            Some(&Value::Bool(false))
        );
        assert_eq!(state.phase, LoopPhase::Decide);
    }

    #[test]
    fn observe_without_result_only_advances() {
        let a = agent(ScriptedOracle::planning(Vec::new()));
        let mut state = LoopState::new("t", "g", 3);
        a.observe(&mut state);
        assert!(state.observations.is_empty());
        assert!(state.working_memory.is_empty());
        assert_eq!(state.phase, LoopPhase::Decide);
    }

    #[test]
    fn decide_enforces_bound() {
        let a = agent(ScriptedOracle::planning(Vec::new()));
        let mut state = LoopState::new("t", "g", 2);

        a.decide(&mut state);
        assert!(state.should_continue);
        assert_eq!(state.iteration_count, 2);
        assert_eq!(state.phase, LoopPhase::Think);

        a.decide(&mut state);
        assert!(!state.should_continue);
        assert_eq!(state.iteration_count, 2);
        assert_eq!(state.exit_reason, Some(ExitReason::IterationLimitReached));
    }

    #[test]
    fn decide_at_bound_reports_iteration_limit() {
        let a = agent(ScriptedOracle::planning(Vec::new()));
        let mut state = LoopState::new("t", "g", 1);
        state.exit_reason = Some(ExitReason::GoalAchieved);
        a.decide(&mut state);
        assert!(!state.should_continue);
        assert_eq!(state.exit_reason, Some(ExitReason::IterationLimitReached));
        assert_eq!(last_message(&state), "[DECIDE] Stopping - max iterations reached");
    }

    #[test]
    fn decide_below_bound_keeps_goal_achieved() {
        let a = agent(ScriptedOracle::planning(Vec::new()));
        let mut state = LoopState::new("t", "g", 3);
        state.exit_reason = Some(ExitReason::GoalAchieved);
        a.decide(&mut state);
        assert!(!state.should_continue);
        assert_eq!(state.iteration_count, 1);
        assert_eq!(state.exit_reason, Some(ExitReason::GoalAchieved));
        assert_eq!(last_message(&state), "[DECIDE] Stopping - goal achieved");
    }
}
