//! Direct-mode oracle: no reasoning service.
//!
//! The task text itself drives the work. Text that already looks like a
//! command runs as-is; anything else is echoed back through the shell so the
//! run still leaves an auditable trail.

use tinker_core::oracle::{OracleError, OracleQuery, OracleResponse, ReasoningOracle};
use tinker_types::task::{ActionResult, PlannedAction};

/// Oracle that plans the task text as a shell command.
#[derive(Debug, Clone)]
pub struct DirectOracle {
    command_prefixes: Vec<String>,
}

impl DirectOracle {
    pub fn new() -> Self {
        Self {
            command_prefixes: vec!["echo ".to_string()],
        }
    }

    /// Treat task text starting with any of `prefixes` as a command.
    pub fn with_command_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.command_prefixes = prefixes;
        self
    }

    fn plan(&self, task: &str) -> PlannedAction {
        let task = task.trim();
        if self.command_prefixes.iter().any(|p| task.starts_with(p.as_str())) {
            PlannedAction::shell(task)
        } else {
            PlannedAction::shell(format!("echo {}", shell_quote(&format!("Executed: {task}"))))
        }
    }
}

impl Default for DirectOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl ReasoningOracle for DirectOracle {
    fn name(&self) -> &str {
        "direct"
    }

    async fn consult(&self, query: &OracleQuery<'_>) -> Result<OracleResponse, OracleError> {
        let response = match *query {
            OracleQuery::Analyze { task, .. } => {
                let action = self.plan(task);
                let command = action.command().unwrap_or_default().to_string();
                OracleResponse::narrative(format!("Running: {command}")).with_actions(vec![action])
            }
            OracleQuery::Synthesize { results, .. } => {
                OracleResponse::narrative(describe_results(results))
            }
            OracleQuery::Think {
                goal, last_result, ..
            } => match last_result {
                Some(outcome) if outcome.success => {
                    OracleResponse::narrative("The last command succeeded; the goal is achieved.")
                        .finished()
                }
                Some(_) => OracleResponse::narrative(format!(
                    "The last command failed; trying again: {goal}"
                )),
                None => OracleResponse::narrative(format!("Running the goal as a command: {goal}")),
            },
            OracleQuery::SelectAction { goal, .. } => {
                OracleResponse::narrative(goal).with_actions(vec![PlannedAction::shell(goal)])
            }
        };
        Ok(response)
    }
}

fn describe_results(results: &[ActionResult]) -> String {
    results
        .iter()
        .map(|result| {
            let label = result
                .request
                .command()
                .unwrap_or(result.request.kind.as_str());
            if result.success {
                let stdout = result.outcome.stdout().trim_end();
                if stdout.is_empty() {
                    format!("Command executed successfully: {label}")
                } else {
                    format!("Command executed successfully: {label}\n{stdout}")
                }
            } else {
                let error = result.outcome.error.as_deref().unwrap_or("unknown error");
                format!("Command execution failed: {label}: {error}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Single-quote `s` for bash.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}
