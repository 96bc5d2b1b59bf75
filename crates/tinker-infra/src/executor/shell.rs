//! Shell executor for `shell` actions.
//!
//! Runs the action's `command` parameter through `bash -c`, either on the
//! host or inside a docker container via `docker exec`. No sanitization is
//! applied: the command runs exactly as planned.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use serde_json::json;
use tokio::process::Command;

use tinker_core::executor::{ActionContext, ActionExecutor, ExecutorError};
use tinker_types::config::ExecutorConfig;
use tinker_types::task::{ActionOutcome, NOOP_ACTION_KIND, PlannedAction, SHELL_ACTION_KIND};

/// Default timeout per command (60 seconds).
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Executes shell actions with a per-command timeout.
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    container: Option<String>,
    timeout: Duration,
}

impl ShellExecutor {
    /// Run commands directly on the host.
    pub fn local() -> Self {
        Self {
            container: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Run commands inside `container` with `docker exec`.
    pub fn in_container(container: impl Into<String>) -> Self {
        Self {
            container: Some(container.into()),
            ..Self::local()
        }
    }

    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self {
            container: config.container.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn command_for(&self, command: &str, working_dir: &str) -> Command {
        match &self.container {
            Some(container) => {
                let mut cmd = Command::new("docker");
                cmd.arg("exec")
                    .arg("-w")
                    .arg(working_dir)
                    .arg(container)
                    .arg("bash")
                    .arg("-c")
                    .arg(command);
                cmd
            }
            None => {
                let mut cmd = Command::new("bash");
                cmd.arg("-c").arg(command);
                // The host may not have the sandbox's working directory.
                if Path::new(working_dir).is_dir() {
                    cmd.current_dir(working_dir);
                }
                cmd
            }
        }
    }

    async fn run_shell(
        &self,
        command: &str,
        ctx: &ActionContext<'_>,
    ) -> Result<ActionOutcome, ExecutorError> {
        let start = Instant::now();

        let child = self
            .command_for(command, ctx.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExecutorError::Spawn(format!("{command}: {e}")))?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| ExecutorError::Spawn(e.to_string()))?,
            Err(_) => {
                tracing::warn!(
                    thread_id = ctx.thread_id,
                    command,
                    timeout_secs = self.timeout.as_secs(),
                    "command timed out"
                );
                return Ok(ActionOutcome::failed(
                    format!("command timed out after {}s", self.timeout.as_secs()),
                    json!({ "command": command }),
                ));
            }
        };

        let returncode = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        tracing::debug!(
            thread_id = ctx.thread_id,
            command,
            returncode,
            duration_ms = start.elapsed().as_millis() as u64,
            "command finished"
        );

        let payload = json!({
            "command": command,
            "stdout": stdout,
            "stderr": stderr,
            "returncode": returncode,
        });

        if output.status.success() {
            Ok(ActionOutcome::succeeded(payload))
        } else {
            Ok(ActionOutcome::failed(
                format!("command exited with status {returncode}"),
                payload,
            ))
        }
    }
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::local()
    }
}

impl ActionExecutor for ShellExecutor {
    async fn execute(
        &self,
        action: &PlannedAction,
        ctx: &ActionContext<'_>,
    ) -> Result<ActionOutcome, ExecutorError> {
        match action.kind.as_str() {
            SHELL_ACTION_KIND => {
                let command = action
                    .command()
                    .filter(|c| !c.trim().is_empty())
                    .ok_or_else(|| ExecutorError::InvalidParams("command is required".into()))?;
                self.run_shell(command, ctx).await
            }
            NOOP_ACTION_KIND => Ok(ActionOutcome::succeeded(json!({
                "reason": action.params.get("reason").cloned().unwrap_or_default(),
            }))),
            other => Ok(ActionOutcome::failed(
                format!("Unknown action kind: {other}"),
                serde_json::Value::Null,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(dir: &str) -> ActionContext<'_> {
        ActionContext {
            thread_id: "t1",
            working_dir: dir,
        }
    }

    #[tokio::test]
    async fn runs_command_and_captures_output() {
        let executor = ShellExecutor::local();
        let outcome = executor
            .execute(&PlannedAction::shell("echo hello"), &ctx("/nonexistent"))
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.stdout(), "hello\n");
        assert_eq!(outcome.payload["returncode"], 0);
        assert_eq!(outcome.payload["command"], "echo hello");
    }

    #[tokio::test]
    async fn nonzero_exit_is_unsuccessful() {
        let executor = ShellExecutor::local();
        let outcome = executor
            .execute(
                &PlannedAction::shell("echo oops >&2; exit 3"),
                &ctx("/nonexistent"),
            )
            .await
            .unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.stderr(), "oops\n");
        assert_eq!(outcome.payload["returncode"], 3);
        assert_eq!(outcome.error.as_deref(), Some("command exited with status 3"));
    }

    #[tokio::test]
    async fn uses_working_dir_when_present() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_str().unwrap();
        let outcome = ShellExecutor::local()
            .execute(&PlannedAction::shell("pwd"), &ctx(dir))
            .await
            .unwrap();

        let reported = std::fs::canonicalize(outcome.stdout().trim()).unwrap();
        assert_eq!(reported, std::fs::canonicalize(tmp.path()).unwrap());
    }

    #[tokio::test]
    async fn timeout_is_unsuccessful_outcome() {
        let executor = ShellExecutor::local().with_timeout(Duration::from_millis(100));
        let outcome = executor
            .execute(&PlannedAction::shell("sleep 5"), &ctx("/nonexistent"))
            .await
            .unwrap();

        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn missing_command_is_invalid() {
        let action = PlannedAction::new(SHELL_ACTION_KIND, json!({ "reason": "none" }));
        let result = ShellExecutor::local().execute(&action, &ctx("/")).await;
        assert!(matches!(result, Err(ExecutorError::InvalidParams(_))));
    }

    #[tokio::test]
    async fn noop_and_unknown_kinds() {
        let executor = ShellExecutor::local();
        let noop = executor
            .execute(&PlannedAction::noop("nothing to do"), &ctx("/"))
            .await
            .unwrap();
        assert!(noop.success);
        assert_eq!(noop.payload["reason"], "nothing to do");

        let unknown = executor
            .execute(&PlannedAction::new("email", json!({})), &ctx("/"))
            .await
            .unwrap();
        assert!(!unknown.success);
        assert_eq!(unknown.error.as_deref(), Some("Unknown action kind: email"));
    }

    #[test]
    fn from_config_reads_container_and_timeout() {
        let config = ExecutorConfig {
            container: Some("sandbox".into()),
            timeout_secs: 5,
            working_dir: "/workspace".into(),
        };
        let executor = ShellExecutor::from_config(&config);
        assert_eq!(executor.container.as_deref(), Some("sandbox"));
        assert_eq!(executor.timeout, Duration::from_secs(5));
    }
}
