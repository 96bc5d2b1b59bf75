//! Task pipeline commands: run and resume.

use anyhow::{bail, Result};
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;

use tinker_core::repository::ThreadStore;
use tinker_types::message::MessageRole;
use tinker_types::task::{ExecutionStatus, TaskState};

use crate::cli::truncate;
use crate::state::AppState;

/// Execute a task on a thread, creating the thread if needed.
///
/// # Examples
///
/// ```bash
/// tinker run "echo hi"
/// tinker run "list the repo" --thread build-fix
/// ```
pub async fn run_task<S: ThreadStore>(
    state: &AppState<S>,
    task: &str,
    thread_id: &str,
    json: bool,
) -> Result<()> {
    let _guard = state.locks.acquire(thread_id).await;

    let result = state.tasks.execute_task(thread_id, task).await;
    render(&result, json)
}

/// Resume a task thread from its latest checkpoint.
///
/// # Examples
///
/// ```bash
/// tinker resume build-fix
/// ```
pub async fn resume_task<S: ThreadStore>(state: &AppState<S>, thread_id: &str, json: bool) -> Result<()> {
    let _guard = state.locks.acquire(thread_id).await;

    let result = state.tasks.resume(thread_id).await;
    render(&result, json)
}

fn render(result: &TaskState, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        print_task(result);
    }

    if result.execution_status == ExecutionStatus::Failed {
        let reason = result
            .resumption_marker
            .as_ref()
            .map(|m| m.to_string())
            .unwrap_or_else(|| "unknown error".to_string());
        bail!("Task on thread '{}' failed: {reason}", result.thread_id());
    }
    Ok(())
}

fn print_task(result: &TaskState) {
    println!();
    println!(
        "  {} {}",
        style("Thread").dim(),
        style(result.thread_id()).cyan().bold()
    );
    println!("  {} {}", style("Task").dim(), result.task_content);
    println!();

    if !result.action_results.is_empty() {
        let mut table = Table::new();
        table.load_preset(presets::UTF8_FULL_CONDENSED);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            Cell::new("#").fg(Color::White),
            Cell::new("Action").fg(Color::White),
            Cell::new("Result").fg(Color::White),
            Cell::new("Output").fg(Color::White),
        ]);

        for (i, action) in result.action_results.iter().enumerate() {
            let label = action
                .request
                .command()
                .unwrap_or(action.request.kind.as_str());
            let status = if action.success {
                Cell::new("ok").fg(Color::Green)
            } else {
                Cell::new("failed").fg(Color::Red)
            };
            let output = match (&action.outcome.error, action.outcome.stdout().trim()) {
                (Some(error), _) => error.clone(),
                (None, stdout) => stdout.to_string(),
            };
            table.add_row(vec![
                Cell::new(i + 1).fg(Color::DarkGrey),
                Cell::new(truncate(label, 40)).fg(Color::Cyan),
                status,
                Cell::new(truncate(&output, 60)),
            ]);
        }

        println!("{table}");
        println!();
    }

    if let Some(reply) = result
        .conversation_history
        .iter()
        .rev()
        .find(|m| m.role == MessageRole::Assistant)
    {
        for line in reply.content.lines() {
            println!("  {line}");
        }
        println!();
    }

    let status = match result.execution_status {
        ExecutionStatus::Completed => style(result.execution_status.to_string()).green(),
        ExecutionStatus::Failed => style(result.execution_status.to_string()).red(),
        _ => style(result.execution_status.to_string()).yellow(),
    };
    println!("  {} {}", style("Status").dim(), status);
    println!();
}
