//! Agent loop commands: start a goal and resume a paused loop.

use anyhow::{bail, Result};
use console::style;

use tinker_core::agent_loop::runner::summary;
use tinker_core::repository::ThreadStore;
use tinker_types::agent_loop::LoopState;

use crate::state::AppState;

/// Run the think-act-observe-decide loop toward `goal`.
///
/// # Examples
///
/// ```bash
/// tinker agent "find the README and count its lines" -n 5
/// ```
pub async fn run_agent<S: ThreadStore>(
    state: &AppState<S>,
    goal: &str,
    max_iterations: Option<u32>,
    thread_id: &str,
    json: bool,
) -> Result<()> {
    let _guard = state.locks.acquire(thread_id).await;

    let result = state.agent.run_goal(thread_id, goal, max_iterations).await;
    render(&result, json)
}

/// Resume a loop from its latest checkpoint.
pub async fn resume_agent<S: ThreadStore>(state: &AppState<S>, thread_id: &str, json: bool) -> Result<()> {
    let _guard = state.locks.acquire(thread_id).await;

    let result = state.agent.resume_loop(thread_id).await;
    render(&result, json)
}

fn render(result: &LoopState, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        print_loop(result);
    }

    if let Some(error) = &result.error {
        bail!("Loop on thread '{}' failed: {error}", result.thread_id);
    }
    Ok(())
}

fn print_loop(result: &LoopState) {
    println!();
    println!(
        "  {} {}",
        style("Thread").dim(),
        style(&result.thread_id).cyan().bold()
    );
    println!("  {} {}", style("Goal").dim(), result.goal);
    println!();

    for message in &result.messages {
        let content = message.content.as_str();
        let styled = if content.starts_with("[THINKING]") {
            style(content).blue()
        } else if content.starts_with("[ACTION]") {
            style(content).cyan()
        } else if content.starts_with("[OBSERVE]") {
            style(content).dim()
        } else if content.starts_with("[DECIDE]") {
            style(content).yellow()
        } else if content.starts_with("[ERROR]") {
            style(content).red()
        } else {
            style(content)
        };
        println!("  {styled}");
    }

    println!();
    println!("  {}", style(summary(result)).bold());
    println!();
}
