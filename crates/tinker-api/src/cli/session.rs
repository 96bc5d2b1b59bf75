//! Session and checkpoint commands: sessions, checkpoints, show, archive, clear.
//!
//! Provides session browsing with rich tables and thread deletion with a
//! confirmation prompt for the clear-everything case.

use anyhow::{bail, Context, Result};
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;
use dialoguer::Confirm;

use tinker_core::agent_loop::runner::summary;
use tinker_core::repository::ThreadStore;
use tinker_core::session::ClearScope;
use tinker_types::session::{SessionStatus, ThreadSnapshot};
use tinker_types::task::ExecutionStatus;

use crate::cli::truncate;
use crate::state::AppState;

/// List sessions, most recently accessed first.
///
/// # Examples
///
/// ```bash
/// tinker sessions
/// tinker sessions --json
/// ```
pub async fn list_sessions<S: ThreadStore>(state: &AppState<S>, json: bool) -> Result<()> {
    let sessions = state.sessions.list_sessions().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }

    if sessions.is_empty() {
        println!();
        println!(
            "  {} No sessions yet. Start one with: {}",
            style("i").blue().bold(),
            style("tinker run \"echo hello\"").yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Thread").fg(Color::White),
        Cell::new("Summary").fg(Color::White),
        Cell::new("Created").fg(Color::White),
        Cell::new("Last used").fg(Color::White),
        Cell::new("Status").fg(Color::White),
    ]);

    for session in &sessions {
        let status_cell = match session.status {
            SessionStatus::Active => Cell::new("active").fg(Color::Green),
            SessionStatus::Archived => Cell::new("archived").fg(Color::DarkGrey),
        };
        table.add_row(vec![
            Cell::new(&session.thread_id).fg(Color::Cyan),
            Cell::new(truncate(&session.summary, 40)),
            Cell::new(session.created_at.format("%Y-%m-%d %H:%M").to_string()).fg(Color::DarkGrey),
            Cell::new(session.last_accessed_at.format("%Y-%m-%d %H:%M").to_string()),
            status_cell,
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} session{}",
        style(sessions.len()).bold(),
        if sessions.len() == 1 { "" } else { "s" }
    );
    println!();

    Ok(())
}

/// List checkpoint metadata for a thread, newest first.
pub async fn list_checkpoints<S: ThreadStore>(
    state: &AppState<S>,
    thread_id: &str,
    limit: Option<u32>,
    json: bool,
) -> Result<()> {
    let records = state.checkpointer.history(thread_id, limit).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!();
        println!(
            "  {} No checkpoints for thread '{}'.",
            style("i").blue().bold(),
            style(thread_id).cyan()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Checkpoint").fg(Color::White),
        Cell::new("Created").fg(Color::White),
        Cell::new("Kind").fg(Color::White),
        Cell::new("Marker").fg(Color::White),
        Cell::new("Status").fg(Color::White),
    ]);

    for record in &records {
        table.add_row(vec![
            Cell::new(record.checkpoint_id).fg(Color::DarkGrey),
            Cell::new(record.created_at.format("%Y-%m-%d %H:%M:%S").to_string()),
            Cell::new(record.kind),
            Cell::new(record.resumption_marker.as_deref().unwrap_or("-")).fg(Color::Cyan),
            status_cell(record.execution_status),
        ]);
    }

    println!();
    println!("  Checkpoints for '{}'", style(thread_id).cyan().bold());
    println!();
    println!("{table}");
    println!();

    Ok(())
}

/// Show a thread's session and latest snapshot.
pub async fn show_thread<S: ThreadStore>(state: &AppState<S>, thread_id: &str, json: bool) -> Result<()> {
    let session = state.sessions.get(thread_id).await?;
    let snapshot = state.checkpointer.load(thread_id).await?;

    if session.is_none() && snapshot.is_none() {
        bail!("Thread '{thread_id}' not found");
    }

    if json {
        let view = serde_json::json!({
            "session": session,
            "snapshot": snapshot,
        });
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    println!();
    println!("  {} {}", style("Thread").dim(), style(thread_id).cyan().bold());
    if let Some(session) = &session {
        println!("  {} {}", style("Summary").dim(), session.summary);
        println!("  {} {}", style("Status").dim(), session.status);
        println!(
            "  {} {}",
            style("Created").dim(),
            session.created_at.format("%Y-%m-%d %H:%M:%S")
        );
        println!(
            "  {} {}",
            style("Last used").dim(),
            session.last_accessed_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    println!();

    match &snapshot {
        Some(ThreadSnapshot::Task(task)) => {
            println!(
                "  {} task, {} ({})",
                style("Latest").dim(),
                task.execution_status,
                task.resumption_marker
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "-".to_string())
            );
            println!();
            for message in &task.conversation_history {
                println!("  {} {}", style(format!("{}:", message.role)).bold(), message.content);
            }
        }
        Some(ThreadSnapshot::Loop(agent)) => {
            println!("  {} loop, {}", style("Latest").dim(), summary(agent));
            println!();
            for message in &agent.messages {
                println!("  {}", message.content);
            }
        }
        None => println!("  {} no checkpoint", style("Latest").dim()),
    }
    println!();

    Ok(())
}

/// Archive a thread's session.
pub async fn archive_thread<S: ThreadStore>(state: &AppState<S>, thread_id: &str, json: bool) -> Result<()> {
    state
        .sessions
        .archive(thread_id)
        .await
        .with_context(|| format!("Thread '{thread_id}' not found"))?;

    if json {
        println!("{}", serde_json::json!({ "thread_id": thread_id, "status": "archived" }));
    } else {
        println!();
        println!(
            "  {} Archived '{}'",
            style("✓").green().bold(),
            style(thread_id).cyan()
        );
        println!();
    }
    Ok(())
}

/// Delete one thread, or every thread.
///
/// Clearing everything requires `--yes` or interactive confirmation.
pub async fn clear<S: ThreadStore>(
    state: &AppState<S>,
    thread: Option<String>,
    all: bool,
    yes: bool,
    json: bool,
) -> Result<()> {
    let scope = match (thread, all) {
        (_, true) => ClearScope::Everything,
        (Some(thread_id), false) => ClearScope::Thread(thread_id),
        (None, false) => bail!("Specify a thread id or --all"),
    };

    if scope == ClearScope::Everything && !yes {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Delete {} threads, sessions and checkpoints?",
                style("ALL").red().bold()
            ))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("  Cancelled.");
            return Ok(());
        }
    }

    let removed = state.sessions.clear(scope.clone()).await?;

    if json {
        println!("{}", serde_json::json!({ "removed": removed }));
        return Ok(());
    }

    println!();
    match scope {
        ClearScope::Thread(thread_id) if removed == 0 => println!(
            "  {} Nothing stored for '{}'",
            style("i").blue().bold(),
            style(thread_id).cyan()
        ),
        ClearScope::Thread(thread_id) => println!(
            "  {} Cleared '{}'",
            style("✓").green().bold(),
            style(thread_id).cyan()
        ),
        ClearScope::Everything => println!(
            "  {} Cleared {} thread{}",
            style("✓").green().bold(),
            style(removed).bold(),
            if removed == 1 { "" } else { "s" }
        ),
    }
    println!();

    Ok(())
}

fn status_cell(status: ExecutionStatus) -> Cell {
    let color = match status {
        ExecutionStatus::Completed => Color::Green,
        ExecutionStatus::Failed => Color::Red,
        _ => Color::Yellow,
    };
    Cell::new(status).fg(color)
}
