//! Prompt construction for each oracle query.
//!
//! Each query maps to one Messages API request: an optional system prompt,
//! the user turns, and whether the shell tool is offered.

use std::fmt::Write;

use tinker_core::oracle::OracleQuery;
use tinker_types::message::{ConversationMessage, MessageRole};
use tinker_types::task::ActionResult;

use super::types::AnthropicMessage;

/// Sentinel the model writes when the loop goal is achieved.
pub const GOAL_ACHIEVED: &str = "GOAL_ACHIEVED";

/// Sentinel the model writes when no command is needed.
pub const NO_ACTION: &str = "NO_ACTION";

/// The pieces of a request derived from a query.
#[derive(Debug, Clone)]
pub struct Prompt {
    pub system: Option<String>,
    pub messages: Vec<AnthropicMessage>,
    pub offer_shell_tool: bool,
}

/// Build the prompt for `query`.
pub fn build(query: &OracleQuery<'_>) -> Prompt {
    match *query {
        OracleQuery::Analyze {
            task,
            history,
            working_dir,
        } => {
            let mut messages = history_messages(history);
            messages.push(AnthropicMessage::user(task));
            Prompt {
                system: Some(analyze_system(working_dir)),
                messages,
                offer_shell_tool: true,
            }
        }
        OracleQuery::Synthesize { task, results } => Prompt {
            system: None,
            messages: vec![AnthropicMessage::user(synthesize_text(task, results))],
            offer_shell_tool: false,
        },
        OracleQuery::Think { .. } => Prompt {
            system: None,
            messages: vec![AnthropicMessage::user(think_text(query))],
            offer_shell_tool: false,
        },
        OracleQuery::SelectAction { reasoning, .. } => Prompt {
            system: None,
            messages: vec![AnthropicMessage::user(format!(
                "Based on this thinking: {reasoning}\n\n\
                 What specific command should I run? Respond with ONLY the command, nothing else.\n\
                 If no command is needed, respond with '{NO_ACTION}'."
            ))],
            offer_shell_tool: false,
        },
    }
}

fn analyze_system(working_dir: &str) -> String {
    format!(
        "You are Tinker, an autonomous engineering agent with shell access to a sandbox \
         container. Commands run with bash in {working_dir}. Use the execute_shell_command \
         tool for every command the task needs, in the order they should run, and explain \
         your plan briefly. If the task needs no commands, answer directly."
    )
}

/// Prior turns, without system messages (the API takes those separately).
fn history_messages(history: &[ConversationMessage]) -> Vec<AnthropicMessage> {
    history
        .iter()
        .filter(|m| m.role != MessageRole::System)
        .map(|m| AnthropicMessage {
            role: m.role.to_string(),
            content: m.content.clone(),
        })
        .collect()
}

fn synthesize_text(task: &str, results: &[ActionResult]) -> String {
    let mut text = format!("Task: {task}\n\nCommand results:\n");
    for (i, result) in results.iter().enumerate() {
        let label = result
            .request
            .command()
            .unwrap_or(result.request.kind.as_str());
        let _ = writeln!(text, "{}. {label} (success: {})", i + 1, result.success);
        if !result.outcome.stdout().is_empty() {
            let _ = writeln!(text, "stdout:\n{}", result.outcome.stdout().trim_end());
        }
        if !result.outcome.stderr().is_empty() {
            let _ = writeln!(text, "stderr:\n{}", result.outcome.stderr().trim_end());
        }
        if let Some(error) = &result.outcome.error {
            let _ = writeln!(text, "error: {error}");
        }
    }
    text.push_str("\nSummarize for the user what was done and what the results show.");
    text
}

fn think_text(query: &OracleQuery<'_>) -> String {
    let OracleQuery::Think {
        goal,
        iteration,
        max_iterations,
        working_memory,
        recent_observations,
        planned_actions,
        last_action,
        last_result,
    } = *query
    else {
        return String::new();
    };

    let memory = serde_json::to_string(working_memory).unwrap_or_default();
    let last_result = last_result
        .and_then(|r| serde_json::to_string(r).ok())
        .unwrap_or_else(|| "None".to_string());

    format!(
        "Current Goal: {goal}\n\
         Iteration: {iteration}/{max_iterations}\n\n\
         Working Memory:\n{memory}\n\n\
         Recent Observations:\n{observations}\n\n\
         Planned Actions Queue:\n{planned}\n\n\
         Last Action: {last_action}\n\
         Last Result: {last_result}\n\n\
         Think about:\n\
         1. What progress have we made toward the goal?\n\
         2. What do we still need to learn or do?\n\
         3. What should be our next action?\n\n\
         Respond with your reasoning and what specific action to take next (or '{GOAL_ACHIEVED}' if done).",
        observations = recent_observations.join("\n"),
        planned = planned_actions.join("\n"),
        last_action = last_action.unwrap_or("None"),
    )
}
