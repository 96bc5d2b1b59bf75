//! Anthropic Claude oracle.
//!
//! Calls the Messages API (`/v1/messages`) non-streaming. Planning queries
//! expose a single `execute_shell_command` tool; every `tool_use` block in
//! the answer becomes a planned shell action.

pub mod client;
pub mod prompt;
pub mod types;

pub use client::AnthropicOracle;
