//! Reasoning oracle adapters.
//!
//! Implements the `ReasoningOracle` port from `tinker-core`:
//! - [`anthropic`]: Anthropic Messages API with one shell tool
//! - [`direct`]: no reasoning service, the task text drives the commands

pub mod anthropic;
pub mod direct;

pub use anthropic::AnthropicOracle;
pub use direct::DirectOracle;
