//! Action executors.
//!
//! Implements the `ActionExecutor` port from `tinker-core`.

pub mod shell;

pub use shell::ShellExecutor;
