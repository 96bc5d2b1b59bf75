//! Infrastructure layer for Tinker.
//!
//! Contains implementations of the ports defined in `tinker-core`: the SQLite
//! thread store, the Anthropic and direct-mode reasoning oracles, the shell
//! executor, and the config/data-directory loaders.

pub mod config;
pub mod executor;
pub mod oracle;
pub mod sqlite;
