//! Shared domain types for Tinker.
//!
//! This crate contains the state records that flow through the task engine
//! (`TaskState`, `LoopState`), the persisted session and checkpoint records,
//! configuration, and the repository error type.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod agent_loop;
pub mod config;
pub mod error;
pub mod message;
pub mod session;
pub mod task;
