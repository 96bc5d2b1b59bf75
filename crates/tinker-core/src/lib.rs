//! Task engine and repository trait definitions for Tinker.
//!
//! This crate holds the two graphs (the bounded task pipeline and the
//! open-ended reasoning loop), their runners, and the "ports" the
//! infrastructure layer implements: repository traits, the reasoning oracle,
//! and the action executor. It depends only on `tinker-types` -- never on
//! `tinker-infra` or any database/IO crate.

pub mod agent_loop;
pub mod checkpoint;
pub mod error;
pub mod executor;
pub mod oracle;
pub mod pipeline;
pub mod repository;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;
