//! Observability for Tinker: tracing subscriber setup and the span/field
//! names the engine records under.

pub mod attrs;
pub mod tracing_setup;
