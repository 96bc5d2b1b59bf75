//! Span and field names for the `tinker` binary.
//!
//! Each CLI invocation runs inside one [`SPAN_COMMAND`] span; the engine's
//! own spans (`execute_task`, `run_goal`, ...) nest beneath it.

/// Instrumentation scope for the OpenTelemetry tracer.
pub const TRACER_NAME: &str = "tinker";

/// One CLI command invocation.
pub const SPAN_COMMAND: &str = "tinker.command";

/// Thread the command operates on, recorded once known.
pub const THREAD_ID: &str = "thread_id";
