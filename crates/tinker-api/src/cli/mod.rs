//! CLI command definitions and dispatch for the `tinker` binary.
//!
//! Uses clap derive macros for argument parsing. Commands map one-to-one onto
//! engine operations: run/resume a task, run/resume an agent loop, and the
//! read-only session and checkpoint views.

pub mod agent;
pub mod session;
pub mod task;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use tinker_types::config::OracleKind;

/// Run tasks and autonomous loops against a sandboxed shell, with
/// checkpointed, resumable threads.
#[derive(Parser)]
#[command(name = "tinker", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Keep threads in memory for this invocation only.
    #[arg(long, global = true)]
    pub ephemeral: bool,

    /// Reasoning backend (overrides config.toml).
    #[arg(long, global = true, value_enum)]
    pub oracle: Option<OracleArg>,

    /// Export spans to stdout via OpenTelemetry.
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute a task on a thread (new or continued).
    Run {
        /// The task text.
        task: String,

        /// Thread to run on. A new thread is created when omitted.
        #[arg(long, short)]
        thread: Option<String>,
    },

    /// Resume a task thread from its latest checkpoint.
    Resume {
        /// Thread id.
        thread: String,
    },

    /// Pursue a goal with the think-act-observe-decide loop.
    Agent {
        /// The goal text.
        goal: String,

        /// Upper bound on loop iterations (defaults to config.toml).
        #[arg(long, short = 'n', value_parser = clap::value_parser!(u32).range(1..))]
        max_iterations: Option<u32>,

        /// Thread to run on. A new thread is created when omitted.
        #[arg(long, short)]
        thread: Option<String>,
    },

    /// Resume an agent loop from its latest checkpoint.
    #[command(name = "agent-resume")]
    AgentResume {
        /// Thread id.
        thread: String,
    },

    /// List sessions, most recently used first.
    #[command(alias = "ls")]
    Sessions,

    /// List checkpoints for a thread, newest first.
    Checkpoints {
        /// Thread id.
        thread: String,

        /// Show at most this many checkpoints.
        #[arg(long, short = 'n')]
        limit: Option<u32>,
    },

    /// Show a thread's session and latest state.
    Show {
        /// Thread id.
        thread: String,
    },

    /// Mark a thread's session archived (it stays listed and resumable).
    Archive {
        /// Thread id.
        thread: String,
    },

    /// Delete one thread, or every thread with --all.
    #[command(alias = "rm")]
    Clear {
        /// Thread id.
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        thread: Option<String>,

        /// Clear every thread.
        #[arg(long)]
        all: bool,

        /// Skip confirmation prompt.
        #[arg(long, short)]
        yes: bool,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

impl Commands {
    /// Name used for the command span.
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Run { .. } => "run",
            Commands::Resume { .. } => "resume",
            Commands::Agent { .. } => "agent",
            Commands::AgentResume { .. } => "agent-resume",
            Commands::Sessions => "sessions",
            Commands::Checkpoints { .. } => "checkpoints",
            Commands::Show { .. } => "show",
            Commands::Archive { .. } => "archive",
            Commands::Clear { .. } => "clear",
            Commands::Completions { .. } => "completions",
        }
    }

    /// Whether the command consults the reasoning oracle.
    pub fn needs_oracle(&self) -> bool {
        matches!(
            self,
            Commands::Run { .. }
                | Commands::Resume { .. }
                | Commands::Agent { .. }
                | Commands::AgentResume { .. }
        )
    }
}

/// `--oracle` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OracleArg {
    Direct,
    Anthropic,
}

impl From<OracleArg> for OracleKind {
    fn from(arg: OracleArg) -> Self {
        match arg {
            OracleArg::Direct => OracleKind::Direct,
            OracleArg::Anthropic => OracleKind::Anthropic,
        }
    }
}

/// A fresh thread id (UUID v7, time-sortable).
pub fn new_thread_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

/// Truncate `text` to `max` characters for table cells.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let kept: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{kept}...")
    } else {
        text.to_string()
    }
}
