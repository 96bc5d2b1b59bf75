//! Tinker CLI entry point.
//!
//! Binary name: `tinker`
//!
//! Parses CLI arguments, loads configuration, wires the thread store and
//! runners, then dispatches to the command handler.

mod cli;
mod locks;
mod state;

use clap::Parser;
use clap_complete::generate;
use tracing::Instrument;

use tinker_core::oracle::BoxOracle;
use tinker_core::repository::memory::InMemoryThreadStore;
use tinker_core::repository::ThreadStore;
use tinker_infra::config::{load_config, resolve_data_dir};
use tinker_infra::oracle::DirectOracle;
use tinker_observe::attrs;
use tinker_observe::tracing_setup::{init_tracing, shutdown_tracing};
use tinker_types::config::OracleKind;

use cli::{new_thread_id, Cli, Commands};
use state::{build_oracle, open_sqlite_store, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    init_tracing(filter, cli.otel).map_err(|e| anyhow::anyhow!("tracing setup failed: {e}"))?;

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "tinker", &mut std::io::stdout());
        return Ok(());
    }

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let data_dir = resolve_data_dir();
    let config = load_config(&data_dir).await;

    let oracle_kind: OracleKind = cli.oracle.map(Into::into).unwrap_or(config.oracle);
    let oracle = if cli.command.needs_oracle() {
        build_oracle(oracle_kind, &config)?
    } else {
        BoxOracle::new(DirectOracle::new())
    };

    let span = tracing::info_span!(
        attrs::SPAN_COMMAND,
        command = cli.command.name(),
        oracle = ?oracle_kind,
        ephemeral = cli.ephemeral,
        thread_id = tracing::field::Empty,
    );

    if cli.ephemeral {
        let state = AppState::new(InMemoryThreadStore::new(), oracle, &config);
        dispatch(&state, cli.command, cli.json).instrument(span).await
    } else {
        let store = open_sqlite_store(&data_dir).await?;
        let state = AppState::new(store, oracle, &config);
        dispatch(&state, cli.command, cli.json).instrument(span).await
    }
}

async fn dispatch<S: ThreadStore>(state: &AppState<S>, command: Commands, json: bool) -> anyhow::Result<()> {
    let record_thread = |thread_id: &str| {
        tracing::Span::current().record(attrs::THREAD_ID, thread_id);
    };

    match command {
        Commands::Run { task, thread } => {
            let thread_id = thread.unwrap_or_else(new_thread_id);
            record_thread(&thread_id);
            cli::task::run_task(state, &task, &thread_id, json).await?;
        }

        Commands::Resume { thread } => {
            record_thread(&thread);
            cli::task::resume_task(state, &thread, json).await?;
        }

        Commands::Agent {
            goal,
            max_iterations,
            thread,
        } => {
            let thread_id = thread.unwrap_or_else(new_thread_id);
            record_thread(&thread_id);
            cli::agent::run_agent(state, &goal, max_iterations, &thread_id, json).await?;
        }

        Commands::AgentResume { thread } => {
            record_thread(&thread);
            cli::agent::resume_agent(state, &thread, json).await?;
        }

        Commands::Sessions => {
            cli::session::list_sessions(state, json).await?;
        }

        Commands::Checkpoints { thread, limit } => {
            record_thread(&thread);
            cli::session::list_checkpoints(state, &thread, limit, json).await?;
        }

        Commands::Show { thread } => {
            record_thread(&thread);
            cli::session::show_thread(state, &thread, json).await?;
        }

        Commands::Archive { thread } => {
            record_thread(&thread);
            cli::session::archive_thread(state, &thread, json).await?;
        }

        Commands::Clear { thread, all, yes } => {
            if let Some(thread_id) = &thread {
                record_thread(thread_id);
            }
            cli::session::clear(state, thread, all, yes, json).await?;
        }

        Commands::Completions { .. } => unreachable!("handled in main"),
    }

    Ok(())
}
