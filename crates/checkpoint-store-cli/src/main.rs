// crates/checkpoint-store-cli/src/main.rs
// ============================================================================
// Module: Checkpoint Store CLI Entry Point
// Description: Inspect and reset stored pipeline state.
// Purpose: Operator access to the configured backend without pipeline code.
// Dependencies: clap, checkpoint-store-config, checkpoint-store-core, tracing
// ============================================================================

//! ## Overview
//! `checkpoint-store` loads `checkpoint-store.toml`, builds the configured
//! backend, and runs one command against it:
//! - `show <KEY>` prints the stored value as JSON, exiting 1 when absent.
//! - `path <KEY>` prints the backend storage id for the key.
//! - `reset <KEY>` takes the lock and deletes the stored value.
//!
//! Errors exit with code 2. Logs go to stderr, filtered by
//! `CHECKPOINT_STORE_LOG` (default `warn`).

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use checkpoint_store_config::CheckpointStoreConfig;
use checkpoint_store_core::StateStorage;
use clap::Parser;
use clap::Subcommand;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Environment variable holding the log filter.
const LOG_ENV: &str = "CHECKPOINT_STORE_LOG";
/// Log filter used when [`LOG_ENV`] is unset or invalid.
const DEFAULT_LOG_FILTER: &str = "warn";
/// Exit code when `show` finds no stored state.
const EXIT_ABSENT: u8 = 1;
/// Exit code for any failure.
const EXIT_ERROR: u8 = 2;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "checkpoint-store", version, disable_help_subcommand = true)]
struct Cli {
    /// Config file path (overrides `CHECKPOINT_STORE_CONFIG`).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
enum Commands {
    /// Print the stored value for a key as JSON.
    Show {
        /// Pipeline key.
        key: String,
    },
    /// Print the backend storage id for a key.
    Path {
        /// Pipeline key.
        key: String,
    },
    /// Lock the key and delete its stored value.
    Reset {
        /// Pipeline key.
        key: String,
    },
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    init_logging();
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Parses arguments, builds the backend, and dispatches.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    let config = CheckpointStoreConfig::load(cli.config.as_deref())
        .map_err(|err| CliError::new(err.to_string()))?;
    let storage = config.storage.build().map_err(|err| CliError::new(err.to_string()))?;
    let mut stdout = std::io::stdout().lock();
    execute(&cli.command, storage.as_ref(), &mut stdout)
}

/// Installs the stderr log subscriber.
fn init_logging() {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Runs one command against a backend, writing results to `out`.
fn execute(
    command: &Commands,
    storage: &dyn StateStorage,
    out: &mut dyn Write,
) -> CliResult<ExitCode> {
    match command {
        Commands::Show {
            key,
        } => command_show(key, storage, out),
        Commands::Path {
            key,
        } => {
            write_line(out, &storage.storage_id(key))?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Reset {
            key,
        } => command_reset(key, storage, out),
    }
}

/// Prints the stored value, or reports absence with [`EXIT_ABSENT`].
fn command_show(key: &str, storage: &dyn StateStorage, out: &mut dyn Write) -> CliResult<ExitCode> {
    let Some(payload) = storage.load_payload(key).map_err(|err| CliError::new(err.to_string()))?
    else {
        write_stderr_line(&format!("no stored state for {}", storage.storage_id(key)));
        return Ok(ExitCode::from(EXIT_ABSENT));
    };
    let value: serde_json::Value = payload
        .decode()
        .map_err(|err| CliError::new(format!("stored value is not json: {err}")))?;
    let rendered = serde_json::to_string_pretty(&value)
        .map_err(|err| CliError::new(format!("failed to render value: {err}")))?;
    write_line(out, &rendered)?;
    Ok(ExitCode::SUCCESS)
}

/// Deletes the stored value under the key's lock.
fn command_reset(
    key: &str,
    storage: &dyn StateStorage,
    out: &mut dyn Write,
) -> CliResult<ExitCode> {
    let storage_id = storage.storage_id(key);
    let mut guard = storage.lock(key).map_err(|err| CliError::new(err.to_string()))?;
    storage.cleanup(key, &mut guard).map_err(|err| CliError::new(err.to_string()))?;
    info!(storage_id = %storage_id, "state reset");
    write_line(out, &format!("reset {storage_id}"))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a line to the command output.
fn write_line(out: &mut dyn Write, message: &str) -> CliResult<()> {
    writeln!(out, "{message}").map_err(|err| CliError::new(format!("stdout write failed: {err}")))
}

/// Writes a line to stderr, ignoring failures.
fn write_stderr_line(message: &str) {
    let mut stderr = std::io::stderr().lock();
    let _ = writeln!(stderr, "{message}");
}

/// Emits an error message to stderr and returns the failure exit code.
fn emit_error(message: &str) -> ExitCode {
    write_stderr_line(message);
    ExitCode::from(EXIT_ERROR)
}
