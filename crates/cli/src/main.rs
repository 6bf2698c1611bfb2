//! VetDesk CLI - command-line client for the practice management API

mod commands;
mod config;
mod logging;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use commands::{Commands, Context};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{Level, error, info};

/// Exit code used when the session could not be renewed
const EXIT_SESSION_EXPIRED: u8 = 2;

#[derive(Parser)]
#[command(name = "vetdesk")]
#[command(about = "Command-line client for the VetDesk practice management API")]
#[command(version)]
struct Cli {
    /// Set logging level
    #[arg(short = 'l', long, global = true, default_value = "warn")]
    log_level: LogLevel,

    /// Directory holding credentials, configuration and logs
    #[arg(short = 'd', long, global = true)]
    data_dir: Option<PathBuf>,

    /// Configuration file (defaults to <data-dir>/config.toml when present)
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// Per-request timeout in seconds, overriding the configuration (0 = no timeout)
    #[arg(short = 't', long, global = true)]
    timeout: Option<u64>,

    /// Disable file logging (only log to stderr)
    #[arg(long, global = true)]
    no_file_log: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let data_dir = config::resolve_data_dir(cli.data_dir);
    logging::init_logging(cli.log_level.into(), &data_dir, cli.no_file_log)?;

    let mut client_config = config::load_client_config(cli.config.as_deref(), &data_dir)?;
    if let Some(timeout) = cli.timeout {
        client_config.timeout_secs = timeout;
    }

    let context = Context::new(client_config, &data_dir)?;
    let mut events = context.client.subscribe();

    let result = cli.command.execute(&context).await;

    // The gateway only reports expiry; deciding what the user sees is up to us
    if let Some(reason) = commands::session_expired(&mut events) {
        error!(%reason, "Session expired");
        eprintln!("Your session has expired. Run `vetdesk login` to sign in again.");
        return Ok(ExitCode::from(EXIT_SESSION_EXPIRED));
    }

    match result {
        Ok(()) => {
            info!("Command completed successfully");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!("Command failed: {e:#}");
            eprintln!("Error: {e:#}");
            Ok(ExitCode::FAILURE)
        }
    }
}

#[derive(Clone, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(log_level: LogLevel) -> Self {
        match log_level {
            LogLevel::Error => Self::ERROR,
            LogLevel::Warn => Self::WARN,
            LogLevel::Info => Self::INFO,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Trace => Self::TRACE,
        }
    }
}
