//! # grove
//!
//! Runs Grove log connectors from a configuration file.
//!
//! ## Commands
//!
//! - `run`: Collect new entries for every connector (or one)
//! - `status`: Show durable state per connector
//! - `unlock`: Force-release a connector's execution lock
//!
//! ## Example
//!
//! ```bash
//! # Collect everything configured in grove.toml
//! grove run
//!
//! # Collect a single connector with debug logging
//! grove --verbose run --connector acme-audit
//!
//! # Inspect pointers, windows and locks
//! grove status
//!
//! # Clear the lock of a crashed run
//! grove unlock --connector acme-audit
//! ```
//!
//! Logs go to standard error; standard output carries collected entries
//! when a connector uses the `stdout` output.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{run, status, unlock};
use grove_connector::Config;

/// Runs Grove log connectors.
#[derive(Parser, Debug)]
#[command(name = "grove")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, short, global = true, default_value = "grove.toml")]
    config: PathBuf,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Collect new entries
    Run {
        /// Only run this connector
        #[arg(long)]
        connector: Option<String>,
    },

    /// Show pointer, window and lock state
    Status {
        /// Only show this connector
        #[arg(long)]
        connector: Option<String>,
    },

    /// Force-release a connector's execution lock
    Unlock {
        /// Connector to unlock
        #[arg(long)]
        connector: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::from_file(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;

    match cli.command {
        Commands::Run { connector } => {
            run::run(&config, connector.as_deref()).await?;
        }
        Commands::Status { connector } => {
            status::run(&config, connector.as_deref()).await?;
        }
        Commands::Unlock { connector } => {
            unlock::run(&config, &connector).await?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
