//! # roomlink
//!
//! CLI tool for exercising the roomlink client adapter.
//!
//! ## Commands
//!
//! - `clock`: Probe a time authority and print the estimated offset
//! - `check-config`: Validate a config file and print it with defaults filled in
//! - `demo`: Walk an adapter through a session on the mock transport
//!
//! ## Example
//!
//! ```bash
//! # Estimate the offset against a server's Date header
//! roomlink clock --endpoint https://rooms.example.com/ --probes 5
//!
//! # Validate configuration
//! roomlink check-config --file roomlink.toml
//!
//! # Mock session with verbose logging
//! roomlink -v demo --room lobby
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{check_config, clock, demo};

/// CLI tool for exercising the roomlink client adapter.
#[derive(Parser, Debug)]
#[command(name = "roomlink")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Probe a time authority and print the estimated clock offset
    Clock {
        /// URL whose Date header is the reference time
        #[arg(long, short)]
        endpoint: String,

        /// Number of probes to average
        #[arg(long, short, default_value = "10")]
        probes: u32,

        /// Seconds before a single probe is abandoned
        #[arg(long, default_value = "10")]
        timeout_secs: u64,
    },

    /// Validate a config file and print it with defaults filled in
    CheckConfig {
        /// Path to the TOML config file
        #[arg(long, short)]
        file: PathBuf,
    },

    /// Walk an adapter through a session on the mock transport
    Demo {
        /// Room to join
        #[arg(long, default_value = "default")]
        room: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Clock {
            endpoint,
            probes,
            timeout_secs,
        } => {
            clock::run(&endpoint, probes, Duration::from_secs(timeout_secs)).await?;
        }
        Commands::CheckConfig { file } => {
            check_config::run(&file)?;
        }
        Commands::Demo { room } => {
            demo::run(&room).await?;
        }
    }

    Ok(())
}
