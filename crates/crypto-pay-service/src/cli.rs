//! Command-line interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Crypto Pay webhook receiver
#[derive(Debug, Parser)]
#[command(name = "crypto-pay-webhook")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Receives and verifies Crypto Pay webhook updates")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "CRYPTO_PAY_CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Crypto Pay API token, used to verify update signatures
    #[arg(long, env = "CRYPTO_PAY_API_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Enable JSON logging
    #[arg(long)]
    pub json_logs: bool,

    /// Subcommand to execute; defaults to `serve`
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Debug, Clone, Subcommand, PartialEq, Eq)]
pub enum Commands {
    /// Run the webhook receiver
    Serve,

    /// Validate configuration and exit
    CheckConfig {
        /// Print the resolved configuration as JSON
        #[arg(short, long)]
        show: bool,
    },
}

impl Cli {
    /// Command to run, `serve` when none was given.
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Serve)
    }
}
