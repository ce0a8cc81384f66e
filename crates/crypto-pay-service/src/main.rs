//! # Crypto Pay Webhook Service
//!
//! Binary entry point for the standalone webhook receiver.
//!
//! This executable:
//! - Loads configuration from files and `CP__` environment variables
//! - Initializes structured logging
//! - Serves the signature-verified webhook endpoint until SIGINT/SIGTERM

use clap::Parser;
use crypto_pay_service::{
    init_tracing, load_config, run, shutdown_signal, Cli, Commands, LoggingConfig, EXIT_CONFIG,
};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logging settings live in the configuration, so load it first and
    // report any failure once a subscriber is installed.
    let loaded = load_config(cli.config.as_deref());
    let logging = loaded
        .as_ref()
        .map(|config| config.logging.clone())
        .unwrap_or_else(|_| LoggingConfig::default());
    init_tracing(&logging, cli.json_logs);

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Service configuration is invalid; aborting");
            std::process::exit(EXIT_CONFIG);
        }
    };

    match cli.command() {
        Commands::CheckConfig { show } => {
            if show {
                match serde_json::to_string_pretty(&config) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        error!(error = %e, "Failed to render configuration");
                        std::process::exit(EXIT_CONFIG);
                    }
                }
            }
            info!("Configuration is valid");
        }
        Commands::Serve => {
            let Some(token) = cli.token.as_deref().filter(|t| !t.trim().is_empty()) else {
                error!("No API token given; set CRYPTO_PAY_API_TOKEN or pass --token");
                std::process::exit(EXIT_CONFIG);
            };

            if let Err(e) = run(config, token, shutdown_signal()).await {
                error!(error = %e, "Webhook service failed");
                std::process::exit(e.exit_code());
            }

            info!("Webhook service stopped");
        }
    }
}
