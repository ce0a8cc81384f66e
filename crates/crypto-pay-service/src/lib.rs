//! # Crypto Pay Webhook Service
//!
//! Standalone receiver for Crypto Pay webhook updates. The service verifies
//! each delivery, dispatches recognized updates to a structured update log
//! and answers the platform with the status codes it expects.

pub mod cli;
pub mod config;

use crypto_pay_sdk::webhook::handler_fn;
use crypto_pay_sdk::{CryptoPay, CryptoPayOptions, HandlerError, ServerError};
use std::future::Future;
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use crate::cli::{Cli, Commands};
pub use crate::config::{load_config, LoggingConfig, ServiceConfig, DEFAULT_LOG_FILTER};

/// Exit code for configuration failures.
pub const EXIT_CONFIG: i32 = 3;

/// Exit code for runtime failures.
pub const EXIT_RUNTIME: i32 = 1;

/// Service-level errors.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A configuration source could not be read or deserialized.
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    /// Configuration values are invalid.
    #[error(transparent)]
    Config(#[from] crypto_pay_sdk::ConfigError),

    /// The webhook server failed.
    #[error(transparent)]
    Server(#[from] ServerError),
}

impl ServiceError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Load(_) | Self::Config(_) => EXIT_CONFIG,
            Self::Server(ServerError::Config(_)) => EXIT_CONFIG,
            Self::Server(_) => EXIT_RUNTIME,
        }
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured filter. JSON output is used when
/// either the configuration or `force_json` asks for it.
pub fn init_tracing(logging: &LoggingConfig, force_json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| logging.default_filter().into());
    let registry = tracing_subscriber::registry().with(filter);

    if logging.json_format || force_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Build the client and subscribe the update log to every recognized type.
pub async fn build_client(
    config: &ServiceConfig,
    token: &str,
) -> Result<CryptoPay, ServiceError> {
    let options = CryptoPayOptions::default()
        .with_webhook(config.webhook.clone())
        .with_recognized_update_types(config.recognized());
    let crypto_pay = CryptoPay::new(token, options)?;

    for update_type in &config.recognized_update_types {
        crypto_pay
            .on(
                update_type.as_str(),
                handler_fn(|record| async move {
                    info!(
                        update_type = %record.update_type(),
                        update_id = ?record.payload().get("update_id"),
                        payload = %serde_json::Value::Object(record.payload().clone()),
                        "Update received"
                    );
                    Ok::<(), HandlerError>(())
                }),
            )
            .await;
    }

    Ok(crypto_pay)
}

/// Serve webhooks until `shutdown` completes, then tear down subscriptions.
pub async fn run<F>(config: ServiceConfig, token: &str, shutdown: F) -> Result<(), ServiceError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let crypto_pay = build_client(&config, token).await?;

    info!(
        host = %config.webhook.server_hostname,
        port = config.webhook.server_port,
        path = %config.webhook.path,
        "Starting Crypto Pay webhook service"
    );

    let result = crypto_pay.listen(shutdown).await;
    crypto_pay.shutdown().await;

    result.map_err(ServiceError::from)
}

/// Resolves on SIGINT (Ctrl+C) or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C), initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
