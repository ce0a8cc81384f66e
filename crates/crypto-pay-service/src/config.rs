//! Service configuration.
//!
//! Sources, applied in order (later sources override earlier ones):
//!
//! 1. `/etc/crypto-pay/webhook.yaml` - system-wide defaults
//! 2. `./config/webhook.yaml` - deployment-local override
//! 3. An explicit file from `--config` or `CRYPTO_PAY_CONFIG_FILE`
//! 4. Environment variables prefixed `CP__`, with `__` between levels,
//!    e.g. `CP__WEBHOOK__SERVER_PORT=8443`
//!
//! Files are optional except the explicit one. The API token is never read
//! from these sources.

use crypto_pay_sdk::{RecognizedUpdateTypes, WebhookConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::ServiceError;

/// Prefix for configuration environment variables.
pub const ENV_PREFIX: &str = "CP";

/// Default tracing filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "crypto_pay_service=info,crypto_pay_sdk=info,tower_http=info";

/// Complete service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Webhook endpoint settings
    pub webhook: WebhookConfig,

    /// Update types forwarded to the update log
    #[serde(default = "default_recognized_update_types")]
    pub recognized_update_types: Vec<String>,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_recognized_update_types() -> Vec<String> {
    RecognizedUpdateTypes::default()
        .iter()
        .map(|t| t.as_str().to_string())
        .collect()
}

impl ServiceConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), crypto_pay_sdk::ConfigError> {
        self.webhook.validate()?;

        if let Some(blank) = self
            .recognized_update_types
            .iter()
            .find(|t| t.trim().is_empty())
        {
            return Err(crypto_pay_sdk::ConfigError::Invalid {
                field: "recognized_update_types".to_string(),
                message: format!("update type names must not be blank, got '{}'", blank),
            });
        }

        Ok(())
    }

    /// Allow-list built from `recognized_update_types`.
    pub fn recognized(&self) -> RecognizedUpdateTypes {
        self.recognized_update_types.iter().map(String::as_str).collect()
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json_format: bool,

    /// Tracing filter used when `RUST_LOG` is unset
    #[serde(default)]
    pub filter: Option<String>,
}

impl LoggingConfig {
    /// Filter directive to fall back on.
    pub fn default_filter(&self) -> &str {
        self.filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }
}

/// Assemble the layered configuration sources.
pub fn config_builder(
    explicit_path: Option<&Path>,
) -> config::ConfigBuilder<config::builder::DefaultState> {
    let mut builder = config::Config::builder()
        .add_source(
            config::File::with_name("/etc/crypto-pay/webhook")
                .required(false)
                .format(config::FileFormat::Yaml),
        )
        .add_source(
            config::File::with_name("config/webhook")
                .required(false)
                .format(config::FileFormat::Yaml),
        );

    if let Some(path) = explicit_path {
        builder = builder.add_source(config::File::from(path).required(true));
    }

    builder.add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
}

/// Load and validate the service configuration.
///
/// # Errors
///
/// Returns `ServiceError::Load` when a source cannot be read or does not
/// deserialize, and `ServiceError::Config` when the values are invalid.
pub fn load_config(explicit_path: Option<&Path>) -> Result<ServiceConfig, ServiceError> {
    let config: ServiceConfig = config_builder(explicit_path).build()?.try_deserialize()?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
