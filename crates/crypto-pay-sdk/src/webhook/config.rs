//! Webhook endpoint configuration.

use serde::{Deserialize, Serialize};
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Webhook endpoint configuration.
///
/// Immutable once the endpoint is built. Hostname and path are required;
/// everything else has a default.
///
/// # Examples
///
/// ```
/// use crypto_pay_sdk::WebhookConfig;
///
/// let config = WebhookConfig::new("127.0.0.1", "/crypto-pay/updates").with_port(8080);
/// assert!(config.validate().is_ok());
/// assert!(config.update_verification);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Host to bind to
    pub server_hostname: String,

    /// Port to listen on
    #[serde(default = "default_server_port")]
    pub server_port: u16,

    /// Route path, must start with `/`
    pub path: String,

    /// Certificate and key; presence switches the listener to TLS
    #[serde(default)]
    pub tls: Option<TlsConfig>,

    /// Require a valid `crypto-pay-api-signature` on every update
    #[serde(default = "default_update_verification")]
    pub update_verification: bool,

    /// Maximum request body size in bytes
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,

    /// Time allowed for the full request body to arrive
    #[serde(default = "default_read_timeout_seconds")]
    pub read_timeout_seconds: u64,

    /// Grace period for in-flight requests on shutdown
    #[serde(default = "default_shutdown_timeout_seconds")]
    pub shutdown_timeout_seconds: u64,
}

fn default_server_port() -> u16 {
    80
}

fn default_update_verification() -> bool {
    true
}

fn default_max_body_size() -> usize {
    1024 * 1024 // 1MB
}

fn default_read_timeout_seconds() -> u64 {
    10
}

fn default_shutdown_timeout_seconds() -> u64 {
    30
}

impl WebhookConfig {
    /// Create a configuration with the required fields and defaults elsewhere.
    pub fn new(server_hostname: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            server_hostname: server_hostname.into(),
            server_port: default_server_port(),
            path: path.into(),
            tls: None,
            update_verification: default_update_verification(),
            max_body_size: default_max_body_size(),
            read_timeout_seconds: default_read_timeout_seconds(),
            shutdown_timeout_seconds: default_shutdown_timeout_seconds(),
        }
    }

    /// Set the listening port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.server_port = port;
        self
    }

    /// Serve over TLS with the given certificate material.
    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Enable or disable signature verification.
    pub fn with_update_verification(mut self, enabled: bool) -> Self {
        self.update_verification = enabled;
        self
    }

    /// Set the maximum accepted body size.
    pub fn with_max_body_size(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    /// Set the body read timeout.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout_seconds = timeout.as_secs();
        self
    }

    /// Set the graceful shutdown timeout.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout_seconds = timeout.as_secs();
        self
    }

    /// Body read timeout as a `Duration`.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_seconds)
    }

    /// Graceful shutdown timeout as a `Duration`.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }

    /// Validate the configuration.
    ///
    /// Called before any socket is bound; failures are fatal.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server_hostname.trim().is_empty() {
            return Err(ConfigError::Missing {
                key: "webhook.server_hostname".to_string(),
            });
        }

        if self.path.is_empty() {
            return Err(ConfigError::Missing {
                key: "webhook.path".to_string(),
            });
        }

        if !self.path.starts_with('/') {
            return Err(ConfigError::Invalid {
                field: "webhook.path".to_string(),
                message: format!("must start with '/', got '{}'", self.path),
            });
        }

        // The router reads braces and leading `:` or `*` as capture syntax
        let capture_like = self.path.contains(['{', '}'])
            || self
                .path
                .split('/')
                .any(|segment| segment.starts_with([':', '*']));
        if capture_like {
            return Err(ConfigError::Invalid {
                field: "webhook.path".to_string(),
                message: format!("must be a literal path, got '{}'", self.path),
            });
        }

        if self.max_body_size == 0 {
            return Err(ConfigError::Invalid {
                field: "webhook.max_body_size".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        if self.read_timeout_seconds == 0 {
            return Err(ConfigError::Invalid {
                field: "webhook.read_timeout_seconds".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        if let Some(tls) = &self.tls {
            tls.validate()?;
        }

        Ok(())
    }

    /// Resolve the bind address from hostname and port.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        (self.server_hostname.as_str(), self.server_port)
            .to_socket_addrs()
            .map_err(|e| ConfigError::Invalid {
                field: "webhook.server_hostname".to_string(),
                message: format!("cannot resolve '{}': {}", self.server_hostname, e),
            })?
            .next()
            .ok_or_else(|| ConfigError::Invalid {
                field: "webhook.server_hostname".to_string(),
                message: format!("'{}' resolved to no addresses", self.server_hostname),
            })
    }
}

/// PEM-encoded certificate chain and private key for the TLS listener.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TlsConfig {
    /// Path to the PEM certificate chain
    pub certificate_path: PathBuf,

    /// Path to the PEM private key
    pub private_key_path: PathBuf,
}

impl TlsConfig {
    /// Create a TLS configuration from file paths.
    pub fn new(certificate_path: impl Into<PathBuf>, private_key_path: impl Into<PathBuf>) -> Self {
        Self {
            certificate_path: certificate_path.into(),
            private_key_path: private_key_path.into(),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.certificate_path.as_os_str().is_empty() {
            return Err(ConfigError::Missing {
                key: "webhook.tls.certificate_path".to_string(),
            });
        }

        if self.private_key_path.as_os_str().is_empty() {
            return Err(ConfigError::Missing {
                key: "webhook.tls.private_key_path".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
