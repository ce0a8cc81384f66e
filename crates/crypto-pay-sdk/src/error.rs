//! Error types for Crypto Pay SDK operations.
//!
//! Configuration failures are fatal and surface at construction time. Every
//! per-request failure is a [`WebhookError`] carrying its own HTTP status code,
//! so the endpoint converts failures into responses without a generic catch.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use thiserror::Error;
use tracing::{error, warn};

/// Failure reported by an application update handler.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Configuration errors.
///
/// Raised while constructing the client or the webhook endpoint, always
/// before any socket is opened. These are never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required configuration value is absent.
    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    /// A configuration value is present but unusable.
    #[error("Invalid configuration for {field}: {message}")]
    Invalid { field: String, message: String },

    /// TLS certificate or key material could not be loaded.
    #[error("TLS configuration error: {message}")]
    Tls { message: String },
}

/// Errors raised while dispatching a verified update to subscribers.
///
/// Subscriber failures are not represented here: they are isolated per
/// handler and reported through [`EmitReport`](crate::webhook::EmitReport).
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The registry was torn down while the request was in flight.
    #[error("Subscription registry is closed")]
    RegistryClosed,

    /// Dispatch failed with an optional declared status code.
    ///
    /// The registry raises it without a status (500) when an emission task
    /// is lost, e.g. on runtime shutdown. Embedders dispatching through their
    /// own transport may declare a status for the platform to see.
    #[error("Dispatch failed: {message}")]
    Failed { status: Option<u16>, message: String },
}

impl DispatchError {
    /// HTTP status code for this failure, defaulting to 500.
    pub fn status_code(&self) -> u16 {
        match self {
            // Service unavailable so the platform redelivers later
            Self::RegistryClosed => 503,
            Self::Failed { status, .. } => status.unwrap_or(500),
        }
    }
}

/// Per-request webhook failures with HTTP status code mapping.
///
/// - `400 Bad Request`: route mismatch, missing or wrong signature, unreadable body
/// - `408 Request Timeout`: body did not arrive within the read timeout
/// - `413 Payload Too Large`: body exceeded the configured limit
/// - `415 Unsupported Media Type`: body is not a JSON object
/// - dispatch failures: declared status, or `500`
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Method or path did not match the configured route.
    #[error("Request does not match the webhook route")]
    RouteMismatch,

    /// Verification is enabled but the signature header is absent.
    #[error("Wrong signature")]
    MissingSignature,

    /// The signature does not match the request body.
    #[error("Wrong signature")]
    InvalidSignature,

    /// The body could not be decoded as a JSON object.
    #[error("Malformed update body: {message}")]
    MalformedBody { message: String },

    /// The body exceeded the configured size limit.
    #[error("Payload too large (max: {max_size} bytes)")]
    PayloadTooLarge { max_size: usize },

    /// The body did not fully arrive in time.
    #[error("Request body not received within {seconds}s")]
    BodyTimeout { seconds: u64 },

    /// The connection failed while the body was being read.
    #[error("Failed to read request body: {message}")]
    BodyRead { message: String },

    /// Dispatching the update failed.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl WebhookError {
    /// HTTP status code for this failure.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::RouteMismatch => 400,
            Self::MissingSignature | Self::InvalidSignature => 400,
            Self::MalformedBody { .. } => 415,
            Self::PayloadTooLarge { .. } => 413,
            Self::BodyTimeout { .. } => 408,
            Self::BodyRead { .. } => 400,
            Self::Dispatch(e) => e.status_code(),
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let message = if status.is_server_error() {
            // Log detail server-side, return a generic message to the caller
            error!(error = %self, status = status.as_u16(), "Webhook dispatch failed");
            "Internal server error occurred".to_string()
        } else {
            warn!(error = %self, status = status.as_u16(), "Webhook request rejected");
            self.to_string()
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        (status, Json(body)).into_response()
    }
}

/// Errors raised by the webhook listener itself.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind to address {address}: {message}")]
    Bind { address: String, message: String },

    #[error("Server failed: {message}")]
    Serve { message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
