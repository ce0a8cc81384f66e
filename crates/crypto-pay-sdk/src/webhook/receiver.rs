//! Transport-independent webhook request pipeline.
//!
//! The receiver takes a fully buffered request and walks it through route
//! matching, signature verification, body parsing and dispatch. Every path
//! ends in exactly one [`WebhookResponse`]; nothing escapes as a fault.
//!
//! # Examples
//!
//! ```rust
//! use crypto_pay_sdk::webhook::{sign, UpdateDispatcher, WebhookReceiver, WebhookRequest};
//! use crypto_pay_sdk::{ApiToken, RecognizedUpdateTypes, SubscriptionRegistry, WebhookConfig};
//!
//! # async fn example() {
//! let token = ApiToken::new("42:QWERTY");
//! let config = WebhookConfig::new("127.0.0.1", "/updates");
//! let dispatcher = UpdateDispatcher::new(
//!     RecognizedUpdateTypes::default(),
//!     SubscriptionRegistry::new(),
//! );
//! let receiver = WebhookReceiver::new(&config, &token, dispatcher);
//!
//! let body = br#"{"update_type":"invoice_paid","update_id":1}"#;
//! let request = WebhookRequest::post("/updates", body.to_vec())
//!     .with_header("Crypto-Pay-API-Signature", sign(body, "42:QWERTY"));
//!
//! let response = receiver.receive(request).await;
//! assert_eq!(response.status_code(), 200);
//! # }
//! ```

use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use std::collections::HashMap;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use crate::auth::ApiToken;
use crate::error::WebhookError;
use crate::webhook::config::WebhookConfig;
use crate::webhook::dispatcher::{DispatchOutcome, UpdateDispatcher};
use crate::webhook::update::ParsedUpdate;
use crate::webhook::validation::SignatureValidator;

/// Header carrying the hex HMAC-SHA256 signature of the body.
pub const SIGNATURE_HEADER: &str = "crypto-pay-api-signature";

// ============================================================================
// Webhook Request/Response Types
// ============================================================================

/// Buffered inbound webhook request.
///
/// Header names are stored lower-cased, so lookups are case-insensitive.
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    method: Method,
    path: String,
    headers: HashMap<String, String>,
    body: Bytes,
}

impl WebhookRequest {
    /// Create a request from its parts.
    pub fn new(
        method: Method,
        path: impl Into<String>,
        headers: HashMap<String, String>,
        body: impl Into<Bytes>,
    ) -> Self {
        let headers = headers
            .into_iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value))
            .collect();

        Self {
            method,
            path: path.into(),
            headers,
            body: body.into(),
        }
    }

    /// Create a `POST` request with no headers.
    pub fn post(path: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self::new(Method::POST, path, HashMap::new(), body)
    }

    /// Add a header, replacing any previous value with the same name.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Get the value of the `crypto-pay-api-signature` header.
    pub fn signature(&self) -> Option<&str> {
        self.header(SIGNATURE_HEADER)
    }

    /// Get a header by name, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request path, without query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Raw body bytes.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// All headers, keyed by lower-cased name.
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }
}

/// Response decided for a webhook request.
#[derive(Debug)]
pub enum WebhookResponse {
    /// 200 OK - update verified and handled (or ignored)
    Accepted(DispatchOutcome),

    /// Request refused; the error carries its status code
    Rejected(WebhookError),
}

impl WebhookResponse {
    /// Get the HTTP status code for this response.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Accepted(_) => 200,
            Self::Rejected(e) => e.status_code(),
        }
    }

    /// Check if response indicates success.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

impl IntoResponse for WebhookResponse {
    fn into_response(self) -> Response {
        match self {
            // Acknowledgement only; the platform ignores the body
            Self::Accepted(_) => StatusCode::OK.into_response(),
            Self::Rejected(e) => e.into_response(),
        }
    }
}

// ============================================================================
// Webhook Receiver
// ============================================================================

/// Webhook receiver for processing buffered Crypto Pay deliveries.
///
/// Dispatch completes before the response is decided, so a `200` means every
/// subscriber has run. Subscriber failures never change the response.
#[derive(Debug, Clone)]
pub struct WebhookReceiver {
    path: String,
    validator: Option<SignatureValidator>,
    dispatcher: UpdateDispatcher,
}

impl WebhookReceiver {
    /// Create a receiver for the configured route.
    ///
    /// The signing secret is derived from `token` once, here. With
    /// `update_verification` disabled no secret is kept at all.
    pub fn new(config: &WebhookConfig, token: &ApiToken, dispatcher: UpdateDispatcher) -> Self {
        let validator = config
            .update_verification
            .then(|| SignatureValidator::new(token));

        Self {
            path: config.path.clone(),
            validator,
            dispatcher,
        }
    }

    /// Route path this receiver accepts.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Check if signatures are verified.
    pub fn verifies_signatures(&self) -> bool {
        self.validator.is_some()
    }

    /// Dispatcher used for verified updates.
    pub fn dispatcher(&self) -> &UpdateDispatcher {
        &self.dispatcher
    }

    /// Process a buffered webhook request.
    ///
    /// # Processing Steps
    ///
    /// 1. Match method and path (400 on mismatch)
    /// 2. Verify the signature over the raw body, if enabled (400)
    /// 3. Parse the body as a JSON object (415)
    /// 4. Dispatch to subscribers (declared status or 500 on failure)
    pub async fn receive(&self, request: WebhookRequest) -> WebhookResponse {
        let delivery_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "webhook_delivery",
            delivery_id = %delivery_id,
            path = %request.path(),
        );

        match self.process(&request).instrument(span).await {
            Ok(outcome) => WebhookResponse::Accepted(outcome),
            Err(e) => WebhookResponse::Rejected(e),
        }
    }

    async fn process(&self, request: &WebhookRequest) -> Result<DispatchOutcome, WebhookError> {
        if request.method() != Method::POST || request.path() != self.path {
            debug!(method = %request.method(), "Request does not match webhook route");
            return Err(WebhookError::RouteMismatch);
        }

        if let Some(validator) = &self.validator {
            let Some(signature) = request.signature() else {
                warn!("Missing signature header");
                return Err(WebhookError::MissingSignature);
            };

            if !validator.verify(request.body(), signature) {
                warn!("Invalid webhook signature");
                return Err(WebhookError::InvalidSignature);
            }
        }

        let update = ParsedUpdate::from_slice(request.body())?;
        let update_type = update.update_type().map(str::to_string);

        let outcome = self.dispatcher.handle(update).await?;

        if let DispatchOutcome::Delivered(report) = &outcome {
            info!(
                update_type = ?update_type,
                handlers = report.invoked,
                failed = report.failed,
                "Webhook update dispatched"
            );
        }

        Ok(outcome)
    }
}

#[cfg(test)]
#[path = "receiver_tests.rs"]
mod tests;
