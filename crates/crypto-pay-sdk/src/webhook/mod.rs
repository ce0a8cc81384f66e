//! Webhook handling for Crypto Pay update deliveries.
//!
//! # Overview
//!
//! The platform POSTs an update to the configured path whenever something
//! happens on the account. Each delivery flows through:
//!
//! 1. [`WebhookServer`] buffers the body, bounded by size and time
//! 2. [`WebhookReceiver`] matches the route and verifies the
//!    `crypto-pay-api-signature` header over the raw bytes
//! 3. The body is parsed as a JSON object ([`ParsedUpdate`])
//! 4. [`UpdateDispatcher`] checks the update type against
//!    [`RecognizedUpdateTypes`] and strips the `update_type` field
//! 5. [`SubscriptionRegistry`] runs the subscribed handlers in order
//!
//! Status codes: `200` acknowledged, `400` route mismatch or bad signature,
//! `415` malformed body, `413`/`408` oversized or stalled body, declared
//! status or `500` on dispatch failure.
//!
//! # Security
//!
//! Signatures are HMAC-SHA256 keyed by `SHA-256(api_token)` and compared in
//! constant time. Verification can be switched off with
//! `update_verification: false`, which should only be done behind a trusted
//! proxy.

pub mod config;
pub mod dispatcher;
pub mod receiver;
pub mod registry;
pub mod server;
pub mod update;
pub mod validation;

pub use config::{TlsConfig, WebhookConfig};
pub use dispatcher::{DispatchOutcome, UpdateDispatcher};
pub use receiver::{WebhookReceiver, WebhookRequest, WebhookResponse, SIGNATURE_HEADER};
pub use registry::{
    handler_fn, EmitReport, FnHandler, SubscriptionHandle, SubscriptionRegistry, UpdateHandler,
};
pub use server::{BoundWebhookServer, WebhookServer};
pub use update::{EventRecord, ParsedUpdate, RecognizedUpdateTypes, Update, UpdateType};
pub use validation::{sign, verify, SignatureValidator};
