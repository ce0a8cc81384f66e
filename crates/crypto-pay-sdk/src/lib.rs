//! # Crypto Pay SDK
//!
//! Client-side toolkit for the Crypto Pay payment platform with a
//! signature-verified webhook receiver.
//!
//! This SDK provides:
//! - API token handling with webhook secret derivation
//! - Webhook signature verification (HMAC-SHA256 keyed by `SHA-256(token)`)
//! - An axum-based webhook endpoint (plain HTTP or TLS)
//! - Update dispatching against a data-driven allow-list of update types
//! - A subscription registry for application handlers
//!
//! # Examples
//!
//! ## Subscribing to Paid Invoices
//!
//! ```rust,no_run
//! use crypto_pay_sdk::{CryptoPay, CryptoPayOptions, WebhookConfig};
//! use crypto_pay_sdk::webhook::handler_fn;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let options = CryptoPayOptions::default()
//!     .with_webhook(WebhookConfig::new("0.0.0.0", "/crypto-pay/updates").with_port(8080));
//! let crypto_pay = CryptoPay::new("42:YOURTOKEN", options)?;
//!
//! crypto_pay
//!     .invoice_paid(handler_fn(|record| async move {
//!         println!("Invoice paid: {:?}", record.payload().get("payload"));
//!         Ok(())
//!     }))
//!     .await;
//!
//! crypto_pay.listen(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Verifying a Delivery by Hand
//!
//! ```rust
//! use crypto_pay_sdk::webhook::{sign, verify};
//!
//! let body = br#"{"update_type":"invoice_paid","update_id":1}"#;
//! let signature = sign(body, "42:QWERTY");
//!
//! assert!(verify(body, "42:QWERTY", &signature));
//! assert!(!verify(body, "42:OTHER", &signature));
//! ```

// Public modules
pub mod auth;
pub mod client;
pub mod error;
pub mod webhook;

// Re-export commonly used types at crate root for convenience
pub use auth::{ApiToken, WebhookSecret};
pub use client::{CryptoPay, CryptoPayOptions};
pub use error::{ConfigError, DispatchError, HandlerError, ServerError, WebhookError};
pub use webhook::{
    EventRecord, RecognizedUpdateTypes, SubscriptionHandle, SubscriptionRegistry, TlsConfig,
    Update, UpdateHandler, UpdateType, WebhookConfig, WebhookReceiver, WebhookServer,
};
