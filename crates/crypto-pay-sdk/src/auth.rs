//! API token and webhook secret types.
//!
//! The API token is shared between the application and the platform. It is
//! never sent in webhook traffic; the platform signs deliveries with a key
//! derived from it, `SHA-256(token)`, which [`ApiToken::webhook_secret`]
//! reproduces.

use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Crypto Pay application API token.
///
/// The token value is wiped from memory on drop and redacted from `Debug`
/// output.
///
/// # Examples
///
/// ```
/// use crypto_pay_sdk::auth::ApiToken;
///
/// let token = ApiToken::new("42:QWERTY");
/// assert_eq!(token.expose(), "42:QWERTY");
/// assert!(!format!("{:?}", token).contains("QWERTY"));
/// ```
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ApiToken(String);

impl ApiToken {
    /// Wrap a raw token string.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Access the raw token value.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Check if the token is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Derive the webhook signing secret: `SHA-256(token)`.
    ///
    /// The token is always digested first, giving a fixed 32-byte key
    /// regardless of the token's length or format.
    pub fn webhook_secret(&self) -> WebhookSecret {
        WebhookSecret::derive(&self.0)
    }
}

impl From<&str> for ApiToken {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

impl From<String> for ApiToken {
    fn from(token: String) -> Self {
        Self::new(token)
    }
}

impl std::fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ApiToken").field(&"<REDACTED>").finish()
    }
}

/// HMAC key used to sign webhook deliveries.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct WebhookSecret([u8; 32]);

impl WebhookSecret {
    /// Derive the secret from a raw token string.
    pub fn derive(token: &str) -> Self {
        let digest = Sha256::digest(token.as_bytes());
        Self(digest.into())
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for WebhookSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("WebhookSecret").field(&"<REDACTED>").finish()
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
