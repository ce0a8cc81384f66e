//! Webhook signature validation implementation.
//!
//! The platform signs each delivery with HMAC-SHA256 over the raw request
//! body, keyed by `SHA-256(api_token)`, and sends the lowercase hex digest in
//! the `crypto-pay-api-signature` header. Validation is stateless and
//! deterministic, so a redelivered body verifies exactly like the first one.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::auth::{ApiToken, WebhookSecret};

type HmacSha256 = Hmac<Sha256>;

/// Verify a webhook signature against a raw body and token.
///
/// Returns `true` iff `signature_hex` is the lowercase hex encoding of
/// `HMAC-SHA256(SHA-256(token), raw_body)`. Malformed signatures yield
/// `false`, never an error.
///
/// # Examples
///
/// ```
/// use crypto_pay_sdk::webhook::{sign, verify};
///
/// let body = br#"{"update_type":"invoice_paid"}"#;
/// let signature = sign(body, "42:QWERTY");
/// assert!(verify(body, "42:QWERTY", &signature));
/// ```
pub fn verify(raw_body: &[u8], token: &str, signature_hex: &str) -> bool {
    SignatureValidator::from_secret(WebhookSecret::derive(token)).verify(raw_body, signature_hex)
}

/// Compute the lowercase hex signature the platform would send for a body.
pub fn sign(raw_body: &[u8], token: &str) -> String {
    SignatureValidator::from_secret(WebhookSecret::derive(token)).sign(raw_body)
}

/// Validates webhook signatures using HMAC-SHA256.
///
/// Holds the derived secret so the token digest is computed once per
/// process rather than once per delivery.
///
/// # Security
///
/// - Uses constant-time comparison to prevent timing attacks
/// - Never logs secrets or signature values
#[derive(Clone)]
pub struct SignatureValidator {
    secret: WebhookSecret,
}

impl SignatureValidator {
    /// Create a validator for the given API token.
    pub fn new(token: &ApiToken) -> Self {
        Self::from_secret(token.webhook_secret())
    }

    /// Create a validator from an already derived secret.
    pub fn from_secret(secret: WebhookSecret) -> Self {
        Self { secret }
    }

    /// Validate a signature for a raw body.
    ///
    /// Surrounding whitespace in the header value is ignored. Uppercase hex
    /// is rejected since the platform always sends lowercase digests.
    pub fn verify(&self, raw_body: &[u8], signature_hex: &str) -> bool {
        let signature_hex = signature_hex.trim();
        if signature_hex.bytes().any(|b| b.is_ascii_uppercase()) {
            return false;
        }

        let Ok(provided) = hex::decode(signature_hex) else {
            return false;
        };

        let expected = self.compute_hmac(raw_body);
        constant_time_compare(&provided, &expected)
    }

    /// Lowercase hex HMAC-SHA256 of the body.
    pub fn sign(&self, raw_body: &[u8]) -> String {
        hex::encode(self.compute_hmac(raw_body))
    }

    fn compute_hmac(&self, raw_body: &[u8]) -> Vec<u8> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(self.secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(raw_body);
        mac.finalize().into_bytes().to_vec()
    }
}

fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    // Length is not secret: every valid signature is 32 bytes
    if a.len() != b.len() {
        return false;
    }

    a.ct_eq(b).into()
}

// Security: Don't expose secrets in debug output
impl std::fmt::Debug for SignatureValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureValidator")
            .field("secret", &"<REDACTED>")
            .finish()
    }
}

#[cfg(test)]
#[path = "validation_tests.rs"]
mod tests;
