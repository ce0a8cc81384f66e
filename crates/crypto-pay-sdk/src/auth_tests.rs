//! Tests for API token and webhook secret types.

use super::*;

/// Verify the webhook secret is the SHA-256 digest of the token.
#[test]
fn test_webhook_secret_is_sha256_of_token() {
    let token = ApiToken::new("42:QWERTY");

    let secret = token.webhook_secret();

    let expected = Sha256::digest(b"42:QWERTY");
    assert_eq!(secret.as_bytes(), expected.as_slice());
    assert_eq!(secret.as_bytes().len(), 32);
}

/// Verify secrets have a fixed length regardless of token length.
#[test]
fn test_webhook_secret_fixed_length() {
    let short = ApiToken::new("a").webhook_secret();
    let long = ApiToken::new("x".repeat(4096)).webhook_secret();

    assert_eq!(short.as_bytes().len(), 32);
    assert_eq!(long.as_bytes().len(), 32);
    assert_ne!(short.as_bytes(), long.as_bytes());
}

/// Verify Debug output never leaks the token.
#[test]
fn test_api_token_debug_redacts_value() {
    let token = ApiToken::new("42:super-sensitive");

    let debug_str = format!("{:?}", token);

    assert!(
        !debug_str.contains("super-sensitive"),
        "debug output must not leak token: {debug_str}"
    );
    assert!(debug_str.contains("REDACTED"));
}

/// Verify Debug output never leaks the derived secret.
#[test]
fn test_webhook_secret_debug_redacts_value() {
    let secret = ApiToken::new("42:QWERTY").webhook_secret();
    let hex_secret = hex::encode(secret.as_bytes());

    let debug_str = format!("{:?}", secret);

    assert!(!debug_str.contains(&hex_secret));
    assert!(debug_str.contains("REDACTED"));
}

#[test]
fn test_blank_token_detection() {
    assert!(ApiToken::new("").is_blank());
    assert!(ApiToken::new("   ").is_blank());
    assert!(!ApiToken::new("42:QWERTY").is_blank());
}

#[test]
fn test_token_conversions() {
    let from_str: ApiToken = "42:A".into();
    let from_string: ApiToken = String::from("42:B").into();

    assert_eq!(from_str.expose(), "42:A");
    assert_eq!(from_string.expose(), "42:B");
}
