//! Tests for service configuration loading.

use super::*;
use serial_test::serial;
use std::io::Write;
use tempfile::NamedTempFile;

fn yaml_file(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

const MINIMAL_YAML: &str = r#"
webhook:
  server_hostname: 127.0.0.1
  path: /crypto-pay/updates
"#;

// ============================================================================
// File Loading
// ============================================================================

#[test]
#[serial]
fn test_load_minimal_file_applies_defaults() {
    let file = yaml_file(MINIMAL_YAML);

    let config = load_config(Some(file.path())).unwrap();

    assert_eq!(config.webhook.server_hostname, "127.0.0.1");
    assert_eq!(config.webhook.path, "/crypto-pay/updates");
    assert_eq!(config.webhook.server_port, 80);
    assert!(config.webhook.update_verification);
    assert_eq!(config.recognized_update_types, vec!["invoice_paid".to_string()]);
    assert!(!config.logging.json_format);
    assert_eq!(config.logging.default_filter(), DEFAULT_LOG_FILTER);
}

#[test]
#[serial]
fn test_load_full_file() {
    let file = yaml_file(
        r#"
webhook:
  server_hostname: 0.0.0.0
  server_port: 8443
  path: /hooks/crypto-pay
  update_verification: false
  max_body_size: 4096
  tls:
    certificate_path: /etc/tls/cert.pem
    private_key_path: /etc/tls/key.pem
recognized_update_types:
  - invoice_paid
  - invoice_expired
logging:
  json_format: true
  filter: debug
"#,
    );

    let config = load_config(Some(file.path())).unwrap();

    assert_eq!(config.webhook.server_port, 8443);
    assert!(!config.webhook.update_verification);
    assert_eq!(config.webhook.max_body_size, 4096);
    assert!(config.webhook.tls.is_some());
    assert!(config.recognized().contains("invoice_expired"));
    assert!(config.logging.json_format);
    assert_eq!(config.logging.default_filter(), "debug");
}

#[test]
#[serial]
fn test_missing_explicit_file_is_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.yaml");

    let result = load_config(Some(&path));

    assert!(matches!(result, Err(ServiceError::Load(_))));
}

#[test]
#[serial]
fn test_missing_webhook_section_is_load_error() {
    let file = yaml_file("logging:\n  json_format: true\n");

    let result = load_config(Some(file.path()));

    assert!(matches!(result, Err(ServiceError::Load(_))));
}

#[test]
#[serial]
fn test_invalid_values_are_config_error() {
    let file = yaml_file(
        r#"
webhook:
  server_hostname: 127.0.0.1
  path: no-leading-slash
"#,
    );

    let result = load_config(Some(file.path()));

    assert!(matches!(
        result,
        Err(ServiceError::Config(crypto_pay_sdk::ConfigError::Invalid { .. }))
    ));
}

#[test]
#[serial]
fn test_blank_update_type_is_config_error() {
    let file = yaml_file(
        r#"
webhook:
  server_hostname: 127.0.0.1
  path: /updates
recognized_update_types: ["invoice_paid", " "]
"#,
    );

    let result = load_config(Some(file.path()));

    assert!(matches!(result, Err(ServiceError::Config(_))));
}

// ============================================================================
// Environment Overrides
// ============================================================================

#[test]
#[serial]
fn test_environment_overrides_file() {
    // Arrange
    let file = yaml_file(MINIMAL_YAML);
    std::env::set_var("CP__WEBHOOK__SERVER_PORT", "9443");
    std::env::set_var("CP__WEBHOOK__UPDATE_VERIFICATION", "false");

    // Act
    let result = load_config(Some(file.path()));

    // Cleanup before asserting so a failure does not leak state
    std::env::remove_var("CP__WEBHOOK__SERVER_PORT");
    std::env::remove_var("CP__WEBHOOK__UPDATE_VERIFICATION");

    // Assert
    let config = result.unwrap();
    assert_eq!(config.webhook.server_port, 9443);
    assert!(!config.webhook.update_verification);
}

#[test]
#[serial]
fn test_environment_only_configuration() {
    std::env::set_var("CP__WEBHOOK__SERVER_HOSTNAME", "localhost");
    std::env::set_var("CP__WEBHOOK__PATH", "/from-env");

    let result = load_config(None);

    std::env::remove_var("CP__WEBHOOK__SERVER_HOSTNAME");
    std::env::remove_var("CP__WEBHOOK__PATH");

    let config = result.unwrap();
    assert_eq!(config.webhook.server_hostname, "localhost");
    assert_eq!(config.webhook.path, "/from-env");
}

#[test]
#[serial]
fn test_malformed_environment_value_is_load_error() {
    let file = yaml_file(MINIMAL_YAML);
    std::env::set_var("CP__WEBHOOK__SERVER_PORT", "not-a-port");

    let result = load_config(Some(file.path()));

    std::env::remove_var("CP__WEBHOOK__SERVER_PORT");

    assert!(matches!(result, Err(ServiceError::Load(_))));
}
