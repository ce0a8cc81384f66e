//! Tests for the crypto-pay-service library module.

use super::*;
use crypto_pay_sdk::WebhookConfig;
use std::time::Duration;

fn service_config(recognized: &[&str]) -> ServiceConfig {
    ServiceConfig {
        webhook: WebhookConfig::new("127.0.0.1", "/updates")
            .with_port(0)
            .with_shutdown_timeout(Duration::from_secs(1)),
        recognized_update_types: recognized.iter().map(|t| t.to_string()).collect(),
        logging: LoggingConfig::default(),
    }
}

#[test]
fn test_config_errors_exit_with_config_code() {
    let invalid = ServiceError::Config(crypto_pay_sdk::ConfigError::Missing {
        key: "webhook.path".to_string(),
    });
    let bind_config = ServiceError::Server(ServerError::Config(
        crypto_pay_sdk::ConfigError::Tls {
            message: "no certificates".to_string(),
        },
    ));

    assert_eq!(invalid.exit_code(), EXIT_CONFIG);
    assert_eq!(bind_config.exit_code(), EXIT_CONFIG);
}

#[test]
fn test_runtime_errors_exit_with_runtime_code() {
    let error = ServiceError::Server(ServerError::Bind {
        address: "127.0.0.1:80".to_string(),
        message: "permission denied".to_string(),
    });

    assert_eq!(error.exit_code(), EXIT_RUNTIME);
}

#[tokio::test]
async fn test_build_client_subscribes_each_recognized_type() {
    let config = service_config(&["invoice_paid", "invoice_expired"]);

    let crypto_pay = build_client(&config, "42:QWERTY").await.unwrap();

    assert_eq!(crypto_pay.registry().handler_count("invoice_paid").await, 1);
    assert_eq!(crypto_pay.registry().handler_count("invoice_expired").await, 1);
    assert_eq!(crypto_pay.registry().handler_count("check_activated").await, 0);
}

#[tokio::test]
async fn test_build_client_rejects_blank_token() {
    let config = service_config(&["invoice_paid"]);

    let result = build_client(&config, "").await;

    assert!(matches!(result, Err(ServiceError::Config(_))));
}

#[tokio::test]
async fn test_run_returns_after_shutdown() {
    let config = service_config(&["invoice_paid"]);

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        run(config, "42:QWERTY", async {}),
    )
    .await;

    assert!(matches!(result, Ok(Ok(()))));
}

#[test]
fn test_cli_defaults_to_serve() {
    let cli = <Cli as clap::Parser>::parse_from(["crypto-pay-webhook", "--token", "42:QWERTY"]);

    assert_eq!(cli.command(), Commands::Serve);
    assert_eq!(cli.token.as_deref(), Some("42:QWERTY"));
    assert!(!cli.json_logs);
}

#[test]
fn test_cli_check_config() {
    let cli = <Cli as clap::Parser>::parse_from([
        "crypto-pay-webhook",
        "--config",
        "webhook.yaml",
        "check-config",
        "--show",
    ]);

    assert_eq!(cli.command(), Commands::CheckConfig { show: true });
    assert_eq!(
        cli.config.as_deref(),
        Some(std::path::Path::new("webhook.yaml"))
    );
}
