//! End-to-end tests against a real bound webhook server.
//!
//! Each test binds `127.0.0.1:0`, serves in a background task and talks to
//! the server over HTTP with reqwest.

mod common;

use common::*;
use crypto_pay_sdk::webhook::{sign, BoundWebhookServer, SIGNATURE_HEADER};
use crypto_pay_sdk::{CryptoPay, ServerError, WebhookConfig, WebhookServer};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

struct RunningServer {
    addr: SocketAddr,
    stop: oneshot::Sender<()>,
    task: JoinHandle<Result<(), ServerError>>,
}

impl RunningServer {
    fn url(&self) -> String {
        format!("http://{}{}", self.addr, WEBHOOK_PATH)
    }

    async fn stop(self) {
        let _ = self.stop.send(());
        let result = tokio::time::timeout(Duration::from_secs(5), self.task)
            .await
            .expect("server should stop within the timeout")
            .expect("server task should not panic");
        assert!(result.is_ok(), "server returned error: {:?}", result);
    }
}

async fn start(crypto_pay: &CryptoPay) -> RunningServer {
    let config = crypto_pay.webhook_config().unwrap();
    let receiver = crypto_pay.webhook_receiver().unwrap();
    let bound: BoundWebhookServer = WebhookServer::bind(config, receiver).await.unwrap();
    let addr = bound.local_addr();

    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(bound.serve(async {
        let _ = stopped.await;
    }));

    RunningServer { addr, stop, task }
}

fn e2e_config() -> WebhookConfig {
    webhook_config().with_shutdown_timeout(Duration::from_secs(2))
}

// ============================================================================
// Round Trips
// ============================================================================

#[tokio::test]
async fn test_signed_update_over_http() {
    // Arrange
    let crypto_pay = client(e2e_config());
    let log = new_log();
    crypto_pay
        .invoice_paid(RecordingHandler::new("paid", &log))
        .await;
    let server = start(&crypto_pay).await;
    let body = invoice_paid_body(100);

    // Act
    let response = reqwest::Client::new()
        .post(server.url())
        .header("Crypto-Pay-Api-Signature", sign(&body, TOKEN))
        .header("content-type", "application/json")
        .body(body)
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(labels(&log), vec!["paid"]);

    server.stop().await;
}

#[tokio::test]
async fn test_bad_signature_over_http() {
    let crypto_pay = client(e2e_config());
    let log = new_log();
    crypto_pay
        .invoice_paid(RecordingHandler::new("paid", &log))
        .await;
    let server = start(&crypto_pay).await;
    let body = invoice_paid_body(101);

    let response = reqwest::Client::new()
        .post(server.url())
        .header(SIGNATURE_HEADER, sign(&body, "1:SomeOtherToken"))
        .body(body)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
    let json: serde_json::Value = response.json().await.unwrap();
    assert_eq!(json["error"], "Wrong signature");
    assert!(labels(&log).is_empty());

    server.stop().await;
}

#[tokio::test]
async fn test_other_path_over_http_is_bad_request() {
    let crypto_pay = client(e2e_config());
    let server = start(&crypto_pay).await;

    let response = reqwest::Client::new()
        .get(format!("http://{}/", server.addr))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);

    server.stop().await;
}

#[tokio::test]
async fn test_oversized_body_over_http() {
    let crypto_pay = client(e2e_config().with_max_body_size(64));
    let server = start(&crypto_pay).await;
    let body = invoice_paid_body(102);
    assert!(body.len() > 64);

    let response = reqwest::Client::new()
        .post(server.url())
        .header(SIGNATURE_HEADER, sign(&body, TOKEN))
        .body(body)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 413);

    server.stop().await;
}

/// Verify concurrent deliveries are each verified and dispatched.
#[tokio::test]
async fn test_concurrent_deliveries() {
    let crypto_pay = client(e2e_config());
    let log = new_log();
    crypto_pay
        .invoice_paid(RecordingHandler::new("paid", &log))
        .await;
    let server = start(&crypto_pay).await;
    let http = reqwest::Client::new();

    let mut requests = Vec::new();
    for update_id in 0..10 {
        let body = invoice_paid_body(200 + update_id);
        let request = http
            .post(server.url())
            .header(SIGNATURE_HEADER, sign(&body, TOKEN))
            .body(body)
            .send();
        requests.push(tokio::spawn(request));
    }

    for request in requests {
        let response = request.await.unwrap().unwrap();
        assert_eq!(response.status().as_u16(), 200);
    }
    assert_eq!(labels(&log).len(), 10);

    server.stop().await;
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_shutdown_stops_accepting_connections() {
    let crypto_pay = client(e2e_config());
    let server = start(&crypto_pay).await;
    let addr = server.addr;

    server.stop().await;

    let result = reqwest::Client::new()
        .post(format!("http://{}{}", addr, WEBHOOK_PATH))
        .timeout(Duration::from_secs(2))
        .body("{}")
        .send()
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_listen_returns_when_shutdown_completes() {
    let crypto_pay = client(e2e_config());

    let result = tokio::time::timeout(Duration::from_secs(5), crypto_pay.listen(async {})).await;

    assert!(matches!(result, Ok(Ok(()))));
}

#[tokio::test]
async fn test_bind_conflict_is_reported() {
    let crypto_pay = client(e2e_config());
    let first = start(&crypto_pay).await;
    let taken = WebhookConfig::new("127.0.0.1", WEBHOOK_PATH).with_port(first.addr.port());
    let second = client(taken);

    let result = WebhookServer::bind(
        second.webhook_config().unwrap(),
        second.webhook_receiver().unwrap(),
    )
    .await;

    assert!(matches!(result, Err(ServerError::Bind { .. })));

    first.stop().await;
}
