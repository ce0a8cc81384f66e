//! Common test utilities for crypto-pay-sdk integration tests
//!
//! This module provides:
//! - A recording update handler
//! - Builders for signed and unsigned webhook requests
//! - Client fixtures wired to a webhook configuration

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request};
use crypto_pay_sdk::webhook::{sign, SIGNATURE_HEADER};
use crypto_pay_sdk::{
    CryptoPay, CryptoPayOptions, EventRecord, HandlerError, UpdateHandler, WebhookConfig,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

pub const TOKEN: &str = "11234:AAHkQhSZx2o7uOdmmGvRJzLnwWAcEqOG1hk";
pub const WEBHOOK_PATH: &str = "/crypto-pay/updates";

// ============================================================================
// Recording Handler
// ============================================================================

/// Handler appending `(label, record)` to a shared log.
#[derive(Clone)]
#[allow(dead_code)]
pub struct RecordingHandler {
    label: &'static str,
    log: Arc<Mutex<Vec<(&'static str, EventRecord)>>>,
    fail: bool,
}

#[allow(dead_code)]
impl RecordingHandler {
    pub fn new(label: &'static str, log: &Arc<Mutex<Vec<(&'static str, EventRecord)>>>) -> Self {
        Self {
            label,
            log: Arc::clone(log),
            fail: false,
        }
    }

    /// Record the call, then report a failure.
    pub fn failing(label: &'static str, log: &Arc<Mutex<Vec<(&'static str, EventRecord)>>>) -> Self {
        Self {
            fail: true,
            ..Self::new(label, log)
        }
    }
}

#[async_trait]
impl UpdateHandler for RecordingHandler {
    async fn handle(&self, record: &EventRecord) -> Result<(), HandlerError> {
        self.log.lock().unwrap().push((self.label, record.clone()));
        if self.fail {
            return Err(format!("{} failed", self.label).into());
        }
        Ok(())
    }
}

#[allow(dead_code)]
pub fn new_log() -> Arc<Mutex<Vec<(&'static str, EventRecord)>>> {
    Arc::new(Mutex::new(Vec::new()))
}

#[allow(dead_code)]
pub fn labels(log: &Arc<Mutex<Vec<(&'static str, EventRecord)>>>) -> Vec<&'static str> {
    log.lock().unwrap().iter().map(|(label, _)| *label).collect()
}

// ============================================================================
// Fixtures
// ============================================================================

#[allow(dead_code)]
pub fn webhook_config() -> WebhookConfig {
    WebhookConfig::new("127.0.0.1", WEBHOOK_PATH).with_port(0)
}

#[allow(dead_code)]
pub fn client(config: WebhookConfig) -> CryptoPay {
    CryptoPay::new(TOKEN, CryptoPayOptions::default().with_webhook(config))
        .expect("test configuration should be valid")
}

/// Body of an `invoice_paid` update as the platform sends it.
#[allow(dead_code)]
pub fn invoice_paid_body(update_id: u64) -> Vec<u8> {
    let value: Value = json!({
        "update_id": update_id,
        "update_type": "invoice_paid",
        "request_date": "2024-05-01T10:00:00.000Z",
        "payload": {
            "invoice_id": 528890,
            "status": "paid",
            "asset": "TON",
            "amount": "1.5",
            "paid_at": "2024-05-01T09:59:58.000Z"
        }
    });
    serde_json::to_vec(&value).unwrap()
}

/// Signed `POST` request for the router.
#[allow(dead_code)]
pub fn signed_post(path: &str, body: Vec<u8>) -> Request<Body> {
    let signature = sign(&body, TOKEN);
    Request::builder()
        .method(Method::POST)
        .uri(path)
        .header("content-type", "application/json")
        .header(SIGNATURE_HEADER, signature)
        .body(Body::from(body))
        .unwrap()
}

/// `POST` request without a signature header.
#[allow(dead_code)]
pub fn unsigned_post(path: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(path)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}
