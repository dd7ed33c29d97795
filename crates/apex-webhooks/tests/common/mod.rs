//! Common test utilities for apex-webhooks integration tests.
//!
//! Builds routers over the in-memory stores and provides request builders
//! with valid signatures, so tests exercise the full HTTP surface without
//! external services.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{Request, Response};
use chrono::Utc;
use serde_json::Value;

use apex_webhooks::downstream::{Downstream, DownstreamError, EventHandler, HandlerError};
use apex_webhooks::models::{DlqEntry, InboundEvent};
use apex_webhooks::store::{InMemoryDlqStore, InMemoryIdempotencyStore};
use apex_webhooks::{ops_router, OpsState};

/// Standard test secrets.
pub const BROKER_SECRET: &str = "whsec_test_secret_key_12345";
pub const TWO_EYES_TOKEN: &str = "second-operator-approval";

/// Handler that fails every event, for populating the DLQ.
pub struct FailingHandler;

#[async_trait]
impl EventHandler for FailingHandler {
    async fn handle(&self, _event: &InboundEvent) -> Result<(), HandlerError> {
        Err(HandlerError("simulated ledger failure".into()))
    }
}

/// Downstream pointed at a wiremock server.
pub struct MockDownstream {
    client: reqwest::Client,
    url: String,
}

impl MockDownstream {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Downstream for MockDownstream {
    async fn deliver(&self, entry: &DlqEntry, signature_hex: &str) -> Result<(), DownstreamError> {
        let response = self
            .client
            .post(&self.url)
            .header("x-signature", signature_hex)
            .header("x-timestamp", Utc::now().timestamp_millis().to_string())
            .json(&entry.payload)
            .send()
            .await
            .map_err(|e| DownstreamError(e.to_string()))?;
        if !response.status().is_success() {
            return Err(DownstreamError(format!("HTTP {}", response.status())));
        }
        Ok(())
    }
}

/// Test fixture bundling the router with handles to its stores.
pub struct TestApp {
    pub state: OpsState,
    pub dlq: Arc<InMemoryDlqStore>,
    pub idempotency: Arc<InMemoryIdempotencyStore>,
}

impl TestApp {
    /// App with the no-op handler (every event succeeds).
    pub fn new() -> Self {
        Self::with_seams(
            Arc::new(apex_webhooks::NoopHandler),
            Arc::new(apex_webhooks::NoopDownstream),
        )
    }

    /// App whose handler fails every event.
    pub fn failing() -> Self {
        Self::with_seams(
            Arc::new(FailingHandler),
            Arc::new(apex_webhooks::NoopDownstream),
        )
    }

    pub fn with_seams(
        handler: Arc<dyn EventHandler>,
        downstream: Arc<dyn Downstream>,
    ) -> Self {
        let dlq = Arc::new(InMemoryDlqStore::default());
        let idempotency = Arc::new(InMemoryIdempotencyStore::default());
        let state = OpsState::new(
            BROKER_SECRET,
            TWO_EYES_TOKEN,
            idempotency.clone(),
            dlq.clone(),
            handler,
            downstream,
        );
        Self {
            state,
            dlq,
            idempotency,
        }
    }

    pub fn router(&self) -> axum::Router {
        ops_router(self.state.clone())
    }

    /// Park a failed event directly in the DLQ, returning its id.
    pub async fn seed_dlq_entry(&self) -> uuid::Uuid {
        use apex_webhooks::store::DlqStore;
        let entry = DlqEntry::new(
            "trade.closed",
            "broker",
            serde_json::json!({"id": "e1", "type": "trade.closed", "volume": 3}),
        );
        let id = entry.id;
        self.dlq.append(entry).await;
        id
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute the signature the broker endpoint expects.
pub fn sign(secret: &str, body: &[u8]) -> String {
    apex_webhooks::crypto::compute_signature(secret, body)
}

/// Build a broker webhook request with a valid signature and fresh timestamp.
pub fn signed_webhook(body: &str) -> Request<Body> {
    signed_webhook_at(body, Utc::now().timestamp_millis())
}

/// Build a broker webhook request with an explicit timestamp.
pub fn signed_webhook_at(body: &str, ts_ms: i64) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhooks/broker")
        .header("content-type", "application/json")
        .header("x-signature", sign(BROKER_SECRET, body.as_bytes()))
        .header("x-timestamp", ts_ms.to_string())
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Read a JSON response body.
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes: Bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
