//! External collaborator seams: business event handling and re-delivery.
//!
//! The original pipeline stubbed both boundaries; here they are traits the
//! orchestration layer calls through, with a no-op implementation for
//! wiring without a downstream and an HTTP implementation for real
//! re-delivery.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::models::{DlqEntry, InboundEvent};

/// Error from the business-logic boundary.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

/// Error from the re-delivery boundary.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct DownstreamError(pub String);

/// Business logic invoked for each accepted broker event.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &InboundEvent) -> Result<(), HandlerError>;
}

/// Re-delivery target for DLQ replays.
#[async_trait]
pub trait Downstream: Send + Sync {
    /// Deliver a replayed entry, authenticated with the given HMAC signature.
    async fn deliver(&self, entry: &DlqEntry, signature_hex: &str) -> Result<(), DownstreamError>;
}

/// Event handler that accepts everything without side effects.
pub struct NoopHandler;

#[async_trait]
impl EventHandler for NoopHandler {
    async fn handle(&self, _event: &InboundEvent) -> Result<(), HandlerError> {
        Ok(())
    }
}

/// Downstream that confirms every delivery without sending anything.
pub struct NoopDownstream;

#[async_trait]
impl Downstream for NoopDownstream {
    async fn deliver(&self, _entry: &DlqEntry, _signature_hex: &str) -> Result<(), DownstreamError> {
        Ok(())
    }
}

/// HTTP re-delivery: POSTs the entry payload with signature headers.
pub struct HttpDownstream {
    client: reqwest::Client,
    url: String,
}

impl HttpDownstream {
    pub fn new(url: impl Into<String>) -> Result<Self, DownstreamError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| DownstreamError(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Downstream for HttpDownstream {
    async fn deliver(&self, entry: &DlqEntry, signature_hex: &str) -> Result<(), DownstreamError> {
        let response = self
            .client
            .post(&self.url)
            .header("content-type", "application/json")
            .header("x-signature", signature_hex)
            .header("x-timestamp", Utc::now().timestamp_millis().to_string())
            .json(&entry.payload)
            .send()
            .await
            .map_err(|e| DownstreamError(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(DownstreamError(format!(
                "downstream returned HTTP {}",
                response.status().as_u16()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_handler_accepts() {
        let evt = InboundEvent::parse(br#"{"id":"e1","type":"trade.closed"}"#).unwrap();
        assert!(NoopHandler.handle(&evt).await.is_ok());
    }

    #[tokio::test]
    async fn test_noop_downstream_confirms() {
        let entry = DlqEntry::new("trade.closed", "broker", serde_json::json!({}));
        assert!(NoopDownstream.deliver(&entry, "00").await.is_ok());
    }
}
