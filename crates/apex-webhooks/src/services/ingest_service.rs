//! Broker webhook ingestion pipeline.
//!
//! Order of checks: freshness, signature, JSON shape, idempotency, business
//! handler. The idempotency key is marked only after the handler confirms
//! success, so a crash mid-processing re-runs the event instead of dropping
//! it. Handler failures park the event in the DLQ.

use std::sync::Arc;

use chrono::Utc;

use crate::crypto;
use crate::downstream::EventHandler;
use crate::error::WebhookError;
use crate::freshness;
use crate::models::{DlqEntry, InboundEvent, BROKER_SOURCE};
use crate::store::{DlqStore, IdempotencyStore};

/// Result of an accepted ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Event processed for the first time.
    Accepted,
    /// Event already processed; no side effects were run.
    Duplicate,
}

/// Service validating and dispatching inbound broker events.
pub struct IngestService {
    secret: String,
    idempotency: Arc<dyn IdempotencyStore>,
    dlq: Arc<dyn DlqStore>,
    handler: Arc<dyn EventHandler>,
}

impl IngestService {
    pub fn new(
        secret: impl Into<String>,
        idempotency: Arc<dyn IdempotencyStore>,
        dlq: Arc<dyn DlqStore>,
        handler: Arc<dyn EventHandler>,
    ) -> Self {
        Self {
            secret: secret.into(),
            idempotency,
            dlq,
            handler,
        }
    }

    /// Run the full ingestion pipeline over a raw webhook request.
    pub async fn ingest(
        &self,
        signature: Option<&str>,
        timestamp: Option<&str>,
        raw: &[u8],
    ) -> Result<IngestOutcome, WebhookError> {
        let ts = freshness::parse_timestamp(timestamp);
        if !freshness::is_fresh(ts, Utc::now().timestamp_millis()) {
            return Err(WebhookError::StaleTimestamp);
        }

        if !crypto::verify_signature(signature.unwrap_or(""), raw, &self.secret) {
            return Err(WebhookError::BadSignature);
        }

        let event = InboundEvent::parse(raw).ok_or(WebhookError::BadJson)?;

        let key = event.idempotency_key();
        if self.idempotency.seen(&key).await {
            tracing::debug!(
                target: "ingest",
                event_id = %event.id,
                event_type = %event.event_type,
                "Duplicate delivery short-circuited"
            );
            return Ok(IngestOutcome::Duplicate);
        }

        if let Err(e) = self.handler.handle(&event).await {
            let entry = DlqEntry::new(
                event.event_type.clone(),
                BROKER_SOURCE,
                event.payload.clone(),
            );
            tracing::error!(
                target: "ingest",
                event_id = %event.id,
                event_type = %event.event_type,
                dlq_id = %entry.id,
                error = %e,
                "Event processing failed, parked in DLQ"
            );
            self.dlq.append(entry).await;
            return Err(WebhookError::Processing(e.to_string()));
        }

        self.idempotency.mark(&key).await;

        tracing::info!(
            target: "ingest",
            event_id = %event.id,
            event_type = %event.event_type,
            "Broker event processed"
        );

        Ok(IngestOutcome::Accepted)
    }
}
