//! Dead letter queue administration: list, delete, replay.
//!
//! Delete and replay are destructive and require two-eyes approval. Replay
//! additionally requires a caller-supplied idempotency key so a retried
//! admin request cannot re-deliver twice. No operation partially mutates
//! state: a failed delivery leaves the entry in the queue (with its attempt
//! counter bumped) and the idempotency key unmarked.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::crypto;
use crate::downstream::Downstream;
use crate::error::WebhookError;
use crate::models::DlqEntry;
use crate::store::{DlqStore, IdempotencyStore};
use crate::two_eyes;

/// Maximum entries returned by a list call.
const LIST_LIMIT: usize = 100;

/// Bounded most-recent view of the queue.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DlqListResponse {
    pub items: Vec<DlqEntry>,
    pub count: usize,
    pub ts: DateTime<Utc>,
}

/// Result of a delete operation.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeleteResponse {
    pub ok: bool,
    pub deleted: Uuid,
    pub ts: DateTime<Utc>,
}

/// Result of a replay operation.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReplayResponse {
    pub ok: bool,
    /// Set when a reused idempotency key short-circuited the replay.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dedup: Option<bool>,
    /// Id of the entry that was re-delivered and removed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replayed: Option<Uuid>,
    /// Hex HMAC-SHA256 the payload was re-signed with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hmac: Option<String>,
    pub ts: DateTime<Utc>,
}

/// Service for managing dead letter queue entries.
pub struct DlqService {
    secret: String,
    two_eyes_token: String,
    dlq: Arc<dyn DlqStore>,
    idempotency: Arc<dyn IdempotencyStore>,
    downstream: Arc<dyn Downstream>,
}

impl DlqService {
    pub fn new(
        secret: impl Into<String>,
        two_eyes_token: impl Into<String>,
        dlq: Arc<dyn DlqStore>,
        idempotency: Arc<dyn IdempotencyStore>,
        downstream: Arc<dyn Downstream>,
    ) -> Self {
        Self {
            secret: secret.into(),
            two_eyes_token: two_eyes_token.into(),
            dlq,
            idempotency,
            downstream,
        }
    }

    /// Authorize a destructive operation. Fails closed without a matching
    /// two-eyes token.
    pub fn authorize(&self, presented: Option<&str>) -> Result<(), WebhookError> {
        if !two_eyes::check_two_eyes(presented, &self.two_eyes_token) {
            return Err(WebhookError::TwoEyesRequired);
        }
        Ok(())
    }

    /// Most-recent bounded view of the queue.
    pub async fn list(&self) -> DlqListResponse {
        let items = self.dlq.list(LIST_LIMIT).await;
        DlqListResponse {
            count: items.len(),
            items,
            ts: Utc::now(),
        }
    }

    /// Remove an entry. Requires two-eyes approval.
    pub async fn delete(
        &self,
        two_eyes_header: Option<&str>,
        id: Uuid,
    ) -> Result<DeleteResponse, WebhookError> {
        self.authorize(two_eyes_header)?;

        let removed = self.dlq.remove(id).await.ok_or(WebhookError::NotFound)?;

        tracing::info!(
            target: "dlq",
            dlq_id = %removed.id,
            kind = %removed.kind,
            "DLQ entry deleted"
        );

        Ok(DeleteResponse {
            ok: true,
            deleted: removed.id,
            ts: Utc::now(),
        })
    }

    /// Re-sign and re-deliver an entry, removing it on confirmed success.
    ///
    /// Requires two-eyes approval and a distinct idempotency key. The key is
    /// marked only after the downstream confirms delivery; a failed delivery
    /// keeps the entry (attempts incremented) and leaves the key unmarked so
    /// the same key can drive a retry.
    pub async fn replay(
        &self,
        two_eyes_header: Option<&str>,
        idempotency_header: Option<&str>,
        id: Uuid,
    ) -> Result<ReplayResponse, WebhookError> {
        self.authorize(two_eyes_header)?;

        let key = two_eyes::validate_idempotency_key(idempotency_header)
            .ok_or(WebhookError::InvalidIdempotencyKey)?;
        let key = format!("replay:{key}");

        if self.idempotency.seen(&key).await {
            return Ok(ReplayResponse {
                ok: true,
                dedup: Some(true),
                replayed: None,
                hmac: None,
                ts: Utc::now(),
            });
        }

        let entry = self.dlq.get(id).await.ok_or(WebhookError::NotFound)?;

        let payload = serde_json::to_vec(&entry.payload)
            .map_err(|e| WebhookError::Internal(format!("payload serialization: {e}")))?;
        let signature = crypto::compute_signature(&self.secret, &payload);

        if let Err(e) = self.downstream.deliver(&entry, &signature).await {
            self.dlq.record_attempt(id).await;
            tracing::warn!(
                target: "dlq",
                dlq_id = %id,
                error = %e,
                "Replay delivery failed, entry retained"
            );
            return Err(WebhookError::DeliveryFailed(e.to_string()));
        }

        self.dlq.remove(id).await;
        self.idempotency.mark(&key).await;

        tracing::info!(
            target: "dlq",
            dlq_id = %id,
            kind = %entry.kind,
            "DLQ entry replayed and removed"
        );

        Ok(ReplayResponse {
            ok: true,
            dedup: None,
            replayed: Some(id),
            hmac: Some(signature),
            ts: Utc::now(),
        })
    }
}
