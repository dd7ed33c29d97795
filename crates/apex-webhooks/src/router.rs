//! Axum router setup for the webhook and DLQ admin endpoints.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::downstream::{Downstream, EventHandler, NoopDownstream, NoopHandler};
use crate::handlers::{broker, dlq};
use crate::services::{DlqService, IngestService};
use crate::store::{DlqStore, IdempotencyStore, InMemoryDlqStore, InMemoryIdempotencyStore};

/// Shared state for the webhook handlers.
#[derive(Clone)]
pub struct OpsState {
    pub ingest_service: Arc<IngestService>,
    pub dlq_service: Arc<DlqService>,
}

impl OpsState {
    /// Assemble state from injected stores and collaborator seams.
    pub fn new(
        broker_secret: &str,
        two_eyes_token: &str,
        idempotency: Arc<dyn IdempotencyStore>,
        dlq: Arc<dyn DlqStore>,
        handler: Arc<dyn EventHandler>,
        downstream: Arc<dyn Downstream>,
    ) -> Self {
        Self {
            ingest_service: Arc::new(IngestService::new(
                broker_secret,
                idempotency.clone(),
                dlq.clone(),
                handler,
            )),
            dlq_service: Arc::new(DlqService::new(
                broker_secret,
                two_eyes_token,
                dlq,
                idempotency,
                downstream,
            )),
        }
    }

    /// State backed by the default in-memory stores and no-op seams.
    pub fn in_memory(broker_secret: &str, two_eyes_token: &str) -> Self {
        Self::new(
            broker_secret,
            two_eyes_token,
            Arc::new(InMemoryIdempotencyStore::default()),
            Arc::new(InMemoryDlqStore::default()),
            Arc::new(NoopHandler),
            Arc::new(NoopDownstream),
        )
    }
}

/// Creates the ops router with all webhook and DLQ routes.
pub fn ops_router(state: OpsState) -> Router {
    Router::new()
        .route("/webhooks/broker", post(broker::broker_webhook_handler))
        .route("/admin/dlq", get(dlq::list_dlq_handler))
        .route("/admin/dlq/delete", post(dlq::delete_dlq_handler))
        .route("/admin/dlq/replay", post(dlq::replay_dlq_handler))
        .with_state(state)
}
