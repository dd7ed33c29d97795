//! HTTP handlers for the dead letter queue admin API.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{ApiResult, WebhookError};
use crate::router::OpsState;
use crate::services::dlq_service::{DeleteResponse, DlqListResponse, ReplayResponse};
use crate::two_eyes::{IDEMPOTENCY_KEY_HEADER, TWO_EYES_HEADER};

/// Request body naming the entry a mutation targets.
#[derive(Debug, Deserialize)]
struct EntryRef {
    id: Uuid,
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Parsed by hand so a malformed body maps to the fixed `bad_json` code
/// instead of the extractor's default rejection.
fn parse_entry_ref(body: &[u8]) -> Result<Uuid, WebhookError> {
    let entry: EntryRef = serde_json::from_slice(body).map_err(|_| WebhookError::BadJson)?;
    Ok(entry.id)
}

/// List dead letter queue entries.
#[utoipa::path(
    get,
    path = "/admin/dlq",
    tag = "Dead Letter Queue",
    responses(
        (status = 200, description = "Most-recent bounded view of the queue", body = DlqListResponse),
    )
)]
pub async fn list_dlq_handler(State(state): State<OpsState>) -> Json<DlqListResponse> {
    Json(state.dlq_service.list().await)
}

/// Delete a DLQ entry (two-eyes approval required).
#[utoipa::path(
    post,
    path = "/admin/dlq/delete",
    tag = "Dead Letter Queue",
    params(
        ("x-two-eyes" = String, Header, description = "Dual-control approval token"),
    ),
    responses(
        (status = 200, description = "Entry deleted", body = DeleteResponse),
        (status = 400, description = "Malformed request body"),
        (status = 401, description = "Missing or invalid two-eyes approval"),
        (status = 404, description = "Entry not found"),
    )
)]
pub async fn delete_dlq_handler(
    State(state): State<OpsState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<DeleteResponse>> {
    // Approval is checked before the body so an unauthorized caller always
    // sees 401, whatever they sent.
    let two_eyes = header(&headers, TWO_EYES_HEADER);
    state.dlq_service.authorize(two_eyes)?;
    let id = parse_entry_ref(&body)?;

    let response = state.dlq_service.delete(two_eyes, id).await?;
    Ok(Json(response))
}

/// Replay a DLQ entry (two-eyes approval and idempotency key required).
#[utoipa::path(
    post,
    path = "/admin/dlq/replay",
    tag = "Dead Letter Queue",
    params(
        ("x-two-eyes" = String, Header, description = "Dual-control approval token"),
        ("x-idempotency-key" = String, Header, description = "Distinct key per replay intent"),
    ),
    responses(
        (status = 200, description = "Entry re-delivered (dedup=true on reused key)", body = ReplayResponse),
        (status = 400, description = "Malformed body or idempotency key"),
        (status = 401, description = "Missing or invalid two-eyes approval"),
        (status = 404, description = "Entry not found"),
        (status = 502, description = "Downstream delivery failed; entry retained"),
    )
)]
pub async fn replay_dlq_handler(
    State(state): State<OpsState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<ReplayResponse>> {
    let two_eyes = header(&headers, TWO_EYES_HEADER);
    state.dlq_service.authorize(two_eyes)?;
    let idem = header(&headers, IDEMPOTENCY_KEY_HEADER);
    let id = parse_entry_ref(&body)?;

    let response = state.dlq_service.replay(two_eyes, idem, id).await?;
    Ok(Json(response))
}
