//! HTTP handler for inbound broker webhooks.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::ApiResult;
use crate::router::OpsState;
use crate::services::ingest_service::IngestOutcome;

/// Header carrying the hex HMAC-SHA256 of the raw body.
pub const SIGNATURE_HEADER: &str = "x-signature";

/// Header carrying the sender's epoch-millisecond timestamp.
pub const TIMESTAMP_HEADER: &str = "x-timestamp";

/// Acknowledgement for an ingested event.
#[derive(Debug, Serialize, ToSchema)]
pub struct IngestResponse {
    pub ok: bool,
    /// Set when an identical delivery was already processed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached: Option<bool>,
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Ingest a broker event.
#[utoipa::path(
    post,
    path = "/webhooks/broker",
    tag = "Webhooks",
    request_body = String,
    params(
        ("x-signature" = String, Header, description = "Hex HMAC-SHA256 of the raw body"),
        ("x-timestamp" = String, Header, description = "Sender timestamp, epoch milliseconds"),
    ),
    responses(
        (status = 200, description = "Event accepted (cached=true on duplicate)", body = IngestResponse),
        (status = 400, description = "Body is not a JSON event"),
        (status = 401, description = "Stale timestamp or bad signature"),
        (status = 500, description = "Processing failure; event parked in DLQ"),
    )
)]
pub async fn broker_webhook_handler(
    State(state): State<OpsState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<IngestResponse>> {
    let outcome = state
        .ingest_service
        .ingest(
            header(&headers, SIGNATURE_HEADER),
            header(&headers, TIMESTAMP_HEADER),
            &body,
        )
        .await?;

    let response = match outcome {
        IngestOutcome::Accepted => IngestResponse {
            ok: true,
            cached: None,
        },
        IngestOutcome::Duplicate => IngestResponse {
            ok: true,
            cached: Some(true),
        },
    };

    Ok(Json(response))
}
