//! Liveness endpoint.

use std::time::Instant;

use axum::extract::State;
use axum::Json;

/// Process start time, for the uptime field.
#[derive(Clone, Copy)]
pub struct StartedAt(pub Instant);

/// Basic liveness probe.
pub async fn health_handler(State(started): State<StartedAt>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": started.0.elapsed().as_secs(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
