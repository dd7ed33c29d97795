//! Apex ops service.
//!
//! Terminates HMAC-signed broker webhooks and exposes the DLQ admin surface
//! with two-eyes dual control. Built with Axum.

mod config;
mod health;
mod logging;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{routing::get, Router};
use tokio::signal;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use apex_webhooks::store::{InMemoryDlqStore, InMemoryIdempotencyStore};
use apex_webhooks::{
    ops_router, Downstream, HttpDownstream, NoopDownstream, NoopHandler, OpsState,
};
use config::Config;
use health::{health_handler, StartedAt};

#[tokio::main]
async fn main() {
    // Load configuration (fail-fast on missing required values)
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    logging::init_logging(&config.rust_log);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.host,
        port = config.port,
        env = %config.app_env,
        "Starting apex ops API"
    );

    let downstream: Arc<dyn Downstream> = match &config.downstream_url {
        Some(url) => match HttpDownstream::new(url.clone()) {
            Ok(d) => {
                info!(url = %url, "Replay downstream configured");
                Arc::new(d)
            }
            Err(e) => {
                eprintln!("FATAL: {e}");
                std::process::exit(1);
            }
        },
        None => {
            tracing::warn!("No DOWNSTREAM_URL configured, replays are confirmed without delivery");
            Arc::new(NoopDownstream)
        }
    };

    let state = OpsState::new(
        &config.broker_hmac_secret,
        &config.two_eyes_token,
        Arc::new(InMemoryIdempotencyStore::new(config.idempotency_ttl)),
        Arc::new(InMemoryDlqStore::new(config.dlq_capacity)),
        Arc::new(NoopHandler),
        downstream,
    );

    let app = Router::new()
        .route("/health", get(health_handler))
        .with_state(StartedAt(Instant::now()))
        .merge(ops_router(state))
        .layer(build_cors_layer(&config.cors_origins))
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("FATAL: invalid listen address: {e}");
            std::process::exit(1);
        }
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("FATAL: failed to bind {addr}: {e}");
            std::process::exit(1);
        }
    };

    info!(%addr, "Listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        eprintln!("Server error: {e}");
        std::process::exit(1);
    }
}

async fn shutdown_signal() {
    if signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}

/// CORS for the admin surface. An empty origin list allows no cross-origin
/// callers; a lone `*` (development only) allows any.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    use axum::http::header::CONTENT_TYPE;
    use axum::http::{HeaderName, Method};

    if origins.len() == 1 && origins[0] == "*" {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let allowed: Vec<axum::http::HeaderValue> =
        origins.iter().filter_map(|o| o.parse().ok()).collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            CONTENT_TYPE,
            HeaderName::from_static("x-two-eyes"),
            HeaderName::from_static("x-idempotency-key"),
            HeaderName::from_static("x-signature"),
            HeaderName::from_static("x-timestamp"),
        ])
}
