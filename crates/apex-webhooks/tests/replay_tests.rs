//! Integration tests for DLQ replay: dual control, idempotency, and
//! re-delivery through a mock downstream.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use apex_webhooks::store::DlqStore;
use common::{body_json, MockDownstream, TestApp, BROKER_SECRET, TWO_EYES_TOKEN};

fn replay_request(id: Uuid, two_eyes: Option<&str>, idem: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/admin/dlq/replay")
        .header("content-type", "application/json");
    if let Some(token) = two_eyes {
        builder = builder.header("x-two-eyes", token);
    }
    if let Some(key) = idem {
        builder = builder.header("x-idempotency-key", key);
    }
    builder
        .body(Body::from(format!(r#"{{"id":"{id}"}}"#)))
        .unwrap()
}

async fn app_with_downstream(server: &MockServer) -> TestApp {
    TestApp::with_seams(
        Arc::new(apex_webhooks::NoopHandler),
        Arc::new(MockDownstream::new(format!("{}/deliver", server.uri()))),
    )
}

#[tokio::test]
async fn test_replay_without_two_eyes_is_401() {
    let app = TestApp::new();
    let id = app.seed_dlq_entry().await;

    let response = app
        .router()
        .oneshot(replay_request(id, None, Some("op-1")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["error"], "two_eyes_required");
    assert_eq!(app.dlq.len().await, 1);
}

#[tokio::test]
async fn test_replay_without_idempotency_key_is_400() {
    let app = TestApp::new();
    let id = app.seed_dlq_entry().await;

    let response = app
        .router()
        .oneshot(replay_request(id, Some(TWO_EYES_TOKEN), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "invalid_idempotency_key");
    assert_eq!(app.dlq.len().await, 1);
}

#[tokio::test]
async fn test_replay_unknown_id_is_404() {
    let app = TestApp::new();
    app.seed_dlq_entry().await;

    let response = app
        .router()
        .oneshot(replay_request(
            Uuid::new_v4(),
            Some(TWO_EYES_TOKEN),
            Some("op-1"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.dlq.len().await, 1);
}

#[tokio::test]
async fn test_replay_delivers_signed_payload_and_removes_entry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/deliver"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let app = app_with_downstream(&server).await;
    let id = app.seed_dlq_entry().await;

    let response = app
        .router()
        .oneshot(replay_request(id, Some(TWO_EYES_TOKEN), Some("op-1")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["ok"], true);
    assert_eq!(json["replayed"], id.to_string());
    assert_eq!(app.dlq.len().await, 0);

    // The re-delivered request carries a signature that verifies over the
    // exact body the downstream received.
    let received = &server.received_requests().await.unwrap()[0];
    let signature = received.headers["x-signature"].to_str().unwrap();
    assert_eq!(json["hmac"], signature);
    assert!(apex_webhooks::crypto::verify_signature(
        signature,
        &received.body,
        BROKER_SECRET
    ));
}

#[tokio::test]
async fn test_replay_reused_key_is_dedup_and_no_second_delivery() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/deliver"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let app = app_with_downstream(&server).await;
    let id = app.seed_dlq_entry().await;
    let router = app.router();

    let first = router
        .clone()
        .oneshot(replay_request(id, Some(TWO_EYES_TOKEN), Some("op-1")))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = router
        .oneshot(replay_request(id, Some(TWO_EYES_TOKEN), Some("op-1")))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    let json = body_json(second).await;
    assert_eq!(json["ok"], true);
    assert_eq!(json["dedup"], true);
    assert!(json.get("replayed").is_none());
}

#[tokio::test]
async fn test_replay_failure_keeps_entry_and_increments_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/deliver"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let app = app_with_downstream(&server).await;
    let id = app.seed_dlq_entry().await;

    let response = app
        .router()
        .oneshot(replay_request(id, Some(TWO_EYES_TOKEN), Some("op-1")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = body_json(response).await;
    assert_eq!(json["error"], "delivery_failed");

    let entry = app.dlq.get(id).await.expect("entry retained");
    assert_eq!(entry.attempts, 1);
}

#[tokio::test]
async fn test_failed_replay_key_stays_usable_for_retry() {
    let server = MockServer::start().await;
    // First delivery fails, the retry with the same key succeeds.
    Mock::given(method("POST"))
        .and(path("/deliver"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/deliver"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let app = app_with_downstream(&server).await;
    let id = app.seed_dlq_entry().await;
    let router = app.router();

    let first = router
        .clone()
        .oneshot(replay_request(id, Some(TWO_EYES_TOKEN), Some("op-1")))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::BAD_GATEWAY);

    let retry = router
        .oneshot(replay_request(id, Some(TWO_EYES_TOKEN), Some("op-1")))
        .await
        .unwrap();
    assert_eq!(retry.status(), StatusCode::OK);
    let json = body_json(retry).await;
    assert_eq!(json["replayed"], id.to_string());
    assert_eq!(app.dlq.len().await, 0);
}
