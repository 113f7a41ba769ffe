//! Integration tests for API routes.
//!
//! Uses `tower::ServiceExt` to test Axum routes without a real HTTP server,
//! backed by the in-memory queue and a live worker.

use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use courier_common::config::{AppConfig, QueueBackendKind};
use courier_notifier::intake::ENQUEUE_FAILED;
use courier_notifier::{
    Dispatcher, NotificationService, NotificationStore, NotificationWorker, QueueClient,
    RetryPolicy, SenderRegistry,
};

use courier_api::routes::create_router;
use courier_api::state::AppState;

// ============================================================
// Helpers
// ============================================================

fn test_config() -> AppConfig {
    AppConfig {
        queue_backend: QueueBackendKind::Memory,
        retry_base_delay_ms: 10,
        ..AppConfig::default()
    }
}

/// Build the router with a running worker behind it.
fn build_app() -> Router {
    build_app_over(QueueClient::in_memory().0)
}

fn build_app_over(queue: QueueClient) -> Router {
    let config = test_config();
    let store = NotificationStore::new();

    let dispatcher = Dispatcher::new(
        store.clone(),
        queue.clone(),
        SenderRegistry::with_defaults(),
        RetryPolicy::from_config(&config),
    );
    tokio::spawn(NotificationWorker::new(queue.clone(), dispatcher, 4).run());

    create_router(AppState::new(NotificationService::new(store, queue), config))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

fn submit_raw(path: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

fn submit(body: serde_json::Value) -> Request<Body> {
    submit_raw("/notifications", body.to_string())
}

fn list_at(path: &str) -> Request<Body> {
    Request::builder().uri(path).body(Body::empty()).unwrap()
}

fn list(user_id: &str) -> Request<Body> {
    list_at(&format!("/users/{}/notifications", user_id))
}

/// Poll the list endpoint until the first record reaches `status`.
async fn wait_for_status(app: &Router, user_id: &str, status: &str) -> serde_json::Value {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let (_, json) = send(app, list(user_id)).await;
        if json[0]["status"] == status {
            return json[0].clone();
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "never reached {status}: {json}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// ============================================================
// Routes
// ============================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = build_app();
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let (status, json) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "courier-api");
    assert_eq!(json["queue"], "memory");
}

#[tokio::test]
async fn test_submit_returns_pending_record() {
    let app = build_app();

    let (status, json) = send(
        &app,
        submit(serde_json::json!({"userId": "u1", "type": "email", "content": "hi"})),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["userId"], "u1");
    assert_eq!(json["type"], "email");
    assert_eq!(json["content"], "hi");
    assert_eq!(json["status"], "pending");
    assert_eq!(json["retries"], 0);
    assert!(uuid::Uuid::parse_str(json["id"].as_str().unwrap()).is_ok());
}

#[tokio::test]
async fn test_submit_missing_fields_is_bad_request() {
    let app = build_app();

    let (status, json) = send(&app, submit(serde_json::json!({"userId": "u1"}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Missing required fields: type, content");

    let (_, listed) = send(&app, list("u1")).await;
    assert_eq!(listed, serde_json::json!([]));
}

#[tokio::test]
async fn test_list_unknown_user_is_empty() {
    let app = build_app();

    let (status, json) = send(&app, list("nobody")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, serde_json::json!([]));
}

#[tokio::test]
async fn test_submitted_notification_is_delivered() {
    let app = build_app();

    let (status, _) = send(
        &app,
        submit(serde_json::json!({"userId": "u1", "type": "in-app", "content": "welcome"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let record = wait_for_status(&app, "u1", "delivered").await;
    assert_eq!(record["retries"], 0);
}

#[tokio::test]
async fn test_unsupported_type_ends_failed() {
    let app = build_app();

    let (status, _) = send(
        &app,
        submit(serde_json::json!({"userId": "u1", "type": "fax", "content": "hi"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let record = wait_for_status(&app, "u1", "failed").await;
    assert_eq!(record["retries"], 3);
}

#[tokio::test]
async fn test_api_prefixed_routes_share_the_store() {
    let app = build_app();

    let (status, created) = send(
        &app,
        submit_raw(
            "/api/notifications",
            serde_json::json!({"userId": "u7", "type": "sms", "content": "code"}).to_string(),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, via_api) = send(&app, list_at("/api/users/u7/notifications")).await;
    assert_eq!(status, StatusCode::OK);
    let (_, via_root) = send(&app, list("u7")).await;
    assert_eq!(via_api[0]["id"], created["id"]);
    assert_eq!(via_root[0]["id"], created["id"]);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request_with_error_body() {
    let app = build_app();

    let (status, json) = send(&app, submit_raw("/notifications", "{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_wrong_field_type_is_bad_request_with_error_body() {
    let app = build_app();

    let (status, json) = send(
        &app,
        submit(serde_json::json!({"userId": 42, "type": "email", "content": "hi"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("userId"));
}

#[tokio::test]
async fn test_enqueue_failure_is_server_error() {
    let (queue, backend) = QueueClient::in_memory();
    backend.close().await;
    let app = build_app_over(queue);

    let (status, json) = send(
        &app,
        submit(serde_json::json!({"userId": "u1", "type": "email", "content": "hi"})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], ENQUEUE_FAILED);

    let (_, listed) = send(&app, list("u1")).await;
    assert_eq!(listed[0]["status"], "failed");
}
