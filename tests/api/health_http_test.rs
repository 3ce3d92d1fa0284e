//! System endpoint tests

use super::{Admin, Anonymous, TestApp};
use axum::{body::Body, http::Request, http::StatusCode};
use tower::ServiceExt;

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let (status, body) = app.get("/health", Anonymous).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_ready_with_memory_store() {
    let app = TestApp::new();
    let (status, _) = app.get("/ready", Anonymous).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_metrics_disabled_without_recorder() {
    let app = TestApp::new();
    let (status, _) = app.get("/metrics", Admin).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = TestApp::new();
    let (status, body) = app.get("/api-docs/openapi.json", Anonymous).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/api/v1/resolve/route"].is_object());
}

#[tokio::test]
async fn test_missing_principal_is_json_401() {
    let app = TestApp::new();
    let (status, body) = app.get("/api/v1/me/access", Anonymous).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let app = TestApp::new();
    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "req-123")
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "req-123");
}
