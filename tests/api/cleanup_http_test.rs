//! Version cleanup over HTTP

use super::{Admin, Anonymous, TestApp, User};
use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;

#[tokio::test]
async fn test_cleanup_keeps_referenced_versions() {
    let app = TestApp::new();
    app.register_app("foo", &["1.0", "2.0", "3.0", "4.0", "5.0"], &[]).await;

    app.put("/api/v1/apps/foo/tracks/stable", Admin, json!({ "version": "2.0" }))
        .await;
    app.put("/api/v1/user/apps/foo/preference", User("7"), json!({ "version": "3.0" }))
        .await;

    let (status, body) = app.post("/api/v1/apps/foo/cleanup", Admin, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({ "app": "foo", "removed": ["1.0", "4.0"] }));

    let (_, detail) = app.get("/api/v1/apps/foo", Anonymous).await;
    assert_eq!(detail["data"]["versions"], json!(["2.0", "3.0", "5.0"]));

    // Nothing left to remove
    let (_, body) = app.post("/api/v1/apps/foo/cleanup", Admin, json!({})).await;
    assert_eq!(body["data"]["removed"], json!([]));
}

#[tokio::test]
async fn test_cleanup_keeps_system_pin() {
    let app = TestApp::new();
    app.register_app("foo", &["1.0", "2.0"], &[]).await;
    app.put(
        "/api/v1/system/apps/foo/preference",
        Admin,
        json!({ "version": "1.0" }),
    )
    .await;

    let (_, body) = app.post("/api/v1/apps/foo/cleanup", Admin, json!({})).await;
    assert_eq!(body["data"]["removed"], json!([]));
}

#[tokio::test]
async fn test_cleanup_all_apps() {
    let app = TestApp::new();
    app.register_app("bar", &["1.0", "2.0"], &[]).await;
    app.register_app("foo", &["0.1", "0.2", "0.3"], &[]).await;

    let (status, body) = app.post("/api/v1/apps/cleanup", Admin, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"],
        json!([
            { "app": "bar", "removed": ["1.0"] },
            { "app": "foo", "removed": ["0.1", "0.2"] },
        ])
    );
}

#[tokio::test]
async fn test_cleanup_requires_admin() {
    let app = TestApp::new();
    app.register_app("foo", &["1.0", "2.0"], &[]).await;

    let (status, _) = app.post("/api/v1/apps/foo/cleanup", User("7"), json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.post("/api/v1/apps/cleanup", Anonymous, json!({})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.post("/api/v1/apps/ghost/cleanup", Admin, json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
