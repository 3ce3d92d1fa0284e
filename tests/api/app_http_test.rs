//! App, track, preference and override HTTP tests

use super::{Admin, Anonymous, TestApp, User};
use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;

#[tokio::test]
async fn test_register_app_sorts_versions() {
    let app = TestApp::new();

    let (status, body) = app
        .post(
            "/api/v1/apps",
            Admin,
            json!({ "id": "foo", "label": "Foo", "versions": ["10.0", "2.0", "9.1"] }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["versions"], json!(["2.0", "9.1", "10.0"]));

    let (_, listed) = app.get("/api/v1/apps", Anonymous).await;
    assert_eq!(listed["data"][0]["id"], "foo");
    assert_eq!(listed["data"][0]["version"], "10.0");

    let (status, _) = app
        .post("/api/v1/apps", User("7"), json!({ "id": "bar", "versions": ["1.0"] }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .post("/api/v1/apps", Admin, json!({ "id": "bar", "versions": ["1 0"] }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_tracks() {
    let app = TestApp::new();
    app.register_app("foo", &["1.0", "2.0"], &[]).await;

    let (status, body) = app
        .put("/api/v1/apps/foo/tracks/stable", Admin, json!({ "version": "1.0" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["version"], "1.0");

    let (status, _) = app
        .put("/api/v1/apps/foo/tracks/stable", Admin, json!({ "version": "7.0" }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, detail) = app.get("/api/v1/apps/foo", Anonymous).await;
    assert_eq!(detail["data"]["tracks"], json!({ "stable": "1.0" }));
    assert_eq!(detail["data"]["default"], json!(null));

    let (status, _) = app.delete("/api/v1/apps/foo/tracks/stable", Admin).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.delete("/api/v1/apps/foo/tracks/stable", Admin).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_system_preference_requires_admin() {
    let app = TestApp::new();
    app.register_app("foo", &["1.0", "2.0"], &[]).await;

    let (status, _) = app
        .put(
            "/api/v1/system/apps/foo/preference",
            User("7"),
            json!({ "version": "1.0" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .put(
            "/api/v1/system/apps/foo/preference",
            Admin,
            json!({ "version": "1.0" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["choice"], json!({ "version": "1.0" }));

    let (_, detail) = app.get("/api/v1/apps/foo", Anonymous).await;
    assert_eq!(detail["data"]["default"], json!({ "version": "1.0" }));
}

#[tokio::test]
async fn test_preference_validation() {
    let app = TestApp::new();
    app.register_app("foo", &["1.0", "2.0"], &[]).await;

    let path = "/api/v1/user/apps/foo/preference";
    let (status, _) = app.put(path, User("7"), json!({ "version": "3.0" })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = app.put(path, User("7"), json!({ "track": "beta" })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = app
        .put(path, User("7"), json!({ "version": "1.0", "track": "beta" }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = app
        .put("/api/v1/user/apps/ghost/preference", User("7"), json!({ "version": "1.0" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_empty_preference_clears() {
    let app = TestApp::new();
    app.register_app("foo", &["1.0", "2.0"], &[]).await;
    let path = "/api/v1/user/apps/foo/preference";

    app.put(path, User("7"), json!({ "version": "1.0" })).await;
    let (_, resolved) = app.get("/api/v1/resolve/version?app=foo", User("7")).await;
    assert_eq!(resolved["data"]["version"], "1.0");

    let (status, body) = app.put(path, User("7"), json!({ "version": "" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Version preference cleared");

    let (_, resolved) = app.get("/api/v1/resolve/version?app=foo", User("7")).await;
    assert_eq!(resolved["data"]["version"], "2.0");

    // Clearing again is fine
    let (status, _) = app.delete(path, User("7")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_overrides_and_routing_tables() {
    let app = TestApp::new();
    app.register_app("writer", &["1.0"], &["editor"]).await;
    app.register_app("notes", &["1.0"], &["editor"]).await;

    let (status, _) = app
        .put(
            "/api/v1/system/overrides",
            Admin,
            json!({ "type": "class", "name": "editor", "app": "ghost" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .put(
            "/api/v1/system/overrides",
            Admin,
            json!({ "type": "class", "name": "editor", "app": "writer" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["type"], "class");

    let (status, _) = app
        .put(
            "/api/v1/system/overrides",
            User("7"),
            json!({ "type": "class", "name": "editor", "app": "notes" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .put(
            "/api/v1/user/overrides",
            User("7"),
            json!({ "type": "class", "name": "editor", "app": "notes" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, table) = app.get("/api/v1/system/overrides", User("7")).await;
    assert_eq!(table["data"]["classes"], json!({ "editor": "writer" }));

    let (_, mine) = app.get("/api/v1/user/apps", User("7")).await;
    assert_eq!(mine["data"]["overrides"]["classes"], json!({ "editor": "notes" }));
    assert_eq!(mine["data"]["apps"].as_array().unwrap().len(), 2);

    let (status, _) = app
        .delete("/api/v1/user/overrides?type=class&name=editor", User("7"))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .delete("/api/v1/user/overrides?type=class&name=editor", User("7"))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reset_user_apps() {
    let app = TestApp::new();
    app.register_app("foo", &["1.0", "2.0"], &["viewer"]).await;

    app.put("/api/v1/user/apps/foo/preference", User("7"), json!({ "version": "1.0" }))
        .await;
    app.put(
        "/api/v1/user/overrides",
        User("7"),
        json!({ "type": "class", "name": "viewer", "app": "foo" }),
    )
    .await;
    app.put("/api/v1/user/apps/foo/preference", User("8"), json!({ "version": "1.0" }))
        .await;

    // Only administrators may reset someone else
    let (status, _) = app
        .post("/api/v1/user/apps/reset?user_id=8", User("7"), json!({}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.post("/api/v1/user/apps/reset", User("7"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({ "user_id": "7", "removed": 2 }));

    let (_, mine) = app.get("/api/v1/user/apps", User("7")).await;
    assert_eq!(mine["data"]["preferences"], json!({}));

    // User 8 is untouched
    let (_, theirs) = app.get("/api/v1/resolve/version?app=foo", User("8")).await;
    assert_eq!(theirs["data"]["version"], "1.0");
}
