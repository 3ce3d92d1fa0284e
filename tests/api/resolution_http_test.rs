//! Route, version and override resolution over HTTP

use super::{Admin, Anonymous, Principal, TestApp, User};
use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

async fn resolve(app: &TestApp, domain: &str, path: &str) -> Value {
    let (status, body) = app
        .get(
            &format!("/api/v1/resolve/route?domain={}&path={}", domain, path),
            Anonymous,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    body["data"].clone()
}

async fn version(app: &TestApp, principal: Principal<'_>) -> (String, String) {
    let (status, body) = app.get("/api/v1/resolve/version?app=foo", principal).await;
    assert_eq!(status, StatusCode::OK);
    (
        body["data"]["version"].as_str().unwrap().to_string(),
        body["data"]["source"].as_str().unwrap().to_string(),
    )
}

async fn shop_domain() -> TestApp {
    let app = TestApp::new();
    app.create_domain("example.com").await;
    for route in [
        json!({ "path": "/", "entity": "app:home" }),
        json!({ "path": "/shop", "entity": "app:store", "priority": 1 }),
        // One route per path: this replaces the previous /shop route
        json!({ "path": "/shop", "entity": "app:outlet", "priority": 9 }),
        json!({ "path": "/old", "entity": "page:legacy", "enabled": false }),
    ] {
        let (status, _) = app.set_route("example.com", Admin, route).await;
        assert_eq!(status, StatusCode::OK);
    }
    app
}

#[tokio::test]
async fn test_exact_match_and_root_fallback() {
    let app = shop_domain().await;

    let hit = resolve(&app, "example.com", "/shop").await;
    assert_eq!(hit["outcome"], "matched");
    assert_eq!(hit["route"]["entity"], "app:outlet");

    let hit = resolve(&app, "Example.com", "/about").await;
    assert_eq!(hit["route"]["entity"], "app:home");
    assert_eq!(hit["route"]["path"], "");
}

#[tokio::test]
async fn test_disabled_route_falls_back_to_root() {
    let app = shop_domain().await;

    let hit = resolve(&app, "example.com", "/old").await;
    assert_eq!(hit["route"]["entity"], "app:home");
}

#[tokio::test]
async fn test_no_intermediate_prefix_fallback() {
    let app = TestApp::new();
    app.create_domain("example.com").await;
    app.set_route("example.com", Admin, json!({ "path": "/shop", "entity": "app:store" }))
        .await;

    let miss = resolve(&app, "example.com", "/shop/items").await;
    assert_eq!(miss, json!({ "outcome": "no_match" }));
}

#[tokio::test]
async fn test_unknown_domain_is_no_match() {
    let app = TestApp::new();
    let miss = resolve(&app, "nowhere.net", "/").await;
    assert_eq!(miss["outcome"], "no_match");

    let (status, _) = app
        .get("/api/v1/resolve/route?domain=bad_domain!&path=/", Anonymous)
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_version_cascade() {
    let app = TestApp::new();
    app.register_app("foo", &["1.0", "2.0", "3.0"], &[]).await;

    assert_eq!(version(&app, Anonymous).await, ("3.0".into(), "highest".into()));

    app.put("/api/v1/apps/foo/tracks/stable", Admin, json!({ "version": "2.0" }))
        .await;
    app.put(
        "/api/v1/system/apps/foo/preference",
        Admin,
        json!({ "track": "stable" }),
    )
    .await;
    assert_eq!(version(&app, Anonymous).await, ("2.0".into(), "system_track".into()));
    assert_eq!(version(&app, User("7")).await, ("2.0".into(), "system_track".into()));

    app.put("/api/v1/user/apps/foo/preference", User("7"), json!({ "version": "1.0" }))
        .await;
    assert_eq!(version(&app, User("7")).await, ("1.0".into(), "user_pin".into()));
    assert_eq!(version(&app, User("8")).await, ("2.0".into(), "system_track".into()));

    app.delete("/api/v1/system/apps/foo/preference", Admin).await;
    assert_eq!(version(&app, User("8")).await, ("3.0".into(), "highest".into()));
}

#[tokio::test]
async fn test_pin_on_removed_version_falls_through() {
    let app = TestApp::new();
    app.register_app("foo", &["1.0", "2.0"], &[]).await;
    app.put("/api/v1/user/apps/foo/preference", User("7"), json!({ "version": "1.0" }))
        .await;

    // Re-registration drops 1.0
    app.register_app("foo", &["2.0", "2.1"], &[]).await;

    let (_, body) = app.get("/api/v1/resolve/version?app=foo", User("7")).await;
    assert_eq!(body["data"]["version"], "2.1");
    assert_eq!(body["data"]["source"], "highest");
}

#[tokio::test]
async fn test_unknown_app_version_is_not_found() {
    let app = TestApp::new();
    let (status, body) = app.get("/api/v1/resolve/version?app=ghost", Anonymous).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_override_resolution() {
    let app = TestApp::new();
    app.register_app("writer", &["1.0"], &["editor"]).await;

    let path = "/api/v1/resolve/override?type=class&name=editor";
    let (_, body) = app.get(path, Anonymous).await;
    assert_eq!(
        body["data"],
        json!({ "outcome": "resolved", "app": "writer", "source": "declared" })
    );

    // A second declaring app makes it ambiguous
    app.register_app("notes", &["1.0"], &["editor"]).await;
    let (status, body) = app.get(path, Anonymous).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"],
        json!({ "outcome": "ambiguous", "apps": ["notes", "writer"] })
    );

    app.put(
        "/api/v1/system/overrides",
        Admin,
        json!({ "type": "class", "name": "editor", "app": "writer" }),
    )
    .await;
    let (_, body) = app.get(path, User("7")).await;
    assert_eq!(body["data"]["app"], "writer");
    assert_eq!(body["data"]["source"], "system");

    app.put(
        "/api/v1/user/overrides",
        User("7"),
        json!({ "type": "class", "name": "editor", "app": "notes" }),
    )
    .await;
    let (_, body) = app.get(path, User("7")).await;
    assert_eq!(body["data"]["app"], "notes");
    assert_eq!(body["data"]["source"], "user");

    let (_, body) = app
        .get("/api/v1/resolve/override?type=service&name=chat", Anonymous)
        .await;
    assert_eq!(body["data"], json!({ "outcome": "none" }));
}
