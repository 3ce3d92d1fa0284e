//! Domain, route and delegation HTTP tests

use super::{Admin, Anonymous, TestApp, User};
use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;

#[tokio::test]
async fn test_create_domain_returns_token() {
    let app = TestApp::new();

    let (status, body) = app
        .post("/api/v1/domains", Admin, json!({ "domain": "Example.COM." }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["domain"], "example.com");
    assert_eq!(body["data"]["verified"], false);
    assert_eq!(body["data"]["token"].as_str().unwrap().len(), 40);

    let (status, body) = app
        .post("/api/v1/domains", Admin, json!({ "domain": "example.com" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
async fn test_create_domain_rejections() {
    let app = TestApp::new();

    let (status, body) = app
        .post("/api/v1/domains", Anonymous, json!({ "domain": "example.com" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = app
        .post("/api/v1/domains", User("7"), json!({ "domain": "example.com" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .post("/api/v1/domains", Admin, json!({ "domain": "bad_domain!" }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_update_domain_facts() {
    let app = TestApp::new();
    app.create_domain("example.com").await;

    let (status, body) = app
        .patch(
            "/api/v1/domains/example.com",
            Admin,
            json!({ "verified": true, "tls": true }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["verified"], true);
    assert_eq!(body["data"]["tls"], true);

    let (status, _) = app
        .patch("/api/v1/domains/missing.com", Admin, json!({ "tls": true }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_set_route_is_idempotent() {
    let app = TestApp::new();
    app.create_domain("example.com").await;

    let route = json!({ "path": "/shop/", "entity": "app:store", "priority": 5 });
    let (status, first) = app.set_route("example.com", Admin, route.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["data"]["path"], "/shop");
    assert_eq!(first["data"]["enabled"], true);

    let (status, second) = app.set_route("example.com", Admin, route).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["data"]["updated_at"], second["data"]["updated_at"]);

    let (_, routes) = app.get("/api/v1/domains/example.com/routes", Admin).await;
    assert_eq!(routes["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_set_route_validation() {
    let app = TestApp::new();
    app.create_domain("example.com").await;

    let (status, _) = app
        .set_route("example.com", Admin, json!({ "path": "/a/../b", "entity": "app:x" }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = app
        .set_route("example.com", Admin, json!({ "path": "/a", "entity": "nokind" }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = app
        .set_route(
            "example.com",
            Admin,
            json!({ "path": "/a", "entity": "redirect:ftp://example.com" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = app
        .set_route(
            "example.com",
            Admin,
            json!({ "path": "/a", "entity": "app:x", "priority": 50000 }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation");
    assert_eq!(body["details"]["priority"][0]["code"], "range");

    let (status, _) = app
        .set_route("missing.com", Admin, json!({ "path": "/a", "entity": "app:x" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delegation_scope_grants_downward_only() {
    let app = TestApp::new();
    app.create_domain("example.com").await;
    app.delegate("example.com", "/blog", "7").await;

    let (status, _) = app
        .set_route("example.com", User("7"), json!({ "path": "/blog/post", "entity": "page:1" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .set_route("example.com", User("7"), json!({ "path": "/blog", "entity": "page:2" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    // Sibling sharing a string prefix and the parent are both outside
    let (status, _) = app
        .set_route("example.com", User("7"), json!({ "path": "/blogging", "entity": "page:3" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .set_route("example.com", User("7"), json!({ "path": "/", "entity": "page:4" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Another user holds nothing here
    let (status, _) = app
        .set_route("example.com", User("8"), json!({ "path": "/blog/x", "entity": "page:5" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_delegate_sees_only_own_routes() {
    let app = TestApp::new();
    app.create_domain("example.com").await;
    app.create_domain("other.org").await;
    for path in ["/", "/blog", "/blog/a", "/shop"] {
        let (status, _) = app
            .set_route("example.com", Admin, json!({ "path": path, "entity": "page:x" }))
            .await;
        assert_eq!(status, StatusCode::OK);
    }
    app.delegate("example.com", "/blog", "7").await;

    let (_, domains) = app.get("/api/v1/domains", User("7")).await;
    let names: Vec<&str> = domains["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["domain"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["example.com"]);

    let (_, routes) = app.get("/api/v1/domains/example.com/routes", User("7")).await;
    let mut paths: Vec<&str> = routes["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["path"].as_str().unwrap())
        .collect();
    paths.sort();
    assert_eq!(paths, vec!["/blog", "/blog/a"]);

    let (status, _) = app.get("/api/v1/domains/other.org/routes", User("7")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_delegation_lifecycle() {
    let app = TestApp::new();
    app.create_domain("example.com").await;

    // Unknown owner
    let (status, _) = app
        .post(
            "/api/v1/domains/example.com/delegations",
            Admin,
            json!({ "path": "/blog", "owner": "404" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    app.delegate("example.com", "/blog", "7").await;
    let (status, _) = app
        .post(
            "/api/v1/domains/example.com/delegations",
            Admin,
            json!({ "path": "/blog/", "owner": "7" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, listed) = app.get("/api/v1/domains/example.com/delegations", Admin).await;
    assert_eq!(listed["data"][0]["owner"], "7");
    assert_eq!(listed["data"][0]["path"], "/blog");

    let (status, _) = app
        .delete("/api/v1/domains/example.com/delegations?path=/blog&owner=7", Admin)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .delete("/api/v1/domains/example.com/delegations?path=/blog&owner=7", Admin)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .set_route("example.com", User("7"), json!({ "path": "/blog", "entity": "page:1" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_delete_domain_cascades() {
    let app = TestApp::new();
    app.create_domain("example.com").await;
    for path in ["/", "/a", "/b"] {
        app.set_route("example.com", Admin, json!({ "path": path, "entity": "page:x" }))
            .await;
    }
    app.delegate("example.com", "/a", "7").await;

    let (status, body) = app.delete("/api/v1/domains/example.com", Admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({ "routes": 3, "delegations": 1 }));

    let (status, _) = app.get("/api/v1/domains/example.com", Admin).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, access) = app.get("/api/v1/me/access", User("7")).await;
    assert_eq!(access["data"]["domains"], json!([]));

    // Re-creating starts from nothing
    app.create_domain("example.com").await;
    let (_, routes) = app.get("/api/v1/domains/example.com/routes", Admin).await;
    assert_eq!(routes["data"], json!([]));
}

#[tokio::test]
async fn test_delete_route() {
    let app = TestApp::new();
    app.create_domain("example.com").await;
    app.set_route("example.com", Admin, json!({ "path": "/a", "entity": "page:x" }))
        .await;

    let (status, _) = app
        .delete("/api/v1/domains/example.com/routes?path=/a", Admin)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .delete("/api/v1/domains/example.com/routes?path=/a", Admin)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_access_summary_and_user_search() {
    let app = TestApp::new();
    app.create_domain("example.com").await;
    app.delegate("example.com", "/blog", "7").await;
    app.delegate("example.com", "/about", "7").await;

    let (_, access) = app.get("/api/v1/me/access", User("7")).await;
    assert_eq!(access["data"]["administrator"], false);
    assert_eq!(
        access["data"]["domains"],
        json!([{ "domain": "example.com", "paths": ["/about", "/blog"] }])
    );

    let (_, access) = app.get("/api/v1/me/access", Admin).await;
    assert_eq!(access["data"]["administrator"], true);

    let (status, users) = app.get("/api/v1/users/search?q=ali", Admin).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = users["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["username"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["alice", "alina"]);

    let (status, _) = app.get("/api/v1/users/search?q=ali", User("7")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
