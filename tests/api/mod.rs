//! HTTP API test infrastructure
//!
//! - `TestApp` wraps the production `build_router()` over `AppState` with
//!   the in-memory store and a seeded user directory
//! - Request helpers attach principal headers and parse JSON bodies

pub mod app_http_test;
pub mod cleanup_http_test;
pub mod domain_http_test;
pub mod health_http_test;
pub mod resolution_http_test;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use routing_core::config::Config;
use routing_core::middleware::auth::{PRINCIPAL_ID_HEADER, PRINCIPAL_ROLE_HEADER};
use routing_core::repository::{InMemoryUserDirectory, MemoryConfigStore};
use routing_core::server::{build_router, AppState};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

/// Directory users: `1` is the administrator, `7` and `8` are plain users
pub const DIRECTORY_SEED: &str = "1:root:admin,7:alice,8:bob,9:alina";

/// Who a request is sent as
#[derive(Debug, Clone, Copy)]
pub enum Principal<'a> {
    Anonymous,
    Admin,
    User(&'a str),
}

pub use Principal::{Admin, Anonymous, User};

pub fn test_config() -> Config {
    let vars: HashMap<&str, &str> = [("USER_DIRECTORY_SEED", DIRECTORY_SEED)].into();
    Config::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap()
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState<MemoryConfigStore, InMemoryUserDirectory>,
}

impl TestApp {
    pub fn new() -> Self {
        let directory = InMemoryUserDirectory::from_seed(DIRECTORY_SEED).unwrap();
        let state = AppState::new(
            test_config(),
            Arc::new(MemoryConfigStore::new()),
            Arc::new(directory),
            None,
        );
        Self {
            router: build_router(state.clone()),
            state,
        }
    }

    pub async fn send(
        &self,
        method: Method,
        path: &str,
        principal: Principal<'_>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(path);
        builder = match principal {
            Principal::Anonymous => builder,
            Principal::Admin => builder
                .header(PRINCIPAL_ID_HEADER, "1")
                .header(PRINCIPAL_ROLE_HEADER, "administrator"),
            Principal::User(id) => builder
                .header(PRINCIPAL_ID_HEADER, id)
                .header(PRINCIPAL_ROLE_HEADER, "user"),
        };
        let request = match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap_or_default();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn get(&self, path: &str, principal: Principal<'_>) -> (StatusCode, Value) {
        self.send(Method::GET, path, principal, None).await
    }

    pub async fn post(&self, path: &str, principal: Principal<'_>, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, path, principal, Some(body)).await
    }

    pub async fn put(&self, path: &str, principal: Principal<'_>, body: Value) -> (StatusCode, Value) {
        self.send(Method::PUT, path, principal, Some(body)).await
    }

    pub async fn patch(&self, path: &str, principal: Principal<'_>, body: Value) -> (StatusCode, Value) {
        self.send(Method::PATCH, path, principal, Some(body)).await
    }

    pub async fn delete(&self, path: &str, principal: Principal<'_>) -> (StatusCode, Value) {
        self.send(Method::DELETE, path, principal, None).await
    }

    // ==================== Fixtures ====================

    pub async fn create_domain(&self, domain: &str) {
        let (status, _) = self
            .post("/api/v1/domains", Admin, serde_json::json!({ "domain": domain }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "creating {}", domain);
    }

    pub async fn set_route(&self, domain: &str, principal: Principal<'_>, route: Value) -> (StatusCode, Value) {
        self.put(&format!("/api/v1/domains/{}/routes", domain), principal, route)
            .await
    }

    pub async fn delegate(&self, domain: &str, path: &str, owner: &str) {
        let (status, body) = self
            .post(
                &format!("/api/v1/domains/{}/delegations", domain),
                Admin,
                serde_json::json!({ "path": path, "owner": owner }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "delegating {}: {}", path, body);
    }

    pub async fn register_app(&self, id: &str, versions: &[&str], classes: &[&str]) {
        let (status, body) = self
            .post(
                "/api/v1/apps",
                Admin,
                serde_json::json!({ "id": id, "versions": versions, "classes": classes }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "registering {}: {}", id, body);
    }
}
