//! Resolution endpoints. Absence is a normal outcome here, never an error.

use crate::api::{CapabilityQuery, SuccessResponse};
use crate::error::Result;
use crate::middleware::auth::OptionalAuth;
use crate::state::HasServices;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct ResolveRouteQuery {
    pub domain: String,
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct ResolveVersionQuery {
    pub app: String,
}

/// Route serving a request for `domain` + `path`
#[utoipa::path(
    get,
    path = "/api/v1/resolve/route",
    tag = "Resolution",
    params(ResolveRouteQuery),
    responses(
        (status = 200, description = "`matched` with the route, or `no_match`"),
        (status = 422, description = "Malformed domain or path")
    )
)]
pub async fn resolve_route<S: HasServices>(
    State(state): State<S>,
    Query(query): Query<ResolveRouteQuery>,
) -> Result<impl IntoResponse> {
    let resolution = state
        .domain_service()
        .resolve_route(&query.domain, &query.path)
        .await?;
    Ok(Json(SuccessResponse::new(resolution)))
}

/// Version of an app served to the caller (or the system default when anonymous)
#[utoipa::path(
    get,
    path = "/api/v1/resolve/version",
    tag = "Resolution",
    params(ResolveVersionQuery),
    responses(
        (status = 200, description = "Resolved version and the rule that chose it"),
        (status = 404, description = "App not installed")
    )
)]
pub async fn resolve_version<S: HasServices>(
    State(state): State<S>,
    OptionalAuth(auth): OptionalAuth,
    Query(query): Query<ResolveVersionQuery>,
) -> Result<impl IntoResponse> {
    let resolution = state
        .app_service()
        .resolve_version(auth.as_ref(), &query.app)
        .await?;
    Ok(Json(SuccessResponse::new(resolution)))
}

/// App handling a capability for the caller
#[utoipa::path(
    get,
    path = "/api/v1/resolve/override",
    tag = "Resolution",
    params(CapabilityQuery),
    responses(
        (status = 200, description = "`resolved`, `none` or `ambiguous` with the candidates")
    )
)]
pub async fn resolve_override<S: HasServices>(
    State(state): State<S>,
    OptionalAuth(auth): OptionalAuth,
    Query(query): Query<CapabilityQuery>,
) -> Result<impl IntoResponse> {
    let resolution = state
        .app_service()
        .resolve_override(auth.as_ref(), query.kind, &query.name)
        .await?;
    Ok(Json(SuccessResponse::new(resolution)))
}
