//! Per-user handlers: navigation, own app settings, directory search

use crate::api::{SuccessResponse, UserSearchQuery};
use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::state::HasServices;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Search the user directory by username (administrators only)
#[utoipa::path(
    get,
    path = "/api/v1/users/search",
    tag = "Users",
    params(UserSearchQuery),
    responses(
        (status = 200, description = "Matching users"),
        (status = 403, description = "Administrator required")
    )
)]
pub async fn search_users<S: HasServices>(
    State(state): State<S>,
    auth: AuthUser,
    Query(query): Query<UserSearchQuery>,
) -> Result<impl IntoResponse> {
    let users = state.domain_service().search_users(&auth, &query.q).await?;
    Ok(Json(SuccessResponse::new(users)))
}

/// Administrator flag and delegated domains of the caller
#[utoipa::path(
    get,
    path = "/api/v1/me/access",
    tag = "Users",
    responses(
        (status = 200, description = "Success"),
        (status = 401, description = "Missing principal")
    )
)]
pub async fn access_summary<S: HasServices>(
    State(state): State<S>,
    auth: AuthUser,
) -> Result<impl IntoResponse> {
    let summary = state.domain_service().access_summary(&auth).await?;
    Ok(Json(SuccessResponse::new(summary)))
}

/// Installed apps as the caller sees them, with own preferences and overrides
#[utoipa::path(
    get,
    path = "/api/v1/user/apps",
    tag = "Users",
    responses((status = 200, description = "Success"))
)]
pub async fn user_apps<S: HasServices>(
    State(state): State<S>,
    auth: AuthUser,
) -> Result<impl IntoResponse> {
    let apps = state.app_service().user_apps(&auth).await?;
    Ok(Json(SuccessResponse::new(apps)))
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct ResetQuery {
    /// Another user to reset (administrators only); defaults to the caller
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ResetResponse {
    pub user_id: String,
    pub removed: usize,
}

/// Remove every version preference and override of a user
#[utoipa::path(
    post,
    path = "/api/v1/user/apps/reset",
    tag = "Users",
    params(ResetQuery),
    responses(
        (status = 200, description = "Number of records removed"),
        (status = 403, description = "Resetting another user requires an administrator")
    )
)]
pub async fn reset_user_apps<S: HasServices>(
    State(state): State<S>,
    auth: AuthUser,
    Query(query): Query<ResetQuery>,
) -> Result<impl IntoResponse> {
    let user_id = query.user_id.unwrap_or_else(|| auth.user_id.clone());
    let removed = state.app_service().reset_user(&auth, &user_id).await?;
    Ok(Json(SuccessResponse::new(ResetResponse { user_id, removed })))
}
