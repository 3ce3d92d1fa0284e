//! App, track, version preference, override and cleanup handlers

use crate::api::{CapabilityQuery, MessageResponse, SuccessResponse};
use crate::domain::{
    RegisterAppInput, Scope, SetOverrideInput, SetTrackInput, SetVersionPreferenceInput,
};
use crate::error::Result;
use crate::middleware::auth::{AuthUser, OptionalAuth};
use crate::state::HasServices;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

// ==================== Apps ====================

/// List installed apps with the version each resolves to for the caller
#[utoipa::path(
    get,
    path = "/api/v1/apps",
    tag = "Apps",
    responses((status = 200, description = "Success"))
)]
pub async fn list_apps<S: HasServices>(
    State(state): State<S>,
    OptionalAuth(auth): OptionalAuth,
) -> Result<impl IntoResponse> {
    let apps = state.app_service().list_apps(auth.as_ref()).await?;
    Ok(Json(SuccessResponse::new(apps)))
}

/// Register or re-register an installed app (administrators only)
#[utoipa::path(
    post,
    path = "/api/v1/apps",
    tag = "Apps",
    request_body = RegisterAppInput,
    responses(
        (status = 201, description = "Registered"),
        (status = 403, description = "Administrator required"),
        (status = 422, description = "Invalid app id or version")
    )
)]
pub async fn register_app<S: HasServices>(
    State(state): State<S>,
    auth: AuthUser,
    Json(input): Json<RegisterAppInput>,
) -> Result<impl IntoResponse> {
    let app = state.app_service().register_app(&auth, input).await?;
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(app))))
}

#[utoipa::path(
    get,
    path = "/api/v1/apps/{app}",
    tag = "Apps",
    params(("app" = String, Path, description = "App id")),
    responses(
        (status = 200, description = "Versions, tracks and system default"),
        (status = 404, description = "App not found")
    )
)]
pub async fn get_app<S: HasServices>(
    State(state): State<S>,
    Path(app): Path<String>,
) -> Result<impl IntoResponse> {
    let detail = state.app_service().get_app(&app).await?;
    Ok(Json(SuccessResponse::new(detail)))
}

// ==================== Tracks ====================

#[utoipa::path(
    put,
    path = "/api/v1/apps/{app}/tracks/{track}",
    tag = "Apps",
    params(
        ("app" = String, Path, description = "App id"),
        ("track" = String, Path, description = "Track name")
    ),
    request_body = SetTrackInput,
    responses(
        (status = 200, description = "Stored track"),
        (status = 422, description = "Version not installed")
    )
)]
pub async fn set_track<S: HasServices>(
    State(state): State<S>,
    auth: AuthUser,
    Path((app, track)): Path<(String, String)>,
    Json(input): Json<SetTrackInput>,
) -> Result<impl IntoResponse> {
    let track = state
        .app_service()
        .set_track(&auth, &app, &track, input)
        .await?;
    Ok(Json(SuccessResponse::new(track)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/apps/{app}/tracks/{track}",
    tag = "Apps",
    params(
        ("app" = String, Path, description = "App id"),
        ("track" = String, Path, description = "Track name")
    ),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Track not found")
    )
)]
pub async fn delete_track<S: HasServices>(
    State(state): State<S>,
    auth: AuthUser,
    Path((app, track)): Path<(String, String)>,
) -> Result<impl IntoResponse> {
    state.app_service().delete_track(&auth, &app, &track).await?;
    Ok(Json(MessageResponse::new("Track deleted")))
}

// ==================== Version preferences ====================

async fn put_preference<S: HasServices>(
    state: &S,
    auth: &AuthUser,
    scope: Scope,
    app: &str,
    input: SetVersionPreferenceInput,
) -> Result<axum::response::Response> {
    let preference = state
        .app_service()
        .set_version_preference(auth, scope, app, input)
        .await?;
    Ok(match preference {
        Some(preference) => Json(SuccessResponse::new(preference)).into_response(),
        None => Json(MessageResponse::new("Version preference cleared")).into_response(),
    })
}

/// Set the system default for an app: a pinned version or a track
#[utoipa::path(
    put,
    path = "/api/v1/system/apps/{app}/preference",
    tag = "Preferences",
    params(("app" = String, Path, description = "App id")),
    request_body = SetVersionPreferenceInput,
    responses(
        (status = 200, description = "Stored, or cleared when both fields are empty"),
        (status = 403, description = "Administrator required"),
        (status = 422, description = "Version not installed or unknown track")
    )
)]
pub async fn set_system_preference<S: HasServices>(
    State(state): State<S>,
    auth: AuthUser,
    Path(app): Path<String>,
    Json(input): Json<SetVersionPreferenceInput>,
) -> Result<impl IntoResponse> {
    put_preference(&state, &auth, Scope::System, &app, input).await
}

#[utoipa::path(
    delete,
    path = "/api/v1/system/apps/{app}/preference",
    tag = "Preferences",
    params(("app" = String, Path, description = "App id")),
    responses((status = 200, description = "Cleared"))
)]
pub async fn clear_system_preference<S: HasServices>(
    State(state): State<S>,
    auth: AuthUser,
    Path(app): Path<String>,
) -> Result<impl IntoResponse> {
    state
        .app_service()
        .clear_version_preference(&auth, Scope::System, &app)
        .await?;
    Ok(Json(MessageResponse::new("Version preference cleared")))
}

/// Set the caller's own preference for an app
#[utoipa::path(
    put,
    path = "/api/v1/user/apps/{app}/preference",
    tag = "Preferences",
    params(("app" = String, Path, description = "App id")),
    request_body = SetVersionPreferenceInput,
    responses(
        (status = 200, description = "Stored, or cleared when both fields are empty"),
        (status = 422, description = "Version not installed or unknown track")
    )
)]
pub async fn set_user_preference<S: HasServices>(
    State(state): State<S>,
    auth: AuthUser,
    Path(app): Path<String>,
    Json(input): Json<SetVersionPreferenceInput>,
) -> Result<impl IntoResponse> {
    let scope = Scope::user(&auth.user_id);
    put_preference(&state, &auth, scope, &app, input).await
}

#[utoipa::path(
    delete,
    path = "/api/v1/user/apps/{app}/preference",
    tag = "Preferences",
    params(("app" = String, Path, description = "App id")),
    responses((status = 200, description = "Cleared"))
)]
pub async fn clear_user_preference<S: HasServices>(
    State(state): State<S>,
    auth: AuthUser,
    Path(app): Path<String>,
) -> Result<impl IntoResponse> {
    let scope = Scope::user(&auth.user_id);
    state
        .app_service()
        .clear_version_preference(&auth, scope, &app)
        .await?;
    Ok(Json(MessageResponse::new("Version preference cleared")))
}

// ==================== Overrides ====================

/// System routing table
#[utoipa::path(
    get,
    path = "/api/v1/system/overrides",
    tag = "Overrides",
    responses((status = 200, description = "Overrides grouped by type"))
)]
pub async fn system_routing_table<S: HasServices>(
    State(state): State<S>,
    _auth: AuthUser,
) -> Result<impl IntoResponse> {
    let table = state.app_service().routing_table(&Scope::System).await?;
    Ok(Json(SuccessResponse::new(table)))
}

#[utoipa::path(
    put,
    path = "/api/v1/system/overrides",
    tag = "Overrides",
    request_body = SetOverrideInput,
    responses(
        (status = 200, description = "Stored override"),
        (status = 403, description = "Administrator required"),
        (status = 404, description = "App not registered")
    )
)]
pub async fn set_system_override<S: HasServices>(
    State(state): State<S>,
    auth: AuthUser,
    Json(input): Json<SetOverrideInput>,
) -> Result<impl IntoResponse> {
    let record = state
        .app_service()
        .set_override(&auth, Scope::System, input)
        .await?;
    Ok(Json(SuccessResponse::new(record)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/system/overrides",
    tag = "Overrides",
    params(CapabilityQuery),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Override not found")
    )
)]
pub async fn delete_system_override<S: HasServices>(
    State(state): State<S>,
    auth: AuthUser,
    Query(query): Query<CapabilityQuery>,
) -> Result<impl IntoResponse> {
    state
        .app_service()
        .delete_override(&auth, Scope::System, query.kind, &query.name)
        .await?;
    Ok(Json(MessageResponse::new("Override deleted")))
}

#[utoipa::path(
    put,
    path = "/api/v1/user/overrides",
    tag = "Overrides",
    request_body = SetOverrideInput,
    responses(
        (status = 200, description = "Stored override"),
        (status = 404, description = "App not registered")
    )
)]
pub async fn set_user_override<S: HasServices>(
    State(state): State<S>,
    auth: AuthUser,
    Json(input): Json<SetOverrideInput>,
) -> Result<impl IntoResponse> {
    let scope = Scope::user(&auth.user_id);
    let record = state.app_service().set_override(&auth, scope, input).await?;
    Ok(Json(SuccessResponse::new(record)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/user/overrides",
    tag = "Overrides",
    params(CapabilityQuery),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Override not found")
    )
)]
pub async fn delete_user_override<S: HasServices>(
    State(state): State<S>,
    auth: AuthUser,
    Query(query): Query<CapabilityQuery>,
) -> Result<impl IntoResponse> {
    let scope = Scope::user(&auth.user_id);
    state
        .app_service()
        .delete_override(&auth, scope, query.kind, &query.name)
        .await?;
    Ok(Json(MessageResponse::new("Override deleted")))
}

// ==================== Cleanup ====================

/// Remove installed versions of one app that nothing refers to
#[utoipa::path(
    post,
    path = "/api/v1/apps/{app}/cleanup",
    tag = "Apps",
    params(("app" = String, Path, description = "App id")),
    responses(
        (status = 200, description = "Removed versions"),
        (status = 403, description = "Administrator required"),
        (status = 404, description = "App not found")
    )
)]
pub async fn cleanup_app<S: HasServices>(
    State(state): State<S>,
    auth: AuthUser,
    Path(app): Path<String>,
) -> Result<impl IntoResponse> {
    let report = state
        .cleanup_coordinator()
        .cleanup_unused_versions(&auth, &app)
        .await?;
    Ok(Json(SuccessResponse::new(report)))
}

#[utoipa::path(
    post,
    path = "/api/v1/apps/cleanup",
    tag = "Apps",
    responses(
        (status = 200, description = "Removed versions per app"),
        (status = 403, description = "Administrator required")
    )
)]
pub async fn cleanup_all<S: HasServices>(
    State(state): State<S>,
    auth: AuthUser,
) -> Result<impl IntoResponse> {
    let reports = state.cleanup_coordinator().cleanup_all_as(&auth).await?;
    Ok(Json(SuccessResponse::new(reports)))
}
