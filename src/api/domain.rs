//! Domain, route and delegation handlers

use crate::api::{DelegationQuery, MessageResponse, RoutePathQuery, SuccessResponse};
use crate::domain::{CreateDelegationInput, CreateDomainInput, SetRouteInput, UpdateDomainInput};
use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::state::HasServices;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

// ==================== Domains ====================

/// List domains visible to the caller
#[utoipa::path(
    get,
    path = "/api/v1/domains",
    tag = "Domains",
    responses(
        (status = 200, description = "Success"),
        (status = 401, description = "Missing principal")
    )
)]
pub async fn list_domains<S: HasServices>(
    State(state): State<S>,
    auth: AuthUser,
) -> Result<impl IntoResponse> {
    let domains = state.domain_service().list_domains(&auth).await?;
    Ok(Json(SuccessResponse::new(domains)))
}

/// Create a domain (administrators only)
#[utoipa::path(
    post,
    path = "/api/v1/domains",
    tag = "Domains",
    request_body = CreateDomainInput,
    responses(
        (status = 201, description = "Created, including the verification token"),
        (status = 403, description = "Administrator required"),
        (status = 409, description = "Domain already exists"),
        (status = 422, description = "Invalid domain name")
    )
)]
pub async fn create_domain<S: HasServices>(
    State(state): State<S>,
    auth: AuthUser,
    Json(input): Json<CreateDomainInput>,
) -> Result<impl IntoResponse> {
    let domain = state.domain_service().create_domain(&auth, input).await?;
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(domain))))
}

#[utoipa::path(
    get,
    path = "/api/v1/domains/{domain}",
    tag = "Domains",
    params(("domain" = String, Path, description = "Domain name")),
    responses(
        (status = 200, description = "Success"),
        (status = 404, description = "Domain not found")
    )
)]
pub async fn get_domain<S: HasServices>(
    State(state): State<S>,
    auth: AuthUser,
    Path(domain): Path<String>,
) -> Result<impl IntoResponse> {
    let domain = state.domain_service().get_domain(&auth, &domain).await?;
    Ok(Json(SuccessResponse::new(domain)))
}

/// Update last-known verification and TLS facts
#[utoipa::path(
    patch,
    path = "/api/v1/domains/{domain}",
    tag = "Domains",
    params(("domain" = String, Path, description = "Domain name")),
    request_body = UpdateDomainInput,
    responses(
        (status = 200, description = "Success"),
        (status = 404, description = "Domain not found")
    )
)]
pub async fn update_domain<S: HasServices>(
    State(state): State<S>,
    auth: AuthUser,
    Path(domain): Path<String>,
    Json(input): Json<UpdateDomainInput>,
) -> Result<impl IntoResponse> {
    let domain = state
        .domain_service()
        .update_domain(&auth, &domain, input)
        .await?;
    Ok(Json(SuccessResponse::new(domain)))
}

/// Delete a domain with all of its routes and delegations
#[utoipa::path(
    delete,
    path = "/api/v1/domains/{domain}",
    tag = "Domains",
    params(("domain" = String, Path, description = "Domain name")),
    responses(
        (status = 200, description = "Deleted, with cascade counts"),
        (status = 404, description = "Domain not found")
    )
)]
pub async fn delete_domain<S: HasServices>(
    State(state): State<S>,
    auth: AuthUser,
    Path(domain): Path<String>,
) -> Result<impl IntoResponse> {
    let summary = state.domain_service().delete_domain(&auth, &domain).await?;
    Ok(Json(SuccessResponse::new(summary)))
}

// ==================== Routes ====================

#[utoipa::path(
    get,
    path = "/api/v1/domains/{domain}/routes",
    tag = "Domains",
    params(("domain" = String, Path, description = "Domain name")),
    responses(
        (status = 200, description = "Routes the caller may see"),
        (status = 404, description = "Domain not found")
    )
)]
pub async fn list_routes<S: HasServices>(
    State(state): State<S>,
    auth: AuthUser,
    Path(domain): Path<String>,
) -> Result<impl IntoResponse> {
    let routes = state.domain_service().list_routes(&auth, &domain).await?;
    Ok(Json(SuccessResponse::new(routes)))
}

/// Create or replace the route at a path
#[utoipa::path(
    put,
    path = "/api/v1/domains/{domain}/routes",
    tag = "Domains",
    params(("domain" = String, Path, description = "Domain name")),
    request_body = SetRouteInput,
    responses(
        (status = 200, description = "Stored route"),
        (status = 403, description = "Path not delegated to the caller"),
        (status = 404, description = "Domain not found"),
        (status = 422, description = "Invalid path, entity or priority")
    )
)]
pub async fn set_route<S: HasServices>(
    State(state): State<S>,
    auth: AuthUser,
    Path(domain): Path<String>,
    Json(input): Json<SetRouteInput>,
) -> Result<impl IntoResponse> {
    let route = state
        .domain_service()
        .set_route(&auth, &domain, input)
        .await?;
    Ok(Json(SuccessResponse::new(route)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/domains/{domain}/routes",
    tag = "Domains",
    params(("domain" = String, Path, description = "Domain name"), RoutePathQuery),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Route not found")
    )
)]
pub async fn delete_route<S: HasServices>(
    State(state): State<S>,
    auth: AuthUser,
    Path(domain): Path<String>,
    Query(query): Query<RoutePathQuery>,
) -> Result<impl IntoResponse> {
    state
        .domain_service()
        .delete_route(&auth, &domain, &query.path)
        .await?;
    Ok(Json(MessageResponse::new("Route deleted")))
}

// ==================== Delegations ====================

#[utoipa::path(
    get,
    path = "/api/v1/domains/{domain}/delegations",
    tag = "Domains",
    params(("domain" = String, Path, description = "Domain name")),
    responses(
        (status = 200, description = "Delegations of the domain"),
        (status = 403, description = "Administrator required")
    )
)]
pub async fn list_delegations<S: HasServices>(
    State(state): State<S>,
    auth: AuthUser,
    Path(domain): Path<String>,
) -> Result<impl IntoResponse> {
    let delegations = state
        .domain_service()
        .list_delegations(&auth, &domain)
        .await?;
    Ok(Json(SuccessResponse::new(delegations)))
}

/// Grant a user authority over a path subtree
#[utoipa::path(
    post,
    path = "/api/v1/domains/{domain}/delegations",
    tag = "Domains",
    params(("domain" = String, Path, description = "Domain name")),
    request_body = CreateDelegationInput,
    responses(
        (status = 201, description = "Created"),
        (status = 404, description = "Domain or user not found"),
        (status = 409, description = "Delegation already exists")
    )
)]
pub async fn create_delegation<S: HasServices>(
    State(state): State<S>,
    auth: AuthUser,
    Path(domain): Path<String>,
    Json(input): Json<CreateDelegationInput>,
) -> Result<impl IntoResponse> {
    let delegation = state
        .domain_service()
        .create_delegation(&auth, &domain, input)
        .await?;
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(delegation))))
}

#[utoipa::path(
    delete,
    path = "/api/v1/domains/{domain}/delegations",
    tag = "Domains",
    params(("domain" = String, Path, description = "Domain name"), DelegationQuery),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Delegation not found")
    )
)]
pub async fn delete_delegation<S: HasServices>(
    State(state): State<S>,
    auth: AuthUser,
    Path(domain): Path<String>,
    Query(query): Query<DelegationQuery>,
) -> Result<impl IntoResponse> {
    state
        .domain_service()
        .delete_delegation(&auth, &domain, &query.path, &query.owner)
        .await?;
    Ok(Json(MessageResponse::new("Delegation deleted")))
}
