//! Principal extraction
//!
//! Authentication happens upstream; the gateway forwards the verified
//! principal as `x-principal-id` and `x-principal-role` headers.

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::domain::{validate_principal_id, Role};

pub const PRINCIPAL_ID_HEADER: &str = "x-principal-id";
pub const PRINCIPAL_ROLE_HEADER: &str = "x-principal-role";

/// Authenticated principal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: String,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Administrator
    }

    fn from_headers(headers: &HeaderMap) -> Result<Self, AuthError> {
        let user_id = headers
            .get(PRINCIPAL_ID_HEADER)
            .ok_or(AuthError::MissingPrincipal)?
            .to_str()
            .map_err(|_| AuthError::InvalidHeader("Invalid header encoding".to_string()))?
            .trim()
            .to_string();
        validate_principal_id(&user_id)
            .map_err(|_| AuthError::InvalidHeader("Invalid principal id".to_string()))?;

        // A missing role header means an ordinary user
        let role = match headers.get(PRINCIPAL_ROLE_HEADER) {
            Some(value) => value
                .to_str()
                .map_err(|_| AuthError::InvalidHeader("Invalid header encoding".to_string()))?
                .parse::<Role>()
                .map_err(AuthError::InvalidHeader)?,
            None => Role::User,
        };

        Ok(Self { user_id, role })
    }
}

/// Authentication errors
#[derive(Debug, Clone)]
pub enum AuthError {
    MissingPrincipal,
    InvalidHeader(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match self {
            AuthError::MissingPrincipal => "Missing principal".to_string(),
            AuthError::InvalidHeader(msg) => msg,
        };

        let body = serde_json::json!({
            "error": "unauthorized",
            "message": message,
        });

        (StatusCode::UNAUTHORIZED, axum::Json(body)).into_response()
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        AuthUser::from_headers(&parts.headers)
    }
}

/// Returns `Some(AuthUser)` when principal headers are present
#[derive(Debug, Clone)]
pub struct OptionalAuth(pub Option<AuthUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if parts.headers.get(PRINCIPAL_ID_HEADER).is_none() {
            return Ok(OptionalAuth(None));
        }
        AuthUser::from_headers(&parts.headers).map(|u| OptionalAuth(Some(u)))
    }
}
