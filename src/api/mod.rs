//! REST API shared utilities (response wrappers, query parameters)

pub mod app;
pub mod domain;
pub mod health;
pub mod resolve;
pub mod user;

use crate::domain::OverrideKind;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Success response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse<T> {
    pub data: T,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Message response (for delete, etc.)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// `?path=` selecting a route
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct RoutePathQuery {
    /// Route path; empty or absent means the domain root
    #[serde(default)]
    pub path: String,
}

/// `?path=&owner=` selecting a delegation
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct DelegationQuery {
    #[serde(default)]
    pub path: String,
    pub owner: String,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct UserSearchQuery {
    #[serde(default)]
    pub q: String,
}

/// `?type=&name=` selecting a capability
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct CapabilityQuery {
    #[serde(rename = "type")]
    #[param(value_type = String, rename = "type")]
    pub kind: OverrideKind,
    pub name: String,
}
