//! Route and entity reference models

use super::common::{DomainName, RoutePath};
use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use validator::Validate;

lazy_static::lazy_static! {
    static ref ENTITY_KIND_REGEX: regex::Regex = regex::Regex::new(r"^[a-z][a-z0-9_-]*$").unwrap();
}

/// Opaque routing target such as `app:<id>` or `redirect:<url>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityRef(String);

impl EntityRef {
    pub fn parse(input: &str) -> Result<Self, AppError> {
        let input = input.trim();
        let (kind, target) = input.split_once(':').ok_or_else(|| {
            AppError::Validation(format!("Entity '{}' must look like kind:target", input))
        })?;
        if !ENTITY_KIND_REGEX.is_match(kind) || target.is_empty() {
            return Err(AppError::Validation(format!(
                "Entity '{}' must look like kind:target",
                input
            )));
        }
        if kind == "redirect" {
            let url = url::Url::parse(target)
                .map_err(|e| AppError::Validation(format!("Invalid redirect URL: {}", e)))?;
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(AppError::Validation(
                    "Redirect target must be an http(s) URL".to_string(),
                ));
            }
        }
        Ok(Self(input.to_string()))
    }

    pub fn kind(&self) -> &str {
        self.0.split_once(':').map(|(k, _)| k).unwrap_or_default()
    }

    pub fn target(&self) -> &str {
        self.0.split_once(':').map(|(_, t)| t).unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for EntityRef {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EntityRef> for String {
    fn from(entity: EntityRef) -> Self {
        entity.0
    }
}

/// A (domain, path) → entity mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Route {
    #[schema(value_type = String)]
    pub domain: DomainName,
    #[schema(value_type = String)]
    pub path: RoutePath,
    #[schema(value_type = String)]
    pub entity: EntityRef,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub priority: i32,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Route {
    /// Whether applying `input` would leave this route unchanged
    pub fn matches(&self, entity: &EntityRef, input: &ResolvedRouteInput) -> bool {
        &self.entity == entity
            && self.context == input.context
            && self.priority == input.priority
            && self.enabled == input.enabled
    }
}

/// Input for creating or replacing a route
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct SetRouteInput {
    #[serde(default)]
    pub path: String,
    #[validate(length(min = 3, max = 1024))]
    pub entity: String,
    #[validate(range(min = -10000, max = 10000))]
    pub priority: Option<i32>,
    #[validate(length(max = 1024))]
    pub context: Option<String>,
    pub enabled: Option<bool>,
}

/// Defaults applied to a [`SetRouteInput`]
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRouteInput {
    pub context: String,
    pub priority: i32,
    pub enabled: bool,
}

impl SetRouteInput {
    pub fn resolved(&self) -> ResolvedRouteInput {
        ResolvedRouteInput {
            context: self.context.clone().unwrap_or_default(),
            priority: self.priority.unwrap_or(0),
            enabled: self.enabled.unwrap_or(true),
        }
    }
}
