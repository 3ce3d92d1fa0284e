//! Delegation model

use super::common::{DomainName, RoutePath};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Grant of route-management authority over `path` and everything below it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Delegation {
    #[schema(value_type = String)]
    pub domain: DomainName,
    #[schema(value_type = String)]
    pub path: RoutePath,
    pub owner: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Delegation {
    pub fn new(domain: DomainName, path: RoutePath, owner: String) -> Self {
        let now = Utc::now();
        Self {
            domain,
            path,
            owner,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Domains on which a principal holds delegations, with the delegated paths
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DelegatedDomain {
    #[schema(value_type = String)]
    pub domain: DomainName,
    pub paths: Vec<String>,
}

/// What the navigation shows a principal: admin areas and delegated domains
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AccessSummary {
    pub user_id: String,
    pub administrator: bool,
    pub domains: Vec<DelegatedDomain>,
}

/// Input for creating a delegation
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateDelegationInput {
    #[serde(default)]
    pub path: String,
    pub owner: String,
}
