//! Domain (hostname) model

use super::common::DomainName;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// A hostname served by the engine.
///
/// `verified` and `tls` are last-known facts reported by the DNS/ACME
/// collaborator; `token` is generated once at creation and never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Domain {
    #[schema(value_type = String)]
    pub domain: DomainName,
    pub verified: bool,
    pub tls: bool,
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Domain {
    pub fn new(domain: DomainName) -> Self {
        let now = Utc::now();
        Self {
            domain,
            verified: false,
            tls: false,
            token: generate_verification_token(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Generate an opaque verification token for a new domain
pub fn generate_verification_token() -> String {
    let bytes: [u8; 20] = rand::thread_rng().gen();
    hex::encode(bytes)
}

/// Input for creating a domain
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateDomainInput {
    #[validate(length(min = 1, max = 253))]
    pub domain: String,
}

/// Input for updating domain facts
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateDomainInput {
    pub verified: Option<bool>,
    pub tls: Option<bool>,
}

impl UpdateDomainInput {
    /// Apply the provided fields; returns whether anything changed
    pub fn apply_to(&self, domain: &mut Domain) -> bool {
        let mut changed = false;
        if let Some(verified) = self.verified {
            changed |= domain.verified != verified;
            domain.verified = verified;
        }
        if let Some(tls) = self.tls {
            changed |= domain.tls != tls;
            domain.tls = tls;
        }
        changed
    }
}
