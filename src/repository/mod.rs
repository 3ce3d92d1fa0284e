//! Config store: versioned keyed storage for all routing configuration
//!
//! Every record lives under a [`StoreKey`] of `(kind, partition, id)` and
//! carries a version drawn from a store-wide revision counter. Writers pass
//! the version they last observed; a mismatch is reported as
//! [`AppError::VersionConflict`] and the caller must re-read and retry.

pub mod memory;
pub mod mysql;
pub mod records;
pub mod user_directory;

pub use memory::MemoryConfigStore;
pub use mysql::MySqlConfigStore;
pub use records::{Record, RecordStore, Versioned};
pub use user_directory::{InMemoryUserDirectory, MySqlUserDirectory, UserDirectory};
#[cfg(test)]
pub use user_directory::MockUserDirectory;

use crate::domain::{DomainName, OverrideKind, RoutePath, Scope};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Record family stored in the config store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Domain,
    Route,
    Delegation,
    App,
    Track,
    Preference,
    Override,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Domain => "domain",
            RecordKind::Route => "route",
            RecordKind::Delegation => "delegation",
            RecordKind::App => "app",
            RecordKind::Track => "track",
            RecordKind::Preference => "preference",
            RecordKind::Override => "override",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = AppError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "domain" => Ok(RecordKind::Domain),
            "route" => Ok(RecordKind::Route),
            "delegation" => Ok(RecordKind::Delegation),
            "app" => Ok(RecordKind::App),
            "track" => Ok(RecordKind::Track),
            "preference" => Ok(RecordKind::Preference),
            "override" => Ok(RecordKind::Override),
            other => Err(AppError::Internal(anyhow::anyhow!(
                "Unknown record kind '{}'",
                other
            ))),
        }
    }
}

/// Widths of the `config_entries` key columns. With utf8mb4 the primary
/// key stays within InnoDB's 3072-byte index limit.
pub const MAX_KIND_LEN: usize = 16;
pub const MAX_PARTITION_LEN: usize = 255;
pub const MAX_ENTRY_ID_LEN: usize = 480;

/// Storage key. `partition` groups records that are scanned or deleted
/// together (a domain's routes, a scope's preferences, an app's tracks).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreKey {
    pub kind: RecordKind,
    pub partition: String,
    pub id: String,
}

impl StoreKey {
    pub fn new(kind: RecordKind, partition: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind,
            partition: partition.into(),
            id: id.into(),
        }
    }

    /// Reject keys the durable store cannot hold
    pub fn check_width(&self) -> Result<()> {
        if self.partition.chars().count() > MAX_PARTITION_LEN
            || self.id.chars().count() > MAX_ENTRY_ID_LEN
        {
            return Err(AppError::Validation(format!("Key {} is too long", self)));
        }
        Ok(())
    }

    pub fn domain(domain: &DomainName) -> Self {
        Self::new(RecordKind::Domain, domain.as_str(), "")
    }

    pub fn route(domain: &DomainName, path: &RoutePath) -> Self {
        Self::new(RecordKind::Route, domain.as_str(), path.to_string())
    }

    /// Owner ids never contain `@`, so `owner@path` is unambiguous.
    pub fn delegation(domain: &DomainName, path: &RoutePath, owner: &str) -> Self {
        Self::new(
            RecordKind::Delegation,
            domain.as_str(),
            format!("{}@{}", owner, path),
        )
    }

    pub fn app(app: &str) -> Self {
        Self::new(RecordKind::App, app, "")
    }

    pub fn track(app: &str, name: &str) -> Self {
        Self::new(RecordKind::Track, app, name)
    }

    pub fn preference(scope: &Scope, app: &str) -> Self {
        Self::new(RecordKind::Preference, scope.as_key(), app)
    }

    pub fn routing_override(scope: &Scope, kind: OverrideKind, name: &str) -> Self {
        Self::new(
            RecordKind::Override,
            scope.as_key(),
            format!("{}:{}", kind, name),
        )
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.partition, self.id)
    }
}

/// Selection of records of one kind, optionally narrowed by partition and id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSpec {
    pub kind: RecordKind,
    pub partition: Option<String>,
    pub id: Option<String>,
}

impl ScanSpec {
    pub fn kind(kind: RecordKind) -> Self {
        Self {
            kind,
            partition: None,
            id: None,
        }
    }

    pub fn partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = Some(partition.into());
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn matches(&self, key: &StoreKey) -> bool {
        key.kind == self.kind
            && self.partition.as_ref().map_or(true, |p| *p == key.partition)
            && self.id.as_ref().map_or(true, |i| *i == key.id)
    }
}

/// Stored record with its version
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub key: StoreKey,
    pub version: u64,
    pub value: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

/// A write inside an atomic batch
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// `expected = None` requires the key to be absent
    Put {
        key: StoreKey,
        value: serde_json::Value,
        expected: Option<u64>,
    },
    Delete { key: StoreKey, expected: u64 },
}

impl Mutation {
    pub fn key(&self) -> &StoreKey {
        match self {
            Mutation::Put { key, .. } | Mutation::Delete { key, .. } => key,
        }
    }
}

/// Planning function for [`ConfigStore::transact`]: receives the fresh
/// entries selected by the read scans and returns the writes to apply.
pub type TransactionPlan<'a> = dyn Fn(&[Entry]) -> Result<Vec<Mutation>> + Send + Sync + 'a;

/// Counts reported by a domain cascade delete
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct CascadeSummary {
    pub routes: usize,
    pub delegations: usize,
}

impl CascadeSummary {
    fn from_keys(keys: &[StoreKey]) -> Self {
        let count = |kind| keys.iter().filter(|k| k.kind == kind).count();
        Self {
            routes: count(RecordKind::Route),
            delegations: count(RecordKind::Delegation),
        }
    }
}

pub(crate) fn version_conflict(key: &StoreKey) -> AppError {
    AppError::VersionConflict(format!("{} was modified concurrently", key))
}

#[async_trait]
pub trait ConfigStore: Send + Sync + 'static {
    async fn get(&self, key: &StoreKey) -> Result<Option<Entry>>;

    async fn scan(&self, spec: &ScanSpec) -> Result<Vec<Entry>>;

    /// Create (`expected = None`) or replace (`expected = Some(version)`) a record
    async fn put(
        &self,
        key: &StoreKey,
        value: serde_json::Value,
        expected: Option<u64>,
    ) -> Result<Entry>;

    async fn delete(&self, key: &StoreKey, expected: u64) -> Result<()>;

    /// Read `reads`, compute mutations with `plan` against that state, and
    /// apply them atomically. Any version mismatch aborts the whole batch.
    /// Returns the keys written.
    async fn transact(
        &self,
        reads: &[ScanSpec],
        plan: &TransactionPlan<'_>,
    ) -> Result<Vec<StoreKey>>;

    async fn ping(&self) -> Result<()>;

    /// Remove a domain together with all of its routes and delegations
    async fn cascade_delete_domain(&self, domain: &DomainName) -> Result<CascadeSummary> {
        let partition = domain.as_str().to_string();
        let reads = [
            ScanSpec::kind(RecordKind::Domain).partition(partition.clone()),
            ScanSpec::kind(RecordKind::Route).partition(partition.clone()),
            ScanSpec::kind(RecordKind::Delegation).partition(partition),
        ];
        let plan = |entries: &[Entry]| -> Result<Vec<Mutation>> {
            if !entries.iter().any(|e| e.key.kind == RecordKind::Domain) {
                return Err(AppError::NotFound(format!("Domain {} not found", domain)));
            }
            Ok(entries
                .iter()
                .map(|e| Mutation::Delete {
                    key: e.key.clone(),
                    expected: e.version,
                })
                .collect())
        };
        let keys = self.transact(&reads, &plan).await?;
        Ok(CascadeSummary::from_keys(&keys))
    }
}
