//! Removal of installed versions nothing refers to any more

use crate::domain::{App, Track, VersionPreference};
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::policy;
use crate::repository::records::{decode, decode_all, encode};
use crate::repository::{
    ConfigStore, Entry, Mutation, RecordKind, RecordStore, ScanSpec, StoreKey,
};
use crate::resolver::unused_versions;
use crate::service::{retry_on_conflict, DEFAULT_RETRY_ATTEMPTS};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};
use utoipa::ToSchema;

/// Versions removed from one app
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CleanupReport {
    pub app: String,
    pub removed: Vec<String>,
}

impl CleanupReport {
    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }
}

pub struct CleanupCoordinator<S: ConfigStore> {
    store: Arc<S>,
    retry_attempts: u32,
}

impl<S: ConfigStore> CleanupCoordinator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        }
    }

    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    /// Everything that must be re-read before removing a version of `app_id`
    fn reads(app_id: &str) -> [ScanSpec; 3] {
        [
            ScanSpec::kind(RecordKind::App).partition(app_id),
            ScanSpec::kind(RecordKind::Preference).id(app_id),
            ScanSpec::kind(RecordKind::Track).partition(app_id),
        ]
    }

    /// Installed versions of `app_id` not pinned, not tracked and not the highest
    pub async fn find_unused_versions(&self, app_id: &str) -> Result<Vec<String>> {
        let app = self
            .store
            .load::<App>(&StoreKey::app(app_id))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("App {} not found", app_id)))?
            .record;
        let preferences: Vec<VersionPreference> = self
            .store
            .list::<VersionPreference>(&ScanSpec::kind(RecordKind::Preference).id(app_id))
            .await?
            .into_iter()
            .map(|v| v.record)
            .collect();
        let tracks: Vec<Track> = self
            .store
            .list::<Track>(&ScanSpec::kind(RecordKind::Track).partition(app_id))
            .await?
            .into_iter()
            .map(|v| v.record)
            .collect();

        Ok(unused_versions(&app, &preferences, &tracks))
    }

    /// Remove `version` from `app_id` if, against fresh state, it is still
    /// unused. Returns whether it was removed.
    pub async fn remove_if_unused(&self, app_id: &str, version: &str) -> Result<bool> {
        let reads = Self::reads(app_id);
        let plan = |entries: &[Entry]| -> Result<Vec<Mutation>> {
            let app_entry = match entries.iter().find(|e| e.key.kind == RecordKind::App) {
                Some(entry) => entry,
                None => return Ok(Vec::new()),
            };
            let current = decode::<App>(app_entry)?;
            let preferences: Vec<VersionPreference> = decode_all::<VersionPreference>(entries)?
                .into_iter()
                .map(|v| v.record)
                .collect();
            let tracks: Vec<Track> = decode_all::<Track>(entries)?
                .into_iter()
                .map(|v| v.record)
                .collect();

            let unused = unused_versions(&current.record, &preferences, &tracks);
            if !unused.iter().any(|v| v == version) {
                return Ok(Vec::new());
            }

            let mut app = current.record;
            app.versions.retain(|v| v != version);
            app.updated_at = Utc::now();
            Ok(vec![Mutation::Put {
                key: app_entry.key.clone(),
                value: encode(&app)?,
                expected: Some(current.version),
            }])
        };

        let written = retry_on_conflict(self.retry_attempts, "cleanup_version", || {
            self.store.transact(&reads, &plan)
        })
        .await?;
        Ok(!written.is_empty())
    }

    async fn cleanup_app(&self, app_id: &str) -> Result<CleanupReport> {
        let candidates = self.find_unused_versions(app_id).await?;
        let mut removed = Vec::new();
        for version in candidates {
            if self.remove_if_unused(app_id, &version).await? {
                removed.push(version);
            } else {
                debug!(app = %app_id, version = %version, "Version became referenced, kept");
            }
        }

        if !removed.is_empty() {
            metrics::counter!("routing_cleanup_removed_versions_total")
                .increment(removed.len() as u64);
            info!(app = %app_id, removed = ?removed, "Unused versions removed");
        }
        Ok(CleanupReport {
            app: app_id.to_string(),
            removed,
        })
    }

    pub async fn cleanup_unused_versions(
        &self,
        auth: &AuthUser,
        app_id: &str,
    ) -> Result<CleanupReport> {
        policy::require_admin(auth)?;
        self.cleanup_app(app_id).await
    }

    /// Clean every registered app. Used by the periodic task, which runs
    /// without a principal.
    pub async fn cleanup_all(&self) -> Result<Vec<CleanupReport>> {
        let apps = self
            .store
            .list::<App>(&ScanSpec::kind(RecordKind::App))
            .await?;

        let mut reports = Vec::with_capacity(apps.len());
        for app in apps {
            match self.cleanup_app(&app.record.id).await {
                Ok(report) => reports.push(report),
                // Unregistered between listing and cleaning
                Err(AppError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(reports)
    }

    pub async fn cleanup_all_as(&self, auth: &AuthUser) -> Result<Vec<CleanupReport>> {
        policy::require_admin(auth)?;
        self.cleanup_all().await
    }
}
