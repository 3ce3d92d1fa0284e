//! App registry, tracks, version preferences and routing overrides

use crate::domain::{
    validate_app_id, validate_capability_name, validate_principal_id, validate_track_name,
    validate_version, App, AppDetail, AppSummary, OverrideKind, RegisterAppInput, RoutingOverride,
    RoutingTable, Scope, SetOverrideInput, SetTrackInput, SetVersionPreferenceInput, Track,
    UserApps, VersionChoice, VersionPreference,
};
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::policy::{self, PolicyAction, PolicyInput, ResourceScope};
use crate::repository::{
    ConfigStore, Entry, Mutation, RecordKind, RecordStore, ScanSpec, StoreKey,
};
use crate::resolver::{
    resolve_override, resolve_version, sort_versions, OverrideResolution, VersionResolution,
};
use crate::service::{retry_on_conflict, DEFAULT_RETRY_ATTEMPTS};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

pub struct AppService<S: ConfigStore> {
    store: Arc<S>,
    retry_attempts: u32,
}

impl<S: ConfigStore> AppService<S> {
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

    // ==================== Apps ====================

    /// Upsert an installed app as reported by the installer
    pub async fn register_app(&self, auth: &AuthUser, input: RegisterAppInput) -> Result<App> {
        policy::require_admin(auth)?;
        input.validate()?;
        for version in &input.versions {
            validate_version(version)?;
        }
        let mut versions = input.versions.clone();
        sort_versions(&mut versions);

        let app = App {
            id: input.id.clone(),
            label: input.label.clone(),
            versions,
            classes: input.classes.clone(),
            services: input.services.clone(),
            paths: input.paths.clone(),
            updated_at: Utc::now(),
        };

        retry_on_conflict(self.retry_attempts, "register_app", || async {
            let current = self.store.get(&StoreKey::app(&app.id)).await?;
            self.store.save(&app, current.map(|e| e.version)).await
        })
        .await?;

        info!(app = %app.id, versions = ?app.versions, "App registered");
        Ok(app)
    }

    /// Apps with the version each would run for `auth` (or the system
    /// default when anonymous)
    pub async fn list_apps(&self, auth: Option<&AuthUser>) -> Result<Vec<AppSummary>> {
        let apps = self.all_apps().await?;
        let tracks = self.records::<Track>(ScanSpec::kind(RecordKind::Track)).await?;
        let system = self.preferences(&Scope::System).await?;
        let user = match auth {
            Some(auth) => self.preferences(&Scope::user(&auth.user_id)).await?,
            None => BTreeMap::new(),
        };

        Ok(apps
            .into_iter()
            .map(|app| {
                let app_tracks: Vec<Track> =
                    tracks.iter().filter(|t| t.app == app.id).cloned().collect();
                let version = resolve_version(
                    &app,
                    &app_tracks,
                    system.get(&app.id),
                    user.get(&app.id),
                )
                .map(|r| r.version);
                AppSummary {
                    id: app.id,
                    label: app.label,
                    version,
                    versions: app.versions,
                    classes: app.classes,
                    services: app.services,
                    paths: app.paths,
                }
            })
            .collect())
    }

    pub async fn get_app(&self, app_id: &str) -> Result<AppDetail> {
        let app = self.load_app(app_id).await?;
        let tracks = self.app_tracks(app_id).await?;
        let default = self
            .store
            .load::<VersionPreference>(&StoreKey::preference(&Scope::System, app_id))
            .await?
            .map(|v| v.record.choice);

        Ok(AppDetail {
            app: app.id,
            versions: app.versions,
            tracks: tracks.into_iter().map(|t| (t.name, t.version)).collect(),
            default,
        })
    }

    // ==================== Tracks ====================

    /// Point `track` at an installed version of `app`
    pub async fn set_track(
        &self,
        auth: &AuthUser,
        app_id: &str,
        track: &str,
        input: SetTrackInput,
    ) -> Result<Track> {
        policy::require_admin(auth)?;
        validate_track_name(track)?;
        validate_version(&input.version)?;

        let record = retry_on_conflict(self.retry_attempts, "set_track", || async {
            let app = self.load_app(app_id).await?;
            if !app.is_installed(&input.version) {
                return Err(AppError::Validation(format!(
                    "Version {} of {} is not installed",
                    input.version, app_id
                )));
            }
            let key = StoreKey::track(app_id, track);
            let current = self.store.load::<Track>(&key).await?;
            if let Some(current) = &current {
                if current.record.version == input.version {
                    return Ok(current.record.clone());
                }
            }
            let record = Track {
                app: app_id.to_string(),
                name: track.to_string(),
                version: input.version.clone(),
                updated_at: Utc::now(),
            };
            self.store.save(&record, current.map(|c| c.version)).await?;
            Ok(record)
        })
        .await?;

        info!(app = %app_id, track = %track, version = %record.version, "Track set");
        Ok(record)
    }

    pub async fn delete_track(&self, auth: &AuthUser, app_id: &str, track: &str) -> Result<()> {
        policy::require_admin(auth)?;
        let key = StoreKey::track(app_id, track);
        retry_on_conflict(self.retry_attempts, "delete_track", || async {
            let current = self.store.get(&key).await?.ok_or_else(|| {
                AppError::NotFound(format!("Track {} of {} not found", track, app_id))
            })?;
            self.store.delete(&key, current.version).await
        })
        .await?;

        info!(app = %app_id, track = %track, "Track deleted");
        Ok(())
    }

    // ==================== Version preferences ====================

    /// Set (or, with neither field, clear) the preference of `scope` for
    /// `app`. The version must be installed and the track must exist now;
    /// later changes make the preference fall through at resolve time.
    pub async fn set_version_preference(
        &self,
        auth: &AuthUser,
        scope: Scope,
        app_id: &str,
        input: SetVersionPreferenceInput,
    ) -> Result<Option<VersionPreference>> {
        self.enforce_scope(auth, &scope)?;
        validate_app_id(app_id)?;

        let choice = match input.into_choice()? {
            Some(choice) => choice,
            None => {
                self.clear_version_preference(auth, scope, app_id).await?;
                return Ok(None);
            }
        };

        let key = StoreKey::preference(&scope, app_id);
        let preference = retry_on_conflict(self.retry_attempts, "set_version_preference", || async {
            let app = self.load_app(app_id).await?;
            match &choice {
                VersionChoice::Version(v) if !app.is_installed(v) => {
                    return Err(AppError::Validation(format!(
                        "Version {} of {} is not installed",
                        v, app_id
                    )));
                }
                VersionChoice::Track(t) => {
                    if self.store.get(&StoreKey::track(app_id, t)).await?.is_none() {
                        return Err(AppError::Validation(format!(
                            "Track {} of {} does not exist",
                            t, app_id
                        )));
                    }
                }
                VersionChoice::Version(_) => {}
            }

            let current = self.store.load::<VersionPreference>(&key).await?;
            if let Some(current) = &current {
                if current.record.choice == choice {
                    return Ok(current.record.clone());
                }
            }
            let preference = VersionPreference {
                scope: scope.clone(),
                app: app_id.to_string(),
                choice: choice.clone(),
                updated_at: Utc::now(),
            };
            self.store
                .save(&preference, current.map(|c| c.version))
                .await?;
            Ok(preference)
        })
        .await?;

        info!(scope = %scope, app = %app_id, choice = ?preference.choice, "Version preference set");
        Ok(Some(preference))
    }

    /// Remove a preference; clearing an absent preference succeeds
    pub async fn clear_version_preference(
        &self,
        auth: &AuthUser,
        scope: Scope,
        app_id: &str,
    ) -> Result<()> {
        self.enforce_scope(auth, &scope)?;
        let key = StoreKey::preference(&scope, app_id);
        let removed = retry_on_conflict(self.retry_attempts, "clear_version_preference", || async {
            match self.store.get(&key).await? {
                Some(current) => {
                    self.store.delete(&key, current.version).await?;
                    Ok::<_, AppError>(true)
                }
                None => Ok(false),
            }
        })
        .await?;

        if removed {
            info!(scope = %scope, app = %app_id, "Version preference cleared");
        }
        Ok(())
    }

    /// Version of `app` for `auth`, following the preference cascade
    pub async fn resolve_version(
        &self,
        auth: Option<&AuthUser>,
        app_id: &str,
    ) -> Result<VersionResolution> {
        let app = self.load_app(app_id).await?;
        let tracks = self.app_tracks(app_id).await?;
        let system = self
            .store
            .load::<VersionPreference>(&StoreKey::preference(&Scope::System, app_id))
            .await?
            .map(|v| v.record);
        let user = match auth {
            Some(auth) => self
                .store
                .load::<VersionPreference>(&StoreKey::preference(
                    &Scope::user(&auth.user_id),
                    app_id,
                ))
                .await?
                .map(|v| v.record),
            None => None,
        };

        let resolution = resolve_version(&app, &tracks, system.as_ref(), user.as_ref());
        let outcome = resolution.as_ref().map_or("none", |r| r.source.as_str());
        metrics::counter!("routing_resolutions_total", "kind" => "version", "outcome" => outcome)
            .increment(1);

        resolution
            .ok_or_else(|| AppError::NotFound(format!("App {} has no installed versions", app_id)))
    }

    // ==================== Routing overrides ====================

    pub async fn set_override(
        &self,
        auth: &AuthUser,
        scope: Scope,
        input: SetOverrideInput,
    ) -> Result<RoutingOverride> {
        self.enforce_scope(auth, &scope)?;
        validate_capability_name(&input.name)?;
        validate_app_id(&input.app)?;

        let key = StoreKey::routing_override(&scope, input.kind, &input.name);
        let record = retry_on_conflict(self.retry_attempts, "set_override", || async {
            self.load_app(&input.app).await?;
            let current = self.store.load::<RoutingOverride>(&key).await?;
            if let Some(current) = &current {
                if current.record.app == input.app {
                    return Ok(current.record.clone());
                }
            }
            let record = RoutingOverride {
                scope: scope.clone(),
                kind: input.kind,
                name: input.name.clone(),
                app: input.app.clone(),
                updated_at: Utc::now(),
            };
            self.store.save(&record, current.map(|c| c.version)).await?;
            Ok::<_, AppError>(record)
        })
        .await?;

        info!(scope = %scope, kind = %input.kind, name = %input.name, app = %input.app, "Override set");
        Ok(record)
    }

    pub async fn delete_override(
        &self,
        auth: &AuthUser,
        scope: Scope,
        kind: OverrideKind,
        name: &str,
    ) -> Result<()> {
        self.enforce_scope(auth, &scope)?;
        let key = StoreKey::routing_override(&scope, kind, name);
        retry_on_conflict(self.retry_attempts, "delete_override", || async {
            let current = self
                .store
                .get(&key)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("No {} override for {}", kind, name)))?;
            self.store.delete(&key, current.version).await
        })
        .await?;

        info!(scope = %scope, kind = %kind, name = %name, "Override deleted");
        Ok(())
    }

    /// App serving `(kind, name)` for `auth`; ambiguity is a value here
    pub async fn resolve_override(
        &self,
        auth: Option<&AuthUser>,
        kind: OverrideKind,
        name: &str,
    ) -> Result<OverrideResolution> {
        validate_capability_name(name)?;
        let apps = self.all_apps().await?;
        let system = self
            .store
            .load::<RoutingOverride>(&StoreKey::routing_override(&Scope::System, kind, name))
            .await?
            .map(|v| v.record);
        let user = match auth {
            Some(auth) => self
                .store
                .load::<RoutingOverride>(&StoreKey::routing_override(
                    &Scope::user(&auth.user_id),
                    kind,
                    name,
                ))
                .await?
                .map(|v| v.record),
            None => None,
        };

        let resolution = resolve_override(kind, name, &apps, system.as_ref(), user.as_ref());
        metrics::counter!(
            "routing_resolutions_total",
            "kind" => "override",
            "outcome" => resolution.outcome()
        )
        .increment(1);
        Ok(resolution)
    }

    /// Overrides of one scope grouped by kind
    pub async fn routing_table(&self, scope: &Scope) -> Result<RoutingTable> {
        let overrides = self
            .records::<RoutingOverride>(
                ScanSpec::kind(RecordKind::Override).partition(scope.as_key()),
            )
            .await?;
        Ok(RoutingTable::from_overrides(&overrides))
    }

    // ==================== Per-user view ====================

    pub async fn user_apps(&self, auth: &AuthUser) -> Result<UserApps> {
        let scope = Scope::user(&auth.user_id);
        let apps = self.list_apps(Some(auth)).await?;
        let preferences = self
            .preferences(&scope)
            .await?
            .into_iter()
            .map(|(app, p)| (app, p.choice))
            .collect();
        let overrides = self.routing_table(&scope).await?;

        Ok(UserApps {
            apps,
            preferences,
            overrides,
        })
    }

    /// Drop every version preference and override of one user atomically.
    /// Returns the number of records removed.
    pub async fn reset_user(&self, auth: &AuthUser, user_id: &str) -> Result<usize> {
        validate_principal_id(user_id)?;
        let scope = Scope::user(user_id);
        self.enforce_scope(auth, &scope)?;

        let reads = [
            ScanSpec::kind(RecordKind::Preference).partition(scope.as_key()),
            ScanSpec::kind(RecordKind::Override).partition(scope.as_key()),
        ];
        let plan = |entries: &[Entry]| -> Result<Vec<Mutation>> {
            Ok(entries
                .iter()
                .map(|e| Mutation::Delete {
                    key: e.key.clone(),
                    expected: e.version,
                })
                .collect())
        };
        let removed = retry_on_conflict(self.retry_attempts, "reset_user", || {
            self.store.transact(&reads, &plan)
        })
        .await?;

        info!(user = %user_id, removed = removed.len(), "User app settings reset");
        Ok(removed.len())
    }

    // ==================== Helpers ====================

    fn enforce_scope(&self, auth: &AuthUser, scope: &Scope) -> Result<()> {
        policy::enforce(
            auth,
            &PolicyInput::new(
                PolicyAction::PreferenceWrite,
                ResourceScope::Preference(scope.clone()),
            ),
            &[],
        )
    }

    async fn records<T: crate::repository::Record>(&self, spec: ScanSpec) -> Result<Vec<T>> {
        Ok(self
            .store
            .list::<T>(&spec)
            .await?
            .into_iter()
            .map(|v| v.record)
            .collect())
    }

    async fn all_apps(&self) -> Result<Vec<App>> {
        self.records::<App>(ScanSpec::kind(RecordKind::App)).await
    }

    async fn load_app(&self, app_id: &str) -> Result<App> {
        self.store
            .load::<App>(&StoreKey::app(app_id))
            .await?
            .map(|v| v.record)
            .ok_or_else(|| AppError::NotFound(format!("App {} not found", app_id)))
    }

    async fn app_tracks(&self, app_id: &str) -> Result<Vec<Track>> {
        self.records::<Track>(ScanSpec::kind(RecordKind::Track).partition(app_id))
            .await
    }

    /// Preferences of one scope keyed by app id
    async fn preferences(&self, scope: &Scope) -> Result<BTreeMap<String, VersionPreference>> {
        Ok(self
            .records::<VersionPreference>(
                ScanSpec::kind(RecordKind::Preference).partition(scope.as_key()),
            )
            .await?
            .into_iter()
            .map(|p| (p.app.clone(), p))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;
    use crate::repository::MemoryConfigStore;
    use crate::resolver::{OverrideSource, VersionSource};
    use pretty_assertions::assert_eq;

    fn admin() -> AuthUser {
        AuthUser {
            user_id: "1".to_string(),
            role: Role::Administrator,
        }
    }

    fn user(id: &str) -> AuthUser {
        AuthUser {
            user_id: id.to_string(),
            role: Role::User,
        }
    }

    fn register(id: &str, versions: &[&str], services: &[&str]) -> RegisterAppInput {
        RegisterAppInput {
            id: id.to_string(),
            label: String::new(),
            versions: versions.iter().map(|v| v.to_string()).collect(),
            classes: Default::default(),
            services: services.iter().map(|s| s.to_string()).collect(),
            paths: Default::default(),
        }
    }

    async fn service_with_foo() -> AppService<MemoryConfigStore> {
        let svc = AppService::new(Arc::new(MemoryConfigStore::new()));
        svc.register_app(&admin(), register("foo", &["3.0", "1.0", "2.0"], &[]))
            .await
            .unwrap();
        svc
    }

    fn pin(version: &str) -> SetVersionPreferenceInput {
        SetVersionPreferenceInput {
            version: Some(version.to_string()),
            track: None,
        }
    }

    fn follow(track: &str) -> SetVersionPreferenceInput {
        SetVersionPreferenceInput {
            version: None,
            track: Some(track.to_string()),
        }
    }

    #[tokio::test]
    async fn test_register_sorts_versions() {
        let svc = service_with_foo().await;
        let detail = svc.get_app("foo").await.unwrap();
        assert_eq!(detail.versions, vec!["1.0", "2.0", "3.0"]);
        assert_eq!(detail.default, None);
    }

    #[tokio::test]
    async fn test_system_track_preference_then_clear() {
        let svc = service_with_foo().await;
        svc.set_track(
            &admin(),
            "foo",
            "stable",
            SetTrackInput {
                version: "2.0".to_string(),
            },
        )
        .await
        .unwrap();
        svc.set_version_preference(&admin(), Scope::System, "foo", follow("stable"))
            .await
            .unwrap();

        let r = svc.resolve_version(None, "foo").await.unwrap();
        assert_eq!((r.version.as_str(), r.source), ("2.0", VersionSource::SystemTrack));

        svc.clear_version_preference(&admin(), Scope::System, "foo")
            .await
            .unwrap();
        let r = svc.resolve_version(None, "foo").await.unwrap();
        assert_eq!((r.version.as_str(), r.source), ("3.0", VersionSource::Highest));
    }

    #[tokio::test]
    async fn test_preference_validation() {
        let svc = service_with_foo().await;
        assert!(matches!(
            svc.set_version_preference(&admin(), Scope::System, "foo", pin("9.9"))
                .await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            svc.set_version_preference(&admin(), Scope::System, "foo", follow("nightly"))
                .await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            svc.set_version_preference(&admin(), Scope::System, "bar", pin("1.0"))
                .await,
            Err(AppError::NotFound(_))
        ));
        let both = SetVersionPreferenceInput {
            version: Some("1.0".into()),
            track: Some("stable".into()),
        };
        assert!(matches!(
            svc.set_version_preference(&admin(), Scope::System, "foo", both)
                .await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_user_scope_permissions() {
        let svc = service_with_foo().await;
        assert!(svc
            .set_version_preference(&user("7"), Scope::user("7"), "foo", pin("1.0"))
            .await
            .is_ok());
        assert!(matches!(
            svc.set_version_preference(&user("7"), Scope::user("8"), "foo", pin("1.0"))
                .await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            svc.set_version_preference(&user("7"), Scope::System, "foo", pin("1.0"))
                .await,
            Err(AppError::Forbidden(_))
        ));

        let r = svc.resolve_version(Some(&user("7")), "foo").await.unwrap();
        assert_eq!(r.source, VersionSource::UserPin);
        let r = svc.resolve_version(Some(&user("8")), "foo").await.unwrap();
        assert_eq!(r.source, VersionSource::Highest);
    }

    #[tokio::test]
    async fn test_empty_input_clears_preference() {
        let svc = service_with_foo().await;
        svc.set_version_preference(&user("7"), Scope::user("7"), "foo", pin("1.0"))
            .await
            .unwrap();
        let cleared = svc
            .set_version_preference(
                &user("7"),
                Scope::user("7"),
                "foo",
                SetVersionPreferenceInput::default(),
            )
            .await
            .unwrap();
        assert!(cleared.is_none());
        let r = svc.resolve_version(Some(&user("7")), "foo").await.unwrap();
        assert_eq!(r.version, "3.0");
    }

    #[tokio::test]
    async fn test_unknown_app_resolution() {
        let svc = service_with_foo().await;
        assert!(matches!(
            svc.resolve_version(None, "nope").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_override_cascade_and_reset() {
        let svc = service_with_foo().await;
        svc.register_app(&admin(), register("talk", &["1.0"], &["chat"]))
            .await
            .unwrap();
        svc.register_app(&admin(), register("irc", &["1.0"], &["chat"]))
            .await
            .unwrap();

        let r = svc
            .resolve_override(None, OverrideKind::Service, "chat")
            .await
            .unwrap();
        assert!(matches!(r, OverrideResolution::Ambiguous { .. }));

        svc.set_override(
            &admin(),
            Scope::System,
            SetOverrideInput {
                kind: OverrideKind::Service,
                name: "chat".to_string(),
                app: "irc".to_string(),
            },
        )
        .await
        .unwrap();
        svc.set_override(
            &user("7"),
            Scope::user("7"),
            SetOverrideInput {
                kind: OverrideKind::Service,
                name: "chat".to_string(),
                app: "talk".to_string(),
            },
        )
        .await
        .unwrap();

        let r = svc
            .resolve_override(Some(&user("7")), OverrideKind::Service, "chat")
            .await
            .unwrap();
        assert_eq!(
            r,
            OverrideResolution::Resolved {
                app: "talk".to_string(),
                source: OverrideSource::User
            }
        );

        let table = svc.user_apps(&user("7")).await.unwrap().overrides;
        assert_eq!(table.services.get("chat").map(String::as_str), Some("talk"));

        assert_eq!(svc.reset_user(&user("7"), "7").await.unwrap(), 1);
        let r = svc
            .resolve_override(Some(&user("7")), OverrideKind::Service, "chat")
            .await
            .unwrap();
        assert_eq!(
            r,
            OverrideResolution::Resolved {
                app: "irc".to_string(),
                source: OverrideSource::System
            }
        );
    }

    #[tokio::test]
    async fn test_override_requires_registered_app() {
        let svc = service_with_foo().await;
        let result = svc
            .set_override(
                &admin(),
                Scope::System,
                SetOverrideInput {
                    kind: OverrideKind::Class,
                    name: "wiki".to_string(),
                    app: "ghost".to_string(),
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_apps_resolves_per_user() {
        let svc = service_with_foo().await;
        svc.set_version_preference(&user("7"), Scope::user("7"), "foo", pin("1.0"))
            .await
            .unwrap();
        let mine = svc.list_apps(Some(&user("7"))).await.unwrap();
        let anon = svc.list_apps(None).await.unwrap();
        assert_eq!(mine[0].version.as_deref(), Some("1.0"));
        assert_eq!(anon[0].version.as_deref(), Some("3.0"));
    }
}
