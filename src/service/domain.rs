//! Domain, route and delegation management, plus route resolution

use crate::domain::{
    validate_principal_id, AccessSummary, CreateDelegationInput, CreateDomainInput,
    DelegatedDomain, Delegation, Domain, DomainName, EntityRef, Route, RoutePath, SetRouteInput,
    UpdateDomainInput, UserSummary,
};
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::policy::{self, PolicyAction, PolicyInput, ResourceScope};
use crate::repository::records::{decode, decode_all, encode};
use crate::repository::{
    CascadeSummary, ConfigStore, Entry, Mutation, RecordKind, RecordStore, ScanSpec, StoreKey,
    UserDirectory,
};
use crate::resolver::{resolve_route, RouteResolution};
use crate::service::{retry_on_conflict, DEFAULT_RETRY_ATTEMPTS};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::info;
use validator::Validate;

pub struct DomainService<S: ConfigStore, D: UserDirectory> {
    store: Arc<S>,
    directory: Arc<D>,
    retry_attempts: u32,
    search_limit: usize,
}

impl<S: ConfigStore, D: UserDirectory> DomainService<S, D> {
    pub fn new(store: Arc<S>, directory: Arc<D>) -> Self {
        Self {
            store,
            directory,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            search_limit: 20,
        }
    }

    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    pub fn with_search_limit(mut self, limit: usize) -> Self {
        self.search_limit = limit.max(1);
        self
    }

    // ==================== Domains ====================

    /// Register a new domain; returns it with its verification token
    pub async fn create_domain(&self, auth: &AuthUser, input: CreateDomainInput) -> Result<Domain> {
        policy::require_admin(auth)?;
        input.validate()?;
        let name = DomainName::parse(&input.domain)?;

        let domain = Domain::new(name);
        match self.store.save(&domain, None).await {
            Ok(_) => {}
            Err(AppError::VersionConflict(_)) => {
                return Err(AppError::Conflict(format!(
                    "Domain {} already exists",
                    domain.domain
                )))
            }
            Err(e) => return Err(e),
        }

        info!(domain = %domain.domain, "Domain created");
        Ok(domain)
    }

    /// Administrators see every domain; others see the domains they hold
    /// delegations on.
    pub async fn list_domains(&self, auth: &AuthUser) -> Result<Vec<Domain>> {
        let domains = self
            .store
            .list::<Domain>(&ScanSpec::kind(RecordKind::Domain))
            .await?
            .into_iter()
            .map(|v| v.record);

        if auth.is_admin() {
            return Ok(domains.collect());
        }

        let delegated = self.delegations_of(&auth.user_id).await?;
        Ok(domains
            .filter(|d| delegated.iter().any(|g| g.domain == d.domain))
            .collect())
    }

    pub async fn get_domain(&self, auth: &AuthUser, domain: &str) -> Result<Domain> {
        let name = DomainName::parse(domain)?;
        let found = self.load_domain(&name).await?;
        let delegations = self.domain_delegations(&name).await?;
        policy::enforce(
            auth,
            &PolicyInput::new(PolicyAction::RouteRead, ResourceScope::Domain(name)),
            &delegations,
        )?;
        Ok(found)
    }

    /// Update the last-known verification/TLS facts. A no-op update does
    /// not touch `updated_at`.
    pub async fn update_domain(
        &self,
        auth: &AuthUser,
        domain: &str,
        input: UpdateDomainInput,
    ) -> Result<Domain> {
        policy::require_admin(auth)?;
        let name = DomainName::parse(domain)?;

        retry_on_conflict(self.retry_attempts, "update_domain", || {
            self.update_domain_once(&name, &input)
        })
        .await
    }

    async fn update_domain_once(&self, name: &DomainName, input: &UpdateDomainInput) -> Result<Domain> {
        let current = self
            .store
            .load::<Domain>(&StoreKey::domain(name))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Domain {} not found", name)))?;

        let mut domain = current.record;
        if !input.apply_to(&mut domain) {
            return Ok(domain);
        }
        domain.updated_at = Utc::now();
        self.store.save(&domain, Some(current.version)).await?;

        info!(domain = %name, verified = domain.verified, tls = domain.tls, "Domain updated");
        Ok(domain)
    }

    /// Delete a domain with all its routes and delegations
    pub async fn delete_domain(&self, auth: &AuthUser, domain: &str) -> Result<CascadeSummary> {
        policy::require_admin(auth)?;
        let name = DomainName::parse(domain)?;

        let summary = retry_on_conflict(self.retry_attempts, "delete_domain", || {
            self.store.cascade_delete_domain(&name)
        })
        .await?;

        info!(
            domain = %name,
            routes = summary.routes,
            delegations = summary.delegations,
            "Domain deleted"
        );
        Ok(summary)
    }

    // ==================== Routes ====================

    pub async fn list_routes(&self, auth: &AuthUser, domain: &str) -> Result<Vec<Route>> {
        let name = DomainName::parse(domain)?;
        self.load_domain(&name).await?;
        let delegations = self.domain_delegations(&name).await?;
        policy::enforce(
            auth,
            &PolicyInput::new(PolicyAction::RouteRead, ResourceScope::Domain(name.clone())),
            &delegations,
        )?;

        let routes: Vec<Route> = self
            .store
            .list::<Route>(&ScanSpec::kind(RecordKind::Route).partition(name.as_str()))
            .await?
            .into_iter()
            .map(|v| v.record)
            .collect();

        Ok(policy::visible_routes(auth, routes, &delegations))
    }

    /// Create or replace the route at `(domain, input.path)`.
    ///
    /// Identical attributes leave the stored route (and its `updated_at`)
    /// untouched.
    pub async fn set_route(&self, auth: &AuthUser, domain: &str, input: SetRouteInput) -> Result<Route> {
        input.validate()?;
        let name = DomainName::parse(domain)?;
        let path = RoutePath::parse(&input.path)?;
        let entity = EntityRef::parse(&input.entity)?;

        // Fail fast; the write re-checks against the delegations it reads.
        let delegations = self.domain_delegations(&name).await?;
        authorize_route_write(auth, &name, &path, &delegations)?;

        let route = retry_on_conflict(self.retry_attempts, "set_route", || {
            self.set_route_once(auth, &name, &path, &entity, &input)
        })
        .await?;

        info!(domain = %name, path = %path, entity = %route.entity, "Route set");
        Ok(route)
    }

    async fn set_route_once(
        &self,
        auth: &AuthUser,
        name: &DomainName,
        path: &RoutePath,
        entity: &EntityRef,
        input: &SetRouteInput,
    ) -> Result<Route> {
        let key = StoreKey::route(name, path);
        let attrs = input.resolved();
        let now = Utc::now();
        let outcome: Mutex<Option<Route>> = Mutex::new(None);

        // Read the domain and its delegations together with the route so a
        // concurrent domain delete or revocation cannot slip past the write.
        let reads = [
            ScanSpec::kind(RecordKind::Domain).partition(name.as_str()),
            ScanSpec::kind(RecordKind::Delegation).partition(name.as_str()),
            ScanSpec::kind(RecordKind::Route)
                .partition(name.as_str())
                .id(key.id.clone()),
        ];
        let plan = |entries: &[Entry]| -> Result<Vec<Mutation>> {
            let delegations: Vec<Delegation> = decode_all::<Delegation>(entries)?
                .into_iter()
                .map(|v| v.record)
                .collect();
            authorize_route_write(auth, name, path, &delegations)?;

            if !entries.iter().any(|e| e.key.kind == RecordKind::Domain) {
                return Err(AppError::NotFound(format!("Domain {} not found", name)));
            }
            let previous = entries
                .iter()
                .find(|e| e.key == key)
                .map(decode::<Route>)
                .transpose()?;

            if let Some(prev) = &previous {
                if prev.record.matches(entity, &attrs) {
                    keep(&outcome, prev.record.clone())?;
                    return Ok(Vec::new());
                }
            }

            let route = Route {
                domain: name.clone(),
                path: path.clone(),
                entity: entity.clone(),
                context: attrs.context.clone(),
                priority: attrs.priority,
                enabled: attrs.enabled,
                created_at: previous.as_ref().map_or(now, |p| p.record.created_at),
                updated_at: now,
            };
            let value = encode(&route)?;
            keep(&outcome, route)?;
            Ok(vec![Mutation::Put {
                key: key.clone(),
                value,
                expected: previous.map(|p| p.version),
            }])
        };
        self.store.transact(&reads, &plan).await?;

        outcome
            .into_inner()
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Route plan panicked")))?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Route plan produced no record")))
    }

    pub async fn delete_route(&self, auth: &AuthUser, domain: &str, path: &str) -> Result<()> {
        let name = DomainName::parse(domain)?;
        let path = RoutePath::parse(path)?;

        let delegations = self.domain_delegations(&name).await?;
        authorize_route_write(auth, &name, &path, &delegations)?;

        let key = StoreKey::route(&name, &path);
        let reads = [
            ScanSpec::kind(RecordKind::Delegation).partition(name.as_str()),
            ScanSpec::kind(RecordKind::Route)
                .partition(name.as_str())
                .id(key.id.clone()),
        ];
        let plan = |entries: &[Entry]| -> Result<Vec<Mutation>> {
            let delegations: Vec<Delegation> = decode_all::<Delegation>(entries)?
                .into_iter()
                .map(|v| v.record)
                .collect();
            authorize_route_write(auth, &name, &path, &delegations)?;

            let current = entries
                .iter()
                .find(|e| e.key == key)
                .ok_or_else(|| AppError::NotFound(format!("No route at {}{}", name, path)))?;
            Ok(vec![Mutation::Delete {
                key: key.clone(),
                expected: current.version,
            }])
        };
        retry_on_conflict(self.retry_attempts, "delete_route", || {
            self.store.transact(&reads, &plan)
        })
        .await?;

        info!(domain = %name, path = %path, "Route deleted");
        Ok(())
    }

    /// Resolve `(domain, path)` to its route. Unknown domains and
    /// unmatched paths are `NoMatch`.
    pub async fn resolve_route(&self, domain: &str, path: &str) -> Result<RouteResolution> {
        let name = DomainName::parse(domain)?;
        let path = RoutePath::parse(path)?;

        let candidates: Vec<Route> = self
            .store
            .list::<Route>(&ScanSpec::kind(RecordKind::Route).partition(name.as_str()))
            .await?
            .into_iter()
            .map(|v| v.record)
            .collect();

        let resolution = resolve_route(&candidates, &path);
        metrics::counter!(
            "routing_resolutions_total",
            "kind" => "route",
            "outcome" => resolution.outcome()
        )
        .increment(1);
        Ok(resolution)
    }

    // ==================== Delegations ====================

    pub async fn list_delegations(&self, auth: &AuthUser, domain: &str) -> Result<Vec<Delegation>> {
        policy::require_admin(auth)?;
        let name = DomainName::parse(domain)?;
        self.load_domain(&name).await?;
        self.domain_delegations(&name).await
    }

    pub async fn create_delegation(
        &self,
        auth: &AuthUser,
        domain: &str,
        input: CreateDelegationInput,
    ) -> Result<Delegation> {
        policy::require_admin(auth)?;
        let name = DomainName::parse(domain)?;
        let path = RoutePath::parse(&input.path)?;
        let owner = input.owner.trim().to_string();
        validate_principal_id(&owner)?;

        if self.directory.find(&owner).await?.is_none() {
            return Err(AppError::NotFound(format!("User {} not found", owner)));
        }

        let delegation = Delegation::new(name.clone(), path.clone(), owner.clone());
        let key = StoreKey::delegation(&name, &path, &owner);
        let reads = [
            ScanSpec::kind(RecordKind::Domain).partition(name.as_str()),
            ScanSpec::kind(RecordKind::Delegation)
                .partition(name.as_str())
                .id(key.id.clone()),
        ];
        let plan = |entries: &[Entry]| -> Result<Vec<Mutation>> {
            if !entries.iter().any(|e| e.key.kind == RecordKind::Domain) {
                return Err(AppError::NotFound(format!("Domain {} not found", name)));
            }
            if entries.iter().any(|e| e.key == key) {
                return Err(AppError::Conflict(format!(
                    "{} already holds a delegation on {}{}",
                    owner, name, path
                )));
            }
            Ok(vec![Mutation::Put {
                key: key.clone(),
                value: encode(&delegation)?,
                expected: None,
            }])
        };

        retry_on_conflict(self.retry_attempts, "create_delegation", || {
            self.store.transact(&reads, &plan)
        })
        .await?;

        info!(domain = %name, path = %path, owner = %owner, "Delegation created");
        Ok(delegation)
    }

    pub async fn delete_delegation(
        &self,
        auth: &AuthUser,
        domain: &str,
        path: &str,
        owner: &str,
    ) -> Result<()> {
        policy::require_admin(auth)?;
        let name = DomainName::parse(domain)?;
        let path = RoutePath::parse(path)?;
        let key = StoreKey::delegation(&name, &path, owner);

        retry_on_conflict(self.retry_attempts, "delete_delegation", || async {
            let current = self.store.get(&key).await?.ok_or_else(|| {
                AppError::NotFound(format!("No delegation for {} on {}{}", owner, name, path))
            })?;
            self.store.delete(&key, current.version).await
        })
        .await?;

        info!(domain = %name, path = %path, owner = %owner, "Delegation deleted");
        Ok(())
    }

    // ==================== Users & navigation ====================

    /// Directory search for the delegation owner picker
    pub async fn search_users(&self, auth: &AuthUser, query: &str) -> Result<Vec<UserSummary>> {
        policy::require_admin(auth)?;
        self.directory.search(query, self.search_limit).await
    }

    /// Navigation data for `auth`: admin flag and delegated domains/paths
    pub async fn access_summary(&self, auth: &AuthUser) -> Result<AccessSummary> {
        let mut grouped: BTreeMap<DomainName, Vec<String>> = BTreeMap::new();
        for delegation in self.delegations_of(&auth.user_id).await? {
            grouped
                .entry(delegation.domain)
                .or_default()
                .push(delegation.path.to_string());
        }

        Ok(AccessSummary {
            user_id: auth.user_id.clone(),
            administrator: auth.is_admin(),
            domains: grouped
                .into_iter()
                .map(|(domain, mut paths)| {
                    paths.sort();
                    DelegatedDomain { domain, paths }
                })
                .collect(),
        })
    }

    // ==================== Helpers ====================

    async fn load_domain(&self, name: &DomainName) -> Result<Domain> {
        self.store
            .load::<Domain>(&StoreKey::domain(name))
            .await?
            .map(|v| v.record)
            .ok_or_else(|| AppError::NotFound(format!("Domain {} not found", name)))
    }

    async fn domain_delegations(&self, name: &DomainName) -> Result<Vec<Delegation>> {
        Ok(self
            .store
            .list::<Delegation>(&ScanSpec::kind(RecordKind::Delegation).partition(name.as_str()))
            .await?
            .into_iter()
            .map(|v| v.record)
            .collect())
    }

    async fn delegations_of(&self, user_id: &str) -> Result<Vec<Delegation>> {
        Ok(self
            .store
            .list::<Delegation>(&ScanSpec::kind(RecordKind::Delegation))
            .await?
            .into_iter()
            .map(|v| v.record)
            .filter(|d| d.owner == user_id)
            .collect())
    }
}

fn authorize_route_write(
    auth: &AuthUser,
    name: &DomainName,
    path: &RoutePath,
    delegations: &[Delegation],
) -> Result<()> {
    policy::enforce(
        auth,
        &PolicyInput::new(
            PolicyAction::RouteWrite,
            ResourceScope::Route(name.clone(), path.clone()),
        ),
        delegations,
    )
}

/// Record what the last run of a transaction plan decided
fn keep(slot: &Mutex<Option<Route>>, route: Route) -> Result<()> {
    let mut slot = slot
        .lock()
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Route plan panicked")))?;
    *slot = Some(route);
    Ok(())
}
