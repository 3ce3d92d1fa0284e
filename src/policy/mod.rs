//! Delegation authority: who may read or change which routing scope.
//!
//! Administrators may do everything. Everyone else acts only through
//! delegations, which grant route management over a path prefix of one
//! domain. A delegation never grants domain settings or the right to
//! manage other delegations.

use crate::domain::{Delegation, DomainName, Route, RoutePath, Scope};
use crate::error::AppError;
use crate::middleware::auth::AuthUser;

pub type PolicyResult<T> = std::result::Result<T, AppError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyAction {
    /// Domain lifecycle, delegation management, tracks, app registration, cleanup
    PlatformAdmin,
    /// List routes of a domain
    RouteRead,
    /// Create, replace or delete a route
    RouteWrite,
    /// Set or clear a version preference or routing override
    PreferenceWrite,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceScope {
    Global,
    Domain(DomainName),
    Route(DomainName, RoutePath),
    Preference(Scope),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyInput {
    pub action: PolicyAction,
    pub scope: ResourceScope,
}

impl PolicyInput {
    pub fn new(action: PolicyAction, scope: ResourceScope) -> Self {
        Self { action, scope }
    }
}

/// Check `input` for `auth`. `delegations` must hold the delegations of the
/// domain named by the scope; it is ignored for other scopes.
pub fn enforce(auth: &AuthUser, input: &PolicyInput, delegations: &[Delegation]) -> PolicyResult<()> {
    if auth.is_admin() {
        return Ok(());
    }

    match (&input.action, &input.scope) {
        (PolicyAction::PlatformAdmin, _) => require_admin(auth),
        (PolicyAction::RouteRead, ResourceScope::Domain(domain)) => {
            if can_read(auth, domain, delegations) {
                Ok(())
            } else {
                Err(AppError::Forbidden(format!(
                    "No delegation on domain {}",
                    domain
                )))
            }
        }
        (PolicyAction::RouteWrite, ResourceScope::Route(domain, path)) => {
            if can_mutate(auth, domain, path, delegations) {
                Ok(())
            } else {
                Err(AppError::Forbidden(format!(
                    "Not allowed to change routes at {}{}",
                    domain, path
                )))
            }
        }
        (PolicyAction::PreferenceWrite, ResourceScope::Preference(scope)) => {
            require_scope_owner(auth, scope)
        }
        (action, scope) => Err(AppError::Internal(anyhow::anyhow!(
            "Policy action {:?} does not apply to scope {:?}",
            action,
            scope
        ))),
    }
}

pub fn require_admin(auth: &AuthUser) -> PolicyResult<()> {
    if auth.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden("Administrator role required".to_string()))
    }
}

/// Whether `auth` may change the route at `(domain, path)`.
///
/// True for administrators, and for holders of a delegation on `domain`
/// whose path is a segment-wise prefix of `path`.
pub fn can_mutate(
    auth: &AuthUser,
    domain: &DomainName,
    path: &RoutePath,
    delegations: &[Delegation],
) -> bool {
    auth.is_admin()
        || delegations.iter().any(|d| {
            d.owner == auth.user_id && &d.domain == domain && d.path.is_prefix_of(path)
        })
}

/// Whether `auth` may see the routes of `domain` at all
pub fn can_read(auth: &AuthUser, domain: &DomainName, delegations: &[Delegation]) -> bool {
    auth.is_admin()
        || delegations
            .iter()
            .any(|d| d.owner == auth.user_id && &d.domain == domain)
}

/// Routes of one domain that `auth` may see: all of them for
/// administrators, otherwise only those inside a delegated scope.
pub fn visible_routes(auth: &AuthUser, routes: Vec<Route>, delegations: &[Delegation]) -> Vec<Route> {
    if auth.is_admin() {
        return routes;
    }
    routes
        .into_iter()
        .filter(|r| can_mutate(auth, &r.domain, &r.path, delegations))
        .collect()
}

/// System scope needs an administrator; a user scope needs that user
/// (or an administrator acting on their behalf).
fn require_scope_owner(auth: &AuthUser, scope: &Scope) -> PolicyResult<()> {
    match scope {
        Scope::System => require_admin(auth),
        Scope::User(id) if *id == auth.user_id || auth.is_admin() => Ok(()),
        Scope::User(_) => Err(AppError::Forbidden(
            "Cannot change another user's settings".to_string(),
        )),
    }
}
