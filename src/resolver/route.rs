//! (domain, path) → entity resolution

use crate::domain::{Route, RoutePath};
use serde::Serialize;
use utoipa::ToSchema;

/// Outcome of a route lookup. Absence is a value, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RouteResolution {
    Matched { route: Route },
    NoMatch,
}

impl RouteResolution {
    pub fn route(&self) -> Option<&Route> {
        match self {
            RouteResolution::Matched { route } => Some(route),
            RouteResolution::NoMatch => None,
        }
    }

    pub fn outcome(&self) -> &'static str {
        match self {
            RouteResolution::Matched { .. } => "matched",
            RouteResolution::NoMatch => "no_match",
        }
    }
}

/// Best enabled route stored exactly at `path`: highest priority, then
/// most recently updated.
fn best_at<'a>(candidates: &'a [Route], path: &RoutePath) -> Option<&'a Route> {
    candidates
        .iter()
        .filter(|r| r.enabled && &r.path == path)
        .max_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| a.updated_at.cmp(&b.updated_at))
        })
}

/// Resolve `path` against the routes of one domain: exact match first,
/// then the domain root. Intermediate prefixes are never consulted.
pub fn resolve_route(candidates: &[Route], path: &RoutePath) -> RouteResolution {
    best_at(candidates, path)
        .or_else(|| best_at(candidates, &RoutePath::root()))
        .map(|route| RouteResolution::Matched {
            route: route.clone(),
        })
        .unwrap_or(RouteResolution::NoMatch)
}
