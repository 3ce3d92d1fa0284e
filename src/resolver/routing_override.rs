//! Capability (class / service / path) → app resolution

use super::cascade::Cascade;
use crate::domain::{App, OverrideKind, RoutingOverride};
use crate::error::{AppError, Result};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OverrideSource {
    User,
    System,
    /// The only installed app declaring the capability
    Declared,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OverrideResolution {
    Resolved { app: String, source: OverrideSource },
    None,
    /// Several apps declare the capability; an override is required
    Ambiguous { apps: Vec<String> },
}

impl OverrideResolution {
    pub fn outcome(&self) -> &'static str {
        match self {
            OverrideResolution::Resolved { .. } => "resolved",
            OverrideResolution::None => "none",
            OverrideResolution::Ambiguous { .. } => "ambiguous",
        }
    }

    /// Collapse to a single app, treating ambiguity as an error
    pub fn into_app(self) -> Result<Option<String>> {
        match self {
            OverrideResolution::Resolved { app, .. } => Ok(Some(app)),
            OverrideResolution::None => Ok(None),
            OverrideResolution::Ambiguous { apps } => Err(AppError::Ambiguous(format!(
                "Several apps provide this capability: {}",
                apps.join(", ")
            ))),
        }
    }
}

pub fn declares(app: &App, kind: OverrideKind, name: &str) -> bool {
    let tags = match kind {
        OverrideKind::Class => &app.classes,
        OverrideKind::Service => &app.services,
        OverrideKind::Path => &app.paths,
    };
    tags.contains(name)
}

/// Resolve `(kind, name)`: user override, system override, then the unique
/// installed declaring app. Overrides naming an app that is no longer
/// registered are skipped.
pub fn resolve_override(
    kind: OverrideKind,
    name: &str,
    apps: &[App],
    system: Option<&RoutingOverride>,
    user: Option<&RoutingOverride>,
) -> OverrideResolution {
    let registered = |o: Option<&RoutingOverride>| {
        o.filter(|o| o.kind == kind && o.name == name)
            .filter(|o| apps.iter().any(|a| a.id == o.app))
            .map(|o| o.app.clone())
    };

    let explicit = Cascade::new()
        .then(OverrideSource::User, || registered(user))
        .then(OverrideSource::System, || registered(system))
        .resolve();
    if let Some(hit) = explicit {
        return OverrideResolution::Resolved {
            app: hit.value,
            source: hit.source,
        };
    }

    let mut declaring: Vec<String> = apps
        .iter()
        .filter(|a| !a.versions.is_empty() && declares(a, kind, name))
        .map(|a| a.id.clone())
        .collect();
    declaring.sort();

    match declaring.len() {
        0 => OverrideResolution::None,
        1 => OverrideResolution::Resolved {
            app: declaring.remove(0),
            source: OverrideSource::Declared,
        },
        _ => OverrideResolution::Ambiguous { apps: declaring },
    }
}
