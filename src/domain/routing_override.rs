//! Routing override model

use super::common::Scope;
use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Capability classification an app can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OverrideKind {
    Class,
    Service,
    Path,
}

impl OverrideKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverrideKind::Class => "class",
            OverrideKind::Service => "service",
            OverrideKind::Path => "path",
        }
    }
}

impl fmt::Display for OverrideKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OverrideKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "class" => Ok(OverrideKind::Class),
            "service" => Ok(OverrideKind::Service),
            "path" => Ok(OverrideKind::Path),
            other => Err(AppError::Validation(format!(
                "Unknown override type '{}'",
                other
            ))),
        }
    }
}

/// Scoped mapping from a capability name to an app
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RoutingOverride {
    #[schema(value_type = String)]
    pub scope: Scope,
    #[serde(rename = "type")]
    pub kind: OverrideKind,
    pub name: String,
    pub app: String,
    pub updated_at: DateTime<Utc>,
}

/// Input for setting an override
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SetOverrideInput {
    #[serde(rename = "type")]
    pub kind: OverrideKind,
    pub name: String,
    pub app: String,
}

pub fn validate_capability_name(name: &str) -> Result<(), AppError> {
    if name.is_empty()
        || name.len() > 255
        || name.chars().any(|c| c.is_whitespace() || c.is_control())
    {
        return Err(AppError::Validation(format!(
            "Invalid capability name '{}'",
            name
        )));
    }
    Ok(())
}

/// Overrides grouped by kind, as shown in the routing tables
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RoutingTable {
    pub classes: BTreeMap<String, String>,
    pub services: BTreeMap<String, String>,
    pub paths: BTreeMap<String, String>,
}

impl RoutingTable {
    pub fn from_overrides<'a>(overrides: impl IntoIterator<Item = &'a RoutingOverride>) -> Self {
        let mut table = Self::default();
        for o in overrides {
            let target = match o.kind {
                OverrideKind::Class => &mut table.classes,
                OverrideKind::Service => &mut table.services,
                OverrideKind::Path => &mut table.paths,
            };
            target.insert(o.name.clone(), o.app.clone());
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrip() {
        for kind in [OverrideKind::Class, OverrideKind::Service, OverrideKind::Path] {
            assert_eq!(kind.as_str().parse::<OverrideKind>().unwrap(), kind);
        }
        assert!("entity".parse::<OverrideKind>().is_err());
    }

    #[test]
    fn test_routing_table_grouping() {
        let mk = |kind, name: &str, app: &str| RoutingOverride {
            scope: Scope::System,
            kind,
            name: name.to_string(),
            app: app.to_string(),
            updated_at: Utc::now(),
        };
        let overrides = vec![
            mk(OverrideKind::Class, "wiki", "notes"),
            mk(OverrideKind::Service, "chat", "talk"),
            mk(OverrideKind::Path, "people", "friends"),
        ];
        let table = RoutingTable::from_overrides(&overrides);
        assert_eq!(table.classes.get("wiki").map(String::as_str), Some("notes"));
        assert_eq!(table.services.get("chat").map(String::as_str), Some("talk"));
        assert_eq!(table.paths.get("people").map(String::as_str), Some("friends"));
    }

    #[test]
    fn test_set_override_input_uses_type_field() {
        let input: SetOverrideInput =
            serde_json::from_str(r#"{"type": "service", "name": "chat", "app": "talk"}"#).unwrap();
        assert_eq!(input.kind, OverrideKind::Service);
    }
}
