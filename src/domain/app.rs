//! App, track and version preference models

use super::common::Scope;
use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use utoipa::ToSchema;
use validator::Validate;

lazy_static::lazy_static! {
    pub static ref APP_ID_REGEX: regex::Regex =
        regex::Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]{0,127}$").unwrap();
    pub static ref VERSION_REGEX: regex::Regex =
        regex::Regex::new(r"^[A-Za-z0-9][A-Za-z0-9.+_-]{0,63}$").unwrap();
    pub static ref TRACK_REGEX: regex::Regex =
        regex::Regex::new(r"^[a-z0-9][a-z0-9_-]{0,63}$").unwrap();
}

/// Installed application as reported by the installer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct App {
    pub id: String,
    #[serde(default)]
    pub label: String,
    /// Installed versions, ascending
    pub versions: Vec<String>,
    #[serde(default)]
    pub classes: BTreeSet<String>,
    #[serde(default)]
    pub services: BTreeSet<String>,
    #[serde(default)]
    pub paths: BTreeSet<String>,
    pub updated_at: DateTime<Utc>,
}

impl App {
    pub fn is_installed(&self, version: &str) -> bool {
        self.versions.iter().any(|v| v == version)
    }
}

/// Named pointer to a version of an app
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Track {
    pub app: String,
    pub name: String,
    pub version: String,
    pub updated_at: DateTime<Utc>,
}

/// What a version preference points at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum VersionChoice {
    /// Exact installed version
    Version(String),
    /// Symbolic track name
    Track(String),
}

/// Per-scope version preference for an app
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct VersionPreference {
    #[schema(value_type = String)]
    pub scope: Scope,
    pub app: String,
    pub choice: VersionChoice,
    pub updated_at: DateTime<Utc>,
}

impl VersionPreference {
    pub fn pinned_version(&self) -> Option<&str> {
        match &self.choice {
            VersionChoice::Version(v) => Some(v),
            VersionChoice::Track(_) => None,
        }
    }

    pub fn track(&self) -> Option<&str> {
        match &self.choice {
            VersionChoice::Track(t) => Some(t),
            VersionChoice::Version(_) => None,
        }
    }
}

/// Input for registering (or re-registering) an installed app
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RegisterAppInput {
    #[validate(regex(path = *APP_ID_REGEX))]
    pub id: String,
    #[validate(length(max = 255))]
    #[serde(default)]
    pub label: String,
    #[validate(length(min = 1))]
    pub versions: Vec<String>,
    #[serde(default)]
    pub classes: BTreeSet<String>,
    #[serde(default)]
    pub services: BTreeSet<String>,
    #[serde(default)]
    pub paths: BTreeSet<String>,
}

/// Input for setting a version preference.
///
/// Both fields empty clears the preference; both set is rejected.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct SetVersionPreferenceInput {
    pub version: Option<String>,
    pub track: Option<String>,
}

impl SetVersionPreferenceInput {
    pub fn into_choice(self) -> Result<Option<VersionChoice>, AppError> {
        let version = self.version.filter(|v| !v.trim().is_empty());
        let track = self.track.filter(|t| !t.trim().is_empty());
        match (version, track) {
            (Some(_), Some(_)) => Err(AppError::Validation(
                "Set either a version or a track, not both".to_string(),
            )),
            (Some(v), None) => {
                validate_version(&v)?;
                Ok(Some(VersionChoice::Version(v)))
            }
            (None, Some(t)) => {
                validate_track_name(&t)?;
                Ok(Some(VersionChoice::Track(t)))
            }
            (None, None) => Ok(None),
        }
    }
}

/// Input for pointing a track at a version
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SetTrackInput {
    pub version: String,
}

pub fn validate_app_id(id: &str) -> Result<(), AppError> {
    if APP_ID_REGEX.is_match(id) {
        Ok(())
    } else {
        Err(AppError::Validation(format!("Invalid app id '{}'", id)))
    }
}

pub fn validate_version(version: &str) -> Result<(), AppError> {
    if VERSION_REGEX.is_match(version) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "Invalid version string '{}'",
            version
        )))
    }
}

pub fn validate_track_name(track: &str) -> Result<(), AppError> {
    if TRACK_REGEX.is_match(track) {
        Ok(())
    } else {
        Err(AppError::Validation(format!("Invalid track name '{}'", track)))
    }
}

/// App listing entry with its currently resolved default
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AppSummary {
    pub id: String,
    pub label: String,
    pub version: Option<String>,
    pub versions: Vec<String>,
    pub classes: BTreeSet<String>,
    pub services: BTreeSet<String>,
    pub paths: BTreeSet<String>,
}

/// Detailed app view: installed versions, tracks and the system default
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AppDetail {
    pub app: String,
    pub versions: Vec<String>,
    pub tracks: BTreeMap<String, String>,
    pub default: Option<VersionChoice>,
}

/// A user's view of the installed apps: resolved versions, own
/// preferences and own routing overrides
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserApps {
    pub apps: Vec<AppSummary>,
    pub preferences: BTreeMap<String, VersionChoice>,
    pub overrides: super::RoutingTable,
}
