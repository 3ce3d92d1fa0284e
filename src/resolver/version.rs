//! App version resolution, ordering and reference tracking

use super::cascade::Cascade;
use crate::domain::{App, Track, VersionPreference};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use utoipa::ToSchema;

/// Which step of the cascade picked the version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum VersionSource {
    UserPin,
    UserTrack,
    SystemPin,
    SystemTrack,
    Highest,
}

impl VersionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionSource::UserPin => "user_pin",
            VersionSource::UserTrack => "user_track",
            VersionSource::SystemPin => "system_pin",
            VersionSource::SystemTrack => "system_track",
            VersionSource::Highest => "highest",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct VersionResolution {
    pub app: String,
    pub version: String,
    pub source: VersionSource,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Component<'a> {
    Numeric(u64),
    Text(&'a str),
}

impl<'a> Component<'a> {
    fn parse(part: &'a str) -> Self {
        match part.parse::<u64>() {
            Ok(n) if part.bytes().all(|b| b.is_ascii_digit()) => Component::Numeric(n),
            _ => Component::Text(part),
        }
    }
}

/// Total sort key shared by every version string: numeric core (trailing
/// zeros dropped, so `2` and `2.0.0` tie), a release above its
/// pre-releases, pre-release identifiers, then the raw string. Build
/// metadata only matters through the raw string.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct VersionKey<'a> {
    core: Vec<Component<'a>>,
    release: bool,
    pre: Vec<Component<'a>>,
    raw: &'a str,
}

impl<'a> VersionKey<'a> {
    fn new(raw: &'a str) -> Self {
        let main = raw.split_once('+').map_or(raw, |(main, _)| main);
        let (core, pre) = match main.split_once('-') {
            Some((core, pre)) => (core, Some(pre)),
            None => (main, None),
        };

        let mut core: Vec<Component<'a>> = core.split('.').map(Component::parse).collect();
        while core.last() == Some(&Component::Numeric(0)) {
            core.pop();
        }

        Self {
            core,
            release: pre.is_none(),
            pre: pre
                .map(|p| p.split('.').map(Component::parse).collect())
                .unwrap_or_default(),
            raw,
        }
    }
}

pub fn compare_versions(a: &str, b: &str) -> Ordering {
    VersionKey::new(a).cmp(&VersionKey::new(b))
}

/// Sort ascending and drop duplicates
pub fn sort_versions(versions: &mut Vec<String>) {
    versions.sort_by(|a, b| compare_versions(a, b));
    versions.dedup();
}

pub fn highest_version(versions: &[String]) -> Option<&String> {
    versions.iter().max_by(|a, b| compare_versions(a, b))
}

/// Installed version a preference selects, if it still exists
fn preferred_version<'a>(
    app: &'a App,
    tracks: &'a [Track],
    preference: Option<&'a VersionPreference>,
    use_track: bool,
) -> Option<String> {
    let preference = preference?;
    let version = if use_track {
        let name = preference.track()?;
        tracks
            .iter()
            .find(|t| t.app == app.id && t.name == name)
            .map(|t| t.version.as_str())?
    } else {
        preference.pinned_version()?
    };
    app.is_installed(version).then(|| version.to_string())
}

/// Pick the version of `app` to run: user pin, user track, system pin,
/// system track, then the highest installed version. Stale pins and
/// tracks fall through. `None` only when nothing is installed.
pub fn resolve_version(
    app: &App,
    tracks: &[Track],
    system: Option<&VersionPreference>,
    user: Option<&VersionPreference>,
) -> Option<VersionResolution> {
    Cascade::new()
        .then(VersionSource::UserPin, || {
            preferred_version(app, tracks, user, false)
        })
        .then(VersionSource::UserTrack, || {
            preferred_version(app, tracks, user, true)
        })
        .then(VersionSource::SystemPin, || {
            preferred_version(app, tracks, system, false)
        })
        .then(VersionSource::SystemTrack, || {
            preferred_version(app, tracks, system, true)
        })
        .then(VersionSource::Highest, || highest_version(&app.versions).cloned())
        .resolve()
        .map(|r| VersionResolution {
            app: app.id.clone(),
            version: r.value,
            source: r.source,
        })
}

/// Installed versions nothing refers to: not pinned by any preference,
/// not the target of any track, and not the highest installed version.
pub fn unused_versions(
    app: &App,
    preferences: &[VersionPreference],
    tracks: &[Track],
) -> Vec<String> {
    let mut referenced: BTreeSet<&str> = BTreeSet::new();
    referenced.extend(
        preferences
            .iter()
            .filter(|p| p.app == app.id)
            .filter_map(|p| p.pinned_version()),
    );
    referenced.extend(
        tracks
            .iter()
            .filter(|t| t.app == app.id)
            .map(|t| t.version.as_str()),
    );
    if let Some(highest) = highest_version(&app.versions) {
        referenced.insert(highest.as_str());
    }

    app.versions
        .iter()
        .filter(|v| !referenced.contains(v.as_str()))
        .cloned()
        .collect()
}
