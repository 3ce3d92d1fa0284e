//! Common types for domain models

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum length of a normalized route path
pub const MAX_PATH_LEN: usize = 200;

/// Maximum length of a principal id
pub const MAX_PRINCIPAL_ID_LEN: usize = 64;

lazy_static::lazy_static! {
    static ref DNS_LABEL_REGEX: regex::Regex =
        regex::Regex::new(r"^[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?$").unwrap();
}

/// DNS-normalized domain name (lowercase, no trailing dot)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DomainName(String);

impl DomainName {
    pub fn parse(input: &str) -> Result<Self, AppError> {
        let normalized = input.trim().trim_end_matches('.').to_ascii_lowercase();
        if normalized.is_empty() || normalized.len() > 253 {
            return Err(AppError::Validation(format!(
                "Invalid domain name '{}'",
                input
            )));
        }
        if !normalized
            .split('.')
            .all(|label| DNS_LABEL_REGEX.is_match(label))
        {
            return Err(AppError::Validation(format!(
                "Invalid domain name '{}'",
                input
            )));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DomainName {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DomainName {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DomainName> for String {
    fn from(name: DomainName) -> Self {
        name.0
    }
}

/// Normalized route path, stored as its segments.
///
/// The empty path (no segments) is the domain root and renders as `""`;
/// every other path renders as `/seg1/seg2`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoutePath {
    segments: Vec<String>,
}

impl RoutePath {
    /// The domain root
    pub fn root() -> Self {
        Self::default()
    }

    pub fn parse(input: &str) -> Result<Self, AppError> {
        let trimmed = input.trim();
        let mut segments = Vec::new();
        for segment in trimmed.split('/').filter(|s| !s.is_empty()) {
            if segment == "." || segment == ".." {
                return Err(AppError::Validation(format!(
                    "Path '{}' contains a relative segment",
                    input
                )));
            }
            if segment
                .chars()
                .any(|c| c.is_whitespace() || c.is_control() || c == '?' || c == '#')
            {
                return Err(AppError::Validation(format!(
                    "Path '{}' contains invalid characters",
                    input
                )));
            }
            segments.push(segment.to_string());
        }

        let path = Self { segments };
        if path.to_string().len() > MAX_PATH_LEN {
            return Err(AppError::Validation(format!(
                "Path exceeds {} characters",
                MAX_PATH_LEN
            )));
        }
        Ok(path)
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Segment-wise prefix test: `/blog` covers `/blog/post` but not `/blogging`.
    /// The root covers every path.
    pub fn is_prefix_of(&self, other: &RoutePath) -> bool {
        self.segments.len() <= other.segments.len()
            && self
                .segments
                .iter()
                .zip(other.segments.iter())
                .all(|(a, b)| a == b)
    }
}

impl fmt::Display for RoutePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

impl FromStr for RoutePath {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RoutePath {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoutePath> for String {
    fn from(path: RoutePath) -> Self {
        path.to_string()
    }
}

/// Validate a principal id handed to us by the authentication collaborator
pub fn validate_principal_id(id: &str) -> Result<(), AppError> {
    if id.is_empty()
        || id.len() > MAX_PRINCIPAL_ID_LEN
        || id.contains('@')
        || id.chars().any(|c| c.is_whitespace() || c.is_control())
    {
        return Err(AppError::Validation(format!("Invalid principal id '{}'", id)));
    }
    Ok(())
}

/// Preference/override scope: the whole system or a single user
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Scope {
    System,
    User(String),
}

impl Scope {
    pub fn user(id: impl Into<String>) -> Self {
        Scope::User(id.into())
    }

    /// Storage partition key: `system` or `user:<id>`
    pub fn as_key(&self) -> String {
        match self {
            Scope::System => "system".to_string(),
            Scope::User(id) => format!("user:{}", id),
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Scope::System => None,
            Scope::User(id) => Some(id),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_key())
    }
}

impl FromStr for Scope {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "system" {
            return Ok(Scope::System);
        }
        match s.strip_prefix("user:") {
            Some(id) => {
                validate_principal_id(id)?;
                Ok(Scope::User(id.to_string()))
            }
            None => Err(AppError::Validation(format!("Unknown scope '{}'", s))),
        }
    }
}

impl TryFrom<String> for Scope {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Scope> for String {
    fn from(scope: Scope) -> Self {
        scope.as_key()
    }
}
