//! User directory lookups
//!
//! The directory is owned by the identity collaborator; the engine only
//! searches it (for delegation pickers) and checks that owners exist.

use crate::domain::{Role, UserSummary};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use sqlx::{FromRow, MySqlPool};
use tokio::sync::RwLock;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync + 'static {
    /// Case-insensitive substring search over id and username
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<UserSummary>>;
    async fn find(&self, id: &str) -> Result<Option<UserSummary>>;
}

/// Parse a directory seed list of the form `id:username[:role],...`.
/// The username defaults to the id, the role to `user`.
pub fn parse_seed(seed: &str) -> Result<Vec<UserSummary>> {
    let mut users = Vec::new();
    for item in seed.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let mut parts = item.split(':');
        let id = parts.next().unwrap_or_default().trim();
        let username = parts.next().map(str::trim).unwrap_or(id);
        let role = match parts.next() {
            Some(role) => role
                .trim()
                .parse::<Role>()
                .map_err(|e| AppError::BadRequest(format!("Invalid directory seed: {}", e)))?,
            None => Role::User,
        };
        crate::domain::validate_principal_id(id)?;
        users.push(UserSummary {
            id: id.to_string(),
            username: username.to_string(),
            role,
        });
    }
    Ok(users)
}

/// Directory held in memory, seeded from configuration
#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<Vec<UserSummary>>,
}

impl InMemoryUserDirectory {
    pub fn new(users: Vec<UserSummary>) -> Self {
        Self {
            users: RwLock::new(users),
        }
    }

    /// Build from a seed list of the form `id:username[:role],...`
    pub fn from_seed(seed: &str) -> Result<Self> {
        Ok(Self::new(parse_seed(seed)?))
    }

    pub async fn insert(&self, user: UserSummary) {
        let mut users = self.users.write().await;
        users.retain(|u| u.id != user.id);
        users.push(user);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<UserSummary>> {
        let needle = query.trim().to_lowercase();
        let users = self.users.read().await;
        let mut found: Vec<UserSummary> = users
            .iter()
            .filter(|u| {
                needle.is_empty()
                    || u.id.to_lowercase().contains(&needle)
                    || u.username.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.username.cmp(&b.username));
        found.truncate(limit);
        Ok(found)
    }

    async fn find(&self, id: &str) -> Result<Option<UserSummary>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: String,
    username: String,
    role: String,
}

impl From<UserRow> for UserSummary {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            role: row.role.parse().unwrap_or_default(),
        }
    }
}

/// Directory backed by the collaborator's `users` table
pub struct MySqlUserDirectory {
    pool: MySqlPool,
}

impl MySqlUserDirectory {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

/// Escape LIKE wildcards so user input matches literally
fn like_pattern(query: &str) -> String {
    let escaped = query
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[async_trait]
impl UserDirectory for MySqlUserDirectory {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<UserSummary>> {
        let pattern = like_pattern(query);
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, role
            FROM users
            WHERE id LIKE ? OR username LIKE ?
            ORDER BY username
            LIMIT ?
            "#,
        )
        .bind(&pattern)
        .bind(&pattern)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(UserSummary::from).collect())
    }

    async fn find(&self, id: &str) -> Result<Option<UserSummary>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT id, username, role FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(UserSummary::from))
    }
}
