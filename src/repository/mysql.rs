//! MySQL config store
//!
//! Entries live in `config_entries`; versions come from the single-row
//! `config_revision` counter, bumped inside the writing transaction.

use super::{version_conflict, ConfigStore, Entry, Mutation, ScanSpec, StoreKey, TransactionPlan};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, MySql, MySqlConnection, MySqlPool, QueryBuilder};

const ENTRY_COLUMNS: &str =
    "SELECT kind, partition_key, entry_id, version, value, updated_at FROM config_entries";

/// SQLSTATE reported by MySQL for deadlocks and serialization failures
const SERIALIZATION_FAILURE: &str = "40001";

#[derive(Debug, FromRow)]
struct EntryRow {
    kind: String,
    partition_key: String,
    entry_id: String,
    version: u64,
    value: Json<serde_json::Value>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<EntryRow> for Entry {
    type Error = AppError;

    fn try_from(row: EntryRow) -> Result<Self> {
        Ok(Entry {
            key: StoreKey::new(row.kind.parse()?, row.partition_key, row.entry_id),
            version: row.version,
            value: row.value.0,
            updated_at: row.updated_at,
        })
    }
}

pub struct MySqlConfigStore {
    pool: MySqlPool,
}

impl MySqlConfigStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

fn scan_query(spec: &ScanSpec, lock: bool) -> QueryBuilder<'static, MySql> {
    let mut qb = QueryBuilder::new(ENTRY_COLUMNS);
    qb.push(" WHERE kind = ").push_bind(spec.kind.as_str());
    if let Some(partition) = &spec.partition {
        qb.push(" AND partition_key = ").push_bind(partition.clone());
    }
    if let Some(id) = &spec.id {
        qb.push(" AND entry_id = ").push_bind(id.clone());
    }
    qb.push(" ORDER BY partition_key, entry_id");
    if lock {
        qb.push(" FOR UPDATE");
    }
    qb
}

/// Conflicting writers surface as deadlocks or duplicate keys; both mean
/// "re-read and retry" to the caller.
fn map_write_error(key: &StoreKey, err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() || db.code().as_deref() == Some(SERIALIZATION_FAILURE) {
            return version_conflict(key);
        }
    }
    AppError::Database(err)
}

async fn next_revision(conn: &mut MySqlConnection) -> Result<u64> {
    let result =
        sqlx::query("UPDATE config_revision SET revision = LAST_INSERT_ID(revision + 1) WHERE id = 1")
            .execute(&mut *conn)
            .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::Internal(anyhow::anyhow!(
            "config_revision is not initialized"
        )));
    }
    Ok(result.last_insert_id())
}

async fn apply_mutation(conn: &mut MySqlConnection, mutation: &Mutation) -> Result<()> {
    let key = mutation.key();
    key.check_width()?;
    let revision = next_revision(conn).await?;
    let now = Utc::now();

    let affected = match mutation {
        Mutation::Put {
            value,
            expected: None,
            ..
        } => sqlx::query(
            r#"
            INSERT INTO config_entries (kind, partition_key, entry_id, version, value, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(key.kind.as_str())
        .bind(&key.partition)
        .bind(&key.id)
        .bind(revision)
        .bind(Json(value))
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(|e| map_write_error(key, e))?
        .rows_affected(),
        Mutation::Put {
            value,
            expected: Some(expected),
            ..
        } => sqlx::query(
            r#"
            UPDATE config_entries
            SET version = ?, value = ?, updated_at = ?
            WHERE kind = ? AND partition_key = ? AND entry_id = ? AND version = ?
            "#,
        )
        .bind(revision)
        .bind(Json(value))
        .bind(now)
        .bind(key.kind.as_str())
        .bind(&key.partition)
        .bind(&key.id)
        .bind(*expected)
        .execute(&mut *conn)
        .await
        .map_err(|e| map_write_error(key, e))?
        .rows_affected(),
        Mutation::Delete { expected, .. } => sqlx::query(
            r#"
            DELETE FROM config_entries
            WHERE kind = ? AND partition_key = ? AND entry_id = ? AND version = ?
            "#,
        )
        .bind(key.kind.as_str())
        .bind(&key.partition)
        .bind(&key.id)
        .bind(*expected)
        .execute(&mut *conn)
        .await
        .map_err(|e| map_write_error(key, e))?
        .rows_affected(),
    };

    if affected == 0 {
        return Err(version_conflict(key));
    }
    Ok(())
}

#[async_trait]
impl ConfigStore for MySqlConfigStore {
    async fn get(&self, key: &StoreKey) -> Result<Option<Entry>> {
        let row = sqlx::query_as::<_, EntryRow>(&format!(
            "{} WHERE kind = ? AND partition_key = ? AND entry_id = ?",
            ENTRY_COLUMNS
        ))
        .bind(key.kind.as_str())
        .bind(&key.partition)
        .bind(&key.id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Entry::try_from).transpose()
    }

    async fn scan(&self, spec: &ScanSpec) -> Result<Vec<Entry>> {
        let rows = scan_query(spec, false)
            .build_query_as::<EntryRow>()
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Entry::try_from).collect()
    }

    async fn put(
        &self,
        key: &StoreKey,
        value: serde_json::Value,
        expected: Option<u64>,
    ) -> Result<Entry> {
        let mut tx = self.pool.begin().await?;
        let mutation = Mutation::Put {
            key: key.clone(),
            value,
            expected,
        };
        apply_mutation(&mut tx, &mutation).await?;

        let row = sqlx::query_as::<_, EntryRow>(&format!(
            "{} WHERE kind = ? AND partition_key = ? AND entry_id = ?",
            ENTRY_COLUMNS
        ))
        .bind(key.kind.as_str())
        .bind(&key.partition)
        .bind(&key.id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        Entry::try_from(row)
    }

    async fn delete(&self, key: &StoreKey, expected: u64) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let mutation = Mutation::Delete {
            key: key.clone(),
            expected,
        };
        apply_mutation(&mut tx, &mutation).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn transact(
        &self,
        reads: &[ScanSpec],
        plan: &TransactionPlan<'_>,
    ) -> Result<Vec<StoreKey>> {
        let mut tx = self.pool.begin().await?;

        let mut observed: Vec<Entry> = Vec::new();
        for spec in reads {
            let rows = scan_query(spec, true)
                .build_query_as::<EntryRow>()
                .fetch_all(&mut *tx)
                .await?;
            for row in rows {
                let entry = Entry::try_from(row)?;
                if !observed.iter().any(|e| e.key == entry.key) {
                    observed.push(entry);
                }
            }
        }

        let mutations = plan(&observed)?;
        if mutations.is_empty() {
            tx.rollback().await?;
            return Ok(Vec::new());
        }

        for mutation in &mutations {
            apply_mutation(&mut tx, mutation).await?;
        }
        tx.commit().await?;

        Ok(mutations.iter().map(|m| m.key().clone()).collect())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
