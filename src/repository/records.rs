//! Typed access to config store entries

use super::{ConfigStore, Entry, RecordKind, ScanSpec, StoreKey};
use crate::domain::{App, Delegation, Domain, Route, RoutingOverride, Track, VersionPreference};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

/// A domain model persisted in the config store
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    const KIND: RecordKind;

    fn store_key(&self) -> StoreKey;
}

/// A decoded record together with the version it was read at
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub record: T,
    pub version: u64,
}

impl<T> Versioned<T> {
    pub fn into_inner(self) -> T {
        self.record
    }
}

impl Record for Domain {
    const KIND: RecordKind = RecordKind::Domain;

    fn store_key(&self) -> StoreKey {
        StoreKey::domain(&self.domain)
    }
}

impl Record for Route {
    const KIND: RecordKind = RecordKind::Route;

    fn store_key(&self) -> StoreKey {
        StoreKey::route(&self.domain, &self.path)
    }
}

impl Record for Delegation {
    const KIND: RecordKind = RecordKind::Delegation;

    fn store_key(&self) -> StoreKey {
        StoreKey::delegation(&self.domain, &self.path, &self.owner)
    }
}

impl Record for App {
    const KIND: RecordKind = RecordKind::App;

    fn store_key(&self) -> StoreKey {
        StoreKey::app(&self.id)
    }
}

impl Record for Track {
    const KIND: RecordKind = RecordKind::Track;

    fn store_key(&self) -> StoreKey {
        StoreKey::track(&self.app, &self.name)
    }
}

impl Record for VersionPreference {
    const KIND: RecordKind = RecordKind::Preference;

    fn store_key(&self) -> StoreKey {
        StoreKey::preference(&self.scope, &self.app)
    }
}

impl Record for RoutingOverride {
    const KIND: RecordKind = RecordKind::Override;

    fn store_key(&self) -> StoreKey {
        StoreKey::routing_override(&self.scope, self.kind, &self.name)
    }
}

pub fn encode<T: Record>(record: &T) -> Result<serde_json::Value> {
    serde_json::to_value(record).map_err(|e| AppError::Internal(e.into()))
}

pub fn decode<T: Record>(entry: &Entry) -> Result<Versioned<T>> {
    if entry.key.kind != T::KIND {
        return Err(AppError::Internal(anyhow::anyhow!(
            "Expected a {} record at {}",
            T::KIND,
            entry.key
        )));
    }
    let record = serde_json::from_value(entry.value.clone()).map_err(|e| {
        AppError::Internal(anyhow::anyhow!("Corrupt record at {}: {}", entry.key, e))
    })?;
    Ok(Versioned {
        record,
        version: entry.version,
    })
}

/// Decode every entry of kind `T::KIND`, skipping entries of other kinds
pub fn decode_all<T: Record>(entries: &[Entry]) -> Result<Vec<Versioned<T>>> {
    entries
        .iter()
        .filter(|e| e.key.kind == T::KIND)
        .map(decode)
        .collect()
}

/// Typed helpers on top of any [`ConfigStore`]
#[async_trait]
pub trait RecordStore: ConfigStore {
    async fn load<T: Record>(&self, key: &StoreKey) -> Result<Option<Versioned<T>>> {
        match self.get(key).await? {
            Some(entry) => Ok(Some(decode(&entry)?)),
            None => Ok(None),
        }
    }

    async fn list<T: Record>(&self, spec: &ScanSpec) -> Result<Vec<Versioned<T>>> {
        let entries = self.scan(spec).await?;
        decode_all(&entries)
    }

    /// Write `record` under its own key; returns the new version
    async fn save<T: Record>(&self, record: &T, expected: Option<u64>) -> Result<u64> {
        let value = encode(record)?;
        let entry = self.put(&record.store_key(), value, expected).await?;
        Ok(entry.version)
    }
}

impl<S: ConfigStore> RecordStore for S {}
