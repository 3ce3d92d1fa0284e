//! In-process config store
//!
//! The whole store is an immutable [`Snapshot`] behind an [`ArcSwap`].
//! Readers never block; writers build the next snapshot from the current
//! one and publish it with compare-and-swap, retrying from the latest
//! snapshot when another writer got there first.

use super::{version_conflict, ConfigStore, Entry, Mutation, ScanSpec, StoreKey, TransactionPlan};
use crate::error::{AppError, Result};
use arc_swap::ArcSwap;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
struct Snapshot {
    revision: u64,
    entries: BTreeMap<StoreKey, Entry>,
}

impl Snapshot {
    fn scan(&self, spec: &ScanSpec) -> Vec<Entry> {
        self.entries
            .values()
            .filter(|e| spec.matches(&e.key))
            .cloned()
            .collect()
    }

    /// Apply `mutations` in order. Versions are checked against the state
    /// left by earlier mutations of the same batch.
    fn apply(&mut self, mutations: &[Mutation]) -> Result<()> {
        let now = Utc::now();
        for mutation in mutations {
            match mutation {
                Mutation::Put {
                    key,
                    value,
                    expected,
                } => {
                    let current = self.entries.get(key).map(|e| e.version);
                    if current != *expected {
                        return Err(version_conflict(key));
                    }
                    self.revision += 1;
                    self.entries.insert(
                        key.clone(),
                        Entry {
                            key: key.clone(),
                            version: self.revision,
                            value: value.clone(),
                            updated_at: now,
                        },
                    );
                }
                Mutation::Delete { key, expected } => {
                    match self.entries.get(key) {
                        Some(e) if e.version == *expected => {}
                        _ => return Err(version_conflict(key)),
                    }
                    self.revision += 1;
                    self.entries.remove(key);
                }
            }
        }
        Ok(())
    }
}

/// Config store held entirely in memory
#[derive(Default)]
pub struct MemoryConfigStore {
    snap: ArcSwap<Snapshot>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current store-wide revision
    pub fn revision(&self) -> u64 {
        self.snap.load().revision
    }

    pub fn len(&self) -> usize {
        self.snap.load().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `build` against the latest snapshot and publish the result.
    /// `build` is re-run from scratch whenever the publish loses a race.
    fn commit<F>(&self, mut build: F) -> Result<Committed>
    where
        F: FnMut(&Snapshot) -> Result<Vec<Mutation>>,
    {
        loop {
            let old = self.snap.load_full();
            let mutations = build(&old)?;
            if mutations.is_empty() {
                return Ok(Committed {
                    keys: Vec::new(),
                    snapshot: old,
                });
            }

            let next = Arc::new({
                let mut next = Snapshot::clone(&old);
                next.apply(&mutations)?;
                next
            });

            let prev = self.snap.compare_and_swap(&old, Arc::clone(&next));
            if Arc::ptr_eq(&prev, &old) {
                return Ok(Committed {
                    keys: mutations.iter().map(|m| m.key().clone()).collect(),
                    snapshot: next,
                });
            }
            tracing::trace!("Config snapshot changed during commit, retrying");
        }
    }
}

/// Keys written by a commit and the snapshot it published
struct Committed {
    keys: Vec<StoreKey>,
    snapshot: Arc<Snapshot>,
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn get(&self, key: &StoreKey) -> Result<Option<Entry>> {
        Ok(self.snap.load().entries.get(key).cloned())
    }

    async fn scan(&self, spec: &ScanSpec) -> Result<Vec<Entry>> {
        Ok(self.snap.load().scan(spec))
    }

    async fn put(
        &self,
        key: &StoreKey,
        value: serde_json::Value,
        expected: Option<u64>,
    ) -> Result<Entry> {
        let mutation = Mutation::Put {
            key: key.clone(),
            value,
            expected,
        };
        let committed = self.commit(|_| Ok(vec![mutation.clone()]))?;
        committed
            .snapshot
            .entries
            .get(key)
            .cloned()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Entry {} vanished after put", key)))
    }

    async fn delete(&self, key: &StoreKey, expected: u64) -> Result<()> {
        let mutation = Mutation::Delete {
            key: key.clone(),
            expected,
        };
        self.commit(|_| Ok(vec![mutation.clone()]))?;
        Ok(())
    }

    async fn transact(
        &self,
        reads: &[ScanSpec],
        plan: &TransactionPlan<'_>,
    ) -> Result<Vec<StoreKey>> {
        let committed = self.commit(|snap| {
            let mut observed: Vec<Entry> = Vec::new();
            for spec in reads {
                for entry in snap.scan(spec) {
                    if !observed.iter().any(|e| e.key == entry.key) {
                        observed.push(entry);
                    }
                }
            }
            plan(&observed)
        })?;
        Ok(committed.keys)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
