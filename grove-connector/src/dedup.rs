//! Content-hash deduplication scoped to one pointer value.
//!
//! Many upstreams report timestamps at a coarse granularity, so an inclusive
//! query repeats every entry that shares the pointer's value. The engine
//! remembers the content hash of each entry delivered at the head pointer
//! value and drops exact repeats. Entries at older pointer values are already
//! excluded by the pointer itself, so only one value's hashes are retained.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use grove_cache::Cache;
use grove_core::{hash_entry, FieldPath};
use grove_types::{CacheKey, ConnectorIdentity, Entry, KeyPrefix};
use serde::{Deserialize, Serialize};

use crate::error::{ConnectorError, Result};

/// Stored form of the hash set.
#[derive(Debug, Serialize, Deserialize)]
struct StoredHashes {
    pointer: String,
    hashes: BTreeSet<String>,
}

/// Filters candidates whose content hash was already delivered.
pub struct Deduplicator {
    cache: Arc<dyn Cache>,
    key: CacheKey,
    path: FieldPath,
    seen: HashMap<String, BTreeSet<String>>,
    /// Raw value last read from or written to the cache. `None` until loaded.
    observed: Option<Option<String>>,
}

impl Deduplicator {
    /// Create a deduplicator for `identity`, reading pointer values at `path`.
    pub fn new(cache: Arc<dyn Cache>, identity: &ConnectorIdentity, path: FieldPath) -> Self {
        Self {
            cache,
            key: identity.key(KeyPrefix::Deduplication),
            path,
            seen: HashMap::new(),
            observed: None,
        }
    }

    /// Drop candidates already seen, in this run or a previous one.
    ///
    /// Survivors keep their order and are remembered immediately, so a repeat
    /// within the same batch is dropped too.
    pub async fn deduplicate(&mut self, candidates: Vec<Entry>) -> Result<Vec<Entry>> {
        self.load().await?;

        let total = candidates.len();
        let mut kept = Vec::with_capacity(total);
        for entry in candidates {
            let pointer = self.path.pointer(&entry)?;
            if self.seen.entry(pointer).or_default().insert(hash_entry(&entry)) {
                kept.push(entry);
            }
        }

        if kept.len() < total {
            tracing::debug!("Dropped {} duplicate entries", total - kept.len());
        }
        Ok(kept)
    }

    /// Persist the hashes recorded for `pointer` and forget the rest.
    ///
    /// The write is conditional on the value observed at load time. When
    /// another execution changed it in between this fails with `Concurrency`
    /// and the next call re-reads (and merges) the stored hashes.
    pub async fn persist(&mut self, pointer: &str) -> Result<()> {
        self.load().await?;

        let stored = StoredHashes {
            pointer: pointer.to_string(),
            hashes: self.seen.get(pointer).cloned().unwrap_or_default(),
        };
        if stored.hashes.is_empty() {
            self.forget_all_but(pointer);
            return Ok(());
        }
        let value = serde_json::to_string(&stored)?;

        let previous = self.observed.clone().flatten();
        if previous.as_deref() == Some(value.as_str()) {
            self.forget_all_but(pointer);
            return Ok(());
        }

        let written = match previous.as_deref() {
            Some(previous) => {
                self.cache
                    .set(&self.key.pk, &self.key.sk, &value, false, Some(previous))
                    .await
            }
            None => {
                self.cache
                    .set(&self.key.pk, &self.key.sk, &value, true, None)
                    .await
            }
        };

        match written {
            Ok(()) => {
                self.observed = Some(Some(value));
                self.forget_all_but(pointer);
                Ok(())
            }
            Err(e) => {
                self.observed = None;
                Err(ConnectorError::from_cas(e, "deduplication hashes"))
            }
        }
    }

    fn forget_all_but(&mut self, pointer: &str) {
        self.seen.retain(|p, _| p == pointer);
    }

    async fn load(&mut self) -> Result<()> {
        if self.observed.is_some() {
            return Ok(());
        }

        let raw = self.cache.get(&self.key.pk, &self.key.sk).await?;
        if let Some(raw) = &raw {
            match serde_json::from_str::<StoredHashes>(raw) {
                Ok(stored) => {
                    self.seen
                        .entry(stored.pointer)
                        .or_default()
                        .extend(stored.hashes);
                }
                Err(e) => {
                    tracing::warn!("Ignoring unreadable hashes at {}: {}", self.key, e);
                }
            }
        }
        self.observed = Some(raw);
        Ok(())
    }
}
