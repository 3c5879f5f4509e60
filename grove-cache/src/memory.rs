//! In-memory cache backend.
//!
//! Backed by a [`DashMap`], whose entry API locks the shard for the duration
//! of each conditional write, giving per-key atomicity. Clones share the same
//! map, so several simulated executions can contend on one instance.
//!
//! Also offers failure injection so engine tests can simulate a backend
//! outage at a precise step.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::{check_arguments, Cache, CacheError};

/// Cache operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOp {
    /// `get`
    Get,
    /// `set`
    Set,
    /// `delete`
    Delete,
}

/// Process-local cache.
#[derive(Debug, Default, Clone)]
pub struct MemoryCache {
    entries: Arc<DashMap<(String, String), String>>,
    failures: Arc<Mutex<Vec<(CacheOp, String)>>>,
}

impl MemoryCache {
    /// Create a new empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `op` on a partition key starting with `pk_prefix` fail
    /// with `AccessFailure`.
    pub fn fail_next(&self, op: CacheOp, pk_prefix: &str) {
        self.failures
            .lock()
            .unwrap()
            .push((op, pk_prefix.to_string()));
    }

    /// Copy of every stored entry, keyed by `(pk, sk)`.
    pub fn snapshot(&self) -> BTreeMap<(String, String), String> {
        self.entries
            .iter()
            .map(|item| (item.key().clone(), item.value().clone()))
            .collect()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    fn injected_failure(&self, op: CacheOp, pk: &str) -> Result<(), CacheError> {
        let mut failures = self.failures.lock().unwrap();
        if let Some(index) = failures
            .iter()
            .position(|(o, prefix)| *o == op && pk.starts_with(prefix.as_str()))
        {
            failures.remove(index);
            return Err(CacheError::AccessFailure(format!(
                "injected {:?} failure for {}",
                op, pk
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, pk: &str, sk: &str) -> Result<Option<String>, CacheError> {
        self.injected_failure(CacheOp::Get, pk)?;
        Ok(self
            .entries
            .get(&(pk.to_string(), sk.to_string()))
            .map(|v| v.value().clone()))
    }

    async fn set(
        &self,
        pk: &str,
        sk: &str,
        value: &str,
        not_set: bool,
        constraint: Option<&str>,
    ) -> Result<(), CacheError> {
        check_arguments(not_set, constraint)?;
        self.injected_failure(CacheOp::Set, pk)?;

        match self.entries.entry((pk.to_string(), sk.to_string())) {
            Entry::Occupied(mut occupied) => {
                if not_set {
                    return Err(CacheError::constraint(pk, sk));
                }
                if let Some(expected) = constraint {
                    if occupied.get() != expected {
                        return Err(CacheError::constraint(pk, sk));
                    }
                }
                occupied.insert(value.to_string());
            }
            Entry::Vacant(vacant) => {
                if constraint.is_some() {
                    return Err(CacheError::constraint(pk, sk));
                }
                vacant.insert(value.to_string());
            }
        }
        Ok(())
    }

    async fn delete(
        &self,
        pk: &str,
        sk: &str,
        constraint: Option<&str>,
    ) -> Result<(), CacheError> {
        self.injected_failure(CacheOp::Delete, pk)?;

        match self.entries.entry((pk.to_string(), sk.to_string())) {
            Entry::Occupied(occupied) => {
                if let Some(expected) = constraint {
                    if occupied.get() != expected {
                        return Err(CacheError::constraint(pk, sk));
                    }
                }
                occupied.remove();
                Ok(())
            }
            Entry::Vacant(_) => match constraint {
                Some(_) => Err(CacheError::constraint(pk, sk)),
                None => Ok(()),
            },
        }
    }
}
