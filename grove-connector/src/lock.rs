//! Optimistic execution lock.
//!
//! The lock value is an expiry instant in decimal Unix milliseconds stored at
//! the connector's `execution_lock` key. There is no blocking and no waiting:
//! every transition is a single compare-and-swap against the value observed
//! just before, so two executions racing for the same key cannot both win.

use std::sync::Arc;
use std::time::Duration;

use grove_cache::Cache;
use grove_types::{CacheKey, ConnectorIdentity, KeyPrefix};

use crate::clock::Clock;
use crate::error::{ConnectorError, Result};

/// Default lock lifetime.
pub const DEFAULT_LOCK_DURATION: Duration = Duration::from_secs(300);

/// Per-connector mutual exclusion built on the cache's conditional writes.
pub struct ExecutionLock {
    cache: Arc<dyn Cache>,
    key: CacheKey,
    duration: Duration,
    clock: Arc<dyn Clock>,
    /// Expiry string this execution last wrote.
    held: Option<String>,
}

impl ExecutionLock {
    /// Create a lock handle for `identity`. Nothing is written until
    /// [`acquire`](Self::acquire).
    pub fn new(
        cache: Arc<dyn Cache>,
        identity: &ConnectorIdentity,
        duration: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            cache,
            key: identity.key(KeyPrefix::ExecutionLock),
            duration,
            clock,
            held: None,
        }
    }

    /// Whether this execution believes it holds the lock.
    pub fn is_held(&self) -> bool {
        self.held.is_some()
    }

    /// Expiry of the lock this execution last wrote.
    pub fn expiry_millis(&self) -> Option<u64> {
        self.held.as_deref().and_then(|v| v.parse().ok())
    }

    /// Take (or renew) the lock.
    ///
    /// Succeeds when the key is absent, when the stored expiry is in the past
    /// or unparseable, or when the stored value is the expiry this execution
    /// wrote last. Fails with `Concurrency` when another execution holds an
    /// unexpired lock or wins the race for the key.
    pub async fn acquire(&mut self) -> Result<()> {
        let now = self.clock.now_millis();
        let current = self.cache.get(&self.key.pk, &self.key.sk).await?;

        if let Some(observed) = current.as_deref() {
            let renewing = self.held.as_deref() == Some(observed);
            if !renewing {
                match observed.parse::<u64>() {
                    Ok(expiry) if expiry >= now => {
                        return Err(ConnectorError::Concurrency(format!(
                            "lock on {} held by another execution for {}ms",
                            self.key,
                            expiry - now
                        )));
                    }
                    Ok(_) => tracing::debug!("Taking over expired lock on {}", self.key),
                    Err(_) => tracing::warn!(
                        "Lock value {:?} on {} is not an expiry, treating as expired",
                        observed,
                        self.key
                    ),
                }
            }
        }

        let expiry = now
            .saturating_add(self.duration.as_millis() as u64)
            .to_string();
        let written = match current.as_deref() {
            Some(observed) => {
                self.cache
                    .set(&self.key.pk, &self.key.sk, &expiry, false, Some(observed))
                    .await
            }
            None => {
                self.cache
                    .set(&self.key.pk, &self.key.sk, &expiry, true, None)
                    .await
            }
        };
        written.map_err(|e| ConnectorError::from_cas(e, "execution lock"))?;

        tracing::debug!("Lock on {} held until {}", self.key, expiry);
        self.held = Some(expiry);
        Ok(())
    }

    /// Hand the lock back.
    ///
    /// A no-op when the key is absent. Fails with `Concurrency` when the
    /// stored value is not the one this execution wrote: the lock expired and
    /// was taken over while this execution was still working.
    pub async fn release(&mut self) -> Result<()> {
        let Some(observed) = self.cache.get(&self.key.pk, &self.key.sk).await? else {
            self.held = None;
            return Ok(());
        };

        if self.held.as_deref() != Some(observed.as_str()) {
            return Err(ConnectorError::Concurrency(format!(
                "lock on {} was taken over by another execution",
                self.key
            )));
        }

        self.cache
            .delete(&self.key.pk, &self.key.sk, Some(&observed))
            .await
            .map_err(|e| ConnectorError::from_cas(e, "execution lock"))?;

        tracing::debug!("Released lock on {}", self.key);
        self.held = None;
        Ok(())
    }

    /// Delete the lock regardless of who holds it.
    ///
    /// Operator escape hatch for a crashed execution whose lock has a long
    /// lifetime.
    pub async fn force_release(&mut self) -> Result<()> {
        self.cache.delete(&self.key.pk, &self.key.sk, None).await?;
        tracing::warn!("Force-released lock on {}", self.key);
        self.held = None;
        Ok(())
    }
}
