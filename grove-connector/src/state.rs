//! Durable collection state for one connector.
//!
//! Each value is read from the cache on first access and kept in memory
//! afterwards. Setters write through to the cache before updating the
//! in-memory copy, so a failed write never leaves memory ahead of durable
//! state. The two window bounds are the exception: they are staged in memory
//! and persisted explicitly, after the page they describe has been written.

use std::sync::Arc;

use grove_cache::Cache;
use grove_types::{ConnectorIdentity, KeyPrefix};

use crate::error::Result;

/// A lazily loaded cache value. `None` means not read yet.
#[derive(Debug, Default)]
struct Slot(Option<Option<String>>);

impl Slot {
    async fn load(
        &mut self,
        cache: &dyn Cache,
        identity: &ConnectorIdentity,
        prefix: KeyPrefix,
    ) -> Result<Option<String>> {
        if let Some(value) = &self.0 {
            return Ok(value.clone());
        }
        let key = identity.key(prefix);
        let value = cache.get(&key.pk, &key.sk).await?;
        self.0 = Some(value.clone());
        Ok(value)
    }

    fn staged(&self) -> Option<&str> {
        self.0.as_ref().and_then(|v| v.as_deref())
    }

    fn put(&mut self, value: Option<String>) {
        self.0 = Some(value);
    }
}

/// Accessors over the pointer, provisional pointer and window keys.
pub struct CollectionState {
    cache: Arc<dyn Cache>,
    identity: ConnectorIdentity,
    default_pointer: String,
    pointer: Slot,
    previous_pointer: Slot,
    next_pointer: Slot,
    window_start: Slot,
    window_end: Slot,
}

impl CollectionState {
    /// Create accessors for `identity`. `default_pointer` is reported when no
    /// pointer has been stored yet; it is never written on its own.
    pub fn new(
        cache: Arc<dyn Cache>,
        identity: ConnectorIdentity,
        default_pointer: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            identity,
            default_pointer: default_pointer.into(),
            pointer: Slot::default(),
            previous_pointer: Slot::default(),
            next_pointer: Slot::default(),
            window_start: Slot::default(),
            window_end: Slot::default(),
        }
    }

    /// Current durable progress, or the collector's default.
    pub async fn pointer(&mut self) -> Result<String> {
        let stored = self
            .pointer
            .load(self.cache.as_ref(), &self.identity, KeyPrefix::Pointer)
            .await?;
        Ok(stored.unwrap_or_else(|| self.default_pointer.clone()))
    }

    /// Advance the pointer, recording the old value as the previous pointer.
    pub async fn set_pointer(&mut self, value: &str) -> Result<()> {
        let old = self.pointer().await?;
        self.write(KeyPrefix::PointerPrevious, &old).await?;
        self.previous_pointer.put(Some(old));
        self.write(KeyPrefix::Pointer, value).await?;
        self.pointer.put(Some(value.to_string()));
        Ok(())
    }

    /// Pointer value before the most recent advance.
    pub async fn previous_pointer(&mut self) -> Result<Option<String>> {
        self.previous_pointer
            .load(self.cache.as_ref(), &self.identity, KeyPrefix::PointerPrevious)
            .await
    }

    /// Provisional pointer of an unfinished reverse-chronological collection.
    pub async fn next_pointer(&mut self) -> Result<Option<String>> {
        self.next_pointer
            .load(self.cache.as_ref(), &self.identity, KeyPrefix::PointerNext)
            .await
    }

    /// Record the provisional pointer.
    pub async fn set_next_pointer(&mut self, value: &str) -> Result<()> {
        self.write(KeyPrefix::PointerNext, value).await?;
        self.next_pointer.put(Some(value.to_string()));
        Ok(())
    }

    /// Newest bound of the unfinished window, staged or stored.
    pub async fn window_start(&mut self) -> Result<Option<String>> {
        self.window_start
            .load(self.cache.as_ref(), &self.identity, KeyPrefix::WindowStart)
            .await
    }

    /// Oldest bound written so far, staged or stored.
    pub async fn window_end(&mut self) -> Result<Option<String>> {
        self.window_end
            .load(self.cache.as_ref(), &self.identity, KeyPrefix::WindowEnd)
            .await
    }

    /// Stage a new window start. Persist with [`save_window_start`](Self::save_window_start).
    pub fn stage_window_start(&mut self, value: &str) {
        self.window_start.put(Some(value.to_string()));
    }

    /// Stage a new window end. Persist with [`save_window_end`](Self::save_window_end).
    pub fn stage_window_end(&mut self, value: &str) {
        self.window_end.put(Some(value.to_string()));
    }

    /// Persist the staged window start, if any.
    pub async fn save_window_start(&mut self) -> Result<()> {
        if let Some(value) = self.window_start.staged().map(str::to_string) {
            self.write(KeyPrefix::WindowStart, &value).await?;
        }
        Ok(())
    }

    /// Persist the staged window end, if any.
    pub async fn save_window_end(&mut self) -> Result<()> {
        if let Some(value) = self.window_end.staged().map(str::to_string) {
            self.write(KeyPrefix::WindowEnd, &value).await?;
        }
        Ok(())
    }

    /// Remove the window and the provisional pointer.
    ///
    /// Window start goes first: once it is gone the next run starts a fresh
    /// window, whatever else survives.
    pub async fn clear_window(&mut self) -> Result<()> {
        for (prefix, slot) in [
            (KeyPrefix::WindowStart, &mut self.window_start),
            (KeyPrefix::WindowEnd, &mut self.window_end),
            (KeyPrefix::PointerNext, &mut self.next_pointer),
        ] {
            let key = self.identity.key(prefix);
            self.cache.delete(&key.pk, &key.sk, None).await?;
            slot.put(None);
        }
        Ok(())
    }

    async fn write(&self, prefix: KeyPrefix, value: &str) -> Result<()> {
        let key = self.identity.key(prefix);
        self.cache.set(&key.pk, &key.sk, value, false, None).await?;
        tracing::trace!("Wrote {} = {}", key, value);
        Ok(())
    }
}
