//! One collection attempt.
//!
//! The session owns everything a single run touches: the durable state
//! accessors, the lock, the deduplicator, the pipeline and the outputs. A
//! collector only ever sees the session, and the session is dropped when the
//! run ends, so no state leaks from one attempt into the next.
//!
//! # Save protocol
//!
//! Chronological pages advance the pointer after every write. A crash
//! between write and advance repeats the page on the next run, never skips
//! it.
//!
//! Reverse-chronological pages arrive newest first, so the pointer can only
//! move once the whole collection is done. Until then the newest pointer is
//! staged as the provisional pointer and the range already written is
//! tracked as a window:
//!
//! ```text
//!   newer ◄──────────────────────────────────────────► older
//!   window_start (= provisional pointer)  … window_end … pointer
//! ```
//!
//! A run that finds a window left behind by an interrupted run skips pages
//! until it reaches `window_end` and continues from there.

use std::sync::Arc;
use std::time::Duration;

use grove_cache::Cache;
use grove_core::{resume_after, trim_seen, FieldPath};
use grove_types::{ConnectorIdentity, Entry, LogOrder};

use crate::clock::Clock;
use crate::dedup::Deduplicator;
use crate::error::{ConnectorError, Result};
use crate::lock::ExecutionLock;
use crate::output::{Destination, Output, OutputMetadata};
use crate::pipeline::Pipeline;
use crate::state::CollectionState;

/// Reverse-chronological window ownership for this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowMode {
    /// No reverse-chronological page saved yet.
    Undetermined,
    /// This run opened the window.
    Owned,
    /// A previous run left the window. `bridged` turns true once a page
    /// reached the recorded window end.
    Inherited {
        /// Whether collection has caught up with the inherited window end.
        bridged: bool,
    },
}

/// Dependencies of a session.
pub struct SessionParts {
    /// Connector identity.
    pub identity: ConnectorIdentity,
    /// Durable state backend.
    pub cache: Arc<dyn Cache>,
    /// Where pointer values live inside entries.
    pub pointer_path: FieldPath,
    /// Upstream page order.
    pub order: LogOrder,
    /// Pointer reported before anything was collected.
    pub default_pointer: String,
    /// Lock lifetime.
    pub lock_duration: Duration,
    /// Time source.
    pub clock: Arc<dyn Clock>,
    /// Processing stages.
    pub pipeline: Pipeline,
    /// Destinations.
    pub outputs: Vec<Arc<dyn Output>>,
    /// Run descriptor.
    pub descriptor: String,
}

/// State and dependencies of one collection attempt.
pub struct Session {
    identity: ConnectorIdentity,
    pointer_path: FieldPath,
    order: LogOrder,
    descriptor: String,
    clock: Arc<dyn Clock>,
    pub(crate) state: CollectionState,
    pub(crate) lock: ExecutionLock,
    dedup: Deduplicator,
    pipeline: Pipeline,
    outputs: Vec<Arc<dyn Output>>,
    window: WindowMode,
    part: u64,
    written: u64,
}

impl Session {
    /// Assemble a session. Nothing is read until the collector asks.
    pub fn new(parts: SessionParts) -> Self {
        let lock = ExecutionLock::new(
            parts.cache.clone(),
            &parts.identity,
            parts.lock_duration,
            parts.clock.clone(),
        );
        let dedup = Deduplicator::new(
            parts.cache.clone(),
            &parts.identity,
            parts.pointer_path.clone(),
        );
        let state =
            CollectionState::new(parts.cache, parts.identity.clone(), parts.default_pointer);

        Self {
            identity: parts.identity,
            pointer_path: parts.pointer_path,
            order: parts.order,
            descriptor: parts.descriptor,
            clock: parts.clock,
            state,
            lock,
            dedup,
            pipeline: parts.pipeline,
            outputs: parts.outputs,
            window: WindowMode::Undetermined,
            part: 0,
            written: 0,
        }
    }

    /// Connector identity.
    pub fn identity(&self) -> &ConnectorIdentity {
        &self.identity
    }

    /// Upstream page order.
    pub fn log_order(&self) -> LogOrder {
        self.order
    }

    /// Run descriptor.
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    /// Pages written so far.
    pub fn pages(&self) -> u64 {
        self.part
    }

    /// Entries delivered to outputs so far.
    pub fn entries_written(&self) -> u64 {
        self.written
    }

    /// Window ownership so far.
    pub fn window_mode(&self) -> WindowMode {
        self.window
    }

    /// Current durable pointer (or the default).
    pub async fn pointer(&mut self) -> Result<String> {
        self.state.pointer().await
    }

    /// Trim a freshly fetched page against the current pointer.
    ///
    /// Meant for the first page of an upstream query whose filter is
    /// inclusive or coarser than the pointer.
    pub async fn deduplicate_by_pointer(&mut self, entries: Vec<Entry>) -> Result<Vec<Entry>> {
        let pointer = self.state.pointer().await?;
        Ok(trim_seen(entries, &pointer, &self.pointer_path, self.order))
    }

    /// Deduplicate, process and deliver one page, then record progress.
    ///
    /// `entries` must be in the connector's declared log order.
    pub async fn save(&mut self, entries: Vec<Entry>) -> Result<()> {
        let entries = match self.order {
            LogOrder::Chronological => entries,
            LogOrder::ReverseChronological => match self.resume_inherited(entries).await? {
                Some(entries) => entries,
                None => return Ok(()),
            },
        };

        let entries = self.dedup.deduplicate(entries).await?;
        if entries.is_empty() {
            tracing::debug!("Nothing new to save for {}", self.identity);
            return Ok(());
        }

        // Renew before writing; losing the lock is not fatal mid-collection
        match self.lock.acquire().await {
            Ok(()) => {}
            Err(ConnectorError::Concurrency(reason)) => {
                tracing::warn!("Continuing without lock for {}: {}", self.identity, reason);
            }
            Err(e) => return Err(e),
        }

        let result = match self.order {
            LogOrder::Chronological => self.save_chronological(entries).await,
            LogOrder::ReverseChronological => self.save_reverse_chronological(entries).await,
        };
        self.pipeline.finalize();
        result
    }

    async fn save_chronological(&mut self, entries: Vec<Entry>) -> Result<()> {
        let Some(last) = entries.last() else {
            return Ok(());
        };
        let candidate = self.pointer_path.pointer(last)?;

        self.write(entries, &candidate).await?;
        self.state.set_pointer(&candidate).await?;
        self.part += 1;
        self.persist_hashes(&candidate).await
    }

    /// Skip pages an interrupted run already covered.
    ///
    /// Runs before hash deduplication: the page that reaches `window_end`
    /// bridges the window even when every entry in it is a known repeat.
    async fn resume_inherited(&mut self, entries: Vec<Entry>) -> Result<Option<Vec<Entry>>> {
        if self.window == WindowMode::Undetermined && self.state.window_start().await?.is_some()
        {
            tracing::info!("Resuming interrupted collection for {}", self.identity);
            self.window = WindowMode::Inherited { bridged: false };
        }
        if self.window != (WindowMode::Inherited { bridged: false }) {
            return Ok(Some(entries));
        }

        let Some(end) = self.state.window_end().await? else {
            tracing::warn!("Window for {} has no end, collecting in full", self.identity);
            self.window = WindowMode::Inherited { bridged: true };
            return Ok(Some(entries));
        };
        match resume_after(entries, &end, &self.pointer_path) {
            Some(rest) => {
                tracing::info!("Caught up with window end {} for {}", end, self.identity);
                self.window = WindowMode::Inherited { bridged: true };
                Ok(Some(rest))
            }
            None => {
                tracing::debug!("Skipping page already covered by window ending {}", end);
                Ok(None)
            }
        }
    }

    async fn save_reverse_chronological(&mut self, entries: Vec<Entry>) -> Result<()> {
        let (Some(first), Some(last)) = (entries.first(), entries.last()) else {
            return Ok(());
        };
        let newest = self.pointer_path.pointer(first)?;
        let oldest = self.pointer_path.pointer(last)?;

        let opening = self.window == WindowMode::Undetermined;
        if opening {
            self.state.stage_window_start(&newest);
            self.window = WindowMode::Owned;
        }

        self.write(entries, &oldest).await?;
        self.part += 1;
        self.state.stage_window_end(&oldest);
        if opening {
            self.state.set_next_pointer(&newest).await?;
            self.state.save_window_start().await?;
        }
        self.state.save_window_end().await?;

        let head = match self.state.next_pointer().await? {
            Some(next) => next,
            None => self.state.pointer().await?,
        };
        self.persist_hashes(&head).await
    }

    /// Swap the provisional pointer in once a reverse-chronological
    /// collection has finished.
    pub(crate) async fn commit_window(&mut self) -> Result<()> {
        match self.window {
            WindowMode::Undetermined => return Ok(()),
            WindowMode::Inherited { bridged: false } => {
                tracing::warn!(
                    "Collection for {} never reached the inherited window, resetting it",
                    self.identity
                );
            }
            WindowMode::Owned | WindowMode::Inherited { bridged: true } => {
                match self.state.next_pointer().await? {
                    Some(next) => self.state.set_pointer(&next).await?,
                    None => tracing::warn!("No provisional pointer for {}", self.identity),
                }
            }
        }

        if let Err(e) = self.state.clear_window().await {
            tracing::warn!("Failed to clear window for {}: {}", self.identity, e);
        }
        Ok(())
    }

    async fn write(&mut self, entries: Vec<Entry>, pointer: &str) -> Result<()> {
        let processed = self.pipeline.process(entries)?;
        if processed.is_empty() {
            tracing::debug!("Pipeline dropped every entry of part {}", self.part);
            return Ok(());
        }

        let metadata = OutputMetadata {
            connector: self.identity.kind().to_string(),
            identity: self.identity.identity().to_string(),
            operation: self.identity.operation().to_string(),
            descriptor: self.descriptor.clone(),
            pointer: pointer.to_string(),
            collected_at: self.clock.now_millis(),
        };
        let destination = Destination {
            connector: self.identity.kind(),
            identity: self.identity.identity(),
            operation: self.identity.operation(),
            part: self.part,
            descriptor: &self.descriptor,
        };

        for output in &self.outputs {
            let wrap = |source| ConnectorError::Output {
                output: output.name().to_string(),
                source,
            };
            let data = output.serialize(&processed, &metadata).map_err(wrap)?;
            output.submit(&data, destination).await.map_err(wrap)?;
        }

        self.written += processed.len() as u64;
        tracing::debug!(
            "Wrote part {} ({} entries) for {}",
            self.part,
            processed.len(),
            self.identity
        );
        Ok(())
    }

    async fn persist_hashes(&mut self, pointer: &str) -> Result<()> {
        match self.dedup.persist(pointer).await {
            Ok(()) => Ok(()),
            Err(ConnectorError::Concurrency(reason)) => {
                tracing::warn!("Deduplication state for {} not saved: {}", self.identity, reason);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Give the pipeline back once the run is over.
    pub(crate) fn into_pipeline(self) -> Pipeline {
        self.pipeline
    }
}
