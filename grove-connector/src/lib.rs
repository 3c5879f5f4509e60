//! # grove-connector
//!
//! Incremental, resumable log collection for Grove.
//!
//! A [`Connector`] pairs a [`Collector`] (how to page through one upstream)
//! with a [`Pipeline`] of processors and one or more [`Output`]s. Each run
//! builds a fresh [`Session`] that holds the connector's durable state:
//!
//! - **Pointer**: how far collection has progressed, advanced only after the
//!   entries up to it were delivered.
//! - **Execution lock**: an optimistic, expiring lock so two executions of
//!   the same connector rarely overlap, and best-effort progress when they do.
//! - **Deduplication**: content hashes of entries delivered at the head
//!   pointer value, so inclusive upstream filters never repeat an entry.
//! - **Window**: bookkeeping that lets an interrupted newest-first collection
//!   resume where it stopped.
//!
//! All state lives in a [`grove_cache::Cache`] keyed by the connector's
//! [`ConnectorIdentity`](grove_types::ConnectorIdentity).
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use grove_cache::MemoryCache;
//! use grove_connector::{Connector, LocalFileCollector, StdoutOutput};
//! use grove_core::FieldPath;
//! use grove_types::{ConnectorIdentity, LogOrder};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let identity = ConnectorIdentity::new("local_file", "acme", "audit")?;
//! let collector =
//!     LocalFileCollector::new("audit.jsonl", FieldPath::parse("ts")?, LogOrder::Chronological);
//!
//! let mut connector = Connector::new(
//!     "acme-audit",
//!     identity,
//!     Arc::new(MemoryCache::new()),
//!     Box::new(collector),
//! )
//! .with_output(Arc::new(StdoutOutput::new()));
//!
//! let summary = connector.run().await?;
//! println!("collected up to {}", summary.pointer);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod collector;
pub mod config;
pub mod dedup;
pub mod error;
pub mod factory;
pub mod lock;
pub mod output;
pub mod pipeline;
pub mod processors;
pub mod runtime;
pub mod session;
pub mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use collector::{Collector, LocalFileCollector, MockCollector};
pub use config::{Config, ConfigError};
pub use dedup::Deduplicator;
pub use error::{CollectError, ConnectorError, OutputError, ProcessorError, Result};
pub use lock::{ExecutionLock, DEFAULT_LOCK_DURATION};
pub use output::{Destination, FileOutput, MemoryOutput, Output, OutputMetadata, StdoutOutput};
pub use pipeline::{Pipeline, Processor};
pub use processors::{FilterProcessor, SplitProcessor};
pub use runtime::{Connector, RunSummary};
pub use session::{Session, WindowMode};
pub use state::CollectionState;
