//! Destinations for processed entries.
//!
//! An output turns a processed batch into bytes and submits them under the
//! connector's identity. The `part` counter and run `descriptor` let a
//! destination give every batch of a run a distinct, ordered name.

mod file;
mod memory;
mod stdout;

pub use file::FileOutput;
pub use memory::{MemoryOutput, Submission};
pub use stdout::StdoutOutput;

use async_trait::async_trait;
use grove_types::Entry;
use serde::Serialize;

use crate::error::OutputError;

/// Field added to every object entry on output.
pub const METADATA_FIELD: &str = "_grove";

/// Provenance attached to each delivered entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputMetadata {
    /// Connector kind.
    pub connector: String,
    /// Upstream tenant identity.
    pub identity: String,
    /// Operation (log stream) name.
    pub operation: String,
    /// Run descriptor shared by every batch of one run.
    pub descriptor: String,
    /// Pointer value the batch advances to.
    pub pointer: String,
    /// Collection time in Unix milliseconds.
    pub collected_at: u64,
}

/// Where a serialized batch goes.
#[derive(Debug, Clone, Copy)]
pub struct Destination<'a> {
    /// Connector kind.
    pub connector: &'a str,
    /// Upstream tenant identity.
    pub identity: &'a str,
    /// Operation (log stream) name.
    pub operation: &'a str,
    /// Zero-based batch counter within the run.
    pub part: u64,
    /// Run descriptor.
    pub descriptor: &'a str,
}

/// Trait for output backends.
#[async_trait]
pub trait Output: Send + Sync {
    /// Name used in errors and logs.
    fn name(&self) -> &str;

    /// Render a batch. Defaults to newline-delimited JSON with metadata.
    fn serialize(&self, entries: &[Entry], metadata: &OutputMetadata) -> Result<Vec<u8>, OutputError> {
        to_ndjson(entries, metadata)
    }

    /// Deliver a rendered batch.
    async fn submit(&self, data: &[u8], destination: Destination<'_>) -> Result<(), OutputError>;
}

/// Render entries as newline-delimited JSON, one entry per line.
///
/// Object entries gain a [`METADATA_FIELD`] member; other values are written
/// as they are.
pub fn to_ndjson(entries: &[Entry], metadata: &OutputMetadata) -> Result<Vec<u8>, OutputError> {
    let metadata = serde_json::to_value(metadata)?;
    let mut out = Vec::new();
    for entry in entries {
        match entry {
            Entry::Object(map) => {
                let mut map = map.clone();
                map.insert(METADATA_FIELD.to_string(), metadata.clone());
                serde_json::to_writer(&mut out, &map)?;
            }
            other => serde_json::to_writer(&mut out, other)?,
        }
        out.push(b'\n');
    }
    Ok(out)
}
