//! Error types for grove-connector.

use grove_cache::CacheError;
use grove_core::PathError;

use crate::config::ConfigError;

/// Main error type for connector operations.
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    /// Invalid configuration, raised while building a connector.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Another execution holds or took the lock, or changed shared state
    /// underneath this one.
    #[error("concurrency error: {0}")]
    Concurrency(String),

    /// The cache backend failed.
    #[error("cache access error: {0}")]
    Access(#[from] CacheError),

    /// A pipeline stage failed.
    #[error("processor '{stage}' failed: {source}")]
    Processor {
        /// Name of the failing stage.
        stage: String,
        /// The stage's error.
        #[source]
        source: ProcessorError,
    },

    /// An output rejected a batch.
    #[error("output '{output}' failed: {source}")]
    Output {
        /// Name of the failing output.
        output: String,
        /// The output's error.
        #[source]
        source: OutputError,
    },

    /// The collector could not fetch upstream data.
    #[error("collection error: {0}")]
    Collect(#[from] CollectError),

    /// An entry had no usable pointer value.
    #[error("pointer error: {0}")]
    Pointer(#[from] PathError),

    /// Internal state could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ConnectorError {
    /// Map a cache error from a compare-and-swap path: a failed precondition
    /// means another execution got there first.
    pub(crate) fn from_cas(err: CacheError, what: &str) -> Self {
        match err {
            CacheError::ConstraintFailed { .. } => {
                ConnectorError::Concurrency(format!("{} was modified concurrently", what))
            }
            other => ConnectorError::Access(other),
        }
    }
}

/// Errors raised by pipeline stages.
#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    /// The entry lacks a field the stage needs.
    #[error("field '{path}' not found")]
    MissingField {
        /// Path of the missing field.
        path: String,
    },

    /// The field exists but has the wrong shape.
    #[error("field '{path}' is not {expected}")]
    WrongType {
        /// Path of the field.
        path: String,
        /// What the stage expected.
        expected: &'static str,
    },

    /// Any other stage-specific failure.
    #[error("{0}")]
    Failed(String),
}

/// Errors raised by outputs.
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// Entries could not be serialized.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Writing the serialized batch failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The destination refused the batch.
    #[error("submission rejected: {0}")]
    Rejected(String),
}

/// Errors raised by collectors while fetching upstream data.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    /// Reading the upstream source failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An upstream record could not be parsed.
    #[error("invalid entry at line {line}: {reason}")]
    InvalidEntry {
        /// 1-based line (or record) number.
        line: usize,
        /// Parse failure description.
        reason: String,
    },

    /// The upstream API returned an error.
    #[error("upstream error: {0}")]
    Upstream(String),
}

/// Result type alias for connector operations.
pub type Result<T> = std::result::Result<T, ConnectorError>;
