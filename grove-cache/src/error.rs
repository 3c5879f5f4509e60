//! Error types for grove-cache.

use std::path::PathBuf;

/// Cache operation errors.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// A `not_set` or `constraint` precondition did not hold.
    #[error("constraint failed for {pk}/{sk}")]
    ConstraintFailed {
        /// Partition key of the guarded entry.
        pk: String,
        /// Sort key of the guarded entry.
        sk: String,
    },

    /// The backend could not be reached or returned an I/O error.
    #[error("cache access failed: {0}")]
    AccessFailure(String),

    /// The call itself was malformed.
    #[error("invalid cache arguments: {0}")]
    InvalidArguments(String),

    /// Database path error.
    #[error("invalid database path: {path}")]
    InvalidPath {
        /// The invalid path.
        path: PathBuf,
    },
}

impl CacheError {
    pub(crate) fn constraint(pk: &str, sk: &str) -> Self {
        CacheError::ConstraintFailed {
            pk: pk.to_string(),
            sk: sk.to_string(),
        }
    }

    /// Whether this error is a precondition violation.
    pub fn is_constraint_failed(&self) -> bool {
        matches!(self, CacheError::ConstraintFailed { .. })
    }
}

impl From<sqlx::Error> for CacheError {
    fn from(err: sqlx::Error) -> Self {
        CacheError::AccessFailure(err.to_string())
    }
}
