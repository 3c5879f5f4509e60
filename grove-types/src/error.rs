//! Error types for grove-types.

use thiserror::Error;

/// Errors raised while constructing Grove's foundational types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypesError {
    /// A connector identity field failed validation.
    #[error("invalid connector {field}: {reason}")]
    InvalidIdentity {
        /// The offending field (kind, identity or operation).
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// Log order string did not name a known ordering.
    #[error("unknown log order: {0}")]
    UnknownLogOrder(String),
}
