//! Connector identity and cache key namespace.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::TypesError;

/// Identifies a single collection target.
///
/// `kind` names the connector implementation (e.g. `local_file`), `identity`
/// names the upstream tenant or account, and `operation` names the log stream
/// within that tenant. All durable state for a target is namespaced by these
/// three values.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectorIdentity {
    kind: String,
    identity: String,
    operation: String,
}

impl ConnectorIdentity {
    /// Create a new identity, validating each field.
    ///
    /// `kind` becomes a segment of the dotted partition key, so it may not
    /// contain `.`.
    pub fn new(
        kind: impl Into<String>,
        identity: impl Into<String>,
        operation: impl Into<String>,
    ) -> Result<Self, TypesError> {
        let kind = kind.into();
        let identity = identity.into();
        let operation = operation.into();

        if kind.is_empty() {
            return Err(TypesError::InvalidIdentity {
                field: "kind",
                reason: "must not be empty".into(),
            });
        }
        if kind.contains('.') {
            return Err(TypesError::InvalidIdentity {
                field: "kind",
                reason: format!("'{}' must not contain '.'", kind),
            });
        }
        if identity.is_empty() {
            return Err(TypesError::InvalidIdentity {
                field: "identity",
                reason: "must not be empty".into(),
            });
        }
        if operation.is_empty() {
            return Err(TypesError::InvalidIdentity {
                field: "operation",
                reason: "must not be empty".into(),
            });
        }

        Ok(Self {
            kind,
            identity,
            operation,
        })
    }

    /// The connector kind.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The upstream tenant identity.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// The operation (log stream) name.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Stable hex-encoded SHA-256 of the identity.
    ///
    /// Identities may contain characters that are awkward in keys (URLs,
    /// e-mail addresses), so they only ever appear in hashed form.
    pub fn identity_hash(&self) -> String {
        let digest = Sha256::digest(self.identity.as_bytes());
        hex::encode(digest)
    }

    /// Build the cache key for the given state prefix.
    pub fn key(&self, prefix: KeyPrefix) -> CacheKey {
        CacheKey {
            pk: format!("{}.{}.{}", prefix, self.kind, self.identity_hash()),
            sk: self.operation.clone(),
        }
    }
}

impl fmt::Display for ConnectorIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.identity, self.operation)
    }
}

impl fmt::Debug for ConnectorIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ConnectorIdentity({}/{}/{})",
            self.kind,
            &self.identity_hash()[..8],
            self.operation
        )
    }
}

/// The kinds of durable state Grove keeps per connector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyPrefix {
    /// Durable collection progress.
    Pointer,
    /// Provisional pointer of an unfinished reverse-chronological collection.
    PointerNext,
    /// Pointer value before the most recent advance.
    PointerPrevious,
    /// Newest bound of an unfinished reverse-chronological collection.
    WindowStart,
    /// Oldest bound written so far in an unfinished collection.
    WindowEnd,
    /// Execution lock expiry.
    ExecutionLock,
    /// Content hashes for the current pointer value.
    Deduplication,
}

impl KeyPrefix {
    /// Every prefix, in display order.
    pub const ALL: [KeyPrefix; 7] = [
        KeyPrefix::Pointer,
        KeyPrefix::PointerPrevious,
        KeyPrefix::PointerNext,
        KeyPrefix::WindowStart,
        KeyPrefix::WindowEnd,
        KeyPrefix::ExecutionLock,
        KeyPrefix::Deduplication,
    ];

    /// The literal prefix used in partition keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyPrefix::Pointer => "pointer",
            KeyPrefix::PointerNext => "pointer_next",
            KeyPrefix::PointerPrevious => "pointer_previous",
            KeyPrefix::WindowStart => "window_start",
            KeyPrefix::WindowEnd => "window_end",
            KeyPrefix::ExecutionLock => "execution_lock",
            KeyPrefix::Deduplication => "deduplication",
        }
    }
}

impl fmt::Display for KeyPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A (partition key, sort key) pair addressing one cache entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Partition key: `<prefix>.<kind>.<identity hash>`.
    pub pk: String,
    /// Sort key: the operation name.
    pub sk: String,
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.pk, self.sk)
    }
}
