//! # grove-cache
//!
//! The conditional key/value store that holds all of Grove's durable state.
//!
//! Every backend implements the same contract:
//!
//! - `get(pk, sk)` returns the stored value or `None`.
//! - `set(pk, sk, value, not_set, constraint)` writes a value. `not_set`
//!   requires the key to be absent; `constraint` requires the current value to
//!   equal the given string. The two are mutually exclusive.
//! - `delete(pk, sk, constraint)` removes a value under the same constraint
//!   rules.
//!
//! A violated precondition is always [`CacheError::ConstraintFailed`], never a
//! generic [`CacheError::AccessFailure`]; callers build mutual exclusion on
//! top of that distinction. Each operation is atomic per `(pk, sk)`.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod memory;
mod sqlite;

#[cfg(test)]
mod contract;

pub use error::CacheError;
pub use memory::{CacheOp, MemoryCache};
pub use sqlite::SqliteCache;

use async_trait::async_trait;

/// Trait for conditional key/value cache backends.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Read the value stored at `(pk, sk)`.
    async fn get(&self, pk: &str, sk: &str) -> Result<Option<String>, CacheError>;

    /// Write `value` at `(pk, sk)`.
    ///
    /// Fails with `ConstraintFailed` if `not_set` is true and the key exists,
    /// or if `constraint` is given and differs from the stored value (including
    /// when nothing is stored). Supplying both is `InvalidArguments`.
    async fn set(
        &self,
        pk: &str,
        sk: &str,
        value: &str,
        not_set: bool,
        constraint: Option<&str>,
    ) -> Result<(), CacheError>;

    /// Remove the value at `(pk, sk)`.
    ///
    /// Without a constraint, deleting an absent key succeeds. With a
    /// constraint, the stored value must exist and equal it.
    async fn delete(&self, pk: &str, sk: &str, constraint: Option<&str>)
        -> Result<(), CacheError>;
}

/// Reject `set` calls that combine both preconditions.
pub(crate) fn check_arguments(not_set: bool, constraint: Option<&str>) -> Result<(), CacheError> {
    if not_set && constraint.is_some() {
        return Err(CacheError::InvalidArguments(
            "not_set and constraint are mutually exclusive".into(),
        ));
    }
    Ok(())
}
