//! # grove-types
//!
//! Foundational types shared by every Grove crate:
//! - [`ConnectorIdentity`], [`KeyPrefix`], [`CacheKey`] - cache key namespace
//! - [`LogOrder`], [`Entry`] - the shape of collected log data
//! - [`TypesError`] - validation errors

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod log;

pub use error::TypesError;
pub use ids::{CacheKey, ConnectorIdentity, KeyPrefix};
pub use log::{Entry, LogOrder};
