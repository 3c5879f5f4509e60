//! Upstream-specific fetch logic.
//!
//! A collector knows how to page through one upstream. It asks the
//! [`Session`] for the current pointer, trims each fresh query response with
//! [`Session::deduplicate_by_pointer`], and hands every page to
//! [`Session::save`]. Everything durable is handled by the session.

mod local_file;
mod mock;

pub use local_file::{LocalFileCollector, DEFAULT_PAGE_SIZE};
pub use mock::MockCollector;

use async_trait::async_trait;
use grove_core::FieldPath;
use grove_types::LogOrder;

use crate::error::Result;
use crate::session::Session;

/// Trait for upstream collectors.
#[async_trait]
pub trait Collector: Send {
    /// Where the pointer value lives inside each entry.
    fn pointer_path(&self) -> &FieldPath;

    /// Order in which the upstream yields pages.
    fn log_order(&self) -> LogOrder;

    /// Pointer reported before anything has been collected.
    fn default_pointer(&self) -> String;

    /// Page through the upstream, saving each page through `session`.
    async fn collect(&mut self, session: &mut Session) -> Result<()>;
}
