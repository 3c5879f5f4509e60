//! Scripted collector for testing.

use async_trait::async_trait;
use grove_core::FieldPath;
use grove_types::{Entry, LogOrder};

use super::Collector;
use crate::error::{CollectError, Result};
use crate::session::Session;

/// Replays a fixed list of pages.
///
/// Optionally fails after a given number of pages to simulate an upstream
/// outage mid-collection.
#[derive(Debug, Clone)]
pub struct MockCollector {
    pointer_path: FieldPath,
    order: LogOrder,
    default_pointer: String,
    pages: Vec<Vec<Entry>>,
    trim: bool,
    fail_after: Option<usize>,
    seen_pointer: Option<String>,
}

impl MockCollector {
    /// Create a collector with no pages.
    pub fn new(pointer_path: FieldPath, order: LogOrder) -> Self {
        Self {
            pointer_path,
            order,
            default_pointer: String::new(),
            pages: Vec::new(),
            trim: false,
            fail_after: None,
            seen_pointer: None,
        }
    }

    /// Append a page.
    pub fn with_page(mut self, page: Vec<Entry>) -> Self {
        self.pages.push(page);
        self
    }

    /// Set the pointer reported before anything was collected.
    pub fn with_default_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.default_pointer = pointer.into();
        self
    }

    /// Trim the first page against the current pointer, as a collector whose
    /// upstream filter is inclusive would.
    pub fn with_pointer_trim(mut self) -> Self {
        self.trim = true;
        self
    }

    /// Fail with an upstream error instead of returning page `n` (zero-based).
    pub fn fail_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    /// Pointer the session reported at the start of the last collection.
    pub fn seen_pointer(&self) -> Option<&str> {
        self.seen_pointer.as_deref()
    }
}

#[async_trait]
impl Collector for MockCollector {
    fn pointer_path(&self) -> &FieldPath {
        &self.pointer_path
    }

    fn log_order(&self) -> LogOrder {
        self.order
    }

    fn default_pointer(&self) -> String {
        self.default_pointer.clone()
    }

    async fn collect(&mut self, session: &mut Session) -> Result<()> {
        self.seen_pointer = Some(session.pointer().await?);

        for (index, page) in self.pages.iter().enumerate() {
            if self.fail_after == Some(index) {
                return Err(CollectError::Upstream(format!("simulated failure at page {}", index)).into());
            }
            let page = if self.trim && index == 0 {
                session.deduplicate_by_pointer(page.clone()).await?
            } else {
                page.clone()
            };
            session.save(page).await?;
        }
        Ok(())
    }
}
