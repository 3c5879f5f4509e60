//! Collector over a newline-delimited JSON file.

use std::cmp::Ordering;
use std::path::PathBuf;

use async_trait::async_trait;
use grove_core::FieldPath;
use grove_types::{Entry, LogOrder};

use super::Collector;
use crate::error::{CollectError, Result};
use crate::session::Session;

/// Entries per saved page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Reads an NDJSON log file the way an API collector reads an upstream.
///
/// Entries with a pointer at or after the current pointer are selected (an
/// inclusive filter, like most upstream APIs), ordered by pointer in the
/// declared log order, trimmed once against the current pointer, then saved
/// page by page. Pointer values compare numerically when both parse as
/// numbers and as strings otherwise, so ISO-8601 timestamps order correctly.
#[derive(Debug, Clone)]
pub struct LocalFileCollector {
    path: PathBuf,
    pointer_path: FieldPath,
    order: LogOrder,
    page_size: usize,
    default_pointer: String,
}

impl LocalFileCollector {
    /// Collect from `path`, reading pointers at `pointer_path`.
    pub fn new(path: impl Into<PathBuf>, pointer_path: FieldPath, order: LogOrder) -> Self {
        Self {
            path: path.into(),
            pointer_path,
            order,
            page_size: DEFAULT_PAGE_SIZE,
            default_pointer: String::new(),
        }
    }

    /// Set the page size. Zero is treated as one.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Set the pointer used before anything was collected.
    pub fn with_default_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.default_pointer = pointer.into();
        self
    }

    async fn read(&self) -> std::result::Result<Vec<Entry>, CollectError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let mut entries = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let entry = serde_json::from_str(line).map_err(|e| CollectError::InvalidEntry {
                line: index + 1,
                reason: e.to_string(),
            })?;
            entries.push(entry);
        }
        Ok(entries)
    }
}

fn compare_pointers(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.cmp(b),
    }
}

#[async_trait]
impl Collector for LocalFileCollector {
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
        let since = session.pointer().await?;
        let entries = self.read().await?;
        let total = entries.len();

        let mut selected: Vec<(String, Entry)> = entries
            .into_iter()
            .filter_map(|entry| {
                let pointer = self.pointer_path.pointer(&entry).ok()?;
                let keep = since.is_empty()
                    || compare_pointers(&pointer, &since) != Ordering::Less;
                keep.then_some((pointer, entry))
            })
            .collect();

        // Stable sort keeps file order among equal pointers
        selected.sort_by(|(a, _), (b, _)| compare_pointers(a, b));
        if self.order == LogOrder::ReverseChronological {
            selected.reverse();
        }

        let selected: Vec<Entry> = selected.into_iter().map(|(_, entry)| entry).collect();
        tracing::debug!(
            "Read {} entries from {}, {} at or after {:?}",
            total,
            self.path.display(),
            selected.len(),
            since
        );

        let fresh = session.deduplicate_by_pointer(selected).await?;
        for page in fresh.chunks(self.page_size) {
            session.save(page.to_vec()).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_pointers_compare_by_value() {
        assert_eq!(compare_pointers("9", "10"), Ordering::Less);
        assert_eq!(compare_pointers("10", "10.0"), Ordering::Equal);
    }

    #[test]
    fn timestamps_compare_lexicographically() {
        assert_eq!(
            compare_pointers("2024-01-01T00:00:00Z", "2024-01-02T00:00:00Z"),
            Ordering::Less
        );
    }

    #[tokio::test]
    async fn invalid_line_is_reported_with_number() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        std::fs::write(&path, "{\"ts\": 1}\n\nnot json\n").unwrap();

        let collector =
            LocalFileCollector::new(&path, FieldPath::parse("ts").unwrap(), LogOrder::Chronological);
        let err = collector.read().await.unwrap_err();
        assert!(matches!(err, CollectError::InvalidEntry { line: 3, .. }));
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let collector = LocalFileCollector::new(
            "/nonexistent/grove.jsonl",
            FieldPath::parse("ts").unwrap(),
            LogOrder::Chronological,
        );
        assert!(matches!(collector.read().await, Err(CollectError::Io(_))));
    }
}
