//! Filesystem destination.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{Destination, Output};
use crate::error::OutputError;

/// Writes each batch to its own file:
/// `<root>/<connector>/<operation>/<descriptor>.<part>.jsonl`.
///
/// The identity is not part of the path; use a separate root per tenant when
/// several share an operation name.
#[derive(Debug, Clone)]
pub struct FileOutput {
    root: PathBuf,
}

impl FileOutput {
    /// Write batches under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File a batch is written to.
    pub fn path_for(&self, destination: &Destination<'_>) -> PathBuf {
        self.root
            .join(destination.connector)
            .join(destination.operation)
            .join(format!("{}.{}.jsonl", destination.descriptor, destination.part))
    }
}

#[async_trait]
impl Output for FileOutput {
    fn name(&self) -> &str {
        "file"
    }

    async fn submit(&self, data: &[u8], destination: Destination<'_>) -> Result<(), OutputError> {
        let path = self.path_for(&destination);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, data).await?;
        tracing::debug!("Wrote {} bytes to {}", data.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn batches_land_in_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let output = FileOutput::new(dir.path());

        for part in 0..2 {
            let destination = Destination {
                connector: "local_file",
                identity: "tenant",
                operation: "audit",
                part,
                descriptor: "run-1",
            };
            output
                .submit(format!("{}\n", part).as_bytes(), destination)
                .await
                .unwrap();
        }

        let base = dir.path().join("local_file").join("audit");
        assert_eq!(std::fs::read_to_string(base.join("run-1.0.jsonl")).unwrap(), "0\n");
        assert_eq!(std::fs::read_to_string(base.join("run-1.1.jsonl")).unwrap(), "1\n");
    }
}
