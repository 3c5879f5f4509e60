//! Standard output destination.

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use super::{Destination, Output};
use crate::error::OutputError;

/// Writes every batch to standard output.
///
/// Logs go to standard error, so stdout carries data only and can be piped.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutOutput;

impl StdoutOutput {
    /// Create a stdout output.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Output for StdoutOutput {
    fn name(&self) -> &str {
        "stdout"
    }

    async fn submit(&self, data: &[u8], destination: Destination<'_>) -> Result<(), OutputError> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(data).await?;
        stdout.flush().await?;
        tracing::debug!(
            "Wrote part {} of {} ({} bytes) to stdout",
            destination.part,
            destination.descriptor,
            data.len()
        );
        Ok(())
    }
}
