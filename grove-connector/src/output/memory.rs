//! In-memory destination for testing.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use grove_types::Entry;

use super::{Destination, Output};
use crate::error::OutputError;

/// A recorded submission.
#[derive(Debug, Clone)]
pub struct Submission {
    /// Connector kind.
    pub connector: String,
    /// Upstream tenant identity.
    pub identity: String,
    /// Operation name.
    pub operation: String,
    /// Batch counter.
    pub part: u64,
    /// Run descriptor.
    pub descriptor: String,
    /// Serialized batch.
    pub data: Vec<u8>,
}

#[derive(Debug, Default)]
struct Inner {
    submissions: Vec<Submission>,
    /// Successful submissions left before one is rejected.
    fail_in: Option<usize>,
}

/// Records every submission. Clones share the same record.
#[derive(Debug, Default, Clone)]
pub struct MemoryOutput {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryOutput {
    /// Create an empty output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next submission.
    pub fn fail_next_submit(&self) {
        self.fail_submit_after(0);
    }

    /// Accept `n` more submissions, then reject one.
    pub fn fail_submit_after(&self, n: usize) {
        self.inner.lock().unwrap().fail_in = Some(n);
    }

    /// All submissions so far.
    pub fn submissions(&self) -> Vec<Submission> {
        self.inner.lock().unwrap().submissions.clone()
    }

    /// Every delivered entry, parsed back from the submissions in order.
    pub fn entries(&self) -> Vec<Entry> {
        self.inner
            .lock()
            .unwrap()
            .submissions
            .iter()
            .flat_map(|s| {
                String::from_utf8_lossy(&s.data)
                    .lines()
                    .filter_map(|line| serde_json::from_str(line).ok())
                    .collect::<Vec<Entry>>()
            })
            .collect()
    }
}

#[async_trait]
impl Output for MemoryOutput {
    fn name(&self) -> &str {
        "memory"
    }

    async fn submit(&self, data: &[u8], destination: Destination<'_>) -> Result<(), OutputError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.fail_in {
            Some(0) => {
                inner.fail_in = None;
                return Err(OutputError::Rejected("simulated submit failure".into()));
            }
            Some(n) => inner.fail_in = Some(n - 1),
            None => {}
        }
        inner.submissions.push(Submission {
            connector: destination.connector.to_string(),
            identity: destination.identity.to_string(),
            operation: destination.operation.to_string(),
            part: destination.part,
            descriptor: destination.descriptor.to_string(),
            data: data.to_vec(),
        });
        Ok(())
    }
}
