//! Ordered entry processing ahead of the outputs.
//!
//! Each stage maps one entry to zero or more entries. Every stage sees the
//! full output of the stage before it, so a stage that splits a record into
//! several changes what every later stage iterates over.

use grove_types::Entry;

use crate::error::{ConnectorError, ProcessorError, Result};

/// A single pipeline stage.
pub trait Processor: Send {
    /// Name used in errors and logs.
    fn name(&self) -> &str;

    /// Transform one entry. An empty result drops it.
    fn process(&mut self, entry: Entry) -> std::result::Result<Vec<Entry>, ProcessorError>;

    /// Called once after each saved batch. Failures are logged, not raised.
    fn finalize(&mut self) -> std::result::Result<(), ProcessorError> {
        Ok(())
    }
}

/// An ordered list of processors.
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn Processor>>,
}

impl Pipeline {
    /// Create a pipeline from stages, applied in order.
    pub fn new(stages: Vec<Box<dyn Processor>>) -> Self {
        Self { stages }
    }

    /// Append a stage.
    pub fn push(&mut self, stage: Box<dyn Processor>) {
        self.stages.push(stage);
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether there are no stages.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run `batch` through every stage.
    ///
    /// A stage failure aborts the batch and is reported with the stage name.
    pub fn process(&mut self, batch: Vec<Entry>) -> Result<Vec<Entry>> {
        let mut working = batch;
        for stage in &mut self.stages {
            let mut next = Vec::with_capacity(working.len());
            for entry in working {
                let produced = stage.process(entry).map_err(|source| {
                    ConnectorError::Processor {
                        stage: stage.name().to_string(),
                        source,
                    }
                })?;
                next.extend(produced);
            }
            working = next;
        }
        Ok(working)
    }

    /// Run every stage's finalize hook, logging failures.
    pub fn finalize(&mut self) {
        for stage in &mut self.stages {
            if let Err(e) = stage.finalize() {
                tracing::warn!("Processor '{}' finalize failed: {}", stage.name(), e);
            }
        }
    }
}
