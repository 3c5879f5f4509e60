//! Drop entries whose field equals a given value.

use grove_core::FieldPath;
use grove_types::Entry;

use crate::error::ProcessorError;
use crate::pipeline::Processor;

/// Drops entries where the value at `path` equals `value`.
///
/// Entries without the field pass through untouched.
pub struct FilterProcessor {
    path: FieldPath,
    value: Entry,
}

impl FilterProcessor {
    /// Drop entries whose `path` equals `value`.
    pub fn new(path: FieldPath, value: Entry) -> Self {
        Self { path, value }
    }
}

impl Processor for FilterProcessor {
    fn name(&self) -> &str {
        "filter"
    }

    fn process(&mut self, entry: Entry) -> Result<Vec<Entry>, ProcessorError> {
        if self.path.lookup(&entry) == Some(&self.value) {
            return Ok(Vec::new());
        }
        Ok(vec![entry])
    }
}
