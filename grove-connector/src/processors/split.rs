//! Explode an array field into one entry per element.

use grove_core::FieldPath;
use grove_types::Entry;

use crate::error::ProcessorError;
use crate::pipeline::Processor;

/// Replaces an entry holding an array at `path` with one copy per element,
/// each carrying that element at `path`.
///
/// Upstreams that batch several events into one record (a login followed by
/// its MFA challenge, say) become one entry per event. An empty array drops
/// the entry.
pub struct SplitProcessor {
    path: FieldPath,
}

impl SplitProcessor {
    /// Split on the array at `path`.
    pub fn new(path: FieldPath) -> Self {
        Self { path }
    }
}

impl Processor for SplitProcessor {
    fn name(&self) -> &str {
        "split"
    }

    fn process(&mut self, entry: Entry) -> Result<Vec<Entry>, ProcessorError> {
        let items = match self.path.lookup(&entry) {
            Some(Entry::Array(items)) => items.clone(),
            Some(_) => {
                return Err(ProcessorError::WrongType {
                    path: self.path.to_string(),
                    expected: "an array",
                })
            }
            None => {
                return Err(ProcessorError::MissingField {
                    path: self.path.to_string(),
                })
            }
        };

        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let mut copy = entry.clone();
            if let Some(slot) = self.path.lookup_mut(&mut copy) {
                *slot = item;
            }
            out.push(copy);
        }
        Ok(out)
    }
}
