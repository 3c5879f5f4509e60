//! Page trimming against recorded progress.
//!
//! Upstream APIs often filter on a coarser field than the pointer (a date
//! rather than a timestamp, or an inclusive bound), so a freshly fetched page
//! can repeat entries that were already delivered. These functions trim a
//! page against a known pointer value. When the pointer never appears in the
//! page nothing is trimmed: a duplicate is always preferred over a gap.

use grove_types::{Entry, LogOrder};

use crate::FieldPath;

/// Trim entries that were already collected up to `pointer`.
///
/// - Chronological pages drop everything up to and including the *last*
///   entry whose pointer equals `pointer`.
/// - Reverse-chronological pages drop everything from the *first* entry whose
///   pointer equals `pointer` onward.
///
/// Entries whose pointer cannot be extracted never match.
pub fn trim_seen(
    mut entries: Vec<Entry>,
    pointer: &str,
    path: &FieldPath,
    order: LogOrder,
) -> Vec<Entry> {
    let matches = |entry: &Entry| path.pointer(entry).is_ok_and(|p| p == pointer);

    match order {
        LogOrder::Chronological => match entries.iter().rposition(matches) {
            Some(last) => entries.split_off(last + 1),
            None => entries,
        },
        LogOrder::ReverseChronological => {
            if let Some(first) = entries.iter().position(matches) {
                entries.truncate(first);
            }
            entries
        }
    }
}

/// Resume a newest-first page at the entry matching `window_end`.
///
/// Returns the entries from the first match onward (inclusive), or `None`
/// when the page does not reach `window_end` yet.
pub fn resume_after(
    mut entries: Vec<Entry>,
    window_end: &str,
    path: &FieldPath,
) -> Option<Vec<Entry>> {
    let first = entries
        .iter()
        .position(|entry| path.pointer(entry).is_ok_and(|p| p == window_end))?;
    Some(entries.split_off(first))
}
