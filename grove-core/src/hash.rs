//! Content hashing for deduplication.
//!
//! Two entries are considered identical when their canonical JSON renderings
//! match: object keys sorted, no insignificant whitespace. The rendering is
//! built explicitly rather than relying on `serde_json`'s map ordering, which
//! changes when any crate in the build enables `preserve_order`.

use grove_types::Entry;
use sha2::{Digest, Sha256};

/// Render an entry as canonical JSON.
pub fn canonical_json(entry: &Entry) -> String {
    let mut out = String::new();
    write_canonical(entry, &mut out);
    out
}

/// Hex-encoded SHA-256 of an entry's canonical JSON.
pub fn hash_entry(entry: &Entry) -> String {
    let digest = Sha256::digest(canonical_json(entry).as_bytes());
    hex::encode(digest)
}

fn write_canonical(value: &Entry, out: &mut String) {
    match value {
        Entry::Object(map) => {
            let mut fields: Vec<_> = map.iter().collect();
            fields.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (key, item)) in fields.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Entry::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        Entry::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
