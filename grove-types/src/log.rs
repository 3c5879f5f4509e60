//! Log entries and ordering.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

/// A single collected log entry.
///
/// Entries are arbitrary JSON documents as returned by the upstream API.
pub type Entry = serde_json::Value;

/// The order in which an upstream API returns entries within a page.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogOrder {
    /// Oldest first; the pointer advances after every page.
    #[default]
    Chronological,
    /// Newest first; the pointer only advances once every page is collected.
    ReverseChronological,
}

impl LogOrder {
    /// The configuration name of this ordering.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogOrder::Chronological => "chronological",
            LogOrder::ReverseChronological => "reverse_chronological",
        }
    }
}

impl fmt::Display for LogOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogOrder {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chronological" => Ok(LogOrder::Chronological),
            "reverse_chronological" => Ok(LogOrder::ReverseChronological),
            other => Err(TypesError::UnknownLogOrder(other.to_string())),
        }
    }
}
