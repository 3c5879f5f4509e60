//! Field path expressions.
//!
//! A path is a dot-separated list of segments. A segment applied to an object
//! selects a key; applied to an array it must be a zero-based index:
//! `actor.login`, `events.0.created_at`.

use grove_types::Entry;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced while parsing or evaluating a field path.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    /// The expression was empty.
    #[error("field path must not be empty")]
    Empty,

    /// The expression contained an empty segment (`a..b`, `.a`).
    #[error("field path '{path}' has an empty segment")]
    EmptySegment {
        /// The offending expression.
        path: String,
    },

    /// The entry has no value at the path, or the value is null.
    #[error("field '{path}' not found in entry")]
    Missing {
        /// The expression that was evaluated.
        path: String,
    },

    /// The value at the path is an object or array.
    #[error("field '{path}' is not a scalar value")]
    NotScalar {
        /// The expression that was evaluated.
        path: String,
    },
}

/// A parsed field path.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct FieldPath {
    raw: String,
    segments: Vec<String>,
}

impl FieldPath {
    /// Parse a dotted path expression.
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        if raw.is_empty() {
            return Err(PathError::Empty);
        }
        let segments: Vec<String> = raw.split('.').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(PathError::EmptySegment {
                path: raw.to_string(),
            });
        }
        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// The original expression.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Borrow the value at this path, if any.
    pub fn lookup<'a>(&self, entry: &'a Entry) -> Option<&'a Entry> {
        self.segments
            .iter()
            .try_fold(entry, |current, segment| match current {
                Entry::Object(map) => map.get(segment),
                Entry::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            })
    }

    /// Mutably borrow the value at this path, if any.
    pub fn lookup_mut<'a>(&self, entry: &'a mut Entry) -> Option<&'a mut Entry> {
        self.segments
            .iter()
            .try_fold(entry, |current, segment| match current {
                Entry::Object(map) => map.get_mut(segment),
                Entry::Array(items) => segment
                    .parse::<usize>()
                    .ok()
                    .and_then(move |i| items.get_mut(i)),
                _ => None,
            })
    }

    /// Extract the value at this path as a pointer string.
    ///
    /// Strings are returned verbatim; numbers and booleans use their JSON
    /// rendering. Null or absent values are [`PathError::Missing`].
    pub fn pointer(&self, entry: &Entry) -> Result<String, PathError> {
        match self.lookup(entry) {
            None | Some(Entry::Null) => Err(PathError::Missing {
                path: self.raw.clone(),
            }),
            Some(Entry::String(s)) => Ok(s.clone()),
            Some(v @ (Entry::Number(_) | Entry::Bool(_))) => Ok(v.to_string()),
            Some(_) => Err(PathError::NotScalar {
                path: self.raw.clone(),
            }),
        }
    }
}

impl FromStr for FieldPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for FieldPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl fmt::Debug for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldPath({})", self.raw)
    }
}
