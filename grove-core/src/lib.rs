//! # grove-core
//!
//! Pure logic for Grove (no I/O, instant tests).
//!
//! Everything here takes input and produces output without touching the
//! cache, the network or the clock:
//! - [`FieldPath`] locates pointer and processor fields inside entries
//! - [`hash_entry`] produces the content hash used for deduplication
//! - [`trim_seen`] and [`resume_after`] trim pages against recorded progress
//! - [`RunState`] is the connector run lifecycle as a state machine
//!
//! The I/O is performed by `grove-connector`, which interprets the actions
//! produced here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod hash;
pub mod path;
pub mod state;
pub mod trim;

pub use hash::{canonical_json, hash_entry};
pub use path::{FieldPath, PathError};
pub use state::{RunAction, RunEvent, RunState};
pub use trim::{resume_after, trim_seen};
