//! Built-in pipeline stages.

mod filter;
mod split;

pub use filter::FilterProcessor;
pub use split::SplitProcessor;
