//! Supervised requote runs.
//!
//! One run spawns the external automation bot, tails its stdout, turns the
//! free-text log into typed [`ProgressEvent`]s and accumulates a
//! [`RunSummary`]. The bot's wording is the only contract we have with it,
//! so all pattern matching lives in [`LogParser`] and nothing else in the
//! system ever sees raw text.

mod events;
mod parser;
mod supervisor;

pub use events::*;
pub use parser::*;
pub use supervisor::*;
