//! Notification gating and delivery.
//!
//! Detection code never talks to a channel directly. It hands a payload to
//! the [`NotificationGate`], which decides whether the event is worth a
//! message (enabled flags, variance thresholds, dedup markers), renders it,
//! sends it through the configured channel and records the attempt in the
//! notification log.

mod channel;
mod gate;
mod types;

pub use channel::*;
pub use gate::*;
pub use types::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Store error: {0}")]
    Store(String),
}
