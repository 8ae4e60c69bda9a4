//! Persistence for packages, price history, notification log and run locks.

mod sqlite;
mod types;

pub use sqlite::SqliteStore;
pub use types::*;

use chrono::Duration;
use thiserror::Error;

/// Lock name guarding the price refresh batch job.
pub const LOCK_REFRESH: &str = "refresh";

/// Lock name guarding the supervised requote run.
pub const LOCK_REQUOTE: &str = "requote";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),
}

/// Package record storage.
pub trait PackageStore: Send + Sync {
    /// Insert a package, returns the assigned id.
    fn insert_package(&self, pkg: &NewPackage) -> Result<i64, StoreError>;

    fn get_package(&self, id: i64) -> Result<Package, StoreError>;

    fn get_by_external_id(&self, external_id: &str) -> Result<Package, StoreError>;

    /// Up to `limit` monitored, non-expired packages, stalest first.
    /// Never-synced packages sort before everything else.
    fn refresh_candidates(&self, limit: usize) -> Result<Vec<Package>, StoreError>;

    /// Persist one detected price change: price, variance, review flag,
    /// cost breakdown, destinations and sync timestamp. `original_price`
    /// is set from the pre-change price only if not already set.
    fn apply_price_change(&self, id: i64, change: &PriceChangeUpdate) -> Result<(), StoreError>;

    /// Bump `last_sync_at` without touching anything else (unchanged price).
    fn touch_sync(&self, id: i64) -> Result<(), StoreError>;

    fn insert_history(&self, entry: &NewPriceHistory) -> Result<i64, StoreError>;

    fn history_for(&self, package_id: i64) -> Result<Vec<PriceHistoryEntry>, StoreError>;

    fn set_requote_status(&self, id: i64, status: RequoteStatus) -> Result<(), StoreError>;

    /// Requeue every package stuck at `checking`, returns the count.
    /// Called when a run dies before its in-flight package finishes.
    fn reset_checking(&self) -> Result<u64, StoreError>;

    /// Packages waiting for the requote bot.
    fn pending_requotes(&self) -> Result<Vec<Package>, StoreError>;

    /// Needs-manual packages without a manual-quote notification marker.
    fn needs_manual_unnotified(&self) -> Result<Vec<Package>, StoreError>;

    fn mark_manual_quote_notified(&self, id: i64) -> Result<(), StoreError>;

    fn set_creative_update_needed(&self, id: i64, needed: bool) -> Result<(), StoreError>;
}

/// Append-only notification send log.
pub trait NotificationStore: Send + Sync {
    fn insert_log(&self, log: &NewNotificationLog) -> Result<i64, StoreError>;

    fn recent_logs(&self, limit: i64) -> Result<Vec<NotificationLogEntry>, StoreError>;
}

/// TTL'd named locks guarding overlapping batch/run invocations.
pub trait RunLockStore: Send + Sync {
    /// Acquire the named lock if no unexpired holder exists.
    fn try_acquire(&self, name: &str, ttl: Duration) -> Result<bool, StoreError>;

    fn release(&self, name: &str) -> Result<(), StoreError>;
}
