use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audit event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    // System events
    ServiceStarted {
        version: String,
        config_hash: String,
    },
    ServiceStopped {
        reason: String,
    },

    // Price refresh events
    /// One scheduled refresh batch finished (emitted even when every item failed).
    RefreshBatchCompleted {
        /// Packages attempted in this batch
        processed: u32,
        /// Packages refreshed without error
        success: u32,
        /// Packages that failed (provider or store error)
        failed: u32,
        /// Packages whose price actually moved
        price_changes: u32,
        /// Wall-clock batch duration in milliseconds
        duration_ms: u64,
    },
    /// A package's provider price differed from the stored one.
    PriceChanged {
        package_id: i64,
        external_id: String,
        old_price: f64,
        new_price: f64,
        variance_pct: f64,
        /// Whether the variance crossed the manual-review threshold
        needs_manual_review: bool,
    },

    // Requote run events
    RequoteRunStarted {
        run_id: String,
        /// Packages queued for the bot at run start
        pending_count: u32,
    },
    RequoteRunCompleted {
        run_id: String,
        updated: u32,
        no_change: u32,
        needs_manual: u32,
        errors: u32,
        duration_ms: u64,
    },
    /// Run ended abnormally (spawn failure, timeout kill, cancellation).
    RequoteRunFailed {
        run_id: String,
        reason: String,
        duration_ms: u64,
    },

    // Notification events
    NotificationSent {
        notification_type: String,
        channel: String,
        package_id: Option<i64>,
        title: String,
    },
    /// The gate decided not to send (disabled, below threshold, already notified).
    NotificationSuppressed {
        notification_type: String,
        package_id: Option<i64>,
        reason: String,
    },
    NotificationFailed {
        notification_type: String,
        channel: String,
        package_id: Option<i64>,
        error: String,
    },
}

impl AuditEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ServiceStarted { .. } => "service_started",
            Self::ServiceStopped { .. } => "service_stopped",
            Self::RefreshBatchCompleted { .. } => "refresh_batch_completed",
            Self::PriceChanged { .. } => "price_changed",
            Self::RequoteRunStarted { .. } => "requote_run_started",
            Self::RequoteRunCompleted { .. } => "requote_run_completed",
            Self::RequoteRunFailed { .. } => "requote_run_failed",
            Self::NotificationSent { .. } => "notification_sent",
            Self::NotificationSuppressed { .. } => "notification_suppressed",
            Self::NotificationFailed { .. } => "notification_failed",
        }
    }

    pub fn package_id(&self) -> Option<i64> {
        match self {
            Self::PriceChanged { package_id, .. } => Some(*package_id),
            Self::NotificationSent { package_id, .. }
            | Self::NotificationSuppressed { package_id, .. }
            | Self::NotificationFailed { package_id, .. } => *package_id,
            _ => None,
        }
    }

    pub fn run_id(&self) -> Option<&str> {
        match self {
            Self::RequoteRunStarted { run_id, .. }
            | Self::RequoteRunCompleted { run_id, .. }
            | Self::RequoteRunFailed { run_id, .. } => Some(run_id),
            _ => None,
        }
    }
}

/// A persisted audit record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub package_id: Option<i64>,
    pub run_id: Option<String>,
    pub data: AuditEvent,
}
