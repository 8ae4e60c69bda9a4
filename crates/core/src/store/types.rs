use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::costs::CostBreakdown;

/// Where a package sits in the interactive requote flow.
///
/// Only the requote bot's completion handler moves this field; the price
/// refresh batch job never touches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequoteStatus {
    Pending,
    Checking,
    NeedsManual,
    Completed,
}

impl RequoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequoteStatus::Pending => "pending",
            RequoteStatus::Checking => "checking",
            RequoteStatus::NeedsManual => "needs_manual",
            RequoteStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RequoteStatus::Pending),
            "checking" => Some(RequoteStatus::Checking),
            "needs_manual" => Some(RequoteStatus::NeedsManual),
            "completed" => Some(RequoteStatus::Completed),
            _ => None,
        }
    }
}

/// A monitored travel package.
#[derive(Debug, Clone, Serialize)]
pub struct Package {
    pub id: i64,
    /// The provider's own id for this package.
    pub external_id: String,
    pub title: String,
    pub destination: Option<String>,
    pub current_price: f64,
    /// Price before the first detected change; set once, then kept.
    pub original_price: Option<f64>,
    /// Variance of the latest detected change, percent. None until a change is seen.
    pub variance_pct: Option<f64>,
    pub requote_status: RequoteStatus,
    pub monitor_enabled: bool,
    /// Latest change crossed the manual-review threshold.
    pub needs_manual_review: bool,
    /// Set by the price-change notification path for design workflows.
    pub creative_update_needed: bool,
    /// Dedup marker for manual-quote notifications.
    pub manual_quote_notified_at: Option<DateTime<Utc>>,
    pub air_cost: Option<f64>,
    pub land_cost: Option<f64>,
    pub agency_fee: Option<f64>,
    pub departure_date: Option<String>,
    pub airline_code: Option<String>,
    pub airline_name: Option<String>,
    pub flight_numbers: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_sync_at: Option<DateTime<Utc>>,
}

/// Fields for creating a package (import seam and tests).
#[derive(Debug, Clone)]
pub struct NewPackage {
    pub external_id: String,
    pub title: String,
    pub destination: Option<String>,
    pub current_price: f64,
    pub monitor_enabled: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Everything the refresh job persists for one detected price change.
#[derive(Debug, Clone)]
pub struct PriceChangeUpdate {
    pub new_price: f64,
    pub variance_pct: f64,
    pub needs_manual_review: bool,
    pub costs: CostBreakdown,
    pub destinations: Vec<String>,
}

/// Immutable record of one detected price change.
#[derive(Debug, Clone, Serialize)]
pub struct PriceHistoryEntry {
    pub id: i64,
    pub package_id: i64,
    pub new_price: f64,
    pub previous_price: f64,
    pub variance_amount: f64,
    pub variance_pct: f64,
    pub created_at: DateTime<Utc>,
}

/// Fields for appending a price history entry.
#[derive(Debug, Clone)]
pub struct NewPriceHistory {
    pub package_id: i64,
    pub new_price: f64,
    pub previous_price: f64,
    pub variance_amount: f64,
    pub variance_pct: f64,
}

/// Outcome recorded for every notification send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLogStatus {
    Sent,
    Failed,
}

impl NotificationLogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationLogStatus::Sent => "sent",
            NotificationLogStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sent" => Some(NotificationLogStatus::Sent),
            "failed" => Some(NotificationLogStatus::Failed),
            _ => None,
        }
    }
}

/// Append-only audit record of a notification send attempt.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationLogEntry {
    pub id: i64,
    pub notification_type: String,
    pub channel: String,
    pub recipient: String,
    pub package_id: Option<i64>,
    pub title: String,
    pub payload: serde_json::Value,
    pub status: NotificationLogStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields for appending a notification log entry.
#[derive(Debug, Clone)]
pub struct NewNotificationLog {
    pub notification_type: String,
    pub channel: String,
    pub recipient: String,
    pub package_id: Option<i64>,
    pub title: String,
    pub payload: serde_json::Value,
    pub status: NotificationLogStatus,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requote_status_round_trip() {
        for status in [
            RequoteStatus::Pending,
            RequoteStatus::Checking,
            RequoteStatus::NeedsManual,
            RequoteStatus::Completed,
        ] {
            assert_eq!(RequoteStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(RequoteStatus::parse("bogus"), None);
    }

    #[test]
    fn test_requote_status_serde_snake_case() {
        let json = serde_json::to_string(&RequoteStatus::NeedsManual).unwrap();
        assert_eq!(json, r#""needs_manual""#);
    }
}
