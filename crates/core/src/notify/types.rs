use serde::{Deserialize, Serialize};

/// Notification categories, each independently toggleable in config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    PriceChange,
    ManualQuote,
    AdUnderperformance,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PriceChange => "price_change",
            Self::ManualQuote => "manual_quote",
            Self::AdUnderperformance => "ad_underperformance",
        }
    }
}

/// A detected event handed to the gate for evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationPayload {
    PriceChange {
        package_id: i64,
        title: String,
        old_price: f64,
        new_price: f64,
        variance_pct: f64,
    },
    ManualQuote {
        package_id: i64,
        title: String,
        variance_pct: f64,
    },
    AdUnderperformance {
        campaign: String,
        ctr_pct: f64,
        cpl: f64,
    },
}

impl NotificationPayload {
    pub fn notification_type(&self) -> NotificationType {
        match self {
            Self::PriceChange { .. } => NotificationType::PriceChange,
            Self::ManualQuote { .. } => NotificationType::ManualQuote,
            Self::AdUnderperformance { .. } => NotificationType::AdUnderperformance,
        }
    }

    pub fn package_id(&self) -> Option<i64> {
        match self {
            Self::PriceChange { package_id, .. } | Self::ManualQuote { package_id, .. } => {
                Some(*package_id)
            }
            Self::AdUnderperformance { .. } => None,
        }
    }
}

/// A rendered message, ready for a channel to deliver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub title: String,
    pub body: String,
}

/// What the gate decided and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationOutcome {
    pub sent: bool,
    /// Suppression or failure reason, `None` on success
    pub reason: Option<String>,
}

impl NotificationOutcome {
    pub fn sent() -> Self {
        Self {
            sent: true,
            reason: None,
        }
    }

    pub fn suppressed(reason: impl Into<String>) -> Self {
        Self {
            sent: false,
            reason: Some(reason.into()),
        }
    }
}
