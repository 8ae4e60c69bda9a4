use serde::{Deserialize, Serialize};

/// Terminal status of one package within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageOutcomeStatus {
    Updated,
    NoChange,
    NeedsManual,
    Error,
}

/// How one package ended the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageOutcome {
    pub package_id: i64,
    pub external_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variance_pct: Option<f64>,
    pub status: PackageOutcomeStatus,
}

/// Accumulated state of one supervised run.
///
/// Counts come from the bot's own summary lines where it prints them, and
/// from per-package terminal lines otherwise.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub processed: u32,
    pub success: u32,
    pub errors: u32,
    pub needs_manual: u32,
    pub auto_updated: u32,
    pub no_change: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    pub outcomes: Vec<PackageOutcome>,
}

/// One typed, streamed unit of run progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Run-level stage transition (login, logged_in, found_packages).
    Status {
        stage: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        total: Option<u32>,
    },
    /// The bot moved on to a new package.
    PackageStart { id: i64, external_id: String },
    /// Package title became known.
    PackageInfo { id: i64, title: String },
    /// Free-text progress for the current package.
    PackageStatus { id: i64, message: String },
    /// Variance the bot computed for the current package.
    PackageVariance { id: i64, variance_pct: f64 },
    /// The current package reached a terminal status.
    PackageDone {
        id: i64,
        status: PackageOutcomeStatus,
    },
    /// Terminal frame of a successful run.
    Complete { summary: RunSummary },
    /// Terminal frame of a failed run (spawn failure, timeout, bad exit).
    Error { message: String },
}

impl ProgressEvent {
    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_tagged() {
        let event = ProgressEvent::PackageStart {
            id: 10,
            external_id: "9001".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "package_start");
        assert_eq!(json["id"], 10);
        assert_eq!(json["external_id"], "9001");
    }

    #[test]
    fn test_status_omits_empty_total() {
        let event = ProgressEvent::Status {
            stage: "login".to_string(),
            total: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("total").is_none());
    }

    #[test]
    fn test_terminal_events() {
        assert!(ProgressEvent::Complete {
            summary: RunSummary::default()
        }
        .is_terminal());
        assert!(ProgressEvent::Error {
            message: "x".to_string()
        }
        .is_terminal());
        assert!(!ProgressEvent::Status {
            stage: "login".to_string(),
            total: None
        }
        .is_terminal());
    }

    #[test]
    fn test_package_done_status_names() {
        let event = ProgressEvent::PackageDone {
            id: 3,
            status: PackageOutcomeStatus::NeedsManual,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["status"], "needs_manual");
    }
}
