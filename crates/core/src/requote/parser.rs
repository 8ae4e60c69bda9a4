use once_cell::sync::Lazy;
use regex_lite::Regex;

use super::{PackageOutcome, PackageOutcomeStatus, ProgressEvent, RunSummary};

static FOUND_PACKAGES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Found (\d+) packages to check").unwrap());
static CHECKING_PACKAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Checking package (\d+) \(ext: ([^)]+)\)").unwrap());
static BOT_TITLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[Bot\] Title: (.+)").unwrap());
static VARIANCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Variance: (-?\d+(?:\.\d+)?)%").unwrap());
static SUMMARY_PROCESSED: Lazy<Regex> = Lazy::new(|| Regex::new(r"Processed: (\d+)").unwrap());
static SUMMARY_SUCCESS: Lazy<Regex> = Lazy::new(|| Regex::new(r"Success: (\d+)").unwrap());
static SUMMARY_ERRORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"Errors: (\d+)").unwrap());
static SUMMARY_DURATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Duration: (\d+(?:\.\d+)?)s").unwrap());
static BOT_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[Bot\] (.+)").unwrap());

#[derive(Debug, Clone)]
struct CurrentPackage {
    id: i64,
    external_id: String,
    title: Option<String>,
    variance_pct: Option<f64>,
}

/// Line-at-a-time classifier over the bot's free-text output.
///
/// Patterns are tried in priority order, first match wins, unknown lines are
/// dropped. The only carried state is the package currently being processed,
/// reset on each "Checking package" line, plus the accumulating summary.
pub struct LogParser {
    current: Option<CurrentPackage>,
    summary: RunSummary,
}

impl LogParser {
    pub fn new() -> Self {
        Self {
            current: None,
            summary: RunSummary::default(),
        }
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn into_summary(self) -> RunSummary {
        self.summary
    }

    /// Classify one output line, returning a progress event when the line
    /// maps to one. Summary-only lines update counters without emitting.
    pub fn feed_line(&mut self, line: &str) -> Option<ProgressEvent> {
        if line.contains("Navigating to") {
            return Some(ProgressEvent::Status {
                stage: "login".to_string(),
                total: None,
            });
        }

        if line.contains("Login successful") {
            return Some(ProgressEvent::Status {
                stage: "logged_in".to_string(),
                total: None,
            });
        }

        if let Some(caps) = FOUND_PACKAGES.captures(line) {
            let total = caps[1].parse().ok();
            return Some(ProgressEvent::Status {
                stage: "found_packages".to_string(),
                total,
            });
        }

        if let Some(caps) = CHECKING_PACKAGE.captures(line) {
            let id: i64 = caps[1].parse().ok()?;
            let external_id = caps[2].to_string();
            self.current = Some(CurrentPackage {
                id,
                external_id: external_id.clone(),
                title: None,
                variance_pct: None,
            });
            return Some(ProgressEvent::PackageStart { id, external_id });
        }

        if let Some(caps) = BOT_TITLE.captures(line) {
            let current = self.current.as_mut()?;
            let title = caps[1].trim().to_string();
            current.title = Some(title.clone());
            return Some(ProgressEvent::PackageInfo {
                id: current.id,
                title,
            });
        }

        if let Some(caps) = VARIANCE.captures(line) {
            let current = self.current.as_mut()?;
            let variance_pct: f64 = caps[1].parse().ok()?;
            current.variance_pct = Some(variance_pct);
            return Some(ProgressEvent::PackageVariance {
                id: current.id,
                variance_pct,
            });
        }

        if line.contains("NEEDS MANUAL REVIEW") {
            return self.finish_package(PackageOutcomeStatus::NeedsManual);
        }

        if line.contains("Package updated successfully") {
            return self.finish_package(PackageOutcomeStatus::Updated);
        }

        if line.contains("No price change") {
            return self.finish_package(PackageOutcomeStatus::NoChange);
        }

        if line.contains("Error checking package") {
            return self.finish_package(PackageOutcomeStatus::Error);
        }

        if let Some(caps) = SUMMARY_PROCESSED.captures(line) {
            if let Ok(n) = caps[1].parse() {
                self.summary.processed = n;
            }
            return None;
        }

        if let Some(caps) = SUMMARY_SUCCESS.captures(line) {
            if let Ok(n) = caps[1].parse() {
                self.summary.success = n;
            }
            return None;
        }

        if let Some(caps) = SUMMARY_ERRORS.captures(line) {
            if let Ok(n) = caps[1].parse() {
                self.summary.errors = n;
            }
            return None;
        }

        if let Some(caps) = SUMMARY_DURATION.captures(line) {
            if let Ok(n) = caps[1].parse() {
                self.summary.duration_secs = Some(n);
            }
            return None;
        }

        // Any other bot-prefixed line is free-text progress for the current package
        if let Some(caps) = BOT_PREFIX.captures(line) {
            let current = self.current.as_ref()?;
            return Some(ProgressEvent::PackageStatus {
                id: current.id,
                message: caps[1].trim().to_string(),
            });
        }

        None
    }

    fn finish_package(&mut self, status: PackageOutcomeStatus) -> Option<ProgressEvent> {
        let current = self.current.take()?;

        match status {
            PackageOutcomeStatus::NeedsManual => self.summary.needs_manual += 1,
            PackageOutcomeStatus::Updated => self.summary.auto_updated += 1,
            PackageOutcomeStatus::NoChange => self.summary.no_change += 1,
            PackageOutcomeStatus::Error => self.summary.errors += 1,
        }

        self.summary.outcomes.push(PackageOutcome {
            package_id: current.id,
            external_id: current.external_id,
            title: current.title,
            variance_pct: current.variance_pct,
            status,
        });

        Some(ProgressEvent::PackageDone {
            id: current.id,
            status,
        })
    }
}

impl Default for LogParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(parser: &mut LogParser, lines: &[&str]) -> Vec<ProgressEvent> {
        lines
            .iter()
            .filter_map(|line| parser.feed_line(line))
            .collect()
    }

    #[test]
    fn test_login_stages() {
        let mut parser = LogParser::new();

        assert_eq!(
            parser.feed_line("Navigating to https://portal.example.com"),
            Some(ProgressEvent::Status {
                stage: "login".to_string(),
                total: None
            })
        );
        assert_eq!(
            parser.feed_line("Login successful"),
            Some(ProgressEvent::Status {
                stage: "logged_in".to_string(),
                total: None
            })
        );
        assert_eq!(
            parser.feed_line("Found 12 packages to check"),
            Some(ProgressEvent::Status {
                stage: "found_packages".to_string(),
                total: Some(12)
            })
        );
    }

    #[test]
    fn test_needs_manual_transcript() {
        let mut parser = LogParser::new();
        let events = feed_all(
            &mut parser,
            &[
                "Checking package 10 (ext: 9001)",
                "Variance: 6.5%",
                "NEEDS MANUAL REVIEW",
            ],
        );

        assert_eq!(
            events,
            vec![
                ProgressEvent::PackageStart {
                    id: 10,
                    external_id: "9001".to_string()
                },
                ProgressEvent::PackageVariance {
                    id: 10,
                    variance_pct: 6.5
                },
                ProgressEvent::PackageDone {
                    id: 10,
                    status: PackageOutcomeStatus::NeedsManual
                },
            ]
        );

        let summary = parser.summary();
        assert_eq!(summary.needs_manual, 1);
        assert_eq!(summary.outcomes.len(), 1);
        assert_eq!(summary.outcomes[0].package_id, 10);
        assert_eq!(summary.outcomes[0].variance_pct, Some(6.5));
        assert_eq!(
            summary.outcomes[0].status,
            PackageOutcomeStatus::NeedsManual
        );
    }

    #[test]
    fn test_title_captured_on_current_package() {
        let mut parser = LogParser::new();

        // Title lines before any package are dropped
        assert!(parser.feed_line("[Bot] Title: Orphan Title").is_none());

        parser.feed_line("Checking package 3 (ext: 9003)");
        assert_eq!(
            parser.feed_line("[Bot] Title: Cancun Getaway"),
            Some(ProgressEvent::PackageInfo {
                id: 3,
                title: "Cancun Getaway".to_string()
            })
        );

        parser.feed_line("Package updated successfully");
        assert_eq!(
            parser.summary().outcomes[0].title.as_deref(),
            Some("Cancun Getaway")
        );
    }

    #[test]
    fn test_generic_bot_line_is_package_status() {
        let mut parser = LogParser::new();
        parser.feed_line("Checking package 3 (ext: 9003)");

        assert_eq!(
            parser.feed_line("[Bot] Opening pricing tab"),
            Some(ProgressEvent::PackageStatus {
                id: 3,
                message: "Opening pricing tab".to_string()
            })
        );
    }

    #[test]
    fn test_outcome_counters() {
        let mut parser = LogParser::new();
        feed_all(
            &mut parser,
            &[
                "Checking package 1 (ext: a)",
                "Package updated successfully",
                "Checking package 2 (ext: b)",
                "No price change",
                "Checking package 3 (ext: c)",
                "NEEDS MANUAL REVIEW",
                "Checking package 4 (ext: d)",
                "Error checking package 4: timeout",
            ],
        );

        let summary = parser.summary();
        assert_eq!(summary.auto_updated, 1);
        assert_eq!(summary.no_change, 1);
        assert_eq!(summary.needs_manual, 1);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.outcomes.len(), 4);
    }

    #[test]
    fn test_summary_lines_do_not_emit() {
        let mut parser = LogParser::new();

        assert!(parser.feed_line("Processed: 12").is_none());
        assert!(parser.feed_line("Success: 10").is_none());
        assert!(parser.feed_line("Errors: 2").is_none());
        assert!(parser.feed_line("Duration: 94.3s").is_none());

        let summary = parser.summary();
        assert_eq!(summary.processed, 12);
        assert_eq!(summary.success, 10);
        assert_eq!(summary.errors, 2);
        assert_eq!(summary.duration_secs, Some(94.3));
    }

    #[test]
    fn test_negative_variance() {
        let mut parser = LogParser::new();
        parser.feed_line("Checking package 5 (ext: 9005)");

        assert_eq!(
            parser.feed_line("Variance: -7.25%"),
            Some(ProgressEvent::PackageVariance {
                id: 5,
                variance_pct: -7.25
            })
        );
    }

    #[test]
    fn test_unknown_lines_ignored() {
        let mut parser = LogParser::new();
        assert!(parser.feed_line("").is_none());
        assert!(parser.feed_line("random noise").is_none());
        assert!(parser
            .feed_line("DevTools listening on ws://127.0.0.1:9222")
            .is_none());
        assert_eq!(parser.summary(), &RunSummary::default());
    }

    #[test]
    fn test_done_without_current_package_ignored() {
        let mut parser = LogParser::new();
        assert!(parser.feed_line("NEEDS MANUAL REVIEW").is_none());
        assert_eq!(parser.summary().needs_manual, 0);
    }

    #[test]
    fn test_double_done_counts_once() {
        let mut parser = LogParser::new();
        parser.feed_line("Checking package 1 (ext: a)");
        assert!(parser.feed_line("Package updated successfully").is_some());
        // Terminal line without a fresh package start is dropped
        assert!(parser.feed_line("Package updated successfully").is_none());
        assert_eq!(parser.summary().auto_updated, 1);
    }
}
