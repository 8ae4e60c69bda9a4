//! Scheduled price refresh.
//!
//! Pulls the freshest provider price for each monitored package, compares it
//! against what we have, records variance and cost breakdowns, and hands
//! noteworthy changes to the notification gate. One bad package never stops
//! the batch.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;

use crate::audit::{AuditEvent, AuditHandle};
use crate::config::RefreshConfig;
use crate::costs::extract_costs;
use crate::notify::{NotificationGate, NotificationPayload};
use crate::provider::{PricingProvider, ProviderError};
use crate::store::{NewPriceHistory, Package, PackageStore, PriceChangeUpdate, StoreError};

/// Variance threshold (percent, absolute) at which a package needs a manual quote.
pub const MANUAL_THRESHOLD_PCT: f64 = 5.0;

/// Percentage change of `new` relative to `old`.
///
/// A package with no meaningful base price can't have a variance, so
/// non-positive `old` yields 0.
pub fn variance_pct(old: f64, new: f64) -> f64 {
    if old <= 0.0 {
        return 0.0;
    }
    (new - old) / old * 100.0
}

/// Whether a variance crosses the manual-review threshold. Boundary inclusive.
pub fn needs_manual(variance_pct: f64, threshold_pct: f64) -> bool {
    variance_pct.abs() >= threshold_pct
}

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What happened to a single package during a refresh.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    NoChange,
    PriceChanged {
        old_price: f64,
        new_price: f64,
        variance_pct: f64,
        needs_manual_review: bool,
    },
}

/// Per-item failure detail, carried in the batch report.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshItemError {
    pub package_id: i64,
    pub external_id: String,
    pub error: String,
}

/// Summary of one refresh batch.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub processed: u32,
    pub success: u32,
    pub failed: u32,
    pub price_changes: u32,
    pub errors: Vec<RefreshItemError>,
    pub duration_ms: u64,
}

/// Runs refresh batches against the pricing provider.
pub struct PriceRefresher {
    provider: Arc<dyn PricingProvider>,
    store: Arc<dyn PackageStore>,
    gate: Option<Arc<NotificationGate>>,
    audit: AuditHandle,
    config: RefreshConfig,
}

impl PriceRefresher {
    pub fn new(
        provider: Arc<dyn PricingProvider>,
        store: Arc<dyn PackageStore>,
        gate: Option<Arc<NotificationGate>>,
        audit: AuditHandle,
        config: RefreshConfig,
    ) -> Self {
        Self {
            provider,
            store,
            gate,
            audit,
            config,
        }
    }

    /// Refresh the next batch of stale packages.
    ///
    /// Items are processed sequentially with a short delay between them to
    /// avoid hammering the provider. Item failures are collected in the
    /// report, the batch itself always completes.
    pub async fn run(&self) -> Result<RefreshReport, RefreshError> {
        let started = Instant::now();
        let candidates = self.store.refresh_candidates(self.config.batch_size)?;

        tracing::info!(count = candidates.len(), "Starting price refresh batch");

        let mut report = RefreshReport {
            processed: candidates.len() as u32,
            success: 0,
            failed: 0,
            price_changes: 0,
            errors: Vec::new(),
            duration_ms: 0,
        };

        let mut items = candidates.into_iter().peekable();
        while let Some(pkg) = items.next() {
            match self.refresh_one(&pkg).await {
                Ok(RefreshOutcome::NoChange) => {
                    report.success += 1;
                }
                Ok(RefreshOutcome::PriceChanged { .. }) => {
                    report.success += 1;
                    report.price_changes += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        package_id = pkg.id,
                        external_id = %pkg.external_id,
                        "Refresh failed: {}",
                        e
                    );
                    report.failed += 1;
                    report.errors.push(RefreshItemError {
                        package_id: pkg.id,
                        external_id: pkg.external_id.clone(),
                        error: e.to_string(),
                    });
                }
            }

            if items.peek().is_some() && self.config.item_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.item_delay_ms)).await;
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;

        self.audit
            .emit(AuditEvent::RefreshBatchCompleted {
                processed: report.processed,
                success: report.success,
                failed: report.failed,
                price_changes: report.price_changes,
                duration_ms: report.duration_ms,
            })
            .await;

        tracing::info!(
            processed = report.processed,
            success = report.success,
            failed = report.failed,
            price_changes = report.price_changes,
            duration_ms = report.duration_ms,
            "Price refresh batch completed"
        );

        Ok(report)
    }

    /// Refresh a single package against the provider.
    pub async fn refresh_one(&self, pkg: &Package) -> Result<RefreshOutcome, RefreshError> {
        let (price, detail) = tokio::join!(
            self.provider.current_price(&pkg.external_id),
            self.provider.package_detail(&pkg.external_id),
        );
        let new_price = price?;
        let detail = detail?;

        if (new_price - pkg.current_price).abs() < f64::EPSILON {
            self.store.touch_sync(pkg.id)?;
            return Ok(RefreshOutcome::NoChange);
        }

        let old_price = pkg.current_price;
        let variance = variance_pct(old_price, new_price);
        let manual = needs_manual(variance, self.config.manual_threshold_pct);
        let costs = extract_costs(&detail);

        self.store.apply_price_change(
            pkg.id,
            &PriceChangeUpdate {
                new_price,
                variance_pct: variance,
                needs_manual_review: manual,
                costs,
                destinations: detail.destinations.clone(),
            },
        )?;

        self.store.insert_history(&NewPriceHistory {
            package_id: pkg.id,
            new_price,
            previous_price: old_price,
            variance_amount: new_price - old_price,
            variance_pct: variance,
        })?;

        tracing::info!(
            package_id = pkg.id,
            external_id = %pkg.external_id,
            old_price,
            new_price,
            variance_pct = variance,
            needs_manual_review = manual,
            "Price changed"
        );

        self.audit
            .emit(AuditEvent::PriceChanged {
                package_id: pkg.id,
                external_id: pkg.external_id.clone(),
                old_price,
                new_price,
                variance_pct: variance,
                needs_manual_review: manual,
            })
            .await;

        if self.config.notify_on_price_change {
            if let Some(gate) = &self.gate {
                let gate = Arc::clone(gate);
                let title = pkg.title.clone();
                let package_id = pkg.id;
                // The batch doesn't wait on webhook latency
                tokio::spawn(async move {
                    gate.evaluate(NotificationPayload::PriceChange {
                        package_id,
                        title: title.clone(),
                        old_price,
                        new_price,
                        variance_pct: variance,
                    })
                    .await;

                    if manual {
                        gate.evaluate(NotificationPayload::ManualQuote {
                            package_id,
                            title,
                            variance_pct: variance,
                        })
                        .await;
                    }
                });
            }
        }

        Ok(RefreshOutcome::PriceChanged {
            old_price,
            new_price,
            variance_pct: variance,
            needs_manual_review: manual,
        })
    }
}
