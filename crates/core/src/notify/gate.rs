use std::sync::Arc;

use crate::audit::{AuditEvent, AuditHandle};
use crate::config::NotifierConfig;
use crate::store::{NewNotificationLog, NotificationLogStatus, NotificationStore, PackageStore};

use super::{NotificationChannel, NotificationMessage, NotificationOutcome, NotificationPayload};

/// Decides whether a detected event becomes a message.
///
/// Every actual send attempt, successful or not, leaves a row in the
/// notification log. Suppressed events leave no row, only an audit event.
pub struct NotificationGate {
    config: NotifierConfig,
    channel: Arc<dyn NotificationChannel>,
    packages: Arc<dyn PackageStore>,
    log: Arc<dyn NotificationStore>,
    audit: AuditHandle,
}

impl NotificationGate {
    pub fn new(
        config: NotifierConfig,
        channel: Arc<dyn NotificationChannel>,
        packages: Arc<dyn PackageStore>,
        log: Arc<dyn NotificationStore>,
        audit: AuditHandle,
    ) -> Self {
        Self {
            config,
            channel,
            packages,
            log,
            audit,
        }
    }

    /// Evaluate a payload and send it if no gate rule suppresses it.
    pub async fn evaluate(&self, payload: NotificationPayload) -> NotificationOutcome {
        if let Some(reason) = self.suppression_reason(&payload) {
            tracing::debug!(
                notification_type = payload.notification_type().as_str(),
                reason = %reason,
                "Notification suppressed"
            );
            self.audit
                .emit(AuditEvent::NotificationSuppressed {
                    notification_type: payload.notification_type().as_str().to_string(),
                    package_id: payload.package_id(),
                    reason: reason.clone(),
                })
                .await;
            return NotificationOutcome::suppressed(reason);
        }

        self.deliver(&payload).await
    }

    fn suppression_reason(&self, payload: &NotificationPayload) -> Option<String> {
        if !self.config.enabled {
            return Some("notifications_disabled".to_string());
        }

        match payload {
            NotificationPayload::PriceChange { variance_pct, .. } => {
                if !self.config.notify_price_change {
                    return Some("type_disabled".to_string());
                }
                if variance_pct.abs() < self.config.price_change_threshold_pct {
                    return Some("below_threshold".to_string());
                }
            }
            NotificationPayload::ManualQuote { package_id, .. } => {
                if !self.config.notify_manual_quote {
                    return Some("type_disabled".to_string());
                }
                match self.packages.get_package(*package_id) {
                    Ok(pkg) if pkg.manual_quote_notified_at.is_some() => {
                        return Some("already_notified".to_string());
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(package_id, "Failed to load package for dedup check: {}", e);
                        return Some("package_lookup_failed".to_string());
                    }
                }
            }
            NotificationPayload::AdUnderperformance { ctr_pct, cpl, .. } => {
                if !self.config.notify_underperformance {
                    return Some("type_disabled".to_string());
                }
                if *ctr_pct >= self.config.ctr_floor_pct && *cpl <= self.config.cpl_ceiling {
                    return Some("within_bounds".to_string());
                }
            }
        }

        None
    }

    async fn deliver(&self, payload: &NotificationPayload) -> NotificationOutcome {
        let message = render_message(payload);
        let notification_type = payload.notification_type();
        let package_id = payload.package_id();

        let send_result = self.channel.send(&message).await;

        let (status, error) = match &send_result {
            Ok(()) => (NotificationLogStatus::Sent, None),
            Err(e) => (NotificationLogStatus::Failed, Some(e.to_string())),
        };

        let log_entry = NewNotificationLog {
            notification_type: notification_type.as_str().to_string(),
            channel: self.channel.name().to_string(),
            recipient: self.channel.recipient().to_string(),
            package_id,
            title: message.title.clone(),
            payload: serde_json::to_value(payload).unwrap_or(serde_json::Value::Null),
            status,
            error: error.clone(),
        };
        if let Err(e) = self.log.insert_log(&log_entry) {
            tracing::warn!("Failed to record notification log entry: {}", e);
        }

        match send_result {
            Ok(()) => {
                tracing::info!(
                    notification_type = notification_type.as_str(),
                    package_id,
                    "Notification sent"
                );
                self.on_sent(payload);
                self.audit
                    .emit(AuditEvent::NotificationSent {
                        notification_type: notification_type.as_str().to_string(),
                        channel: self.channel.name().to_string(),
                        package_id,
                        title: message.title,
                    })
                    .await;
                NotificationOutcome::sent()
            }
            Err(e) => {
                tracing::warn!(
                    notification_type = notification_type.as_str(),
                    package_id,
                    "Notification failed: {}",
                    e
                );
                self.audit
                    .emit(AuditEvent::NotificationFailed {
                        notification_type: notification_type.as_str().to_string(),
                        channel: self.channel.name().to_string(),
                        package_id,
                        error: e.to_string(),
                    })
                    .await;
                NotificationOutcome::suppressed(format!("channel_error: {}", e))
            }
        }
    }

    /// Post-send bookkeeping on the package row.
    fn on_sent(&self, payload: &NotificationPayload) {
        match payload {
            NotificationPayload::PriceChange { package_id, .. } => {
                // A price move big enough to notify also invalidates ad creatives
                if let Err(e) = self.packages.set_creative_update_needed(*package_id, true) {
                    tracing::warn!(package_id, "Failed to flag creative update: {}", e);
                }
            }
            NotificationPayload::ManualQuote { package_id, .. } => {
                if let Err(e) = self.packages.mark_manual_quote_notified(*package_id) {
                    tracing::warn!(package_id, "Failed to mark manual quote notified: {}", e);
                }
            }
            NotificationPayload::AdUnderperformance { .. } => {}
        }
    }
}

fn render_message(payload: &NotificationPayload) -> NotificationMessage {
    match payload {
        NotificationPayload::PriceChange {
            title,
            old_price,
            new_price,
            variance_pct,
            ..
        } => NotificationMessage {
            title: format!("Price change: {}", title),
            body: format!(
                "Price moved from {:.2} to {:.2} ({:+.2}%)",
                old_price, new_price, variance_pct
            ),
        },
        NotificationPayload::ManualQuote {
            title,
            variance_pct,
            ..
        } => NotificationMessage {
            title: format!("Manual quote needed: {}", title),
            body: format!(
                "Variance of {:+.2}% exceeds the automatic requote threshold, review required",
                variance_pct
            ),
        },
        NotificationPayload::AdUnderperformance {
            campaign,
            ctr_pct,
            cpl,
        } => NotificationMessage {
            title: format!("Ad underperformance: {}", campaign),
            body: format!("CTR {:.2}%, CPL {:.2}", ctr_pct, cpl),
        },
    }
}
