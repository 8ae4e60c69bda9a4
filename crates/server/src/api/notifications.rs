//! Manual-quote notification sweep endpoint.
//!
//! POST scans packages flagged for manual review that have not been
//! notified yet and pushes one notification per package through the
//! gate. Packages already notified are skipped by the gate's dedup
//! marker, so repeated calls are idempotent.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

use faretrack_core::notify::NotificationPayload;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct NotificationErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct CheckManualQuotesResponse {
    pub checked: usize,
    pub sent: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualQuoteStatusResponse {
    pub pending_count: usize,
}

/// Notify for every manually-flagged package that has not been notified.
pub async fn check_manual_quotes(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CheckManualQuotesResponse>, (StatusCode, Json<NotificationErrorResponse>)> {
    let gate = state.gate().ok_or_else(|| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(NotificationErrorResponse {
                error: "notification channel not configured".to_string(),
            }),
        )
    })?;

    let candidates = state.packages().needs_manual_unnotified().map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(NotificationErrorResponse {
                error: format!("Failed to list manual-review packages: {}", e),
            }),
        )
    })?;

    let checked = candidates.len();
    let mut sent = 0;

    for package in candidates {
        let outcome = gate
            .evaluate(NotificationPayload::ManualQuote {
                package_id: package.id,
                title: package.title.clone(),
                variance_pct: package.variance_pct.unwrap_or(0.0),
            })
            .await;
        if outcome.sent {
            sent += 1;
        }
    }

    tracing::info!(checked, sent, "Manual quote notification sweep complete");

    Ok(Json(CheckManualQuotesResponse { checked, sent }))
}

/// Count packages awaiting a manual-quote notification.
pub async fn manual_quote_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ManualQuoteStatusResponse>, (StatusCode, Json<NotificationErrorResponse>)> {
    let candidates = state.packages().needs_manual_unnotified().map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(NotificationErrorResponse {
                error: format!("Failed to list manual-review packages: {}", e),
            }),
        )
    })?;

    Ok(Json(ManualQuoteStatusResponse {
        pending_count: candidates.len(),
    }))
}
