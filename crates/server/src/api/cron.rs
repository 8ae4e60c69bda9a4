//! Scheduler-facing refresh endpoint.
//!
//! External cron services call this with a shared bearer secret. The
//! endpoint runs one refresh batch inline and reports the batch result.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    Json,
};
use chrono::Duration;
use serde::Serialize;
use std::sync::Arc;

use faretrack_core::refresh::RefreshItemError;
use faretrack_core::store::LOCK_REFRESH;

use crate::metrics::{REFRESH_BATCHES_TOTAL, REFRESH_PRICE_CHANGES_TOTAL};
use crate::state::AppState;

/// Extra lock lifetime beyond the expected batch duration, seconds.
const LOCK_MARGIN_SECS: u64 = 60;

#[derive(Debug, Serialize)]
pub struct CronErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub processed: u32,
    pub success_count: u32,
    pub failed: u32,
    pub price_changes: u32,
    pub errors: Vec<RefreshItemError>,
    pub duration: u64,
}

/// Run one price refresh batch.
///
/// Both GET and POST map here. Some cron services can only issue GETs.
pub async fn refresh_packages(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<RefreshResponse>, (StatusCode, Json<CronErrorResponse>)> {
    let secret = match &state.config().cron.secret {
        Some(secret) => secret.clone(),
        None => {
            tracing::error!("Cron endpoint called but no secret is configured");
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(CronErrorResponse {
                    error: "cron secret not configured".to_string(),
                }),
            ));
        }
    };

    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", secret))
        .unwrap_or(false);

    if !authorized {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(CronErrorResponse {
                error: "invalid or missing bearer token".to_string(),
            }),
        ));
    }

    // One refresh batch at a time, across all callers.
    let refresh = &state.config().refresh;
    let worst_case_secs = refresh.batch_size as u64 * refresh.item_delay_ms / 1000;
    let ttl = Duration::seconds((worst_case_secs + LOCK_MARGIN_SECS) as i64);

    let acquired = state.locks().try_acquire(LOCK_REFRESH, ttl).map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(CronErrorResponse {
                error: format!("Failed to acquire refresh lock: {}", e),
            }),
        )
    })?;

    if !acquired {
        return Err((
            StatusCode::CONFLICT,
            Json(CronErrorResponse {
                error: "a refresh batch is already running".to_string(),
            }),
        ));
    }

    let result = state.refresher().run().await;

    if let Err(e) = state.locks().release(LOCK_REFRESH) {
        tracing::warn!("Failed to release refresh lock: {}", e);
    }

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            REFRESH_BATCHES_TOTAL.with_label_values(&["error"]).inc();
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(CronErrorResponse {
                    error: format!("Refresh batch failed: {}", e),
                }),
            ));
        }
    };

    let result_label = if report.failed > 0 { "with_failures" } else { "ok" };
    REFRESH_BATCHES_TOTAL.with_label_values(&[result_label]).inc();
    REFRESH_PRICE_CHANGES_TOTAL.inc_by(report.price_changes as u64);

    Ok(Json(RefreshResponse {
        processed: report.processed,
        success_count: report.success,
        failed: report.failed,
        price_changes: report.price_changes,
        errors: report.errors,
        duration: report.duration_ms,
    }))
}
