//! Interactive requote run endpoint.
//!
//! POST starts one supervised bot run and streams its progress as
//! server-sent events. The stream always ends with a terminal frame
//! (`complete` or `error`). GET reports what a run would pick up.

use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use chrono::Duration;
use futures::stream::Stream;
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;

use faretrack_core::store::LOCK_REQUOTE;
use faretrack_core::ProgressEvent;

use crate::metrics::REQUOTE_RUNS_TOTAL;
use crate::state::AppState;

/// Extra lock lifetime beyond the bot timeout, seconds.
const LOCK_MARGIN_SECS: u64 = 60;

#[derive(Debug, Serialize)]
pub struct RequoteErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequoteStatusResponse {
    pub pending_count: usize,
    pub packages: Vec<PendingPackage>,
}

#[derive(Debug, Serialize)]
pub struct PendingPackage {
    pub id: i64,
    pub external_id: String,
    pub title: String,
}

/// Start a supervised requote run and stream progress events.
pub async fn run_requote(
    State(state): State<Arc<AppState>>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, Json<RequoteErrorResponse>)>
{
    let ttl = Duration::seconds((state.config().bot.timeout_secs + LOCK_MARGIN_SECS) as i64);

    let acquired = state
        .locks()
        .try_acquire(LOCK_REQUOTE, ttl)
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(RequoteErrorResponse {
                    error: format!("Failed to acquire requote lock: {}", e),
                }),
            )
        })?;

    if !acquired {
        REQUOTE_RUNS_TOTAL.with_label_values(&["rejected"]).inc();
        return Err((
            StatusCode::CONFLICT,
            Json(RequoteErrorResponse {
                error: "a requote run is already in progress".to_string(),
            }),
        ));
    }

    REQUOTE_RUNS_TOTAL.with_label_values(&["accepted"]).inc();

    let (tx, rx) = tokio::sync::mpsc::channel::<ProgressEvent>(state.config().bot.event_buffer);
    let supervisor = state.supervisor();
    let locks = state.locks();
    let shutdown = state.shutdown();

    // The run continues to completion even if the SSE client disconnects.
    tokio::spawn(async move {
        supervisor.run(tx, shutdown).await;
        if let Err(e) = locks.release(LOCK_REQUOTE) {
            tracing::warn!("Failed to release requote lock: {}", e);
        }
    });

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        match Event::default().json_data(&event) {
            Ok(sse_event) => Some((Ok(sse_event), rx)),
            Err(e) => {
                tracing::warn!("Failed to serialize progress event: {}", e);
                Some((Ok(Event::default().comment("serialization error")), rx))
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Report which packages the next requote run would pick up.
pub async fn requote_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RequoteStatusResponse>, (StatusCode, Json<RequoteErrorResponse>)> {
    let pending = state.packages().pending_requotes().map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(RequoteErrorResponse {
                error: format!("Failed to list pending requotes: {}", e),
            }),
        )
    })?;

    let packages: Vec<PendingPackage> = pending
        .into_iter()
        .map(|p| PendingPackage {
            id: p.id,
            external_id: p.external_id,
            title: p.title,
        })
        .collect();

    Ok(Json(RequoteStatusResponse {
        pending_count: packages.len(),
        packages,
    }))
}
