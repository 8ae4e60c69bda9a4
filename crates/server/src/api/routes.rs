use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::{audit, cron, handlers, middleware, notifications, requote};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Audit
        .route("/audit", get(audit::query_audit))
        // Requote runs
        .route("/requote/run", post(requote::run_requote))
        .route("/requote/run", get(requote::requote_status))
        // Cron-triggered refresh (some schedulers can only GET)
        .route("/cron/refresh-packages", get(cron::refresh_packages))
        .route("/cron/refresh-packages", post(cron::refresh_packages))
        // Notifications
        .route(
            "/notifications/check-manual-quotes",
            post(notifications::check_manual_quotes),
        )
        .route(
            "/notifications/check-manual-quotes",
            get(notifications::manual_quote_status),
        );

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(from_fn(middleware::metrics_middleware)),
        )
}
