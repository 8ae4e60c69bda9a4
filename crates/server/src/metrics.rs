//! Prometheus metrics for observability.
//!
//! - HTTP request metrics (latency, counts, in-flight)
//! - Refresh batch metrics
//! - Requote run metrics
//! - Package counts by requote status (collected dynamically)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry, TextEncoder,
};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "faretrack_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("faretrack_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "faretrack_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

/// Refresh batches by result ("ok" / "with_failures").
pub static REFRESH_BATCHES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "faretrack_refresh_batches_total",
            "Refresh batches run since startup",
        ),
        &["result"],
    )
    .unwrap()
});

/// Price changes detected by refresh batches.
pub static REFRESH_PRICE_CHANGES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "faretrack_refresh_price_changes_total",
        "Price changes detected by refresh batches",
    )
    .unwrap()
});

/// Requote runs by outcome ("completed" / "failed" / "rejected").
pub static REQUOTE_RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "faretrack_requote_runs_total",
            "Supervised requote runs since startup",
        ),
        &["outcome"],
    )
    .unwrap()
});

/// Packages by current requote status (collected dynamically).
pub static PACKAGES_BY_REQUOTE_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new(
            "faretrack_packages_by_requote_status",
            "Package count by requote status",
        ),
        &["status"],
    )
    .unwrap()
});

fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();
    registry
        .register(Box::new(REFRESH_BATCHES_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(REFRESH_PRICE_CHANGES_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(REQUOTE_RUNS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(PACKAGES_BY_REQUOTE_STATUS.clone()))
        .unwrap();
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Collect dynamic metrics from current application state.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    if let Ok(pending) = state.packages().pending_requotes() {
        PACKAGES_BY_REQUOTE_STATUS
            .with_label_values(&["pending"])
            .set(pending.len() as i64);
    }
    if let Ok(unnotified) = state.packages().needs_manual_unnotified() {
        PACKAGES_BY_REQUOTE_STATUS
            .with_label_values(&["needs_manual_unnotified"])
            .set(unnotified.len() as i64);
    }
}

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let uuid_regex = regex_lite::Regex::new(
        r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
    )
    .unwrap();
    let numeric_regex = regex_lite::Regex::new(r"/\d+(/|$)").unwrap();

    let result = uuid_regex.replace_all(path, "{id}");
    let result = numeric_regex.replace_all(&result, "/{id}$1");
    result.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_numeric() {
        assert_eq!(
            normalize_path("/api/v1/packages/42/history"),
            "/api/v1/packages/{id}/history"
        );
        assert_eq!(normalize_path("/api/v1/packages/42"), "/api/v1/packages/{id}");
    }

    #[test]
    fn test_normalize_path_uuid() {
        let path = "/api/v1/runs/550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(normalize_path(path), "/api/v1/runs/{id}");
    }

    #[test]
    fn test_normalize_path_plain() {
        assert_eq!(normalize_path("/api/v1/health"), "/api/v1/health");
    }

    #[test]
    fn test_encode_metrics_contains_registered_families() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/api/v1/health", "200"])
            .inc();
        let text = encode_metrics();
        assert!(text.contains("faretrack_http_requests_total"));
    }
}
