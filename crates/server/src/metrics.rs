//! Prometheus metrics for the addon server.
//!
//! HTTP request metrics and catalog snapshot gauges live here; the pipeline
//! stage counters come from `formulio_core::metrics` and are registered into
//! the same registry.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "formulio_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("formulio_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "formulio_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Catalog Metrics
// =============================================================================

/// Videos in each lane's current snapshot.
pub static CATALOG_VIDEOS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new(
            "formulio_catalog_videos",
            "Videos in the served catalog snapshot",
        ),
        &["lane"],
    )
    .unwrap()
});

/// Snapshot reload checks, by outcome.
pub static SNAPSHOT_RELOADS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "formulio_snapshot_reloads_total",
            "Catalog fragment reload checks",
        ),
        &["outcome"], // "reloaded", "unchanged", "missing", "failed"
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Catalog
    registry
        .register(Box::new(CATALOG_VIDEOS.clone()))
        .unwrap();
    registry
        .register(Box::new(SNAPSHOT_RELOADS.clone()))
        .unwrap();

    // Pipeline stages
    for metric in formulio_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Record the outcome counts of one reload pass.
pub fn record_reload(report: &formulio_core::catalog::ReloadReport) {
    for (outcome, count) in [
        ("reloaded", report.reloaded),
        ("unchanged", report.unchanged),
        ("missing", report.missing),
        ("failed", report.failed),
    ] {
        SNAPSHOT_RELOADS
            .with_label_values(&[outcome])
            .inc_by(count as u64);
    }
}

/// Refresh gauges from the current snapshots before encoding.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let store = state.store();
    for lane in store.lanes() {
        let videos = store.snapshot(&lane.lane).await.len();
        CATALOG_VIDEOS
            .with_label_values(&[&lane.lane])
            .set(videos as i64);
    }
}

static RESOURCE_ID: Lazy<regex_lite::Regex> = Lazy::new(|| {
    regex_lite::Regex::new(r"^/(catalog|meta|stream)/([^/]+)/[^/]+$").unwrap()
});

/// Normalize a path for metric labels (series and episode ids become placeholders).
pub fn normalize_path(path: &str) -> String {
    RESOURCE_ID.replace(path, "/$1/$2/{id}").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_stream_id() {
        assert_eq!(
            normalize_path("/stream/series/hpytt0202501:07:01.json"),
            "/stream/series/{id}"
        );
    }

    #[test]
    fn test_normalize_path_meta_id() {
        assert_eq!(
            normalize_path("/meta/series/hpytt0202501.json"),
            "/meta/series/{id}"
        );
    }

    #[test]
    fn test_normalize_path_no_ids() {
        assert_eq!(normalize_path("/manifest.json"), "/manifest.json");
        assert_eq!(normalize_path("/health"), "/health");
    }

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let output = encode_metrics();
        assert!(output.contains("formulio_http_requests_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_registry_contains_stage_metrics() {
        // Prometheus only outputs vectors that have a label set.
        formulio_core::metrics::MAGNETS_RESOLVED
            .with_label_values(&["resolved"])
            .inc_by(0);
        formulio_core::metrics::WORK_ITEMS_CREATED.inc_by(0);
        CATALOG_VIDEOS.with_label_values(&["fhd"]).set(0);

        let output = encode_metrics();
        assert!(output.contains("formulio_magnets_total"));
        assert!(output.contains("formulio_work_items_created_total"));
        assert!(output.contains("formulio_catalog_videos"));
    }
}
