//! Prometheus metrics for the pipeline stages.
//!
//! The server registers everything returned by [`all_metrics`] and serves
//! it on `/metrics`.

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Harvester
// =============================================================================

/// Feed entries seen, by outcome.
pub static FEED_ENTRIES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("formulio_feed_entries_total", "Feed entries seen by the harvester"),
        &["outcome"], // "accepted", "duplicate", "filtered", "no_guid"
    )
    .unwrap()
});

/// Feed endpoints that failed to fetch or parse.
pub static FEED_ENDPOINT_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "formulio_feed_endpoint_failures_total",
        "Feed endpoints that failed to fetch or parse",
    )
    .unwrap()
});

// =============================================================================
// Classifier and sequencer
// =============================================================================

/// Ledger rows processed by the router, by outcome.
pub static PARTITION_ROWS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("formulio_partition_rows_total", "Ledger rows processed by the router"),
        &["outcome"], // "routed", "duplicate", "unclassifiable", "dropped", "malformed"
    )
    .unwrap()
});

/// Pending work items materialized.
pub static WORK_ITEMS_CREATED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "formulio_work_items_created_total",
        "Pending work items materialized by the sequencer",
    )
    .unwrap()
});

/// Work items moved to the stale state.
pub static WORK_ITEMS_RETIRED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "formulio_work_items_retired_total",
        "Work items retired to the stale state",
    )
    .unwrap()
});

// =============================================================================
// Resolver
// =============================================================================

/// Magnet resolution attempts, by outcome.
pub static MAGNETS_RESOLVED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("formulio_magnets_total", "Magnet metadata resolution attempts"),
        &["outcome"], // "resolved", "timeout", "failed"
    )
    .unwrap()
});

/// Time spent waiting for torrent metadata.
pub static RESOLVE_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "formulio_resolve_duration_seconds",
            "Duration of a single metadata resolution attempt",
        )
        .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0]),
    )
    .unwrap()
});

// =============================================================================
// Merger
// =============================================================================

/// Catalog fragment write decisions.
pub static CATALOG_WRITES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("formulio_catalog_writes_total", "Catalog fragment merge outcomes"),
        &["outcome"], // "written", "unchanged"
    )
    .unwrap()
});

/// Get all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(FEED_ENTRIES.clone()),
        Box::new(FEED_ENDPOINT_FAILURES.clone()),
        Box::new(PARTITION_ROWS.clone()),
        Box::new(WORK_ITEMS_CREATED.clone()),
        Box::new(WORK_ITEMS_RETIRED.clone()),
        Box::new(MAGNETS_RESOLVED.clone()),
        Box::new(RESOLVE_DURATION.clone()),
        Box::new(CATALOG_WRITES.clone()),
    ]
}
