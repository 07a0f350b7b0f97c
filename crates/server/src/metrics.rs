//! Prometheus metrics for the stash server.
//!
//! Exposes counters for accepted and rejected uploads, ingested bytes,
//! deletions and cleanup failures, plus an upload latency histogram.
//!
//! The `/metrics` endpoint is unauthenticated; restrict it at the network
//! level when the server is publicly reachable.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use stash_core::Rejection;
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// Upload metrics
pub static UPLOADS_ACCEPTED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "stash_uploads_accepted_total",
        "Total number of uploads stored and cataloged",
    )
    .expect("metric creation failed")
});

pub static UPLOADS_REJECTED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "stash_uploads_rejected_total",
            "Total number of uploads refused before persisting, by reason",
        ),
        &["reason"],
    )
    .expect("metric creation failed")
});

pub static UPLOAD_FAILURES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "stash_upload_failures_total",
            "Total number of uploads that failed after admission, by stage",
        ),
        &["stage"],
    )
    .expect("metric creation failed")
});

pub static BYTES_INGESTED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "stash_bytes_ingested_total",
        "Total bytes of successfully cataloged uploads",
    )
    .expect("metric creation failed")
});

pub static UPLOAD_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "stash_upload_duration_seconds",
            "Time from admission to catalog insert for successful uploads",
        )
        .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
    )
    .expect("metric creation failed")
});

// Deletion and cleanup metrics
pub static FILES_DELETED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("stash_files_deleted_total", "Total number of files deleted")
        .expect("metric creation failed")
});

pub static CLEANUP_FAILURES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "stash_cleanup_failures_total",
            "Best-effort blob removals that failed, by kind",
        ),
        &["kind"],
    )
    .expect("metric creation failed")
});

// Sweep metrics
pub static SWEEP_RUNS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("stash_sweep_runs_total", "Total number of orphan sweeps run")
        .expect("metric creation failed")
});

pub static SWEEP_BLOBS_DELETED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "stash_sweep_blobs_deleted_total",
        "Total number of orphan blobs removed by the sweep",
    )
    .expect("metric creation failed")
});

/// Cleanup failure kinds.
pub const CLEANUP_ORPHAN_BLOB: &str = "orphan_blob";
pub const CLEANUP_BLOB_DELETE: &str = "blob_delete";

/// Guard to ensure metrics are only registered once.
static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry.
///
/// Idempotent, so tests can build as many routers as they like.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(UPLOADS_ACCEPTED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(UPLOADS_REJECTED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(UPLOAD_FAILURES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(BYTES_INGESTED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(UPLOAD_DURATION.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(FILES_DELETED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(CLEANUP_FAILURES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(SWEEP_RUNS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(SWEEP_BLOBS_DELETED.clone()))
            .expect("metric registration failed");
    });
}

/// GET /metrics - Prometheus metrics endpoint.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}

/// Record an upload refused by the gate.
pub fn record_rejection(rejection: &Rejection) {
    let reason = match rejection {
        Rejection::UnsupportedType { .. } => "unsupported_type",
        Rejection::TooLarge { .. } => "too_large",
    };
    UPLOADS_REJECTED.with_label_values(&[reason]).inc();
}

/// Record a best-effort cleanup that did not succeed.
pub fn record_cleanup_failure(kind: &str) {
    CLEANUP_FAILURES.with_label_values(&[kind]).inc();
}
