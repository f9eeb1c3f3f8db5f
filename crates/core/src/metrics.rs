//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Triage jobs (outcomes, durations, retries)
//! - Classification service calls
//! - Queue depth

use once_cell::sync::Lazy;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
};

// =============================================================================
// Triage Job Metrics
// =============================================================================

/// Triage jobs finished, by result.
pub static TRIAGE_JOBS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("triage_jobs_total", "Total triage jobs finished"),
        &["result"], // "auto_closed", "assigned_to_human", "failed"
    )
    .unwrap()
});

/// Triage job duration in seconds.
pub static TRIAGE_JOB_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "triage_job_duration_seconds",
            "Duration of a single triage job",
        )
        .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        &["result"],
    )
    .unwrap()
});

/// Retry deliveries scheduled.
pub static TRIAGE_RETRIES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "triage_retries_total",
        "Total triage delivery retries scheduled",
    )
    .unwrap()
});

/// Jobs currently waiting in the queue (including backoff re-deliveries).
pub static QUEUE_DEPTH: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("triage_queue_depth", "Jobs waiting in the triage queue").unwrap()
});

// =============================================================================
// Classification Service Metrics
// =============================================================================

/// Classification requests, by status.
pub static CLASSIFICATION_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "triage_classification_requests_total",
            "Total classification service requests",
        ),
        &["status"], // "success", "error"
    )
    .unwrap()
});

/// Classification request duration in seconds.
pub static CLASSIFICATION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "triage_classification_duration_seconds",
            "Duration of classification service calls",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["status"],
    )
    .unwrap()
});

/// Distribution of classifier confidence scores.
pub static CONFIDENCE: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "triage_confidence",
            "Distribution of classifier confidence scores",
        )
        .buckets(vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 0.95, 1.0]),
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(TRIAGE_JOBS.clone()),
        Box::new(TRIAGE_JOB_DURATION.clone()),
        Box::new(TRIAGE_RETRIES.clone()),
        Box::new(QUEUE_DEPTH.clone()),
        Box::new(CLASSIFICATION_REQUESTS.clone()),
        Box::new(CLASSIFICATION_DURATION.clone()),
        Box::new(CONFIDENCE.clone()),
    ]
}
