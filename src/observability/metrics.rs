//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `backup_bucket_reconciliations_total` - Total number of reconciliations
//! - `backup_bucket_reconciliation_errors_total` - Total number of reconciliation errors
//! - `backup_bucket_reconciliation_duration_seconds` - Duration of reconciliation operations
//! - `backup_bucket_deletions_total` - Total number of bucket deletions
//! - `backup_bucket_key_rotations_total` - Key rotations by trigger (`age`, `signal`)
//! - `backup_bucket_immutability_operations_total` - Immutability policy mutations by operation
//! - `backup_bucket_provider_operations_total` - Cloud operations by provider and operation
//! - `backup_bucket_provider_operation_duration_seconds` - Duration of cloud operations
//! - `backup_bucket_provider_operation_errors_total` - Cloud operation errors by provider
//! - `backup_bucket_requeues_total` - Requeues by reason

use anyhow::Result;
use prometheus::{Histogram, HistogramVec, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

// Metrics
pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "backup_bucket_reconciliations_total",
        "Total number of reconciliations",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "backup_bucket_reconciliation_errors_total",
        "Total number of reconciliation errors",
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "backup_bucket_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static DELETIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "backup_bucket_deletions_total",
        "Total number of backup bucket deletions",
    )
    .expect("Failed to create DELETIONS_TOTAL metric - this should never happen")
});

static KEY_ROTATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "backup_bucket_key_rotations_total",
            "Total number of storage account key rotations by trigger",
        ),
        &["trigger"],
    )
    .expect("Failed to create KEY_ROTATIONS_TOTAL metric - this should never happen")
});

static IMMUTABILITY_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "backup_bucket_immutability_operations_total",
            "Total number of immutability policy mutations by operation",
        ),
        &["operation"],
    )
    .expect("Failed to create IMMUTABILITY_OPERATIONS_TOTAL metric - this should never happen")
});

// Provider-specific metrics with provider label
static PROVIDER_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "backup_bucket_provider_operations_total",
            "Total number of provider operations by provider type and operation",
        ),
        &["provider", "operation"],
    )
    .expect("Failed to create PROVIDER_OPERATIONS_TOTAL metric - this should never happen")
});

static PROVIDER_OPERATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "backup_bucket_provider_operation_duration_seconds",
            "Duration of provider operations in seconds by provider type",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 120.0]),
        &["provider"],
    )
    .expect("Failed to create PROVIDER_OPERATION_DURATION metric - this should never happen")
});

static PROVIDER_OPERATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "backup_bucket_provider_operation_errors_total",
            "Total number of provider operation errors by provider type",
        ),
        &["provider"],
    )
    .expect("Failed to create PROVIDER_OPERATION_ERRORS_TOTAL metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "backup_bucket_requeues_total",
            "Total number of reconciliation requeues by reason",
        ),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(DELETIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(KEY_ROTATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(IMMUTABILITY_OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PROVIDER_OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PROVIDER_OPERATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(PROVIDER_OPERATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors() {
    RECONCILIATION_ERRORS_TOTAL.inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_deletions() {
    DELETIONS_TOTAL.inc();
}

/// `trigger` is `age` or `signal`
pub fn increment_key_rotations(trigger: &str) {
    KEY_ROTATIONS_TOTAL.with_label_values(&[trigger]).inc();
}

pub fn increment_immutability_operations(operation: &str) {
    IMMUTABILITY_OPERATIONS_TOTAL
        .with_label_values(&[operation])
        .inc();
}

pub fn record_provider_operation(provider: &str, operation: &str, duration: f64) {
    PROVIDER_OPERATIONS_TOTAL
        .with_label_values(&[provider, operation])
        .inc();
    PROVIDER_OPERATION_DURATION
        .with_label_values(&[provider])
        .observe(duration);
}

/// Increment provider operation errors counter
pub fn increment_provider_operation_errors(provider: &str) {
    PROVIDER_OPERATION_ERRORS_TOTAL
        .with_label_values(&[provider])
        .inc();
}

pub fn increment_requeues(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}
