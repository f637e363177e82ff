//! # Metrics
//!
//! Prometheus metrics for monitoring the operator.
//!
//! ## Metrics Exposed
//!
//! - `llm_operator_reconciliations_total{kind}` - Reconcile passes started
//! - `llm_operator_reconciliation_errors_total{kind}` - Passes that ended in an error
//! - `llm_operator_reconciliation_duration_seconds{kind}` - Pass duration
//! - `llm_operator_requeues_total{reason}` - Requeues by reason
//! - `llm_operator_dependent_resources_provisioned_total{resource}` - Image store resources created
//! - `llm_operator_llm_requests_total{operation}` - Provider requests (`validate`, `call`)
//! - `llm_operator_llm_request_errors_total{operation}` - Failed provider requests
//! - `llm_operator_llm_request_duration_seconds{operation}` - Provider request duration

use anyhow::Result;
use prometheus::core::Collector;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "llm_operator_reconciliations_total",
            "Total number of reconciliations by kind",
        ),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "llm_operator_reconciliation_errors_total",
            "Total number of reconciliation errors by kind",
        ),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "llm_operator_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "llm_operator_requeues_total",
            "Total number of requeues by reason",
        ),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

static DEPENDENT_RESOURCES_PROVISIONED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "llm_operator_dependent_resources_provisioned_total",
            "Total number of image store resources created by resource kind",
        ),
        &["resource"],
    )
    .expect(
        "Failed to create DEPENDENT_RESOURCES_PROVISIONED_TOTAL metric - this should never happen",
    )
});

static LLM_REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "llm_operator_llm_requests_total",
            "Total number of provider requests by operation",
        ),
        &["operation"],
    )
    .expect("Failed to create LLM_REQUESTS_TOTAL metric - this should never happen")
});

static LLM_REQUEST_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "llm_operator_llm_request_errors_total",
            "Total number of failed provider requests by operation",
        ),
        &["operation"],
    )
    .expect("Failed to create LLM_REQUEST_ERRORS_TOTAL metric - this should never happen")
});

static LLM_REQUEST_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "llm_operator_llm_request_duration_seconds",
            "Duration of provider requests in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 15.0, 60.0, 300.0]),
        &["operation"],
    )
    .expect("Failed to create LLM_REQUEST_DURATION metric - this should never happen")
});

/// Register, treating an earlier registration of the same collector as success.
fn register(collector: Box<dyn Collector>) -> Result<()> {
    match REGISTRY.register(collector) {
        Ok(()) | Err(prometheus::Error::AlreadyReg) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
pub fn register_metrics() -> Result<()> {
    register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    register(Box::new(RECONCILIATION_DURATION.clone()))?;
    register(Box::new(REQUEUES_TOTAL.clone()))?;
    register(Box::new(DEPENDENT_RESOURCES_PROVISIONED_TOTAL.clone()))?;
    register(Box::new(LLM_REQUESTS_TOTAL.clone()))?;
    register(Box::new(LLM_REQUEST_ERRORS_TOTAL.clone()))?;
    register(Box::new(LLM_REQUEST_DURATION.clone()))?;
    Ok(())
}

pub fn increment_reconciliations(kind: &str) {
    RECONCILIATIONS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_reconciliation_errors(kind: &str) {
    RECONCILIATION_ERRORS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn observe_reconciliation_duration(kind: &str, duration: f64) {
    RECONCILIATION_DURATION
        .with_label_values(&[kind])
        .observe(duration);
}

pub fn increment_requeues_total(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}

pub fn increment_dependent_resources_provisioned(resource: &str) {
    DEPENDENT_RESOURCES_PROVISIONED_TOTAL
        .with_label_values(&[resource])
        .inc();
}

pub fn increment_llm_requests(operation: &str) {
    LLM_REQUESTS_TOTAL.with_label_values(&[operation]).inc();
}

pub fn increment_llm_request_errors(operation: &str) {
    LLM_REQUEST_ERRORS_TOTAL.with_label_values(&[operation]).inc();
}

pub fn observe_llm_request_duration(operation: &str, duration: f64) {
    LLM_REQUEST_DURATION
        .with_label_values(&[operation])
        .observe(duration);
}
