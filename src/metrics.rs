// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the Application Gateway ingress controller.
//!
//! All metrics carry the namespace prefix `appgw_ingress_`.
//!
//! # Metrics Categories
//!
//! - **Build Metrics** - Configuration builds, their duration and the issues found
//! - **Document Metrics** - Size of the last built document by object kind
//! - **Apply Metrics** - Outcome of handing documents to the gateway
//! - **Watch Metrics** - Errors reported by the Kubernetes watchers
//! - **Leader Election Metrics** - Leadership state changes
//!
//! # Example
//!
//! ```rust,no_run
//! use appgw_ingress::metrics::{gather_metrics, record_apply};
//!
//! record_apply("applied");
//! let text = gather_metrics().unwrap();
//! ```

use crate::appgw::types::ConfigurationDocument;
use crate::errors::BuildIssue;
use prometheus::{
    CounterVec, Encoder, GaugeVec, Histogram, HistogramOpts, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all controller metrics
const METRICS_NAMESPACE: &str = "appgw_ingress";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Build Metrics
// ============================================================================

/// Total number of configuration builds by outcome
///
/// Labels:
/// - `status`: Outcome (`success`, `error`)
pub static BUILDS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_builds_total"),
        "Total number of configuration builds by status",
    );
    let counter = CounterVec::new(opts, &["status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of configuration builds in seconds
pub static BUILD_DURATION_SECONDS: LazyLock<Histogram> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_build_duration_seconds"),
        "Duration of configuration builds in seconds",
    )
    .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]);
    let histogram = Histogram::with_opts(opts).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

/// Total number of build issues
///
/// Labels:
/// - `kind`: Issue kind (e.g., `service_not_found`, `duplicate_route`)
/// - `severity`: `warning` or `error`
pub static BUILD_ISSUES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_build_issues_total"),
        "Total number of build issues by kind and severity",
    );
    let counter = CounterVec::new(opts, &["kind", "severity"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Document Metrics
// ============================================================================

/// Number of objects in the last successfully built document
///
/// Labels:
/// - `kind`: Object kind (e.g., `probe`, `http_listener`)
pub static DOCUMENT_OBJECTS: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_document_objects"),
        "Number of objects in the last built configuration by kind",
    );
    let gauge = GaugeVec::new(opts, &["kind"]).unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Apply Metrics
// ============================================================================

/// Total number of apply attempts by outcome
///
/// Labels:
/// - `status`: Outcome (`applied`, `unchanged`, `error`)
pub static APPLIES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_applies_total"),
        "Total number of configuration applies by status",
    );
    let counter = CounterVec::new(opts, &["status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Watch Metrics
// ============================================================================

/// Total number of watch errors
///
/// Labels:
/// - `resource_type`: Kind being watched (e.g., `Ingress`, `Endpoints`)
pub static WATCH_ERRORS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_watch_errors_total"),
        "Total number of watch errors by resource type",
    );
    let counter = CounterVec::new(opts, &["resource_type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Leader Election Metrics
// ============================================================================

/// Total number of leader election events
///
/// Labels:
/// - `status`: Event type (`acquired`, `lost`)
pub static LEADER_ELECTIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_leader_elections_total"),
        "Total number of leader election events by status",
    );
    let counter = CounterVec::new(opts, &["status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Current leader election status
///
/// Labels:
/// - `pod_name`: Name of the pod
///
/// Value: 1 if leader, 0 if follower
pub static LEADER_STATUS: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_leader_status"),
        "Current leader election status (1 = leader, 0 = follower)",
    );
    let gauge = GaugeVec::new(opts, &["pod_name"]).unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record a successful build
///
/// # Arguments
/// * `duration` - Duration of the build
/// * `document` - The built document, used for the object gauges
/// * `issues` - Non-fatal issues found during the build
pub fn record_build_success(
    duration: Duration,
    document: &ConfigurationDocument,
    issues: &[BuildIssue],
) {
    BUILDS_TOTAL.with_label_values(&["success"]).inc();
    BUILD_DURATION_SECONDS.observe(duration.as_secs_f64());
    for (kind, count) in document.object_counts() {
        DOCUMENT_OBJECTS
            .with_label_values(&[kind])
            .set(count as f64);
    }
    record_issues(issues);
}

/// Record a build rejected for dangling references
pub fn record_build_error(duration: Duration, issues: &[BuildIssue]) {
    BUILDS_TOTAL.with_label_values(&["error"]).inc();
    BUILD_DURATION_SECONDS.observe(duration.as_secs_f64());
    record_issues(issues);
}

fn record_issues(issues: &[BuildIssue]) {
    for issue in issues {
        BUILD_ISSUES_TOTAL
            .with_label_values(&[issue.kind(), issue.severity().as_str()])
            .inc();
    }
}

/// Record an apply attempt
///
/// # Arguments
/// * `status` - `applied`, `unchanged` or `error`
pub fn record_apply(status: &str) {
    APPLIES_TOTAL.with_label_values(&[status]).inc();
}

/// Record a watch error for `resource_type`
pub fn record_watch_error(resource_type: &str) {
    WATCH_ERRORS_TOTAL
        .with_label_values(&[resource_type])
        .inc();
}

/// Record leader election acquired
///
/// # Arguments
/// * `pod_name` - Name of the pod that acquired leadership
pub fn record_leader_elected(pod_name: &str) {
    LEADER_ELECTIONS_TOTAL
        .with_label_values(&["acquired"])
        .inc();
    LEADER_STATUS.with_label_values(&[pod_name]).set(1.0);
}

/// Record leader election lost
///
/// # Arguments
/// * `pod_name` - Name of the pod that lost leadership
pub fn record_leader_lost(pod_name: &str) {
    LEADER_ELECTIONS_TOTAL.with_label_values(&["lost"]).inc();
    LEADER_STATUS.with_label_values(&[pod_name]).set(0.0);
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Returns
/// Prometheus-formatted metrics as a String
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
