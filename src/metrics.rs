// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the Kamaji OpenStack layer.
//!
//! All metrics carry the namespace prefix `kamaji_openstack_`.
//!
//! # Metrics Categories
//!
//! - **Request Metrics** - OpenStack calls by service, method and status
//! - **Session Metrics** - Token creation and re-authentication
//! - **Synchronization Metrics** - Shadow rows created, skipped and pruned
//!
//! # Example
//!
//! ```rust,no_run
//! use kamaji::metrics::{gather_metrics, record_request};
//!
//! record_request("compute", "GET", 200, std::time::Duration::from_millis(40));
//! println!("{}", gather_metrics().unwrap());
//! ```

use crate::http_errors::status_label;
use crate::remote::objects::SyncReport;
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::LazyLock;
use std::time::Duration;

/// Namespace prefix for all Kamaji metrics
const METRICS_NAMESPACE: &str = "kamaji_openstack";

/// Status label used when a request never produced a response
const TRANSPORT_FAILURE_STATUS: &str = "transport_error";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Request Metrics
// ============================================================================

/// Total number of OpenStack requests
///
/// Labels:
/// - `service`: Catalog service type (e.g., `compute`)
/// - `method`: HTTP method
/// - `status`: HTTP status code, or `transport_error`
pub static OPENSTACK_REQUESTS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_requests_total"),
        "Total number of OpenStack requests by service, method and status",
    );
    let counter = CounterVec::new(opts, &["service", "method", "status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of OpenStack requests in seconds
///
/// Labels:
/// - `service`: Catalog service type
pub static OPENSTACK_REQUEST_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_request_duration_seconds"),
        "Duration of OpenStack requests in seconds by service",
    )
    .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]);
    let histogram = HistogramVec::new(opts, &["service"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// Session Metrics
// ============================================================================

/// Total number of sessions built against Keystone
///
/// Labels:
/// - `scope_kind`: `admin` or `project`
pub static SESSIONS_CREATED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_sessions_created_total"),
        "Total number of OpenStack sessions created by scope kind",
    );
    let counter = CounterVec::new(opts, &["scope_kind"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of re-authentications after an expired token
///
/// Labels:
/// - `scope_kind`: `admin` or `project`
pub static REAUTHENTICATIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reauthentications_total"),
        "Total number of re-authentications after a 401 by scope kind",
    );
    let counter = CounterVec::new(opts, &["scope_kind"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Synchronization Metrics
// ============================================================================

/// Shadow rows touched by synchronize
///
/// Labels:
/// - `model`: Model name (e.g., `Zone`)
/// - `outcome`: `created`, `skipped` or `pruned`
pub static SYNC_ROWS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_sync_rows_total"),
        "Total number of shadow rows handled by synchronize by model and outcome",
    );
    let counter = CounterVec::new(opts, &["model", "outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record a completed OpenStack request
///
/// # Arguments
/// * `service` - Catalog service type
/// * `method` - HTTP method
/// * `status` - Response status code
/// * `duration` - Time from send to response headers
pub fn record_request(service: &str, method: &str, status: u16, duration: Duration) {
    let status = status_label(status);
    OPENSTACK_REQUESTS_TOTAL
        .with_label_values(&[service, method, status.as_str()])
        .inc();
    OPENSTACK_REQUEST_DURATION_SECONDS
        .with_label_values(&[service])
        .observe(duration.as_secs_f64());
}

/// Record a request that failed before any response arrived
pub fn record_transport_failure(service: &str, method: &str) {
    OPENSTACK_REQUESTS_TOTAL
        .with_label_values(&[service, method, TRANSPORT_FAILURE_STATUS])
        .inc();
}

/// Record a newly built session
pub fn record_session_created(scope_kind: &str) {
    SESSIONS_CREATED_TOTAL.with_label_values(&[scope_kind]).inc();
}

/// Record a re-authentication triggered by a 401
pub fn record_reauthentication(scope_kind: &str) {
    REAUTHENTICATIONS_TOTAL.with_label_values(&[scope_kind]).inc();
}

/// Record the outcome of one synchronize pass
pub fn record_sync(model: &str, report: &SyncReport) {
    for (outcome, count) in [
        ("created", report.created),
        ("skipped", report.skipped),
        ("pruned", report.pruned),
    ] {
        if count > 0 {
            SYNC_ROWS_TOTAL
                .with_label_values(&[model, outcome])
                .inc_by(count as f64);
        }
    }
}

/// Gather and encode all metrics in Prometheus text format
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
