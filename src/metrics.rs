// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the extipy controller.
//!
//! All metrics live in one registry under the namespace prefix
//! `extipy_firestoned_io_` and are exposed via the `/metrics` endpoint.
//!
//! # Metrics Categories
//!
//! - **Synchronization Metrics** - Track reconciliation ticks and their
//!   outcomes
//! - **Change Metrics** - Track changes applied per component and action
//! - **Error Metrics** - Track error conditions per component
//!
//! # Example
//!
//! ```rust,no_run
//! use extipy::metrics::record_sync_success;
//!
//! // Record a successful reconciliation tick
//! record_sync_success(std::time::Duration::from_secs(1));
//! ```

use prometheus::{
    CounterVec, Encoder, GaugeVec, Histogram, HistogramOpts, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

/// Namespace prefix for all extipy metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "extipy_firestoned_io";

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via the
/// `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Synchronization Metrics
// ============================================================================

/// Total number of reconciliation ticks by status
///
/// Labels:
/// - `status`: Outcome (`success`, `error`)
pub static SYNC_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_syncs_total"),
        "Total number of reconciliation ticks by status",
    );
    let counter = CounterVec::new(opts, &["status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of reconciliation ticks in seconds
pub static SYNC_DURATION_SECONDS: LazyLock<Histogram> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_sync_duration_seconds"),
        "Duration of reconciliation ticks in seconds",
    )
    .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]);
    let histogram = Histogram::with_opts(opts).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// Change Metrics
// ============================================================================

/// Total number of changes applied by component and action
///
/// Labels:
/// - `component`: Plan engine (`dns`, `firewall`, `extip`)
/// - `action`: Change class (`create`, `update`, `delete`, `set`, `unset`)
pub static CHANGES_APPLIED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_changes_applied_total"),
        "Total number of changes applied by component and action",
    );
    let counter = CounterVec::new(opts, &["component", "action"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Number of desired entries computed in the last tick
///
/// Labels:
/// - `kind`: Bundle slice (`endpoints`, `rule_sets`, `service_ext_ips`)
pub static DESIRED_ENTRIES: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_desired_entries"),
        "Number of desired entries computed in the last tick by kind",
    );
    let gauge = GaugeVec::new(opts, &["kind"]).unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Error Metrics
// ============================================================================

/// Total number of errors by component
///
/// Labels:
/// - `component`: Where the error surfaced (`source`, `dns`, `firewall`,
///   `extip`, `controller`)
pub static ERRORS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_errors_total"),
        "Total number of errors by component",
    );
    let counter = CounterVec::new(opts, &["component"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record a successful reconciliation tick
pub fn record_sync_success(duration: Duration) {
    SYNC_TOTAL.with_label_values(&["success"]).inc();
    SYNC_DURATION_SECONDS.observe(duration.as_secs_f64());
}

/// Record a failed reconciliation tick
pub fn record_sync_error(duration: Duration) {
    SYNC_TOTAL.with_label_values(&["error"]).inc();
    SYNC_DURATION_SECONDS.observe(duration.as_secs_f64());
}

/// Record changes applied by a component
///
/// # Arguments
/// * `component` - The plan engine (`dns`, `firewall`, `extip`)
/// * `action` - The change class (`create`, `update`, ...)
/// * `count` - How many changes of that class were applied
pub fn record_changes(component: &str, action: &str, count: usize) {
    if count > 0 {
        CHANGES_APPLIED_TOTAL
            .with_label_values(&[component, action])
            .inc_by(count as f64);
    }
}

/// Record the size of one desired-bundle slice
pub fn set_desired_entries(kind: &str, count: usize) {
    DESIRED_ENTRIES
        .with_label_values(&[kind])
        .set(count as f64);
}

/// Record an error surfaced by a component
pub fn record_error(component: &str) {
    ERRORS_TOTAL.with_label_values(&[component]).inc();
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
