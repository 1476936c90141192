//! Prometheus metrics for the readiness gate operator
//!
//! # Exported metrics
//! The `/metrics` endpoint (when built with `--features metrics`) exports the following metrics:
//! - `readiness_gate_probe_success` (gauge): 1 when the last probe passed, labeled by rule/target/check_type.
//! - `readiness_gate_probe_duration_seconds` (histogram): probe duration labeled by rule/target/check_type.
//! - `readiness_gate_probe_last_timestamp_seconds` (gauge): unix time of the last probe.
//! - `readiness_gate_status_writes_total` (counter): sink writes labeled by rule and sink.
//! - `readiness_gate_reconcile_errors_total` (counter): reconcile errors labeled by rule and kind.

use std::sync::atomic::{AtomicI64, AtomicU64};

use once_cell::sync::Lazy;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

use crate::prober::ProbeResult;

/// Labels identifying one probed rule
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ProbeLabels {
    pub rule: String,
    pub target: String,
    pub check_type: String,
}

/// Labels for sink write metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct WriteLabels {
    pub rule: String,
    /// "probeStatus" or "podCondition"
    pub sink: String,
}

/// Labels for reconcile error metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ErrorLabels {
    pub rule: String,
    /// Error kind/category, e.g. "kube", "conflict", "probe"
    pub kind: String,
}

/// Gauge tracking whether the last probe passed (1) or failed (0)
pub static PROBE_SUCCESS: Lazy<Family<ProbeLabels, Gauge<i64, AtomicI64>>> =
    Lazy::new(Family::default);

/// Histogram tracking probe duration (seconds)
pub static PROBE_DURATION_SECONDS: Lazy<Family<ProbeLabels, Histogram>> = Lazy::new(|| {
    fn probe_histogram() -> Histogram {
        // 1ms .. ~32s across 16 buckets.
        Histogram::new(exponential_buckets(0.001, 2.0, 16))
    }

    Family::new_with_constructor(probe_histogram)
});

/// Gauge tracking the unix time of the last probe
pub static PROBE_LAST_TIMESTAMP_SECONDS: Lazy<Family<ProbeLabels, Gauge<i64, AtomicI64>>> =
    Lazy::new(Family::default);

/// Counter tracking writes issued to a sink
pub static STATUS_WRITES_TOTAL: Lazy<Family<WriteLabels, Counter<u64, AtomicU64>>> =
    Lazy::new(Family::default);

/// Counter tracking reconcile errors
pub static RECONCILE_ERRORS_TOTAL: Lazy<Family<ErrorLabels, Counter<u64, AtomicU64>>> =
    Lazy::new(Family::default);

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let mut registry = Registry::default();

    registry.register(
        "readiness_gate_probe_success",
        "Whether the last probe of a gate rule passed (1) or failed (0)",
        PROBE_SUCCESS.clone(),
    );
    registry.register(
        "readiness_gate_probe_duration_seconds",
        "Duration of gate probes in seconds",
        PROBE_DURATION_SECONDS.clone(),
    );
    registry.register(
        "readiness_gate_probe_last_timestamp_seconds",
        "Unix timestamp of the last probe of a gate rule",
        PROBE_LAST_TIMESTAMP_SECONDS.clone(),
    );
    registry.register(
        "readiness_gate_status_writes",
        "Total number of writes issued to a state sink",
        STATUS_WRITES_TOTAL.clone(),
    );
    registry.register(
        "readiness_gate_reconcile_errors",
        "Total number of reconcile errors",
        RECONCILE_ERRORS_TOTAL.clone(),
    );

    registry
});

/// Record the outcome of one probe.
pub fn observe_probe(rule: &str, target: &str, check_type: &str, result: &ProbeResult) {
    let labels = ProbeLabels {
        rule: rule.to_string(),
        target: target.to_string(),
        check_type: check_type.to_string(),
    };
    PROBE_SUCCESS
        .get_or_create(&labels)
        .set(i64::from(result.healthy));
    PROBE_DURATION_SECONDS
        .get_or_create(&labels)
        .observe(result.duration.as_secs_f64());
    PROBE_LAST_TIMESTAMP_SECONDS
        .get_or_create(&labels)
        .set(result.timestamp.timestamp());
}

/// Increment the sink write counter by `count`.
pub fn inc_status_writes(rule: &str, sink: &str, count: u64) {
    let labels = WriteLabels {
        rule: rule.to_string(),
        sink: sink.to_string(),
    };
    STATUS_WRITES_TOTAL.get_or_create(&labels).inc_by(count);
}

/// Increment the reconcile error counter.
pub fn inc_reconcile_error(rule: &str, kind: &str) {
    let labels = ErrorLabels {
        rule: rule.to_string(),
        kind: kind.to_string(),
    };
    RECONCILE_ERRORS_TOTAL.get_or_create(&labels).inc();
}

/// Render the registry in the Prometheus text exposition format.
pub fn encode_registry() -> String {
    let mut buffer = String::new();
    if let Err(e) = prometheus_client::encoding::text::encode(&mut buffer, &REGISTRY) {
        tracing::error!("Failed to encode metrics: {}", e);
    }
    buffer
}
