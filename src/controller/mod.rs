//! Gate reconciliation
//!
//! One reconciler per configured rule probes its target and converges a
//! state sink (a `Probe` resource status or pod readiness conditions). The
//! shared [`GateStateStore`] keeps the latest result of every rule for the
//! status page.

pub mod conditions;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod pod_conditions;
pub mod probe_status;
mod reconciler;
pub mod retry;
pub mod sink;
pub mod state;
#[cfg(test)]
pub(crate) mod testing;

pub use pod_conditions::{KubePodClient, PodClient, PodConditionSink};
pub use probe_status::{status_needs_write, KubeProbeClient, ProbeClient, ProbeStatusSink};
pub use reconciler::{prepare_rule, run_gates, GateReconciler, Phase};
pub use retry::{retry_on_conflict, ConflictRetry};
pub use sink::{Observation, StateSink, WriteOutcome};
pub use state::{GateStateStore, GateStatus};

use crate::error::Error;

/// Count a reconcile error against its rule
pub(crate) fn record_error(rule: &str, error: &Error) {
    #[cfg(feature = "metrics")]
    metrics::inc_reconcile_error(rule, error.kind());
    #[cfg(not(feature = "metrics"))]
    let _ = (rule, error);
}
