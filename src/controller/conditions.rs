//! Pod readiness-gate condition helpers following Kubernetes API conventions

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{Pod, PodCondition};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

/// Prefix namespacing injected readiness-gate condition types
pub const GATE_CONDITION_PREFIX: &str = "controller.rc/";

/// Standard condition statuses
pub const CONDITION_STATUS_TRUE: &str = "True";
pub const CONDITION_STATUS_FALSE: &str = "False";

pub const REASON_PROBE_SUCCEEDED: &str = "ProbeSucceeded";
pub const REASON_PROBE_FAILED: &str = "ProbeFailed";

/// Full condition type for a gate name.
///
/// Names that already carry a `/` are taken as complete condition types.
pub fn condition_type_for(gate: &str) -> String {
    if gate.contains('/') {
        gate.to_string()
    } else {
        format!("{GATE_CONDITION_PREFIX}{gate}")
    }
}

pub fn status_for(healthy: bool) -> &'static str {
    if healthy {
        CONDITION_STATUS_TRUE
    } else {
        CONDITION_STATUS_FALSE
    }
}

/// Conditions currently reported on a pod
pub fn pod_conditions(pod: &Pod) -> &[PodCondition] {
    pod.status
        .as_ref()
        .and_then(|s| s.conditions.as_deref())
        .unwrap_or(&[])
}

/// Find a condition by type
pub fn find_condition<'a>(conditions: &'a [PodCondition], type_: &str) -> Option<&'a PodCondition> {
    conditions.iter().find(|c| c.type_ == type_)
}

/// True when the condition is absent or its status differs from the desired one
pub fn condition_needs_update(conditions: &[PodCondition], type_: &str, healthy: bool) -> bool {
    find_condition(conditions, type_)
        .map(|c| c.status != status_for(healthy))
        .unwrap_or(true)
}

/// Set the gate condition to the desired status.
///
/// Returns false and leaves the list untouched when the status already
/// matches. The transition time is only moved when the status flips.
pub fn apply_gate_condition(
    conditions: &mut Vec<PodCondition>,
    type_: &str,
    healthy: bool,
    message: &str,
    now: DateTime<Utc>,
) -> bool {
    if !condition_needs_update(conditions, type_, healthy) {
        return false;
    }

    let reason = if healthy {
        REASON_PROBE_SUCCEEDED
    } else {
        REASON_PROBE_FAILED
    };

    if let Some(existing) = conditions.iter_mut().find(|c| c.type_ == type_) {
        existing.status = status_for(healthy).to_string();
        existing.reason = Some(reason.to_string());
        existing.message = Some(message.to_string());
        existing.last_probe_time = Some(Time(now));
        existing.last_transition_time = Some(Time(now));
    } else {
        conditions.push(PodCondition {
            type_: type_.to_string(),
            status: status_for(healthy).to_string(),
            reason: Some(reason.to_string()),
            message: Some(message.to_string()),
            last_probe_time: Some(Time(now)),
            last_transition_time: Some(Time(now)),
        });
    }
    true
}
