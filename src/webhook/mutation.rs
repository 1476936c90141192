//! Admission mutation injecting readiness gates into labelled Deployments
//!
//! A Deployment carrying the [`INJECT_LABEL`] label gets a pod-template
//! readiness gate whose condition type is the label value under the
//! controller's condition prefix. The mutator never rejects a request.

use k8s_openapi::api::apps::v1::Deployment;
use kube::api::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse};
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::controller::conditions::GATE_CONDITION_PREFIX;

/// Label whose value names the gate to inject
pub const INJECT_LABEL: &str = "readiness-gate.io/inject";

/// The only workload kind the mutator touches
pub const WORKLOAD_KIND: &str = "Deployment";

const READINESS_GATES_PATH: &str = "/spec/template/spec/readinessGates";

/// Build the JSON patch adding `condition_type` to the pod template's
/// readiness gates.
///
/// The list itself is created when it is empty, since an append needs an
/// existing array to append to.
pub fn readiness_gate_patch(deployment: &Deployment, condition_type: &str) -> serde_json::Value {
    let has_gates = deployment
        .spec
        .as_ref()
        .and_then(|s| s.template.spec.as_ref())
        .and_then(|s| s.readiness_gates.as_ref())
        .is_some_and(|gates| !gates.is_empty());

    if has_gates {
        json!([{
            "op": "add",
            "path": format!("{READINESS_GATES_PATH}/-"),
            "value": { "conditionType": condition_type },
        }])
    } else {
        json!([{
            "op": "add",
            "path": READINESS_GATES_PATH,
            "value": [{ "conditionType": condition_type }],
        }])
    }
}

/// Allowed response carrying a diagnostic message
fn allowed_with_warning(request: &AdmissionRequest<DynamicObject>, message: String) -> AdmissionResponse {
    let mut response = AdmissionResponse::from(request);
    response.warnings = Some(vec![message]);
    response
}

/// Decide how to mutate an incoming admission request
pub fn mutate(request: &AdmissionRequest<DynamicObject>) -> AdmissionResponse {
    if request.kind.kind != WORKLOAD_KIND {
        return AdmissionResponse::from(request);
    }
    let Some(object) = request.object.as_ref() else {
        return AdmissionResponse::from(request);
    };

    let deployment: Deployment = match serde_json::to_value(object).and_then(serde_json::from_value) {
        Ok(deployment) => deployment,
        Err(e) => {
            warn!(uid = %request.uid, "Failed to decode Deployment: {}", e);
            return allowed_with_warning(request, format!("failed to decode Deployment: {e}"));
        }
    };

    let Some(gate) = deployment
        .metadata
        .labels
        .as_ref()
        .and_then(|labels| labels.get(INJECT_LABEL))
    else {
        debug!(uid = %request.uid, "No inject label, allowing unchanged");
        return AdmissionResponse::from(request);
    };

    if gate.trim().is_empty() {
        warn!(uid = %request.uid, "Empty {} label, skipping injection", INJECT_LABEL);
        return allowed_with_warning(
            request,
            format!("label {INJECT_LABEL} is empty; no readiness gate injected"),
        );
    }

    let condition_type = format!("{GATE_CONDITION_PREFIX}{gate}");
    info!(
        uid = %request.uid,
        deployment = ?deployment.metadata.name,
        condition = %condition_type,
        "Injecting readiness gate"
    );

    let patch: json_patch::Patch =
        match serde_json::from_value(readiness_gate_patch(&deployment, &condition_type)) {
            Ok(patch) => patch,
            Err(e) => {
                error!(uid = %request.uid, "Failed to build patch: {}", e);
                return allowed_with_warning(request, format!("failed to build patch: {e}"));
            }
        };

    match AdmissionResponse::from(request).with_patch(patch) {
        Ok(response) => response,
        Err(e) => {
            error!(uid = %request.uid, "Failed to serialize patch: {}", e);
            allowed_with_warning(request, format!("failed to serialize patch: {e}"))
        }
    }
}
