//! Probe Custom Resource Definition
//!
//! A `Probe` is the custom status record a gate rule propagates its health
//! into. The spec mirrors the rule that owns it; the status is written by the
//! operator on every health change and at least once a minute otherwise.

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::GateRule;

#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "readiness-gate.io",
    version = "v1alpha1",
    kind = "Probe",
    namespaced,
    status = "ProbeStatus",
    shortname = "rgp",
    printcolumn = r#"{"name":"Type","type":"string","jsonPath":".spec.checkType"}"#,
    printcolumn = r#"{"name":"Target","type":"string","jsonPath":".spec.checkTarget"}"#,
    printcolumn = r#"{"name":"Healthy","type":"boolean","jsonPath":".status.healthy"}"#,
    printcolumn = r#"{"name":"Last Probe","type":"date","jsonPath":".status.lastProbeTime"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ProbeSpec {
    /// `http`, `tcp` or `exec`
    pub check_type: String,
    /// URL, `host:port` or command line
    pub check_target: String,
    /// Probe interval as configured on the rule
    #[serde(default)]
    pub interval: String,
}

/// Latest propagated health of a gate
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProbeStatus {
    pub healthy: bool,
    #[serde(default)]
    pub message: String,
    /// RFC3339 timestamp of the last status write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_probe_time: Option<String>,
}

impl ProbeStatus {
    pub fn new(healthy: bool, message: &str, at: DateTime<Utc>) -> Self {
        Self {
            healthy,
            message: message.to_string(),
            last_probe_time: Some(at.to_rfc3339()),
        }
    }

    /// Parsed `last_probe_time`; unparseable values count as absent
    pub fn last_probe_time(&self) -> Option<DateTime<Utc>> {
        self.last_probe_time
            .as_deref()
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc))
    }
}

impl From<&GateRule> for ProbeSpec {
    fn from(rule: &GateRule) -> Self {
        Self {
            check_type: rule.check_type.clone(),
            check_target: rule.check_target.clone(),
            interval: rule.interval.clone(),
        }
    }
}

impl Probe {
    /// Build the initial resource for a rule, without status
    pub fn for_rule(rule: &GateRule) -> Self {
        let mut probe = Probe::new(&rule.name, ProbeSpec::from(rule));
        probe.metadata.namespace = Some(rule.namespace.clone());
        probe
            .metadata
            .labels
            .get_or_insert_with(Default::default)
            .insert(
                "app.kubernetes.io/managed-by".to_string(),
                "readiness-gate".to_string(),
            );
        probe
    }
}
