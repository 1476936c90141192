//! Unit tests for the Probe resource

#[cfg(test)]
mod probe_resource {
    use chrono::{TimeZone, Utc};
    use kube::{CustomResourceExt, Resource, ResourceExt};

    use crate::config::GateRule;
    use crate::crd::{Probe, ProbeStatus};

    fn rule() -> GateRule {
        GateRule {
            name: "db".to_string(),
            gate_name: "db-ready".to_string(),
            target_label: String::new(),
            namespace: "prod".to_string(),
            check_type: "tcp".to_string(),
            check_target: "db:5432".to_string(),
            interval: "5s".to_string(),
            sink: None,
        }
    }

    #[test]
    fn probe_for_rule_mirrors_rule() {
        let probe = Probe::for_rule(&rule());
        assert_eq!(probe.name_any(), "db");
        assert_eq!(probe.namespace().as_deref(), Some("prod"));
        assert_eq!(probe.spec.check_type, "tcp");
        assert_eq!(probe.spec.check_target, "db:5432");
        assert!(probe.status.is_none());
        assert_eq!(
            probe.labels().get("app.kubernetes.io/managed-by").map(String::as_str),
            Some("readiness-gate")
        );
    }

    #[test]
    fn crd_metadata() {
        let crd = Probe::crd();
        assert_eq!(crd.spec.group, "readiness-gate.io");
        assert_eq!(crd.spec.names.kind, "Probe");
        assert_eq!(Probe::api_version(&()), "readiness-gate.io/v1alpha1");
        assert!(crd.spec.versions[0].subresources.is_some());
    }

    #[test]
    fn status_serializes_camel_case() {
        let at = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let status = ProbeStatus::new(true, "Check passed", at);
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["healthy"], true);
        assert_eq!(json["message"], "Check passed");
        assert!(json["lastProbeTime"].as_str().unwrap().starts_with("2025-01-02T03:04:05"));
        assert_eq!(status.last_probe_time(), Some(at));
    }

    #[test]
    fn garbage_timestamp_reads_as_absent() {
        let status = ProbeStatus {
            healthy: false,
            message: String::new(),
            last_probe_time: Some("yesterday".to_string()),
        };
        assert_eq!(status.last_probe_time(), None);
    }
}
