//! In-memory stand-ins for the Kubernetes clients and probers

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Pod, PodCondition, PodStatus};
use kube::api::ObjectMeta;

use super::pod_conditions::PodClient;
use super::probe_status::ProbeClient;
use crate::config::GateRule;
use crate::crd::{Probe, ProbeStatus};
use crate::error::{api_error, Result};
use crate::prober::Prober;

pub fn rule(name: &str) -> GateRule {
    GateRule {
        name: name.to_string(),
        gate_name: String::new(),
        target_label: String::new(),
        namespace: "default".to_string(),
        check_type: "tcp".to_string(),
        check_target: format!("{name}:5432"),
        interval: "5s".to_string(),
        sink: None,
    }
}

pub fn pod_rule(name: &str, selector: &str) -> GateRule {
    GateRule {
        target_label: selector.to_string(),
        ..rule(name)
    }
}

pub fn pod(name: &str, label: &str) -> Pod {
    let (key, value) = label.split_once('=').unwrap_or((label, ""));
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("default".to_string()),
            labels: Some([(key.to_string(), value.to_string())].into()),
            resource_version: Some("1".to_string()),
            ..Default::default()
        },
        status: Some(PodStatus::default()),
        ..Default::default()
    }
}

/// Prober whose answer is flipped by the test
#[derive(Clone, Default)]
pub struct SwitchProber(pub Arc<AtomicBool>);

#[async_trait]
impl Prober for SwitchProber {
    async fn check(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn describe(&self) -> String {
        "switch".to_string()
    }
}

#[derive(Default)]
pub struct FakeProbeClient {
    probe: Mutex<Option<Probe>>,
    events: Mutex<Vec<String>>,
    pub creates: AtomicU32,
    pub status_writes: AtomicU32,
    /// Fail this many create calls with a server error
    pub failing_creates: AtomicU32,
    /// Make `get` report nothing while the object exists
    pub hide_from_get: AtomicBool,
}

impl FakeProbeClient {
    pub fn insert(&self, probe: Probe) {
        *self.probe.lock().unwrap() = Some(probe);
    }

    pub fn delete(&self) {
        *self.probe.lock().unwrap() = None;
    }

    pub fn stored(&self) -> Option<Probe> {
        self.probe.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProbeClient for Arc<FakeProbeClient> {
    async fn get(&self, _name: &str) -> Result<Option<Probe>> {
        if self.hide_from_get.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(self.stored())
    }

    async fn create(&self, probe: &Probe) -> Result<Probe> {
        if self
            .failing_creates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(api_error(500, "InternalError"));
        }
        let mut stored = self.probe.lock().unwrap();
        if stored.is_some() {
            return Err(api_error(409, "AlreadyExists"));
        }
        self.creates.fetch_add(1, Ordering::SeqCst);
        *stored = Some(probe.clone());
        Ok(probe.clone())
    }

    async fn write_status(&self, _name: &str, status: &ProbeStatus) -> Result<()> {
        let mut stored = self.probe.lock().unwrap();
        let Some(probe) = stored.as_mut() else {
            return Err(api_error(404, "NotFound"));
        };
        probe.status = Some(status.clone());
        self.status_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn record_event(
        &self,
        _probe: &Probe,
        _event_type: &str,
        reason: &str,
        _message: &str,
    ) -> Result<()> {
        self.events.lock().unwrap().push(reason.to_string());
        Ok(())
    }
}

/// Pod store with resourceVersion checks and injectable write conflicts
#[derive(Default)]
pub struct FakePodClient {
    pods: Mutex<BTreeMap<String, Pod>>,
    conflicts: Mutex<HashMap<String, u32>>,
    pub gets: AtomicU32,
    pub writes: AtomicU32,
}

impl FakePodClient {
    pub fn insert(&self, pod: Pod) {
        let name = pod.metadata.name.clone().unwrap_or_default();
        self.pods.lock().unwrap().insert(name, pod);
    }

    pub fn remove(&self, name: &str) {
        self.pods.lock().unwrap().remove(name);
    }

    pub fn stored(&self, name: &str) -> Option<Pod> {
        self.pods.lock().unwrap().get(name).cloned()
    }

    /// Make the next `count` writes to `name` lose a race with another writer
    pub fn inject_conflicts(&self, name: &str, count: u32) {
        self.conflicts
            .lock()
            .unwrap()
            .insert(name.to_string(), count);
    }
}

fn bump_resource_version(pod: &mut Pod) {
    let next = pod
        .metadata
        .resource_version
        .as_deref()
        .and_then(|rv| rv.parse::<u64>().ok())
        .unwrap_or(0)
        + 1;
    pod.metadata.resource_version = Some(next.to_string());
}

#[async_trait]
impl PodClient for Arc<FakePodClient> {
    async fn list(&self, selector: &str) -> Result<Vec<Pod>> {
        let (key, value) = selector.split_once('=').unwrap_or((selector, ""));
        Ok(self
            .pods
            .lock()
            .unwrap()
            .values()
            .filter(|p| {
                p.metadata
                    .labels
                    .as_ref()
                    .and_then(|l| l.get(key))
                    .is_some_and(|v| v == value)
            })
            .cloned()
            .collect())
    }

    async fn get(&self, name: &str) -> Result<Pod> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.stored(name).ok_or_else(|| api_error(404, "NotFound"))
    }

    async fn write_conditions(
        &self,
        name: &str,
        resource_version: Option<&str>,
        conditions: &[PodCondition],
    ) -> Result<()> {
        let mut pods = self.pods.lock().unwrap();
        let Some(pod) = pods.get_mut(name) else {
            return Err(api_error(404, "NotFound"));
        };

        let mut conflicts = self.conflicts.lock().unwrap();
        if let Some(remaining) = conflicts.get_mut(name).filter(|n| **n > 0) {
            *remaining -= 1;
            bump_resource_version(pod);
            return Err(api_error(409, "Conflict"));
        }
        if resource_version.is_some() && resource_version != pod.metadata.resource_version.as_deref() {
            return Err(api_error(409, "Conflict"));
        }

        pod.status
            .get_or_insert_with(Default::default)
            .conditions = Some(conditions.to_vec());
        bump_resource_version(pod);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
