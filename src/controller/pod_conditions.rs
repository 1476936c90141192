//! Sink writing gate health as a readiness-gate condition on matching pods

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Pod, PodCondition};
use kube::api::{Api, ListParams, Patch, PatchParams};
use kube::{Client, ResourceExt};
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use super::conditions::{
    apply_gate_condition, condition_needs_update, condition_type_for, pod_conditions,
};
use super::record_error;
use super::retry::{retry_on_conflict, ConflictRetry};
use super::sink::{Observation, StateSink, WriteOutcome};
use crate::config::{GateRule, SinkKind};
use crate::error::{Error, Result};

/// Kubernetes operations the pod condition sink needs
#[async_trait]
pub trait PodClient: Send + Sync {
    /// Pods matching a label selector
    async fn list(&self, selector: &str) -> Result<Vec<Pod>>;

    async fn get(&self, name: &str) -> Result<Pod>;

    /// Replace the pod's status conditions, guarded by `resource_version`
    async fn write_conditions(
        &self,
        name: &str,
        resource_version: Option<&str>,
        conditions: &[PodCondition],
    ) -> Result<()>;
}

/// [`PodClient`] backed by the API server, scoped to one namespace
#[derive(Clone)]
pub struct KubePodClient {
    api: Api<Pod>,
}

impl KubePodClient {
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            api: Api::namespaced(client, namespace),
        }
    }
}

#[async_trait]
impl PodClient for KubePodClient {
    async fn list(&self, selector: &str) -> Result<Vec<Pod>> {
        let pods = self
            .api
            .list(&ListParams::default().labels(selector))
            .await
            .map_err(Error::KubeError)?;
        Ok(pods.items)
    }

    async fn get(&self, name: &str) -> Result<Pod> {
        self.api.get(name).await.map_err(Error::KubeError)
    }

    async fn write_conditions(
        &self,
        name: &str,
        resource_version: Option<&str>,
        conditions: &[PodCondition],
    ) -> Result<()> {
        // A merge patch replaces the whole conditions list; the
        // resourceVersion turns it into a compare-and-swap.
        let patch = match resource_version {
            Some(rv) => json!({
                "metadata": { "resourceVersion": rv },
                "status": { "conditions": conditions },
            }),
            None => json!({ "status": { "conditions": conditions } }),
        };
        self.api
            .patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(Error::KubeError)?;
        Ok(())
    }
}

/// State sink setting `<prefix><gate>` on every pod selected by a rule
pub struct PodConditionSink<C> {
    client: C,
    rule_name: String,
    selector: String,
    condition_type: String,
    retry: ConflictRetry,
}

impl<C: PodClient> PodConditionSink<C> {
    pub fn new(client: C, rule: &GateRule) -> Self {
        Self {
            client,
            rule_name: rule.name.clone(),
            selector: rule.target_label.clone(),
            condition_type: condition_type_for(rule.gate()),
            retry: ConflictRetry::default(),
        }
    }

    pub fn with_retry(mut self, retry: ConflictRetry) -> Self {
        self.retry = retry;
        self
    }

    pub fn condition_type(&self) -> &str {
        &self.condition_type
    }

    /// Read-modify-write of one pod's conditions.
    ///
    /// The first attempt works on the listed copy; later attempts re-read
    /// the pod. Returns whether a write happened.
    async fn update_pod(&self, listed: Pod, observation: &Observation) -> Result<bool> {
        let name = listed.name_any();
        retry_on_conflict(&name, &self.retry, |attempt| {
            let listed = listed.clone();
            let name = name.clone();
            async move {
                let pod = if attempt == 1 {
                    listed
                } else {
                    self.client.get(&name).await?
                };

                let mut conditions = pod_conditions(&pod).to_vec();
                if !apply_gate_condition(
                    &mut conditions,
                    &self.condition_type,
                    observation.healthy,
                    &observation.message,
                    observation.timestamp,
                ) {
                    return Ok(false);
                }

                self.client
                    .write_conditions(&name, pod.metadata.resource_version.as_deref(), &conditions)
                    .await?;
                Ok(true)
            }
        })
        .await
    }
}

#[async_trait]
impl<C: PodClient> StateSink for PodConditionSink<C> {
    type Record = Vec<Pod>;

    fn kind(&self) -> SinkKind {
        SinkKind::PodCondition
    }

    /// Pods are owned by their workloads; there is nothing to create.
    async fn ensure_exists(&self) -> Result<()> {
        Ok(())
    }

    async fn read(&self) -> Result<Option<Vec<Pod>>> {
        Ok(Some(self.client.list(&self.selector).await?))
    }

    #[instrument(skip(self, pods, observation), fields(rule = %self.rule_name, selector = %self.selector))]
    async fn write_if_changed(
        &self,
        pods: Vec<Pod>,
        observation: &Observation,
    ) -> Result<WriteOutcome> {
        let mut written = 0;
        let mut failed = 0;

        for pod in pods {
            if pod.metadata.deletion_timestamp.is_some() {
                continue;
            }
            if !condition_needs_update(pod_conditions(&pod), &self.condition_type, observation.healthy) {
                continue;
            }

            let name = pod.name_any();
            match self.update_pod(pod, observation).await {
                Ok(true) => {
                    written += 1;
                    info!(
                        pod = %name,
                        condition = %self.condition_type,
                        healthy = observation.healthy,
                        "Updated readiness gate condition"
                    );
                }
                Ok(false) => {}
                Err(e) if e.is_not_found() => {
                    debug!(pod = %name, "Pod disappeared before its condition was written");
                }
                Err(e) => {
                    failed += 1;
                    warn!(pod = %name, "Failed to update readiness gate condition: {}", e);
                    record_error(&self.rule_name, &e);
                }
            }
        }

        Ok(match (written, failed) {
            (0, 0) => WriteOutcome::Unchanged,
            (n, 0) => WriteOutcome::Written(n),
            (written, failed) => WriteOutcome::Partial { written, failed },
        })
    }
}
