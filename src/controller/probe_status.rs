//! Sink writing gate health into the status of a `Probe` custom resource

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Event;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::{Client, Resource, ResourceExt};
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use super::sink::{Observation, StateSink, WriteOutcome};
use crate::config::{GateRule, SinkKind};
use crate::crd::{Probe, ProbeStatus};
use crate::error::{Error, Result};

/// Maximum age of `lastProbeTime` before an otherwise unchanged status is
/// rewritten as a heartbeat
pub const STATUS_HEARTBEAT_SECS: i64 = 60;

pub const REASON_GATE_OPENED: &str = "GateOpened";
pub const REASON_GATE_CLOSED: &str = "GateClosed";

/// Kubernetes operations the probe status sink needs
#[async_trait]
pub trait ProbeClient: Send + Sync {
    async fn get(&self, name: &str) -> Result<Option<Probe>>;
    async fn create(&self, probe: &Probe) -> Result<Probe>;
    async fn write_status(&self, name: &str, status: &ProbeStatus) -> Result<()>;
    async fn record_event(&self, probe: &Probe, event_type: &str, reason: &str, message: &str)
        -> Result<()>;
}

/// [`ProbeClient`] backed by the API server, scoped to one namespace
#[derive(Clone)]
pub struct KubeProbeClient {
    client: Client,
    namespace: String,
}

impl KubeProbeClient {
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            client,
            namespace: namespace.to_string(),
        }
    }

    fn api(&self) -> Api<Probe> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }
}

#[async_trait]
impl ProbeClient for KubeProbeClient {
    async fn get(&self, name: &str) -> Result<Option<Probe>> {
        self.api().get_opt(name).await.map_err(Error::KubeError)
    }

    async fn create(&self, probe: &Probe) -> Result<Probe> {
        self.api()
            .create(&PostParams::default(), probe)
            .await
            .map_err(Error::KubeError)
    }

    async fn write_status(&self, name: &str, status: &ProbeStatus) -> Result<()> {
        let patch = json!({ "status": status });
        self.api()
            .patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(Error::KubeError)?;
        Ok(())
    }

    async fn record_event(
        &self,
        probe: &Probe,
        event_type: &str,
        reason: &str,
        message: &str,
    ) -> Result<()> {
        let events: Api<Event> = Api::namespaced(self.client.clone(), &self.namespace);

        let time = Utc::now();
        let event = Event {
            metadata: kube::api::ObjectMeta {
                generate_name: Some(format!("{}-event-", probe.name_any())),
                ..Default::default()
            },
            type_: Some(event_type.to_string()),
            reason: Some(reason.to_string()),
            message: Some(message.to_string()),
            involved_object: probe.object_ref(&()),
            first_timestamp: Some(Time(time)),
            last_timestamp: Some(Time(time)),
            count: Some(1),
            ..Default::default()
        };

        events
            .create(&PostParams::default(), &event)
            .await
            .map_err(Error::KubeError)?;
        Ok(())
    }
}

/// Decide whether the stored status has to be rewritten.
///
/// A write is due when there is no status yet, when health or message
/// differ, or when the stored timestamp is at least `heartbeat` old.
pub fn status_needs_write(
    current: Option<&ProbeStatus>,
    healthy: bool,
    message: &str,
    now: DateTime<Utc>,
    heartbeat: chrono::Duration,
) -> bool {
    let Some(current) = current else {
        return true;
    };
    if current.healthy != healthy || current.message != message {
        return true;
    }
    match current.last_probe_time() {
        Some(last) => now.signed_duration_since(last) >= heartbeat,
        None => true,
    }
}

/// State sink keeping one `Probe` resource per rule in sync with its health
pub struct ProbeStatusSink<C> {
    client: C,
    rule: GateRule,
    heartbeat: chrono::Duration,
}

impl<C: ProbeClient> ProbeStatusSink<C> {
    pub fn new(client: C, rule: &GateRule) -> Self {
        Self {
            client,
            rule: rule.clone(),
            heartbeat: chrono::Duration::seconds(STATUS_HEARTBEAT_SECS),
        }
    }

    pub fn with_heartbeat(mut self, heartbeat: chrono::Duration) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    async fn announce_transition(&self, probe: &Probe, healthy: bool) {
        let (event_type, reason, message) = if healthy {
            ("Normal", REASON_GATE_OPENED, "Gate check started passing")
        } else {
            ("Warning", REASON_GATE_CLOSED, "Gate check started failing")
        };
        if let Err(e) = self
            .client
            .record_event(probe, event_type, reason, message)
            .await
        {
            warn!(rule = %self.rule.name, "Failed to emit {} event: {}", reason, e);
        }
    }
}

#[async_trait]
impl<C: ProbeClient> StateSink for ProbeStatusSink<C> {
    type Record = Probe;

    fn kind(&self) -> SinkKind {
        SinkKind::ProbeStatus
    }

    #[instrument(skip(self), fields(rule = %self.rule.name, namespace = %self.rule.namespace))]
    async fn ensure_exists(&self) -> Result<()> {
        if self.client.get(&self.rule.name).await?.is_some() {
            return Ok(());
        }

        match self.client.create(&Probe::for_rule(&self.rule)).await {
            Ok(_) => {
                info!("Created Probe resource");
                Ok(())
            }
            // Lost a create race with another writer
            Err(e) if e.is_conflict() => {
                debug!("Probe resource already exists");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn read(&self) -> Result<Option<Probe>> {
        self.client.get(&self.rule.name).await
    }

    async fn write_if_changed(&self, probe: Probe, observation: &Observation) -> Result<WriteOutcome> {
        let current = probe.status.as_ref();
        if !status_needs_write(
            current,
            observation.healthy,
            &observation.message,
            observation.timestamp,
            self.heartbeat,
        ) {
            return Ok(WriteOutcome::Unchanged);
        }

        let flipped = current.is_some_and(|s| s.healthy != observation.healthy);
        let status = ProbeStatus::new(
            observation.healthy,
            &observation.message,
            observation.timestamp,
        );
        self.client.write_status(&self.rule.name, &status).await?;

        if flipped {
            info!(
                rule = %self.rule.name,
                healthy = observation.healthy,
                "Gate health changed"
            );
            self.announce_transition(&probe, observation.healthy).await;
        } else {
            debug!(rule = %self.rule.name, "Refreshed Probe status");
        }
        Ok(WriteOutcome::Written(1))
    }
}
