//! Per-rule reconcile loop and the supervisor running one loop per rule
//!
//! Each rule gets an independent task: probe, record the result in the
//! display cache, then converge the rule's sink. Passes never overlap for a
//! rule because a single task owns it, and a slow pass skips missed ticks
//! instead of bunching them up.

use futures::future::join_all;
use kube::Client;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::pod_conditions::{KubePodClient, PodConditionSink};
use super::probe_status::{KubeProbeClient, ProbeStatusSink};
use super::record_error;
use super::sink::{Observation, StateSink, WriteOutcome};
use super::state::GateStateStore;
use crate::config::{GateRule, SinkKind};
use crate::error::{Error, Result};
use crate::prober::{self, run_probe, Prober};

/// Lifecycle of a gate reconciler
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Backing record not confirmed yet; creation is retried every pass
    Bootstrapping,
    Steady,
}

/// Drives one gate rule against one sink
pub struct GateReconciler<S> {
    rule: GateRule,
    prober: Box<dyn Prober>,
    sink: S,
    store: GateStateStore,
    phase: Phase,
}

impl<S: StateSink> GateReconciler<S> {
    pub fn new(rule: GateRule, prober: Box<dyn Prober>, sink: S, store: GateStateStore) -> Self {
        Self {
            rule,
            prober,
            sink,
            store,
            phase: Phase::Bootstrapping,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn rule(&self) -> &GateRule {
        &self.rule
    }

    /// One full pass: probe, cache, then converge the sink.
    ///
    /// The display cache is updated before any sink I/O so it reflects the
    /// latest probe even when the sink is unreachable.
    #[instrument(skip(self), fields(rule = %self.rule.name, sink = %self.sink.kind()))]
    pub async fn reconcile(&mut self) -> Result<WriteOutcome> {
        if self.phase == Phase::Bootstrapping {
            match self.sink.ensure_exists().await {
                Ok(()) => {
                    debug!("Backing record ready");
                    self.phase = Phase::Steady;
                }
                Err(e) => {
                    warn!("Failed to ensure backing record, retrying next pass: {}", e);
                    record_error(&self.rule.name, &e);
                }
            }
        }

        let result = run_probe(self.prober.as_ref()).await;
        debug!(
            target_desc = %self.prober.describe(),
            healthy = result.healthy,
            duration_ms = result.duration.as_millis() as u64,
            "Probe finished"
        );
        self.store.update(&self.rule, &result).await;
        #[cfg(feature = "metrics")]
        super::metrics::observe_probe(
            &self.rule.name,
            &self.rule.check_target,
            &self.rule.check_type,
            &result,
        );

        let observation = Observation::from(&result);
        let current = match self.sink.read().await? {
            Some(current) => current,
            None => {
                info!("Backing record missing, recreating");
                self.sink.ensure_exists().await?;
                match self.sink.read().await? {
                    Some(current) => current,
                    None => return Ok(WriteOutcome::RecordMissing),
                }
            }
        };

        let outcome = self.sink.write_if_changed(current, &observation).await?;
        match outcome {
            WriteOutcome::Partial { written, failed } => {
                warn!(written, failed, "Some objects could not be updated")
            }
            WriteOutcome::RecordMissing => warn!("Backing record still missing after recreate"),
            _ => {}
        }
        #[cfg(feature = "metrics")]
        {
            let writes = outcome.writes();
            if writes > 0 {
                super::metrics::inc_status_writes(
                    &self.rule.name,
                    &self.sink.kind().to_string(),
                    writes as u64,
                );
            }
        }
        Ok(outcome)
    }

    async fn tick(&mut self) {
        if let Err(e) = self.reconcile().await {
            error!(rule = %self.rule.name, "Reconcile error: {}", e);
            record_error(&self.rule.name, &e);
        }
    }

    /// Reconcile every interval until `token` is cancelled.
    ///
    /// The first pass runs immediately. Cancellation is only observed between
    /// passes, so an in-flight pass always completes.
    pub async fn run(mut self, token: CancellationToken) {
        let interval = self.rule.interval();
        info!(
            rule = %self.rule.name,
            interval_ms = interval.as_millis() as u64,
            sink = %self.sink.kind(),
            "Starting gate reconciler"
        );

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => self.tick().await,
            }
        }

        info!(rule = %self.rule.name, "Gate reconciler stopped");
    }
}

/// Resolve the sink and prober for a rule, rejecting rules that cannot run
pub fn prepare_rule(
    rule: &GateRule,
    default_sink: SinkKind,
) -> Result<(SinkKind, Box<dyn Prober>)> {
    let sink = rule.sink.unwrap_or(default_sink);
    if sink == SinkKind::PodCondition && rule.target_label.trim().is_empty() {
        return Err(Error::ConfigError(format!(
            "rule '{}' writes pod conditions but has no targetLabel",
            rule.name
        )));
    }
    let prober = prober::for_rule(rule)?;
    Ok((sink, prober))
}

/// Start one reconciler per rule and wait until all of them stop.
///
/// Rules that cannot be prepared are logged and skipped; the others keep
/// running independently.
pub async fn run_gates(
    rules: Vec<GateRule>,
    client: Client,
    store: GateStateStore,
    default_sink: SinkKind,
    token: CancellationToken,
) {
    let mut handles = Vec::with_capacity(rules.len());

    for rule in rules {
        let (sink, prober) = match prepare_rule(&rule, default_sink) {
            Ok(prepared) => prepared,
            Err(e) => {
                warn!(rule = %rule.name, "Skipping gate rule: {}", e);
                continue;
            }
        };

        let store = store.clone();
        let token = token.clone();
        let handle = match sink {
            SinkKind::ProbeStatus => {
                let sink = ProbeStatusSink::new(
                    KubeProbeClient::new(client.clone(), &rule.namespace),
                    &rule,
                );
                tokio::spawn(GateReconciler::new(rule, prober, sink, store).run(token))
            }
            SinkKind::PodCondition => {
                let sink =
                    PodConditionSink::new(KubePodClient::new(client.clone(), &rule.namespace), &rule);
                tokio::spawn(GateReconciler::new(rule, prober, sink, store).run(token))
            }
        };
        handles.push(handle);
    }

    info!(count = handles.len(), "Gate reconcilers started");

    for result in join_all(handles).await {
        if let Err(e) = result {
            error!("Gate reconciler task failed: {}", e);
        }
    }
}
