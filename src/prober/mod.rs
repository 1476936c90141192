//! Health probers
//!
//! A prober runs one health check and answers healthy or not. Probers never
//! fail: every internal error (refused connection, timeout, non-zero exit)
//! is reported as unhealthy, and every check is bounded by its own timeout.

mod exec;
mod http;
mod tcp;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::{CheckType, GateRule};
use crate::error::Result;

pub use exec::ExecProber;
pub use http::HttpProber;
pub use tcp::TcpProber;

/// A single health check
#[async_trait]
pub trait Prober: Send + Sync {
    /// Run the check once
    async fn check(&self) -> bool;

    /// Short description for logs, e.g. `tcp db:5432`
    fn describe(&self) -> String;
}

/// Outcome of one probe run. Only the latest value matters.
#[derive(Clone, Debug, PartialEq)]
pub struct ProbeResult {
    pub healthy: bool,
    pub timestamp: DateTime<Utc>,
    pub duration: Duration,
}

/// Run `prober` once and time it
pub async fn run_probe(prober: &dyn Prober) -> ProbeResult {
    let timestamp = Utc::now();
    let start = Instant::now();
    let healthy = prober.check().await;
    ProbeResult {
        healthy,
        timestamp,
        duration: start.elapsed(),
    }
}

/// Select the prober for a rule's check type
pub fn for_rule(rule: &GateRule) -> Result<Box<dyn Prober>> {
    let prober: Box<dyn Prober> = match rule.check_type()? {
        CheckType::Http => Box::new(HttpProber::new(&rule.check_target)?),
        CheckType::Tcp => Box::new(TcpProber::new(&rule.check_target)),
        CheckType::Exec => Box::new(ExecProber::new(&rule.check_target)),
    };
    Ok(prober)
}
