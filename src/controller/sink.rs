//! Destinations a gate's health is propagated to

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::SinkKind;
use crate::error::Result;
use crate::prober::ProbeResult;

pub const MESSAGE_CHECK_PASSED: &str = "Check passed";
pub const MESSAGE_CHECK_FAILED: &str = "Check failed";

/// What a reconcile pass wants the sink to reflect
#[derive(Clone, Debug, PartialEq)]
pub struct Observation {
    pub healthy: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&ProbeResult> for Observation {
    fn from(result: &ProbeResult) -> Self {
        Self {
            healthy: result.healthy,
            message: if result.healthy {
                MESSAGE_CHECK_PASSED
            } else {
                MESSAGE_CHECK_FAILED
            }
            .to_string(),
            timestamp: result.timestamp,
        }
    }
}

/// Result of [`StateSink::write_if_changed`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Stored state already matched; nothing was written
    Unchanged,
    /// This many objects were written
    Written(usize),
    /// Some objects were written, others failed and were logged
    Partial { written: usize, failed: usize },
    /// The backing record was still missing after re-creation
    RecordMissing,
}

impl WriteOutcome {
    pub fn writes(&self) -> usize {
        match self {
            WriteOutcome::Written(n) => *n,
            WriteOutcome::Partial { written, .. } => *written,
            WriteOutcome::Unchanged | WriteOutcome::RecordMissing => 0,
        }
    }
}

/// Backing store for one gate rule's externally visible state.
///
/// Implementations must only write when the stored state differs from the
/// observation, so repeated passes with an unchanged result are no-ops.
#[async_trait]
pub trait StateSink: Send + Sync {
    /// Snapshot of the stored state handed from `read` to `write_if_changed`
    type Record: Send;

    fn kind(&self) -> SinkKind;

    /// Create the backing record if absent; an existing record is success
    async fn ensure_exists(&self) -> Result<()>;

    /// Current stored state, `None` when the backing record is missing
    async fn read(&self) -> Result<Option<Self::Record>>;

    async fn write_if_changed(
        &self,
        current: Self::Record,
        observation: &Observation,
    ) -> Result<WriteOutcome>;
}
