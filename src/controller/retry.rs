//! Read-modify-write with bounded retry on optimistic concurrency conflicts

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// How often and how patiently to retry a conflicting write
#[derive(Clone, Debug)]
pub struct ConflictRetry {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt; grows linearly afterwards
    pub initial_delay: Duration,
}

impl Default for ConflictRetry {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(50),
        }
    }
}

/// Run `operation` until it succeeds, fails with a non-conflict error, or the
/// attempt budget runs out.
///
/// `operation` receives the 1-based attempt number and must re-read the
/// object it modifies on every attempt after the first. Only
/// [`Error::is_conflict`] errors are retried.
pub async fn retry_on_conflict<F, Fut, T>(
    object: &str,
    policy: &ConflictRetry,
    mut operation: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_conflict() => {
                if attempt >= max_attempts {
                    warn!(
                        object = %object,
                        attempts = attempt,
                        "Write conflict retries exhausted"
                    );
                    return Err(Error::ConflictRetriesExhausted {
                        object: object.to_string(),
                        attempts: attempt,
                    });
                }

                let jitter = rand::thread_rng().gen_range(0.5..1.5);
                let delay = policy.initial_delay.mul_f64(attempt as f64 * jitter);
                debug!(
                    object = %object,
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Write conflict, re-reading and retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
