use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::Prober;

const EXEC_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs a command; healthy iff it exits with status 0
pub struct ExecProber {
    command: Vec<String>,
    timeout: Duration,
}

impl ExecProber {
    /// Splits `command_line` on whitespace; no shell quoting is interpreted
    pub fn new(command_line: &str) -> Self {
        Self::with_timeout(command_line, EXEC_TIMEOUT)
    }

    pub fn with_timeout(command_line: &str, timeout: Duration) -> Self {
        Self {
            command: command_line.split_whitespace().map(str::to_string).collect(),
            timeout,
        }
    }
}

#[async_trait]
impl Prober for ExecProber {
    async fn check(&self) -> bool {
        let Some((program, args)) = self.command.split_first() else {
            return false;
        };

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();

        match timeout(self.timeout, child).await {
            Ok(Ok(status)) if status.success() => true,
            Ok(Ok(status)) => {
                debug!("Exec probe '{}' exited with {}", self.command.join(" "), status);
                false
            }
            Ok(Err(e)) => {
                warn!("Exec probe '{}' failed to start: {}", self.command.join(" "), e);
                false
            }
            Err(_) => {
                warn!(
                    "Exec probe '{}' timed out after {:?}",
                    self.command.join(" "),
                    self.timeout
                );
                false
            }
        }
    }

    fn describe(&self) -> String {
        format!("exec {}", self.command.join(" "))
    }
}
