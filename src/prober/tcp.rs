use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use super::Prober;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Healthy iff a TCP connection to `host:port` opens within the timeout
pub struct TcpProber {
    address: String,
    timeout: Duration,
}

impl TcpProber {
    pub fn new(address: &str) -> Self {
        Self::with_timeout(address, CONNECT_TIMEOUT)
    }

    pub fn with_timeout(address: &str, timeout: Duration) -> Self {
        Self {
            address: address.trim().to_string(),
            timeout,
        }
    }
}

#[async_trait]
impl Prober for TcpProber {
    async fn check(&self) -> bool {
        match timeout(self.timeout, TcpStream::connect(self.address.as_str())).await {
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => {
                debug!("TCP probe {} failed: {}", self.address, e);
                false
            }
            Err(_) => {
                debug!("TCP probe {} timed out after {:?}", self.address, self.timeout);
                false
            }
        }
    }

    fn describe(&self) -> String {
        format!("tcp {}", self.address)
    }
}
