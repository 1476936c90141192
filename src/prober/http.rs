use std::time::Duration;

use async_trait::async_trait;
use reqwest::{redirect, Client, Url};
use tracing::debug;

use super::Prober;
use crate::error::{Error, Result};

const HTTP_TIMEOUT: Duration = Duration::from_secs(3);

/// GET probe: healthy on any 2xx or 3xx response
pub struct HttpProber {
    client: Client,
    url: Url,
}

impl HttpProber {
    pub fn new(url: &str) -> Result<Self> {
        Self::with_timeout(url, HTTP_TIMEOUT)
    }

    pub fn with_timeout(url: &str, timeout: Duration) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| Error::ProbeError(format!("invalid HTTP probe URL '{url}': {e}")))?;
        let client = Client::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::none())
            .user_agent(concat!("readiness-gate/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::ProbeError(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn check(&self) -> bool {
        match self.client.get(self.url.clone()).send().await {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() || status.is_redirection() {
                    true
                } else {
                    debug!("HTTP probe {} returned {}", self.url, status);
                    false
                }
            }
            Err(e) => {
                debug!("HTTP probe {} failed: {}", self.url, e);
                false
            }
        }
    }

    fn describe(&self) -> String {
        format!("http {}", self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn server_returning(status: u16) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/healthz"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_success_is_healthy() {
        let server = server_returning(200).await;
        let prober = HttpProber::new(&format!("{}/healthz", server.uri())).unwrap();
        assert!(prober.check().await);
    }

    #[tokio::test]
    async fn test_redirect_is_healthy() {
        let server = server_returning(302).await;
        let prober = HttpProber::new(&format!("{}/healthz", server.uri())).unwrap();
        assert!(prober.check().await);
    }

    #[tokio::test]
    async fn test_server_error_is_unhealthy() {
        let server = server_returning(503).await;
        let prober = HttpProber::new(&format!("{}/healthz", server.uri())).unwrap();
        assert!(!prober.check().await);
    }

    #[tokio::test]
    async fn test_not_found_is_unhealthy() {
        let server = server_returning(200).await;
        let prober = HttpProber::new(&format!("{}/missing", server.uri())).unwrap();
        assert!(!prober.check().await);
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let prober =
            HttpProber::with_timeout(&server.uri(), Duration::from_millis(200)).unwrap();
        let start = std::time::Instant::now();
        assert!(!prober.check().await);
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn test_invalid_url_is_probe_error() {
        assert!(matches!(
            HttpProber::new("web/healthz"),
            Err(Error::ProbeError(_))
        ));
    }

    #[tokio::test]
    async fn test_connection_refused_is_unhealthy() {
        // Port 9 on localhost is the discard service, closed on test hosts.
        let prober = HttpProber::new("http://127.0.0.1:9/").unwrap();
        assert!(!prober.check().await);
    }
}
