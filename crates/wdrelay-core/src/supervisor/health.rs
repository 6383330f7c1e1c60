use chrono::{DateTime, Utc};
use serde::Serialize;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

/// Polls the automation server's base HTTP endpoint.
pub struct HealthChecker {
    client: reqwest::Client,
    url: String,
}

impl HealthChecker {
    pub fn new(url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn check(&self) -> HealthStatus {
        HealthStatus {
            healthy: self.check_http().await,
            timestamp: Utc::now(),
        }
    }

    async fn check_http(&self) -> bool {
        match self.client.get(&self.url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(err) => {
                debug!(url = %self.url, error = %err, "Server not answering yet");
                false
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub timestamp: DateTime<Utc>,
}

/// Whether something already accepts TCP connections on `host:port`.
pub async fn is_listening(host: &str, port: u16, timeout: Duration) -> bool {
    let addrs: Vec<SocketAddr> = match tokio::net::lookup_host((host, port)).await {
        Ok(addrs) => addrs.collect(),
        Err(_) => return false,
    };

    for addr in addrs {
        if let Ok(Ok(_stream)) = tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
            return true;
        }
    }
    false
}
