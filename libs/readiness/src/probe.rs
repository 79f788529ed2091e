//! Readiness probes.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::error::ReadinessError;

/// Result of a single readiness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeStatus {
    Ready,
    NotReady(String),
    /// The check could not be performed at all. Retrying will not help.
    Failed(String),
}

impl ProbeStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, ProbeStatus::Ready)
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeStatus::Ready => write!(f, "ready"),
            ProbeStatus::NotReady(reason) => write!(f, "not ready: {}", reason),
            ProbeStatus::Failed(message) => write!(f, "failed: {}", message),
        }
    }
}

/// A single readiness check against a collaborator.
///
/// Implementations must not block; the caller bounds each check with the
/// policy's `check_timeout`.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Human-readable description for logs and errors.
    fn describe(&self) -> String;

    /// Perform one check.
    async fn check(&self) -> ProbeStatus;
}

/// Ready once a TCP connection to `address` succeeds.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    address: String,
    connect_timeout: Duration,
}

impl TcpProbe {
    /// Create a probe for a `host:port` address.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            connect_timeout: Duration::from_secs(2),
        }
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl Probe for TcpProbe {
    fn describe(&self) -> String {
        format!("tcp://{}", self.address)
    }

    async fn check(&self) -> ProbeStatus {
        match timeout(self.connect_timeout, TcpStream::connect(self.address.as_str())).await {
            Ok(Ok(_stream)) => {
                debug!(address = %self.address, "tcp readiness check succeeded");
                ProbeStatus::Ready
            }
            Ok(Err(e)) => {
                debug!(address = %self.address, error = %e, "tcp readiness check failed: connection error");
                ProbeStatus::NotReady(format!("connect failed: {}", e))
            }
            Err(_) => {
                debug!(address = %self.address, "tcp readiness check failed: timeout");
                ProbeStatus::NotReady("connect timed out".to_string())
            }
        }
    }
}

/// Ready once a GET to `url` returns a 2xx status.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    url: String,
    client: reqwest::Client,
}

impl HttpProbe {
    /// Create a probe for `url` with a per-request timeout.
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Result<Self, ReadinessError> {
        let url = url.into();

        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ReadinessError::InvalidProbe {
                target: url,
                message: "url must start with http:// or https://".to_string(),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ReadinessError::InvalidProbe {
                target: url.clone(),
                message: e.to_string(),
            })?;

        Ok(Self { url, client })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Probe for HttpProbe {
    fn describe(&self) -> String {
        self.url.clone()
    }

    async fn check(&self) -> ProbeStatus {
        match self.client.get(&self.url).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(url = %self.url, status = %response.status(), "http readiness check succeeded");
                ProbeStatus::Ready
            }
            Ok(response) => {
                debug!(url = %self.url, status = %response.status(), "http readiness check failed: non-2xx status");
                ProbeStatus::NotReady(format!("status {}", response.status()))
            }
            Err(e) => {
                debug!(url = %self.url, error = %e, "http readiness check failed: request error");
                ProbeStatus::NotReady(format!("request failed: {}", e))
            }
        }
    }
}
