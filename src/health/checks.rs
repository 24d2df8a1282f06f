// src/health/checks.rs
use crate::metrics::MetricsCollector;
use crate::proxy::{build_client, AgentOptions, HealthCheck, ProxyError, ProxyServerInfo};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{lookup_host, TcpStream};
use tokio::time::{timeout, Duration, Instant};
use tracing::debug;
use url::Url;

const USER_AGENT: &str = "proxy-lease-health-check";

/// Treats every endpoint as healthy. Used for trusted static lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysHealthy;

#[async_trait]
impl HealthCheck for AlwaysHealthy {
    async fn check(&self, _server: &ProxyServerInfo) -> Result<bool, ProxyError> {
        Ok(true)
    }
}

/// Healthy when a TCP connection to the proxy itself succeeds.
pub struct TcpCheck {
    timeout: Duration,
    metrics: Option<Arc<MetricsCollector>>,
}

impl TcpCheck {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Option<Arc<MetricsCollector>>) -> Self {
        self.metrics = metrics;
        self
    }

    async fn resolve(&self, server: &ProxyServerInfo) -> Result<Vec<SocketAddr>, ProxyError> {
        let address = server.address();
        let addrs: Vec<SocketAddr> = match timeout(self.timeout, lookup_host(address.as_str())).await
        {
            Ok(Ok(addrs)) => addrs.collect(),
            Ok(Err(e)) => return Err(ProxyError::transport(e)),
            Err(_) => {
                return Err(ProxyError::transport(format!(
                    "resolving {} timed out",
                    address
                )))
            }
        };

        if addrs.is_empty() {
            return Err(ProxyError::transport(format!(
                "{} resolved to no addresses",
                address
            )));
        }
        Ok(addrs)
    }

    async fn connect(&self, server: &ProxyServerInfo) -> Result<bool, ProxyError> {
        let addrs = self.resolve(server).await?;

        match timeout(self.timeout, TcpStream::connect(&addrs[..])).await {
            Ok(Ok(_stream)) => Ok(true),
            Ok(Err(e)) => {
                debug!(server = %server.address(), error = %e, "TCP check failed");
                Ok(false)
            }
            Err(_) => {
                debug!(server = %server.address(), "TCP check timed out");
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl HealthCheck for TcpCheck {
    async fn check(&self, server: &ProxyServerInfo) -> Result<bool, ProxyError> {
        let start = Instant::now();
        let result = self.connect(server).await;
        record(self.metrics.as_deref(), &result, start);
        result
    }
}

fn record(metrics: Option<&MetricsCollector>, result: &Result<bool, ProxyError>, start: Instant) {
    if let Some(metrics) = metrics {
        match result {
            Ok(healthy) => metrics.record_health_check(*healthy, start.elapsed()),
            Err(_) => metrics.record_health_check_error(start.elapsed()),
        }
    }
}

/// Healthy when a GET of `target` through the proxy answers with the
/// expected status (any 2xx when none is configured).
pub struct HttpCheck {
    target: Url,
    timeout: Duration,
    expected_status: Option<u16>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl HttpCheck {
    pub fn new(target: Url, timeout: Duration) -> Self {
        Self {
            target,
            timeout,
            expected_status: None,
            metrics: None,
        }
    }

    pub fn with_expected_status(mut self, status: Option<u16>) -> Self {
        self.expected_status = status;
        self
    }

    pub fn with_metrics(mut self, metrics: Option<Arc<MetricsCollector>>) -> Self {
        self.metrics = metrics;
        self
    }

    fn accepts(&self, status: reqwest::StatusCode) -> bool {
        match self.expected_status {
            Some(expected) => status.as_u16() == expected,
            None => status.is_success(),
        }
    }

    async fn fetch(&self, server: &ProxyServerInfo) -> Result<bool, ProxyError> {
        let options = AgentOptions {
            timeout: Some(self.timeout),
            connect_timeout: Some(self.timeout),
            user_agent: Some(USER_AGENT.to_string()),
        };
        let client = build_client(&server.proxy_url()?, &options)?;

        match client.get(self.target.clone()).send().await {
            Ok(response) => {
                let status = response.status();
                if !self.accepts(status) {
                    debug!(server = %server.address(), %status, "HTTP check got unexpected status");
                }
                Ok(self.accepts(status))
            }
            Err(e) if e.is_connect() || e.is_timeout() => {
                debug!(server = %server.address(), error = %e, "HTTP check could not reach target");
                Ok(false)
            }
            Err(e) => Err(ProxyError::transport(e)),
        }
    }
}

#[async_trait]
impl HealthCheck for HttpCheck {
    async fn check(&self, server: &ProxyServerInfo) -> Result<bool, ProxyError> {
        let start = Instant::now();
        let result = self.fetch(server).await;
        record(self.metrics.as_deref(), &result, start);
        result
    }
}
