// src/config/models.rs
use crate::proxy::ProxyServerInfo;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub health_check: HealthCheckConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    /// Negative means unbounded.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: i64,
    pub servers: Vec<ProxyServerInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthCheckMode {
    None,
    Tcp,
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckConfig {
    #[serde(default = "default_health_mode")]
    pub mode: HealthCheckMode,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub target_url: Option<Url>,
    #[serde(default)]
    pub expected_status: Option<u16>,
}

impl HealthCheckConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            mode: default_health_mode(),
            timeout_secs: default_timeout_secs(),
            target_url: None,
            expected_status: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_max_concurrent() -> i64 {
    -1
}

fn default_health_mode() -> HealthCheckMode {
    HealthCheckMode::Tcp
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for source in &self.sources {
            if !names.insert(source.name.as_str()) {
                bail!("Duplicate source name: {}", source.name);
            }
            if source.servers.is_empty() {
                bail!("Source {} has no servers", source.name);
            }
            for server in &source.servers {
                if server.host.trim().is_empty() {
                    bail!("Source {} has a server with an empty host", source.name);
                }
                if server.port == 0 {
                    bail!("Source {}: server {} has port 0", source.name, server.host);
                }
            }
        }

        if self.health_check.timeout_secs == 0 {
            bail!("health_check.timeout_secs must be greater than zero");
        }
        if self.health_check.mode == HealthCheckMode::Http && self.health_check.target_url.is_none()
        {
            bail!("health_check.target_url is required for http mode");
        }

        Ok(())
    }
}
