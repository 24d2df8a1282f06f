// src/proxy/static_source.rs
use super::error::ProxyError;
use super::provider::{ProxyProvider, ProxySource};
use super::server::{HealthCheck, ProxyServer, ProxyServerInfo};
use crate::config::SourceConfig;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// A provider whose servers come from the configuration file.
pub struct StaticProvider {
    name: String,
    inner: ProxyProvider,
    health: Arc<dyn HealthCheck>,
}

impl StaticProvider {
    pub fn new(config: &SourceConfig, health: Arc<dyn HealthCheck>) -> Self {
        let provider = Self {
            name: config.name.clone(),
            inner: ProxyProvider::new(config.max_concurrent),
            health,
        };
        provider.refresh(&config.servers);
        provider
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Swap in a new server list. Bans are cleared, live leases are kept.
    pub fn refresh(&self, servers: &[ProxyServerInfo]) {
        let servers = servers
            .iter()
            .cloned()
            .map(|info| ProxyServer::new(info, self.health.clone()))
            .collect();
        self.inner.set_server_list(servers);
    }
}

#[async_trait]
impl ProxySource for StaticProvider {
    fn provider(&self) -> &ProxyProvider {
        &self.inner
    }

    async fn init(&self) -> Result<(), ProxyError> {
        if self.inner.total_server_count() == 0 {
            warn!(source = %self.name, "Source has no servers");
        }
        info!(
            source = %self.name,
            id = %self.inner.id(),
            servers = self.inner.total_server_count(),
            max_concurrent = self.inner.max_concurrent(),
            "Source ready"
        );
        Ok(())
    }

    async fn close(&self) -> Result<(), ProxyError> {
        let in_use = self.inner.used_server_count();
        if in_use > 0 {
            warn!(source = %self.name, in_use, "Closing source with leases outstanding");
        } else {
            info!(source = %self.name, "Source closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::AlwaysHealthy;
    use crate::proxy::ProxyType;

    fn config() -> SourceConfig {
        SourceConfig {
            name: "office".to_string(),
            max_concurrent: 1,
            servers: vec![
                ProxyServerInfo::new(ProxyType::HTTP, "10.0.0.1", 3128),
                ProxyServerInfo::new(ProxyType::SOCKS5, "10.0.0.2", 1080),
            ],
        }
    }

    #[tokio::test]
    async fn test_builds_servers_from_config() {
        let source = StaticProvider::new(&config(), Arc::new(AlwaysHealthy));
        source.init().await.unwrap();

        assert_eq!(source.name(), "office");
        assert_eq!(source.provider().total_server_count(), 2);
        assert_eq!(source.provider().available_server_count(), 1);

        let lease = source.provider().get_server().await.unwrap().unwrap();
        assert!(source.provider().get_server().await.unwrap().is_none());
        lease.close();
        source.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_refresh_replaces_servers() {
        let source = StaticProvider::new(&config(), Arc::new(AlwaysHealthy));
        let old_ids: Vec<String> = source
            .provider()
            .servers()
            .iter()
            .map(|s| s.id().to_string())
            .collect();

        source.refresh(&[ProxyServerInfo::new(ProxyType::SOCKS5H, "10.0.0.3", 1080)]);

        let servers = source.provider().servers();
        assert_eq!(servers.len(), 1);
        assert!(servers[0].is_socks());
        assert!(!old_ids.contains(&servers[0].id().to_string()));
    }
}
