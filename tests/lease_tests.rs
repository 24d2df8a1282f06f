// tests/lease_tests.rs
use async_trait::async_trait;
use proxy_lease::config::{HealthCheckConfig, HealthCheckMode, SourceConfig};
use proxy_lease::health::create_health_check;
use proxy_lease::metrics::MetricsRegistry;
use proxy_lease::proxy::{
    HealthCheck, ProxyError, ProxyPool, ProxyProvider, ProxyServer, ProxyServerInfo, ProxySource,
    ProxyType, StaticProvider,
};
use std::sync::Arc;
use tokio::net::TcpListener;

struct Healthy;

#[async_trait]
impl HealthCheck for Healthy {
    async fn check(&self, _server: &ProxyServerInfo) -> Result<bool, ProxyError> {
        // Suspend so concurrent requests interleave.
        tokio::task::yield_now().await;
        Ok(true)
    }
}

struct Failing;

#[async_trait]
impl HealthCheck for Failing {
    async fn check(&self, _server: &ProxyServerInfo) -> Result<bool, ProxyError> {
        Err(ProxyError::transport("handshake failed"))
    }
}

fn provider(max_concurrent: i64, count: u16, health: Arc<dyn HealthCheck>) -> Arc<ProxyProvider> {
    let servers = (0..count)
        .map(|i| {
            ProxyServer::new(
                ProxyServerInfo::new(ProxyType::SOCKS5, "127.0.0.1", 1080 + i),
                health.clone(),
            )
        })
        .collect();
    Arc::new(ProxyProvider::with_servers(max_concurrent, servers))
}

#[tokio::test]
async fn test_concurrent_pool_requests_respect_every_ceiling() {
    let a = provider(2, 2, Arc::new(Healthy));
    let b = provider(2, 2, Arc::new(Healthy));
    let pool = ProxyPool::new();
    pool.add_provider(a.clone());
    pool.add_provider(b.clone());

    let results = futures::future::join_all((0..6).map(|_| pool.get_server(false))).await;
    let leases: Vec<_> = results.into_iter().map(|r| r.unwrap()).collect();

    assert_eq!(leases.iter().filter(|l| l.is_some()).count(), 4);
    assert_eq!(leases.iter().filter(|l| l.is_none()).count(), 2);
    assert_eq!(a.used_server_count(), 2);
    assert_eq!(b.used_server_count(), 2);

    let mut ids: Vec<_> = leases
        .iter()
        .flatten()
        .map(|l| l.server().id().to_string())
        .collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 4);
}

#[tokio::test]
async fn test_unbounded_provider_leases_every_server_once() {
    let source = provider(-1, 3, Arc::new(Healthy));

    let results = futures::future::join_all((0..5).map(|_| source.get_server())).await;
    let leases: Vec<_> = results.into_iter().filter_map(|r| r.unwrap()).collect();

    assert_eq!(leases.len(), 3);
    assert_eq!(source.used_server_count(), 3);
    assert_eq!(source.available_server_count(), 0);

    drop(leases);
    assert_eq!(source.used_server_count(), 0);
    assert_eq!(source.available_server_count(), 3);
}

#[tokio::test]
async fn test_ignore_errors_skips_broken_source() {
    let broken = provider(-1, 3, Arc::new(Failing));
    let good = provider(-1, 1, Arc::new(Healthy));
    let pool = ProxyPool::new();
    pool.add_provider(broken);
    pool.add_provider(good.clone());

    let lease = pool.get_server(true).await.unwrap().unwrap();
    assert_eq!(lease.source_id(), good.id());
    assert!(lease.server().create_socks_agent(Default::default()).is_ok());
}

#[tokio::test]
async fn test_released_lease_is_reacquired_through_pool() {
    let source = provider(1, 1, Arc::new(Healthy));
    let pool = ProxyPool::new();
    pool.add_provider(source.clone());

    let first = pool.get_server(false).await.unwrap().unwrap();
    let id = first.server().id().to_string();
    assert!(pool.get_server(false).await.unwrap().is_none());

    first.close();
    let second = pool.get_server(false).await.unwrap().unwrap();
    assert_eq!(second.server().id(), id);
}

#[tokio::test]
async fn test_static_sources_with_tcp_check_and_metrics() {
    let live = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let live_port = live.local_addr().unwrap().port();
    let dead_port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };

    let registry = MetricsRegistry::new().unwrap();
    let metrics = registry.collector();
    let health_config = HealthCheckConfig {
        mode: HealthCheckMode::Tcp,
        timeout_secs: 2,
        target_url: None,
        expected_status: None,
    };
    let health = create_health_check(&health_config, Some(metrics.clone()));

    let source = Arc::new(StaticProvider::new(
        &SourceConfig {
            name: "local".to_string(),
            max_concurrent: -1,
            servers: vec![
                ProxyServerInfo::new(ProxyType::HTTP, "127.0.0.1", live_port),
                ProxyServerInfo::new(ProxyType::HTTP, "127.0.0.1", dead_port),
            ],
        },
        health,
    ));

    let pool = ProxyPool::new().with_metrics(metrics);
    pool.add_provider(source.clone());
    pool.init().await.unwrap();

    let lease = pool.get_server(false).await.unwrap().unwrap();
    assert_eq!(lease.server().info().port, live_port);
    assert!(pool.get_server(false).await.unwrap().is_none());

    let text = registry.gather().unwrap();
    assert!(text.contains("proxy_leases_active 1"));
    assert!(text.contains("proxy_lease_requests_total{outcome=\"exhausted\"} 1"));

    lease.close();
    assert!(registry.gather().unwrap().contains("proxy_leases_active 0"));
    assert_eq!(source.provider().used_server_count(), 0);
    pool.close().await.unwrap();
}
