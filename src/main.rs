// src/main.rs
use anyhow::Result;
use proxy_lease::{
    config,
    health::create_health_check,
    metrics::MetricsRegistry,
    proxy::{ProxyPool, StaticProvider},
};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("proxy_lease=debug".parse()?),
        )
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yaml".to_string());

    info!("Loading configuration from: {}", config_path);
    let config = config::load_config(&config_path).await?;

    // Initialize metrics
    let metrics_registry = MetricsRegistry::new()?;
    let metrics = config.metrics.enabled.then(|| metrics_registry.collector());

    // Build the pool, one provider per configured source
    let health = create_health_check(&config.health_check, metrics.clone());
    let mut pool = ProxyPool::new();
    if let Some(metrics) = &metrics {
        pool = pool.with_metrics(metrics.clone());
    }
    for source in &config.sources {
        pool.add_provider(Arc::new(StaticProvider::new(source, health.clone())));
    }
    pool.init().await?;

    // Lease until every source is exhausted
    let mut leases = Vec::new();
    while let Some(lease) = pool.get_server(true).await? {
        let server = lease.server();
        info!(
            source = %lease.source_id(),
            proxy_type = %server.proxy_type(),
            address = %server.info().address(),
            "Leased proxy"
        );
        leases.push(lease);
    }
    info!("Pool exhausted after {} leases", leases.len());

    for lease in &leases {
        lease.close();
    }

    if let Err(e) = pool.close().await {
        warn!("Pool close reported an error: {}", e);
    }

    if config.metrics.enabled {
        println!("{}", metrics_registry.gather()?);
    }

    Ok(())
}
