// src/health/mod.rs
mod checks;

pub use checks::{AlwaysHealthy, HttpCheck, TcpCheck};

use crate::config::{HealthCheckConfig, HealthCheckMode};
use crate::metrics::MetricsCollector;
use crate::proxy::HealthCheck;
use std::sync::Arc;

pub fn create_health_check(
    config: &HealthCheckConfig,
    metrics: Option<Arc<MetricsCollector>>,
) -> Arc<dyn HealthCheck> {
    match config.mode {
        HealthCheckMode::None => Arc::new(AlwaysHealthy),
        HealthCheckMode::Tcp => Arc::new(TcpCheck::new(config.timeout()).with_metrics(metrics)),
        HealthCheckMode::Http => match &config.target_url {
            Some(target) => Arc::new(
                HttpCheck::new(target.clone(), config.timeout())
                    .with_expected_status(config.expected_status)
                    .with_metrics(metrics),
            ),
            None => {
                tracing::warn!("HTTP health check without target_url, falling back to TCP");
                Arc::new(TcpCheck::new(config.timeout()).with_metrics(metrics))
            }
        },
    }
}
