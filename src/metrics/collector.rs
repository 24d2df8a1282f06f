// src/metrics/collector.rs
use anyhow::Result;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub struct MetricsRegistry {
    registry: Registry,
    collector: Arc<MetricsCollector>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let collector = Arc::new(MetricsCollector::new(&registry)?);

        Ok(Self {
            registry,
            collector,
        })
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    /// Prometheus text exposition of everything registered.
    pub fn gather(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

pub struct MetricsCollector {
    // Lease metrics
    pub lease_requests_total: IntCounterVec,
    pub leases_active: IntGauge,
    pub source_skipped_total: IntCounterVec,
    pub source_errors_total: IntCounterVec,

    // Health check metrics
    pub health_checks_total: IntCounterVec,
    pub health_check_duration_seconds: HistogramVec,
}

impl MetricsCollector {
    pub fn new(registry: &Registry) -> Result<Self> {
        let lease_requests_total = IntCounterVec::new(
            Opts::new(
                "proxy_lease_requests_total",
                "Pool lease requests by outcome (granted, exhausted, error)",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(lease_requests_total.clone()))?;

        let leases_active = IntGauge::new("proxy_leases_active", "Pool leases not yet closed")?;
        registry.register(Box::new(leases_active.clone()))?;

        let source_skipped_total = IntCounterVec::new(
            Opts::new(
                "proxy_source_skipped_total",
                "Sources skipped by the pool because they had no capacity",
            ),
            &["source"],
        )?;
        registry.register(Box::new(source_skipped_total.clone()))?;

        let source_errors_total = IntCounterVec::new(
            Opts::new(
                "proxy_source_errors_total",
                "Lease attempts that failed inside a source",
            ),
            &["source"],
        )?;
        registry.register(Box::new(source_errors_total.clone()))?;

        let health_checks_total = IntCounterVec::new(
            Opts::new("proxy_health_checks_total", "Health checks by result"),
            &["result"],
        )?;
        registry.register(Box::new(health_checks_total.clone()))?;

        let health_check_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "proxy_health_check_duration_seconds",
                "Health check duration in seconds",
            ),
            &["result"],
        )?;
        registry.register(Box::new(health_check_duration_seconds.clone()))?;

        Ok(Self {
            lease_requests_total,
            leases_active,
            source_skipped_total,
            source_errors_total,
            health_checks_total,
            health_check_duration_seconds,
        })
    }

    pub fn record_lease_request(&self, outcome: &str) {
        self.lease_requests_total.with_label_values(&[outcome]).inc();
    }

    pub fn increment_active_leases(&self) {
        self.leases_active.inc();
    }

    pub fn decrement_active_leases(&self) {
        self.leases_active.dec();
    }

    pub fn record_source_skipped(&self, source: &str) {
        self.source_skipped_total.with_label_values(&[source]).inc();
    }

    pub fn record_source_error(&self, source: &str) {
        self.source_errors_total.with_label_values(&[source]).inc();
    }

    pub fn record_health_check(&self, healthy: bool, duration: Duration) {
        let result = if healthy { "healthy" } else { "unhealthy" };
        self.observe_health_check(result, duration);
    }

    /// A check that could not decide, e.g. the host did not resolve.
    pub fn record_health_check_error(&self, duration: Duration) {
        self.observe_health_check("error", duration);
    }

    fn observe_health_check(&self, result: &str, duration: Duration) {
        self.health_checks_total.with_label_values(&[result]).inc();
        self.health_check_duration_seconds
            .with_label_values(&[result])
            .observe(duration.as_secs_f64());
    }
}

impl fmt::Debug for MetricsCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsCollector")
            .field("leases_active", &self.leases_active.get())
            .finish_non_exhaustive()
    }
}
