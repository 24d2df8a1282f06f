// src/proxy/pool.rs
use super::error::ProxyError;
use super::lease::PooledLease;
use super::provider::{ProxySource, SourceKey};
use crate::metrics::MetricsCollector;
use dashmap::DashMap;
use rand::seq::SliceRandom;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Fans lease requests out over several providers.
///
/// Providers are visited in a fresh random order on every request. Adding or
/// removing providers while leases are being requested is safe, but callers
/// should keep such changes infrequent.
#[derive(Clone, Default)]
pub struct ProxyPool {
    providers: Arc<DashMap<String, Arc<dyn ProxySource>>>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl ProxyPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Register `source`, replacing any provider with the same id.
    pub fn add_provider(&self, source: Arc<dyn ProxySource>) -> Option<Arc<dyn ProxySource>> {
        let id = source.id().to_string();
        let replaced = self.providers.insert(id.clone(), source);
        info!(provider = %id, replaced = replaced.is_some(), "Added provider");
        replaced
    }

    /// Unregister a provider, given either the source or its id.
    pub fn remove_provider(&self, source: impl SourceKey) -> Option<Arc<dyn ProxySource>> {
        let id = source.source_id();
        let removed = self.providers.remove(id).map(|(_, source)| source);
        if removed.is_some() {
            info!(provider = %id, "Removed provider");
        }
        removed
    }

    pub fn provider(&self, id: &str) -> Option<Arc<dyn ProxySource>> {
        self.providers.get(id).map(|entry| entry.value().clone())
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    fn snapshot(&self) -> Vec<Arc<dyn ProxySource>> {
        self.providers
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Lease a server from the first provider (in random order) that has one.
    ///
    /// `Ok(None)` means every provider is exhausted. With `ignore_errors` a
    /// failing provider counts as exhausted; otherwise its error is returned
    /// and the remaining providers are not tried.
    pub async fn get_server(&self, ignore_errors: bool) -> Result<Option<PooledLease>, ProxyError> {
        let mut sources = self.snapshot();
        sources.shuffle(&mut rand::thread_rng());

        for source in sources {
            let provider = source.provider();

            // Unsynchronized pre-check; the provider re-checks under its queue.
            if provider.available_server_count() == 0 {
                debug!(provider = %provider.id(), "Provider has no capacity, skipping");
                if let Some(metrics) = &self.metrics {
                    metrics.record_source_skipped(provider.id());
                }
                continue;
            }

            match provider.get_server().await {
                Ok(Some(lease)) => {
                    if let Some(metrics) = &self.metrics {
                        metrics.record_lease_request("granted");
                        metrics.increment_active_leases();
                    }
                    return Ok(Some(PooledLease::new(lease, self.metrics.clone())));
                }
                Ok(None) => continue,
                Err(e) if ignore_errors => {
                    warn!(provider = %provider.id(), error = %e, "Provider failed, trying next");
                    if let Some(metrics) = &self.metrics {
                        metrics.record_source_error(provider.id());
                    }
                }
                Err(e) => {
                    if let Some(metrics) = &self.metrics {
                        metrics.record_source_error(provider.id());
                        metrics.record_lease_request("error");
                    }
                    return Err(e);
                }
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_lease_request("exhausted");
        }
        Ok(None)
    }

    /// Initialise every provider; the first failure aborts.
    pub async fn init(&self) -> Result<(), ProxyError> {
        for source in self.snapshot() {
            source.init().await?;
        }
        Ok(())
    }

    /// Close every provider. Failures do not stop the others from closing;
    /// the last failure observed is returned.
    pub async fn close(&self) -> Result<(), ProxyError> {
        let sources = self.snapshot();
        let results = futures::future::join_all(sources.iter().map(|s| s.close())).await;

        let mut last_error = None;
        for (source, result) in sources.iter().zip(results) {
            if let Err(e) = result {
                warn!(provider = %source.id(), error = %e, "Provider close failed");
                last_error = Some(e);
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
