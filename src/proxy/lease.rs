// src/proxy/lease.rs
use super::server::ProxyServer;
use crate::metrics::MetricsCollector;
use dashmap::DashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// One endpoint checked out of a provider.
///
/// Release with [`ServerLease::close`]; closing twice is a no-op. A lease
/// that is dropped while still alive is closed on drop, so an abandoned
/// `get_server()` call cannot leak its endpoint.
#[derive(Debug)]
#[must_use = "dropping a lease releases its endpoint"]
pub struct ServerLease {
    provider_id: Arc<str>,
    server: Arc<ProxyServer>,
    // Release capability: the owning provider's used set.
    used: Arc<DashSet<String>>,
    alive: AtomicBool,
}

impl ServerLease {
    pub(crate) fn new(
        provider_id: Arc<str>,
        server: Arc<ProxyServer>,
        used: Arc<DashSet<String>>,
    ) -> Self {
        Self {
            provider_id,
            server,
            used,
            alive: AtomicBool::new(true),
        }
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    pub fn server(&self) -> &Arc<ProxyServer> {
        &self.server
    }

    pub fn alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Hand the endpoint back to its provider.
    pub fn close(&self) {
        if !self.alive.swap(false, Ordering::AcqRel) {
            return;
        }

        self.used.remove(self.server.id());
        debug!(
            provider = %self.provider_id,
            server = %self.server.id(),
            "Released proxy server"
        );
    }
}

impl Drop for ServerLease {
    fn drop(&mut self) {
        if self.alive() {
            debug!(server = %self.server.id(), "Lease dropped while alive");
            self.close();
        }
    }
}

/// Pool-level wrapper around a [`ServerLease`].
#[derive(Debug)]
#[must_use = "dropping a lease releases its endpoint"]
pub struct PooledLease {
    inner: ServerLease,
    alive: AtomicBool,
    metrics: Option<Arc<MetricsCollector>>,
}

impl PooledLease {
    pub(crate) fn new(inner: ServerLease, metrics: Option<Arc<MetricsCollector>>) -> Self {
        Self {
            inner,
            alive: AtomicBool::new(true),
            metrics,
        }
    }

    pub fn source_id(&self) -> &str {
        self.inner.provider_id()
    }

    pub fn server(&self) -> &Arc<ProxyServer> {
        self.inner.server()
    }

    pub fn alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub fn close(&self) {
        if !self.alive.swap(false, Ordering::AcqRel) {
            return;
        }

        self.inner.close();
        if let Some(metrics) = &self.metrics {
            metrics.decrement_active_leases();
        }
    }
}

impl Drop for PooledLease {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::AlwaysHealthy;
    use crate::proxy::{ProxyServerInfo, ProxyType};

    fn leased() -> (ServerLease, Arc<DashSet<String>>) {
        let server = Arc::new(ProxyServer::new(
            ProxyServerInfo::new(ProxyType::HTTP, "127.0.0.1", 8080),
            Arc::new(AlwaysHealthy),
        ));
        let used = Arc::new(DashSet::new());
        used.insert(server.id().to_string());
        let lease = ServerLease::new(Arc::from("provider"), server, used.clone());
        (lease, used)
    }

    #[test]
    fn test_close_releases_once() {
        let (lease, used) = leased();
        assert!(lease.alive());
        assert_eq!(used.len(), 1);

        lease.close();
        assert!(!lease.alive());
        assert!(used.is_empty());

        // Somebody else takes the same endpoint; a second close must not free it.
        used.insert(lease.server().id().to_string());
        lease.close();
        assert_eq!(used.len(), 1);
    }

    #[test]
    fn test_pooled_close_is_idempotent() {
        let (lease, used) = leased();
        let pooled = PooledLease::new(lease, None);

        pooled.close();
        pooled.close();
        assert!(!pooled.alive());
        assert!(used.is_empty());
    }

    #[test]
    fn test_drop_releases_alive_lease() {
        let (lease, used) = leased();
        drop(lease);
        assert!(used.is_empty());
    }
}
