// src/proxy/provider.rs
use super::error::ProxyError;
use super::lease::ServerLease;
use super::server::{ProxyServer, ServerKey};
use crate::serial::TaskSerializer;
use arc_swap::ArcSwap;
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use rand::seq::SliceRandom;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Why and since when a server is excluded from selection.
#[derive(Debug, Clone, Copy)]
pub struct BanRecord {
    pub forever: bool,
    pub banned_at: Instant,
}

struct ProviderState {
    id: Arc<str>,
    max_concurrent: i64,
    servers: ArcSwap<Vec<Arc<ProxyServer>>>,
    used: Arc<DashSet<String>>,
    bans: DashMap<String, BanRecord>,
}

impl ProviderState {
    fn free_servers(&self) -> Vec<Arc<ProxyServer>> {
        self.servers
            .load()
            .iter()
            .filter(|s| !self.used.contains(s.id()) && !self.bans.contains_key(s.id()))
            .cloned()
            .collect()
    }

    fn available_for(&self, free: usize) -> usize {
        if self.max_concurrent < 0 {
            return free;
        }
        let headroom = self.max_concurrent - self.used.len() as i64;
        (free as i64).min(headroom).max(0) as usize
    }

    async fn acquire(self: Arc<Self>) -> Result<Option<ServerLease>, ProxyError> {
        let mut candidates = self.free_servers();
        candidates.shuffle(&mut rand::thread_rng());

        if self.available_for(candidates.len()) == 0 {
            debug!(
                provider = %self.id,
                used = self.used.len(),
                "No capacity left, skipping health checks"
            );
            return Ok(None);
        }

        for server in candidates {
            match server.health_check().await {
                Ok(true) => {
                    self.used.insert(server.id().to_string());
                    debug!(provider = %self.id, server = %server.id(), "Leased proxy server");
                    return Ok(Some(ServerLease::new(
                        self.id.clone(),
                        server,
                        self.used.clone(),
                    )));
                }
                Ok(false) => {
                    debug!(
                        provider = %self.id,
                        server = %server.info().address(),
                        "Proxy server failed health check, trying next"
                    );
                }
                Err(e) => {
                    warn!(
                        provider = %self.id,
                        server = %server.info().address(),
                        error = %e,
                        "Health check errored"
                    );
                    return Err(e);
                }
            }
        }

        debug!(provider = %self.id, "All candidate servers are unhealthy");
        Ok(None)
    }
}

/// Owns a set of proxy servers and leases them out under a concurrency
/// ceiling (`max_concurrent < 0` means unbounded).
///
/// Selection runs through a [`TaskSerializer`], so concurrent `get_server`
/// calls on the same provider never observe the same free server or both
/// pass a ceiling meant for one.
pub struct ProxyProvider {
    state: Arc<ProviderState>,
    queue: TaskSerializer,
}

impl ProxyProvider {
    pub fn new(max_concurrent: i64) -> Self {
        Self {
            state: Arc::new(ProviderState {
                id: Arc::from(Uuid::new_v4().to_string()),
                max_concurrent,
                servers: ArcSwap::from_pointee(Vec::new()),
                used: Arc::new(DashSet::new()),
                bans: DashMap::new(),
            }),
            queue: TaskSerializer::new(),
        }
    }

    pub fn with_servers(max_concurrent: i64, servers: Vec<ProxyServer>) -> Self {
        let provider = Self::new(max_concurrent);
        provider.set_server_list(servers);
        provider
    }

    pub fn id(&self) -> &str {
        &self.state.id
    }

    pub fn max_concurrent(&self) -> i64 {
        self.state.max_concurrent
    }

    /// Replace the server list and clear all bans. Outstanding leases stay
    /// valid; releasing one whose server left the list frees nothing.
    pub fn set_server_list(&self, servers: Vec<ProxyServer>) {
        let servers: Vec<Arc<ProxyServer>> = servers.into_iter().map(Arc::new).collect();
        info!(
            provider = %self.state.id,
            count = servers.len(),
            "Server list replaced"
        );
        self.state.servers.store(Arc::new(servers));
        self.state.bans.clear();
    }

    pub fn servers(&self) -> Vec<Arc<ProxyServer>> {
        self.state.servers.load().iter().cloned().collect()
    }

    pub fn total_server_count(&self) -> usize {
        self.state.servers.load().len()
    }

    pub fn used_server_count(&self) -> usize {
        self.state.used.len()
    }

    pub fn available_server_count(&self) -> usize {
        self.state.available_for(self.state.free_servers().len())
    }

    /// Exclude a server from selection. Takes the server or its id; an
    /// existing lease on it is not revoked.
    pub fn ban_server(&self, server: impl ServerKey, forever: bool) {
        let server_id = server.server_id();
        self.state.bans.insert(
            server_id.to_string(),
            BanRecord {
                forever,
                banned_at: Instant::now(),
            },
        );
        debug!(provider = %self.state.id, server = %server_id, forever, "Banned server");
    }

    pub fn unban_server(&self, server: impl ServerKey) {
        let server_id = server.server_id();
        if self.state.bans.remove(server_id).is_some() {
            debug!(provider = %self.state.id, server = %server_id, "Unbanned server");
        }
    }

    pub fn is_banned(&self, server: impl ServerKey) -> bool {
        self.state.bans.contains_key(server.server_id())
    }

    pub fn ban_record(&self, server: impl ServerKey) -> Option<BanRecord> {
        self.state.bans.get(server.server_id()).map(|record| *record)
    }

    pub fn clear_bans(&self) {
        self.state.bans.clear();
    }

    /// Lease a healthy server, or `Ok(None)` when nothing is available.
    /// A failing health check aborts the search and is returned as is.
    pub async fn get_server(&self) -> Result<Option<ServerLease>, ProxyError> {
        let state = self.state.clone();
        self.queue.submit(move || state.acquire()).await?
    }
}

/// A provider as seen by the pool: the leasing core plus lifecycle hooks for
/// sources that own connections or background refreshes.
#[async_trait]
pub trait ProxySource: Send + Sync {
    fn provider(&self) -> &ProxyProvider;

    fn id(&self) -> &str {
        self.provider().id()
    }

    async fn init(&self) -> Result<(), ProxyError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), ProxyError> {
        Ok(())
    }
}

impl ProxySource for ProxyProvider {
    fn provider(&self) -> &ProxyProvider {
        self
    }
}

/// Anything that names a provider: its id or the provider itself.
pub trait SourceKey {
    fn source_id(&self) -> &str;
}

impl SourceKey for str {
    fn source_id(&self) -> &str {
        self
    }
}

impl SourceKey for String {
    fn source_id(&self) -> &str {
        self
    }
}

impl SourceKey for dyn ProxySource {
    fn source_id(&self) -> &str {
        self.id()
    }
}

impl SourceKey for ProxyProvider {
    fn source_id(&self) -> &str {
        self.id()
    }
}

impl<T: ProxySource + ?Sized> SourceKey for Arc<T> {
    fn source_id(&self) -> &str {
        (**self).id()
    }
}

impl<T: SourceKey + ?Sized> SourceKey for &T {
    fn source_id(&self) -> &str {
        (**self).source_id()
    }
}
