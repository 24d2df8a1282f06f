// src/proxy/mod.rs
mod agent;
mod error;
mod kind;
mod lease;
mod pool;
mod provider;
mod server;
mod static_source;

pub use agent::{AgentOptions, SocksAgent};
pub use error::{BoxError, ProxyError};
pub use kind::{
    ProxyType, UnknownProxyType, PROXY_FLAGS_MASK, PROXY_TYPE_HTTP, PROXY_TYPE_MASK,
    PROXY_TYPE_SOCKS, PROXY_VERSION_MASK, SOCKS_FLAG_REMOTE_DNS,
};
pub use lease::{PooledLease, ServerLease};
pub use pool::ProxyPool;
pub use provider::{BanRecord, ProxyProvider, ProxySource, SourceKey};
pub use server::{HealthCheck, ProxyServer, ProxyServerInfo, ServerKey};
pub use static_source::StaticProvider;

pub(crate) use agent::build_client;
