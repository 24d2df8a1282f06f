// src/proxy/agent.rs
use super::error::ProxyError;
use std::time::Duration;
use url::Url;

/// Options applied to clients built on top of a proxy endpoint.
#[derive(Debug, Clone, Default)]
pub struct AgentOptions {
    pub timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    pub user_agent: Option<String>,
}

/// Transport handle for a SOCKS endpoint.
#[derive(Debug, Clone)]
pub struct SocksAgent {
    protocol: &'static str,
    proxy_url: Url,
    options: AgentOptions,
}

impl SocksAgent {
    pub(crate) fn new(protocol: &'static str, proxy_url: Url, options: AgentOptions) -> Self {
        Self {
            protocol,
            proxy_url,
            options,
        }
    }

    /// One of `socks4`, `socks4a`, `socks5`, `socks5h`, or `socks` when the
    /// endpoint does not carry a version.
    pub fn protocol(&self) -> &'static str {
        self.protocol
    }

    pub fn proxy_url(&self) -> &Url {
        &self.proxy_url
    }

    pub fn options(&self) -> &AgentOptions {
        &self.options
    }

    /// Build an HTTP client whose traffic goes through this proxy.
    pub fn client(&self) -> Result<reqwest::Client, ProxyError> {
        build_client(&self.proxy_url, &self.options)
    }
}

pub(crate) fn build_client(
    proxy_url: &Url,
    options: &AgentOptions,
) -> Result<reqwest::Client, ProxyError> {
    // Unsupported schemes (e.g. socks4 with this client) fail here.
    let proxy = reqwest::Proxy::all(proxy_url.as_str()).map_err(ProxyError::transport)?;

    let mut builder = reqwest::Client::builder().proxy(proxy);
    if let Some(timeout) = options.timeout {
        builder = builder.timeout(timeout);
    }
    if let Some(connect_timeout) = options.connect_timeout {
        builder = builder.connect_timeout(connect_timeout);
    }
    if let Some(user_agent) = &options.user_agent {
        builder = builder.user_agent(user_agent.clone());
    }

    builder.build().map_err(ProxyError::transport)
}
