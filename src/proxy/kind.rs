// src/proxy/kind.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const PROXY_TYPE_MASK: u32 = 0x00ff_0000;
pub const PROXY_TYPE_HTTP: u32 = 0x0001_0000;
pub const PROXY_TYPE_SOCKS: u32 = 0x0002_0000;
pub const PROXY_VERSION_MASK: u32 = 0x0000_ff00;
pub const PROXY_FLAGS_MASK: u32 = 0x0000_00ff;

/// Flag bit for the SOCKS variants that let the proxy resolve host names
/// (`socks4a`, `socks5h`).
pub const SOCKS_FLAG_REMOTE_DNS: u32 = 0x01;

/// Proxy kind encoded as `kind | version << 8 | flags`, so kind and version
/// can be tested independently through the masks above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProxyType(u32);

impl ProxyType {
    pub const HTTP: ProxyType = ProxyType(PROXY_TYPE_HTTP);
    pub const SOCKS: ProxyType = ProxyType(PROXY_TYPE_SOCKS);
    pub const SOCKS4: ProxyType = ProxyType(PROXY_TYPE_SOCKS | (4 << 8));
    pub const SOCKS4A: ProxyType = ProxyType(PROXY_TYPE_SOCKS | (4 << 8) | SOCKS_FLAG_REMOTE_DNS);
    pub const SOCKS5: ProxyType = ProxyType(PROXY_TYPE_SOCKS | (5 << 8));
    pub const SOCKS5H: ProxyType = ProxyType(PROXY_TYPE_SOCKS | (5 << 8) | SOCKS_FLAG_REMOTE_DNS);

    pub const fn from_bits(bits: u32) -> Self {
        ProxyType(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub fn is_http(self) -> bool {
        self.0 & PROXY_TYPE_MASK == PROXY_TYPE_HTTP
    }

    pub fn is_socks(self) -> bool {
        self.0 & PROXY_TYPE_MASK == PROXY_TYPE_SOCKS
    }

    /// 4 or 5 for SOCKS kinds that carry a version, 0 otherwise.
    pub fn socks_version(self) -> u8 {
        if self.is_socks() {
            ((self.0 & PROXY_VERSION_MASK) >> 8) as u8
        } else {
            0
        }
    }

    pub fn socks_flags(self) -> u8 {
        (self.0 & PROXY_FLAGS_MASK) as u8
    }

    /// URL scheme understood by proxy clients.
    pub fn scheme(self) -> &'static str {
        let remote_dns = u32::from(self.socks_flags()) == SOCKS_FLAG_REMOTE_DNS;
        match (self.is_http(), self.socks_version(), remote_dns) {
            (true, _, _) => "http",
            (false, 4, true) => "socks4a",
            (false, 4, false) => "socks4",
            (false, 5, true) => "socks5h",
            (false, 5, false) => "socks5",
            _ => "socks",
        }
    }
}

impl fmt::Display for ProxyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown proxy type: {0}")]
pub struct UnknownProxyType(String);

impl FromStr for ProxyType {
    type Err = UnknownProxyType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(ProxyType::HTTP),
            "socks" => Ok(ProxyType::SOCKS),
            "socks4" => Ok(ProxyType::SOCKS4),
            "socks4a" => Ok(ProxyType::SOCKS4A),
            "socks5" => Ok(ProxyType::SOCKS5),
            "socks5h" => Ok(ProxyType::SOCKS5H),
            _ => Err(UnknownProxyType(s.to_string())),
        }
    }
}

impl TryFrom<String> for ProxyType {
    type Error = UnknownProxyType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProxyType> for String {
    fn from(value: ProxyType) -> Self {
        value.to_string()
    }
}
