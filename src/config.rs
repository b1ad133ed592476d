//! Validated connection configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4, ToSocketAddrs};
use std::time::Duration;

use thiserror::Error;

/// Default server port.
pub const DEFAULT_PORT: u16 = 4567;
/// Default wait for a `CONFIRM` before retransmitting, in milliseconds.
pub const DEFAULT_CONFIRMATION_TIMEOUT_MS: u32 = 250;
/// Default number of retransmissions after the first send.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// How long a request may wait for its `REPLY`.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// Which transport the session runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// TCP with the line-framed codec.
    Stream,
    /// UDP with the binary codec and the reliability layer.
    Datagram,
}

impl std::str::FromStr for TransportKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" | "stream" => Ok(TransportKind::Stream),
            "udp" | "datagram" => Ok(TransportKind::Datagram),
            _ => Err(ConfigError::UnknownTransport(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown transport {0:?}; expected tcp or udp")]
    UnknownTransport(String),
    #[error("port must be non-zero")]
    InvalidPort,
    #[error("failed to resolve {host:?}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{0:?} has no IPv4 address")]
    NoIpv4Address(String),
}

/// Everything the engine needs to start a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub remote: SocketAddrV4,
    pub transport: TransportKind,
    pub confirmation_timeout: Duration,
    pub max_retries: u32,
    pub reply_timeout: Duration,
}

impl Config {
    /// Build a configuration with default timing for `remote`.
    pub fn new(remote: SocketAddrV4, transport: TransportKind) -> Self {
        Self {
            remote,
            transport,
            confirmation_timeout: Duration::from_millis(u64::from(DEFAULT_CONFIRMATION_TIMEOUT_MS)),
            max_retries: DEFAULT_MAX_RETRIES,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
        }
    }

    /// Resolve `host` to an IPv4 address and validate the remaining fields.
    ///
    /// An IPv4 literal is used as-is; any other string is looked up and the
    /// first IPv4 result wins.
    pub fn resolve(
        host: &str,
        port: u16,
        transport: TransportKind,
        confirmation_timeout_ms: u32,
        max_retries: u32,
    ) -> Result<Self, ConfigError> {
        if port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        let ip = resolve_ipv4(host, port)?;
        Ok(Self {
            confirmation_timeout: Duration::from_millis(u64::from(confirmation_timeout_ms)),
            max_retries,
            ..Self::new(SocketAddrV4::new(ip, port), transport)
        })
    }

    pub fn remote_addr(&self) -> SocketAddr {
        SocketAddr::V4(self.remote)
    }
}

fn resolve_ipv4(host: &str, port: u16) -> Result<Ipv4Addr, ConfigError> {
    if let Ok(ip) = host.parse::<Ipv4Addr>() {
        return Ok(ip);
    }
    let addrs = (host, port)
        .to_socket_addrs()
        .map_err(|source| ConfigError::Resolve {
            host: host.to_string(),
            source,
        })?;
    addrs
        .filter_map(|addr| match addr.ip() {
            IpAddr::V4(ip) => Some(ip),
            IpAddr::V6(_) => None,
        })
        .next()
        .ok_or_else(|| ConfigError::NoIpv4Address(host.to_string()))
}
