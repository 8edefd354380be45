//! Address parsing
//!
//! Addresses are IP literals with a port, optionally prefixed by a
//! transport scheme: `127.0.0.1:80`, `tcp://[::1]:8080`, `udp://10.0.0.1:53`.
//! Host names are not resolved.

use std::net::SocketAddr;

use sockio_core::{SockError, SockResult};

/// Transport named by an address prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Tcp,
    Udp,
}

/// Split an address into its scheme (when present) and socket address
pub fn parse_address(address: &str) -> SockResult<(Option<Scheme>, SocketAddr)> {
    let trimmed = address.trim();
    let (scheme, rest) = if let Some(rest) = trimmed.strip_prefix("tcp://") {
        (Some(Scheme::Tcp), rest)
    } else if let Some(rest) = trimmed.strip_prefix("udp://") {
        (Some(Scheme::Udp), rest)
    } else {
        (None, trimmed)
    };

    let rest = rest.trim_end_matches('/');
    rest.parse::<SocketAddr>()
        .map(|addr| (scheme, addr))
        .map_err(|_| SockError::network(format!("invalid address '{}'", address)))
}
