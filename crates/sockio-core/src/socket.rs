//! Socket capability
//!
//! A `Socket` owns one transport handle. The engine never touches the
//! handle directly except to register it with a selector; everything else
//! goes through this trait.
//!
//! # Implementors
//!
//! - `ClientSocket`: non-blocking TCP client, connect completes via write
//!   readiness.
//! - `PersistentClientSocket`: TCP client that survives across requests
//!   when marked keep-alive.
//! - `ServerSocket`: listening socket; reads produce accepted clients.
//! - `AcceptedSocket`: server side of an accepted connection, already open.
//! - `UdpClientSocket`: connectionless datagram client.
//!
//! **Contract:**
//! - `read()` and `write()` must NEVER block. A read with nothing to
//!   deliver returns `Frame::Partial`; a write the transport can't take
//!   returns `Ok(0)`.
//! - Transport failures are reported as `SockError::Network`.
//! - Dropping a socket releases its handle.

use std::os::fd::RawFd;

use crate::error::{SockError, SockResult};
use crate::frame::Frame;
use crate::picker::FramePicker;

/// Socket flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketKind {
    Client,
    Server,
    Accepted,
    PersistentClient,
    UdpClient,
}

impl SocketKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SocketKind::Client => "client",
            SocketKind::Server => "server",
            SocketKind::Accepted => "accepted",
            SocketKind::PersistentClient => "persistent-client",
            SocketKind::UdpClient => "udp-client",
        }
    }

    /// Connected byte stream (can carry urgent data)
    pub fn is_stream(&self) -> bool {
        matches!(
            self,
            SocketKind::Client | SocketKind::Accepted | SocketKind::PersistentClient
        )
    }
}

/// Transport options applied on `open`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamContext {
    /// Disable Nagle's algorithm on stream sockets
    pub nodelay: bool,
    /// Set `SO_REUSEADDR` before binding
    pub reuse_address: bool,
    /// Local address to bind before connecting
    pub bind_to: Option<String>,
    /// Listen backlog for server sockets, `None` uses the module default
    pub backlog: Option<i32>,
}

impl StreamContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodelay(mut self, enable: bool) -> Self {
        self.nodelay = enable;
        self
    }

    pub fn reuse_address(mut self, enable: bool) -> Self {
        self.reuse_address = enable;
        self
    }

    pub fn bind_to(mut self, address: impl Into<String>) -> Self {
        self.bind_to = Some(address.into());
        self
    }

    pub fn backlog(mut self, backlog: i32) -> Self {
        self.backlog = Some(backlog);
        self
    }
}

/// Crypto protocol requested for a handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoMethod {
    TlsClient,
    TlsServer,
    Tls12Client,
    Tls13Client,
}

/// Outcome of one handshake step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStatus {
    Done,
    Failed,
    /// Needs more readiness cycles
    InProgress,
}

/// Transport capability driven by the executor
pub trait Socket {
    fn kind(&self) -> SocketKind;

    /// Open the transport towards (or, for servers, at) `address`.
    ///
    /// Stream clients return once the connect is initiated; completion is
    /// reported through write readiness and `finish_connect()`.
    fn open(&mut self, address: &str, context: &StreamContext) -> SockResult<()>;

    /// Release the transport. Closing a closed socket is a no-op.
    fn close(&mut self) -> SockResult<()>;

    fn is_connected(&self) -> bool;

    /// Whether a keep-alive transport can be reused: no EOF pending and
    /// the peer name still resolves.
    fn is_live(&self) -> bool {
        self.is_connected()
    }

    /// Report a deferred connect failure once the transport became usable
    fn finish_connect(&mut self) -> SockResult<()> {
        Ok(())
    }

    /// Bytes already received but not yet handed to a picker. The
    /// selector never reports these, so the next read must not wait for it.
    fn has_buffered_data(&self) -> bool {
        false
    }

    /// Read whatever is available into `picker`
    fn read(&mut self, picker: &mut dyn FramePicker, out_of_band: bool) -> SockResult<Frame>;

    /// Write as much of `data` as the transport takes, returning the count
    fn write(&mut self, data: &[u8], out_of_band: bool) -> SockResult<usize>;

    /// Handle registered with the selector, `None` while closed
    fn raw_handle(&self) -> Option<RawFd>;

    /// Run one non-blocking step of a crypto handshake
    fn handshake(&mut self, _method: CryptoMethod) -> SockResult<HandshakeStatus> {
        Err(SockError::network(format!(
            "crypto handshake is not supported by {} sockets",
            self.kind().as_str()
        )))
    }

    /// Connectionless sockets bypass readiness multiplexing
    fn is_connectionless(&self) -> bool {
        false
    }

    /// Peer address, once known
    fn remote_address(&self) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_context_builder() {
        let ctx = StreamContext::new()
            .nodelay(true)
            .bind_to("127.0.0.1:0")
            .backlog(16);
        assert!(ctx.nodelay);
        assert!(!ctx.reuse_address);
        assert_eq!(ctx.bind_to.as_deref(), Some("127.0.0.1:0"));
        assert_eq!(ctx.backlog, Some(16));
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(SocketKind::PersistentClient.as_str(), "persistent-client");
        assert_eq!(SocketKind::UdpClient.as_str(), "udp-client");
        assert!(SocketKind::Accepted.is_stream());
        assert!(!SocketKind::Server.is_stream());
    }
}
