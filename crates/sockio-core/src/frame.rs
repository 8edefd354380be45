//! Frames produced by socket reads
//!
//! A read never blocks: it either completes a frame, reports a partial
//! frame (the picker inside the read operation keeps what it collected and
//! resumes next cycle), or, for listening sockets, hands over an accepted
//! client connection.

use core::fmt;

use crate::socket::Socket;

/// Result of one `Socket::read` call
pub enum Frame {
    /// Logically complete unit of data
    Data(DataFrame),
    /// Data is incomplete; retry on the next readiness cycle
    Partial(PartialFrame),
    /// A listening socket accepted a client
    Accepted(AcceptedFrame),
}

impl Frame {
    /// Whether the frame is complete
    #[inline]
    pub fn is_eof(&self) -> bool {
        !matches!(self, Frame::Partial(_))
    }

    /// Remote address the data came from, if known
    pub fn remote_address(&self) -> Option<&str> {
        match self {
            Frame::Data(f) => f.remote_address(),
            Frame::Partial(f) => f.remote_address(),
            Frame::Accepted(f) => Some(f.remote_address()),
        }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Data(d) => f.debug_tuple("Data").field(d).finish(),
            Frame::Partial(p) => f.debug_tuple("Partial").field(p).finish(),
            Frame::Accepted(a) => f.debug_tuple("Accepted").field(a).finish(),
        }
    }
}

/// Immutable completed frame
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DataFrame {
    data: Vec<u8>,
    remote_address: Option<String>,
}

impl DataFrame {
    pub fn new(data: Vec<u8>, remote_address: Option<String>) -> Self {
        Self {
            data,
            remote_address,
        }
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn remote_address(&self) -> Option<&str> {
        self.remote_address.as_deref()
    }

    /// Lossy UTF-8 view, handy for line protocols and logging
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

/// Incomplete frame marker
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PartialFrame {
    buffered: usize,
    remote_address: Option<String>,
}

impl PartialFrame {
    pub fn new(buffered: usize, remote_address: Option<String>) -> Self {
        Self {
            buffered,
            remote_address,
        }
    }

    /// Bytes the picker holds so far
    #[inline]
    pub fn buffered(&self) -> usize {
        self.buffered
    }

    pub fn remote_address(&self) -> Option<&str> {
        self.remote_address.as_deref()
    }
}

/// Client connection accepted by a listening socket
pub struct AcceptedFrame {
    remote_address: String,
    client: Box<dyn Socket>,
}

impl AcceptedFrame {
    pub fn new(remote_address: String, client: Box<dyn Socket>) -> Self {
        Self {
            remote_address,
            client,
        }
    }

    pub fn remote_address(&self) -> &str {
        &self.remote_address
    }

    /// Split into the remote address and the client socket
    pub fn into_parts(self) -> (String, Box<dyn Socket>) {
        (self.remote_address, self.client)
    }
}

impl fmt::Debug for AcceptedFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AcceptedFrame")
            .field("remote_address", &self.remote_address)
            .field("client", &self.client.kind())
            .finish()
    }
}
