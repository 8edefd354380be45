//! Error types for the sockio engine
//!
//! The pipeline sorts every error into one of three buckets:
//!
//! - socket-level (network, protocol, unmanaged socket): routed to the
//!   `EXCEPTION` event, after which the socket is disconnected
//! - control signals (operation cancel, selector timeout): never reach
//!   user-visible exception subscribers
//! - fatal (selector failure, handler-raised errors, programming errors):
//!   abort the whole request execution and are returned to the caller

use core::fmt;
use std::time::Duration;

use crate::id::SocketId;

/// Result type for engine operations
pub type SockResult<T> = Result<T, SockError>;

/// Transfer direction, used by slow-transfer failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Send,
    Receive,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Send => write!(f, "send"),
            Direction::Receive => write!(f, "receive"),
        }
    }
}

/// Errors raised by sockets, stages and the executor
#[derive(Debug, Clone, PartialEq)]
pub enum SockError {
    /// Transport-level failure (connect refused, reset, broken pipe, ...)
    Network {
        message: String,
        errno: Option<i32>,
    },

    /// Crypto handshake failed
    Handshake(String),

    /// Transfer rate stayed below the configured minimum for too long
    SlowTransfer {
        direction: Direction,
        speed: f64,
        min_speed: u64,
        duration: Duration,
    },

    /// Socket sat at the null operation past the guardian ceiling
    UnmanagedSocket {
        id: SocketId,
        attempts: u32,
    },

    /// Selector wait elapsed without any ready socket
    SelectTimeout,

    /// Selector failed for a reason other than timeout
    Selector(i32),

    /// Current operation was cancelled by an event handler
    Cancelled,

    /// Socket was never added to the bag or was already removed
    UnknownSocket(SocketId),

    /// The transport is already registered under another id
    AlreadyRegistered(SocketId),

    /// Descriptor is checked out for event dispatch
    Busy(SocketId),

    /// Postponing requires the keep-alive flag
    NotKeepAlive(SocketId),

    /// `execute_request` called while a request is executing
    AlreadyExecuting,

    /// `stop_request` called outside of execution
    NotExecuting,

    /// Operation cannot be used where it was placed
    InvalidOperation(&'static str),

    /// Non-socket failure raised by user code
    Handler(String),
}

impl SockError {
    /// Build a network error without errno
    pub fn network(message: impl Into<String>) -> Self {
        SockError::Network {
            message: message.into(),
            errno: None,
        }
    }

    /// Build a network error from an errno value
    pub fn from_errno(context: &str, errno: i32) -> Self {
        SockError::Network {
            message: format!("{}: {}", context, std::io::Error::from_raw_os_error(errno)),
            errno: Some(errno),
        }
    }

    /// Build a fatal handler error
    pub fn handler(message: impl Into<String>) -> Self {
        SockError::Handler(message.into())
    }

    /// Errors routed to `EXCEPTION` subscribers
    #[inline]
    pub fn is_socket_level(&self) -> bool {
        matches!(
            self,
            SockError::Network { .. }
                | SockError::Handshake(_)
                | SockError::SlowTransfer { .. }
                | SockError::UnmanagedSocket { .. }
        )
    }

    /// Operation-cancel control signal
    #[inline]
    pub fn is_cancel(&self) -> bool {
        matches!(self, SockError::Cancelled)
    }

    /// Errors that abort request execution
    #[inline]
    pub fn is_fatal(&self) -> bool {
        !self.is_socket_level() && !self.is_cancel() && !matches!(self, SockError::SelectTimeout)
    }
}

impl fmt::Display for SockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SockError::Network { message, .. } => write!(f, "network error: {}", message),
            SockError::Handshake(msg) => write!(f, "crypto handshake failed: {}", msg),
            SockError::SlowTransfer {
                direction,
                speed,
                min_speed,
                duration,
            } => write!(
                f,
                "{} speed {:.2} B/s stayed below {} B/s for more than {:?}",
                direction, speed, min_speed, duration
            ),
            SockError::UnmanagedSocket { id, attempts } => write!(
                f,
                "{} is not managed: no operation for {} attempts",
                id, attempts
            ),
            SockError::SelectTimeout => write!(f, "select timed out"),
            SockError::Selector(errno) => write!(
                f,
                "select failed: {}",
                std::io::Error::from_raw_os_error(*errno)
            ),
            SockError::Cancelled => write!(f, "operation cancelled"),
            SockError::UnknownSocket(id) => write!(f, "unknown socket {}", id),
            SockError::AlreadyRegistered(id) => {
                write!(f, "transport already registered as {}", id)
            }
            SockError::Busy(id) => write!(f, "{} is being processed", id),
            SockError::NotKeepAlive(id) => {
                write!(f, "{} can not be postponed without keep-alive", id)
            }
            SockError::AlreadyExecuting => write!(f, "request is already executing"),
            SockError::NotExecuting => write!(f, "request is not executing"),
            SockError::InvalidOperation(msg) => write!(f, "invalid operation: {}", msg),
            SockError::Handler(msg) => write!(f, "handler failed: {}", msg),
        }
    }
}

impl std::error::Error for SockError {}
