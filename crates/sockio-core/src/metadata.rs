//! Typed per-socket configuration and telemetry
//!
//! `SocketMetadata` is what the caller sets at `add_socket` time (and may
//! change later through the socket bag). `SocketTelemetry` is written by
//! the pipeline stages and is read-only to callers.

use core::fmt;
use std::any::Any;
use std::time::{Duration, Instant};

use crate::socket::StreamContext;

/// Deadline setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timeout {
    /// Use the executor-wide default
    #[default]
    Default,
    /// Never expire
    Forever,
    After(Duration),
}

impl Timeout {
    /// Resolve against the executor default; `None` means no deadline
    #[inline]
    pub fn resolve(self, default: Duration) -> Option<Duration> {
        match self {
            Timeout::Default => Some(default),
            Timeout::Forever => None,
            Timeout::After(d) => Some(d),
        }
    }
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        Timeout::After(d)
    }
}

/// Minimum transfer rate, enforced once it has been violated for longer
/// than `duration`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeedLimit {
    pub bytes_per_sec: u64,
    pub duration: Duration,
}

impl SpeedLimit {
    pub fn new(bytes_per_sec: u64, duration: Duration) -> Self {
        Self {
            bytes_per_sec,
            duration,
        }
    }
}

/// Caller-supplied socket configuration
#[derive(Default)]
pub struct SocketMetadata {
    /// Remote (or, for servers, local) address such as `tcp://127.0.0.1:80`
    pub address: Option<String>,
    pub stream_context: StreamContext,
    pub connect_timeout: Timeout,
    pub io_timeout: Timeout,
    pub min_receive_speed: Option<SpeedLimit>,
    pub min_send_speed: Option<SpeedLimit>,
    /// Keep the transport open across requests while it stays live
    pub keep_alive: bool,
    /// Opaque value handed back in every event
    pub user_context: Option<Box<dyn Any>>,
}

impl SocketMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn stream_context(mut self, ctx: StreamContext) -> Self {
        self.stream_context = ctx;
        self
    }

    pub fn connect_timeout(mut self, timeout: impl Into<Timeout>) -> Self {
        self.connect_timeout = timeout.into();
        self
    }

    pub fn io_timeout(mut self, timeout: impl Into<Timeout>) -> Self {
        self.io_timeout = timeout.into();
        self
    }

    pub fn min_receive_speed(mut self, bytes_per_sec: u64, duration: Duration) -> Self {
        self.min_receive_speed = Some(SpeedLimit::new(bytes_per_sec, duration));
        self
    }

    pub fn min_send_speed(mut self, bytes_per_sec: u64, duration: Duration) -> Self {
        self.min_send_speed = Some(SpeedLimit::new(bytes_per_sec, duration));
        self
    }

    pub fn keep_alive(mut self, enable: bool) -> Self {
        self.keep_alive = enable;
        self
    }

    pub fn user_context<T: Any>(mut self, ctx: T) -> Self {
        self.user_context = Some(Box::new(ctx));
        self
    }

    /// Typed view of the user context
    pub fn context<T: Any>(&self) -> Option<&T> {
        self.user_context.as_ref().and_then(|c| c.downcast_ref())
    }

    pub fn context_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.user_context.as_mut().and_then(|c| c.downcast_mut())
    }
}

impl fmt::Debug for SocketMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketMetadata")
            .field("address", &self.address)
            .field("stream_context", &self.stream_context)
            .field("connect_timeout", &self.connect_timeout)
            .field("io_timeout", &self.io_timeout)
            .field("min_receive_speed", &self.min_receive_speed)
            .field("min_send_speed", &self.min_send_speed)
            .field("keep_alive", &self.keep_alive)
            .field("user_context", &self.user_context.is_some())
            .finish()
    }
}

/// Pipeline-maintained counters and timestamps
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SocketTelemetry {
    pub connection_start: Option<Instant>,
    pub connection_finish: Option<Instant>,
    pub last_io_start: Option<Instant>,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    /// Bytes per second, once measured
    pub send_speed: Option<f64>,
    pub receive_speed: Option<f64>,
    pub request_complete: bool,
}

impl SocketTelemetry {
    #[inline]
    pub fn is_connected(&self) -> bool {
        self.connection_finish.is_some()
    }
}
