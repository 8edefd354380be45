//! Event kinds
//!
//! Lifecycle of a normal request, per socket:
//!
//! ```text
//! INITIALIZE -> CONNECTED -> (READ | WRITE)* -> DISCONNECTED -> FINALIZE
//! ```
//!
//! `INITIALIZE` and `FINALIZE` bracket every admitted socket, even when the
//! connect fails; `DISCONNECTED` fires only after a finished connect.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Socket admitted, about to open
    Initialize,
    /// Transport became usable (once per socket)
    Connected,
    /// Listening socket accepted a client
    Accept,
    /// Frame completed
    Read,
    /// Write operation about to start
    Write,
    /// Out-of-band data received
    Oob,
    /// Socket idles at the null operation
    DataAlert,
    /// Data arrived while no operation was set
    DataArrived,
    /// Transport closed after a finished connect
    Disconnected,
    /// Connect or IO deadline expired
    Timeout,
    /// Socket-level failure
    Exception,
    /// Socket left the pipeline
    Finalize,
}

impl EventKind {
    pub const ALL: [EventKind; 12] = [
        EventKind::Initialize,
        EventKind::Connected,
        EventKind::Accept,
        EventKind::Read,
        EventKind::Write,
        EventKind::Oob,
        EventKind::DataAlert,
        EventKind::DataArrived,
        EventKind::Disconnected,
        EventKind::Timeout,
        EventKind::Exception,
        EventKind::Finalize,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Initialize => "INITIALIZE",
            EventKind::Connected => "CONNECTED",
            EventKind::Accept => "ACCEPT",
            EventKind::Read => "READ",
            EventKind::Write => "WRITE",
            EventKind::Oob => "OOB",
            EventKind::DataAlert => "DATA_ALERT",
            EventKind::DataArrived => "DATA_ARRIVED",
            EventKind::Disconnected => "DISCONNECTED",
            EventKind::Timeout => "TIMEOUT",
            EventKind::Exception => "EXCEPTION",
            EventKind::Finalize => "FINALIZE",
        }
    }

    /// Events still delivered after a stop was requested
    #[inline]
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            EventKind::Disconnected | EventKind::Finalize | EventKind::Exception
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which deadline expired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPhase {
    DuringConnection,
    DuringIo,
}

impl fmt::Display for TimeoutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutPhase::DuringConnection => write!(f, "DURING_CONNECTION"),
            TimeoutPhase::DuringIo => write!(f, "DURING_IO"),
        }
    }
}
