//! Per-socket request state
//!
//! A `RequestDescriptor` is everything the pipeline knows about one
//! registered socket: the transport, the pending operation, the caller's
//! metadata, telemetry maintained by the stages, and the flags that drive
//! the stage state machine.
//!
//! ```text
//!   added ──► running ──► (connected) ──► complete ──► finalized
//!     │          ▲  │                        ▲
//!     │          └──┘ connect retry          │
//!     └────────────── postponed / forgotten ─┘
//! ```

use core::fmt;
use std::time::Instant;

use sockio_core::{
    Direction, Readiness, Socket, SocketId, SocketMetadata, SocketTelemetry, TimeoutPhase,
};

use crate::handler::EventHandler;
use crate::operation::Operation;
use crate::speed::SpeedRateCounter;

pub struct RequestDescriptor {
    pub(crate) id: SocketId,
    pub(crate) socket: Box<dyn Socket>,
    pub(crate) operation: Operation,
    pub(crate) metadata: SocketMetadata,
    pub(crate) telemetry: SocketTelemetry,
    pub(crate) handler: Option<Box<dyn EventHandler>>,
    /// Readiness reported by the last select
    pub(crate) readiness: Readiness,
    /// Connect was attempted in the current request
    pub(crate) running: bool,
    /// Parked by the user until the next request
    pub(crate) postponed: bool,
    /// Removed from the bag while running
    pub(crate) forgotten: bool,
    /// INITIALIZE fired in the current request
    pub(crate) initialized: bool,
    /// FINALIZE fired in the current request
    pub(crate) finalized: bool,
    /// Consecutive passes spent at the null operation
    pub(crate) idle_passes: u32,
    pub(crate) receive_counter: SpeedRateCounter,
    pub(crate) send_counter: SpeedRateCounter,
}

impl RequestDescriptor {
    pub(crate) fn new(
        id: SocketId,
        socket: Box<dyn Socket>,
        operation: Operation,
        metadata: SocketMetadata,
        handler: Option<Box<dyn EventHandler>>,
    ) -> Self {
        Self {
            id,
            socket,
            operation,
            metadata,
            telemetry: SocketTelemetry::default(),
            handler,
            readiness: Readiness::NONE,
            running: false,
            postponed: false,
            forgotten: false,
            initialized: false,
            finalized: false,
            idle_passes: 0,
            receive_counter: SpeedRateCounter::new(Direction::Receive),
            send_counter: SpeedRateCounter::new(Direction::Send),
        }
    }

    #[inline]
    pub fn id(&self) -> SocketId {
        self.id
    }

    pub fn socket(&self) -> &dyn Socket {
        &*self.socket
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn metadata(&self) -> &SocketMetadata {
        &self.metadata
    }

    pub fn telemetry(&self) -> &SocketTelemetry {
        &self.telemetry
    }

    #[inline]
    pub fn readiness(&self) -> Readiness {
        self.readiness
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }

    #[inline]
    pub fn is_postponed(&self) -> bool {
        self.postponed
    }

    #[inline]
    pub fn is_forgotten(&self) -> bool {
        self.forgotten
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.telemetry.request_complete
    }

    /// Still has work in the current request
    #[inline]
    pub(crate) fn is_active(&self) -> bool {
        !self.telemetry.request_complete && !self.forgotten && !self.postponed && !self.finalized
    }

    #[inline]
    pub(crate) fn mark_complete(&mut self) {
        self.telemetry.request_complete = true;
    }

    /// Kept open across requests while the transport stays live
    #[inline]
    pub(crate) fn is_keep_alive(&self) -> bool {
        self.metadata.keep_alive
    }

    /// Deadline phase and the instant its timer started
    pub(crate) fn deadline_phase(&self) -> (TimeoutPhase, Option<Instant>) {
        if self.telemetry.connection_finish.is_none() && !self.socket.is_connected() {
            (TimeoutPhase::DuringConnection, self.telemetry.connection_start)
        } else {
            (
                TimeoutPhase::DuringIo,
                self.telemetry.last_io_start.or(self.telemetry.connection_start),
            )
        }
    }

    /// Prepare a retained descriptor for another request
    pub(crate) fn reset_for_request(&mut self) {
        self.telemetry = SocketTelemetry::default();
        self.readiness = Readiness::NONE;
        self.running = false;
        self.postponed = false;
        self.initialized = false;
        self.finalized = false;
        self.idle_passes = 0;
        self.receive_counter.reset();
        self.send_counter.reset();
    }
}

impl fmt::Debug for RequestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDescriptor")
            .field("id", &self.id)
            .field("kind", &self.socket.kind())
            .field("operation", &self.operation)
            .field("readiness", &self.readiness)
            .field("running", &self.running)
            .field("postponed", &self.postponed)
            .field("forgotten", &self.forgotten)
            .field("complete", &self.telemetry.request_complete)
            .finish()
    }
}
