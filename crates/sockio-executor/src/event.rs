//! Events handed to user handlers
//!
//! An `Event` borrows the dispatched socket, its metadata and telemetry,
//! and a `RequestControl` for the rest of the bag. Handlers steer the
//! socket through it: pick the next operation, cancel the current one,
//! grant one more attempt after a timeout, or stop the request.

use std::any::Any;

use sockio_core::{
    DataFrame, EventKind, SockError, SockResult, Socket, SocketId, SocketMetadata,
    SocketTelemetry, TimeoutPhase,
};

use crate::control::RequestControl;
use crate::operation::{Operation, WriteOperation};

/// Kind-specific data carried by an event
pub(crate) enum EventPayload {
    None,
    Frame(DataFrame),
    Accept {
        remote_address: String,
        client: Option<Box<dyn Socket>>,
    },
    Write(WriteOperation),
    Timeout(TimeoutPhase),
    Exception(SockError),
    DataAlert { attempt: u32, max: u32 },
}

pub struct Event<'a> {
    kind: EventKind,
    id: SocketId,
    socket: &'a mut dyn Socket,
    metadata: &'a mut SocketMetadata,
    telemetry: &'a SocketTelemetry,
    pub(crate) payload: EventPayload,
    control: RequestControl<'a>,
    pub(crate) next_operation: Option<Operation>,
    pub(crate) cancelled: bool,
    pub(crate) one_more_attempt: bool,
}

impl<'a> Event<'a> {
    pub(crate) fn new(
        kind: EventKind,
        id: SocketId,
        socket: &'a mut dyn Socket,
        metadata: &'a mut SocketMetadata,
        telemetry: &'a SocketTelemetry,
        payload: EventPayload,
        control: RequestControl<'a>,
    ) -> Self {
        Self {
            kind,
            id,
            socket,
            metadata,
            telemetry,
            payload,
            control,
            next_operation: None,
            cancelled: false,
            one_more_attempt: false,
        }
    }

    #[inline]
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    #[inline]
    pub fn socket_id(&self) -> SocketId {
        self.id
    }

    pub fn socket(&mut self) -> &mut dyn Socket {
        &mut *self.socket
    }

    pub fn metadata(&self) -> &SocketMetadata {
        &*self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut SocketMetadata {
        &mut *self.metadata
    }

    pub fn telemetry(&self) -> &SocketTelemetry {
        self.telemetry
    }

    /// Typed view of the socket's user context
    pub fn context<T: Any>(&self) -> Option<&T> {
        self.metadata.context()
    }

    pub fn context_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.metadata.context_mut()
    }

    /// Executor access for bag operations and stop requests
    pub fn executor(&mut self) -> &mut RequestControl<'a> {
        &mut self.control
    }

    pub fn stop_request(&mut self) -> SockResult<()> {
        self.control.stop_request()
    }

    // ---- payload ----

    /// Completed frame of a `READ` or `OOB` event
    pub fn frame(&self) -> Option<&DataFrame> {
        match &self.payload {
            EventPayload::Frame(frame) => Some(frame),
            _ => None,
        }
    }

    pub fn take_frame(&mut self) -> Option<DataFrame> {
        match std::mem::replace(&mut self.payload, EventPayload::None) {
            EventPayload::Frame(frame) => Some(frame),
            other => {
                self.payload = other;
                None
            }
        }
    }

    /// Peer address of an `ACCEPT`, or of the frame being delivered
    pub fn remote_address(&self) -> Option<&str> {
        match &self.payload {
            EventPayload::Accept { remote_address, .. } => Some(remote_address),
            EventPayload::Frame(frame) => frame.remote_address(),
            _ => None,
        }
    }

    /// Take ownership of the client accepted by a listening socket
    ///
    /// A client not taken by any handler is closed after dispatch.
    pub fn take_client(&mut self) -> Option<Box<dyn Socket>> {
        match &mut self.payload {
            EventPayload::Accept { client, .. } => client.take(),
            _ => None,
        }
    }

    /// Write about to start, for a `WRITE` event
    pub fn write_operation_mut(&mut self) -> Option<&mut WriteOperation> {
        match &mut self.payload {
            EventPayload::Write(op) => Some(op),
            _ => None,
        }
    }

    /// Replace the bytes of the write about to start
    pub fn set_write_data(&mut self, data: impl Into<Vec<u8>>) -> bool {
        match self.write_operation_mut() {
            Some(op) => {
                op.set_data(data);
                true
            }
            None => false,
        }
    }

    pub fn timeout_phase(&self) -> Option<TimeoutPhase> {
        match self.payload {
            EventPayload::Timeout(phase) => Some(phase),
            _ => None,
        }
    }

    /// Failure carried by an `EXCEPTION`
    pub fn error(&self) -> Option<&SockError> {
        match &self.payload {
            EventPayload::Exception(err) => Some(err),
            _ => None,
        }
    }

    /// `(attempt, max)` of a `DATA_ALERT`
    pub fn data_alert(&self) -> Option<(u32, u32)> {
        match self.payload {
            EventPayload::DataAlert { attempt, max } => Some((attempt, max)),
            _ => None,
        }
    }

    // ---- steering ----

    /// Operation to run after this event
    pub fn set_next_operation(&mut self, op: Operation) {
        self.next_operation = Some(op);
    }

    pub fn next_operation(&self) -> Option<&Operation> {
        self.next_operation.as_ref()
    }

    /// End the current operation; the socket is disconnected without an
    /// `EXCEPTION`
    pub fn cancel_operation(&mut self) {
        self.cancelled = true;
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Keep the socket after a `TIMEOUT`, restarting its deadline
    pub fn enable_one_more_attempt(&mut self) {
        self.one_more_attempt = true;
    }
}
