//! Executor access from inside event handlers
//!
//! `RequestControl` is the slice of the executor an event handler may
//! touch while its own descriptor is checked out: the socket bag and the
//! stop flag.

use sockio_core::{Socket, SockError, SockResult, SocketId, SocketMetadata, SocketTelemetry};

use crate::bag::SocketBag;
use crate::handler::EventHandler;
use crate::operation::Operation;

/// Flags of the running request
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ExecutionState {
    pub stop_requested: bool,
}

pub struct RequestControl<'a> {
    bag: &'a mut SocketBag,
    state: &'a mut ExecutionState,
}

impl<'a> RequestControl<'a> {
    pub(crate) fn new(bag: &'a mut SocketBag, state: &'a mut ExecutionState) -> Self {
        Self { bag, state }
    }

    /// Register another socket; it joins the current request
    pub fn add_socket(
        &mut self,
        socket: Box<dyn Socket>,
        operation: Operation,
        metadata: Option<SocketMetadata>,
        handler: Option<Box<dyn EventHandler>>,
    ) -> SockResult<SocketId> {
        self.bag.add_socket(socket, operation, metadata, handler)
    }

    pub fn remove_socket(&mut self, id: SocketId) -> SockResult<()> {
        self.bag.remove_socket(id)
    }

    pub fn has_socket(&self, id: SocketId) -> bool {
        self.bag.has_socket(id)
    }

    pub fn postpone_socket(&mut self, id: SocketId) -> SockResult<()> {
        self.bag.postpone_socket(id)
    }

    pub fn socket_metadata(&self, id: SocketId) -> SockResult<&SocketMetadata> {
        self.bag.socket_metadata(id)
    }

    pub fn socket_metadata_mut(&mut self, id: SocketId) -> SockResult<&mut SocketMetadata> {
        self.bag.socket_metadata_mut(id)
    }

    pub fn socket_operation(&self, id: SocketId) -> SockResult<&Operation> {
        self.bag.socket_operation(id)
    }

    pub fn set_socket_operation(&mut self, id: SocketId, operation: Operation) -> SockResult<()> {
        self.bag.set_socket_operation(id, operation)
    }

    pub fn socket_telemetry(&self, id: SocketId) -> SockResult<&SocketTelemetry> {
        self.bag.socket_telemetry(id)
    }

    /// Ask the executor to wind the request down after this pass
    pub fn stop_request(&mut self) -> SockResult<()> {
        if !self.bag.is_executing() {
            return Err(SockError::NotExecuting);
        }
        self.state.stop_requested = true;
        Ok(())
    }

    pub fn is_stop_requested(&self) -> bool {
        self.state.stop_requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockSocket;

    #[test]
    fn test_stop_outside_execution() {
        let mut bag = SocketBag::new();
        let mut state = ExecutionState::default();
        let mut control = RequestControl::new(&mut bag, &mut state);
        assert_eq!(control.stop_request().unwrap_err(), SockError::NotExecuting);
        assert!(!control.is_stop_requested());
    }

    #[test]
    fn test_stop_and_add_during_execution() {
        let mut bag = SocketBag::new();
        bag.set_executing(true);
        let mut state = ExecutionState::default();
        {
            let mut control = RequestControl::new(&mut bag, &mut state);
            let id = control
                .add_socket(Box::new(MockSocket::new()), Operation::Null, None, None)
                .unwrap();
            assert!(control.has_socket(id));
            control.stop_request().unwrap();
        }
        assert!(state.stop_requested);
        assert_eq!(bag.len(), 1);
    }
}
