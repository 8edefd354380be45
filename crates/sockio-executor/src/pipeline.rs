//! State shared by the stages of one executor

use sockio_core::{kdebug, ktrace, kwarn, EventKind, SockError, SockResult, SocketId};

use crate::bag::SocketBag;
use crate::caller::{Dispatch, EventCaller};
use crate::config::ExecutorConfig;
use crate::control::ExecutionState;
use crate::descriptor::RequestDescriptor;
use crate::event::EventPayload;

pub(crate) struct Pipeline {
    pub bag: SocketBag,
    pub state: ExecutionState,
    pub caller: EventCaller,
    pub config: ExecutorConfig,
    /// A delayed operation kept waiting in the current pass
    pub delayed_waiting: bool,
}

impl Pipeline {
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            bag: SocketBag::new(),
            state: ExecutionState::default(),
            caller: EventCaller::new(),
            config,
            delayed_waiting: false,
        }
    }

    /// Dispatch `kind` for a checked-out descriptor
    pub fn fire(
        &mut self,
        desc: &mut RequestDescriptor,
        kind: EventKind,
        payload: EventPayload,
    ) -> SockResult<Dispatch> {
        self.caller
            .call(desc, &mut self.bag, &mut self.state, kind, payload)
    }

    /// Route a failure raised while handling `desc`
    ///
    /// Cancels are swallowed and socket-level errors go to `EXCEPTION`.
    /// Anything else is returned and aborts the request.
    pub fn route_error(&mut self, desc: &mut RequestDescriptor, err: SockError) -> SockResult<()> {
        if err.is_cancel() {
            ktrace!("{}: operation cancelled", desc.id);
            return Ok(());
        }
        if !err.is_socket_level() {
            return Err(err);
        }

        kdebug!("{}: {}", desc.id, err);
        match self.fire(desc, EventKind::Exception, EventPayload::Exception(err)) {
            Ok(_) => Ok(()),
            Err(e) if e.is_cancel() || e.is_socket_level() => {
                kwarn!("{}: EXCEPTION handler failed: {}", desc.id, e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Run `f` with the descriptor checked out; `None` if it is not resident
    pub fn with_descriptor<T, F>(&mut self, id: SocketId, f: F) -> SockResult<Option<T>>
    where
        F: FnOnce(&mut Pipeline, &mut RequestDescriptor) -> SockResult<T>,
    {
        let Some(mut desc) = self.bag.checkout(id) else {
            return Ok(None);
        };
        let result = f(self, &mut desc);
        self.bag.checkin(desc);
        result.map(Some)
    }
}
