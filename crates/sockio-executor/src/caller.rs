//! Event dispatch
//!
//! Order for every event: the limitation solver observes it, then the
//! socket's own handler runs, then the executor-wide handler. Once a stop
//! has been requested only lifecycle events (`DISCONNECTED`, `FINALIZE`,
//! `EXCEPTION`) still reach handlers; anything else ends as an operation
//! cancel.

use sockio_core::{ktrace, EventKind, LimitationSolver, SockError, SockResult};
use sockio_module::NoLimitationSolver;

use crate::bag::SocketBag;
use crate::control::{ExecutionState, RequestControl};
use crate::descriptor::RequestDescriptor;
use crate::event::{Event, EventPayload};
use crate::handler::EventHandler;
use crate::operation::Operation;

/// What handlers left behind after an event
pub(crate) struct Dispatch {
    pub next_operation: Option<Operation>,
    pub one_more_attempt: bool,
    pub payload: EventPayload,
}

pub(crate) struct EventCaller {
    pub solver: Box<dyn LimitationSolver>,
    pub handler: Option<Box<dyn EventHandler>>,
}

impl EventCaller {
    pub fn new() -> Self {
        Self {
            solver: Box::new(NoLimitationSolver::new()),
            handler: None,
        }
    }

    pub fn call(
        &mut self,
        desc: &mut RequestDescriptor,
        bag: &mut SocketBag,
        state: &mut ExecutionState,
        kind: EventKind,
        payload: EventPayload,
    ) -> SockResult<Dispatch> {
        self.solver.on_event(kind, desc.id);

        if state.stop_requested && !kind.is_lifecycle() {
            ktrace!("{}: {} suppressed, stop requested", desc.id, kind);
            return Err(SockError::Cancelled);
        }
        ktrace!("{}: {}", desc.id, kind);

        let mut own = desc.handler.take();
        let mut event = Event::new(
            kind,
            desc.id,
            &mut *desc.socket,
            &mut desc.metadata,
            &desc.telemetry,
            payload,
            RequestControl::new(bag, state),
        );

        let mut result = match own.as_mut() {
            Some(handler) => handler.handle(&mut event),
            None => Ok(()),
        };
        if result.is_ok() {
            if let Some(handler) = self.handler.as_mut() {
                result = handler.handle(&mut event);
            }
        }

        let cancelled = event.cancelled;
        let dispatch = Dispatch {
            next_operation: event.next_operation.take(),
            one_more_attempt: event.one_more_attempt,
            payload: std::mem::replace(&mut event.payload, EventPayload::None),
        };
        drop(event);
        desc.handler = own;

        result?;
        if cancelled {
            return Err(SockError::Cancelled);
        }
        Ok(dispatch)
    }
}
