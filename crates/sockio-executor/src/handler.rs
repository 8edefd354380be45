//! Event handlers
//!
//! # Implementors
//!
//! - closures `FnMut(&mut Event<'_>) -> SockResult<()>` (wrap with
//!   `handler_fn` when the closure type can't be inferred)
//! - `CallbackEventHandler`: one callback per event kind
//! - `EventMultiHandler`: runs several handlers in order
//!
//! **Contract:**
//! - Returning a socket-level error routes it to `EXCEPTION` for the
//!   socket being dispatched; any other error aborts the request.
//! - `Event::cancel_operation` ends the current operation without an
//!   `EXCEPTION`.

use std::collections::HashMap;

use sockio_core::{EventKind, SockResult};

use crate::event::Event;

pub trait EventHandler {
    fn handle(&mut self, event: &mut Event<'_>) -> SockResult<()>;
}

impl<F> EventHandler for F
where
    F: FnMut(&mut Event<'_>) -> SockResult<()>,
{
    fn handle(&mut self, event: &mut Event<'_>) -> SockResult<()> {
        self(event)
    }
}

/// Pin a closure to the handler signature
pub fn handler_fn<F>(f: F) -> F
where
    F: FnMut(&mut Event<'_>) -> SockResult<()>,
{
    f
}

type Callback = Box<dyn FnMut(&mut Event<'_>) -> SockResult<()>>;

/// Dispatches each event kind to its own callback
#[derive(Default)]
pub struct CallbackEventHandler {
    callbacks: HashMap<EventKind, Vec<Callback>>,
}

impl CallbackEventHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `f` to `kind`; several callbacks run in subscription order
    pub fn on<F>(mut self, kind: EventKind, f: F) -> Self
    where
        F: FnMut(&mut Event<'_>) -> SockResult<()> + 'static,
    {
        self.callbacks.entry(kind).or_default().push(Box::new(f));
        self
    }

    pub fn has_subscribers(&self, kind: EventKind) -> bool {
        self.callbacks.get(&kind).is_some_and(|v| !v.is_empty())
    }
}

impl EventHandler for CallbackEventHandler {
    fn handle(&mut self, event: &mut Event<'_>) -> SockResult<()> {
        if let Some(callbacks) = self.callbacks.get_mut(&event.kind()) {
            for cb in callbacks.iter_mut() {
                cb(event)?;
            }
        }
        Ok(())
    }
}

/// Runs several handlers, stopping at the first error
#[derive(Default)]
pub struct EventMultiHandler {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl EventMultiHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl EventHandler for EventMultiHandler {
    fn handle(&mut self, event: &mut Event<'_>) -> SockResult<()> {
        for handler in self.handlers.iter_mut() {
            handler.handle(event)?;
        }
        Ok(())
    }
}
