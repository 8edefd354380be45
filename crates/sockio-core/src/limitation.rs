//! Backpressure policy
//!
//! The connect stage consults a `LimitationSolver` before opening each
//! socket that is not running yet. The solver also observes every event
//! before user handlers see it, which is how counting solvers track how
//! many sockets are active.
//!
//! # Implementors
//!
//! - `NoLimitationSolver` (default): admits everything.
//! - `ConstantLimitationSolver`: at most N active sockets.

use crate::event::EventKind;
use crate::id::SocketId;

/// Per-call admission verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Open the socket now
    Ok,
    /// Stop admitting sockets for the rest of this pass
    DeferToScheduled,
    /// Leave this socket for a later pass, keep asking about the others
    SkipCurrent,
}

/// Admission policy for new connections
///
/// **Contract:** called from the executing thread only; `decide()` must
/// not block.
pub trait LimitationSolver {
    /// Called once before the stage loop of each request
    fn initialize(&mut self);

    /// Called once after the stage loop, also on the fatal path
    fn finalize(&mut self);

    /// Verdict for `id`; `total_pending` counts sockets not running yet
    fn decide(&mut self, id: SocketId, total_pending: usize) -> Decision;

    /// Observe an event before handlers run
    fn on_event(&mut self, _kind: EventKind, _id: SocketId) {}
}

impl<L: LimitationSolver + ?Sized> LimitationSolver for Box<L> {
    fn initialize(&mut self) {
        (**self).initialize()
    }

    fn finalize(&mut self) {
        (**self).finalize()
    }

    fn decide(&mut self, id: SocketId, total_pending: usize) -> Decision {
        (**self).decide(id, total_pending)
    }

    fn on_event(&mut self, kind: EventKind, id: SocketId) {
        (**self).on_event(kind, id)
    }
}
