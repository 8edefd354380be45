//! `ConstantLimitationSolver` - at most N sockets active at once.
//!
//! Counts `INITIALIZE` (admitted) and `FINALIZE` (left the pipeline) events
//! it observes ahead of the handlers. Once the active count reaches the
//! limit, the connect stage is told to stop admitting for this pass.

use sockio_core::{kdebug, Decision, EventKind, LimitationSolver, SocketId};

#[derive(Debug, Clone)]
pub struct ConstantLimitationSolver {
    limit: usize,
    active: usize,
}

impl ConstantLimitationSolver {
    /// A zero limit is treated as one
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            active: 0,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Sockets admitted and not yet finalized
    pub fn active(&self) -> usize {
        self.active
    }
}

impl LimitationSolver for ConstantLimitationSolver {
    fn initialize(&mut self) {
        self.active = 0;
    }

    fn finalize(&mut self) {
        if self.active != 0 {
            kdebug!("solver finalized with {} sockets still counted", self.active);
        }
        self.active = 0;
    }

    fn decide(&mut self, _id: SocketId, _total_pending: usize) -> Decision {
        if self.active >= self.limit {
            Decision::DeferToScheduled
        } else {
            Decision::Ok
        }
    }

    fn on_event(&mut self, kind: EventKind, _id: SocketId) {
        match kind {
            EventKind::Initialize => self.active += 1,
            EventKind::Finalize => self.active = self.active.saturating_sub(1),
            _ => {}
        }
    }
}
