//! `NoLimitationSolver` - admits every socket.

use sockio_core::{Decision, LimitationSolver, SocketId};

#[derive(Debug, Default, Clone, Copy)]
pub struct NoLimitationSolver;

impl NoLimitationSolver {
    pub fn new() -> Self {
        Self
    }
}

impl LimitationSolver for NoLimitationSolver {
    fn initialize(&mut self) {}

    fn finalize(&mut self) {}

    fn decide(&mut self, _id: SocketId, _total_pending: usize) -> Decision {
        Decision::Ok
    }
}
