//! # sockio-executor — The Request Loop
//!
//! `RequestExecutor` owns a bag of non-blocking sockets and drives them
//! through a fixed stage pipeline until every socket has finished its
//! operation chain:
//!
//! ```text
//! loop {
//!     0. Stop requested? disconnect everything left, return
//!     1. Connect    : admit waiting sockets (limitation solver), open transport
//!     2. Delay      : hold back operations whose predicate still waits
//!     3. Select     : wait for readiness, bounded by the nearest deadline
//!     4. IO         : CONNECTED once, OOB, then one cycle of the operation
//!     5. Timeout    : expire idle sockets past their connect/IO deadline
//!     6. Guardian   : alert on sockets parked at the null operation, close
//!                     them at the ceiling
//!     7. Disconnect : close completed sockets, DISCONNECTED + FINALIZE
//!     8. Nothing active left? return
//! }
//! ```
//!
//! User code reacts through `EventHandler`s, per socket or executor-wide.
//! Handlers pick the next operation, replace write data, cancel, grant a
//! retry after a timeout, touch the bag, or stop the request.
//!
//! Socket-level failures (network, handshake, slow transfer, unmanaged
//! socket) are reported as `EXCEPTION` and end that socket only. Any other
//! error aborts `execute_request`, closing every socket in the bag.

pub mod config;
pub mod operation;
mod speed;
pub mod descriptor;
pub mod bag;
pub mod control;
pub mod handler;
pub mod event;
mod caller;
mod pipeline;
pub(crate) mod stage;
pub mod executor;

#[cfg(test)]
mod testing;

pub use bag::SocketBag;
pub use config::{ConfigError, ExecutorConfig};
pub use control::RequestControl;
pub use descriptor::RequestDescriptor;
pub use event::Event;
pub use executor::RequestExecutor;
pub use handler::{handler_fn, CallbackEventHandler, EventHandler, EventMultiHandler};
pub use operation::{
    ChunkIter, DelayPredicate, DelayedOperation, HandshakeOperation, InProgressWrite, Operation,
    Progress, ReadOperation, ReadWriteOperation, WriteOperation, WriteSource,
};
pub use stage::ReturnPolicy;
