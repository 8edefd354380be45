//! Pipeline stages
//!
//! One executor pass runs the stages in this order:
//!
//! ```text
//!   connect ──► delay ──► select ──► io ──► timeout ──► guardian ──► disconnect
//!   (admit,     (poll      (wait for   (run     (expire     (idle      (close and
//!    open)       delayed)   readiness)  ops)     deadlines)  sockets)   finalize)
//! ```
//!
//! Each stage takes the ids handed over by the previous one. Stages check
//! a descriptor out of the bag while they fire events for it.

pub(crate) mod connect;
pub(crate) mod delay;
pub(crate) mod disconnect;
pub(crate) mod guardian;
pub(crate) mod io;
pub(crate) mod select;
pub(crate) mod timeout;

pub use connect::ReturnPolicy;
