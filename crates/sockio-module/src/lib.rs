//! # sockio-module - Default implementations
//!
//! This crate provides the default implementation for every sockio trait.
//! Sockets are thin non-blocking wrappers over libc; the selector drives
//! `select(2)` through nix.
//!
//! ## Default stack
//!
//! | Trait             | Default Impl              | Alternatives                 |
//! |-------------------|---------------------------|------------------------------|
//! | Socket            | ClientSocket              | PersistentClientSocket, ServerSocket, AcceptedSocket, UdpClientSocket |
//! | Selector          | SelectSelector            |                              |
//! | LimitationSolver  | NoLimitationSolver        | ConstantLimitationSolver     |
//!
//! # Environment Variables
//!
//! - `SOCKIO_READ_BUFFER_SIZE` - bytes per `recv()` call (default 8192)
//! - `SOCKIO_LISTEN_BACKLOG` - listen backlog for server sockets (default 128)

pub mod address;
pub(crate) mod sys;
pub mod stream;
pub mod client;
pub mod persistent;
pub mod server;
pub mod udp;
pub mod select_selector;
pub mod const_solver;
pub mod no_solver;

pub use address::{parse_address, Scheme};
pub use client::ClientSocket;
pub use persistent::PersistentClientSocket;
pub use server::{AcceptedSocket, ServerSocket};
pub use udp::UdpClientSocket;
pub use select_selector::SelectSelector;
pub use const_solver::ConstantLimitationSolver;
pub use no_solver::NoLimitationSolver;

/// Default listen backlog
pub const DEFAULT_LISTEN_BACKLOG: i32 = 128;

/// Bytes per `recv()` call, `SOCKIO_READ_BUFFER_SIZE` overrides
pub fn read_buffer_size() -> usize {
    sockio_core::env_get(
        "SOCKIO_READ_BUFFER_SIZE",
        sockio_core::constants::DEFAULT_READ_BUFFER_SIZE,
    )
    .max(1)
}

/// Listen backlog, `SOCKIO_LISTEN_BACKLOG` overrides
pub fn listen_backlog() -> i32 {
    sockio_core::env_get("SOCKIO_LISTEN_BACKLOG", DEFAULT_LISTEN_BACKLOG).max(1)
}
