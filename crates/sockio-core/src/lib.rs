//! # sockio-core
//!
//! Core types and traits for the sockio request-execution engine.
//!
//! This crate is platform-agnostic and performs no I/O of its own.
//! Socket, selector and limitation-solver implementations live in
//! `sockio-module`; the stage pipeline lives in `sockio-executor`.
//!
//! ## Modules
//!
//! - `id` - Socket identifier handed out by the socket bag
//! - `error` - Error taxonomy shared by every crate
//! - `kprint` - Kernel-style leveled logging macros
//! - `env` - Environment variable utilities
//! - `frame` - Completed, partial and accepted frames
//! - `picker` - Frame picker strategies (raw, fixed-length, marker, empty)
//! - `buffer` - Pushback chunk iterator used by the write path
//! - `socket` - The `Socket` capability trait
//! - `selector` - Readiness bitmask and the `Selector` trait
//! - `limitation` - Backpressure decision and the `LimitationSolver` trait
//! - `metadata` - Typed per-socket configuration and telemetry
//! - `event` - Event kinds and timeout phases

pub mod id;
pub mod error;
pub mod kprint;
pub mod env;
pub mod frame;
pub mod picker;
pub mod buffer;
pub mod socket;
pub mod selector;
pub mod limitation;
pub mod metadata;
pub mod event;

// Re-exports for convenience
pub use id::SocketId;
pub use error::{Direction, SockError, SockResult};
pub use frame::{AcceptedFrame, DataFrame, Frame, PartialFrame};
pub use picker::{EmptyFramePicker, FixedLengthFramePicker, FramePicker, MarkerFramePicker, RawFramePicker};
pub use buffer::PushbackIter;
pub use socket::{CryptoMethod, HandshakeStatus, Socket, SocketKind, StreamContext};
pub use selector::{Readiness, SelectedSocket, Selector};
pub use limitation::{Decision, LimitationSolver};
pub use metadata::{SocketMetadata, SocketTelemetry, SpeedLimit, Timeout};
pub use event::{EventKind, TimeoutPhase};
pub use env::{env_get, env_get_bool, env_get_opt, env_get_str, env_is_set};

/// Engine-wide constants
pub mod constants {
    /// Passes a running socket may sit at the null operation before the
    /// guardian stage treats it as leaked
    pub const MAX_ATTEMPTS_PER_SOCKET: u32 = 25;

    /// Default transport chunk size offered to `write()` per call
    pub const DEFAULT_WRITE_CHUNK_SIZE: usize = 8192;

    /// Default size of a single `recv()` call
    pub const DEFAULT_READ_BUFFER_SIZE: usize = 8192;
}
