//! # sockio - Select-Driven Socket Requests
//!
//! Drives many non-blocking sockets from one thread. Each socket carries an
//! operation chain (write, read a frame, handshake, ...) and user handlers
//! react to events as the chain advances.
//!
//! ## Quick Start
//!
//! ```ignore
//! use sockio::{
//!     ClientSocket, EventKind, MarkerFramePicker, Operation, RequestExecutor,
//!     CallbackEventHandler, SocketMetadata,
//! };
//!
//! fn main() -> sockio::SockResult<()> {
//!     let handler = CallbackEventHandler::new().on(EventKind::Read, |e| {
//!         println!("{}", e.frame().map(|f| f.to_string_lossy()).unwrap_or_default());
//!         Ok(())
//!     });
//!
//!     let mut executor = RequestExecutor::default().with_event_handler(handler);
//!     executor.add_socket(
//!         Box::new(ClientSocket::new()),
//!         Operation::write("GET / HTTP/1.0\r\n\r\n")
//!             .then(Operation::read(MarkerFramePicker::until("\r\n\r\n"))),
//!         Some(SocketMetadata::new().address("tcp://127.0.0.1:80")),
//!         None,
//!     )?;
//!     executor.execute_request()
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      User Code                              │
//! │        add_socket(), event handlers, execute_request()      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   RequestExecutor                           │
//! │   connect → delay → select → io → timeout → guardian →      │
//! │   disconnect, once per pass                                 │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!          ┌───────────────────┼───────────────────┐
//!          ▼                   ▼                   ▼
//!    ┌───────────┐      ┌───────────┐      ┌─────────────┐
//!    │  Sockets  │      │ Selector  │      │  Limitation │
//!    │ tcp, udp  │      │ select(2) │      │   solver    │
//!    └───────────┘      └───────────┘      └─────────────┘
//! ```

// Re-export core types
pub use sockio_core::{
    AcceptedFrame,
    CryptoMethod,
    DataFrame,
    Decision,
    Direction,
    EmptyFramePicker,
    EventKind,
    FixedLengthFramePicker,
    Frame,
    FramePicker,
    HandshakeStatus,
    LimitationSolver,
    MarkerFramePicker,
    PartialFrame,
    PushbackIter,
    RawFramePicker,
    Readiness,
    SelectedSocket,
    Selector,
    SockError,
    SockResult,
    Socket,
    SocketId,
    SocketKind,
    SocketMetadata,
    SocketTelemetry,
    SpeedLimit,
    StreamContext,
    Timeout,
    TimeoutPhase,
    constants,
};

// Re-export kprint macros for debug logging
pub use sockio_core::{kprint, kprintln, kerror, kwarn, kinfo, kdebug, ktrace};
pub use sockio_core::kprint::{LogLevel, init as init_logging, set_log_level, set_flush_enabled};

// Re-export env utilities
pub use sockio_core::{env_get, env_get_bool, env_get_opt, env_get_str, env_is_set};

// Re-export default implementations
pub use sockio_module::{
    AcceptedSocket,
    ClientSocket,
    ConstantLimitationSolver,
    NoLimitationSolver,
    PersistentClientSocket,
    SelectSelector,
    ServerSocket,
    UdpClientSocket,
};

// Re-export the executor
pub use sockio_executor::{
    handler_fn,
    CallbackEventHandler,
    ConfigError,
    Event,
    EventHandler,
    EventMultiHandler,
    ExecutorConfig,
    Operation,
    Progress,
    RequestControl,
    RequestDescriptor,
    RequestExecutor,
    ReturnPolicy,
    SocketBag,
    WriteOperation,
};
