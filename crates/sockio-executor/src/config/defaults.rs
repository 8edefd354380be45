//! Compile-time defaults for `ExecutorConfig`

/// Connect deadline for sockets using `Timeout::Default`
pub const CONNECT_TIMEOUT_MS: u64 = 30_000;

/// IO deadline for sockets using `Timeout::Default`
pub const IO_TIMEOUT_MS: u64 = 60_000;

/// Passes a socket may idle at the null operation
pub const GUARDIAN_MAX_ATTEMPTS: u32 = sockio_core::constants::MAX_ATTEMPTS_PER_SOCKET;

/// Largest slice offered to a single `write()`
pub const WRITE_CHUNK_SIZE: usize = sockio_core::constants::DEFAULT_WRITE_CHUNK_SIZE;

/// Selector wait cap while a delayed operation is polling
pub const DELAY_POLL_MS: u64 = 10;
