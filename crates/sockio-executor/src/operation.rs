//! Socket operations
//!
//! An `Operation` is what a descriptor wants to do next. The IO stage
//! matches on it exhaustively; handlers turn it into a `Progress` value
//! that says whether the same operation continues, a new one takes over,
//! or the socket is done.

use core::fmt;
use std::collections::VecDeque;

use sockio_core::{CryptoMethod, FramePicker, PushbackIter, Socket};

use crate::control::RequestControl;

/// Chunk source of a write
pub type ChunkIter = Box<dyn Iterator<Item = Vec<u8>>>;

/// Poll predicate of a delayed operation; `true` means still waiting
pub type DelayPredicate = Box<dyn FnMut(&mut dyn Socket, &mut RequestControl<'_>) -> bool>;

/// Pending work of one socket
#[derive(Default)]
pub enum Operation {
    Read(ReadOperation),
    Write(WriteOperation),
    SslHandshake(HandshakeOperation),
    ReadWrite(ReadWriteOperation),
    Delayed(DelayedOperation),
    /// No operation; the socket waits for the user to pick one
    #[default]
    Null,
    /// A write that did not drain in one cycle
    InProgressWrite(InProgressWrite),
}

impl Operation {
    /// Read one frame using `picker`
    pub fn read(picker: impl FramePicker + 'static) -> Self {
        Operation::Read(ReadOperation {
            picker: Box::new(picker),
            next: None,
        })
    }

    /// Write `data` in full
    pub fn write(data: impl Into<Vec<u8>>) -> Self {
        Operation::Write(WriteOperation::new(data))
    }

    /// Write every chunk the iterator yields
    pub fn write_chunks<I>(chunks: I) -> Self
    where
        I: IntoIterator<Item = Vec<u8>>,
        I::IntoIter: 'static,
    {
        Operation::Write(WriteOperation {
            source: WriteSource::Chunks(Box::new(chunks.into_iter())),
            next: None,
            out_of_band: false,
        })
    }

    /// Run the crypto handshake, then continue with `next`
    pub fn handshake(method: CryptoMethod, next: Operation) -> Self {
        Operation::SslHandshake(HandshakeOperation {
            method,
            next: Some(Box::new(next)),
        })
    }

    /// Composite of an optional read and an optional write
    pub fn read_write(read: Option<Operation>, write: Option<Operation>, read_first: bool) -> Self {
        Operation::ReadWrite(ReadWriteOperation {
            reads: read.into_iter().collect(),
            writes: write.into_iter().collect(),
            read_first,
        })
    }

    /// Hold `inner` back while `predicate` returns `true`
    pub fn delayed<F>(inner: Operation, predicate: F) -> Self
    where
        F: FnMut(&mut dyn Socket, &mut RequestControl<'_>) -> bool + 'static,
    {
        Operation::Delayed(DelayedOperation {
            inner: Box::new(inner),
            predicate: Box::new(predicate),
        })
    }

    /// Chain `next` after a read, write or handshake
    ///
    /// Other variants are returned unchanged.
    pub fn then(self, next: Operation) -> Self {
        match self {
            Operation::Read(mut op) => {
                op.next = Some(Box::new(next));
                Operation::Read(op)
            }
            Operation::Write(mut op) => {
                op.next = Some(Box::new(next));
                Operation::Write(op)
            }
            Operation::SslHandshake(mut op) => {
                op.next = Some(Box::new(next));
                Operation::SslHandshake(op)
            }
            Operation::InProgressWrite(mut op) => {
                op.next = Some(Box::new(next));
                Operation::InProgressWrite(op)
            }
            other => other,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Operation::Read(_) => "read",
            Operation::Write(_) => "write",
            Operation::SslHandshake(_) => "ssl_handshake",
            Operation::ReadWrite(_) => "read_write",
            Operation::Delayed(_) => "delayed",
            Operation::Null => "null",
            Operation::InProgressWrite(_) => "in_progress_write",
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Operation::Null)
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::ReadWrite(rw) => f
                .debug_struct("ReadWrite")
                .field("reads", &rw.reads.len())
                .field("writes", &rw.writes.len())
                .field("read_first", &rw.read_first)
                .finish(),
            Operation::SslHandshake(h) => f.debug_tuple("SslHandshake").field(&h.method).finish(),
            Operation::InProgressWrite(w) => f
                .debug_struct("InProgressWrite")
                .field("buffered", &w.buffer.buffered())
                .finish(),
            other => write!(f, "{}", other.kind()),
        }
    }
}

/// Frame read
pub struct ReadOperation {
    pub picker: Box<dyn FramePicker>,
    pub next: Option<Box<Operation>>,
}

/// Data handed to a write
pub enum WriteSource {
    Bytes(Vec<u8>),
    Chunks(ChunkIter),
}

impl WriteSource {
    pub(crate) fn into_chunks(self) -> ChunkIter {
        match self {
            WriteSource::Bytes(data) => Box::new(std::iter::once(data)),
            WriteSource::Chunks(chunks) => chunks,
        }
    }
}

/// Data write
pub struct WriteOperation {
    pub source: WriteSource,
    pub next: Option<Box<Operation>>,
    pub out_of_band: bool,
}

impl WriteOperation {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            source: WriteSource::Bytes(data.into()),
            next: None,
            out_of_band: false,
        }
    }

    /// Send as urgent data
    pub fn out_of_band(mut self, enable: bool) -> Self {
        self.out_of_band = enable;
        self
    }

    /// Replace the bytes to send
    pub fn set_data(&mut self, data: impl Into<Vec<u8>>) {
        self.source = WriteSource::Bytes(data.into());
    }

    /// Bytes still to send, when the source is a plain buffer
    pub fn data(&self) -> Option<&[u8]> {
        match &self.source {
            WriteSource::Bytes(data) => Some(data),
            WriteSource::Chunks(_) => None,
        }
    }
}

impl From<WriteOperation> for Operation {
    fn from(op: WriteOperation) -> Self {
        Operation::Write(op)
    }
}

/// Crypto handshake followed by `next`
pub struct HandshakeOperation {
    pub method: CryptoMethod,
    pub next: Option<Box<Operation>>,
}

/// Reads and writes progressing independently on one socket
pub struct ReadWriteOperation {
    pub reads: VecDeque<Operation>,
    pub writes: VecDeque<Operation>,
    pub read_first: bool,
}

impl ReadWriteOperation {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.reads.is_empty() && self.writes.is_empty()
    }
}

/// Operation gated by a poll predicate
pub struct DelayedOperation {
    pub inner: Box<Operation>,
    pub predicate: DelayPredicate,
}

/// Continuation of a partially drained write
pub struct InProgressWrite {
    pub(crate) buffer: PushbackIter<ChunkIter>,
    pub next: Option<Box<Operation>>,
    pub(crate) out_of_band: bool,
}

impl InProgressWrite {
    /// Bytes pulled from the source but not yet written
    pub fn buffered(&self) -> usize {
        self.buffer.buffered()
    }
}

/// Outcome of handling an operation for one cycle
#[derive(Debug)]
pub enum Progress {
    /// Not finished; keep the operation without touching the IO timer
    Pending(Operation),
    /// A new operation takes over; the IO timer restarts
    Next(Operation),
    /// Nothing left to do
    Done,
}

impl Progress {
    /// `Next` for a chained operation, `Done` otherwise
    pub(crate) fn from_next(next: Option<Box<Operation>>) -> Self {
        match next {
            Some(op) => Progress::Next(*op),
            None => Progress::Done,
        }
    }
}
