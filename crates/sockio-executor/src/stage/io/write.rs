//! Chunked writes
//!
//! The first cycle fires `WRITE`, letting handlers replace the data or
//! chain an operation. Data then drains through a `PushbackIter`: a short
//! write pushes the unwritten tail back and the rest continues as an
//! `InProgressWrite` on the next writable cycle, without another event.

use sockio_core::{EventKind, PushbackIter, Readiness, SockError, SockResult};

use super::account_sent;
use crate::descriptor::RequestDescriptor;
use crate::event::EventPayload;
use crate::operation::{InProgressWrite, Operation, Progress, WriteOperation};
use crate::pipeline::Pipeline;

pub(super) fn write(
    p: &mut Pipeline,
    desc: &mut RequestDescriptor,
    op: WriteOperation,
    readiness: Readiness,
) -> SockResult<Progress> {
    if !readiness.is_writable() {
        return Ok(Progress::Pending(Operation::Write(op)));
    }

    let dispatch = p.fire(desc, EventKind::Write, EventPayload::Write(op))?;
    let EventPayload::Write(mut op) = dispatch.payload else {
        return Err(SockError::InvalidOperation("write payload replaced during WRITE"));
    };
    if let Some(next) = dispatch.next_operation {
        op.next = Some(Box::new(next));
    }

    let pending = InProgressWrite {
        buffer: PushbackIter::new(op.source.into_chunks(), p.config.write_chunk_size),
        next: op.next,
        out_of_band: op.out_of_band,
    };
    drain(desc, pending)
}

pub(super) fn resume(
    desc: &mut RequestDescriptor,
    op: InProgressWrite,
    readiness: Readiness,
) -> SockResult<Progress> {
    if !readiness.is_writable() {
        return Ok(Progress::Pending(Operation::InProgressWrite(op)));
    }
    drain(desc, op)
}

fn drain(desc: &mut RequestDescriptor, mut op: InProgressWrite) -> SockResult<Progress> {
    let mut total = 0;
    while let Some(chunk) = op.buffer.next_chunk() {
        let written = desc.socket.write(&chunk, op.out_of_band)?;
        if written > 0 {
            account_sent(desc, written)?;
            total += written;
        }
        if written < chunk.len() {
            op.buffer.unread(chunk.len() - written);
            let op = Operation::InProgressWrite(op);
            return Ok(if total > 0 {
                Progress::Next(op)
            } else {
                Progress::Pending(op)
            });
        }
    }
    Ok(Progress::from_next(op.next))
}
