//! Frame reads and accepted connections

use sockio_core::{DataFrame, EventKind, Frame, FramePicker, Readiness, SockResult};

use super::account_received;
use crate::descriptor::RequestDescriptor;
use crate::event::EventPayload;
use crate::operation::{Operation, Progress, ReadOperation};
use crate::pipeline::Pipeline;

/// Counts the bytes a picker takes from the socket
struct CountingPicker<'p> {
    inner: &'p mut dyn FramePicker,
    consumed: usize,
}

impl FramePicker for CountingPicker<'_> {
    fn push_data(&mut self, chunk: &[u8], remote_address: Option<&str>) -> usize {
        let used = self.inner.push_data(chunk, remote_address);
        self.consumed += used;
        used
    }

    fn is_eof(&self) -> bool {
        self.inner.is_eof()
    }

    fn buffered(&self) -> usize {
        self.inner.buffered()
    }

    fn create_frame(&mut self) -> DataFrame {
        self.inner.create_frame()
    }
}

pub(super) fn read(
    p: &mut Pipeline,
    desc: &mut RequestDescriptor,
    mut op: ReadOperation,
    readiness: Readiness,
) -> SockResult<Progress> {
    if !readiness.is_readable() {
        return Ok(Progress::Pending(Operation::Read(op)));
    }

    let mut picker = CountingPicker {
        inner: &mut *op.picker,
        consumed: 0,
    };
    let frame = desc.socket.read(&mut picker, false)?;
    let consumed = picker.consumed;
    if consumed > 0 {
        account_received(desc, consumed)?;
    }

    match frame {
        Frame::Partial(_) => Ok(Progress::Pending(Operation::Read(op))),
        Frame::Accepted(accepted) => {
            let (remote_address, client) = accepted.into_parts();
            let payload = EventPayload::Accept {
                remote_address,
                client: Some(client),
            };
            let dispatch = p.fire(desc, EventKind::Accept, payload)?;
            // keep listening; an accept counts as activity
            Ok(Progress::Next(
                dispatch.next_operation.unwrap_or(Operation::Read(op)),
            ))
        }
        Frame::Data(frame) => {
            let dispatch = p.fire(desc, EventKind::Read, EventPayload::Frame(frame))?;
            Ok(match dispatch.next_operation {
                Some(next) => Progress::Next(next),
                None => Progress::from_next(op.next),
            })
        }
    }
}
