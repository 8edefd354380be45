//! Out-of-band layer

use sockio_core::{EventKind, Frame, RawFramePicker, SockResult};

use super::account_received;
use crate::descriptor::RequestDescriptor;
use crate::event::EventPayload;
use crate::operation::Operation;
use crate::pipeline::Pipeline;

/// Read pending urgent data and fire `OOB`; returns the operation a
/// handler installed
pub(super) fn oob(p: &mut Pipeline, desc: &mut RequestDescriptor) -> SockResult<Option<Operation>> {
    let mut picker = RawFramePicker::new();
    let frame = match desc.socket.read(&mut picker, true)? {
        Frame::Data(frame) if !frame.is_empty() => frame,
        _ => return Ok(None),
    };
    account_received(desc, frame.len())?;

    let dispatch = p.fire(desc, EventKind::Oob, EventPayload::Frame(frame))?;
    Ok(dispatch.next_operation)
}
