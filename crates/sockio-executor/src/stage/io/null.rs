//! Sockets without an operation

use sockio_core::{EventKind, Readiness, SockResult};

use crate::descriptor::RequestDescriptor;
use crate::event::EventPayload;
use crate::operation::{Operation, Progress};
use crate::pipeline::Pipeline;

/// Fire `DATA_ARRIVED` when data shows up, so a handler can pick a read
pub(super) fn null(
    p: &mut Pipeline,
    desc: &mut RequestDescriptor,
    readiness: Readiness,
) -> SockResult<Progress> {
    if readiness.is_readable() {
        let dispatch = p.fire(desc, EventKind::DataArrived, EventPayload::None)?;
        if let Some(next) = dispatch.next_operation {
            return Ok(Progress::Next(next));
        }
    }
    Ok(Progress::Pending(Operation::Null))
}
