//! IO stage: runs the operation of every ready descriptor
//!
//! Per descriptor and cycle:
//!
//! 1. First usable cycle: finish the connect and fire `CONNECTED`.
//! 2. Out-of-band data pending: read it and fire `OOB`. An operation
//!    installed by that event replaces the current one and ends the cycle.
//! 3. Dispatch the operation to its handler and apply the `Progress`.
//!
//! Socket-level failures go to `EXCEPTION` and complete the descriptor;
//! the disconnect stage closes it later in the pass.

mod handshake;
mod null;
mod oob;
mod read;
mod read_write;
mod write;

use std::time::Instant;

use sockio_core::{EventKind, Readiness, SockResult, SocketId};

use crate::descriptor::RequestDescriptor;
use crate::event::EventPayload;
use crate::operation::{Operation, Progress};
use crate::pipeline::Pipeline;

/// Returns the descriptors that moved bytes or advanced their operation.
/// Everything else stays subject to the timeout stage.
pub(crate) fn io(p: &mut Pipeline, ids: &[SocketId]) -> SockResult<Vec<SocketId>> {
    let mut progressed = Vec::new();
    for &id in ids {
        if p.with_descriptor(id, process)? == Some(true) {
            progressed.push(id);
        }
    }
    Ok(progressed)
}

fn process(p: &mut Pipeline, desc: &mut RequestDescriptor) -> SockResult<bool> {
    // a handler earlier in this pass may have removed or parked it
    if !desc.is_active() {
        return Ok(false);
    }

    let moved = desc.telemetry.bytes_received + desc.telemetry.bytes_sent;
    match cycle(p, desc) {
        Ok(Progress::Pending(op)) => {
            desc.operation = op;
            Ok(desc.telemetry.bytes_received + desc.telemetry.bytes_sent != moved)
        }
        Ok(Progress::Next(op)) => {
            desc.operation = op;
            desc.telemetry.last_io_start = Some(Instant::now());
            Ok(true)
        }
        Ok(Progress::Done) => {
            desc.operation = Operation::Null;
            desc.mark_complete();
            Ok(true)
        }
        Err(e) => {
            desc.mark_complete();
            p.route_error(desc, e)?;
            Ok(true)
        }
    }
}

fn cycle(p: &mut Pipeline, desc: &mut RequestDescriptor) -> SockResult<Progress> {
    let readiness = desc.readiness;

    if desc.telemetry.connection_finish.is_none() {
        if !desc.socket.is_connected() && !readiness.is_writable() && !readiness.is_readable() {
            return Ok(Progress::Pending(std::mem::take(&mut desc.operation)));
        }
        desc.socket.finish_connect()?;
        let now = Instant::now();
        desc.telemetry.connection_finish = Some(now);
        desc.telemetry.last_io_start = Some(now);

        let dispatch = p.fire(desc, EventKind::Connected, EventPayload::None)?;
        if let Some(op) = dispatch.next_operation {
            desc.operation = op;
        }
    }

    if readiness.is_oob() {
        if let Some(op) = oob::oob(p, desc)? {
            return Ok(Progress::Next(op));
        }
    }

    let op = std::mem::take(&mut desc.operation);
    dispatch(p, desc, op, readiness)
}

/// Run one cycle of `op`
pub(crate) fn dispatch(
    p: &mut Pipeline,
    desc: &mut RequestDescriptor,
    op: Operation,
    readiness: Readiness,
) -> SockResult<Progress> {
    match op {
        Operation::Read(op) => read::read(p, desc, op, readiness),
        Operation::Write(op) => write::write(p, desc, op, readiness),
        Operation::InProgressWrite(op) => write::resume(desc, op, readiness),
        Operation::SslHandshake(op) => handshake::handshake(desc, op, readiness),
        Operation::ReadWrite(op) => read_write::read_write(p, desc, op, readiness),
        Operation::Null => null::null(p, desc, readiness),
        Operation::Delayed(op) => Ok(Progress::Pending(Operation::Delayed(op))),
    }
}

/// Account bytes moved in one direction and refresh the measured speed
pub(crate) fn account_received(desc: &mut RequestDescriptor, bytes: usize) -> SockResult<()> {
    desc.telemetry.bytes_received += bytes as u64;
    let since = desc.telemetry.connection_finish.unwrap_or_else(Instant::now);
    let limit = desc.metadata.min_receive_speed;
    if let Some(speed) = desc.receive_counter.record(bytes, since, limit)? {
        desc.telemetry.receive_speed = Some(speed);
    }
    Ok(())
}

pub(crate) fn account_sent(desc: &mut RequestDescriptor, bytes: usize) -> SockResult<()> {
    desc.telemetry.bytes_sent += bytes as u64;
    let since = desc.telemetry.connection_finish.unwrap_or_else(Instant::now);
    let limit = desc.metadata.min_send_speed;
    if let Some(speed) = desc.send_counter.record(bytes, since, limit)? {
        desc.telemetry.send_speed = Some(speed);
    }
    Ok(())
}
