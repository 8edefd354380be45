//! Timeout stage: connect and IO deadlines

use std::time::Instant;

use sockio_core::{kdebug, EventKind, SockResult, SocketId, TimeoutPhase};

use crate::config::ExecutorConfig;
use crate::descriptor::RequestDescriptor;
use crate::event::EventPayload;
use crate::pipeline::Pipeline;

/// Current deadline of a descriptor, if it has one
pub(crate) fn deadline(
    desc: &RequestDescriptor,
    config: &ExecutorConfig,
) -> Option<(TimeoutPhase, Instant)> {
    let (phase, started) = desc.deadline_phase();
    let limit = match phase {
        TimeoutPhase::DuringConnection => {
            desc.metadata.connect_timeout.resolve(config.connect_timeout)
        }
        TimeoutPhase::DuringIo => desc.metadata.io_timeout.resolve(config.io_timeout),
    }?;
    Some((phase, started? + limit))
}

/// Fire `TIMEOUT` for descriptors past their deadline
///
/// `ids` are the running descriptors that made no progress this pass,
/// including connectionless ones that were polled without a result.
pub(crate) fn timeout(p: &mut Pipeline, ids: &[SocketId]) -> SockResult<()> {
    let now = Instant::now();
    for &id in ids {
        let expired = p
            .bag
            .get(id)
            .filter(|d| d.running && d.is_active())
            .and_then(|d| deadline(d, &p.config))
            .filter(|(_, at)| now >= *at);

        if let Some((phase, _)) = expired {
            p.with_descriptor(id, |p, desc| expire(p, desc, phase))?;
        }
    }
    Ok(())
}

fn expire(p: &mut Pipeline, desc: &mut RequestDescriptor, phase: TimeoutPhase) -> SockResult<()> {
    kdebug!("timeout: {} expired {}", desc.id, phase);
    match p.fire(desc, EventKind::Timeout, EventPayload::Timeout(phase)) {
        Ok(dispatch) if dispatch.one_more_attempt => {
            match phase {
                TimeoutPhase::DuringConnection => {
                    // reopened by the connect stage on the next pass
                    desc.telemetry.connection_start = None;
                    desc.running = false;
                }
                TimeoutPhase::DuringIo => desc.telemetry.last_io_start = Some(Instant::now()),
            }
            if let Some(op) = dispatch.next_operation {
                desc.operation = op;
            }
            Ok(())
        }
        Ok(_) => {
            desc.mark_complete();
            Ok(())
        }
        Err(e) => {
            desc.mark_complete();
            p.route_error(desc, e)
        }
    }
}
