//! Guardian stage: force-closes sockets left without an operation

use std::time::Instant;

use sockio_core::{kwarn, EventKind, Selector, SockError, SockResult, SocketId};

use crate::descriptor::RequestDescriptor;
use crate::event::EventPayload;
use crate::pipeline::Pipeline;
use crate::stage::disconnect::disconnect;

/// Count passes spent at the null operation, alert below the ceiling and
/// disconnect at it
pub(crate) fn guardian(
    p: &mut Pipeline,
    selector: &mut dyn Selector,
    ids: &[SocketId],
) -> SockResult<()> {
    let max = p.config.guardian_max_attempts;

    for &id in ids {
        let Some(desc) = p.bag.get_mut(id) else {
            continue;
        };
        if !desc.running || !desc.is_active() {
            continue;
        }
        if !desc.operation.is_null() {
            desc.idle_passes = 0;
            continue;
        }
        desc.idle_passes += 1;
        let attempt = desc.idle_passes;

        p.with_descriptor(id, |p, desc| alert(p, &mut *selector, desc, attempt, max))?;
    }
    Ok(())
}

fn alert(
    p: &mut Pipeline,
    selector: &mut dyn Selector,
    desc: &mut RequestDescriptor,
    attempt: u32,
    max: u32,
) -> SockResult<()> {
    if attempt >= max {
        kwarn!("guardian: {} idle for {} passes, closing", desc.id, attempt);
        desc.mark_complete();
        let err = SockError::UnmanagedSocket {
            id: desc.id,
            attempts: attempt,
        };
        p.route_error(desc, err)?;
        return disconnect(p, selector, desc);
    }

    match p.fire(desc, EventKind::DataAlert, EventPayload::DataAlert { attempt, max }) {
        Ok(dispatch) => {
            if let Some(op) = dispatch.next_operation {
                desc.operation = op;
                desc.idle_passes = 0;
                desc.telemetry.last_io_start = Some(Instant::now());
            }
            Ok(())
        }
        Err(e) => {
            desc.mark_complete();
            p.route_error(desc, e)
        }
    }
}
