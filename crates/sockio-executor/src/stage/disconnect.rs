//! Disconnect stage: close and finalize

use sockio_core::{kdebug, EventKind, Selector, SockResult, SocketId};

use crate::descriptor::RequestDescriptor;
use crate::event::EventPayload;
use crate::pipeline::Pipeline;

/// Close (unless kept alive) and finalize a descriptor; idempotent
///
/// `DISCONNECTED` fires only after a finished connect, `FINALIZE` always.
pub(crate) fn disconnect(
    p: &mut Pipeline,
    selector: &mut dyn Selector,
    desc: &mut RequestDescriptor,
) -> SockResult<()> {
    if desc.finalized {
        return Ok(());
    }
    desc.finalized = true;
    desc.mark_complete();

    let keep = desc.is_keep_alive() && (desc.forgotten || desc.socket.is_live());
    if keep {
        kdebug!("disconnect: {} kept alive", desc.id);
    } else {
        kdebug!("disconnect: closing {}", desc.id);
        if let Err(e) = desc.socket.close() {
            p.route_error(desc, e)?;
        }
        if desc.telemetry.connection_finish.is_some() {
            lifecycle(p, desc, EventKind::Disconnected)?;
        }
    }

    lifecycle(p, desc, EventKind::Finalize)?;
    selector.remove_interest(desc.id);
    Ok(())
}

fn lifecycle(p: &mut Pipeline, desc: &mut RequestDescriptor, kind: EventKind) -> SockResult<()> {
    match p.fire(desc, kind, EventPayload::None) {
        Ok(_) => Ok(()),
        Err(e) => p.route_error(desc, e),
    }
}

/// Disconnect every descriptor that finished or was forgotten
///
/// Descriptors that never got `INITIALIZE` are settled without events.
pub(crate) fn settle(p: &mut Pipeline, selector: &mut dyn Selector) -> SockResult<()> {
    let done: Vec<SocketId> = p
        .bag
        .descriptors()
        .filter(|d| !d.finalized && (d.is_complete() || d.forgotten))
        .map(|d| d.id)
        .collect();

    for id in done {
        let Some(desc) = p.bag.get_mut(id) else {
            continue;
        };
        if !desc.initialized {
            desc.finalized = true;
            selector.remove_interest(id);
            continue;
        }
        p.with_descriptor(id, |p, desc| disconnect(p, &mut *selector, desc))?;
    }
    Ok(())
}
