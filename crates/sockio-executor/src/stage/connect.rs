//! Connect stage: admission and transport open

use std::time::Instant;

use sockio_core::{kdebug, Decision, EventKind, SockResult, SocketId};

use crate::bag::SocketBag;
use crate::descriptor::RequestDescriptor;
use crate::event::EventPayload;
use crate::pipeline::Pipeline;

/// Which descriptors the connect stage hands to the next stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnPolicy {
    /// Every running descriptor with work left
    #[default]
    AllRunning,
    /// Only descriptors admitted in this pass
    NewlyAdmitted,
}

/// Admit descriptors that are not running yet and open their transport
///
/// The solver is asked once per descriptor and request; a connect retry
/// after a timeout reopens without asking again.
pub(crate) fn connect(
    p: &mut Pipeline,
    candidates: &[SocketId],
    policy: ReturnPolicy,
) -> SockResult<Vec<SocketId>> {
    let mut total_pending = candidates.iter().filter(|id| waiting(&p.bag, **id)).count();
    let mut admitted = Vec::new();

    for &id in candidates {
        let initialized = match p.bag.get(id) {
            Some(d) if waiting(&p.bag, id) => d.initialized,
            _ => continue,
        };

        if !initialized {
            match p.caller.solver.decide(id, total_pending) {
                Decision::Ok => {}
                Decision::SkipCurrent => continue,
                Decision::DeferToScheduled => {
                    kdebug!("connect: admission deferred at {}", id);
                    break;
                }
            }
        }
        total_pending = total_pending.saturating_sub(1);

        p.with_descriptor(id, admit)?;
        admitted.push(id);
    }

    let next = match policy {
        ReturnPolicy::AllRunning => p
            .bag
            .descriptors()
            .filter(|d| d.running && d.is_active())
            .map(|d| d.id)
            .collect(),
        ReturnPolicy::NewlyAdmitted => admitted
            .into_iter()
            .filter(|id| p.bag.get(*id).is_some_and(|d| d.running && d.is_active()))
            .collect(),
    };
    Ok(next)
}

fn waiting(bag: &SocketBag, id: SocketId) -> bool {
    bag.get(id).is_some_and(|d| !d.running && d.is_active())
}

fn admit(p: &mut Pipeline, desc: &mut RequestDescriptor) -> SockResult<()> {
    if !desc.initialized {
        desc.initialized = true;
        match p.fire(desc, EventKind::Initialize, EventPayload::None) {
            Ok(dispatch) => {
                if let Some(op) = dispatch.next_operation {
                    desc.operation = op;
                }
            }
            Err(e) => {
                desc.mark_complete();
                return p.route_error(desc, e);
            }
        }
    }

    desc.telemetry.connection_start = Some(Instant::now());
    desc.running = true;

    let address = desc.metadata.address.clone().unwrap_or_default();
    kdebug!("connect: opening {} to '{}'", desc.id, address);
    if let Err(e) = desc.socket.open(&address, &desc.metadata.stream_context) {
        desc.mark_complete();
        return p.route_error(desc, e);
    }
    Ok(())
}
