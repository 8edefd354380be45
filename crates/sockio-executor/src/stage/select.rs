//! Select stage: waits for readiness
//!
//! The wait is bounded by the nearest connect or IO deadline so the
//! timeout stage runs on time. Connectionless sockets skip the selector
//! and are treated as ready for whatever their operation needs. A stream
//! socket holding bytes past its last frame is readable without a wait.

use std::time::{Duration, Instant};

use sockio_core::{ktrace, Readiness, SelectedSocket, Selector, SockError, SockResult, SocketId};

use crate::descriptor::RequestDescriptor;
use crate::operation::Operation;
use crate::pipeline::Pipeline;
use crate::stage::timeout::deadline;

/// Readiness the current operation waits for
pub(crate) fn interest(desc: &RequestDescriptor) -> Readiness {
    let socket = &desc.socket;
    let mut interest = match &desc.operation {
        Operation::Read(_) => Readiness::READ,
        Operation::Write(_) | Operation::InProgressWrite(_) => Readiness::WRITE,
        Operation::ReadWrite(rw) => {
            let mut r = Readiness::NONE;
            if !rw.reads.is_empty() {
                r |= Readiness::READ;
            }
            if !rw.writes.is_empty() {
                r |= Readiness::WRITE;
            }
            r
        }
        Operation::SslHandshake(_) => Readiness::READ | Readiness::WRITE,
        Operation::Null if socket.is_connected() => Readiness::READ,
        Operation::Null | Operation::Delayed(_) => Readiness::NONE,
    };

    if !socket.is_connectionless() {
        if !socket.is_connected() {
            // connect completion is reported as writability
            interest |= Readiness::WRITE;
        } else if socket.kind().is_stream() && !interest.is_empty() {
            interest |= Readiness::OOB;
        }
    }
    interest
}

pub(crate) fn select(
    p: &mut Pipeline,
    selector: &mut dyn Selector,
    ids: &[SocketId],
) -> SockResult<Vec<SocketId>> {
    selector.clear_interests();

    let now = Instant::now();
    let mut ready = Vec::new();
    let mut wait: Option<Duration> = None;
    let mut registered = false;
    let mut refused = Vec::new();

    for &id in ids {
        let Some(desc) = p.bag.get_mut(id) else {
            continue;
        };
        desc.readiness = Readiness::NONE;
        let wanted = interest(desc);
        if wanted.is_empty() {
            continue;
        }

        let handle = desc.socket.raw_handle();
        match handle {
            Some(fd) if !desc.socket.is_connectionless() => {
                if let Err(e) = selector.add_interest(id, fd, wanted) {
                    refused.push((id, e));
                    continue;
                }
                registered = true;
                if let Some((_, at)) = deadline(desc, &p.config) {
                    let left = at.saturating_duration_since(now);
                    wait = Some(wait.map_or(left, |w| w.min(left)));
                }
                if wanted.is_readable() && desc.socket.has_buffered_data() {
                    ktrace!("select: {} has buffered bytes", id);
                    desc.readiness = Readiness::READ;
                    ready.push(id);
                }
            }
            _ => {
                // connectionless, or closed: let the IO stage find out
                desc.readiness = wanted;
                ready.push(id);
            }
        }
    }

    // a handle the selector cannot watch ends that socket only
    for (id, e) in refused {
        if !e.is_socket_level() {
            return Err(e);
        }
        p.with_descriptor(id, |p, desc| {
            desc.mark_complete();
            p.route_error(desc, e)
        })?;
    }

    let poll = p.config.delay_poll_interval;
    if p.delayed_waiting {
        wait = Some(wait.map_or(poll, |w| w.min(poll)));
    }
    if !ready.is_empty() {
        wait = Some(Duration::ZERO);
    }

    if !registered {
        if ready.is_empty() && p.delayed_waiting {
            std::thread::sleep(poll);
        }
        return Ok(ready);
    }

    ktrace!("select: waiting {:?}", wait);
    match selector.select(wait) {
        Ok(selected) => {
            for SelectedSocket { id, readiness } in selected {
                if let Some(desc) = p.bag.get_mut(id) {
                    desc.readiness |= readiness;
                    if !ready.contains(&id) {
                        ready.push(id);
                    }
                }
            }
        }
        Err(SockError::SelectTimeout) => {}
        Err(e) => return Err(e),
    }
    Ok(ready)
}
