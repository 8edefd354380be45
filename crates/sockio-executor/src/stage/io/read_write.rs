//! Composite read/write operations
//!
//! The prioritized half runs first, then the other, each gated by its own
//! readiness. Results are scheduled back into the composite: a continuing
//! write stays at the head of the write queue, follow-up operations join
//! the tail of their queue. The composite is done once both queues drain.

use std::collections::VecDeque;

use sockio_core::{Readiness, SockError, SockResult};

use super::dispatch;
use crate::descriptor::RequestDescriptor;
use crate::operation::{Operation, Progress, ReadWriteOperation};
use crate::pipeline::Pipeline;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Half {
    Read,
    Write,
}

pub(super) fn read_write(
    p: &mut Pipeline,
    desc: &mut RequestDescriptor,
    mut op: ReadWriteOperation,
    readiness: Readiness,
) -> SockResult<Progress> {
    let order = if op.read_first {
        [Half::Read, Half::Write]
    } else {
        [Half::Write, Half::Read]
    };

    let mut progressed = false;
    for half in order {
        let Some(sub) = queue_of(&mut op, half).pop_front() else {
            continue;
        };
        check_nested(&sub)?;

        match dispatch(p, desc, sub, readiness)? {
            Progress::Pending(sub) => queue_of(&mut op, half).push_front(sub),
            Progress::Next(next @ Operation::InProgressWrite(_)) if half == Half::Write => {
                progressed = true;
                op.writes.push_front(next);
            }
            Progress::Next(next) => {
                progressed = true;
                schedule(&mut op, next)?;
            }
            Progress::Done => progressed = true,
        }
    }

    if op.is_empty() {
        return Ok(Progress::Done);
    }
    let op = Operation::ReadWrite(op);
    Ok(if progressed {
        Progress::Next(op)
    } else {
        Progress::Pending(op)
    })
}

fn queue_of(op: &mut ReadWriteOperation, half: Half) -> &mut VecDeque<Operation> {
    match half {
        Half::Read => &mut op.reads,
        Half::Write => &mut op.writes,
    }
}

const NESTING: &str = "handshake and delayed operations can not run inside a read-write operation";

fn check_nested(op: &Operation) -> SockResult<()> {
    match op {
        Operation::SslHandshake(_) | Operation::Delayed(_) => {
            Err(SockError::InvalidOperation(NESTING))
        }
        _ => Ok(()),
    }
}

/// Queue a follow-up operation on the matching half
fn schedule(op: &mut ReadWriteOperation, next: Operation) -> SockResult<()> {
    match next {
        Operation::Read(_) => op.reads.push_back(next),
        Operation::Write(_) | Operation::InProgressWrite(_) => op.writes.push_back(next),
        Operation::ReadWrite(inner) => {
            op.reads.extend(inner.reads);
            op.writes.extend(inner.writes);
        }
        Operation::Null => {}
        Operation::SslHandshake(_) | Operation::Delayed(_) => {
            return Err(SockError::InvalidOperation(NESTING))
        }
    }
    Ok(())
}
