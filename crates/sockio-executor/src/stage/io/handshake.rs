//! Crypto handshake sequencing

use sockio_core::{HandshakeStatus, Readiness, SockError, SockResult};

use crate::descriptor::RequestDescriptor;
use crate::operation::{HandshakeOperation, Operation, Progress};

pub(super) fn handshake(
    desc: &mut RequestDescriptor,
    op: HandshakeOperation,
    readiness: Readiness,
) -> SockResult<Progress> {
    if !readiness.is_readable() && !readiness.is_writable() {
        return Ok(Progress::Pending(Operation::SslHandshake(op)));
    }

    match desc.socket.handshake(op.method)? {
        HandshakeStatus::Done => Ok(Progress::from_next(op.next)),
        HandshakeStatus::Failed => Err(SockError::Handshake(format!(
            "{:?} negotiation with {} failed",
            op.method,
            desc.socket.remote_address().unwrap_or_else(|| "peer".into())
        ))),
        HandshakeStatus::InProgress => Ok(Progress::Pending(Operation::SslHandshake(op))),
    }
}
