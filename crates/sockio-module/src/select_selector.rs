//! `SelectSelector` - default `Selector` implementation.
//!
//! Builds read, write and except sets from the registered interests and
//! calls `select(2)` through nix. Interrupted waits are resumed with the
//! remaining time. Out-of-band interest maps onto the except set, which is
//! where TCP urgent data is reported.
//!
//! `select(2)` only handles descriptors below `FD_SETSIZE` (1024 on
//! Linux). A socket with a larger handle is refused with a network error,
//! which ends that socket only.

use std::collections::BTreeMap;
use std::os::fd::{BorrowedFd, RawFd};
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::select::{select, FdSet};
use nix::sys::time::{TimeVal, TimeValLike};
use sockio_core::{
    ktrace, Readiness, SelectedSocket, Selector, SockError, SockResult, SocketId,
};

#[derive(Debug, Default)]
pub struct SelectSelector {
    interests: BTreeMap<SocketId, (RawFd, Readiness)>,
}

impl SelectSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interest currently held for `id`
    pub fn interest(&self, id: SocketId) -> Option<Readiness> {
        self.interests.get(&id).map(|(_, r)| *r)
    }
}

impl Selector for SelectSelector {
    fn add_interest(&mut self, id: SocketId, fd: RawFd, interest: Readiness) -> SockResult<()> {
        if fd < 0 {
            return Err(SockError::Selector(Errno::EBADF as i32));
        }
        if fd as usize >= libc::FD_SETSIZE as usize {
            return Err(SockError::network(format!(
                "handle {} of {} is beyond FD_SETSIZE ({})",
                fd,
                id,
                libc::FD_SETSIZE
            )));
        }
        let entry = self.interests.entry(id).or_insert((fd, Readiness::NONE));
        entry.0 = fd;
        entry.1 |= interest;
        Ok(())
    }

    fn remove_interest(&mut self, id: SocketId) {
        self.interests.remove(&id);
    }

    fn clear_interests(&mut self) {
        self.interests.clear();
    }

    fn has_interests(&self) -> bool {
        self.interests.values().any(|(_, r)| !r.is_empty())
    }

    fn select(&mut self, timeout: Option<Duration>) -> SockResult<Vec<SelectedSocket>> {
        if !self.has_interests() {
            return Ok(Vec::new());
        }
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            // SAFETY: every registered handle is owned by a socket in the
            // bag and stays open for the duration of this call
            let borrow = |fd: RawFd| unsafe { BorrowedFd::borrow_raw(fd) };

            let mut reads = FdSet::new();
            let mut writes = FdSet::new();
            let mut excepts = FdSet::new();
            for (fd, interest) in self.interests.values() {
                if interest.is_readable() {
                    reads.insert(borrow(*fd));
                }
                if interest.is_writable() {
                    writes.insert(borrow(*fd));
                }
                if interest.is_oob() {
                    excepts.insert(borrow(*fd));
                }
            }

            let mut tv = deadline.map(|d| {
                let left = d.saturating_duration_since(Instant::now());
                TimeVal::microseconds(left.as_micros().min(i64::MAX as u128) as i64)
            });

            match select(None, &mut reads, &mut writes, &mut excepts, tv.as_mut()) {
                Ok(0) => return Err(SockError::SelectTimeout),
                Ok(n) => {
                    ktrace!("select: {} handles ready", n);
                    let mut ready = Vec::new();
                    for (id, (fd, interest)) in &self.interests {
                        let mut readiness = Readiness::NONE;
                        if interest.is_readable() && reads.contains(borrow(*fd)) {
                            readiness |= Readiness::READ;
                        }
                        if interest.is_writable() && writes.contains(borrow(*fd)) {
                            readiness |= Readiness::WRITE;
                        }
                        if interest.is_oob() && excepts.contains(borrow(*fd)) {
                            readiness |= Readiness::OOB;
                        }
                        if !readiness.is_empty() {
                            ready.push(SelectedSocket { id: *id, readiness });
                        }
                    }
                    return Ok(ready);
                }
                Err(Errno::EINTR) => {
                    if deadline.is_some_and(|d| Instant::now() >= d) {
                        return Err(SockError::SelectTimeout);
                    }
                }
                Err(e) => return Err(SockError::Selector(e as i32)),
            }
        }
    }
}
