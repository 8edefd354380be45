//! Readiness multiplexing abstraction
//!
//! A `Selector` waits until registered handles become readable, writable
//! or carry out-of-band data.
//!
//! # Implementors
//!
//! - `SelectSelector` (default): `select(2)` through nix. Limited to
//!   handles below `FD_SETSIZE`.
//!
//! **Contract:**
//! - `select()` blocks at most `timeout` (`None` waits indefinitely).
//! - An elapsed wait is reported as `Err(SockError::SelectTimeout)`, any
//!   other failure as `Err(SockError::Selector(errno))`.
//! - With no interest registered, `select()` returns an empty set at once.

use core::fmt;
use core::ops::{BitAnd, BitOr, BitOrAssign};
use std::os::fd::RawFd;
use std::time::Duration;

use crate::error::SockResult;
use crate::id::SocketId;

/// Readiness bitmask
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Readiness(u8);

impl Readiness {
    pub const NONE: Readiness = Readiness(0);
    pub const READ: Readiness = Readiness(1);
    pub const WRITE: Readiness = Readiness(1 << 1);
    pub const OOB: Readiness = Readiness(1 << 2);

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn from_bits(bits: u8) -> Self {
        Readiness(bits & 0b111)
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn contains(self, other: Readiness) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    #[inline]
    pub fn insert(&mut self, other: Readiness) {
        self.0 |= other.0;
    }

    #[inline]
    pub fn remove(&mut self, other: Readiness) {
        self.0 &= !other.0;
    }

    #[inline]
    pub fn is_readable(self) -> bool {
        self.contains(Readiness::READ)
    }

    #[inline]
    pub fn is_writable(self) -> bool {
        self.contains(Readiness::WRITE)
    }

    #[inline]
    pub fn is_oob(self) -> bool {
        self.contains(Readiness::OOB)
    }
}

impl BitOr for Readiness {
    type Output = Readiness;

    fn bitor(self, rhs: Readiness) -> Readiness {
        Readiness(self.0 | rhs.0)
    }
}

impl BitOrAssign for Readiness {
    fn bitor_assign(&mut self, rhs: Readiness) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Readiness {
    type Output = Readiness;

    fn bitand(self, rhs: Readiness) -> Readiness {
        Readiness(self.0 & rhs.0)
    }
}

impl fmt::Debug for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "NONE");
        }
        let mut sep = "";
        for (flag, name) in [
            (Readiness::READ, "READ"),
            (Readiness::WRITE, "WRITE"),
            (Readiness::OOB, "OOB"),
        ] {
            if self.contains(flag) {
                write!(f, "{}{}", sep, name)?;
                sep = "|";
            }
        }
        Ok(())
    }
}

/// A socket reported ready by the selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectedSocket {
    pub id: SocketId,
    pub readiness: Readiness,
}

/// Readiness multiplexer
pub trait Selector {
    /// Add `interest` for `id`, merging with any interest already held
    fn add_interest(&mut self, id: SocketId, fd: RawFd, interest: Readiness) -> SockResult<()>;

    /// Drop every interest held for `id`
    fn remove_interest(&mut self, id: SocketId);

    /// Drop all interests
    fn clear_interests(&mut self);

    fn has_interests(&self) -> bool;

    /// Wait for readiness of the registered handles
    fn select(&mut self, timeout: Option<Duration>) -> SockResult<Vec<SelectedSocket>>;
}

impl<S: Selector + ?Sized> Selector for Box<S> {
    fn add_interest(&mut self, id: SocketId, fd: RawFd, interest: Readiness) -> SockResult<()> {
        (**self).add_interest(id, fd, interest)
    }

    fn remove_interest(&mut self, id: SocketId) {
        (**self).remove_interest(id)
    }

    fn clear_interests(&mut self) {
        (**self).clear_interests()
    }

    fn has_interests(&self) -> bool {
        (**self).has_interests()
    }

    fn select(&mut self, timeout: Option<Duration>) -> SockResult<Vec<SelectedSocket>> {
        (**self).select(timeout)
    }
}
