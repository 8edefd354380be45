//! Socket identifier type

use core::fmt;

/// Identifier of a socket registered in a socket bag.
///
/// Ids are handed out monotonically by the bag and never reused within
/// one bag, so iteration in id order equals registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct SocketId(u64);

impl SocketId {
    /// Create an id from a raw value
    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric value
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// The id following this one
    #[inline]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "socket#{}", self.0)
    }
}
