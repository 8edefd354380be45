//! Socket bag
//!
//! Arena of request descriptors keyed by `SocketId`. Ids are handed out
//! monotonically, so iterating the bag visits sockets in registration
//! order.
//!
//! While an event is dispatched for a socket its descriptor is checked
//! out of the bag. A checked-out slot keeps enough information (raw
//! handle, keep-alive flag) to reject duplicates and to queue a postpone
//! request until the descriptor is checked back in.

use std::collections::BTreeMap;
use std::os::fd::RawFd;

use sockio_core::{kdebug, Socket, SockError, SockResult, SocketId, SocketMetadata, SocketTelemetry};

use crate::descriptor::RequestDescriptor;
use crate::handler::EventHandler;
use crate::operation::Operation;

enum Slot {
    Resident(Box<RequestDescriptor>),
    CheckedOut {
        fd: Option<RawFd>,
        keep_alive: bool,
        postpone: bool,
    },
}

/// Registered sockets of one executor
pub struct SocketBag {
    slots: BTreeMap<SocketId, Slot>,
    next_id: SocketId,
    executing: bool,
    /// Sockets released without being closed
    released: Vec<Box<dyn Socket>>,
}

impl SocketBag {
    pub fn new() -> Self {
        Self {
            slots: BTreeMap::new(),
            next_id: SocketId::new(1),
            executing: false,
            released: Vec::new(),
        }
    }

    /// Number of registered sockets, forgotten ones included
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline]
    pub(crate) fn is_executing(&self) -> bool {
        self.executing
    }

    pub(crate) fn set_executing(&mut self, executing: bool) {
        self.executing = executing;
    }

    /// Register a socket with its first operation
    pub fn add_socket(
        &mut self,
        socket: Box<dyn Socket>,
        operation: Operation,
        metadata: Option<SocketMetadata>,
        handler: Option<Box<dyn EventHandler>>,
    ) -> SockResult<SocketId> {
        if let Some(fd) = socket.raw_handle() {
            if let Some(id) = self.find_handle(fd) {
                return Err(SockError::AlreadyRegistered(id));
            }
        }

        let id = self.next_id;
        self.next_id = id.next();
        let desc = RequestDescriptor::new(
            id,
            socket,
            operation,
            metadata.unwrap_or_default(),
            handler,
        );
        kdebug!("bag: added {} ({})", id, desc.socket.kind().as_str());
        self.slots.insert(id, Slot::Resident(Box::new(desc)));
        Ok(id)
    }

    fn find_handle(&self, fd: RawFd) -> Option<SocketId> {
        self.slots.iter().find_map(|(id, slot)| {
            let handle = match slot {
                Slot::Resident(desc) if !desc.forgotten => desc.socket.raw_handle(),
                Slot::Resident(_) => None,
                Slot::CheckedOut { fd, .. } => *fd,
            };
            (handle == Some(fd)).then_some(*id)
        })
    }

    /// Remove a socket
    ///
    /// A socket still running in the current request is only marked
    /// forgotten; the disconnect stage settles it.
    pub fn remove_socket(&mut self, id: SocketId) -> SockResult<()> {
        let desc = match self.slots.get_mut(&id) {
            None => return Err(SockError::UnknownSocket(id)),
            Some(Slot::CheckedOut { .. }) => return Err(SockError::Busy(id)),
            Some(Slot::Resident(desc)) if desc.forgotten => {
                return Err(SockError::UnknownSocket(id))
            }
            Some(Slot::Resident(desc)) => desc,
        };

        if self.executing && desc.running && !desc.finalized && !desc.is_complete() {
            kdebug!("bag: {} forgotten while running", id);
            desc.forgotten = true;
            return Ok(());
        }

        if let Some(Slot::Resident(desc)) = self.slots.remove(&id) {
            kdebug!("bag: removed {}", id);
            if desc.is_keep_alive() {
                self.released.push(desc.socket);
            }
        }
        Ok(())
    }

    pub fn has_socket(&self, id: SocketId) -> bool {
        match self.slots.get(&id) {
            Some(Slot::Resident(desc)) => !desc.forgotten,
            Some(Slot::CheckedOut { .. }) => true,
            None => false,
        }
    }

    /// Park a keep-alive socket until the next request
    pub fn postpone_socket(&mut self, id: SocketId) -> SockResult<()> {
        match self.slots.get_mut(&id) {
            None => Err(SockError::UnknownSocket(id)),
            Some(Slot::Resident(desc)) if desc.forgotten => Err(SockError::UnknownSocket(id)),
            Some(Slot::Resident(desc)) => {
                if !desc.is_keep_alive() {
                    return Err(SockError::NotKeepAlive(id));
                }
                desc.postponed = true;
                desc.mark_complete();
                Ok(())
            }
            Some(Slot::CheckedOut {
                keep_alive,
                postpone,
                ..
            }) => {
                if !*keep_alive {
                    return Err(SockError::NotKeepAlive(id));
                }
                *postpone = true;
                Ok(())
            }
        }
    }

    fn resident(&self, id: SocketId) -> SockResult<&RequestDescriptor> {
        match self.slots.get(&id) {
            Some(Slot::Resident(desc)) if !desc.forgotten => Ok(desc),
            Some(Slot::CheckedOut { .. }) => Err(SockError::Busy(id)),
            _ => Err(SockError::UnknownSocket(id)),
        }
    }

    fn resident_mut(&mut self, id: SocketId) -> SockResult<&mut RequestDescriptor> {
        match self.slots.get_mut(&id) {
            Some(Slot::Resident(desc)) if !desc.forgotten => Ok(desc),
            Some(Slot::CheckedOut { .. }) => Err(SockError::Busy(id)),
            _ => Err(SockError::UnknownSocket(id)),
        }
    }

    pub fn socket_metadata(&self, id: SocketId) -> SockResult<&SocketMetadata> {
        self.resident(id).map(|d| &d.metadata)
    }

    pub fn socket_metadata_mut(&mut self, id: SocketId) -> SockResult<&mut SocketMetadata> {
        self.resident_mut(id).map(|d| &mut d.metadata)
    }

    pub fn set_socket_metadata(&mut self, id: SocketId, metadata: SocketMetadata) -> SockResult<()> {
        self.resident_mut(id)?.metadata = metadata;
        Ok(())
    }

    pub fn socket_operation(&self, id: SocketId) -> SockResult<&Operation> {
        self.resident(id).map(|d| &d.operation)
    }

    pub fn set_socket_operation(&mut self, id: SocketId, operation: Operation) -> SockResult<()> {
        self.resident_mut(id)?.operation = operation;
        Ok(())
    }

    pub fn socket_telemetry(&self, id: SocketId) -> SockResult<&SocketTelemetry> {
        self.resident(id).map(|d| &d.telemetry)
    }

    /// Sockets released without a close: removed keep-alive sockets and
    /// keep-alive sockets forgotten mid-request
    pub fn take_released_sockets(&mut self) -> Vec<Box<dyn Socket>> {
        std::mem::take(&mut self.released)
    }

    // ---- pipeline internals ----

    /// Take a descriptor out for event dispatch
    pub(crate) fn checkout(&mut self, id: SocketId) -> Option<Box<RequestDescriptor>> {
        let slot = self.slots.get_mut(&id)?;
        let Slot::Resident(desc) = &*slot else {
            return None;
        };
        let placeholder = Slot::CheckedOut {
            fd: desc.socket.raw_handle(),
            keep_alive: desc.is_keep_alive(),
            postpone: false,
        };
        match std::mem::replace(slot, placeholder) {
            Slot::Resident(desc) => Some(desc),
            Slot::CheckedOut { .. } => None,
        }
    }

    /// Return a checked-out descriptor, applying a queued postpone
    pub(crate) fn checkin(&mut self, mut desc: Box<RequestDescriptor>) {
        if let Some(Slot::CheckedOut { postpone: true, .. }) = self.slots.get(&desc.id) {
            desc.postponed = true;
            desc.mark_complete();
        }
        self.slots.insert(desc.id, Slot::Resident(desc));
    }

    pub(crate) fn get(&self, id: SocketId) -> Option<&RequestDescriptor> {
        match self.slots.get(&id) {
            Some(Slot::Resident(desc)) => Some(desc),
            _ => None,
        }
    }

    pub(crate) fn get_mut(&mut self, id: SocketId) -> Option<&mut RequestDescriptor> {
        match self.slots.get_mut(&id) {
            Some(Slot::Resident(desc)) => Some(desc),
            _ => None,
        }
    }

    /// Resident descriptors, in id order
    pub(crate) fn descriptors(&self) -> impl Iterator<Item = &RequestDescriptor> {
        self.slots.values().filter_map(|slot| match slot {
            Slot::Resident(desc) => Some(&**desc),
            Slot::CheckedOut { .. } => None,
        })
    }

    pub(crate) fn ids(&self) -> Vec<SocketId> {
        self.slots.keys().copied().collect()
    }

    /// Ids of descriptors with work left in the current request
    pub(crate) fn active_ids(&self) -> Vec<SocketId> {
        self.descriptors()
            .filter(|d| d.is_active())
            .map(|d| d.id)
            .collect()
    }

    pub(crate) fn has_active(&self) -> bool {
        self.descriptors().any(|d| d.is_active())
    }

    pub(crate) fn running_count(&self) -> usize {
        self.descriptors()
            .filter(|d| d.running && d.is_active())
            .count()
    }

    /// Reset descriptors retained from an earlier request
    pub(crate) fn reset_retained(&mut self) {
        for slot in self.slots.values_mut() {
            if let Slot::Resident(desc) = slot {
                desc.reset_for_request();
            }
        }
    }

    /// Drop finalized descriptors unless they stay open for a later request
    pub(crate) fn collect_finalized(&mut self) {
        let done: Vec<SocketId> = self
            .descriptors()
            .filter(|d| d.finalized)
            .filter(|d| d.forgotten || !d.is_keep_alive() || !d.socket.is_live())
            .map(|d| d.id)
            .collect();

        for id in done {
            if let Some(Slot::Resident(desc)) = self.slots.remove(&id) {
                if desc.forgotten && desc.is_keep_alive() {
                    self.released.push(desc.socket);
                }
            }
        }
    }

    /// Drop every descriptor, for fatal aborts
    pub(crate) fn drain(&mut self) -> Vec<Box<RequestDescriptor>> {
        let slots = std::mem::take(&mut self.slots);
        slots
            .into_values()
            .filter_map(|slot| match slot {
                Slot::Resident(desc) => Some(desc),
                Slot::CheckedOut { .. } => None,
            })
            .collect()
    }
}

impl Default for SocketBag {
    fn default() -> Self {
        Self::new()
    }
}
