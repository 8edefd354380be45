//! Scripted socket and selector for pipeline tests

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::os::fd::RawFd;
use std::rc::Rc;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

use sockio_core::{
    CryptoMethod, Frame, FramePicker, HandshakeStatus, PartialFrame, Readiness, SelectedSocket,
    Selector, SockError, SockResult, Socket, SocketId, SocketKind, StreamContext,
};

static NEXT_FD: AtomicI32 = AtomicI32::new(1000);

#[derive(Debug, Default)]
pub(crate) struct MockState {
    pub opened: u32,
    pub closed: u32,
    pub connected: bool,
    pub live: bool,
    pub last_address: Option<String>,
    /// Chunks handed to reads, one per `recv`
    pub incoming: VecDeque<Vec<u8>>,
    /// Reads fail once `incoming` runs dry
    pub eof: bool,
    pub written: Vec<u8>,
    pub oob_written: Vec<u8>,
    /// Largest write accepted per call
    pub write_limit: Option<usize>,
    pub open_error: Option<SockError>,
    pub connect_error: Option<SockError>,
    pub close_error: Option<SockError>,
    pub handshakes: VecDeque<HandshakeStatus>,
    pub oob: VecDeque<u8>,
    pub connectionless: bool,
    /// Reported through `has_buffered_data`
    pub buffered: bool,
}

pub(crate) type MockHandle = Rc<RefCell<MockState>>;

pub(crate) struct MockSocket {
    state: MockHandle,
    fd: RawFd,
}

impl MockSocket {
    pub fn new() -> Self {
        Self::pair().0
    }

    /// Socket plus a handle to script and inspect it
    pub fn pair() -> (Self, MockHandle) {
        Self::with_fd(NEXT_FD.fetch_add(1, Ordering::Relaxed))
    }

    pub fn with_fd(fd: RawFd) -> (Self, MockHandle) {
        let state = Rc::new(RefCell::new(MockState::default()));
        (
            Self {
                state: state.clone(),
                fd,
            },
            state,
        )
    }

    /// Already connected, as an accepted socket would be
    pub fn connected() -> (Self, MockHandle) {
        let (sock, state) = Self::pair();
        state.borrow_mut().connected = true;
        (sock, state)
    }
}

impl Socket for MockSocket {
    fn kind(&self) -> SocketKind {
        if self.state.borrow().connectionless {
            SocketKind::UdpClient
        } else {
            SocketKind::Client
        }
    }

    fn open(&mut self, address: &str, _context: &StreamContext) -> SockResult<()> {
        let mut s = self.state.borrow_mut();
        if let Some(e) = s.open_error.clone() {
            return Err(e);
        }
        s.opened += 1;
        s.last_address = Some(address.to_string());
        if s.connectionless {
            s.connected = true;
        }
        Ok(())
    }

    fn close(&mut self) -> SockResult<()> {
        let mut s = self.state.borrow_mut();
        s.closed += 1;
        s.connected = false;
        match s.close_error.clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn is_connected(&self) -> bool {
        self.state.borrow().connected
    }

    fn is_live(&self) -> bool {
        let s = self.state.borrow();
        s.connected && s.live
    }

    fn finish_connect(&mut self) -> SockResult<()> {
        let mut s = self.state.borrow_mut();
        if let Some(e) = s.connect_error.clone() {
            return Err(e);
        }
        s.connected = true;
        Ok(())
    }

    fn has_buffered_data(&self) -> bool {
        self.state.borrow().buffered
    }

    fn read(&mut self, picker: &mut dyn FramePicker, out_of_band: bool) -> SockResult<Frame> {
        let mut s = self.state.borrow_mut();
        if out_of_band {
            if let Some(byte) = s.oob.pop_front() {
                picker.push_data(&[byte], None);
                return Ok(Frame::Data(picker.create_frame()));
            }
            return Ok(Frame::Partial(PartialFrame::new(0, None)));
        }
        if !s.connected {
            return Err(SockError::network("read on a closed socket"));
        }

        while !picker.is_eof() {
            let Some(chunk) = s.incoming.pop_front() else {
                if s.eof {
                    return Err(SockError::network("connection closed by peer"));
                }
                break;
            };
            let used = picker.push_data(&chunk, None);
            if used < chunk.len() {
                s.incoming.push_front(chunk[used..].to_vec());
            }
        }

        if picker.is_eof() {
            Ok(Frame::Data(picker.create_frame()))
        } else {
            Ok(Frame::Partial(PartialFrame::new(picker.buffered(), None)))
        }
    }

    fn write(&mut self, data: &[u8], out_of_band: bool) -> SockResult<usize> {
        let mut s = self.state.borrow_mut();
        if !s.connected {
            return Err(SockError::network("write on a closed socket"));
        }
        let n = data.len().min(s.write_limit.unwrap_or(usize::MAX));
        if out_of_band {
            s.oob_written.extend_from_slice(&data[..n]);
        } else {
            s.written.extend_from_slice(&data[..n]);
        }
        Ok(n)
    }

    fn raw_handle(&self) -> Option<RawFd> {
        Some(self.fd)
    }

    fn handshake(&mut self, _method: CryptoMethod) -> SockResult<HandshakeStatus> {
        Ok(self
            .state
            .borrow_mut()
            .handshakes
            .pop_front()
            .unwrap_or(HandshakeStatus::Done))
    }

    fn is_connectionless(&self) -> bool {
        self.state.borrow().connectionless
    }
}

/// Reports every interest ready, except stalled ids
#[derive(Debug, Default)]
pub(crate) struct MockSelector {
    interests: BTreeMap<SocketId, Readiness>,
    pub stalled: HashSet<SocketId>,
    /// Ids with urgent data pending
    pub oob_ready: HashSet<SocketId>,
    pub fail: Option<SockError>,
    /// Ids whose handle `add_interest` rejects
    pub refuse: HashSet<SocketId>,
    pub selects: u32,
    pub last_timeout: Option<Option<Duration>>,
}

impl Selector for MockSelector {
    fn add_interest(&mut self, id: SocketId, fd: RawFd, interest: Readiness) -> SockResult<()> {
        if self.refuse.contains(&id) {
            return Err(SockError::network(format!("handle {} refused", fd)));
        }
        *self.interests.entry(id).or_default() |= interest;
        Ok(())
    }

    fn remove_interest(&mut self, id: SocketId) {
        self.interests.remove(&id);
    }

    fn clear_interests(&mut self) {
        self.interests.clear();
    }

    fn has_interests(&self) -> bool {
        self.interests.values().any(|r| !r.is_empty())
    }

    fn select(&mut self, timeout: Option<Duration>) -> SockResult<Vec<SelectedSocket>> {
        self.selects += 1;
        self.last_timeout = Some(timeout);
        if let Some(e) = self.fail.clone() {
            return Err(e);
        }

        let ready: Vec<SelectedSocket> = self
            .interests
            .iter()
            .filter(|(id, _)| !self.stalled.contains(id))
            .map(|(id, interest)| {
                let mut readiness = *interest;
                if !self.oob_ready.contains(id) {
                    readiness.remove(Readiness::OOB);
                }
                SelectedSocket {
                    id: *id,
                    readiness,
                }
            })
            .filter(|s| !s.readiness.is_empty())
            .collect();

        if ready.is_empty() {
            let nap = timeout.unwrap_or(Duration::from_millis(50));
            std::thread::sleep(nap.min(Duration::from_millis(50)));
            return Err(SockError::SelectTimeout);
        }
        Ok(ready)
    }
}
