//! Connected stream transport shared by the TCP socket types
//!
//! `StreamTransport` owns the handle, the bytes a picker left unconsumed,
//! and the connection state. `ClientSocket`, `PersistentClientSocket` and
//! `AcceptedSocket` are thin wrappers deciding how `open` behaves.

use std::net::SocketAddr;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};

use nix::errno::Errno;
use sockio_core::{
    ktrace, Frame, FramePicker, PartialFrame, SockError, SockResult, StreamContext,
};

use crate::address::parse_address;
use crate::sys;

#[derive(Debug)]
pub struct StreamTransport {
    fd: Option<OwnedFd>,
    connected: bool,
    remote: Option<SocketAddr>,
    /// Bytes received past the end of the previous frame
    pending: Vec<u8>,
    read_buffer_size: usize,
}

impl StreamTransport {
    pub fn new() -> Self {
        Self {
            fd: None,
            connected: false,
            remote: None,
            pending: Vec::new(),
            read_buffer_size: crate::read_buffer_size(),
        }
    }

    /// Wrap an already connected handle
    pub fn from_connected(fd: OwnedFd, remote: Option<SocketAddr>) -> Self {
        Self {
            fd: Some(fd),
            connected: true,
            remote,
            ..Self::new()
        }
    }

    #[inline]
    pub fn raw_fd(&self) -> Option<RawFd> {
        self.fd.as_ref().map(|fd| fd.as_raw_fd())
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.fd.is_some()
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.fd.is_some() && self.connected
    }

    /// Leftover bytes from a `recv` that carried more than one frame
    #[inline]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn remote(&self) -> Option<SocketAddr> {
        self.remote
    }

    fn remote_string(&self) -> Option<String> {
        self.remote.map(|a| a.to_string())
    }

    fn fd_or_err(&self, op: &str) -> SockResult<RawFd> {
        self.raw_fd()
            .ok_or_else(|| SockError::network(format!("{} on a closed socket", op)))
    }

    /// Start a non-blocking connect; completion is checked by `finish_connect`
    pub fn connect(&mut self, address: &str, context: &StreamContext) -> SockResult<()> {
        self.close();
        let (_, addr) = parse_address(address)?;
        let fd = sys::new_socket(&addr, libc::SOCK_STREAM)?;
        let raw = fd.as_raw_fd();

        if context.nodelay {
            sys::set_option(raw, libc::IPPROTO_TCP, libc::TCP_NODELAY, 1)?;
        }
        if context.reuse_address {
            sys::set_option(raw, libc::SOL_SOCKET, libc::SO_REUSEADDR, 1)?;
        }
        if let Some(local) = &context.bind_to {
            let (_, local) = parse_address(local)?;
            sys::bind(raw, &local)?;
        }

        match sys::connect(raw, &addr) {
            Ok(()) => {}
            Err(Errno::EINPROGRESS) | Err(Errno::EINTR) => {}
            Err(e) => return Err(SockError::from_errno("connect", e as i32)),
        }

        ktrace!("connecting fd {} to {}", raw, addr);
        self.fd = Some(fd);
        self.remote = Some(addr);
        Ok(())
    }

    pub fn finish_connect(&mut self) -> SockResult<()> {
        if self.connected {
            return Ok(());
        }
        let fd = self.fd_or_err("finish_connect")?;
        let err = sys::socket_error(fd)?;
        if err != 0 {
            return Err(SockError::from_errno("connect", err));
        }
        if let Some(peer) = sys::peer_addr(fd) {
            self.remote = Some(peer);
        }
        self.connected = true;
        Ok(())
    }

    pub fn close(&mut self) {
        if let Some(fd) = self.fd.take() {
            ktrace!("closing fd {}", fd.as_raw_fd());
        }
        self.connected = false;
        self.pending.clear();
    }

    /// No EOF pending and the peer name still resolves
    pub fn is_live(&self) -> bool {
        let Some(fd) = self.raw_fd() else {
            return false;
        };
        if !self.connected || sys::peer_addr(fd).is_none() {
            return false;
        }
        let mut probe = [0u8; 1];
        match sys::recv(fd, &mut probe, libc::MSG_PEEK | libc::MSG_DONTWAIT) {
            Ok(0) => false,
            Ok(_) => true,
            Err(e) => sys::would_block(e),
        }
    }

    pub fn read(&mut self, picker: &mut dyn FramePicker, out_of_band: bool) -> SockResult<Frame> {
        let fd = self.fd_or_err("read")?;
        let remote = self.remote_string();

        if out_of_band {
            let mut byte = [0u8; 1];
            return match sys::recv(fd, &mut byte, libc::MSG_OOB) {
                Ok(n) if n > 0 => {
                    picker.push_data(&byte[..n], remote.as_deref());
                    Ok(Frame::Data(picker.create_frame()))
                }
                Ok(_) => Ok(Frame::Partial(PartialFrame::new(picker.buffered(), remote))),
                // no urgent byte queued
                Err(e) if sys::would_block(e) || e == Errno::EINVAL => {
                    Ok(Frame::Partial(PartialFrame::new(picker.buffered(), remote)))
                }
                Err(e) => Err(SockError::from_errno("recv(MSG_OOB)", e as i32)),
            };
        }

        if !picker.is_eof() && !self.pending.is_empty() {
            let used = picker.push_data(&self.pending, remote.as_deref());
            self.pending.drain(..used);
        }
        if picker.is_eof() {
            return Ok(Frame::Data(picker.create_frame()));
        }

        let mut buf = vec![0u8; self.read_buffer_size];
        loop {
            match sys::recv(fd, &mut buf, 0) {
                Ok(0) => {
                    return Err(SockError::network(if picker.buffered() > 0 {
                        "connection closed by peer before the frame completed"
                    } else {
                        "connection closed by peer"
                    }));
                }
                Ok(n) => {
                    let used = picker.push_data(&buf[..n], remote.as_deref());
                    if used < n {
                        self.pending.extend_from_slice(&buf[used..n]);
                    }
                    if picker.is_eof() {
                        return Ok(Frame::Data(picker.create_frame()));
                    }
                }
                Err(e) if sys::would_block(e) => break,
                Err(e) => return Err(SockError::from_errno("recv", e as i32)),
            }
        }

        Ok(Frame::Partial(PartialFrame::new(picker.buffered(), remote)))
    }

    pub fn write(&mut self, data: &[u8], out_of_band: bool) -> SockResult<usize> {
        let fd = self.fd_or_err("write")?;
        if data.is_empty() {
            return Ok(0);
        }
        let flags = if out_of_band { libc::MSG_OOB } else { 0 };
        match sys::send(fd, data, flags) {
            Ok(n) => Ok(n),
            Err(e) if sys::would_block(e) => Ok(0),
            Err(e) => Err(SockError::from_errno("send", e as i32)),
        }
    }
}

impl Default for StreamTransport {
    fn default() -> Self {
        Self::new()
    }
}

