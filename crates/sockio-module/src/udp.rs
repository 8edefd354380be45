//! `UdpClientSocket` - connected datagram client.
//!
//! Connectionless: the select stage hands it to the IO stage every pass
//! without waiting on readiness. Each read delivers at most one datagram
//! to the picker; reads with nothing queued are partial.

use std::net::SocketAddr;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};

use sockio_core::{
    Frame, FramePicker, PartialFrame, SockError, SockResult, Socket, SocketKind, StreamContext,
};

use crate::address::parse_address;
use crate::sys;

#[derive(Debug, Default)]
pub struct UdpClientSocket {
    fd: Option<OwnedFd>,
    remote: Option<SocketAddr>,
}

impl UdpClientSocket {
    pub fn new() -> Self {
        Self::default()
    }

    fn fd_or_err(&self) -> SockResult<RawFd> {
        self.fd
            .as_ref()
            .map(|fd| fd.as_raw_fd())
            .ok_or_else(|| SockError::network("udp socket is closed"))
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.fd.as_ref().and_then(|fd| sys::local_addr(fd.as_raw_fd()))
    }
}

impl Socket for UdpClientSocket {
    fn kind(&self) -> SocketKind {
        SocketKind::UdpClient
    }

    fn open(&mut self, address: &str, context: &StreamContext) -> SockResult<()> {
        self.fd = None;
        let (_, addr) = parse_address(address)?;
        let fd = sys::new_socket(&addr, libc::SOCK_DGRAM)?;
        let raw = fd.as_raw_fd();

        if context.reuse_address {
            sys::set_option(raw, libc::SOL_SOCKET, libc::SO_REUSEADDR, 1)?;
        }
        if let Some(local) = &context.bind_to {
            let (_, local) = parse_address(local)?;
            sys::bind(raw, &local)?;
        }
        sys::connect(raw, &addr).map_err(|e| SockError::from_errno("connect", e as i32))?;

        self.fd = Some(fd);
        self.remote = Some(addr);
        Ok(())
    }

    fn close(&mut self) -> SockResult<()> {
        self.fd = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.fd.is_some()
    }

    fn read(&mut self, picker: &mut dyn FramePicker, _out_of_band: bool) -> SockResult<Frame> {
        let fd = self.fd_or_err()?;
        let remote = self.remote.map(|a| a.to_string());
        if picker.is_eof() {
            return Ok(Frame::Data(picker.create_frame()));
        }

        let mut buf = vec![0u8; 65536];
        match sys::recv(fd, &mut buf, 0) {
            Ok(n) => {
                picker.push_data(&buf[..n], remote.as_deref());
                if picker.is_eof() {
                    return Ok(Frame::Data(picker.create_frame()));
                }
            }
            Err(e) if sys::would_block(e) => {}
            Err(e) => return Err(SockError::from_errno("recv", e as i32)),
        }
        Ok(Frame::Partial(PartialFrame::new(picker.buffered(), remote)))
    }

    fn write(&mut self, data: &[u8], _out_of_band: bool) -> SockResult<usize> {
        let fd = self.fd_or_err()?;
        match sys::send(fd, data, 0) {
            Ok(n) => Ok(n),
            Err(e) if sys::would_block(e) => Ok(0),
            Err(e) => Err(SockError::from_errno("send", e as i32)),
        }
    }

    fn raw_handle(&self) -> Option<RawFd> {
        self.fd.as_ref().map(|fd| fd.as_raw_fd())
    }

    fn is_connectionless(&self) -> bool {
        true
    }

    fn remote_address(&self) -> Option<String> {
        self.remote.map(|a| a.to_string())
    }
}
