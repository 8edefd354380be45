//! `ServerSocket` and `AcceptedSocket`.
//!
//! A server socket listens at its address; every read accepts at most one
//! client and returns it as `Frame::Accepted`. The executor hands it to the
//! `ACCEPT` event, where the handler may register it as a new socket.

use std::net::SocketAddr;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};

use sockio_core::{
    kdebug, AcceptedFrame, Frame, FramePicker, PartialFrame, SockError, SockResult, Socket,
    SocketKind, StreamContext,
};

use crate::address::parse_address;
use crate::stream::StreamTransport;
use crate::sys;

/// Listening TCP socket
#[derive(Debug, Default)]
pub struct ServerSocket {
    fd: Option<OwnedFd>,
    local: Option<SocketAddr>,
}

impl ServerSocket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen at `address` right away, e.g. to learn an ephemeral port
    pub fn bind(address: &str) -> SockResult<Self> {
        let mut server = Self::new();
        server.open(address, &StreamContext::new().reuse_address(true))?;
        Ok(server)
    }

    /// Address actually bound
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local
    }
}

impl Socket for ServerSocket {
    fn kind(&self) -> SocketKind {
        SocketKind::Server
    }

    fn open(&mut self, address: &str, context: &StreamContext) -> SockResult<()> {
        if self.fd.is_some() {
            return Ok(());
        }
        let (_, addr) = parse_address(address)?;
        let fd = sys::new_socket(&addr, libc::SOCK_STREAM)?;
        let raw = fd.as_raw_fd();

        if context.reuse_address {
            sys::set_option(raw, libc::SOL_SOCKET, libc::SO_REUSEADDR, 1)?;
        }
        sys::bind(raw, &addr)?;
        sys::listen(raw, context.backlog.unwrap_or_else(crate::listen_backlog))?;

        self.local = sys::local_addr(raw);
        kdebug!("listening on {:?}", self.local);
        self.fd = Some(fd);
        Ok(())
    }

    fn close(&mut self) -> SockResult<()> {
        self.fd = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.fd.is_some()
    }

    fn read(&mut self, _picker: &mut dyn FramePicker, out_of_band: bool) -> SockResult<Frame> {
        let fd = self
            .fd
            .as_ref()
            .map(|fd| fd.as_raw_fd())
            .ok_or_else(|| SockError::network("accept on a closed server socket"))?;
        if out_of_band {
            return Ok(Frame::Partial(PartialFrame::default()));
        }

        match sys::accept(fd)? {
            Some((client, remote)) => {
                let remote_text = remote.map(|a| a.to_string()).unwrap_or_default();
                kdebug!("accepted {} on fd {}", remote_text, client.as_raw_fd());
                let socket = AcceptedSocket::from_fd(client, remote);
                Ok(Frame::Accepted(AcceptedFrame::new(remote_text, Box::new(socket))))
            }
            None => Ok(Frame::Partial(PartialFrame::default())),
        }
    }

    fn write(&mut self, _data: &[u8], _out_of_band: bool) -> SockResult<usize> {
        Err(SockError::network("server sockets can not write"))
    }

    fn raw_handle(&self) -> Option<RawFd> {
        self.fd.as_ref().map(|fd| fd.as_raw_fd())
    }

    fn remote_address(&self) -> Option<String> {
        self.local.map(|a| a.to_string())
    }
}

/// Server side of an accepted connection; `open` is a no-op
#[derive(Debug)]
pub struct AcceptedSocket {
    transport: StreamTransport,
}

impl AcceptedSocket {
    pub fn from_fd(fd: OwnedFd, remote: Option<SocketAddr>) -> Self {
        Self {
            transport: StreamTransport::from_connected(fd, remote),
        }
    }
}

impl Socket for AcceptedSocket {
    fn kind(&self) -> SocketKind {
        SocketKind::Accepted
    }

    fn open(&mut self, _address: &str, _context: &StreamContext) -> SockResult<()> {
        if self.transport.is_open() {
            Ok(())
        } else {
            Err(SockError::network("accepted socket can not be reopened"))
        }
    }

    fn close(&mut self) -> SockResult<()> {
        self.transport.close();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    fn is_live(&self) -> bool {
        self.transport.is_live()
    }

    fn has_buffered_data(&self) -> bool {
        self.transport.has_pending()
    }

    fn read(&mut self, picker: &mut dyn FramePicker, out_of_band: bool) -> SockResult<Frame> {
        self.transport.read(picker, out_of_band)
    }

    fn write(&mut self, data: &[u8], out_of_band: bool) -> SockResult<usize> {
        self.transport.write(data, out_of_band)
    }

    fn raw_handle(&self) -> Option<RawFd> {
        self.transport.raw_fd()
    }

    fn remote_address(&self) -> Option<String> {
        self.transport.remote().map(|a| a.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sockio_core::{FixedLengthFramePicker, MarkerFramePicker, RawFramePicker};
    use std::io::Write;

    #[test]
    fn test_bind_ephemeral_port() {
        let server = ServerSocket::bind("tcp://127.0.0.1:0").unwrap();
        let addr = server.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
        assert!(server.is_connected());
        assert!(server.raw_handle().is_some());
    }

    #[test]
    fn test_accept_without_client_is_partial() {
        let mut server = ServerSocket::bind("127.0.0.1:0").unwrap();
        let frame = server.read(&mut RawFramePicker::new(), false).unwrap();
        assert!(!frame.is_eof());
    }

    #[test]
    fn test_accept_blocking_client() {
        let mut server = ServerSocket::bind("127.0.0.1:0").unwrap();
        let addr = server.local_addr().unwrap();
        let client = std::net::TcpStream::connect(addr).unwrap();

        let mut accepted = None;
        for _ in 0..200 {
            if let Frame::Accepted(frame) = server.read(&mut RawFramePicker::new(), false).unwrap() {
                accepted = Some(frame);
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        let frame = accepted.expect("client was not accepted");
        assert_eq!(frame.remote_address(), client.local_addr().unwrap().to_string());

        let (_, socket) = frame.into_parts();
        assert_eq!(socket.kind(), SocketKind::Accepted);
        assert!(socket.is_connected());
    }

    fn accept_one(server: &mut ServerSocket) -> Box<dyn Socket> {
        for _ in 0..200 {
            if let Frame::Accepted(frame) = server.read(&mut RawFramePicker::new(), false).unwrap() {
                return frame.into_parts().1;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        panic!("client was not accepted");
    }

    #[test]
    fn test_second_frame_served_from_leftover_bytes() {
        let mut server = ServerSocket::bind("127.0.0.1:0").unwrap();
        let addr = server.local_addr().unwrap();
        let mut client = std::net::TcpStream::connect(addr).unwrap();
        let mut socket = accept_one(&mut server);

        // both frames in one segment, then the peer stays silent
        client.write_all(b"HDR\r\n\r\nBODY").unwrap();

        let mut header = MarkerFramePicker::until("\r\n\r\n");
        let mut first = None;
        for _ in 0..200 {
            match socket.read(&mut header, false).unwrap() {
                Frame::Data(frame) => {
                    first = Some(frame);
                    break;
                }
                _ => std::thread::sleep(std::time::Duration::from_millis(5)),
            }
        }
        assert_eq!(first.expect("header not read").data(), b"HDR\r\n\r\n");
        assert!(socket.has_buffered_data());

        let mut body = FixedLengthFramePicker::new(4);
        match socket.read(&mut body, false).unwrap() {
            Frame::Data(frame) => assert_eq!(frame.data(), b"BODY"),
            other => panic!("expected the body frame, got {:?}", other),
        }
        assert!(!socket.has_buffered_data());

        socket.close().unwrap();
        assert!(!socket.has_buffered_data());
    }

    #[test]
    fn test_server_write_fails() {
        let mut server = ServerSocket::bind("127.0.0.1:0").unwrap();
        assert!(server.write(b"x", false).is_err());
    }
}
