//! `ClientSocket` - default TCP client.
//!
//! `open` starts a non-blocking connect and returns immediately. The
//! executor waits for write readiness, then calls `finish_connect` to
//! surface a refused or failed connect as a network error.

use std::os::fd::RawFd;

use sockio_core::{Frame, FramePicker, SockResult, Socket, SocketKind, StreamContext};

use crate::stream::StreamTransport;

#[derive(Debug, Default)]
pub struct ClientSocket {
    transport: StreamTransport,
}

impl ClientSocket {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Socket for ClientSocket {
    fn kind(&self) -> SocketKind {
        SocketKind::Client
    }

    fn open(&mut self, address: &str, context: &StreamContext) -> SockResult<()> {
        self.transport.connect(address, context)
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

    fn finish_connect(&mut self) -> SockResult<()> {
        self.transport.finish_connect()
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
