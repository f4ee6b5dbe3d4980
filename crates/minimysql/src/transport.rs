//! Transports the client can run over.
//!
//! [`TcpTransport`] talks to a real server. [`MemoryTransport`] replays a
//! scripted byte stream and records what the client wrote, which is how the
//! test suite drives the protocol without a server.

use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use minimysql_core::Transport;

use crate::protocol::PacketHeader;

const READ_CHUNK: usize = 4096;

fn not_connected() -> io::Error {
    io::Error::new(ErrorKind::NotConnected, "transport is not connected")
}

fn closed_by_peer() -> io::Error {
    io::Error::new(ErrorKind::UnexpectedEof, "server closed the connection")
}

/// Blocking TCP transport.
///
/// `available()` drains whatever the socket holds without blocking into an
/// internal buffer and reports its size; `read_byte()` serves from that
/// buffer and only blocks when it is empty. Once the peer has closed,
/// `available()` reports at least one byte so the next `read_byte()` surfaces
/// the end-of-stream instead of the caller polling until it times out.
#[derive(Debug, Default)]
pub struct TcpTransport {
    stream: Option<TcpStream>,
    buffer: VecDeque<u8>,
    connect_timeout: Option<Duration>,
    peer_closed: bool,
}

impl TcpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound each connect attempt to `timeout`.
    pub fn with_connect_timeout(timeout: Duration) -> Self {
        Self {
            connect_timeout: Some(timeout),
            ..Self::default()
        }
    }

    fn stream(&mut self) -> io::Result<&mut TcpStream> {
        self.stream.as_mut().ok_or_else(not_connected)
    }

    fn fill_nonblocking(&mut self) -> io::Result<()> {
        if self.peer_closed {
            return Ok(());
        }
        let Some(stream) = self.stream.as_mut() else {
            return Ok(());
        };

        stream.set_nonblocking(true)?;
        let mut chunk = [0u8; READ_CHUNK];
        let result = loop {
            match stream.read(&mut chunk) {
                // Peer closed; leave what is buffered for read_byte
                Ok(0) => {
                    self.peer_closed = true;
                    break Ok(());
                }
                Ok(n) => {
                    self.buffer.extend(&chunk[..n]);
                    if n < READ_CHUNK {
                        break Ok(());
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break Ok(()),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => break Err(e),
            }
        };
        stream.set_nonblocking(false)?;
        result
    }
}

impl Transport for TcpTransport {
    fn connect(&mut self, host: &str, port: u16) -> io::Result<()> {
        self.close();

        let mut last_err = None;
        for addr in (host, port).to_socket_addrs()? {
            let attempt = match self.connect_timeout {
                Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    self.stream = Some(stream);
                    return Ok(());
                }
                Err(e) => last_err = Some(e),
            }
        }

        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                ErrorKind::AddrNotAvailable,
                format!("no addresses found for {}:{}", host, port),
            )
        }))
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        let stream = self.stream()?;
        stream.write_all(bytes)?;
        stream.flush()
    }

    fn read_byte(&mut self) -> io::Result<u8> {
        if let Some(byte) = self.buffer.pop_front() {
            return Ok(byte);
        }
        if self.peer_closed {
            return Err(closed_by_peer());
        }

        let mut chunk = [0u8; READ_CHUNK];
        let n = loop {
            match self.stream()?.read(&mut chunk) {
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                other => break other?,
            }
        };
        if n == 0 {
            self.peer_closed = true;
            return Err(closed_by_peer());
        }
        self.buffer.extend(&chunk[1..n]);
        Ok(chunk[0])
    }

    fn available(&mut self) -> io::Result<usize> {
        self.fill_nonblocking()?;
        if self.buffer.is_empty() && self.peer_closed {
            return Ok(1);
        }
        Ok(self.buffer.len())
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        self.buffer.clear();
        self.peer_closed = false;
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

/// A scripted, in-memory transport.
///
/// Bytes queued with [`push_bytes`](Self::push_bytes) or
/// [`push_packet`](Self::push_packet) are what the "server" sends; everything
/// the client writes is recorded for inspection.
#[derive(Debug, Default, Clone)]
pub struct MemoryTransport {
    incoming: VecDeque<u8>,
    written: Vec<u8>,
    connected: bool,
    refuse_connects: u32,
    connect_attempts: u32,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` connect attempts with `ConnectionRefused`.
    pub fn refuse_connects(mut self, count: u32) -> Self {
        self.refuse_connects = count;
        self
    }

    /// Queue raw bytes for the client to read.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.incoming.extend(bytes);
        self
    }

    /// Queue one framed packet for the client to read.
    #[allow(clippy::cast_possible_truncation)]
    pub fn push_packet(&mut self, sequence_id: u8, payload: &[u8]) -> &mut Self {
        let header = PacketHeader {
            payload_length: payload.len() as u32,
            sequence_id,
        };
        self.incoming.extend(header.to_bytes());
        self.incoming.extend(payload);
        self
    }

    /// Everything the client has written so far.
    pub fn written(&self) -> &[u8] {
        &self.written
    }

    /// Split the written bytes back into `(sequence_id, payload)` packets.
    pub fn written_packets(&self) -> Vec<(u8, Vec<u8>)> {
        let mut packets = Vec::new();
        let mut rest = self.written.as_slice();
        while rest.len() >= PacketHeader::SIZE {
            let header = PacketHeader::from_bytes(&[rest[0], rest[1], rest[2], rest[3]]);
            let end = (PacketHeader::SIZE + header.payload_length as usize).min(rest.len());
            packets.push((header.sequence_id, rest[PacketHeader::SIZE..end].to_vec()));
            rest = &rest[end..];
        }
        packets
    }

    /// Forget recorded writes.
    pub fn clear_written(&mut self) {
        self.written.clear();
    }

    /// Bytes queued but not yet read.
    pub fn pending(&self) -> usize {
        self.incoming.len()
    }

    /// Number of times `connect` was called.
    pub fn connect_attempts(&self) -> u32 {
        self.connect_attempts
    }
}

impl Transport for MemoryTransport {
    fn connect(&mut self, _host: &str, _port: u16) -> io::Result<()> {
        self.connect_attempts += 1;
        if self.refuse_connects > 0 {
            self.refuse_connects -= 1;
            return Err(io::Error::new(
                ErrorKind::ConnectionRefused,
                "connection refused",
            ));
        }
        self.connected = true;
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        if !self.connected {
            return Err(not_connected());
        }
        self.written.extend_from_slice(bytes);
        Ok(())
    }

    fn read_byte(&mut self) -> io::Result<u8> {
        self.incoming
            .pop_front()
            .ok_or_else(|| io::Error::new(ErrorKind::UnexpectedEof, "script exhausted"))
    }

    fn available(&mut self) -> io::Result<usize> {
        Ok(self.incoming.len())
    }

    fn close(&mut self) {
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
