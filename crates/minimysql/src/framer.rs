//! Packet framing over a [`Transport`].
//!
//! Reads wait for data in a bounded poll loop (`read_attempts` polls spaced
//! `poll_interval` apart) and fail with [`Error::Timeout`] when the budget runs
//! out, including when a packet stops arriving halfway through. The transport
//! hitting end-of-stream mid-packet is a short read and a protocol error.
//!
//! Sequence numbers start at 0 for every command. Each packet read must carry
//! the expected number; the next packet written or read uses the one after it.

#![allow(clippy::cast_possible_truncation)]

use std::fmt::Write as _;
use std::io;
use std::thread;
use std::time::Duration;

use minimysql_core::{
    ConnectionError, ConnectionErrorKind, Error, ProtocolError, Result, Transport,
};
use tracing::trace;

use crate::protocol::writer::build_packet_from_payload;
use crate::protocol::{MAX_PACKET_SIZE, Packet, PacketHeader};

/// Frames packets over a transport and tracks the sequence number.
#[derive(Debug)]
pub struct Framer<T> {
    transport: T,
    sequence_id: u8,
    read_attempts: u32,
    poll_interval: Duration,
}

impl<T: Transport> Framer<T> {
    pub fn new(transport: T, read_attempts: u32, poll_interval: Duration) -> Self {
        Self {
            transport,
            sequence_id: 0,
            read_attempts: read_attempts.max(1),
            poll_interval,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Sequence number the next packet will carry.
    pub fn sequence_id(&self) -> u8 {
        self.sequence_id
    }

    /// Start a new command exchange.
    pub fn reset_sequence(&mut self) {
        self.sequence_id = 0;
    }

    /// Read one packet.
    pub fn read_packet(&mut self) -> Result<Packet> {
        let mut header = [0u8; PacketHeader::SIZE];
        self.read_exact(&mut header)?;
        let header = PacketHeader::from_bytes(&header);

        if header.sequence_id != self.sequence_id {
            return Err(Error::Protocol(ProtocolError {
                message: format!(
                    "Packet out of order: expected sequence {}, got {}",
                    self.sequence_id, header.sequence_id
                ),
                raw_data: Some(header.to_bytes().to_vec()),
                source: None,
            }));
        }
        self.sequence_id = header.sequence_id.wrapping_add(1);

        let mut payload = vec![0u8; header.payload_length as usize];
        self.read_exact(&mut payload)?;

        trace!(
            sequence_id = header.sequence_id,
            len = payload.len(),
            bytes = %hex_dump(&payload),
            "<- packet"
        );

        Ok(Packet {
            sequence_id: header.sequence_id,
            payload,
        })
    }

    /// Frame `payload` with the current sequence number and write it in one pass.
    ///
    /// A payload of `MAX_PACKET_SIZE` bytes or more would need a continuation
    /// packet and is refused.
    pub fn write_packet(&mut self, payload: &[u8]) -> Result<()> {
        if payload.len() >= MAX_PACKET_SIZE {
            return Err(Error::Protocol(ProtocolError {
                message: format!("Payload of {} bytes does not fit one packet", payload.len()),
                raw_data: None,
                source: None,
            }));
        }

        let packet = build_packet_from_payload(payload, self.sequence_id);
        trace!(
            sequence_id = self.sequence_id,
            len = payload.len(),
            bytes = %hex_dump(payload),
            "-> packet"
        );
        self.sequence_id = self.sequence_id.wrapping_add(1);

        self.transport
            .write(&packet)
            .map_err(|e| disconnected("Failed to write packet", e))
    }

    /// Poll until at least one byte is readable.
    fn wait_for_data(&mut self) -> Result<usize> {
        for attempt in 1..=self.read_attempts {
            let ready = self
                .transport
                .available()
                .map_err(|e| disconnected("Failed to poll transport", e))?;
            if ready > 0 {
                return Ok(ready);
            }
            if attempt < self.read_attempts {
                thread::sleep(self.poll_interval);
            }
        }
        Err(Error::Timeout)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let ready = self.wait_for_data()?;
            let end = buf.len().min(filled + ready);
            for slot in &mut buf[filled..end] {
                *slot = self.transport.read_byte().map_err(short_read)?;
            }
            filled = end;
        }
        Ok(())
    }
}

fn short_read(err: io::Error) -> Error {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        Error::Protocol(ProtocolError {
            message: "Short read: stream ended inside a packet".to_string(),
            raw_data: None,
            source: Some(Box::new(err)),
        })
    } else {
        disconnected("Failed to read packet", err)
    }
}

fn disconnected(context: &str, err: io::Error) -> Error {
    Error::Connection(ConnectionError {
        kind: ConnectionErrorKind::Disconnected,
        message: format!("{}: {}", context, err),
        code: None,
        sqlstate: None,
        source: Some(Box::new(err)),
    })
}

/// Space-separated hex, for trace output.
pub(crate) fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{:02x}", b);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;

    fn framer(transport: MemoryTransport) -> Framer<MemoryTransport> {
        let mut framer = Framer::new(transport, 3, Duration::ZERO);
        framer.transport_mut().connect("test", 3306).unwrap();
        framer
    }

    #[test]
    fn test_read_packet_exact_length() {
        let mut transport = MemoryTransport::new();
        transport.push_packet(0, b"hello").push_packet(1, &[]);
        let mut framer = framer(transport);

        let packet = framer.read_packet().unwrap();
        assert_eq!(packet.sequence_id, 0);
        assert_eq!(packet.payload, b"hello");

        let empty = framer.read_packet().unwrap();
        assert!(empty.payload.is_empty());
        assert_eq!(framer.sequence_id(), 2);
    }

    #[test]
    fn test_read_packet_times_out_without_data() {
        let mut framer = framer(MemoryTransport::new());
        assert!(matches!(framer.read_packet(), Err(Error::Timeout)));
    }

    #[test]
    fn test_read_packet_times_out_on_partial_payload() {
        let mut transport = MemoryTransport::new();
        // Header claims 10 bytes, only 3 arrive
        transport.push_bytes(&[0x0A, 0x00, 0x00, 0x00, 1, 2, 3]);
        let mut framer = framer(transport);
        assert!(matches!(framer.read_packet(), Err(Error::Timeout)));
    }

    /// Claims data is ready, then hits end-of-stream.
    struct ClosingTransport;

    impl Transport for ClosingTransport {
        fn connect(&mut self, _host: &str, _port: u16) -> io::Result<()> {
            Ok(())
        }
        fn write(&mut self, _bytes: &[u8]) -> io::Result<()> {
            Ok(())
        }
        fn read_byte(&mut self) -> io::Result<u8> {
            Err(io::ErrorKind::UnexpectedEof.into())
        }
        fn available(&mut self) -> io::Result<usize> {
            Ok(4)
        }
        fn close(&mut self) {}
        fn is_connected(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_short_read_is_protocol_error() {
        let mut framer = Framer::new(ClosingTransport, 1, Duration::ZERO);
        assert!(matches!(framer.read_packet(), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_sequence_mismatch() {
        let mut transport = MemoryTransport::new();
        transport.push_packet(5, b"late");
        let mut framer = framer(transport);

        match framer.read_packet() {
            Err(Error::Protocol(e)) => assert!(e.message.contains("expected sequence 0")),
            other => panic!("expected protocol error, got {other:?}"),
        }
    }

    #[test]
    fn test_write_packet_advances_sequence() {
        let mut transport = MemoryTransport::new();
        transport.push_packet(1, b"ok");
        let mut framer = framer(transport);

        framer.write_packet(&[0x03, b'S']).unwrap();
        assert_eq!(framer.sequence_id(), 1);
        framer.read_packet().unwrap();
        framer.write_packet(&[0x0e]).unwrap();

        assert_eq!(
            framer.transport().written(),
            &[0x02, 0x00, 0x00, 0x00, 0x03, b'S', 0x01, 0x00, 0x00, 0x02, 0x0e]
        );

        framer.reset_sequence();
        assert_eq!(framer.sequence_id(), 0);
    }

    #[test]
    fn test_write_packet_refuses_continuation_length() {
        let mut framer = framer(MemoryTransport::new());
        let payload = vec![0u8; MAX_PACKET_SIZE];
        assert!(matches!(
            framer.write_packet(&payload),
            Err(Error::Protocol(_))
        ));
        assert!(framer.transport().written().is_empty());
        assert_eq!(framer.sequence_id(), 0);
    }

    #[test]
    fn test_hex_dump() {
        assert_eq!(hex_dump(&[0x00, 0xAB, 0x7F]), "00 ab 7f");
        assert_eq!(hex_dump(&[]), "");
    }
}
