//! MySQL packet writing utilities.
//!
//! Payloads are assembled in a growable buffer sized for the packet at hand,
//! then framed with the 4-byte header in one allocation.

#![allow(clippy::cast_possible_truncation)]

use crate::protocol::{MAX_PACKET_SIZE, PacketHeader, lenenc};

/// A writer for MySQL protocol data.
#[derive(Debug, Default)]
pub struct PacketWriter {
    buffer: Vec<u8>,
}

impl PacketWriter {
    /// Create a new writer with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    /// Create a new writer with specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Get the current buffer length.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Get the buffer as a byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Consume the writer and return the buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Write a single byte.
    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    /// Write a u16 (little-endian).
    pub fn write_u16_le(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Write a u32 (little-endian).
    pub fn write_u32_le(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Write a length-encoded integer (minimal width).
    pub fn write_lenenc_int(&mut self, value: u64) {
        lenenc::write_lenenc_int(&mut self.buffer, value);
    }

    /// Write a length-encoded byte slice.
    pub fn write_lenenc_bytes(&mut self, data: &[u8]) {
        self.write_lenenc_int(data.len() as u64);
        self.buffer.extend_from_slice(data);
    }

    /// Write a null-terminated string.
    pub fn write_null_string(&mut self, s: &str) {
        self.buffer.extend_from_slice(s.as_bytes());
        self.buffer.push(0);
    }

    /// Write raw bytes.
    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Write zeros (padding).
    pub fn write_zeros(&mut self, count: usize) {
        self.buffer.resize(self.buffer.len() + count, 0);
    }

    /// Build a complete packet with header and payload.
    ///
    /// The payload must already be known to fit a single packet.
    pub fn build_packet(&self, sequence_id: u8) -> Vec<u8> {
        build_packet_from_payload(&self.buffer, sequence_id)
    }
}

/// Frame `payload` as a single packet.
pub fn build_packet_from_payload(payload: &[u8], sequence_id: u8) -> Vec<u8> {
    debug_assert!(payload.len() < MAX_PACKET_SIZE);

    let header = PacketHeader {
        payload_length: payload.len() as u32,
        sequence_id,
    };
    let mut packet = Vec::with_capacity(PacketHeader::SIZE + payload.len());
    packet.extend_from_slice(&header.to_bytes());
    packet.extend_from_slice(payload);
    packet
}

/// Helper to build a command payload: the command byte followed by its argument.
pub fn build_command_payload(command: u8, argument: &[u8]) -> Vec<u8> {
    let mut writer = PacketWriter::with_capacity(1 + argument.len());
    writer.write_u8(command);
    writer.write_bytes(argument);
    writer.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_fixed_width() {
        let mut writer = PacketWriter::new();
        writer.write_u8(0x42);
        writer.write_u16_le(0x1234);
        writer.write_u32_le(0x1234_5678);
        assert_eq!(
            writer.as_bytes(),
            &[0x42, 0x34, 0x12, 0x78, 0x56, 0x34, 0x12]
        );
    }

    #[test]
    fn test_write_lenenc_int() {
        let mut writer = PacketWriter::new();
        writer.write_lenenc_int(0x42);
        writer.write_lenenc_int(0xFB);
        assert_eq!(writer.as_bytes(), &[0x42, 0xFC, 0xFB, 0x00]);
    }

    #[test]
    fn test_write_null_string_and_zeros() {
        let mut writer = PacketWriter::new();
        writer.write_null_string("root");
        writer.write_zeros(3);
        assert_eq!(writer.as_bytes(), b"root\0\0\0\0");
    }

    #[test]
    fn test_write_lenenc_bytes() {
        let mut writer = PacketWriter::new();
        writer.write_lenenc_bytes(b"hello");
        assert_eq!(writer.as_bytes(), &[0x05, b'h', b'e', b'l', b'l', b'o']);
    }

    #[test]
    fn test_build_packet() {
        let mut writer = PacketWriter::new();
        writer.write_bytes(b"hello");
        let packet = writer.build_packet(1);
        assert_eq!(&packet[..4], &[0x05, 0x00, 0x00, 0x01]);
        assert_eq!(&packet[4..], b"hello");
    }

    #[test]
    fn test_build_command_payload() {
        let payload = build_command_payload(0x03, b"SELECT 1");
        assert_eq!(payload, b"\x03SELECT 1");

        let packet = build_packet_from_payload(&payload, 0);
        assert_eq!(&packet[..4], &[0x09, 0x00, 0x00, 0x00]);
    }
}
