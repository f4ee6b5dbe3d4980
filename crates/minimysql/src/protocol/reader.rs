//! MySQL packet reading utilities.
//!
//! A cursor over one packet payload. Fixed-width integers are little-endian;
//! variable-size values go through the length-coded codec in
//! [`lenenc`](super::lenenc).

use crate::protocol::lenenc::{self, LengthCoded};
use crate::protocol::{EofPacket, ErrPacket, OkPacket};

/// A reader for MySQL protocol data.
#[derive(Debug, Clone)]
pub struct PacketReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PacketReader<'a> {
    /// Create a new reader from a byte slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current offset into the payload.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Get remaining bytes in the buffer.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Check if we've reached the end of the data.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Peek at the next byte without advancing.
    pub fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    /// Read a single byte.
    pub fn read_u8(&mut self) -> Option<u8> {
        let byte = self.data.get(self.pos)?;
        self.pos += 1;
        Some(*byte)
    }

    /// Read a u16 (little-endian).
    pub fn read_u16_le(&mut self) -> Option<u16> {
        let bytes = self.read_array::<2>()?;
        Some(u16::from_le_bytes(bytes))
    }

    /// Read a u32 (little-endian).
    pub fn read_u32_le(&mut self) -> Option<u32> {
        let bytes = self.read_array::<4>()?;
        Some(u32::from_le_bytes(bytes))
    }

    fn read_array<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Some(out)
    }

    /// Read a length-coded integer, keeping the NULL marker distinct.
    pub fn read_lenenc(&mut self) -> Option<LengthCoded> {
        let (value, consumed) = lenenc::read_lenenc_int(self.data, self.pos)?;
        self.pos += consumed;
        Some(value)
    }

    /// Read a length-coded integer. The NULL marker reads as `None`.
    pub fn read_lenenc_int(&mut self) -> Option<u64> {
        match self.read_lenenc()? {
            LengthCoded::Value(v) => Some(v),
            LengthCoded::Null => None,
        }
    }

    /// Read one column value: `Some(None)` for SQL NULL, `None` if truncated.
    pub fn read_lenenc_value(&mut self) -> Option<Option<&'a [u8]>> {
        let (value, next) = lenenc::read_lenenc_bytes(self.data, self.pos)?;
        self.pos = next;
        Some(value)
    }

    /// Read a length-coded string. NULL is rejected.
    pub fn read_lenenc_string(&mut self) -> Option<String> {
        let bytes = self.read_lenenc_value()??;
        Some(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Skip over a length-coded string without materializing it.
    pub fn skip_lenenc_string(&mut self) -> bool {
        self.read_lenenc_value().is_some()
    }

    /// Read a null-terminated string.
    ///
    /// Returns `None` when no terminator is present.
    pub fn read_null_string(&mut self) -> Option<String> {
        let rest = &self.data[self.pos.min(self.data.len())..];
        let end = rest.iter().position(|&b| b == 0)?;
        let s = String::from_utf8_lossy(&rest[..end]).into_owned();
        self.pos += end + 1;
        Some(s)
    }

    /// Read a fixed-length string.
    pub fn read_string(&mut self, len: usize) -> Option<String> {
        let bytes = self.read_bytes(len)?;
        Some(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Read remaining data as a string.
    pub fn read_rest_string(&mut self) -> String {
        String::from_utf8_lossy(self.read_rest()).into_owned()
    }

    /// Read a fixed number of bytes.
    pub fn read_bytes(&mut self, len: usize) -> Option<&'a [u8]> {
        if self.remaining() < len {
            return None;
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Some(bytes)
    }

    /// Read remaining bytes.
    pub fn read_rest(&mut self) -> &'a [u8] {
        let rest = &self.data[self.pos.min(self.data.len())..];
        self.pos = self.data.len();
        rest
    }

    /// Skip a number of bytes.
    pub fn skip(&mut self, n: usize) -> bool {
        if self.remaining() >= n {
            self.pos += n;
            true
        } else {
            false
        }
    }

    /// Parse an OK packet from the current position.
    ///
    /// OK packet format:
    /// - 0x00 header
    /// - affected_rows: lenenc int
    /// - last_insert_id: lenenc int
    /// - status_flags: 2 bytes
    /// - warnings: 2 bytes
    /// - info: rest of packet (optional)
    pub fn parse_ok_packet(&mut self) -> Option<OkPacket> {
        if self.peek() == Some(0x00) {
            self.skip(1);
        }

        let affected_rows = self.read_lenenc_int()?;
        let last_insert_id = self.read_lenenc_int()?;
        let status_flags = self.read_u16_le()?;
        let warnings = self.read_u16_le()?;
        let info = self.read_rest_string();

        Some(OkPacket {
            affected_rows,
            last_insert_id,
            status_flags,
            warnings,
            info,
        })
    }

    /// Parse an Error packet from the current position.
    ///
    /// ERR packet format:
    /// - 0xFF header
    /// - error_code: 2 bytes
    /// - '#' marker
    /// - sql_state: 5 bytes
    /// - error_message: rest of packet
    pub fn parse_err_packet(&mut self) -> Option<ErrPacket> {
        if self.peek() == Some(0xFF) {
            self.skip(1);
        }

        let error_code = self.read_u16_le()?;

        // Pre-4.1 servers omit the marker and state
        let sql_state = if self.peek() == Some(b'#') {
            self.skip(1);
            self.read_string(5)?
        } else {
            String::new()
        };

        let error_message = self.read_rest_string();

        Some(ErrPacket {
            error_code,
            sql_state,
            error_message,
        })
    }

    /// Parse an EOF packet from the current position.
    ///
    /// EOF packet format:
    /// - 0xFE header
    /// - warnings: 2 bytes
    /// - status_flags: 2 bytes
    pub fn parse_eof_packet(&mut self) -> Option<EofPacket> {
        if self.peek() == Some(0xFE) {
            self.skip(1);
        }

        let warnings = self.read_u16_le()?;
        let status_flags = self.read_u16_le()?;

        Some(EofPacket {
            warnings,
            status_flags,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_fixed_width() {
        let mut reader = PacketReader::new(&[0x42, 0x34, 0x12, 0x78, 0x56, 0x34, 0x12]);
        assert_eq!(reader.read_u8(), Some(0x42));
        assert_eq!(reader.read_u16_le(), Some(0x1234));
        assert_eq!(reader.read_u32_le(), Some(0x1234_5678));
        assert_eq!(reader.read_u8(), None);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_read_lenenc_int() {
        let mut reader = PacketReader::new(&[0x42, 0xFC, 0x34, 0x12, 0xFB]);
        assert_eq!(reader.read_lenenc_int(), Some(0x42));
        assert_eq!(reader.read_lenenc_int(), Some(0x1234));
        assert_eq!(reader.position(), 4);
        assert_eq!(reader.read_lenenc_int(), None);
    }

    #[test]
    fn test_read_null_string() {
        let mut reader = PacketReader::new(b"hello\0world\0tail");
        assert_eq!(reader.read_null_string(), Some("hello".to_string()));
        assert_eq!(reader.read_null_string(), Some("world".to_string()));
        assert_eq!(reader.read_null_string(), None);
        assert_eq!(reader.read_rest(), b"tail");
    }

    #[test]
    fn test_read_lenenc_values() {
        let data = [0x05, b'h', b'e', b'l', b'l', b'o', 0xFB, 0x00];
        let mut reader = PacketReader::new(&data);
        assert_eq!(reader.read_lenenc_value(), Some(Some(&b"hello"[..])));
        assert_eq!(reader.read_lenenc_value(), Some(None));
        assert_eq!(reader.read_lenenc_string(), Some(String::new()));
        assert_eq!(reader.read_lenenc_value(), None);
    }

    #[test]
    fn test_parse_ok_packet() {
        // affected_rows=1, last_insert_id=42, status=2, warnings=0
        let data = [0x00, 0x01, 0x2A, 0x02, 0x00, 0x00, 0x00];
        let ok = PacketReader::new(&data).parse_ok_packet().unwrap();
        assert_eq!(ok.affected_rows, 1);
        assert_eq!(ok.last_insert_id, 42);
        assert_eq!(ok.status_flags, 2);
        assert_eq!(ok.warnings, 0);
        assert!(ok.info.is_empty());
    }

    #[test]
    fn test_parse_ok_packet_wide_counts() {
        // affected_rows uses the 3-byte escape; message trails
        let mut data = vec![0x00, 0xFD, 0x40, 0x42, 0x0F, 0xFC, 0x00, 0x01];
        data.extend_from_slice(&[0x22, 0x00, 0x01, 0x00]);
        data.extend_from_slice(b"Rows matched: 1000000");
        let ok = PacketReader::new(&data).parse_ok_packet().unwrap();
        assert_eq!(ok.affected_rows, 1_000_000);
        assert_eq!(ok.last_insert_id, 256);
        assert_eq!(ok.status_flags, 0x22);
        assert_eq!(ok.warnings, 1);
        assert_eq!(ok.info, "Rows matched: 1000000");
    }

    #[test]
    fn test_parse_err_packet() {
        let mut data = vec![0xFF, 0x15, 0x04, b'#'];
        data.extend_from_slice(b"28000");
        data.extend_from_slice(b"Access denied");
        let err = PacketReader::new(&data).parse_err_packet().unwrap();
        assert_eq!(err.error_code, 1045);
        assert_eq!(err.sql_state, "28000");
        assert_eq!(err.error_message, "Access denied");
    }

    #[test]
    fn test_parse_eof_packet() {
        let data = [0xFE, 0x01, 0x00, 0x22, 0x00];
        let eof = PacketReader::new(&data).parse_eof_packet().unwrap();
        assert_eq!(eof.warnings, 1);
        assert_eq!(eof.status_flags, 0x22);
    }
}
