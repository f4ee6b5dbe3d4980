//! Length-coded binary (LCB) codec.
//!
//! MySQL prefixes variable-size values with a length-coded integer:
//!
//! | first byte    | meaning                               | width |
//! |---------------|---------------------------------------|-------|
//! | `0x00..=0xFA` | the value itself                      | 1     |
//! | `0xFB`        | NULL column (length-coded strings)    | 1     |
//! | `0xFC`        | 2-byte little-endian integer follows  | 3     |
//! | `0xFD`        | 3-byte little-endian integer follows  | 4     |
//! | `0xFE`        | 8-byte little-endian integer follows  | 9     |
//!
//! `0xFF` never starts a length-coded value; it introduces an ERR packet.
//! Widths include the marker byte.

#![allow(clippy::cast_possible_truncation)]

/// Marker for a NULL column value.
pub const NULL_MARKER: u8 = 0xFB;
/// Marker for a 2-byte integer.
pub const U16_MARKER: u8 = 0xFC;
/// Marker for a 3-byte integer.
pub const U24_MARKER: u8 = 0xFD;
/// Marker for an 8-byte integer.
pub const U64_MARKER: u8 = 0xFE;

/// A decoded length-coded integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthCoded {
    /// The `0xFB` NULL marker.
    Null,
    /// A plain value.
    Value(u64),
}

/// Total encoded width (marker included) of the value starting with `first`.
pub fn lcb_width(first: u8) -> usize {
    match first {
        U16_MARKER => 3,
        U24_MARKER => 4,
        U64_MARKER => 9,
        _ => 1,
    }
}

/// Decode a length-coded integer at `offset`.
///
/// Returns the decoded value and the number of bytes consumed, or `None` when
/// the buffer is truncated or the first byte is `0xFF`.
pub fn read_lenenc_int(buf: &[u8], offset: usize) -> Option<(LengthCoded, usize)> {
    let first = *buf.get(offset)?;
    match first {
        0x00..=0xFA => Some((LengthCoded::Value(u64::from(first)), 1)),
        NULL_MARKER => Some((LengthCoded::Null, 1)),
        0xFF => None,
        U16_MARKER | U24_MARKER | U64_MARKER => {
            let width = lcb_width(first);
            let bytes = buf.get(offset + 1..offset + width)?;
            let value = bytes
                .iter()
                .rev()
                .fold(0u64, |acc, &b| (acc << 8) | u64::from(b));
            Some((LengthCoded::Value(value), width))
        }
    }
}

/// Decode a length-coded string at `offset`.
///
/// Returns the raw string bytes (`None` for a NULL column) and the offset just
/// past the string, or `None` when the buffer is truncated.
pub fn read_lenenc_bytes(buf: &[u8], offset: usize) -> Option<(Option<&[u8]>, usize)> {
    let (len, consumed) = read_lenenc_int(buf, offset)?;
    let start = offset + consumed;
    match len {
        LengthCoded::Null => Some((None, start)),
        LengthCoded::Value(len) => {
            let len = usize::try_from(len).ok()?;
            let end = start.checked_add(len)?;
            let bytes = buf.get(start..end)?;
            Some((Some(bytes), end))
        }
    }
}

/// Append the minimal-width encoding of `value` to `out`.
pub fn write_lenenc_int(out: &mut Vec<u8>, value: u64) {
    if value < 251 {
        out.push(value as u8);
    } else if value < 0x1_0000 {
        out.push(U16_MARKER);
        out.extend_from_slice(&(value as u16).to_le_bytes());
    } else if value < 0x100_0000 {
        out.push(U24_MARKER);
        out.extend_from_slice(&(value as u32).to_le_bytes()[..3]);
    } else {
        out.push(U64_MARKER);
        out.extend_from_slice(&value.to_le_bytes());
    }
}

/// Minimal-width encoding of `value`.
pub fn encode_lenenc_int(value: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(9);
    write_lenenc_int(&mut out, value);
    out
}
