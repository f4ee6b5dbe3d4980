//! Server greeting and client login packets.
//!
//! Greeting payload (protocol 10):
//!
//! ```text
//! 1   protocol version (0x0a)
//! N   server version, NUL-terminated
//! 4   thread id
//! 8   seed, part 1
//! 1   filler (0x00)
//! 2   capability flags, lower half
//! 1   server language
//! 2   status flags
//! 2   capability flags, upper half
//! 1   seed length
//! 10  reserved
//! 12  seed, part 2
//! 1   0x00
//! ```
//!
//! The login packet answers with the client flags, the user name and the
//! scramble computed from the 20-byte seed.

use minimysql_core::{ConnectionError, ConnectionErrorKind, Error, Result};

use crate::auth::{self, SCRAMBLE_LENGTH};
use crate::config::MySqlConfig;
use crate::connection::protocol_error;
use crate::protocol::{PacketReader, PacketWriter, SCRAMBLE_LEN};

/// The only greeting layout this client understands.
pub const PROTOCOL_VERSION: u8 = 10;

const SEED_PART1_LEN: usize = 8;
const SEED_PART2_LEN: usize = SCRAMBLE_LENGTH - SEED_PART1_LEN;
const RESERVED_LEN: usize = 10;
const LOGIN_RESERVED_LEN: usize = 23;

/// What the server told us in its greeting.
///
/// Consumed to build the login packet; only the version string outlives
/// the handshake.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct HandshakeInfo {
    pub protocol_version: u8,
    pub server_version: String,
    /// Connection (thread) id assigned by the server
    pub thread_id: u32,
    /// Scramble seed: part 1 followed by part 2
    pub seed: [u8; SCRAMBLE_LENGTH],
    pub capabilities: u32,
    /// Server default character set
    pub charset: u8,
    pub status_flags: u16,
}

impl HandshakeInfo {
    /// Decode a greeting payload.
    ///
    /// A server that refuses the client outright (host not allowed, too many
    /// connections) sends an ERR packet instead; that is reported as a
    /// connect failure carrying the server's code and message.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let mut reader = PacketReader::new(payload);

        let protocol_version = reader
            .read_u8()
            .ok_or_else(|| protocol_error("Empty server greeting"))?;

        if protocol_version == 0xFF {
            let err = PacketReader::new(payload)
                .parse_err_packet()
                .ok_or_else(|| protocol_error("Invalid error packet in greeting"))?;
            return Err(Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Connect,
                message: format!("Server refused connection: {}", err.error_message),
                code: Some(err.error_code),
                sqlstate: (!err.sql_state.is_empty()).then_some(err.sql_state),
                source: None,
            }));
        }

        if protocol_version != PROTOCOL_VERSION {
            return Err(protocol_error(format!(
                "Unsupported protocol version: {}",
                protocol_version
            )));
        }

        let server_version = reader
            .read_null_string()
            .ok_or_else(|| protocol_error("Unterminated server version"))?;

        let thread_id = reader
            .read_u32_le()
            .ok_or_else(|| protocol_error("Missing thread id"))?;

        let mut seed = [0u8; SCRAMBLE_LENGTH];
        let part1 = reader
            .read_bytes(SEED_PART1_LEN)
            .ok_or_else(|| protocol_error("Missing seed (part 1)"))?;
        seed[..SEED_PART1_LEN].copy_from_slice(part1);

        let truncated = || protocol_error("Truncated server greeting");

        // Filler
        if !reader.skip(1) {
            return Err(truncated());
        }

        let caps_lower = reader.read_u16_le().ok_or_else(truncated)?;
        let charset = reader.read_u8().ok_or_else(truncated)?;
        let status_flags = reader.read_u16_le().ok_or_else(truncated)?;
        let caps_upper = reader.read_u16_le().ok_or_else(truncated)?;
        let capabilities = u32::from(caps_lower) | (u32::from(caps_upper) << 16);

        // Seed length, then the reserved block
        if !reader.skip(1 + RESERVED_LEN) {
            return Err(truncated());
        }

        let part2 = reader
            .read_bytes(SEED_PART2_LEN)
            .ok_or_else(|| protocol_error("Missing seed (part 2)"))?;
        seed[SEED_PART1_LEN..].copy_from_slice(part2);

        Ok(Self {
            protocol_version,
            server_version,
            thread_id,
            seed,
            capabilities,
            charset,
            status_flags,
        })
    }
}

/// Build the login packet payload for `handshake`.
///
/// The auth response is `0x14` followed by the scramble, or a single `0x00`
/// when no password is configured. The database field is always present: an
/// empty string unless a database was configured.
pub fn build_login_payload(config: &MySqlConfig, handshake: &HandshakeInfo) -> Vec<u8> {
    let mut writer = PacketWriter::with_capacity(64 + config.user.len());

    writer.write_u32_le(config.capability_flags());
    writer.write_u32_le(config.max_packet_size);
    writer.write_u8(config.charset);
    writer.write_zeros(LOGIN_RESERVED_LEN);
    writer.write_null_string(&config.user);

    let password = config.password.as_deref().unwrap_or("");
    match auth::scramble_password(password, &handshake.seed) {
        Some(scramble) => {
            writer.write_u8(SCRAMBLE_LEN);
            writer.write_bytes(&scramble);
        }
        None => writer.write_u8(0),
    }

    writer.write_null_string(config.database.as_deref().unwrap_or(""));

    writer.into_bytes()
}
