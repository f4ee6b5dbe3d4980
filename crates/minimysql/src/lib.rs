//! Minimal blocking MySQL client.
//!
//! This crate speaks the MySQL client/server protocol (4.1 and later) over any
//! byte stream implementing [`Transport`]. It provides:
//!
//! - Packet framing with sequence numbers and a bounded read wait
//! - Handshake and `mysql_native_password` authentication
//! - Text-protocol queries with lazy field and row iteration
//! - The length-coded integer/string codec used throughout the protocol
//!
//! # MySQL Protocol Overview
//!
//! MySQL uses a packet-based protocol with:
//! - 3-byte payload length + 1-byte sequence number header
//! - Request/response pairing via sequence numbers
//! - Result sets as field packets and row packets, each run closed by a
//!   5-byte EOF marker
//!
//! # Example
//!
//! ```rust,ignore
//! use minimysql::{MySqlConfig, MySqlConnection, QueryOutcome};
//!
//! let config = MySqlConfig::new()
//!     .host("10.0.1.20")
//!     .user("sensor")
//!     .password("secret")
//!     .database("readings");
//!
//! let mut conn = MySqlConnection::open(config)?;
//! if let QueryOutcome::ResultAvailable { .. } = conn.execute(b"SELECT id, temp FROM t")? {
//!     while let Some(field) = conn.next_field()? {
//!         println!("column {}", field.name);
//!     }
//!     while let Some(mut row) = conn.next_row()? {
//!         println!("{:?}", row.values()?);
//!     }
//! }
//! conn.close();
//! ```

pub mod auth;
pub mod config;
pub mod connection;
pub mod framer;
pub mod handshake;
pub mod protocol;
pub mod row;
pub mod transport;
pub mod types;

pub use config::MySqlConfig;
pub use connection::{ConnectionState, MySqlConnection, QueryOutcome};
pub use framer::Framer;
pub use handshake::HandshakeInfo;
pub use minimysql_core::{Error, Result, Transport};
pub use protocol::{EofPacket, ErrPacket, OkPacket, Packet};
pub use row::{QueryResult, ResultSet, Row};
pub use transport::{MemoryTransport, TcpTransport};
pub use types::{FieldDescriptor, FieldType};
