//! MySQL connection implementation.
//!
//! A [`MySqlConnection`] owns one transport session and drives the protocol
//! state machine:
//!
//! ```text
//! Disconnected -> Connecting -> HandshakeReceived -> AuthSent -> Authenticated
//!                                                            \-> Rejected
//! ```
//!
//! Commands are strictly half-duplex: one request, then its whole response.
//! After [`execute`](MySqlConnection::execute) reports a result set the caller
//! must drain [`next_field`](MySqlConnection::next_field) until it returns
//! `None`, then [`next_row`](MySqlConnection::next_row) until it returns
//! `None`, before issuing the next command. The decoder does not enforce that
//! order.

// MySQL protocol uses well-defined packet sizes that fit in u32 (max 16MB)
#![allow(clippy::cast_possible_truncation)]

use std::io::Write;
use std::thread;

use minimysql_core::error::{
    ConnectionError, ConnectionErrorKind, ProtocolError, QueryError, QueryErrorKind,
};
use minimysql_core::{Error, Result, Transport};
use tracing::{debug, info, warn};

use crate::auth::MYSQL_NATIVE_PASSWORD;
use crate::config::MySqlConfig;
use crate::framer::Framer;
use crate::handshake::{self, HandshakeInfo};
use crate::protocol::writer::build_command_payload;
use crate::protocol::{
    Command, ErrPacket, MAX_PACKET_SIZE, OkPacket, Packet, PacketReader, PacketType,
};
use crate::row::{QueryResult, ResultSet, Row};
use crate::transport::TcpTransport;
use crate::types::FieldDescriptor;

/// Connection state in the MySQL protocol state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ConnectionState {
    /// Not connected
    Disconnected,
    /// Transport connect in progress
    Connecting,
    /// Server greeting parsed
    HandshakeReceived,
    /// Login packet sent, awaiting the verdict
    AuthSent,
    /// Ready for commands
    Authenticated,
    /// Server refused the credentials
    Rejected,
}

/// What the first response packet to a query said.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    /// A result set follows with this many columns
    ResultAvailable { column_count: usize },
    /// The statement completed without a result set
    NoResult(OkPacket),
}

/// MySQL connection.
///
/// Owns its transport and configuration; no state is shared between
/// connections.
pub struct MySqlConnection<T: Transport = TcpTransport> {
    framer: Framer<T>,
    config: MySqlConfig,
    state: ConnectionState,
    /// Server version string, kept after login for diagnostics
    server_version: Option<String>,
    connection_id: u32,
    /// Columns in the pending result set
    column_count: usize,
    status_flags: u16,
    affected_rows: u64,
    last_insert_id: u64,
    warnings: u16,
}

impl<T: Transport> std::fmt::Debug for MySqlConnection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlConnection")
            .field("state", &self.state)
            .field("connection_id", &self.connection_id)
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("database", &self.config.database)
            .finish_non_exhaustive()
    }
}

impl MySqlConnection<TcpTransport> {
    /// Connect to a server over TCP and log in.
    pub fn open(config: MySqlConfig) -> Result<Self> {
        let mut conn = Self::new(TcpTransport::new(), config);
        conn.connect()?;
        Ok(conn)
    }
}

impl<T: Transport> MySqlConnection<T> {
    /// Wrap `transport`. Nothing is sent until [`connect`](Self::connect).
    pub fn new(transport: T, config: MySqlConfig) -> Self {
        let framer = Framer::new(transport, config.read_attempts, config.read_poll_interval);
        Self {
            framer,
            config,
            state: ConnectionState::Disconnected,
            server_version: None,
            connection_id: 0,
            column_count: 0,
            status_flags: 0,
            affected_rows: 0,
            last_insert_id: 0,
            warnings: 0,
        }
    }

    /// Open the transport and log in.
    ///
    /// The transport connect is retried `connect_attempts` times; the login
    /// itself is not. On any failure the transport is closed again.
    pub fn connect(&mut self) -> Result<()> {
        if self.framer.transport().is_connected() {
            return Err(connection_error(
                ConnectionErrorKind::Connect,
                "Already connected; close the connection first",
            ));
        }
        self.config.validate()?;

        self.state = ConnectionState::Connecting;
        let result = self.open_transport().and_then(|()| self.login());

        if result.is_err() {
            self.framer.transport_mut().close();
            if self.state != ConnectionState::Rejected {
                self.state = ConnectionState::Disconnected;
            }
        }
        result
    }

    fn open_transport(&mut self) -> Result<()> {
        let attempts = self.config.connect_attempts;
        let mut last_err = None;

        for attempt in 1..=attempts {
            if attempt > 1 {
                thread::sleep(self.config.connect_retry_delay);
            }
            debug!(
                host = %self.config.host,
                port = self.config.port,
                attempt,
                "Connecting to MySQL"
            );
            match self
                .framer
                .transport_mut()
                .connect(&self.config.host, self.config.port)
            {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(attempt, attempts, error = %e, "Connect attempt failed");
                    last_err = Some(e);
                }
            }
        }

        Err(Error::Connection(ConnectionError {
            kind: ConnectionErrorKind::Connect,
            message: format!(
                "Could not connect to {} after {} attempts",
                self.config.socket_addr(),
                attempts
            ),
            code: None,
            sqlstate: None,
            source: last_err
                .map(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
        }))
    }

    fn login(&mut self) -> Result<()> {
        self.framer.reset_sequence();
        let greeting = self.framer.read_packet()?;
        let handshake = HandshakeInfo::parse(&greeting.payload)?;
        self.state = ConnectionState::HandshakeReceived;
        debug!(
            server_version = %handshake.server_version,
            thread_id = handshake.thread_id,
            capabilities = handshake.capabilities,
            "Server greeting"
        );

        let login = handshake::build_login_payload(&self.config, &handshake);
        self.framer.write_packet(&login)?;
        self.state = ConnectionState::AuthSent;
        debug!(
            user = %self.config.user,
            auth_plugin = MYSQL_NATIVE_PASSWORD,
            "Login sent"
        );

        let response = self.framer.read_packet()?;
        match response.kind() {
            PacketType::Ok => {
                let ok = parse_ok(&response)?;
                self.record_ok(&ok);
                self.state = ConnectionState::Authenticated;
                self.connection_id = handshake.thread_id;
                info!(
                    server_version = %handshake.server_version,
                    connection_id = handshake.thread_id,
                    user = %self.config.user,
                    "Connected to MySQL"
                );
                self.server_version = Some(handshake.server_version);
                Ok(())
            }
            PacketType::Error => {
                let err = parse_err(&response)?;
                self.state = ConnectionState::Rejected;
                warn!(
                    code = err.error_code,
                    sqlstate = %err.sql_state,
                    "Authentication failed: {}",
                    err.error_message
                );
                Err(auth_error(&err))
            }
            _ => Err(protocol_error_with_data(
                "Unexpected packet in reply to login",
                &response.payload,
            )),
        }
    }

    /// Send a query.
    ///
    /// Returns the column count when a result set follows, or the OK packet
    /// when the statement produced none. A server error is returned as
    /// [`Error::Query`] carrying errno, SQLSTATE and message.
    pub fn execute(&mut self, query: &[u8]) -> Result<QueryOutcome> {
        self.ensure_authenticated()?;

        if query.len() > self.config.max_query_size || query.len() + 1 >= MAX_PACKET_SIZE {
            return Err(too_large_error(query.len(), self.config.max_query_size));
        }

        self.framer.reset_sequence();
        self.framer
            .write_packet(&build_command_payload(Command::Query as u8, query))?;

        let response = self.framer.read_packet()?;
        match response.kind() {
            PacketType::Ok => {
                let ok = parse_ok(&response)?;
                self.record_ok(&ok);
                self.column_count = 0;
                Ok(QueryOutcome::NoResult(ok))
            }
            PacketType::Error => {
                let err = parse_err(&response)?;
                warn!(
                    code = err.error_code,
                    sqlstate = %err.sql_state,
                    "Query failed: {}",
                    err.error_message
                );
                Err(query_error(&err, Some(query)))
            }
            PacketType::Eof | PacketType::Data => {
                let column_count = PacketReader::new(&response.payload)
                    .read_lenenc_int()
                    .and_then(|n| usize::try_from(n).ok())
                    .filter(|&n| n > 0)
                    .ok_or_else(|| {
                        protocol_error_with_data("Invalid result set header", &response.payload)
                    })?;
                self.column_count = column_count;
                debug!(column_count, "Result set");
                Ok(QueryOutcome::ResultAvailable { column_count })
            }
        }
    }

    /// Read the next field descriptor, or `None` at the end-of-fields marker.
    pub fn next_field(&mut self) -> Result<Option<FieldDescriptor>> {
        let packet = self.framer.read_packet()?;
        match packet.kind() {
            PacketType::Eof => {
                self.record_eof(&packet)?;
                Ok(None)
            }
            PacketType::Error => Err(query_error(&parse_err(&packet)?, None)),
            _ => FieldDescriptor::parse(&packet.payload)
                .map(Some)
                .ok_or_else(|| {
                    protocol_error_with_data("Malformed field packet", &packet.payload)
                }),
        }
    }

    /// Read the next row, or `None` at the end-of-rows marker.
    pub fn next_row(&mut self) -> Result<Option<Row>> {
        let packet = self.framer.read_packet()?;
        match packet.kind() {
            PacketType::Eof => {
                self.record_eof(&packet)?;
                Ok(None)
            }
            PacketType::Error => Err(query_error(&parse_err(&packet)?, None)),
            // A row may start with 0x00 (a zero-length first column)
            PacketType::Ok | PacketType::Data => {
                Ok(Some(Row::new(packet.payload, self.column_count)))
            }
        }
    }

    /// Run `sql` and buffer the whole result.
    pub fn query(&mut self, sql: &str) -> Result<QueryResult> {
        match self.execute(sql.as_bytes())? {
            QueryOutcome::NoResult(ok) => Ok(QueryResult::Done(ok)),
            QueryOutcome::ResultAvailable { column_count } => {
                let mut set = ResultSet::default();
                while let Some(field) = self.next_field()? {
                    set.fields.push(field);
                }
                if set.fields.len() != column_count {
                    return Err(protocol_error(format!(
                        "Result set announced {} columns but sent {} fields",
                        column_count,
                        set.fields.len()
                    )));
                }
                while let Some(mut row) = self.next_row()? {
                    set.rows.push(row.values()?);
                }
                Ok(QueryResult::Rows(set))
            }
        }
    }

    /// Drain the pending result set into `out`.
    ///
    /// Writes the field names on one line, then each row, comma separated,
    /// with `NULL` for null columns, then `"N rows in result."`. Returns the
    /// number of rows.
    pub fn show_results<W: Write>(&mut self, out: &mut W) -> Result<usize> {
        let mut names = Vec::with_capacity(self.column_count);
        while let Some(field) = self.next_field()? {
            names.push(field.name);
        }
        writeln!(out, "{}", names.join(","))?;

        let mut rows = 0;
        while let Some(mut row) = self.next_row()? {
            let values: Vec<String> = row
                .values()?
                .into_iter()
                .map(|v| v.unwrap_or_else(|| "NULL".to_string()))
                .collect();
            writeln!(out, "{}", values.join(","))?;
            rows += 1;
        }

        writeln!(out, "{} rows in result.", rows)?;
        Ok(rows)
    }

    /// Check the server is alive (COM_PING).
    pub fn ping(&mut self) -> Result<()> {
        self.ensure_authenticated()?;

        self.framer.reset_sequence();
        self.framer.write_packet(&[Command::Ping as u8])?;

        let response = self.framer.read_packet()?;
        match response.kind() {
            PacketType::Ok => {
                self.status_flags = parse_ok(&response)?.status_flags;
                Ok(())
            }
            PacketType::Error => Err(query_error(&parse_err(&response)?, None)),
            _ => Err(protocol_error_with_data(
                "Unexpected packet in reply to ping",
                &response.payload,
            )),
        }
    }

    /// Say goodbye (COM_QUIT) and close the transport.
    ///
    /// The connection returns to `Disconnected` and may be connected again.
    pub fn close(&mut self) {
        if self.state == ConnectionState::Authenticated {
            self.framer.reset_sequence();
            if let Err(e) = self.framer.write_packet(&[Command::Quit as u8]) {
                debug!(error = %e, "COM_QUIT not delivered");
            }
        }
        self.framer.transport_mut().close();
        self.state = ConnectionState::Disconnected;
        self.column_count = 0;
        debug!("Connection closed");
    }

    /// Get the current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Check if the connection is ready for commands.
    pub fn is_ready(&self) -> bool {
        self.state == ConnectionState::Authenticated
    }

    /// Server version reported in the greeting of the current session.
    pub fn server_version(&self) -> Option<&str> {
        self.server_version.as_deref()
    }

    /// Get the connection ID.
    pub fn connection_id(&self) -> u32 {
        self.connection_id
    }

    /// Get the number of affected rows from the last statement.
    pub fn affected_rows(&self) -> u64 {
        self.affected_rows
    }

    /// Get the last insert ID.
    pub fn last_insert_id(&self) -> u64 {
        self.last_insert_id
    }

    /// Warnings reported by the last OK or EOF packet.
    pub fn warnings(&self) -> u16 {
        self.warnings
    }

    /// Server status flags from the last OK or EOF packet.
    pub fn status_flags(&self) -> u16 {
        self.status_flags
    }

    pub fn config(&self) -> &MySqlConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        self.framer.transport()
    }

    pub fn transport_mut(&mut self) -> &mut T {
        self.framer.transport_mut()
    }

    /// Give back the transport, closing nothing.
    pub fn into_transport(self) -> T {
        self.framer.into_transport()
    }

    fn ensure_authenticated(&self) -> Result<()> {
        if self.state == ConnectionState::Authenticated {
            Ok(())
        } else {
            Err(connection_error(
                ConnectionErrorKind::NotConnected,
                format!("Connection not ready for commands (state: {:?})", self.state),
            ))
        }
    }

    fn record_ok(&mut self, ok: &OkPacket) {
        self.affected_rows = ok.affected_rows;
        self.last_insert_id = ok.last_insert_id;
        self.status_flags = ok.status_flags;
        self.warnings = ok.warnings;
    }

    fn record_eof(&mut self, packet: &Packet) -> Result<()> {
        let eof = PacketReader::new(&packet.payload)
            .parse_eof_packet()
            .ok_or_else(|| protocol_error_with_data("Invalid EOF packet", &packet.payload))?;
        self.warnings = eof.warnings;
        self.status_flags = eof.status_flags;
        Ok(())
    }
}

fn parse_ok(packet: &Packet) -> Result<OkPacket> {
    PacketReader::new(&packet.payload)
        .parse_ok_packet()
        .ok_or_else(|| protocol_error_with_data("Invalid OK packet", &packet.payload))
}

fn parse_err(packet: &Packet) -> Result<ErrPacket> {
    PacketReader::new(&packet.payload)
        .parse_err_packet()
        .ok_or_else(|| protocol_error_with_data("Invalid error packet", &packet.payload))
}

// Helper functions for creating errors

pub(crate) fn protocol_error(msg: impl Into<String>) -> Error {
    Error::Protocol(ProtocolError {
        message: msg.into(),
        raw_data: None,
        source: None,
    })
}

fn protocol_error_with_data(msg: impl Into<String>, data: &[u8]) -> Error {
    Error::Protocol(ProtocolError {
        message: msg.into(),
        raw_data: Some(data.to_vec()),
        source: None,
    })
}

fn auth_error(err: &ErrPacket) -> Error {
    Error::Connection(ConnectionError {
        kind: ConnectionErrorKind::Authentication,
        message: format!("Authentication failed: {}", err.error_message),
        code: Some(err.error_code),
        sqlstate: (!err.sql_state.is_empty()).then(|| err.sql_state.clone()),
        source: None,
    })
}

fn connection_error(kind: ConnectionErrorKind, msg: impl Into<String>) -> Error {
    Error::Connection(ConnectionError {
        kind,
        message: msg.into(),
        code: None,
        sqlstate: None,
        source: None,
    })
}

fn query_error(err: &ErrPacket, sql: Option<&[u8]>) -> Error {
    let kind = match err.error_code {
        _ if err.is_duplicate_key() || err.is_foreign_key_violation() => {
            QueryErrorKind::Constraint
        }
        // ER_PARSE_ERROR
        1064 => QueryErrorKind::Syntax,
        // ER_NO_SUCH_TABLE, ER_BAD_FIELD_ERROR, ER_BAD_DB_ERROR
        1146 | 1054 | 1049 => QueryErrorKind::NotFound,
        // ER_DBACCESS_DENIED_ERROR, ER_ACCESS_DENIED_ERROR, ER_TABLEACCESS_DENIED_ERROR
        1044 | 1045 | 1142 => QueryErrorKind::Permission,
        // ER_LOCK_DEADLOCK, ER_LOCK_WAIT_TIMEOUT
        1213 | 1205 => QueryErrorKind::Deadlock,
        _ => QueryErrorKind::Database,
    };

    Error::Query(QueryError {
        kind,
        code: Some(err.error_code),
        sqlstate: (!err.sql_state.is_empty()).then(|| err.sql_state.clone()),
        message: err.error_message.clone(),
        sql: sql.map(|q| String::from_utf8_lossy(q).into_owned()),
    })
}

fn too_large_error(len: usize, limit: usize) -> Error {
    Error::Query(QueryError {
        kind: QueryErrorKind::TooLarge,
        code: None,
        sqlstate: None,
        message: format!(
            "Query of {} bytes exceeds the limit of {} bytes",
            len,
            limit.min(MAX_PACKET_SIZE - 2)
        ),
        sql: None,
    })
}
