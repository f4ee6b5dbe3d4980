//! Error types for minimysql operations.

use std::fmt;

/// The primary error type for all minimysql operations.
#[derive(Debug)]
pub enum Error {
    /// Connection-related errors (connect retries exhausted, auth rejected)
    Connection(ConnectionError),
    /// Server-reported query errors and oversized queries
    Query(QueryError),
    /// Protocol errors (unexpected packet shape or sequence)
    Protocol(ProtocolError),
    /// Configuration errors
    Config(ConfigError),
    /// I/O errors from the transport
    Io(std::io::Error),
    /// No bytes arrived within the bounded wait
    Timeout,
}

#[derive(Debug)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
    /// MySQL error number, when the server reported one
    pub code: Option<u16>,
    /// SQLSTATE, when the server reported one
    pub sqlstate: Option<String>,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Failed to establish the transport session
    Connect,
    /// Server rejected the credentials
    Authentication,
    /// Connection lost during operation
    Disconnected,
    /// Operation requires an authenticated connection
    NotConnected,
}

#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    /// MySQL error number (`errno`)
    pub code: Option<u16>,
    pub sqlstate: Option<String>,
    pub message: String,
    pub sql: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Syntax error in SQL
    Syntax,
    /// Constraint violation (unique, foreign key)
    Constraint,
    /// Database, table or column not found
    NotFound,
    /// Permission denied
    Permission,
    /// Deadlock or lock wait timeout
    Deadlock,
    /// Command does not fit the configured maximum query size
    TooLarge,
    /// Other server error
    Database,
}

#[derive(Debug)]
pub struct ProtocolError {
    pub message: String,
    pub raw_data: Option<Vec<u8>>,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
}

impl Error {
    /// Is this a connection error that requires close-then-reconnect?
    pub fn is_connection_error(&self) -> bool {
        match self {
            Error::Connection(_) | Error::Protocol(_) | Error::Io(_) | Error::Timeout => true,
            _ => false,
        }
    }

    /// MySQL error number, if the server reported one.
    pub fn code(&self) -> Option<u16> {
        match self {
            Error::Query(q) => q.code,
            Error::Connection(c) => c.code,
            _ => None,
        }
    }

    /// Get SQLSTATE if available (e.g., "42S02" for an unknown table)
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sqlstate.as_deref(),
            Error::Connection(c) => c.sqlstate.as_deref(),
            _ => None,
        }
    }

    /// Get the SQL that caused this error, if available
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sql.as_deref(),
            _ => None,
        }
    }

    /// Is this an authentication rejection?
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Error::Connection(c) if c.kind == ConnectionErrorKind::Authentication)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(e) => write!(f, "Connection error: {}", e),
            Error::Query(e) => write!(f, "Query error: {}", e),
            Error::Protocol(e) => write!(f, "Protocol error: {}", e.message),
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Timeout => write!(f, "Timed out waiting for server data"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connection(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Protocol(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (error {})", self.message, code),
            None => write!(f, "{}", self.message),
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.code, &self.sqlstate) {
            (Some(code), Some(sqlstate)) => {
                write!(f, "{} (error {}, SQLSTATE {})", self.message, code, sqlstate)
            }
            (Some(code), None) => write!(f, "{} (error {})", self.message, code),
            _ => write!(f, "{}", self.message),
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Error::Connection(err)
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<ProtocolError> for Error {
    fn from(err: ProtocolError) -> Self {
        Error::Protocol(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

/// Result type alias for minimysql operations.
pub type Result<T> = std::result::Result<T, Error>;
