//! Core types for minimysql.
//!
//! This crate holds the pieces shared by every layer of the client:
//!
//! - `Error` and the error taxonomy returned by all operations
//! - `Transport`, the narrow byte-stream interface the client runs over

pub mod error;
pub mod transport;

pub use error::{
    ConfigError, ConnectionError, ConnectionErrorKind, Error, ProtocolError, QueryError,
    QueryErrorKind, Result,
};
pub use transport::Transport;
