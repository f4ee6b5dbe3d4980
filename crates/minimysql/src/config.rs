//! MySQL connection configuration.
//!
//! Everything the client needs is supplied by the caller: server address,
//! credentials, and the fixed retry/poll budgets used while waiting on a slow
//! network. Nothing is read from the environment.

use std::time::Duration;

use minimysql_core::{ConfigError, Error};
use serde::{Deserialize, Serialize};

use crate::protocol::{MAX_PACKET_SIZE, capabilities, charset};

/// MySQL connection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MySqlConfig {
    /// Hostname or IP address
    pub host: String,
    /// Port number (default: 3306)
    pub port: u16,
    /// Username for authentication
    pub user: String,
    /// Password for authentication
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// Default database selected at login
    pub database: Option<String>,
    /// Character set id sent in the login packet (default: 8, latin1)
    pub charset: u8,
    /// Client capability flags sent in the login packet
    pub client_flags: u32,
    /// Max packet size announced to the server
    pub max_packet_size: u32,
    /// Transport connect attempts before giving up
    pub connect_attempts: u32,
    /// Delay between connect attempts
    #[serde(with = "millis")]
    pub connect_retry_delay: Duration,
    /// Polls of `available()` before a read times out
    pub read_attempts: u32,
    /// Delay between polls
    #[serde(with = "millis")]
    pub read_poll_interval: Duration,
    /// Largest query accepted by `execute`, in bytes
    pub max_query_size: usize,
}

impl Default for MySqlConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            user: String::new(),
            password: None,
            database: None,
            charset: charset::DEFAULT_CHARSET,
            client_flags: capabilities::DEFAULT_CLIENT_FLAGS,
            max_packet_size: 16 * 1024 * 1024,
            connect_attempts: 3,
            connect_retry_delay: Duration::from_secs(1),
            read_attempts: 10,
            read_poll_interval: Duration::from_millis(500),
            // Command byte shares the packet with the query text, and a
            // payload of exactly MAX_PACKET_SIZE announces a continuation
            max_query_size: MAX_PACKET_SIZE - 2,
        }
    }
}

impl MySqlConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the hostname.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the username.
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Set the password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the database.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the character set.
    pub fn charset(mut self, charset: u8) -> Self {
        self.charset = charset;
        self
    }

    /// Set the connect retry budget.
    pub fn connect_retries(mut self, attempts: u32, delay: Duration) -> Self {
        self.connect_attempts = attempts;
        self.connect_retry_delay = delay;
        self
    }

    /// Set the read poll budget.
    ///
    /// A read gives up after `attempts * interval` without any data.
    pub fn read_timeout(mut self, attempts: u32, interval: Duration) -> Self {
        self.read_attempts = attempts;
        self.read_poll_interval = interval;
        self
    }

    /// Set the largest query `execute` accepts.
    pub fn max_query_size(mut self, size: usize) -> Self {
        self.max_query_size = size;
        self
    }

    /// Get the socket address string for connection.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Capability flags for the login packet.
    pub fn capability_flags(&self) -> u32 {
        let mut flags = self.client_flags;
        if self.database.as_deref().is_some_and(|db| !db.is_empty()) {
            flags |= capabilities::CLIENT_CONNECT_WITH_DB;
        }
        flags
    }

    /// Reject settings the client cannot work with.
    pub fn validate(&self) -> Result<(), Error> {
        if self.host.is_empty() {
            return Err(config_error("host must not be empty"));
        }
        if self.user.is_empty() {
            return Err(config_error("user must not be empty"));
        }
        if self.connect_attempts == 0 {
            return Err(config_error("connect_attempts must be at least 1"));
        }
        if self.read_attempts == 0 {
            return Err(config_error("read_attempts must be at least 1"));
        }
        if self.max_query_size == 0 || self.max_query_size >= MAX_PACKET_SIZE - 1 {
            return Err(config_error(format!(
                "max_query_size must be between 1 and {}",
                MAX_PACKET_SIZE - 2
            )));
        }
        if self.client_flags & capabilities::CLIENT_PROTOCOL_41 == 0 {
            return Err(config_error("client_flags must include CLIENT_PROTOCOL_41"));
        }
        Ok(())
    }
}

fn config_error(msg: impl Into<String>) -> Error {
    Error::Config(ConfigError {
        message: msg.into(),
    })
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::cast_possible_truncation)]
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = MySqlConfig::new()
            .host("10.0.1.20")
            .port(3307)
            .user("arduino")
            .password("secret")
            .database("sensors")
            .connect_retries(5, Duration::from_millis(200))
            .read_timeout(20, Duration::from_millis(100));

        assert_eq!(config.host, "10.0.1.20");
        assert_eq!(config.port, 3307);
        assert_eq!(config.user, "arduino");
        assert_eq!(config.password, Some("secret".to_string()));
        assert_eq!(config.database, Some("sensors".to_string()));
        assert_eq!(config.connect_attempts, 5);
        assert_eq!(config.read_poll_interval, Duration::from_millis(100));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_socket_addr() {
        let config = MySqlConfig::new().host("db.example.com").port(3307);
        assert_eq!(config.socket_addr(), "db.example.com:3307");
    }

    #[test]
    fn test_default_config() {
        let config = MySqlConfig::default();

        assert_eq!(config.port, 3306);
        assert_eq!(config.charset, 8);
        assert_eq!(config.max_packet_size, 0x0100_0000);
        assert_eq!(config.connect_attempts, 3);
        assert_eq!(config.read_attempts, 10);
        assert_eq!(config.read_poll_interval, Duration::from_millis(500));
    }

    #[test]
    fn test_capability_flags() {
        use crate::protocol::capabilities::*;

        let plain = MySqlConfig::new();
        assert_eq!(plain.capability_flags(), DEFAULT_CLIENT_FLAGS);

        let with_db = MySqlConfig::new().database("test");
        assert!(with_db.capability_flags() & CLIENT_CONNECT_WITH_DB != 0);

        let empty_db = MySqlConfig::new().database("");
        assert!(empty_db.capability_flags() & CLIENT_CONNECT_WITH_DB == 0);
    }

    #[test]
    fn test_validate_rejects_unusable_settings() {
        assert!(MySqlConfig::new().validate().is_err());

        let base = MySqlConfig::new().user("root");
        assert!(base.clone().validate().is_ok());
        assert!(base.clone().max_query_size(0).validate().is_err());
        assert!(
            base.clone()
                .max_query_size(MAX_PACKET_SIZE - 1)
                .validate()
                .is_err()
        );
        assert!(
            base.clone()
                .max_query_size(MAX_PACKET_SIZE - 2)
                .validate()
                .is_ok()
        );
        assert!(
            base.clone()
                .connect_retries(0, Duration::ZERO)
                .validate()
                .is_err()
        );
        assert!(matches!(
            base.read_timeout(0, Duration::ZERO).validate(),
            Err(Error::Config(_))
        ));
    }
}
