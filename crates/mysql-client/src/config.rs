//! Client configuration.

use std::time::Duration;

/// Connection target configuration.
///
/// Immutable across a session; the client reads it once during
/// `connect`. Configuration comes in as a struct — the core has no
/// environment contract.
#[derive(Debug, Clone)]
pub struct MysqlConfig {
    /// Server hostname or address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Account name.
    pub username: String,
    /// Account password; empty means no password.
    pub password: String,
    /// Initial database to select during the handshake.
    pub database: Option<String>,
    /// Desired character set name; data is tagged, never converted.
    pub charset: String,
    /// Time allowed for the TCP connect.
    pub connect_timeout: Duration,
}

impl Default for MysqlConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3306,
            username: String::new(),
            password: String::new(),
            database: None,
            charset: "utf8mb4".into(),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl MysqlConfig {
    /// Create a configuration with driver defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration for the given target.
    #[must_use]
    pub fn create(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    /// Set the initial database.
    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the character set name.
    #[must_use]
    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    /// Set the TCP connect timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// Default receive buffer capacity (16 KiB).
pub const DEFAULT_BUFFER_SIZE: usize = 16 * 1024;

/// Per-client knobs independent of the connection target.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Send timeout; `None` disables it.
    pub send_timeout: Option<Duration>,
    /// Receive timeout; `None` disables it.
    pub recv_timeout: Option<Duration>,
    /// Receive buffer capacity in bytes. A single response packet must
    /// fit in this buffer.
    pub buffer_size: usize,
    /// Row preallocation hint for result sets; 0 disables it.
    pub result_row_reserve_hint: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            send_timeout: None,
            recv_timeout: None,
            buffer_size: DEFAULT_BUFFER_SIZE,
            result_row_reserve_hint: 0,
        }
    }
}

impl ClientConfig {
    /// Create a configuration with no timeouts and default buffering.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set both the send and receive timeouts.
    #[must_use]
    pub fn with_timeout(mut self, send: Duration, recv: Duration) -> Self {
        self.send_timeout = Some(send);
        self.recv_timeout = Some(recv);
        self
    }

    /// Set the send timeout.
    #[must_use]
    pub fn send_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Set the receive timeout.
    #[must_use]
    pub fn recv_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.recv_timeout = timeout;
        self
    }

    /// Set the receive buffer capacity.
    #[must_use]
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Set the row preallocation hint.
    #[must_use]
    pub fn result_row_reserve_hint(mut self, hint: usize) -> Self {
        self.result_row_reserve_hint = hint;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MysqlConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 3306);
        assert_eq!(config.charset, "utf8mb4");
        assert!(config.database.is_none());

        let options = ClientConfig::default();
        assert_eq!(options.buffer_size, DEFAULT_BUFFER_SIZE);
        assert!(options.send_timeout.is_none());
        assert!(options.recv_timeout.is_none());
    }

    #[test]
    fn test_builders() {
        let config = MysqlConfig::create("db.example", 3307, "app", "secret")
            .database("orders")
            .charset("utf8")
            .connect_timeout(Duration::from_secs(1));
        assert_eq!(config.host, "db.example");
        assert_eq!(config.port, 3307);
        assert_eq!(config.database.as_deref(), Some("orders"));
        assert_eq!(config.charset, "utf8");

        let options = ClientConfig::new()
            .with_timeout(Duration::from_secs(2), Duration::from_secs(3))
            .buffer_size(64 * 1024)
            .result_row_reserve_hint(128);
        assert_eq!(options.send_timeout, Some(Duration::from_secs(2)));
        assert_eq!(options.recv_timeout, Some(Duration::from_secs(3)));
        assert_eq!(options.buffer_size, 64 * 1024);
        assert_eq!(options.result_row_reserve_hint, 128);
    }
}
