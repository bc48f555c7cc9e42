//! Pool configuration.

use mysql_client::{ClientConfig, MysqlConfig};

/// Configuration for the connection pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Connection target shared by every pooled session.
    pub mysql_config: MysqlConfig,
    /// Per-client knobs shared by every pooled session.
    pub client_config: ClientConfig,
    /// Lower bound kept for sizing guidance; connections are created
    /// lazily, never ahead of demand.
    pub min_connections: usize,
    /// Hard ceiling on concurrently live connections. Must be at least 1.
    pub max_connections: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            mysql_config: MysqlConfig::default(),
            client_config: ClientConfig::default(),
            min_connections: 2,
            max_connections: 10,
        }
    }
}

impl PoolConfig {
    /// Create a configuration with pool defaults for the given target.
    #[must_use]
    pub fn new(mysql_config: MysqlConfig) -> Self {
        Self {
            mysql_config,
            ..Self::default()
        }
    }

    /// Set the per-client options.
    #[must_use]
    pub fn client_config(mut self, config: ClientConfig) -> Self {
        self.client_config = config;
        self
    }

    /// Set the minimum connection count.
    #[must_use]
    pub fn min_connections(mut self, min: usize) -> Self {
        self.min_connections = min;
        self
    }

    /// Set the maximum connection count.
    #[must_use]
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Check the `max >= 1` and `min <= max` constraints.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_connections == 0 {
            return Err("max_connections must be at least 1".into());
        }
        if self.min_connections > self.max_connections {
            return Err(format!(
                "min_connections ({}) exceeds max_connections ({})",
                self.min_connections, self.max_connections
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(PoolConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_max() {
        let config = PoolConfig::default().max_connections(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_min_above_max() {
        let config = PoolConfig::default().min_connections(5).max_connections(3);
        assert!(config.validate().is_err());
    }
}
