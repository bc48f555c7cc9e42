//! Pool error types.

use thiserror::Error;

/// Errors that can occur during pool operations.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool has been closed; waiters are drained with this error.
    #[error("pool is closed")]
    Closed,

    /// Connecting a new session failed; the reserved slot was released.
    #[error("failed to create connection: {0}")]
    Connect(#[from] mysql_client::Error),

    /// The pool configuration violates a constraint.
    #[error("pool configuration error: {0}")]
    Configuration(String),
}
