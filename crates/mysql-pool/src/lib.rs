//! # mysql-pool
//!
//! Async connection pool for the MySQL client.
//!
//! The pool holds up to `max_connections` authenticated [`mysql_client::Client`]
//! sessions. Acquisition returns an idle connection immediately when one
//! exists, lazily connects a new one while the pool is under its ceiling,
//! and otherwise parks the caller in a FIFO queue. A released connection
//! is handed directly to the longest-waiting caller, so waiters are served
//! strictly in arrival order.

pub mod config;
pub mod error;
pub mod pool;

pub use config::PoolConfig;
pub use error::PoolError;
pub use pool::{Pool, PooledConn};
