//! # mysql-client
//!
//! High-level async MySQL client.
//!
//! This is the primary public API surface of the driver. It speaks the
//! MySQL text and binary command protocols directly over TCP, without
//! linking a vendor client library.
//!
//! ## Features
//!
//! - **Async/await**: built on Tokio; one suspension region per command
//! - **Text-protocol queries**: full result sets with typed row accessors
//! - **Prepared statements**: prepare / execute / close lifecycle
//!   (execute is limited to commands without a result set — the binary
//!   row format is not decoded)
//! - **Transactions**: `begin_transaction` / `commit` / `rollback`
//! - **Authentication**: `mysql_native_password` and the
//!   `caching_sha2_password` fast path
//!
//! ## Example
//!
//! ```rust,ignore
//! use mysql_client::{Client, ClientConfig, MysqlConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mysql_client::Error> {
//!     let config = MysqlConfig::create("127.0.0.1", 3306, "root", "")
//!         .database("test_db");
//!     let mut client = Client::connect(&config, ClientConfig::default()).await?;
//!
//!     let result = client.query("SELECT 1").await?;
//!     assert_eq!(result.rows()[0].get_i64(0), 1);
//!
//!     let stmt = client.prepare("INSERT INTO t(v) VALUES (?)").await?;
//!     let result = client.stmt_execute(stmt.statement_id(), &[Some("42")]).await?;
//!     assert_eq!(result.affected_rows(), 1);
//!
//!     client.close().await
//! }
//! ```

#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod error;
pub mod result;

pub use client::Client;
pub use config::{ClientConfig, DEFAULT_BUFFER_SIZE, MysqlConfig};
pub use error::{Error, Result};
pub use mysql_protocol::capabilities::{CapabilityFlags, ServerStatus};
pub use mysql_protocol::types::{ColumnType, FieldFlags};
pub use result::{Field, PreparedStatement, ResultSet, Row};
