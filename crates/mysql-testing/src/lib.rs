//! # mysql-testing
//!
//! Mock MySQL server for unit and integration testing without a real
//! database instance.
//!
//! The server performs a protocol-faithful handshake (greeting, scramble
//! verification, optional `caching_sha2_password` fast-auth status) and
//! then answers commands from a scripted response table.
//!
//! ## Example
//!
//! ```rust,ignore
//! use mysql_testing::{MockColumn, MockMysqlServer, MockResponse};
//!
//! #[tokio::test]
//! async fn test_query() {
//!     let server = MockMysqlServer::builder()
//!         .with_response(
//!             "SELECT v FROM t",
//!             MockResponse::rows(
//!                 vec![MockColumn::new("v")],
//!                 vec![vec![Some("42".into())]],
//!             ),
//!         )
//!         .start()
//!         .await
//!         .unwrap();
//!
//!     let addr = server.addr();
//!     // Connect your client to addr...
//! }
//! ```

pub mod mock_server;

pub use mock_server::{
    MockColumn, MockMysqlServer, MockPrepare, MockResponse, MockServerBuilder, MockServerError,
};
