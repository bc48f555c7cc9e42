//! # mysql-protocol
//!
//! Pure implementation of the MySQL Client/Server Protocol (version 4.1)
//! as spoken by MySQL 5.7+ and MariaDB 10+.
//!
//! This crate covers the wire layer only: fixed-width little-endian
//! primitives, length-encoded integers and strings, the 4-byte packet
//! header, typed decoders for the server's response packets (handshake,
//! OK, ERR, EOF, column definitions, text rows, `COM_STMT_PREPARE`
//! responses) and encoders for the `COM_*` command family.
//!
//! ## Design Philosophy
//!
//! This crate is intentionally IO-agnostic. It contains no networking
//! logic and makes no assumptions about the async runtime. Higher-level
//! crates build upon this foundation to provide buffered transport and
//! async I/O capabilities.
//!
//! Decoders operate on byte slices and either return a typed value or a
//! [`ParseError`]; [`ParseError::Incomplete`] always means "feed me more
//! bytes", never "the stream is corrupt".
//!
//! ## Example
//!
//! ```rust
//! use mysql_protocol::command::encode_query;
//!
//! let packet = encode_query("SELECT 1", 0).unwrap();
//! // 4-byte header: 9-byte payload, sequence 0, then 0x03 (COM_QUERY) + SQL
//! assert_eq!(&packet[..], b"\x09\x00\x00\x00\x03SELECT 1");
//! ```

#![warn(missing_docs)]

pub mod capabilities;
pub mod codec;
pub mod command;
pub mod error;
pub mod packet;
pub mod response;
pub mod types;

pub use capabilities::{CapabilityFlags, Charset, ServerStatus};
pub use command::{Command, HandshakeResponse41};
pub use error::ParseError;
pub use packet::{MAX_PAYLOAD_SIZE, PACKET_HEADER_SIZE, PacketHeader};
pub use response::{
    ColumnDefinition, EofPacket, ErrPacket, HandshakeV10, OkPacket, ResponseKind, StmtPrepareOk,
};
pub use types::{ColumnType, FieldFlags};
