//! # mysql-codec
//!
//! Buffered packet transport for the MySQL wire protocol.
//!
//! This crate sits between the IO-agnostic `mysql-protocol` crate and the
//! client: it owns the socket and a fixed-capacity [`RingBuffer`], fills
//! the buffer from the transport, extracts whole packets (joining 16 MiB
//! payload continuations), tracks sequence-id expectations and loops over
//! partial writes on send.

pub mod connection;
pub mod error;
pub mod ring;

pub use connection::{Connection, Packet};
pub use error::CodecError;
pub use ring::RingBuffer;
