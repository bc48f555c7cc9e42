//! Codec error types.

use mysql_protocol::ParseError;
use thiserror::Error;

/// Errors that can occur in the packet transport layer.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Underlying IO failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the socket (zero-byte read) mid-exchange.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// The send side wrote zero bytes.
    #[error("send wrote zero bytes")]
    WriteZero,

    /// The receive buffer is full but no complete packet is buffered.
    #[error("receive buffer full with incomplete packet")]
    BufferOverflow,

    /// Buffered bytes do not form a valid packet.
    #[error("protocol error: {0}")]
    Protocol(ParseError),
}

impl From<ParseError> for CodecError {
    fn from(e: ParseError) -> Self {
        Self::Protocol(e)
    }
}
