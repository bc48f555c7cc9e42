//! Protocol parse errors.

use thiserror::Error;

/// Errors produced while decoding wire data.
///
/// [`ParseError::Incomplete`] is not a failure: it signals that the
/// element extends past the available bytes and the caller should retry
/// once more data has arrived. Every other variant is terminal for the
/// containing exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The element extends beyond the available bytes.
    #[error("incomplete wire element")]
    Incomplete,

    /// A field did not match the expected layout.
    #[error("malformed wire element")]
    InvalidFormat,

    /// A declared length is out of range for its context.
    #[error("invalid length field")]
    InvalidLength,

    /// A type tag has no meaning in its position.
    #[error("invalid type tag")]
    InvalidType,

    /// The element can never fit in the receive buffer.
    #[error("wire element exceeds buffer capacity")]
    BufferOverflow,
}

/// Result alias for decode operations.
pub type ParseResult<T> = Result<T, ParseError>;
