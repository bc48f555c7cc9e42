//! Client error types.

use mysql_codec::CodecError;
use thiserror::Error;

/// Errors that can occur during client operations.
///
/// Server-originated failures (`Server`, and `Auth`/`PreparedStmt` when
/// the server sent an ERR packet) carry the server errno verbatim; it is
/// zero when not applicable. After any non-`Server` error the connection
/// is in an unspecified state and should be closed, not reused.
#[derive(Debug, Error)]
pub enum Error {
    /// TCP connect failed or socket-level error before authentication.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The peer closed the socket mid-exchange, or the client was used
    /// after `close`.
    #[error("connection closed")]
    ConnectionClosed,

    /// Credentials rejected or the auth exchange cannot proceed.
    #[error("authentication failed: {message}")]
    Auth {
        /// Server errno when the server sent an ERR packet, else zero.
        errno: u16,
        /// Failure description.
        message: String,
    },

    /// Received bytes do not match the expected packet shape.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server returned an ERR packet.
    #[error("server error {errno}: {message}")]
    Server {
        /// Server errno, verbatim.
        errno: u16,
        /// Server-provided message.
        message: String,
    },

    /// Query-level failure not mapped to `Server`.
    #[error("query failed: {0}")]
    Query(String),

    /// Prepare- or statement-level failure.
    #[error("prepared statement error: {message}")]
    PreparedStmt {
        /// Server errno when the server sent an ERR packet, else zero.
        errno: u16,
        /// Failure description.
        message: String,
    },

    /// Reserved for higher layers; unused by the core.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// Transport-layer failure while sending.
    #[error("send failed: {0}")]
    Send(String),

    /// Transport-layer failure while receiving.
    #[error("receive failed: {0}")]
    Recv(String),

    /// A configured send or receive timeout elapsed.
    #[error("operation timed out")]
    Timeout,

    /// The receive buffer cannot accept more bytes but the parser still
    /// needs more.
    #[error("receive buffer overflow")]
    BufferOverflow,

    /// Caller-supplied arguments violate a precondition.
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// Invariant violation; should never be observed.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// The server errno attached to this error, when one exists.
    #[must_use]
    pub fn server_errno(&self) -> Option<u16> {
        match self {
            Self::Server { errno, .. }
            | Self::Auth { errno, .. }
            | Self::PreparedStmt { errno, .. }
                if *errno != 0 =>
            {
                Some(*errno)
            }
            _ => None,
        }
    }

    /// Map a codec failure observed while receiving.
    pub(crate) fn from_recv(e: CodecError) -> Self {
        match e {
            CodecError::ConnectionClosed => Self::ConnectionClosed,
            CodecError::BufferOverflow => Self::BufferOverflow,
            CodecError::Protocol(pe) => Self::Protocol(pe.to_string()),
            CodecError::Io(io) => Self::Recv(io.to_string()),
            CodecError::WriteZero => Self::Recv(e.to_string()),
        }
    }

    /// Map a codec failure observed while sending.
    pub(crate) fn from_send(e: CodecError) -> Self {
        match e {
            CodecError::ConnectionClosed | CodecError::WriteZero => {
                Self::Send("send wrote zero bytes".into())
            }
            CodecError::Io(io) => Self::Send(io.to_string()),
            other => Self::Send(other.to_string()),
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;
