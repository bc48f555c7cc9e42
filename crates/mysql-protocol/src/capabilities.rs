//! Capability flags, server status flags and character set tags.

use bitflags::bitflags;

bitflags! {
    /// Client/server capability flags exchanged during the handshake.
    ///
    /// The negotiated word stored on a connection is the intersection of
    /// the client's requested flags and the server's advertised flags.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct CapabilityFlags: u32 {
        /// Old password authentication.
        const LONG_PASSWORD                  = 0x0000_0001;
        /// Return found rows instead of affected rows.
        const FOUND_ROWS                     = 0x0000_0002;
        /// Longer column flags.
        const LONG_FLAG                      = 0x0000_0004;
        /// A database name is supplied in the handshake response.
        const CONNECT_WITH_DB                = 0x0000_0008;
        /// Do not allow database.table.column syntax.
        const NO_SCHEMA                      = 0x0000_0010;
        /// Compressed protocol support.
        const COMPRESS                       = 0x0000_0020;
        /// ODBC client.
        const ODBC                           = 0x0000_0040;
        /// LOAD DATA LOCAL INFILE support.
        const LOCAL_FILES                    = 0x0000_0080;
        /// Ignore spaces before '('.
        const IGNORE_SPACE                   = 0x0000_0100;
        /// Protocol 4.1 packet layouts.
        const PROTOCOL_41                    = 0x0000_0200;
        /// Interactive client timeout handling.
        const INTERACTIVE                    = 0x0000_0400;
        /// TLS support.
        const SSL                            = 0x0000_0800;
        /// Ignore SIGPIPE.
        const IGNORE_SIGPIPE                 = 0x0000_1000;
        /// Transaction status reporting.
        const TRANSACTIONS                   = 0x0000_2000;
        /// Reserved for the 4.1 protocol.
        const RESERVED                       = 0x0000_4000;
        /// 4.1 authentication (length-prefixed auth response).
        const SECURE_CONNECTION              = 0x0000_8000;
        /// Multiple statements per COM_QUERY.
        const MULTI_STATEMENTS               = 0x0001_0000;
        /// Multiple result sets per response.
        const MULTI_RESULTS                  = 0x0002_0000;
        /// Multiple result sets from prepared statements.
        const PS_MULTI_RESULTS               = 0x0004_0000;
        /// Pluggable authentication.
        const PLUGIN_AUTH                    = 0x0008_0000;
        /// Connection attributes in the handshake response.
        const CONNECT_ATTRS                  = 0x0010_0000;
        /// Length-encoded auth response data.
        const PLUGIN_AUTH_LENENC_CLIENT_DATA = 0x0020_0000;
        /// Session state change information in OK packets.
        const SESSION_TRACK                  = 0x0080_0000;
        /// OK packets replace EOF packets in result sets.
        const DEPRECATE_EOF                  = 0x0100_0000;
    }
}

impl CapabilityFlags {
    /// The flag set this client always requests.
    ///
    /// `CONNECT_WITH_DB` is added separately when a database is
    /// configured; everything else is fixed.
    #[must_use]
    pub fn client_baseline() -> Self {
        Self::PROTOCOL_41
            | Self::SECURE_CONNECTION
            | Self::PLUGIN_AUTH
            | Self::TRANSACTIONS
            | Self::MULTI_STATEMENTS
            | Self::MULTI_RESULTS
            | Self::PS_MULTI_RESULTS
            | Self::PLUGIN_AUTH_LENENC_CLIENT_DATA
    }
}

bitflags! {
    /// Server status flags carried by OK and EOF packets.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct ServerStatus: u16 {
        /// A transaction is open.
        const IN_TRANS             = 0x0001;
        /// Autocommit mode is enabled.
        const AUTOCOMMIT           = 0x0002;
        /// More result sets follow this one.
        const MORE_RESULTS_EXISTS  = 0x0008;
        /// No good index was used.
        const NO_GOOD_INDEX_USED   = 0x0010;
        /// No index was used.
        const NO_INDEX_USED        = 0x0020;
        /// A read-only cursor is open.
        const CURSOR_EXISTS        = 0x0040;
        /// The last row of the open cursor has been sent.
        const LAST_ROW_SENT        = 0x0080;
        /// The current database was dropped.
        const DB_DROPPED           = 0x0100;
        /// Backslash escaping is disabled.
        const NO_BACKSLASH_ESCAPES = 0x0200;
        /// Prepared statement metadata changed.
        const METADATA_CHANGED     = 0x0400;
        /// The query was considered slow.
        const QUERY_WAS_SLOW       = 0x0800;
        /// This result set carries output parameters.
        const PS_OUT_PARAMS        = 0x1000;
        /// A read-only transaction is open.
        const IN_TRANS_READONLY    = 0x2000;
        /// Session state has changed; OK packet carries trackers.
        const SESSION_STATE_CHANGED = 0x4000;
    }
}

/// Character set tags this driver knows how to request.
///
/// The driver only tags data with a character set; it performs no
/// conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Charset {
    /// `utf8_general_ci`.
    Utf8GeneralCi = 33,
    /// `utf8mb4_general_ci` (the driver default).
    Utf8mb4GeneralCi = 45,
    /// `binary`.
    Binary = 63,
    /// `utf8mb4_0900_ai_ci` (MySQL 8.0 default).
    Utf8mb4_0900AiCi = 255,
}

impl Charset {
    /// Resolve a configured charset name to its collation tag.
    ///
    /// Unknown names fall back to `utf8mb4_general_ci`.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "utf8" | "utf8mb3" => Self::Utf8GeneralCi,
            "binary" => Self::Binary,
            "utf8mb4_0900_ai_ci" => Self::Utf8mb4_0900AiCi,
            _ => Self::Utf8mb4GeneralCi,
        }
    }
}

impl Default for Charset {
    fn default() -> Self {
        Self::Utf8mb4GeneralCi
    }
}
