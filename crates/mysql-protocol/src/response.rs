//! Typed decoders for server response packets.
//!
//! All decoders take the packet payload (header already stripped) and the
//! first payload byte is part of the slice. The byte that disambiguates a
//! response is that first byte: 0x00 is an OK packet (and also the
//! `COM_STMT_PREPARE` OK), 0xFF an ERR packet, 0xFE with a short payload
//! an EOF packet, anything else a length-encoded column count opening a
//! result set. Context decides — see [`ResponseKind::identify`].

use bytes::Bytes;

use crate::capabilities::{CapabilityFlags, ServerStatus};
use crate::codec::{NULL_MARKER, WireReader};
use crate::error::{ParseError, ParseResult};

/// Classification of a response packet by its first payload byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// OK packet (0x00 with at least 7 payload bytes).
    Ok,
    /// ERR packet (0xFF).
    Err,
    /// EOF packet (0xFE with payload shorter than 9 bytes).
    Eof,
    /// LOCAL INFILE request (0xFB). Not supported by this driver.
    LocalInfile,
    /// Length-encoded column count opening a result set.
    ResultSetHeader,
}

impl ResponseKind {
    /// Classify a response packet.
    #[must_use]
    pub fn identify(first_byte: u8, payload_len: usize) -> Self {
        match first_byte {
            0x00 if payload_len >= 7 => Self::Ok,
            0xFF => Self::Err,
            0xFE if payload_len < 9 => Self::Eof,
            0xFB => Self::LocalInfile,
            _ => Self::ResultSetHeader,
        }
    }
}

/// Initial handshake packet (protocol version 10) sent by the server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandshakeV10 {
    /// Protocol version; always 10.
    pub protocol_version: u8,
    /// Human-readable server version, e.g. `8.0.32`.
    pub server_version: String,
    /// Server-side connection/thread id.
    pub connection_id: u32,
    /// Auth challenge (salt), both chunks concatenated, trailing NUL
    /// trimmed. 20 bytes on modern servers.
    pub auth_plugin_data: Vec<u8>,
    /// Capabilities the server advertises.
    pub capability_flags: CapabilityFlags,
    /// Server default collation tag.
    pub character_set: u8,
    /// Server status word.
    pub status_flags: ServerStatus,
    /// Authentication plugin the server wants the client to use.
    pub auth_plugin_name: String,
}

impl HandshakeV10 {
    /// Decode a handshake payload.
    pub fn decode(payload: &[u8]) -> ParseResult<Self> {
        let mut reader = WireReader::new(payload);

        let protocol_version = reader.read_u8()?;
        if protocol_version != 10 {
            return Err(ParseError::InvalidFormat);
        }

        let server_version = reader.read_null_terminated_string()?;
        let connection_id = reader.read_u32_le()?;
        let auth_plugin_data = reader.read_bytes(8)?.to_vec();
        reader.skip(1)?; // filler
        let capability_lower = reader.read_u16_le()?;

        let mut handshake = Self {
            protocol_version,
            server_version,
            connection_id,
            auth_plugin_data,
            capability_flags: CapabilityFlags::from_bits_retain(u32::from(capability_lower)),
            ..Self::default()
        };

        // Pre-4.1 servers stop here.
        if reader.is_empty() {
            return Ok(handshake);
        }

        handshake.character_set = reader.read_u8()?;
        handshake.status_flags = ServerStatus::from_bits_retain(reader.read_u16_le()?);
        let capability_upper = reader.read_u16_le()?;
        handshake.capability_flags = CapabilityFlags::from_bits_retain(
            u32::from(capability_lower) | u32::from(capability_upper) << 16,
        );
        let auth_data_len = reader.read_u8()?;
        reader.skip(10)?; // reserved

        if handshake
            .capability_flags
            .contains(CapabilityFlags::SECURE_CONNECTION)
        {
            let part2_len = usize::max(13, usize::from(auth_data_len).saturating_sub(8));
            let mut part2 = reader.read_bytes(part2_len)?;
            if part2.last() == Some(&0) {
                part2 = &part2[..part2.len() - 1];
            }
            handshake.auth_plugin_data.extend_from_slice(part2);
        }

        if handshake
            .capability_flags
            .contains(CapabilityFlags::PLUGIN_AUTH)
        {
            // Tolerate a missing terminator (seen on old servers); the
            // plugin name is then simply absent.
            if let Ok(name) = reader.read_null_terminated_string() {
                handshake.auth_plugin_name = name;
            }
        }

        Ok(handshake)
    }
}

/// OK packet: terminal success response carrying command metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OkPacket {
    /// Rows changed/deleted/inserted by the command.
    pub affected_rows: u64,
    /// Auto-increment value assigned by the command.
    pub last_insert_id: u64,
    /// Server status word.
    pub status_flags: ServerStatus,
    /// Warning count.
    pub warnings: u16,
    /// Human-readable info string, verbatim.
    pub info: String,
}

impl OkPacket {
    /// Decode an OK payload (first byte 0x00 or the 0xFE short-OK form
    /// used under `DEPRECATE_EOF`).
    pub fn decode(payload: &[u8], capabilities: CapabilityFlags) -> ParseResult<Self> {
        let mut reader = WireReader::new(payload);
        reader.skip(1)?; // 0x00 / 0xFE tag

        let affected_rows = reader.read_lenenc_int()?;
        let last_insert_id = reader.read_lenenc_int()?;

        let mut ok = Self {
            affected_rows,
            last_insert_id,
            ..Self::default()
        };

        if capabilities.contains(CapabilityFlags::PROTOCOL_41) {
            ok.status_flags = ServerStatus::from_bits_retain(reader.read_u16_le()?);
            ok.warnings = reader.read_u16_le()?;
        }

        if !reader.is_empty() {
            ok.info = String::from_utf8_lossy(reader.read_rest()).into_owned();
        }

        Ok(ok)
    }
}

/// ERR packet: the server rejected the command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrPacket {
    /// Server error number.
    pub error_code: u16,
    /// Five-character SQLSTATE (empty on pre-4.1 layouts).
    pub sql_state: String,
    /// Human-readable error message.
    pub error_message: String,
}

impl ErrPacket {
    /// Decode an ERR payload (first byte 0xFF).
    pub fn decode(payload: &[u8], capabilities: CapabilityFlags) -> ParseResult<Self> {
        let mut reader = WireReader::new(payload);
        reader.skip(1)?; // 0xFF tag
        let error_code = reader.read_u16_le()?;

        let mut err = Self {
            error_code,
            ..Self::default()
        };

        if capabilities.contains(CapabilityFlags::PROTOCOL_41) {
            reader.skip(1)?; // '#' marker
            err.sql_state = String::from_utf8_lossy(reader.read_bytes(5)?).into_owned();
        }

        if !reader.is_empty() {
            err.error_message = String::from_utf8_lossy(reader.read_rest()).into_owned();
        }

        Ok(err)
    }
}

/// EOF packet: legacy section terminator inside result sets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EofPacket {
    /// Warning count.
    pub warnings: u16,
    /// Server status word.
    pub status_flags: ServerStatus,
}

impl EofPacket {
    /// Decode an EOF payload (first byte 0xFE, payload shorter than 9).
    pub fn decode(payload: &[u8]) -> ParseResult<Self> {
        let mut reader = WireReader::new(payload);
        reader.skip(1)?; // 0xFE tag

        let mut eof = Self::default();
        if reader.remaining() >= 4 {
            eof.warnings = reader.read_u16_le()?;
            eof.status_flags = ServerStatus::from_bits_retain(reader.read_u16_le()?);
        }
        Ok(eof)
    }
}

/// Column definition packet (protocol 4.1 layout).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnDefinition {
    /// Catalog; always `def` on current servers.
    pub catalog: String,
    /// Schema (database) name.
    pub schema: String,
    /// Table alias.
    pub table: String,
    /// Physical table name.
    pub org_table: String,
    /// Column alias.
    pub name: String,
    /// Physical column name.
    pub org_name: String,
    /// Collation tag.
    pub character_set: u16,
    /// Maximum display length.
    pub column_length: u32,
    /// Raw type code; see [`crate::types::ColumnType::from_u8`].
    pub column_type: u8,
    /// Raw flag bits; see [`crate::types::FieldFlags`].
    pub flags: u16,
    /// Decimal scale.
    pub decimals: u8,
}

impl ColumnDefinition {
    /// Decode a column definition payload.
    pub fn decode(payload: &[u8]) -> ParseResult<Self> {
        let mut reader = WireReader::new(payload);

        let catalog = reader.read_lenenc_string()?;
        let schema = reader.read_lenenc_string()?;
        let table = reader.read_lenenc_string()?;
        let org_table = reader.read_lenenc_string()?;
        let name = reader.read_lenenc_string()?;
        let org_name = reader.read_lenenc_string()?;

        reader.skip(1)?; // length of the fixed fields, always 0x0C
        let character_set = reader.read_u16_le()?;
        let column_length = reader.read_u32_le()?;
        let column_type = reader.read_u8()?;
        let flags = reader.read_u16_le()?;
        let decimals = reader.read_u8()?;
        reader.skip(2)?; // filler

        Ok(Self {
            catalog,
            schema,
            table,
            org_table,
            name,
            org_name,
            character_set,
            column_length,
            column_type,
            flags,
            decimals,
        })
    }
}

/// `COM_STMT_PREPARE` success header.
///
/// Followed on the wire by `num_params` parameter definitions and
/// `num_columns` column definitions (each section with its own EOF under
/// the legacy layout); this struct covers the first packet only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StmtPrepareOk {
    /// Server-assigned statement id.
    pub statement_id: u32,
    /// Number of result columns the statement produces.
    pub num_columns: u16,
    /// Number of `?` placeholders.
    pub num_params: u16,
    /// Warning count.
    pub warning_count: u16,
}

impl StmtPrepareOk {
    /// Decode a `COM_STMT_PREPARE` OK payload (first byte 0x00).
    pub fn decode(payload: &[u8]) -> ParseResult<Self> {
        if payload.len() < 12 {
            return Err(ParseError::Incomplete);
        }
        let mut reader = WireReader::new(payload);
        reader.skip(1)?; // 0x00 tag
        let statement_id = reader.read_u32_le()?;
        let num_columns = reader.read_u16_le()?;
        let num_params = reader.read_u16_le()?;
        reader.skip(1)?; // filler
        let warning_count = reader.read_u16_le()?;

        Ok(Self {
            statement_id,
            num_columns,
            num_params,
            warning_count,
        })
    }
}

/// Decode a text-protocol row into `column_count` optional byte strings.
///
/// A cell is `None` when the wire carries the 0xFB NULL marker. The 0xFE
/// end-of-rows packet is never passed here; the result-set state machine
/// recognizes it before decoding rows.
pub fn decode_text_row(payload: &[u8], column_count: usize) -> ParseResult<Vec<Option<Bytes>>> {
    let mut reader = WireReader::new(payload);
    let mut row = Vec::with_capacity(column_count);

    for _ in 0..column_count {
        match reader.peek() {
            None => return Err(ParseError::Incomplete),
            Some(NULL_MARKER) => {
                reader.skip(1)?;
                row.push(None);
            }
            Some(_) => {
                let value = reader.read_lenenc_bytes()?;
                row.push(Some(Bytes::copy_from_slice(value)));
            }
        }
    }

    Ok(row)
}
