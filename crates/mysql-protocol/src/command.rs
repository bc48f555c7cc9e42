//! Encoders for the `COM_*` command family and the handshake response.
//!
//! Every encoder returns one complete, contiguous packet: the 4-byte
//! header followed by a 1-byte command tag (for commands) and the
//! payload.

use bytes::{BufMut, BytesMut};

use crate::capabilities::{CapabilityFlags, Charset};
use crate::codec::{lenenc_int_len, put_lenenc_bytes, put_null_terminated};
use crate::error::ParseResult;
use crate::packet::{MAX_PAYLOAD_SIZE, wrap_packet};
use crate::types::ColumnType;

/// Command tags this driver emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// Close the session.
    Quit = 0x01,
    /// Change the default database.
    InitDb = 0x02,
    /// Text-protocol query.
    Query = 0x03,
    /// Liveness check.
    Ping = 0x0E,
    /// Prepare a statement.
    StmtPrepare = 0x16,
    /// Execute a prepared statement.
    StmtExecute = 0x17,
    /// Deallocate a prepared statement.
    StmtClose = 0x19,
    /// Reset session state.
    ResetConnection = 0x1F,
}

/// Handshake response (protocol 4.1) sent after the server greeting.
#[derive(Debug, Clone, Default)]
pub struct HandshakeResponse41 {
    /// The negotiated capability word being confirmed to the server.
    pub capability_flags: CapabilityFlags,
    /// Maximum packet size the client accepts.
    pub max_packet_size: u32,
    /// Requested collation tag.
    pub character_set: u8,
    /// Account name.
    pub username: String,
    /// Scrambled password (layout depends on the capability word).
    pub auth_response: Vec<u8>,
    /// Initial database, written only under `CONNECT_WITH_DB`.
    pub database: String,
    /// Auth plugin name, written only under `PLUGIN_AUTH`.
    pub auth_plugin_name: String,
}

impl HandshakeResponse41 {
    /// Create a response with the driver defaults filled in.
    #[must_use]
    pub fn new(capability_flags: CapabilityFlags) -> Self {
        Self {
            capability_flags,
            max_packet_size: MAX_PAYLOAD_SIZE as u32,
            character_set: Charset::Utf8mb4GeneralCi as u8,
            ..Self::default()
        }
    }

    /// Encode the response into a complete packet.
    pub fn encode(&self, sequence_id: u8) -> ParseResult<bytes::Bytes> {
        let mut payload = BytesMut::with_capacity(128);

        payload.put_u32_le(self.capability_flags.bits());
        payload.put_u32_le(self.max_packet_size);
        payload.put_u8(self.character_set);
        payload.put_bytes(0, 23); // reserved

        put_null_terminated(&mut payload, self.username.as_bytes());

        if self
            .capability_flags
            .contains(CapabilityFlags::PLUGIN_AUTH_LENENC_CLIENT_DATA)
        {
            put_lenenc_bytes(&mut payload, &self.auth_response);
        } else if self
            .capability_flags
            .contains(CapabilityFlags::SECURE_CONNECTION)
        {
            payload.put_u8(self.auth_response.len() as u8);
            payload.put_slice(&self.auth_response);
        } else {
            put_null_terminated(&mut payload, &self.auth_response);
        }

        if self
            .capability_flags
            .contains(CapabilityFlags::CONNECT_WITH_DB)
        {
            put_null_terminated(&mut payload, self.database.as_bytes());
        }

        if self.capability_flags.contains(CapabilityFlags::PLUGIN_AUTH) {
            put_null_terminated(&mut payload, self.auth_plugin_name.as_bytes());
        }

        wrap_packet(&payload, sequence_id)
    }
}

fn encode_simple(command: Command, payload: &[u8], sequence_id: u8) -> ParseResult<bytes::Bytes> {
    let mut body = BytesMut::with_capacity(1 + payload.len());
    body.put_u8(command as u8);
    body.put_slice(payload);
    wrap_packet(&body, sequence_id)
}

/// Encode a `COM_QUERY` packet.
pub fn encode_query(sql: &str, sequence_id: u8) -> ParseResult<bytes::Bytes> {
    encode_simple(Command::Query, sql.as_bytes(), sequence_id)
}

/// Encode a `COM_STMT_PREPARE` packet.
pub fn encode_stmt_prepare(sql: &str, sequence_id: u8) -> ParseResult<bytes::Bytes> {
    encode_simple(Command::StmtPrepare, sql.as_bytes(), sequence_id)
}

/// Encode a `COM_STMT_EXECUTE` packet.
///
/// Emits flags 0x00 (no cursor) and iteration count 1. When parameters
/// are present, a NULL bitmap of `⌈N/8⌉` bytes follows (bit `i` set iff
/// parameter `i` is NULL), then the `new_params_bound` byte (0x01), the
/// per-parameter type pairs (type code + unsigned flag byte; parameters
/// past the end of `param_types` default to `VAR_STRING`), and finally
/// each non-NULL value as a length-encoded string.
pub fn encode_stmt_execute(
    statement_id: u32,
    params: &[Option<&[u8]>],
    param_types: &[ColumnType],
    sequence_id: u8,
) -> ParseResult<bytes::Bytes> {
    let mut reserve = 10; // tag(1) + stmt_id(4) + flags(1) + iteration_count(4)
    if !params.is_empty() {
        reserve += params.len().div_ceil(8) + 1 + params.len() * 2;
        for value in params.iter().flatten() {
            reserve += lenenc_int_len(value.len() as u64) + value.len();
        }
    }

    let mut payload = BytesMut::with_capacity(reserve);
    payload.put_u8(Command::StmtExecute as u8);
    payload.put_u32_le(statement_id);
    payload.put_u8(0x00); // CURSOR_TYPE_NO_CURSOR
    payload.put_u32_le(1); // iteration_count

    if !params.is_empty() {
        let bitmap_len = params.len().div_ceil(8);
        let bitmap_at = payload.len();
        payload.put_bytes(0, bitmap_len);
        for (i, value) in params.iter().enumerate() {
            if value.is_none() {
                payload[bitmap_at + i / 8] |= 1 << (i % 8);
            }
        }

        payload.put_u8(0x01); // new_params_bound

        for i in 0..params.len() {
            let ty = param_types.get(i).copied().unwrap_or(ColumnType::VarString);
            payload.put_u8(ty as u8);
            payload.put_u8(0x00); // signed
        }

        for value in params.iter().flatten() {
            put_lenenc_bytes(&mut payload, value);
        }
    }

    wrap_packet(&payload, sequence_id)
}

/// Encode a `COM_STMT_CLOSE` packet. The command has no response.
pub fn encode_stmt_close(statement_id: u32, sequence_id: u8) -> ParseResult<bytes::Bytes> {
    let mut payload = BytesMut::with_capacity(5);
    payload.put_u8(Command::StmtClose as u8);
    payload.put_u32_le(statement_id);
    wrap_packet(&payload, sequence_id)
}

/// Encode a `COM_QUIT` packet.
pub fn encode_quit(sequence_id: u8) -> ParseResult<bytes::Bytes> {
    encode_simple(Command::Quit, b"", sequence_id)
}

/// Encode a `COM_PING` packet.
pub fn encode_ping(sequence_id: u8) -> ParseResult<bytes::Bytes> {
    encode_simple(Command::Ping, b"", sequence_id)
}

/// Encode a `COM_INIT_DB` packet.
pub fn encode_init_db(database: &str, sequence_id: u8) -> ParseResult<bytes::Bytes> {
    encode_simple(Command::InitDb, database.as_bytes(), sequence_id)
}

/// Encode a `COM_RESET_CONNECTION` packet.
pub fn encode_reset_connection(sequence_id: u8) -> ParseResult<bytes::Bytes> {
    encode_simple(Command::ResetConnection, b"", sequence_id)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::codec::WireReader;
    use crate::packet::PacketHeader;

    #[test]
    fn test_encode_query_frame() {
        let packet = encode_query("SELECT 1", 0).unwrap();
        let header = PacketHeader::decode(&packet).unwrap();
        assert_eq!(header.payload_len, 9);
        assert_eq!(header.sequence_id, 0);
        assert_eq!(packet[4], Command::Query as u8);
        assert_eq!(&packet[5..], b"SELECT 1");
    }

    #[test]
    fn test_encode_simple_commands() {
        let ping = encode_ping(0).unwrap();
        assert_eq!(&ping[..], &[0x01, 0x00, 0x00, 0x00, 0x0E]);

        let quit = encode_quit(0).unwrap();
        assert_eq!(quit[4], 0x01);

        let init = encode_init_db("test_db", 0).unwrap();
        assert_eq!(init[4], 0x02);
        assert_eq!(&init[5..], b"test_db");

        let reset = encode_reset_connection(0).unwrap();
        assert_eq!(reset[4], 0x1F);
    }

    #[test]
    fn test_encode_stmt_close() {
        let packet = encode_stmt_close(7, 0).unwrap();
        assert_eq!(&packet[..], &[0x05, 0x00, 0x00, 0x00, 0x19, 0x07, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_encode_stmt_execute_no_params() {
        let packet = encode_stmt_execute(3, &[], &[], 0).unwrap();
        let header = PacketHeader::decode(&packet).unwrap();
        assert_eq!(header.payload_len, 10);
        assert_eq!(packet[4], Command::StmtExecute as u8);
        assert_eq!(&packet[5..9], &[3, 0, 0, 0]); // statement id
        assert_eq!(packet[9], 0x00); // no cursor
        assert_eq!(&packet[10..14], &[1, 0, 0, 0]); // iteration count
    }

    #[test]
    fn test_encode_stmt_execute_with_null_param() {
        let params: [Option<&[u8]>; 2] = [Some(b"Charlie"), None];
        let packet = encode_stmt_execute(3, &params, &[], 0).unwrap();
        let payload = &packet[4..];

        // tag + stmt_id + flags + iteration_count
        assert_eq!(payload[0], 0x17);
        // NULL bitmap: bit 1 set for the second parameter
        assert_eq!(payload[10], 0b0000_0010);
        // new_params_bound
        assert_eq!(payload[11], 0x01);
        // two type pairs, both defaulting to VAR_STRING
        assert_eq!(&payload[12..16], &[0xFD, 0x00, 0xFD, 0x00]);
        // single non-NULL value
        let mut reader = WireReader::new(&payload[16..]);
        assert_eq!(reader.read_lenenc_bytes().unwrap(), b"Charlie");
        assert!(reader.is_empty());
    }

    #[test]
    fn test_encode_stmt_execute_explicit_types() {
        let params: [Option<&[u8]>; 2] = [Some(b"7"), Some(b"x")];
        let packet =
            encode_stmt_execute(1, &params, &[ColumnType::LongLong], 0).unwrap();
        let payload = &packet[4..];
        // first typed LONGLONG, second defaults to VAR_STRING
        assert_eq!(&payload[12..16], &[0x08, 0x00, 0xFD, 0x00]);
    }

    #[test]
    fn test_handshake_response_layout() {
        let caps = CapabilityFlags::client_baseline() | CapabilityFlags::CONNECT_WITH_DB;
        let mut resp = HandshakeResponse41::new(caps);
        resp.username = "root".into();
        resp.auth_response = vec![0xAA; 20];
        resp.database = "test_db".into();
        resp.auth_plugin_name = "mysql_native_password".into();

        let packet = resp.encode(1).unwrap();
        let header = PacketHeader::decode(&packet).unwrap();
        assert_eq!(header.sequence_id, 1);

        let mut reader = WireReader::new(&packet[4..]);
        assert_eq!(reader.read_u32_le().unwrap(), caps.bits());
        assert_eq!(reader.read_u32_le().unwrap(), MAX_PAYLOAD_SIZE as u32);
        assert_eq!(reader.read_u8().unwrap(), 45);
        reader.skip(23).unwrap();
        assert_eq!(reader.read_null_terminated().unwrap(), b"root");
        // lenenc auth data under PLUGIN_AUTH_LENENC_CLIENT_DATA
        assert_eq!(reader.read_lenenc_bytes().unwrap(), &[0xAA; 20][..]);
        assert_eq!(reader.read_null_terminated().unwrap(), b"test_db");
        assert_eq!(
            reader.read_null_terminated().unwrap(),
            b"mysql_native_password"
        );
        assert!(reader.is_empty());
    }

    #[test]
    fn test_handshake_response_length_prefixed_auth() {
        // Without PLUGIN_AUTH_LENENC_CLIENT_DATA the auth response is a
        // single length byte followed by the raw bytes.
        let caps = CapabilityFlags::PROTOCOL_41 | CapabilityFlags::SECURE_CONNECTION;
        let mut resp = HandshakeResponse41::new(caps);
        resp.username = "root".into();
        resp.auth_response = vec![0xBB; 20];

        let packet = resp.encode(1).unwrap();
        let mut reader = WireReader::new(&packet[4..]);
        reader.skip(4 + 4 + 1 + 23).unwrap();
        assert_eq!(reader.read_null_terminated().unwrap(), b"root");
        assert_eq!(reader.read_u8().unwrap(), 20);
        assert_eq!(reader.read_bytes(20).unwrap(), &[0xBB; 20][..]);
        assert!(reader.is_empty());
    }
}
