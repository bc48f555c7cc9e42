//! Mock MySQL server implementation.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use mysql_protocol::capabilities::CapabilityFlags;
use mysql_protocol::codec::{NULL_MARKER, WireReader, put_lenenc_bytes, put_lenenc_int};
use mysql_protocol::command::Command;
use mysql_protocol::packet::{PACKET_HEADER_SIZE, PacketHeader, wrap_packet};
use thiserror::Error;

/// Fixed 20-byte auth challenge the mock always issues.
pub const MOCK_SALT: &[u8; 20] = b"abcdefghijklmnopqrst";

/// Error type for mock server operations.
#[derive(Debug, Error)]
pub enum MockServerError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The client violated the protocol.
    #[error("protocol error: {0}")]
    Protocol(String),
}

type Result<T> = std::result::Result<T, MockServerError>;

/// Scripted response to a query or statement execution.
#[derive(Clone)]
pub enum MockResponse {
    /// A result set with columns and rows (`None` cells are SQL NULL).
    Rows {
        /// Column definitions.
        columns: Vec<MockColumn>,
        /// Row data in text form.
        rows: Vec<Vec<Option<String>>>,
    },

    /// An OK response for a non-SELECT command.
    Ok {
        /// Affected row count.
        affected_rows: u64,
        /// Assigned auto-increment id.
        last_insert_id: u64,
        /// Info string.
        info: String,
    },

    /// A server ERR packet.
    Error {
        /// Server errno.
        errno: u16,
        /// Error message.
        message: String,
    },

    /// Compute the response from the SQL text at dispatch time.
    Custom(Arc<dyn Fn(&str) -> MockResponse + Send + Sync>),
}

impl fmt::Debug for MockResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rows { columns, rows } => f
                .debug_struct("Rows")
                .field("columns", columns)
                .field("rows", &rows.len())
                .finish(),
            Self::Ok {
                affected_rows,
                last_insert_id,
                ..
            } => f
                .debug_struct("Ok")
                .field("affected_rows", affected_rows)
                .field("last_insert_id", last_insert_id)
                .finish(),
            Self::Error { errno, message } => f
                .debug_struct("Error")
                .field("errno", errno)
                .field("message", message)
                .finish(),
            Self::Custom(_) => f.debug_tuple("Custom").field(&"<fn>").finish(),
        }
    }
}

impl MockResponse {
    /// A result set response.
    #[must_use]
    pub fn rows(columns: Vec<MockColumn>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self::Rows { columns, rows }
    }

    /// A single-cell result set named after its value.
    #[must_use]
    pub fn scalar(name: &str, value: &str) -> Self {
        Self::Rows {
            columns: vec![MockColumn::new(name)],
            rows: vec![vec![Some(value.to_string())]],
        }
    }

    /// An OK response with an affected-row count.
    #[must_use]
    pub fn affected(rows: u64) -> Self {
        Self::Ok {
            affected_rows: rows,
            last_insert_id: 0,
            info: String::new(),
        }
    }

    /// An OK response with an affected-row count and insert id.
    #[must_use]
    pub fn inserted(rows: u64, last_insert_id: u64) -> Self {
        Self::Ok {
            affected_rows: rows,
            last_insert_id,
            info: String::new(),
        }
    }

    /// An empty OK response.
    #[must_use]
    pub fn empty() -> Self {
        Self::affected(0)
    }

    /// A server error response.
    #[must_use]
    pub fn error(errno: u16, message: impl Into<String>) -> Self {
        Self::Error {
            errno,
            message: message.into(),
        }
    }

    /// A dynamic response computed per dispatch.
    #[must_use]
    pub fn custom(f: impl Fn(&str) -> MockResponse + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(f))
    }
}

/// Column definition for scripted result sets.
#[derive(Debug, Clone)]
pub struct MockColumn {
    /// Column name.
    pub name: String,
    /// Wire type code; defaults to VAR_STRING (0xFD).
    pub type_code: u8,
}

impl MockColumn {
    /// A VAR_STRING column.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_code: 0xFD,
        }
    }

    /// Override the wire type code.
    #[must_use]
    pub fn with_type(mut self, type_code: u8) -> Self {
        self.type_code = type_code;
        self
    }
}

/// Scripted `COM_STMT_PREPARE` outcome.
#[derive(Debug, Clone)]
pub struct MockPrepare {
    /// Number of `?` placeholders to report.
    pub num_params: u16,
    /// Number of result columns to report.
    pub num_columns: u16,
    /// Response to `COM_STMT_EXECUTE` on this statement.
    pub execute: MockResponse,
}

/// Script shared by every accepted connection.
struct Script {
    responses: HashMap<String, MockResponse>,
    prepares: HashMap<String, MockPrepare>,
    password: String,
    auth_plugin: String,
    deprecate_eof: bool,
}

impl Script {
    fn lookup(&self, sql: &str) -> MockResponse {
        if let Some(response) = self.responses.get(sql) {
            return response.clone();
        }
        // Defaults that keep the facade's helper commands working
        // without explicit scripting.
        if sql == "SELECT 1" {
            return MockResponse::scalar("1", "1");
        }
        MockResponse::empty()
    }
}

/// Builder for [`MockMysqlServer`].
pub struct MockServerBuilder {
    script: Script,
}

impl Default for MockServerBuilder {
    fn default() -> Self {
        Self {
            script: Script {
                responses: HashMap::new(),
                prepares: HashMap::new(),
                password: String::new(),
                auth_plugin: "mysql_native_password".into(),
                deprecate_eof: false,
            },
        }
    }
}

impl MockServerBuilder {
    /// Script the response for an exact SQL string.
    #[must_use]
    pub fn with_response(mut self, sql: impl Into<String>, response: MockResponse) -> Self {
        self.script.responses.insert(sql.into(), response);
        self
    }

    /// Script a prepared statement for an exact SQL string.
    #[must_use]
    pub fn with_prepare(mut self, sql: impl Into<String>, prepare: MockPrepare) -> Self {
        self.script.prepares.insert(sql.into(), prepare);
        self
    }

    /// Require this account password (empty by default).
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.script.password = password.into();
        self
    }

    /// Advertise this auth plugin (default `mysql_native_password`).
    #[must_use]
    pub fn with_auth_plugin(mut self, plugin: impl Into<String>) -> Self {
        self.script.auth_plugin = plugin.into();
        self
    }

    /// Advertise `CLIENT_DEPRECATE_EOF`.
    ///
    /// The modern result-set framing is used only when the client also
    /// requests the capability; the framing decision follows the
    /// negotiated word, as on a real server.
    #[must_use]
    pub fn with_deprecate_eof(mut self) -> Self {
        self.script.deprecate_eof = true;
        self
    }

    /// Bind to an ephemeral localhost port and start serving.
    pub async fn start(self) -> Result<MockMysqlServer> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let script = Arc::new(self.script);

        let accept_script = Arc::clone(&script);
        let handle = tokio::spawn(async move {
            let mut connection_id = 0u32;
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        connection_id += 1;
                        tracing::debug!(%peer, connection_id, "mock server accepted");
                        let script = Arc::clone(&accept_script);
                        tokio::spawn(async move {
                            if let Err(e) = serve_connection(stream, connection_id, script).await {
                                tracing::debug!(error = %e, "mock connection ended");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "mock server accept failed");
                        break;
                    }
                }
            }
        });

        Ok(MockMysqlServer { addr, handle })
    }
}

/// A running mock server. Stops when dropped.
pub struct MockMysqlServer {
    addr: SocketAddr,
    handle: tokio::task::JoinHandle<()>,
}

impl MockMysqlServer {
    /// Start building a server.
    #[must_use]
    pub fn builder() -> MockServerBuilder {
        MockServerBuilder::default()
    }

    /// The address the server is listening on.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The host string for client configuration.
    #[must_use]
    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    /// The port for client configuration.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

impl Drop for MockMysqlServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Per-connection state.
struct Session {
    stream: TcpStream,
    script: Arc<Script>,
    /// Statements prepared on this connection, by id.
    statements: HashMap<u32, MockPrepare>,
    next_statement_id: u32,
    /// Intersection of advertised and requested capabilities; drives the
    /// result-set framing.
    negotiated: CapabilityFlags,
}

async fn serve_connection(stream: TcpStream, connection_id: u32, script: Arc<Script>) -> Result<()> {
    let mut session = Session {
        stream,
        script,
        statements: HashMap::new(),
        next_statement_id: 1,
        negotiated: CapabilityFlags::empty(),
    };

    session.handshake(connection_id).await?;

    loop {
        let (_, payload) = match session.read_packet().await {
            Ok(packet) => packet,
            // Client went away; a mock does not distinguish how.
            Err(_) => return Ok(()),
        };
        let Some(&tag) = payload.first() else {
            return Err(MockServerError::Protocol("empty command packet".into()));
        };

        match tag {
            t if t == Command::Query as u8 => {
                let sql = String::from_utf8_lossy(&payload[1..]).into_owned();
                tracing::trace!(sql = %sql, "mock query");
                let response = session.script.lookup(&sql).resolve(&sql);
                session.send_response(&response).await?;
            }
            t if t == Command::StmtPrepare as u8 => {
                let sql = String::from_utf8_lossy(&payload[1..]).into_owned();
                session.handle_prepare(&sql).await?;
            }
            t if t == Command::StmtExecute as u8 => {
                session.handle_execute(&payload).await?;
            }
            t if t == Command::StmtClose as u8 => {
                // No response on the wire.
                if payload.len() >= 5 {
                    let id = u32::from_le_bytes([payload[1], payload[2], payload[3], payload[4]]);
                    session.statements.remove(&id);
                }
            }
            t if t == Command::Quit as u8 => return Ok(()),
            t if t == Command::Ping as u8 || t == Command::InitDb as u8 => {
                let ok = ok_payload(0, 0, "", 0x00);
                session.send_frames(&[ok]).await?;
            }
            other => {
                let err = err_payload(1047, &format!("Unknown command 0x{other:02X}"));
                session.send_frames(&[err]).await?;
            }
        }
    }
}

impl MockResponse {
    fn resolve(&self, sql: &str) -> MockResponse {
        match self {
            Self::Custom(f) => f(sql).resolve(sql),
            other => other.clone(),
        }
    }
}

impl Session {
    async fn handshake(&mut self, connection_id: u32) -> Result<()> {
        let mut caps = CapabilityFlags::client_baseline()
            | CapabilityFlags::CONNECT_WITH_DB
            | CapabilityFlags::SESSION_TRACK;
        if self.script.deprecate_eof {
            caps |= CapabilityFlags::DEPRECATE_EOF;
        }

        let greeting = greeting_payload(connection_id, caps, &self.script.auth_plugin);
        self.write_frame(&greeting, 0).await?;

        let (seq, payload) = self.read_packet().await?;
        let (username, auth_response, negotiated) = parse_handshake_response(&payload, caps)?;
        self.negotiated = negotiated;
        tracing::trace!(username = %username, "mock auth attempt");

        let expected = match self.script.auth_plugin.as_str() {
            "caching_sha2_password" => {
                mysql_auth::caching_sha2_scramble(&self.script.password, MOCK_SALT)
            }
            _ => mysql_auth::native_password_scramble(&self.script.password, MOCK_SALT),
        };

        let mut next_seq = seq.wrapping_add(1);
        if auth_response != expected {
            let err = err_payload(1045, &format!("Access denied for user '{username}'"));
            self.write_frame(&err, next_seq).await?;
            return Err(MockServerError::Protocol("bad credentials".into()));
        }

        if self.script.auth_plugin == "caching_sha2_password" && !self.script.password.is_empty() {
            // Fast-auth success status precedes the real OK.
            self.write_frame(&[0x01, 0x03], next_seq).await?;
            next_seq = next_seq.wrapping_add(1);
        }
        self.write_frame(&ok_payload(0, 0, "", 0x00), next_seq).await?;
        Ok(())
    }

    async fn handle_prepare(&mut self, sql: &str) -> Result<()> {
        let Some(prepare) = self.script.prepares.get(sql).cloned() else {
            let err = err_payload(1064, &format!("Cannot prepare: {sql}"));
            return self.send_frames(&[err]).await;
        };

        let statement_id = self.next_statement_id;
        self.next_statement_id += 1;

        let mut frames = Vec::new();
        let mut header = BytesMut::with_capacity(12);
        header.put_u8(0x00);
        header.put_u32_le(statement_id);
        header.put_u16_le(prepare.num_columns);
        header.put_u16_le(prepare.num_params);
        header.put_u8(0x00);
        header.put_u16_le(0);
        frames.push(header.to_vec());

        let deprecate_eof = self.negotiated.contains(CapabilityFlags::DEPRECATE_EOF);
        if prepare.num_params > 0 {
            for i in 0..prepare.num_params {
                frames.push(column_payload(&MockColumn::new(format!("param{i}"))));
            }
            if !deprecate_eof {
                frames.push(eof_payload(0x00));
            }
        }
        if prepare.num_columns > 0 {
            for i in 0..prepare.num_columns {
                frames.push(column_payload(&MockColumn::new(format!("col{i}"))));
            }
            if !deprecate_eof {
                frames.push(eof_payload(0x00));
            }
        }

        self.statements.insert(statement_id, prepare);
        self.send_frames(&frames).await
    }

    async fn handle_execute(&mut self, payload: &[u8]) -> Result<()> {
        if payload.len() < 5 {
            let err = err_payload(1243, "Malformed COM_STMT_EXECUTE");
            return self.send_frames(&[err]).await;
        }
        let id = u32::from_le_bytes([payload[1], payload[2], payload[3], payload[4]]);
        let Some(prepare) = self.statements.get(&id).cloned() else {
            let err = err_payload(1243, "Unknown prepared statement handler");
            return self.send_frames(&[err]).await;
        };
        let response = prepare.execute.resolve("");
        self.send_response(&response).await
    }

    async fn send_response(&mut self, response: &MockResponse) -> Result<()> {
        let frames = match response {
            MockResponse::Ok {
                affected_rows,
                last_insert_id,
                info,
            } => vec![ok_payload(*affected_rows, *last_insert_id, info, 0x00)],
            MockResponse::Error { errno, message } => vec![err_payload(*errno, message)],
            MockResponse::Rows { columns, rows } => {
                let deprecate_eof = self.negotiated.contains(CapabilityFlags::DEPRECATE_EOF);
                let mut frames = Vec::with_capacity(columns.len() + rows.len() + 3);
                let mut count = BytesMut::new();
                put_lenenc_int(&mut count, columns.len() as u64);
                frames.push(count.to_vec());
                for column in columns {
                    frames.push(column_payload(column));
                }
                if !deprecate_eof {
                    frames.push(eof_payload(0x00));
                }
                for row in rows {
                    frames.push(row_payload(row));
                }
                if deprecate_eof {
                    frames.push(terminal_ok_payload(0x00));
                } else {
                    frames.push(eof_payload(0x00));
                }
                frames
            }
            MockResponse::Custom(_) => {
                return Err(MockServerError::Protocol(
                    "custom response was not resolved".into(),
                ));
            }
        };
        self.send_frames(&frames).await
    }

    /// Write `frames` as consecutive packets with sequence ids 1, 2, ...
    async fn send_frames(&mut self, frames: &[Vec<u8>]) -> Result<()> {
        for (i, frame) in frames.iter().enumerate() {
            self.write_frame(frame, (i + 1) as u8).await?;
        }
        Ok(())
    }

    async fn write_frame(&mut self, payload: &[u8], sequence_id: u8) -> Result<()> {
        let packet = wrap_packet(payload, sequence_id)
            .map_err(|e| MockServerError::Protocol(format!("frame too large: {e}")))?;
        self.stream.write_all(&packet).await?;
        Ok(())
    }

    async fn read_packet(&mut self) -> Result<(u8, Vec<u8>)> {
        let mut header = [0u8; PACKET_HEADER_SIZE];
        self.stream.read_exact(&mut header).await?;
        let header = PacketHeader::decode(&header)
            .map_err(|e| MockServerError::Protocol(format!("bad header: {e}")))?;
        let mut payload = vec![0u8; header.payload_len as usize];
        self.stream.read_exact(&mut payload).await?;
        Ok((header.sequence_id, payload))
    }
}

fn greeting_payload(connection_id: u32, caps: CapabilityFlags, plugin: &str) -> Vec<u8> {
    let mut payload = BytesMut::with_capacity(96);
    payload.put_u8(10);
    payload.put_slice(b"8.0.0-mock\0");
    payload.put_u32_le(connection_id);
    payload.put_slice(&MOCK_SALT[..8]);
    payload.put_u8(0);
    payload.put_u16_le((caps.bits() & 0xFFFF) as u16);
    payload.put_u8(45); // utf8mb4_general_ci
    payload.put_u16_le(0x0002); // autocommit
    payload.put_u16_le((caps.bits() >> 16) as u16);
    payload.put_u8(21); // auth data length
    payload.put_bytes(0, 10);
    payload.put_slice(&MOCK_SALT[8..]);
    payload.put_u8(0);
    payload.put_slice(plugin.as_bytes());
    payload.put_u8(0);
    payload.to_vec()
}

fn parse_handshake_response(
    payload: &[u8],
    server_caps: CapabilityFlags,
) -> Result<(String, Vec<u8>, CapabilityFlags)> {
    let mut reader = WireReader::new(payload);
    let malformed = |e| MockServerError::Protocol(format!("bad handshake response: {e}"));

    let client_caps =
        CapabilityFlags::from_bits_retain(reader.read_u32_le().map_err(malformed)?);
    let negotiated = client_caps & server_caps;
    reader.skip(4).map_err(malformed)?; // max packet size
    reader.skip(1).map_err(malformed)?; // charset
    reader.skip(23).map_err(malformed)?; // reserved

    let username = reader.read_null_terminated_string().map_err(malformed)?;

    let auth = if negotiated.contains(CapabilityFlags::PLUGIN_AUTH_LENENC_CLIENT_DATA) {
        reader.read_lenenc_bytes().map_err(malformed)?.to_vec()
    } else if negotiated.contains(CapabilityFlags::SECURE_CONNECTION) {
        let len = reader.read_u8().map_err(malformed)? as usize;
        reader.read_bytes(len).map_err(malformed)?.to_vec()
    } else {
        reader.read_null_terminated().map_err(malformed)?.to_vec()
    };

    Ok((username, auth, negotiated))
}

fn ok_payload(affected_rows: u64, last_insert_id: u64, info: &str, status: u16) -> Vec<u8> {
    let mut payload = BytesMut::new();
    payload.put_u8(0x00);
    put_lenenc_int(&mut payload, affected_rows);
    put_lenenc_int(&mut payload, last_insert_id);
    payload.put_u16_le(status | 0x0002);
    payload.put_u16_le(0); // warnings
    payload.put_slice(info.as_bytes());
    payload.to_vec()
}

/// The short OK that replaces the terminal EOF under `DEPRECATE_EOF`.
fn terminal_ok_payload(status: u16) -> Vec<u8> {
    let mut payload = BytesMut::new();
    payload.put_u8(0xFE);
    put_lenenc_int(&mut payload, 0);
    put_lenenc_int(&mut payload, 0);
    payload.put_u16_le(status | 0x0002);
    payload.put_u16_le(0);
    payload.to_vec()
}

fn err_payload(errno: u16, message: &str) -> Vec<u8> {
    let mut payload = BytesMut::new();
    payload.put_u8(0xFF);
    payload.put_u16_le(errno);
    payload.put_u8(b'#');
    payload.put_slice(b"HY000");
    payload.put_slice(message.as_bytes());
    payload.to_vec()
}

fn eof_payload(status: u16) -> Vec<u8> {
    let mut payload = BytesMut::new();
    payload.put_u8(0xFE);
    payload.put_u16_le(0); // warnings
    payload.put_u16_le(status | 0x0002);
    payload.to_vec()
}

fn column_payload(column: &MockColumn) -> Vec<u8> {
    let mut payload = BytesMut::new();
    put_lenenc_bytes(&mut payload, b"def");
    put_lenenc_bytes(&mut payload, b"mock");
    put_lenenc_bytes(&mut payload, b"t");
    put_lenenc_bytes(&mut payload, b"t");
    put_lenenc_bytes(&mut payload, column.name.as_bytes());
    put_lenenc_bytes(&mut payload, column.name.as_bytes());
    payload.put_u8(0x0C);
    payload.put_u16_le(45);
    payload.put_u32_le(255);
    payload.put_u8(column.type_code);
    payload.put_u16_le(0);
    payload.put_u8(0);
    payload.put_u16_le(0); // filler
    payload.to_vec()
}

fn row_payload(row: &[Option<String>]) -> Vec<u8> {
    let mut payload = BytesMut::new();
    for cell in row {
        match cell {
            Some(value) => put_lenenc_bytes(&mut payload, value.as_bytes()),
            None => payload.put_u8(NULL_MARKER),
        }
    }
    payload.to_vec()
}
