//! Async MySQL client implementation.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;

use mysql_auth::{caching_sha2, plugins};
use mysql_codec::{CodecError, Connection, Packet};
use mysql_protocol::capabilities::{CapabilityFlags, Charset};
use mysql_protocol::command::{
    self, HandshakeResponse41, encode_query, encode_stmt_close, encode_stmt_execute,
    encode_stmt_prepare,
};
use mysql_protocol::packet::MAX_PAYLOAD_SIZE;
use mysql_protocol::response::{
    ColumnDefinition, EofPacket, ErrPacket, HandshakeV10, OkPacket, ResponseKind, StmtPrepareOk,
    decode_text_row,
};
use mysql_protocol::types::ColumnType;

use crate::config::{ClientConfig, MysqlConfig};
use crate::error::{Error, Result};
use crate::result::{Field, PreparedStatement, ResultSet, Row};

/// Which command family a response is being parsed for.
///
/// `COM_STMT_EXECUTE` responses carry binary-protocol rows, which this
/// driver does not decode; the execute path therefore rejects result-set
/// responses instead of misreading them as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResponseContext {
    Query,
    StmtExecute,
}

/// An authenticated MySQL session over one TCP connection.
///
/// At most one command may be in flight at a time; the `&mut self`
/// receivers enforce that at compile time. Issue command N+1 only after
/// command N resolved, and close the connection after any non-`Server`
/// error — the protocol stream is in an unspecified state then.
///
/// # Example
///
/// ```rust,ignore
/// use mysql_client::{Client, ClientConfig, MysqlConfig};
///
/// let config = MysqlConfig::create("127.0.0.1", 3306, "root", "secret");
/// let mut client = Client::connect(&config, ClientConfig::default()).await?;
/// let result = client.query("SELECT id, v FROM t").await?;
/// for row in result.rows() {
///     println!("{} -> {}", row.get_i64(0), row.get_string(1));
/// }
/// client.close().await?;
/// ```
pub struct Client {
    conn: Connection<TcpStream>,
    options: ClientConfig,
    capabilities: CapabilityFlags,
    closed: bool,
}

impl Client {
    /// Connect and authenticate.
    ///
    /// Drives the four-stage exchange: TCP connect, server greeting,
    /// handshake response with the scrambled password, auth result.
    pub async fn connect(config: &MysqlConfig, options: ClientConfig) -> Result<Self> {
        tracing::debug!(
            host = %config.host,
            port = config.port,
            database = ?config.database,
            "connecting to MySQL"
        );

        let addr = format!("{}:{}", config.host, config.port);
        let stream = timeout(config.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| Error::Timeout)?
            .map_err(|e| Error::Connection(e.to_string()))?;
        stream
            .set_nodelay(true)
            .map_err(|e| Error::Connection(e.to_string()))?;

        let mut conn = Connection::new(stream, options.buffer_size);

        let greeting = recv_with_timeout(&mut conn, options.recv_timeout).await?;
        let first = greeting
            .first_byte()
            .ok_or_else(|| Error::Protocol("empty greeting packet".into()))?;
        if first == 0xFF {
            // The server refused before the handshake (host blocked etc.).
            let err = decode_err(&greeting.payload, CapabilityFlags::PROTOCOL_41)?;
            return Err(Error::Server {
                errno: err.error_code,
                message: err.error_message,
            });
        }

        let handshake = HandshakeV10::decode(&greeting.payload)
            .map_err(|e| Error::Protocol(format!("malformed server greeting: {e}")))?;
        tracing::debug!(
            server_version = %handshake.server_version,
            connection_id = handshake.connection_id,
            plugin = %handshake.auth_plugin_name,
            "received server greeting"
        );

        let mut requested = CapabilityFlags::client_baseline();
        if config.database.is_some() {
            requested |= CapabilityFlags::CONNECT_WITH_DB;
        }
        let capabilities = requested & handshake.capability_flags;

        let (auth_response, plugin) = scramble_for_plugin(
            &handshake.auth_plugin_name,
            &config.password,
            &handshake.auth_plugin_data,
        );

        let mut response = HandshakeResponse41::new(capabilities);
        response.character_set = Charset::from_name(&config.charset) as u8;
        response.username = config.username.clone();
        response.auth_response = auth_response;
        response.database = config.database.clone().unwrap_or_default();
        response.auth_plugin_name = plugin.to_string();

        let auth_packet = response
            .encode(greeting.sequence_id.wrapping_add(1))
            .map_err(|e| Error::Internal(format!("handshake response encode: {e}")))?;
        send_with_timeout(&mut conn, options.send_timeout, &auth_packet).await?;

        read_auth_result(&mut conn, options.recv_timeout, capabilities).await?;

        tracing::debug!(host = %config.host, port = config.port, "MySQL session authenticated");

        Ok(Self {
            conn,
            options,
            capabilities,
            closed: false,
        })
    }

    /// The capability word negotiated during the handshake.
    #[must_use]
    pub fn capabilities(&self) -> CapabilityFlags {
        self.capabilities
    }

    /// Whether `close` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Run a text-protocol query and collect the full response.
    pub async fn query(&mut self, sql: &str) -> Result<ResultSet> {
        self.ensure_open()?;
        tracing::trace!(sql, "query");
        let packet = encode_query(sql, 0)
            .map_err(|_| Error::InvalidParam("query exceeds the maximum packet size".into()))?;
        self.send(&packet).await?;
        self.read_command_response(ResponseContext::Query).await
    }

    /// Prepare a statement and return its handle.
    pub async fn prepare(&mut self, sql: &str) -> Result<PreparedStatement> {
        self.ensure_open()?;
        tracing::trace!(sql, "prepare");
        let packet = encode_stmt_prepare(sql, 0)
            .map_err(|_| Error::InvalidParam("statement exceeds the maximum packet size".into()))?;
        self.send(&packet).await?;

        let packet = self.recv().await?;
        let first = first_byte(&packet)?;
        if first == 0xFF {
            let err = decode_err(&packet.payload, self.capabilities)?;
            return Err(Error::PreparedStmt {
                errno: err.error_code,
                message: err.error_message,
            });
        }
        let ok = StmtPrepareOk::decode(&packet.payload)
            .map_err(|e| Error::Protocol(format!("malformed COM_STMT_PREPARE response: {e}")))?;

        let params = self.read_definition_block(ok.num_params as usize).await?;
        let columns = self.read_definition_block(ok.num_columns as usize).await?;

        tracing::trace!(
            statement_id = ok.statement_id,
            num_params = ok.num_params,
            num_columns = ok.num_columns,
            "statement prepared"
        );
        Ok(PreparedStatement::new(ok.statement_id, params, columns))
    }

    /// Execute a prepared statement with all parameters typed as
    /// `VAR_STRING`.
    ///
    /// Only statements that produce no result set (INSERT, UPDATE,
    /// DELETE and friends) are supported; a SELECT through this path
    /// fails with a `PreparedStmt` error because binary-protocol rows
    /// are not decoded. Use [`Client::query`] for reads.
    pub async fn stmt_execute(
        &mut self,
        statement_id: u32,
        params: &[Option<&str>],
    ) -> Result<ResultSet> {
        self.stmt_execute_typed(statement_id, params, &[]).await
    }

    /// Execute a prepared statement with explicit parameter types.
    ///
    /// Parameters beyond the end of `param_types` default to
    /// `VAR_STRING`. See [`Client::stmt_execute`] for the result-set
    /// restriction.
    pub async fn stmt_execute_typed(
        &mut self,
        statement_id: u32,
        params: &[Option<&str>],
        param_types: &[ColumnType],
    ) -> Result<ResultSet> {
        self.ensure_open()?;
        tracing::trace!(statement_id, params = params.len(), "stmt_execute");

        let values: Vec<Option<&[u8]>> = params.iter().map(|p| p.map(str::as_bytes)).collect();
        let packet = encode_stmt_execute(statement_id, &values, param_types, 0)
            .map_err(|_| Error::InvalidParam("parameters exceed the maximum packet size".into()))?;
        self.send(&packet).await?;
        self.read_command_response(ResponseContext::StmtExecute).await
    }

    /// Deallocate a server-side prepared statement.
    ///
    /// `COM_STMT_CLOSE` has no response; this only sends the command.
    pub async fn stmt_close(&mut self, statement_id: u32) -> Result<()> {
        self.ensure_open()?;
        let packet = encode_stmt_close(statement_id, 0)
            .map_err(|e| Error::Internal(format!("stmt close encode: {e}")))?;
        self.send(&packet).await?;
        tracing::trace!(statement_id, "statement closed");
        Ok(())
    }

    /// Open a transaction (`BEGIN`).
    pub async fn begin_transaction(&mut self) -> Result<ResultSet> {
        self.query("BEGIN").await
    }

    /// Commit the open transaction.
    pub async fn commit(&mut self) -> Result<ResultSet> {
        self.query("COMMIT").await
    }

    /// Roll back the open transaction.
    pub async fn rollback(&mut self) -> Result<ResultSet> {
        self.query("ROLLBACK").await
    }

    /// Liveness check (`SELECT 1`).
    pub async fn ping(&mut self) -> Result<ResultSet> {
        self.query("SELECT 1").await
    }

    /// Switch the default database.
    ///
    /// The identifier is backtick-quoted; names containing NUL are
    /// rejected before any bytes reach the wire.
    pub async fn use_database(&mut self, database: &str) -> Result<ResultSet> {
        let quoted = quote_identifier(database)?;
        self.query(&format!("USE {quoted}")).await
    }

    /// Close the session: best-effort `COM_QUIT`, then socket shutdown.
    ///
    /// Subsequent commands fail with [`Error::ConnectionClosed`].
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        // The server never answers COM_QUIT; ignore a failing send on an
        // already-broken socket.
        if let Ok(quit) = command::encode_quit(0) {
            let _ = self.conn.send(&quit).await;
        }
        self.conn.shutdown().await.map_err(Error::from_send)?;
        tracing::debug!("MySQL session closed");
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }
        Ok(())
    }

    async fn send(&mut self, packet: &[u8]) -> Result<()> {
        send_with_timeout(&mut self.conn, self.options.send_timeout, packet).await
    }

    async fn recv(&mut self) -> Result<Packet> {
        recv_with_timeout(&mut self.conn, self.options.recv_timeout).await
    }

    /// Drive the text-protocol result-set state machine.
    async fn read_command_response(&mut self, context: ResponseContext) -> Result<ResultSet> {
        let mut result = ResultSet::with_row_hint(self.options.result_row_reserve_hint);

        // ReceivingHeader
        let packet = self.recv().await?;
        let first = first_byte(&packet)?;
        let column_count = match ResponseKind::identify(first, packet.payload.len()) {
            ResponseKind::Ok => {
                let ok = decode_ok(&packet.payload, self.capabilities)?;
                self.finalize(&mut result, ok);
                return Ok(result);
            }
            ResponseKind::Err => return Err(self.server_error(&packet)?),
            ResponseKind::Eof => {
                return Err(Error::Protocol("EOF packet in response position".into()));
            }
            ResponseKind::LocalInfile => {
                return Err(Error::Protocol("LOCAL INFILE is not supported".into()));
            }
            ResponseKind::ResultSetHeader => {
                let mut reader = mysql_protocol::codec::WireReader::new(&packet.payload);
                reader
                    .read_lenenc_int()
                    .map_err(|e| Error::Protocol(format!("malformed column count: {e}")))?
            }
        };

        if context == ResponseContext::StmtExecute {
            // Binary-protocol rows are not decoded; see Client::stmt_execute.
            return Err(Error::PreparedStmt {
                errno: 0,
                message: "statement produced a result set; binary result sets are not \
                          supported, use query() for reads"
                    .into(),
            });
        }

        let column_count = usize::try_from(column_count)
            .map_err(|_| Error::Protocol("column count out of range".into()))?;
        result.reserve_fields(column_count);

        // ReceivingColumns
        for _ in 0..column_count {
            let packet = self.recv().await?;
            if first_byte(&packet)? == 0xFF {
                return Err(self.server_error(&packet)?);
            }
            let def = decode_column(&packet.payload)?;
            result.push_field(Field::from_definition(def));
        }

        // ReceivingColumnEof (legacy layout only)
        if !self.capabilities.contains(CapabilityFlags::DEPRECATE_EOF) {
            self.expect_eof().await?;
        }

        // ReceivingRows
        loop {
            let packet = self.recv().await?;
            let first = first_byte(&packet)?;

            // 0xFE terminates the rows only when the payload is shorter
            // than the 16 MiB continuation threshold; a longer payload is
            // a row that merely starts with that byte value.
            if first == 0xFE && packet.payload.len() < MAX_PAYLOAD_SIZE {
                if self.capabilities.contains(CapabilityFlags::DEPRECATE_EOF) {
                    let ok = decode_ok(&packet.payload, self.capabilities)?;
                    result.set_terminal_status(ok.warnings, ok.status_flags);
                } else {
                    let eof = EofPacket::decode(&packet.payload)
                        .map_err(|e| Error::Protocol(format!("malformed EOF packet: {e}")))?;
                    result.set_terminal_status(eof.warnings, eof.status_flags);
                }
                self.warn_on_more_results(&result);
                return Ok(result);
            }

            if first == 0xFF {
                return Err(self.server_error(&packet)?);
            }

            let cells = decode_text_row(&packet.payload, column_count)
                .map_err(|e| Error::Protocol(format!("malformed text row: {e}")))?;
            result.push_row(Row::new(cells));
        }
    }

    /// Read `count` column definitions followed by the section EOF
    /// (which is synthetic under `DEPRECATE_EOF`).
    async fn read_definition_block(&mut self, count: usize) -> Result<Vec<Field>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let mut fields = Vec::with_capacity(count);
        for _ in 0..count {
            let packet = self.recv().await?;
            if first_byte(&packet)? == 0xFF {
                let err = decode_err(&packet.payload, self.capabilities)?;
                return Err(Error::PreparedStmt {
                    errno: err.error_code,
                    message: err.error_message,
                });
            }
            let def = decode_column(&packet.payload)?;
            fields.push(Field::from_definition(def));
        }

        if !self.capabilities.contains(CapabilityFlags::DEPRECATE_EOF) {
            self.expect_eof().await?;
        }
        Ok(fields)
    }

    async fn expect_eof(&mut self) -> Result<()> {
        let packet = self.recv().await?;
        if first_byte(&packet)? != 0xFE {
            return Err(Error::Protocol(
                "expected EOF between result-set sections".into(),
            ));
        }
        Ok(())
    }

    fn finalize(&self, result: &mut ResultSet, ok: OkPacket) {
        result.set_ok_metadata(
            ok.affected_rows,
            ok.last_insert_id,
            ok.warnings,
            ok.status_flags,
            ok.info,
        );
        self.warn_on_more_results(result);
    }

    fn warn_on_more_results(&self, result: &ResultSet) {
        if result.more_results() {
            tracing::warn!(
                "server announced additional result sets; this driver does not fetch them"
            );
        }
    }

    fn server_error(&self, packet: &Packet) -> Result<Error> {
        let err = decode_err(&packet.payload, self.capabilities)?;
        Ok(Error::Server {
            errno: err.error_code,
            message: err.error_message,
        })
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("capabilities", &self.capabilities)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

fn first_byte(packet: &Packet) -> Result<u8> {
    packet
        .first_byte()
        .ok_or_else(|| Error::Protocol("empty response packet".into()))
}

fn decode_ok(payload: &[u8], capabilities: CapabilityFlags) -> Result<OkPacket> {
    OkPacket::decode(payload, capabilities)
        .map_err(|e| Error::Protocol(format!("malformed OK packet: {e}")))
}

fn decode_err(payload: &[u8], capabilities: CapabilityFlags) -> Result<ErrPacket> {
    ErrPacket::decode(payload, capabilities)
        .map_err(|e| Error::Protocol(format!("malformed ERR packet: {e}")))
}

fn decode_column(payload: &[u8]) -> Result<ColumnDefinition> {
    ColumnDefinition::decode(payload)
        .map_err(|e| Error::Protocol(format!("malformed column definition: {e}")))
}

/// Compute the scramble for the plugin the server named.
///
/// Unknown plugins fall back to `mysql_native_password`; servers that
/// insist then answer with an auth switch, which is rejected cleanly.
fn scramble_for_plugin(plugin_name: &str, password: &str, salt: &[u8]) -> (Vec<u8>, &'static str) {
    match plugin_name {
        plugins::MYSQL_NATIVE_PASSWORD => (
            mysql_auth::native_password_scramble(password, salt),
            plugins::MYSQL_NATIVE_PASSWORD,
        ),
        plugins::CACHING_SHA2_PASSWORD => (
            mysql_auth::caching_sha2_scramble(password, salt),
            plugins::CACHING_SHA2_PASSWORD,
        ),
        other => {
            tracing::debug!(plugin = other, "unknown auth plugin, answering as native");
            (
                mysql_auth::native_password_scramble(password, salt),
                plugins::MYSQL_NATIVE_PASSWORD,
            )
        }
    }
}

/// Read the server's verdict on the handshake response.
async fn read_auth_result(
    conn: &mut Connection<TcpStream>,
    recv_timeout: Option<Duration>,
    capabilities: CapabilityFlags,
) -> Result<()> {
    loop {
        let packet = recv_with_timeout(conn, recv_timeout).await?;
        let first = packet
            .first_byte()
            .ok_or_else(|| Error::Protocol("empty auth result packet".into()))?;

        match first {
            0x00 => return Ok(()),
            0xFF => {
                let err = decode_err(&packet.payload, capabilities)?;
                return Err(Error::Auth {
                    errno: err.error_code,
                    message: err.error_message,
                });
            }
            caching_sha2::STATUS_TAG => {
                if packet.payload.len() == 2
                    && packet.payload[1] == caching_sha2::FAST_AUTH_SUCCESS
                {
                    // Fast-auth accepted; the real OK/ERR follows.
                    continue;
                }
                if packet.payload.len() == 2
                    && packet.payload[1] == caching_sha2::PERFORM_FULL_AUTH
                {
                    return Err(Error::Auth {
                        errno: 0,
                        message: "server requires full caching_sha2 authentication, which is \
                                  not supported; use mysql_native_password or seed the \
                                  server-side auth cache"
                            .into(),
                    });
                }
                return Err(Error::Auth {
                    errno: 0,
                    message: "unrecognized caching_sha2 status packet".into(),
                });
            }
            0xFE => {
                return Err(Error::Auth {
                    errno: 0,
                    message: "auth plugin switch is not supported".into(),
                });
            }
            other => {
                return Err(Error::Protocol(format!(
                    "unexpected auth result packet tag 0x{other:02X}"
                )));
            }
        }
    }
}

async fn send_with_timeout(
    conn: &mut Connection<TcpStream>,
    send_timeout: Option<Duration>,
    packet: &[u8],
) -> Result<()> {
    let result = match send_timeout {
        Some(limit) => timeout(limit, conn.send(packet))
            .await
            .map_err(|_| Error::Timeout)?,
        None => conn.send(packet).await,
    };
    result.map_err(Error::from_send)
}

async fn recv_with_timeout(
    conn: &mut Connection<TcpStream>,
    recv_timeout: Option<Duration>,
) -> Result<Packet> {
    let result: std::result::Result<Packet, CodecError> = match recv_timeout {
        Some(limit) => timeout(limit, conn.read_packet())
            .await
            .map_err(|_| Error::Timeout)?,
        None => conn.read_packet().await,
    };
    result.map_err(Error::from_recv)
}

/// Backtick-quote a schema identifier.
fn quote_identifier(name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(Error::InvalidParam("empty identifier".into()));
    }
    if name.contains('\0') {
        return Err(Error::InvalidParam("identifier contains NUL".into()));
    }
    Ok(format!("`{}`", name.replace('`', "``")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("orders").unwrap(), "`orders`");
        assert_eq!(quote_identifier("odd`name").unwrap(), "`odd``name`");
        assert!(matches!(
            quote_identifier(""),
            Err(Error::InvalidParam(_))
        ));
        assert!(matches!(
            quote_identifier("bad\0name"),
            Err(Error::InvalidParam(_))
        ));
    }

    #[test]
    fn test_scramble_for_plugin_fallback() {
        let salt = [7u8; 20];
        let (native, name) = scramble_for_plugin(plugins::MYSQL_NATIVE_PASSWORD, "pw", &salt);
        assert_eq!(native.len(), 20);
        assert_eq!(name, plugins::MYSQL_NATIVE_PASSWORD);

        let (sha2, name) = scramble_for_plugin(plugins::CACHING_SHA2_PASSWORD, "pw", &salt);
        assert_eq!(sha2.len(), 32);
        assert_eq!(name, plugins::CACHING_SHA2_PASSWORD);

        // Unknown plugin falls back to the native scramble.
        let (fallback, name) = scramble_for_plugin("sha256_password", "pw", &salt);
        assert_eq!(fallback, native);
        assert_eq!(name, plugins::MYSQL_NATIVE_PASSWORD);
    }
}
