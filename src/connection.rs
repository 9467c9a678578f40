//! The public connection API (spec §5): connect/authenticate, run text and
//! prepared statements, stream multi-results, and the server-driven flows
//! (LOCAL INFILE, fetch cursors, `COM_CHANGE_USER`).
//!
//! Grounded on `sqlx_core::mysql::connection::mod::MySqlConnection` and its
//! `Connect`/`Connection`/`Executor` impls, collapsed onto this crate's
//! concrete, non-generic surface: one connection type, one row type, one
//! value enum, no `Database`/`Executor`/`Pool` trait scaffolding (spec §1
//! non-goals).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::AsyncReadExt;

use crate::auth;
use crate::cache::{PreparedStatementCache, QueryCache};
use crate::capabilities::Capabilities;
use crate::codec::{self, MySqlValue};
use crate::context::{ConnectionContext, TimeZonePolicy};
use crate::error::{protocol_err, Error, MySqlDatabaseError, Result};
use crate::exchange::{Exchange, RESPONSE_BUFFER_CAPACITY};
use crate::handshake;
use crate::io::compression::{CompressionAlgorithm, CompressionCodec};
use crate::message::client::{self, ChangeUser, CursorFlags, StmtExecute};
use crate::message::server::{self, DecodeContext, ServerMessage};
use crate::net::MaybeTlsStream;
use crate::options::{CompressionAlgorithmOption, Endpoint, MySqlConnectOptions};
use crate::row::{MySqlColumn, MySqlRow};
use crate::statement::{Binding, MySqlArguments, PreparedStatement};
use crate::status::ServerStatus;
use crate::transport::PacketTransport;

/// The outcome of one non-`SELECT` statement execution: the server's
/// bookkeeping counters, with no rows attached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MySqlQueryResult {
    pub rows_affected: u64,
    pub last_insert_id: u64,
}

/// One result set out of a (possibly multi-statement) execution (spec §4.6
/// "If the terminal status indicates MORE_RESULTS_EXISTS, repeat").
#[derive(Debug)]
pub enum MySqlResponse {
    Rows(Vec<MySqlRow>),
    Result(MySqlQueryResult),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowFormat {
    Text,
    Binary,
}

/// The terminal packet a row-streaming read finished on, carried out of the
/// loop so its context-mutating side effect runs once the
/// [`RowDrainGuard`] it was read under has already been disarmed.
enum RowStreamTerminal {
    Eof(server::EofPacket),
    Ok(server::OkPacket),
}

/// Arms [`Exchange::abandon`] if a row-streaming read is dropped before
/// reaching its terminal packet — e.g. the caller's `fetch_all`/
/// `fetch_with_cursor` future is cancelled mid-stream (spec §9 open
/// question 2, §8 "Cancellation no-stall", §7 scenario 6). The drain
/// closure replays the same [`DecodeContext::RowStreaming`] disambiguation
/// the live read loop uses, so leftover rows are skipped correctly instead
/// of guessing from raw bytes.
struct RowDrainGuard<'a> {
    exchange: &'a mut Exchange,
    capabilities: Capabilities,
    armed: bool,
}

impl<'a> RowDrainGuard<'a> {
    fn new(exchange: &'a mut Exchange, capabilities: Capabilities) -> Self {
        RowDrainGuard {
            exchange,
            capabilities,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for RowDrainGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let capabilities = self.capabilities;
        self.exchange.abandon(move |packet: &bytes::Bytes| {
            !matches!(
                server::decode(packet, DecodeContext::RowStreaming, capabilities),
                Ok(ServerMessage::Row(_))
            )
        });
    }
}

/// A connection to a MySQL/MariaDB server (spec §5 "the public surface this
/// core exposes").
pub struct MySqlConnection {
    exchange: Exchange,
    context: ConnectionContext,
    query_cache: QueryCache,
    prepared_cache: PreparedStatementCache,
    options: MySqlConnectOptions,
}

impl std::fmt::Debug for MySqlConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlConnection").finish_non_exhaustive()
    }
}

impl MySqlConnection {
    /// Connects using a `mysql://` connection URL (spec §6).
    pub async fn connect(url: &str) -> Result<Self> {
        let options = MySqlConnectOptions::parse(url)?;
        Self::connect_with(&options).await
    }

    /// Connects using an already-built [`MySqlConnectOptions`].
    pub async fn connect_with(options: &MySqlConnectOptions) -> Result<Self> {
        let socket = match &options.endpoint {
            Endpoint::Tcp { host, port } => MaybeTlsStream::connect_tcp(host, *port).await?,
            Endpoint::Unix(path) => MaybeTlsStream::connect_unix(path).await?,
        };

        let mut transport = PacketTransport::new(socket);
        let outcome = handshake::run(&mut transport, options.host(), options).await?;
        let context = outcome.context;

        let mut exchange = Exchange::new(transport);
        if let Some(algorithm) = negotiate_compression(&context, options) {
            exchange
                .transport_mut()
                .enable_compression(CompressionCodec::new(algorithm));
        }

        let mut conn = MySqlConnection {
            exchange,
            context,
            query_cache: QueryCache::new(options.query_cache_size),
            prepared_cache: PreparedStatementCache::new(options.prepare_cache_size),
            options: options.clone(),
        };

        conn.run_session_setup().await?;

        Ok(conn)
    }

    /// Sends `COM_QUIT` and releases the connection (spec §4.5 "Shutdown").
    pub async fn close(mut self) {
        self.exchange.shutdown().await;
    }

    /// `COM_PING`: verifies the connection is alive without touching any
    /// session state.
    pub async fn ping(&mut self) -> Result<()> {
        let mut buf = BytesMut::new();
        client::encode_ping(&mut buf);
        self.exchange.begin(&buf).await?;
        self.expect_ok().await?;
        self.exchange.complete();
        Ok(())
    }

    /// Runs `sql` with no bound parameters purely over the text protocol.
    pub async fn query(&mut self, sql: &str) -> Result<Vec<MySqlResponse>> {
        self.run_text_query(sql).await
    }

    /// Runs `sql` against `args`, returning every result set produced (spec
    /// §4.6 "multi-result").
    pub async fn fetch_many(&mut self, sql: &str, args: MySqlArguments) -> Result<Vec<MySqlResponse>> {
        self.run(sql, &args).await
    }

    /// Runs `sql` against `args` and collects every row of its first result
    /// set (subsequent result sets, if any, are drained and discarded).
    pub async fn fetch_all(&mut self, sql: &str, args: MySqlArguments) -> Result<Vec<MySqlRow>> {
        let responses = self.run(sql, &args).await?;
        Ok(first_rows(responses))
    }

    /// Runs `sql` against `args` for its side effects, summing
    /// `rows_affected` across every statement and keeping the last
    /// `last_insert_id` seen (spec §4.6 multi-statement `OK` accounting).
    pub async fn execute(&mut self, sql: &str, args: MySqlArguments) -> Result<MySqlQueryResult> {
        let responses = self.run(sql, &args).await?;
        Ok(sum_results(&responses))
    }

    /// Executes `sql`, then wraps the terminal `last_insert_id` in a
    /// synthetic single-row, single-column result named `id_column` (spec
    /// §4.6 "Last insert id synthesis").
    pub async fn execute_returning_id(
        &mut self,
        sql: &str,
        args: MySqlArguments,
        id_column: &str,
    ) -> Result<MySqlRow> {
        let result = self.execute(sql, args).await?;
        let columns: Arc<[MySqlColumn]> = vec![MySqlColumn {
            name: id_column.to_string(),
            type_id: codec::type_id::LONGLONG,
            is_unsigned: true,
            collation: crate::collation::COLLATION_BINARY,
            max_size: 20,
        }]
        .into();
        Ok(MySqlRow::synthetic(columns, vec![MySqlValue::BigUint(result.last_insert_id)]))
    }

    /// Runs `sql` against `args` as a server-prepared statement with a
    /// read-only cursor (spec §4.6 step 3): rows are pulled `fetch_size` at a
    /// time via `COM_STMT_FETCH` until `LAST_ROW_SENT`. A `fetch_size` of 0
    /// falls back to [`MySqlConnection::fetch_all`].
    pub async fn fetch_with_cursor(
        &mut self,
        sql: &str,
        args: MySqlArguments,
        fetch_size: u32,
    ) -> Result<Vec<MySqlRow>> {
        if fetch_size == 0 {
            return self.fetch_all(sql, args).await;
        }

        let query = self.query_cache.get_or_parse(sql);
        let binding = Binding::resolve(&query, &args)?;

        let (statement_id, close_after) = self.prepare_statement(sql).await?;

        let params = binding.encode_binary();
        let mut buf = BytesMut::new();
        StmtExecute {
            statement_id,
            cursor: CursorFlags::READ_ONLY,
            params: &params,
            new_params_bound: true,
        }
        .encode(&mut buf);

        self.exchange.begin(&buf).await?;

        let first = self.exchange.recv().await?;
        let column_count = match server::decode(&first, DecodeContext::Command, self.context.capabilities)? {
            ServerMessage::ColumnCount(n) => n,
            ServerMessage::Ok(ok) => {
                server::apply_ok_to_context(&ok, &mut self.context);
                self.exchange.complete();
                return Ok(Vec::new());
            }
            other => return Err(protocol_err!("unexpected message opening cursor: {other:?}")),
        };

        let columns = self.read_column_definitions(column_count as u32).await?;
        // Opening a cursor yields metadata followed immediately by the
        // terminal EOF; rows only arrive from COM_STMT_FETCH (spec §4.6
        // step 3 "open a cursor ... then issue COM_STMT_FETCH repeatedly").
        self.expect_eof().await?;
        self.exchange.complete();

        let mut rows = Vec::new();
        loop {
            let mut fetch_buf = BytesMut::new();
            client::encode_stmt_fetch(&mut fetch_buf, statement_id, fetch_size);
            self.exchange.begin(&fetch_buf).await?;

            let last_row_sent = self.read_cursor_batch(&columns, &mut rows).await?;
            self.exchange.complete();

            if last_row_sent {
                break;
            }
        }

        if let Some(id) = close_after {
            self.send_stmt_close(id).await?;
        }

        Ok(rows)
    }

    /// Re-authenticates the session as a different user without
    /// reconnecting (spec §10 "`COM_CHANGE_USER` re-runs auth negotiation").
    /// Invalidates every cached prepared statement and parsed query, since
    /// the server discards all per-session state on a successful change.
    pub async fn change_user(&mut self, username: &str, password: Option<&str>, database: Option<&str>) -> Result<()> {
        self.prepared_cache.drain_all();
        self.query_cache = QueryCache::new(self.options.query_cache_size);

        let mut plugin_name = self.context.auth_plugin_name.clone();
        let mut nonce = self.context.auth_nonce.clone();
        let plugin = auth::by_name(&plugin_name);
        let auth_response = plugin.authenticate(password.unwrap_or(""), &nonce)?;

        let collation = crate::collation::COLLATION_UTF8MB4_UNICODE_CI as u8;
        let no_attrs: Vec<(String, String)> = Vec::new();
        let change = ChangeUser {
            username,
            auth_response: &auth_response,
            database,
            collation,
            auth_plugin_name: &plugin_name,
            connection_attrs: &no_attrs,
        };

        let mut buf = BytesMut::new();
        change.encode(&mut buf, self.context.capabilities);
        self.exchange.begin(&buf).await?;

        loop {
            let packet = self.exchange.recv().await?;
            match server::decode(&packet, DecodeContext::Login, self.context.capabilities)? {
                ServerMessage::Ok(ok) => {
                    server::apply_ok_to_context(&ok, &mut self.context);
                    break;
                }
                ServerMessage::Err(err) => return Err(database_error(err)),
                ServerMessage::AuthSwitchRequest(switch) => {
                    plugin_name = switch.plugin_name;
                    nonce = switch.plugin_data;
                    let plugin = auth::by_name(&plugin_name);
                    let response = plugin.authenticate(password.unwrap_or(""), &nonce)?;
                    self.exchange.transport_mut().send_packet(&response).await?;
                }
                ServerMessage::AuthMoreData(data) => match handshake::interpret_auth_more_data(&plugin_name, &data) {
                    auth::NextAction::Done => continue,
                    auth::NextAction::SendFullAuth => {
                        let response = handshake::full_auth_response(
                            self.exchange.transport_mut(),
                            self.context.capabilities,
                            password.unwrap_or(""),
                            &nonce,
                        )
                        .await?;
                        self.exchange.transport_mut().send_packet(&response).await?;
                    }
                },
                other => return Err(protocol_err!("unexpected message during COM_CHANGE_USER: {other:?}")),
            }
        }

        self.exchange.complete();
        self.context.auth_plugin_name = plugin_name;
        self.context.auth_nonce = nonce;
        Ok(())
    }

    // -- internal flows --------------------------------------------------

    async fn run(&mut self, sql: &str, args: &MySqlArguments) -> Result<Vec<MySqlResponse>> {
        if args.is_empty() {
            return self.run_text_query(sql).await;
        }

        if self.options.use_server_prepare_statement {
            self.run_server_prepared(sql, args).await
        } else {
            self.run_client_prepared(sql, args).await
        }
    }

    async fn run_client_prepared(&mut self, sql: &str, args: &MySqlArguments) -> Result<Vec<MySqlResponse>> {
        let query = self.query_cache.get_or_parse(sql);
        let binding = Binding::resolve(&query, args)?;
        let no_backslash_escapes = self.context.status.contains(ServerStatus::NO_BACKSLASH_ESCAPES);
        let rendered = binding.render_text(&query, no_backslash_escapes);
        self.run_text_query(&rendered).await
    }

    async fn run_server_prepared(&mut self, sql: &str, args: &MySqlArguments) -> Result<Vec<MySqlResponse>> {
        let query = self.query_cache.get_or_parse(sql);
        let binding = Binding::resolve(&query, args)?;

        let (statement_id, close_after) = self.prepare_statement(sql).await?;

        let params = binding.encode_binary();
        let mut buf = BytesMut::new();
        StmtExecute {
            statement_id,
            cursor: CursorFlags::NO_CURSOR,
            params: &params,
            new_params_bound: true,
        }
        .encode(&mut buf);

        self.exchange.begin(&buf).await?;
        let responses = self.consume_result_sets(sql, RowFormat::Binary).await;
        self.finish_exchange(&responses);

        if let Some(id) = close_after {
            if responses.is_ok() {
                self.send_stmt_close(id).await?;
            }
        }

        responses
    }

    async fn run_text_query(&mut self, sql: &str) -> Result<Vec<MySqlResponse>> {
        let mut buf = BytesMut::new();
        client::encode_query(&mut buf, sql);
        self.exchange.begin(&buf).await?;

        let responses = self.consume_result_sets(sql, RowFormat::Text).await;
        self.finish_exchange(&responses);
        responses
    }

    fn finish_exchange(&mut self, responses: &Result<Vec<MySqlResponse>>) {
        if responses.is_ok() {
            self.exchange.complete();
        }
        // A transport-level error already leaves the exchange unusable; a
        // protocol-level error mid-stream means the wire position can no
        // longer be trusted either, so neither path attempts to drain and
        // resume — the connection is expected to be dropped (spec §4.2
        // "always fatal").
    }

    /// Resolves the statement id to execute `sql` with: a cache hit reuses
    /// one, a miss prepares a fresh statement. When the prepared-statement
    /// cache is disabled (spec §4.8 "0 disables"), the fresh statement is
    /// never retained, so the second element carries its id back to the
    /// caller to close once the execution that needs it has finished.
    async fn prepare_statement(&mut self, sql: &str) -> Result<(u32, Option<u32>)> {
        if let Some(statement) = self.prepared_cache.get(sql) {
            return Ok((statement.statement_id, None));
        }

        let mut buf = BytesMut::new();
        client::encode_stmt_prepare(&mut buf, sql);
        self.exchange.begin(&buf).await?;

        let header_packet = self.exchange.recv().await?;
        let header = crate::statement::decode_prepare_header(&header_packet)?;

        let mut params = Vec::with_capacity(header.num_params as usize);
        for _ in 0..header.num_params {
            params.push(self.read_prepared_metadata_entry().await?);
        }
        if header.num_params > 0 && !self.context.capabilities.contains(Capabilities::DEPRECATE_EOF) {
            self.expect_eof().await?;
        }

        let mut columns = Vec::with_capacity(header.num_columns as usize);
        for _ in 0..header.num_columns {
            columns.push(self.read_prepared_metadata_entry().await?);
        }
        if header.num_columns > 0 && !self.context.capabilities.contains(Capabilities::DEPRECATE_EOF) {
            self.expect_eof().await?;
        }

        self.exchange.complete();

        let statement_id = header.statement_id;
        let statement = PreparedStatement {
            statement_id,
            param_count: header.num_params,
            params,
            columns,
        };

        if self.prepared_cache.is_disabled() {
            return Ok((statement_id, Some(statement_id)));
        }

        self.prepared_cache.put_if_absent(sql, statement);
        self.close_evicted_statements().await?;

        Ok((statement_id, None))
    }

    async fn read_prepared_metadata_entry(&mut self) -> Result<crate::message::server::ColumnDefinition> {
        let packet = self.exchange.recv().await?;
        match server::decode(
            &packet,
            DecodeContext::PreparedMetadataStreaming,
            self.context.capabilities,
        )? {
            ServerMessage::ColumnDefinition(def) => Ok(def),
            other => Err(protocol_err!("expected a prepared-statement metadata packet; got {other:?}")),
        }
    }

    async fn close_evicted_statements(&mut self) -> Result<()> {
        let evicted = self.prepared_cache.take_evicted();
        for statement in evicted {
            self.send_stmt_close(statement.statement_id).await?;
        }
        Ok(())
    }

    async fn send_stmt_close(&mut self, statement_id: u32) -> Result<()> {
        // `COM_STMT_CLOSE` has no response (spec §4.8 "closed by explicit
        // COM_STMT_CLOSE"); the exchange begins and completes immediately.
        let mut buf = BytesMut::new();
        client::encode_stmt_close(&mut buf, statement_id);
        self.exchange.begin(&buf).await?;
        self.exchange.complete();
        Ok(())
    }

    async fn consume_result_sets(&mut self, sql: &str, format: RowFormat) -> Result<Vec<MySqlResponse>> {
        let mut responses = Vec::new();

        loop {
            let packet = self.exchange.recv().await?;
            match server::decode(&packet, DecodeContext::Command, self.context.capabilities)? {
                ServerMessage::Ok(ok) => {
                    server::apply_ok_to_context(&ok, &mut self.context);
                    let more = ok.status.contains(ServerStatus::MORE_RESULTS_EXISTS);
                    responses.push(MySqlResponse::Result(MySqlQueryResult {
                        rows_affected: ok.affected_rows,
                        last_insert_id: ok.last_insert_id,
                    }));
                    if !more {
                        break;
                    }
                }
                ServerMessage::Err(err) => return Err(database_error_with_statement(err, sql)),
                ServerMessage::LocalInfileRequest(filename) => {
                    self.serve_local_infile(&filename).await?;
                }
                ServerMessage::ColumnCount(count) => {
                    let columns = self.read_column_definitions(count as u32).await?;
                    let mut rows = Vec::new();
                    let more = self.read_rows(&columns, format, &mut rows).await?;
                    responses.push(MySqlResponse::Rows(rows));
                    if !more {
                        break;
                    }
                }
                other => return Err(protocol_err!("unexpected message awaiting a result set: {other:?}")),
            }
        }

        Ok(responses)
    }

    async fn read_column_definitions(&mut self, count: u32) -> Result<Arc<[MySqlColumn]>> {
        let mut defs = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let packet = self.exchange.recv().await?;
            match server::decode(
                &packet,
                DecodeContext::ColumnDefinition,
                self.context.capabilities,
            )? {
                ServerMessage::ColumnDefinition(def) => defs.push(MySqlColumn::from(&def)),
                other => return Err(protocol_err!("expected a column definition; got {other:?}")),
            }
        }

        if !self.context.capabilities.contains(Capabilities::DEPRECATE_EOF) {
            self.expect_eof().await?;
        }

        Ok(defs.into())
    }

    /// Reads rows until the terminal EOF/OK, returning whether
    /// `MORE_RESULTS_EXISTS` was set on it.
    async fn read_rows(&mut self, columns: &Arc<[MySqlColumn]>, format: RowFormat, rows: &mut Vec<MySqlRow>) -> Result<bool> {
        let capabilities = self.context.capabilities;
        let mut guard = RowDrainGuard::new(&mut self.exchange, capabilities);

        let terminal = loop {
            let packet = guard.exchange.recv().await?;
            match server::decode(&packet, DecodeContext::RowStreaming, capabilities)? {
                ServerMessage::Row(payload) => {
                    let row = match format {
                        RowFormat::Text => MySqlRow::decode_text(&payload, columns.clone(), &self.context)?,
                        RowFormat::Binary => MySqlRow::decode_binary(&payload, columns.clone(), &self.context)?,
                    };
                    rows.push(row);
                    if rows.len() > RESPONSE_BUFFER_CAPACITY {
                        return Err(Error::ResponseBufferOverflow {
                            capacity: RESPONSE_BUFFER_CAPACITY,
                        });
                    }
                }
                ServerMessage::Eof(eof) => break RowStreamTerminal::Eof(eof),
                ServerMessage::Ok(ok) => break RowStreamTerminal::Ok(ok),
                other => return Err(protocol_err!("unexpected message in a row stream: {other:?}")),
            }
        };

        guard.disarm();

        match terminal {
            RowStreamTerminal::Eof(eof) => {
                server::apply_eof_to_context(&eof, &mut self.context);
                Ok(eof.status.contains(ServerStatus::MORE_RESULTS_EXISTS))
            }
            RowStreamTerminal::Ok(ok) => {
                server::apply_ok_to_context(&ok, &mut self.context);
                Ok(ok.status.contains(ServerStatus::MORE_RESULTS_EXISTS))
            }
        }
    }

    /// Reads one `COM_STMT_FETCH` batch's rows, returning whether the
    /// cursor is now exhausted (spec §4.6 "until LAST_ROW_SENT is observed").
    async fn read_cursor_batch(&mut self, columns: &Arc<[MySqlColumn]>, rows: &mut Vec<MySqlRow>) -> Result<bool> {
        let capabilities = self.context.capabilities;
        let mut guard = RowDrainGuard::new(&mut self.exchange, capabilities);

        let eof = loop {
            let packet = guard.exchange.recv().await?;
            match server::decode(&packet, DecodeContext::RowStreaming, capabilities)? {
                ServerMessage::Row(payload) => {
                    let row = MySqlRow::decode_binary(&payload, columns.clone(), &self.context)?;
                    rows.push(row);
                    if rows.len() > RESPONSE_BUFFER_CAPACITY {
                        return Err(Error::ResponseBufferOverflow {
                            capacity: RESPONSE_BUFFER_CAPACITY,
                        });
                    }
                }
                ServerMessage::Eof(eof) => break eof,
                other => return Err(protocol_err!("unexpected message in a cursor fetch: {other:?}")),
            }
        };

        guard.disarm();
        server::apply_eof_to_context(&eof, &mut self.context);
        Ok(eof.status.contains(ServerStatus::LAST_ROW_SENT))
    }

    async fn expect_ok(&mut self) -> Result<()> {
        let packet = self.exchange.recv().await?;
        match server::decode(&packet, DecodeContext::Command, self.context.capabilities)? {
            ServerMessage::Ok(ok) => {
                server::apply_ok_to_context(&ok, &mut self.context);
                Ok(())
            }
            ServerMessage::Err(err) => Err(database_error(err)),
            other => Err(protocol_err!("expected OK; got {other:?}")),
        }
    }

    async fn expect_eof(&mut self) -> Result<()> {
        let packet = self.exchange.recv().await?;
        match server::decode(&packet, DecodeContext::Command, self.context.capabilities)? {
            ServerMessage::Eof(eof) => {
                server::apply_eof_to_context(&eof, &mut self.context);
                Ok(())
            }
            ServerMessage::Err(err) => Err(database_error(err)),
            other => Err(protocol_err!("expected EOF; got {other:?}")),
        }
    }

    /// Services one LOCAL INFILE round: validates the requested path
    /// against the configured allowed root, then streams its contents (or a
    /// single empty chunk if the path is disallowed or unreadable), per spec
    /// §4.6 "LOCAL INFILE safety".
    async fn serve_local_infile(&mut self, filename: &str) -> Result<()> {
        match self.resolve_local_infile_path(filename) {
            Some(path) => match self.stream_local_infile(&path).await {
                Ok(()) => Ok(()),
                Err(e) => {
                    self.send_empty_infile_chunk().await?;
                    Err(e)
                }
            },
            None => {
                self.send_empty_infile_chunk().await?;
                // The server follows an empty data stream with an ERR
                // packet; surface it to the caller as a permission error
                // rather than whatever SQL-state text the server chose.
                let packet = self.exchange.recv().await?;
                match server::decode(&packet, DecodeContext::Command, self.context.capabilities)? {
                    ServerMessage::Err(_) | ServerMessage::Ok(_) => {}
                    other => return Err(protocol_err!("unexpected message after LOCAL INFILE rejection: {other:?}")),
                }
                Err(Error::LocalInfilePermissionDenied(filename.to_string()))
            }
        }
    }

    fn resolve_local_infile_path(&self, filename: &str) -> Option<PathBuf> {
        let root = self.context.local_infile_root.as_ref()?;
        let stripped = crate::query::strip_quotes(filename);
        let candidate = root.join(stripped);

        let canonical_root = root.canonicalize().ok()?;
        let canonical_candidate = candidate.canonicalize().ok()?;

        if canonical_candidate.starts_with(&canonical_root) {
            Some(canonical_candidate)
        } else {
            None
        }
    }

    async fn stream_local_infile(&mut self, path: &Path) -> Result<()> {
        let mut file = tokio::fs::File::open(path).await?;
        let buffer_size = self.context.local_infile_buffer_size.max(1024);
        let mut chunk = vec![0u8; buffer_size];

        loop {
            let n = file.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            let mut buf = BytesMut::new();
            client::encode_local_infile_chunk(&mut buf, &chunk[..n]);
            self.exchange.transport_mut().send_packet(&buf).await?;
        }

        self.send_empty_infile_chunk().await
    }

    async fn send_empty_infile_chunk(&mut self) -> Result<()> {
        let mut buf = BytesMut::new();
        client::encode_local_infile_chunk(&mut buf, &[]);
        self.exchange.transport_mut().send_packet(&buf).await
    }

    /// Applies the handful of session settings this crate drives explicitly
    /// after connecting, in one multi-statement `COM_QUERY` (spec §4.6, the
    /// teacher's `Connect::connect_with` post-establish `SET` batch).
    /// Unlike the teacher, this never forces `NO_ZERO_DATE`/`NO_ZERO_IN_DATE`
    /// — the `zeroDate` option (spec §6) is this crate's own answer to that
    /// same problem, and forcing the server to reject zero dates outright
    /// would make that option unreachable.
    async fn run_session_setup(&mut self) -> Result<()> {
        let mut statements = String::from("SET sql_mode=(SELECT CONCAT(@@sql_mode, ',PIPES_AS_CONCAT'));");

        if self.options.force_connection_time_zone_to_session {
            if let TimeZonePolicy::Named(zone) = self.options.connection_time_zone {
                statements.push_str(&format!(" SET time_zone = '{zone}';"));
            }
        }

        for (key, value) in &self.options.session_variables {
            statements.push_str(&format!(" SET {key} = {value};"));
        }

        self.run_text_query(&statements).await?;
        Ok(())
    }
}

fn negotiate_compression(context: &ConnectionContext, options: &MySqlConnectOptions) -> Option<CompressionAlgorithm> {
    for preference in &options.compression_algorithms {
        match preference {
            CompressionAlgorithmOption::Zstd
                if context.capabilities.contains(Capabilities::ZSTD_COMPRESSION_ALGORITHM) =>
            {
                let level = options.zstd_compression_level.unwrap_or(3) as i32;
                return Some(CompressionAlgorithm::Zstd { level });
            }
            CompressionAlgorithmOption::Zlib if context.capabilities.contains(Capabilities::COMPRESS) => {
                return Some(CompressionAlgorithm::Zlib);
            }
            _ => {}
        }
    }
    None
}

fn database_error(err: crate::message::server::ErrPacket) -> Error {
    Error::Database(MySqlDatabaseError::new(err.error_code, err.sql_state, err.error_message))
}

/// As [`database_error`], but attaches the SQL that provoked it (spec §4.9
/// "SQL attached at the statement-execution boundary"). Used at call sites
/// where a particular statement's text is in scope, as opposed to the
/// session-level exchanges (handshake, `COM_CHANGE_USER`, `COM_PING`) that
/// call [`database_error`] directly.
fn database_error_with_statement(err: crate::message::server::ErrPacket, sql: &str) -> Error {
    match database_error(err) {
        Error::Database(e) => Error::Database(e.with_statement(sql)),
        other => other,
    }
}

fn first_rows(responses: Vec<MySqlResponse>) -> Vec<MySqlRow> {
    for response in responses {
        if let MySqlResponse::Rows(rows) = response {
            return rows;
        }
    }
    Vec::new()
}

fn sum_results(responses: &[MySqlResponse]) -> MySqlQueryResult {
    let mut total = MySqlQueryResult::default();
    for response in responses {
        if let MySqlResponse::Result(result) = response {
            total.rows_affected += result.rows_affected;
            total.last_insert_id = result.last_insert_id;
        }
    }
    total
}
