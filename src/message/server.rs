//! Server-to-client message decoding (spec §4.2).
//!
//! Grounded on `sqlx_core::mysql::protocol::{handshake, ok, eof, err,
//! column_count, column_def, auth_switch}`, generalized into one
//! context-sensitive `decode` entry point per spec §4.2's leading-byte
//! dispatch table (the teacher instead picks the right `Decode` impl at the
//! call site in `connection/executor.rs`; here the dispatch lives in one
//! place since the spec calls it out as its own responsibility).

use bytes::Buf;

use crate::capabilities::Capabilities;
use crate::context::ConnectionContext;
use crate::error::{protocol_err, Result};
use crate::io::MySqlBufExt;
use crate::status::ServerStatus;

/// Which kind of exchange is currently being decoded, driving the
/// leading-byte dispatch table in spec §4.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DecodeContext {
    Login,
    Command,
    ColumnCount,
    ColumnDefinition,
    /// Result-streaming, with a sub-state tracking whether the next message
    /// should be interpreted as a row or as the terminal EOF/OK.
    RowStreaming,
    PreparedMetadataStreaming,
}

#[derive(Debug)]
pub(crate) enum ServerMessage {
    HandshakeV10(HandshakeV10),
    Ok(OkPacket),
    Eof(EofPacket),
    Err(ErrPacket),
    AuthMoreData(Box<[u8]>),
    AuthSwitchRequest(AuthSwitchRequest),
    ColumnCount(u64),
    ColumnDefinition(ColumnDefinition),
    Row(bytes::Bytes),
    LocalInfileRequest(String),
}

#[derive(Debug)]
pub(crate) struct HandshakeV10 {
    pub(crate) server_version: String,
    pub(crate) connection_id: u32,
    pub(crate) capabilities: Capabilities,
    pub(crate) status: ServerStatus,
    pub(crate) default_collation: u8,
    pub(crate) auth_plugin_name: Option<String>,
    pub(crate) auth_plugin_data: Vec<u8>,
}

#[derive(Debug)]
pub(crate) struct OkPacket {
    pub(crate) affected_rows: u64,
    pub(crate) last_insert_id: u64,
    pub(crate) status: ServerStatus,
    pub(crate) warnings: u16,
    pub(crate) info: String,
    pub(crate) session_state_changes: Vec<SessionStateChange>,
}

#[derive(Debug)]
pub(crate) struct EofPacket {
    pub(crate) warnings: u16,
    pub(crate) status: ServerStatus,
}

#[derive(Debug)]
pub(crate) struct ErrPacket {
    pub(crate) error_code: u16,
    pub(crate) sql_state: Option<[u8; 5]>,
    pub(crate) error_message: String,
}

#[derive(Debug)]
pub(crate) struct AuthSwitchRequest {
    pub(crate) plugin_name: String,
    pub(crate) plugin_data: Vec<u8>,
}

#[derive(Debug)]
pub(crate) struct ColumnDefinition {
    pub(crate) schema: Option<String>,
    pub(crate) table: Option<String>,
    pub(crate) name: String,
    pub(crate) org_name: Option<String>,
    pub(crate) char_set: u16,
    pub(crate) max_size: u32,
    pub(crate) type_id: u8,
    pub(crate) flags: u16,
    pub(crate) decimals: u8,
}

/// The session-track sub-message types OK packets carry when
/// `SESSION_TRACK` is negotiated (spec §10 "session-track sub-type
/// dispatch").
#[derive(Debug)]
pub(crate) enum SessionStateChange {
    SystemVariable { name: String, value: String },
    Schema(String),
    CharacterSet(String),
    TransactionCharacteristics(String),
    TransactionState(String),
    Other { kind: u8, data: Vec<u8> },
}

/// Decodes one fully-assembled payload into a [`ServerMessage`], given the
/// decode context and the connection's negotiated capabilities.
pub(crate) fn decode(
    mut buf: &[u8],
    ctx: DecodeContext,
    capabilities: Capabilities,
) -> Result<ServerMessage> {
    if buf.is_empty() {
        return Err(protocol_err!("empty server payload"));
    }

    let first = buf[0];

    match (first, ctx) {
        (0xFF, _) => decode_err(buf).map(ServerMessage::Err),

        (0x0A, DecodeContext::Login) => decode_handshake_v10(buf).map(ServerMessage::HandshakeV10),

        (0x09, DecodeContext::Login) => Err(crate::error::Error::UnsupportedHandshakeVersion(9)),

        (0x00, DecodeContext::Login) if buf.len() >= 7 => {
            decode_ok(buf, capabilities).map(ServerMessage::Ok)
        }

        (0x01, DecodeContext::Login) => {
            let data = buf[1..].to_vec().into_boxed_slice();
            Ok(ServerMessage::AuthMoreData(data))
        }

        (0xFE, DecodeContext::Login) => {
            let (_, mut rest) = buf.split_at(1);
            let plugin_name = rest.get_str_nul()?;
            let plugin_data = rest.get_str_eof()?.into_bytes();
            Ok(ServerMessage::AuthSwitchRequest(AuthSwitchRequest {
                plugin_name,
                plugin_data,
            }))
        }

        (0x00, DecodeContext::Command) if buf.len() >= 7 => {
            decode_ok(buf, capabilities).map(ServerMessage::Ok)
        }

        (0xFE, DecodeContext::Command) if is_legacy_eof(buf) => {
            decode_eof(buf).map(ServerMessage::Eof)
        }

        (0xFE, DecodeContext::Command)
            if capabilities.contains(Capabilities::DEPRECATE_EOF) && buf.len() >= 7 =>
        {
            decode_ok(buf, capabilities).map(ServerMessage::Ok)
        }

        (0xFB, DecodeContext::Command) if buf.len() > 1 => {
            let (_, mut rest) = buf.split_at(1);
            let filename = rest.get_str_eof()?;
            Ok(ServerMessage::LocalInfileRequest(filename))
        }

        (_, DecodeContext::Command) => {
            let count = buf.get_uint_lenenc()?.unwrap_or(0);
            Ok(ServerMessage::ColumnCount(count))
        }

        (_, DecodeContext::ColumnDefinition) => {
            decode_column_definition(buf).map(ServerMessage::ColumnDefinition)
        }

        (0xFE, DecodeContext::RowStreaming) if is_legacy_eof(buf) => {
            decode_eof(buf).map(ServerMessage::Eof)
        }

        (0xFE, DecodeContext::RowStreaming)
            if capabilities.contains(Capabilities::DEPRECATE_EOF) && is_ok_like(buf) =>
        {
            decode_ok(buf, capabilities).map(ServerMessage::Ok)
        }

        (0xFB, DecodeContext::RowStreaming) => {
            // NULL field marker; the row decoder (not this dispatcher) is
            // what actually walks the row's fields. We hand it the whole
            // payload so it can re-derive NULLs from the row format itself.
            Ok(ServerMessage::Row(bytes::Bytes::copy_from_slice(buf)))
        }

        (_, DecodeContext::RowStreaming) => Ok(ServerMessage::Row(bytes::Bytes::copy_from_slice(buf))),

        (_, DecodeContext::PreparedMetadataStreaming) => {
            decode_column_definition(buf).map(ServerMessage::ColumnDefinition)
        }
    }
}

fn is_legacy_eof(buf: &[u8]) -> bool {
    buf.len() < 9
}

fn is_ok_like(buf: &[u8]) -> bool {
    // A deprecate-EOF "OK in row-streaming position" always carries at
    // least the fixed affected_rows/last_insert_id/status/warnings tail;
    // the legacy 5-byte EOF shape is handled by `is_legacy_eof` first.
    buf.len() >= 7
}

fn decode_handshake_v10(mut buf: &[u8]) -> Result<HandshakeV10> {
    let _protocol_version = buf.get_u8();
    let server_version = buf.get_str_nul()?;
    let connection_id = buf.try_get_u32_le()?;

    let mut scramble = Vec::with_capacity(20);
    scramble.extend_from_slice(&buf[..8]);
    buf.advance(8);
    buf.advance(1); // filler

    let capabilities_1 = buf.try_get_u16_le()?;
    let mut capabilities = Capabilities::from_bits_truncate(capabilities_1 as u64);

    let default_collation = buf.try_get_u8()?;
    let status = ServerStatus::from_bits_truncate(buf.try_get_u16_le()?);

    let capabilities_2 = buf.try_get_u16_le()?;
    capabilities |= Capabilities::from_bits_truncate(((capabilities_2 as u32) << 16) as u64);

    let auth_plugin_data_len = if capabilities.contains(Capabilities::PLUGIN_AUTH) {
        buf.try_get_u8()?
    } else {
        buf.advance(1);
        0
    };

    buf.advance(6); // reserved

    // Reserved 4 bytes in the base protocol; MariaDB repurposes this as an
    // extended 32-bit capability field, matching a 64-bit `Capabilities`
    // without needing a separate `MYSQL` marker bit (spec §3's 64-bit
    // capability set folds both in).
    let capabilities_3 = buf.try_get_u32_le()?;
    capabilities |= Capabilities::from_bits_truncate((capabilities_3 as u64) << 32);

    if capabilities.contains(Capabilities::SECURE_CONNECTION) {
        let len = ((auth_plugin_data_len as isize) - 9).max(12) as usize;
        let len = len.min(buf.len());
        scramble.extend_from_slice(&buf[..len]);
        buf.advance(len);
        if !buf.is_empty() {
            buf.advance(1); // reserved
        }
    }

    let auth_plugin_name = if capabilities.contains(Capabilities::PLUGIN_AUTH) && !buf.is_empty() {
        Some(buf.get_str_nul()?)
    } else {
        None
    };

    Ok(HandshakeV10 {
        server_version,
        connection_id,
        capabilities,
        status,
        default_collation,
        auth_plugin_name,
        auth_plugin_data: scramble,
    })
}

fn decode_ok(mut buf: &[u8], capabilities: Capabilities) -> Result<OkPacket> {
    let header = buf.try_get_u8()?;
    if header != 0x00 && header != 0xFE {
        return Err(protocol_err!(
            "expected OK (0x00 or 0xFE); received 0x{:X}",
            header
        ));
    }

    let affected_rows = buf.get_uint_lenenc()?.unwrap_or(0);
    let last_insert_id = buf.get_uint_lenenc()?.unwrap_or(0);
    let status = ServerStatus::from_bits_truncate(buf.try_get_u16_le()?);
    let warnings = buf.try_get_u16_le()?;

    let mut session_state_changes = Vec::new();

    let info = if capabilities.contains(Capabilities::SESSION_TRACK) {
        let info = buf.get_str_lenenc().unwrap_or_default();
        if status.contains(ServerStatus::SESSION_STATE_CHANGED) {
            let raw = buf.get_bytes_lenenc()?;
            session_state_changes = decode_session_state_changes(&raw)?;
        }
        info
    } else {
        buf.get_str_eof().unwrap_or_default()
    };

    Ok(OkPacket {
        affected_rows,
        last_insert_id,
        status,
        warnings,
        info,
        session_state_changes,
    })
}

/// Parses the `SESSION_TRACK` sub-messages out of an OK packet's trailing
/// state-change blob (spec §10 "session-track sub-type dispatch").
fn decode_session_state_changes(mut buf: &[u8]) -> Result<Vec<SessionStateChange>> {
    let mut out = Vec::new();

    while !buf.is_empty() {
        let kind = buf.try_get_u8()?;
        let entry = buf.get_bytes_lenenc()?;
        let mut entry_buf = &entry[..];

        let change = match kind {
            0x00 => {
                let name = entry_buf.get_str_lenenc()?;
                let value = entry_buf.get_str_lenenc()?;
                SessionStateChange::SystemVariable { name, value }
            }
            0x01 => SessionStateChange::Schema(entry_buf.get_str_lenenc()?),
            0x03 => SessionStateChange::CharacterSet(entry_buf.get_str_lenenc()?),
            0x04 => SessionStateChange::TransactionCharacteristics(entry_buf.get_str_lenenc()?),
            0x05 => SessionStateChange::TransactionState(entry_buf.get_str_lenenc()?),
            other => SessionStateChange::Other {
                kind: other,
                data: entry,
            },
        };

        out.push(change);
    }

    Ok(out)
}

fn decode_eof(mut buf: &[u8]) -> Result<EofPacket> {
    let header = buf.try_get_u8()?;
    if header != 0xFE {
        return Err(protocol_err!("expected EOF (0xFE); received 0x{:X}", header));
    }

    let warnings = buf.try_get_u16_le()?;
    let status = ServerStatus::from_bits_truncate(buf.try_get_u16_le()?);

    Ok(EofPacket { warnings, status })
}

fn decode_err(mut buf: &[u8]) -> Result<ErrPacket> {
    let header = buf.try_get_u8()?;
    if header != 0xFF {
        return Err(protocol_err!("expected ERR (0xFF); received 0x{:X}", header));
    }

    let error_code = buf.try_get_u16_le()?;

    let sql_state = if !buf.is_empty() && buf[0] == b'#' {
        buf.advance(1);
        let bytes = buf.get_bytes(5)?;
        let mut state = [0u8; 5];
        state.copy_from_slice(&bytes);
        Some(state)
    } else {
        None
    };

    let error_message = buf.get_str_eof()?;

    Ok(ErrPacket {
        error_code,
        sql_state,
        error_message,
    })
}

fn decode_column_definition(mut buf: &[u8]) -> Result<ColumnDefinition> {
    let catalog = buf.get_str_lenenc()?;
    if catalog != "def" {
        return Err(protocol_err!(
            "expected column definition catalog \"def\"; received {:?}",
            catalog
        ));
    }

    let schema = non_empty(buf.get_str_lenenc()?);
    let _table_alias = buf.get_str_lenenc()?;
    let table = non_empty(buf.get_str_lenenc()?);
    let name = buf.get_str_lenenc()?;
    let org_name = non_empty(buf.get_str_lenenc()?);

    let len_fixed_fields = buf.get_uint_lenenc()?.unwrap_or(0);
    if len_fixed_fields != 0x0c {
        return Err(protocol_err!(
            "expected column definition fixed-field length 0x0c; received {:#x}",
            len_fixed_fields
        ));
    }

    let char_set = buf.try_get_u16_le()?;
    let max_size = buf.try_get_u32_le()?;
    let type_id = buf.try_get_u8()?;
    let flags = buf.try_get_u16_le()?;
    let decimals = buf.try_get_u8()?;

    Ok(ColumnDefinition {
        schema,
        table,
        name,
        org_name,
        char_set,
        max_size,
        type_id,
        flags,
        decimals,
    })
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Applies an OK/EOF's status bits and session-state changes to the shared
/// connection context (spec §4.2 "The decoder updates the connection
/// context's status bits as a side effect of emitting the message").
pub(crate) fn apply_ok_to_context(ok: &OkPacket, ctx: &mut ConnectionContext) {
    ctx.apply_status(ok.status);
    for change in &ok.session_state_changes {
        if let SessionStateChange::CharacterSet(name) = change {
            tracing::debug!(character_set = %name, "session character set changed");
        }
    }
}

pub(crate) fn apply_eof_to_context(eof: &EofPacket, ctx: &mut ConnectionContext) {
    ctx.apply_status(eof.status);
}

#[cfg(test)]
mod tests {
    use super::*;

    const OK_HANDSHAKE: &[u8] = b"\x00\x00\x00\x02@\x00\x00";
    const ERR_UNKNOWN_DB: &[u8] = b"\xff\x19\x04#42000Unknown database 'unknown'";
    const HANDSHAKE_MARIADB_10_4_7: &[u8] = b"\n5.5.5-10.4.7-MariaDB-1:10.4.7+maria~bionic\x00\x0b\x00\x00\x00t6L\\j\"dS\x00\xfe\xf7\x08\x02\x00\xff\x81\x15\x00\x00\x00\x00\x00\x00\x07\x00\x00\x00U14Oph9\"<H5n\x00mysql_native_password\x00";

    #[test]
    fn decodes_ok_handshake() {
        let ok = decode_ok(OK_HANDSHAKE, Capabilities::empty()).unwrap();
        assert_eq!(ok.affected_rows, 0);
        assert_eq!(ok.last_insert_id, 0);
        assert!(ok.status.contains(ServerStatus::AUTO_COMMIT));
    }

    #[test]
    fn decodes_err_unknown_db() {
        let err = decode_err(ERR_UNKNOWN_DB).unwrap();
        assert_eq!(err.error_code, 1049);
        assert_eq!(err.sql_state.as_ref().map(|s| &s[..]), Some(&b"42000"[..]));
        assert_eq!(err.error_message, "Unknown database 'unknown'");
    }

    #[test]
    fn decodes_mariadb_handshake() {
        let handshake = decode_handshake_v10(HANDSHAKE_MARIADB_10_4_7).unwrap();
        assert_eq!(
            handshake.server_version,
            "5.5.5-10.4.7-MariaDB-1:10.4.7+maria~bionic"
        );
        assert_eq!(handshake.auth_plugin_name.as_deref(), Some("mysql_native_password"));
        assert!(handshake.status.contains(ServerStatus::AUTO_COMMIT));
    }

    #[test]
    fn dispatches_err_regardless_of_context() {
        let msg = decode(ERR_UNKNOWN_DB, DecodeContext::Command, Capabilities::empty()).unwrap();
        assert!(matches!(msg, ServerMessage::Err(_)));
    }
}
