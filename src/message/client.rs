//! Client-to-server message encoding (spec §4.3).
//!
//! Grounded on `sqlx_core::mysql::protocol::{handshake_response, ssl_request,
//! com_query, com_stmt_prepare, com_stmt_execute, com_ping,
//! com_set_option}`; each variant's `encode` method mirrors the field order
//! of its teacher counterpart, re-pointed at `BytesMut`/`MySqlBufMutExt`
//! instead of a bare `Vec<u8>` + `byteorder`.

use bitflags::bitflags;
use bytes::{BufMut, BytesMut};

use crate::capabilities::Capabilities;
use crate::io::MySqlBufMutExt;

pub(crate) const COM_QUIT: u8 = 0x01;
pub(crate) const COM_QUERY: u8 = 0x03;
pub(crate) const COM_PING: u8 = 0x0E;
pub(crate) const COM_STMT_PREPARE: u8 = 0x16;
pub(crate) const COM_STMT_EXECUTE: u8 = 0x17;
pub(crate) const COM_STMT_CLOSE: u8 = 0x19;
pub(crate) const COM_STMT_RESET: u8 = 0x1A;
pub(crate) const COM_STMT_FETCH: u8 = 0x1C;
pub(crate) const COM_SET_OPTION: u8 = 0x1B;
pub(crate) const COM_CHANGE_USER: u8 = 0x11;

bitflags! {
    /// Cursor flags on `COM_STMT_EXECUTE` (spec §4.6 step 3 "cursor-flag READ_ONLY").
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct CursorFlags: u8 {
        const NO_CURSOR = 0;
        const READ_ONLY = 1;
        const FOR_UPDATE = 2;
        const SCROLLABLE = 4;
    }
}

pub(crate) struct HandshakeResponse<'a> {
    pub(crate) max_packet_size: u32,
    pub(crate) client_collation: u8,
    pub(crate) username: &'a str,
    pub(crate) database: Option<&'a str>,
    pub(crate) auth_plugin_name: &'a str,
    pub(crate) auth_response: &'a [u8],
    pub(crate) connection_attrs: &'a [(String, String)],
    pub(crate) zstd_level: Option<i8>,
}

impl HandshakeResponse<'_> {
    pub(crate) fn encode(&self, buf: &mut BytesMut, capabilities: Capabilities) {
        buf.put_u32_le(capabilities.bits() as u32);
        buf.put_u32_le(self.max_packet_size);
        buf.put_u8(self.client_collation);
        buf.put_bytes(0, 19);

        buf.put_u32_le((capabilities.bits() >> 32) as u32);

        buf.put_str_nul(self.username);

        if capabilities.contains(Capabilities::PLUGIN_AUTH_LENENC_CLIENT_DATA) {
            buf.put_bytes_lenenc(self.auth_response);
        } else if capabilities.contains(Capabilities::SECURE_CONNECTION) {
            buf.put_u8(self.auth_response.len() as u8);
            buf.put_slice(self.auth_response);
        } else {
            buf.put_u8(0);
        }

        if capabilities.contains(Capabilities::CONNECT_WITH_DB) {
            if let Some(database) = self.database {
                buf.put_str_nul(database);
            }
        }

        if capabilities.contains(Capabilities::PLUGIN_AUTH) {
            buf.put_str_nul(self.auth_plugin_name);
        }

        if capabilities.contains(Capabilities::CONNECT_ATTRS) {
            let mut attrs_buf = BytesMut::new();
            for (key, value) in self.connection_attrs {
                attrs_buf.put_str_lenenc(key);
                attrs_buf.put_str_lenenc(value);
            }
            buf.put_bytes_lenenc(&attrs_buf);
        }

        if capabilities.contains(Capabilities::ZSTD_COMPRESSION_ALGORITHM) {
            buf.put_i8(self.zstd_level.unwrap_or(3));
        }
    }
}

pub(crate) struct SslRequest {
    pub(crate) max_packet_size: u32,
    pub(crate) client_collation: u8,
}

impl SslRequest {
    pub(crate) fn encode(&self, buf: &mut BytesMut, capabilities: Capabilities) {
        debug_assert!(capabilities.contains(Capabilities::SSL));
        buf.put_u32_le(capabilities.bits() as u32);
        buf.put_u32_le(self.max_packet_size);
        buf.put_u8(self.client_collation);
        buf.put_bytes(0, 23);
    }
}

/// A bare auth-data continuation sent in response to AUTH_MORE_DATA or
/// change-auth-plugin (spec §4.4).
pub(crate) fn encode_auth_response(buf: &mut BytesMut, response: &[u8]) {
    buf.put_slice(response);
}

pub(crate) fn encode_quit(buf: &mut BytesMut) {
    buf.put_u8(COM_QUIT);
}

pub(crate) fn encode_query(buf: &mut BytesMut, sql: &str) {
    buf.put_u8(COM_QUERY);
    buf.put_slice(sql.as_bytes());
}

pub(crate) fn encode_ping(buf: &mut BytesMut) {
    buf.put_u8(COM_PING);
}

pub(crate) fn encode_stmt_prepare(buf: &mut BytesMut, sql: &str) {
    buf.put_u8(COM_STMT_PREPARE);
    buf.put_slice(sql.as_bytes());
}

pub(crate) fn encode_stmt_close(buf: &mut BytesMut, statement_id: u32) {
    buf.put_u8(COM_STMT_CLOSE);
    buf.put_u32_le(statement_id);
}

pub(crate) fn encode_stmt_reset(buf: &mut BytesMut, statement_id: u32) {
    buf.put_u8(COM_STMT_RESET);
    buf.put_u32_le(statement_id);
}

pub(crate) fn encode_stmt_fetch(buf: &mut BytesMut, statement_id: u32, fetch_size: u32) {
    buf.put_u8(COM_STMT_FETCH);
    buf.put_u32_le(statement_id);
    buf.put_u32_le(fetch_size);
}

/// One bound parameter's encoded type code and binary payload, built by
/// [`crate::codec`] before the execute message is assembled.
pub(crate) struct EncodedParam {
    pub(crate) type_id: u8,
    pub(crate) is_unsigned: bool,
    pub(crate) is_null: bool,
    pub(crate) payload: Vec<u8>,
}

pub(crate) struct StmtExecute<'a> {
    pub(crate) statement_id: u32,
    pub(crate) cursor: CursorFlags,
    pub(crate) params: &'a [EncodedParam],
    /// Always `true` in this crate's flows (spec §4.6 step 4: simplification
    /// vs. the protocol's optional type-reuse).
    pub(crate) new_params_bound: bool,
}

impl StmtExecute<'_> {
    pub(crate) fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(COM_STMT_EXECUTE);
        buf.put_u32_le(self.statement_id);
        buf.put_u8(self.cursor.bits());
        buf.put_u32_le(1); // iteration count, always 1

        if !self.params.is_empty() {
            let null_bitmap_len = self.params.len().div_ceil(8);
            let mut null_bitmap = vec![0u8; null_bitmap_len];
            for (i, param) in self.params.iter().enumerate() {
                if param.is_null {
                    null_bitmap[i / 8] |= 1 << (i % 8);
                }
            }
            buf.put_slice(&null_bitmap);

            buf.put_u8(self.new_params_bound as u8);

            for param in self.params {
                buf.put_u8(param.type_id);
                buf.put_u8(if param.is_unsigned { 0x80 } else { 0 });
            }

            for param in self.params {
                if !param.is_null {
                    buf.put_slice(&param.payload);
                }
            }
        }
    }
}

pub(crate) fn encode_set_option(buf: &mut BytesMut, multi_statements_on: bool) {
    buf.put_u8(COM_SET_OPTION);
    buf.put_u16_le(if multi_statements_on { 0 } else { 1 });
}

/// `COM_CHANGE_USER` (spec §10 "re-runs auth negotiation"): re-authenticates
/// the session as a different user without reconnecting.
pub(crate) struct ChangeUser<'a> {
    pub(crate) username: &'a str,
    pub(crate) auth_response: &'a [u8],
    pub(crate) database: Option<&'a str>,
    pub(crate) collation: u8,
    pub(crate) auth_plugin_name: &'a str,
    pub(crate) connection_attrs: &'a [(String, String)],
}

impl ChangeUser<'_> {
    pub(crate) fn encode(&self, buf: &mut BytesMut, capabilities: Capabilities) {
        buf.put_u8(COM_CHANGE_USER);
        buf.put_str_nul(self.username);
        buf.put_u8(self.auth_response.len() as u8);
        buf.put_slice(self.auth_response);
        buf.put_str_nul(self.database.unwrap_or(""));
        buf.put_u16_le(self.collation as u16);

        if capabilities.contains(Capabilities::PLUGIN_AUTH) {
            buf.put_str_nul(self.auth_plugin_name);
        }

        if capabilities.contains(Capabilities::CONNECT_ATTRS) {
            let mut attrs_buf = BytesMut::new();
            for (key, value) in self.connection_attrs {
                attrs_buf.put_str_lenenc(key);
                attrs_buf.put_str_lenenc(value);
            }
            buf.put_bytes_lenenc(&attrs_buf);
        }
    }
}

/// One chunk of a LOCAL INFILE response (spec §4.3 "must always end with a
/// zero-length payload"); `Vec::new()` signals end-of-file or (per spec
/// §4.6 "LOCAL INFILE safety") a disallowed path.
pub(crate) fn encode_local_infile_chunk(buf: &mut BytesMut, chunk: &[u8]) {
    buf.put_slice(chunk);
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn stmt_execute_layout_matches_spec() {
        let params = vec![EncodedParam {
            type_id: 0x08, // LONGLONG
            is_unsigned: false,
            is_null: false,
            payload: 42i64.to_le_bytes().to_vec(),
        }];

        let exec = StmtExecute {
            statement_id: 7,
            cursor: CursorFlags::NO_CURSOR,
            params: &params,
            new_params_bound: true,
        };

        let mut buf = BytesMut::new();
        exec.encode(&mut buf);

        assert_eq!(buf[0], COM_STMT_EXECUTE);
        assert_eq!(&buf[1..5], &7u32.to_le_bytes());
        assert_eq!(buf[5], 0); // NO_CURSOR
        assert_eq!(&buf[6..10], &1u32.to_le_bytes());
        assert_eq!(buf[10], 0); // null bitmap, one byte, no nulls
        assert_eq!(buf[11], 1); // new-params-bound
        assert_eq!(buf[12], 0x08); // type code
        assert_eq!(buf[13], 0); // unsigned flag
        assert_eq!(&buf[14..22], &42i64.to_le_bytes());
    }

    #[test]
    fn query_message_has_no_trailing_nul() {
        let mut buf = BytesMut::new();
        encode_query(&mut buf, "SELECT 1");
        assert_eq!(&buf[..], b"\x03SELECT 1");
    }

    proptest! {
        #[test]
        fn null_bitmap_has_exactly_ceil_k_over_8_bytes_with_matching_bits(
            nulls in proptest::collection::vec(any::<bool>(), 0..64),
        ) {
            let params: Vec<EncodedParam> = nulls
                .iter()
                .map(|&is_null| EncodedParam {
                    type_id: 0x08,
                    is_unsigned: false,
                    is_null,
                    payload: if is_null { Vec::new() } else { 0i64.to_le_bytes().to_vec() },
                })
                .collect();

            let exec = StmtExecute {
                statement_id: 1,
                cursor: CursorFlags::NO_CURSOR,
                params: &params,
                new_params_bound: true,
            };

            let mut buf = BytesMut::new();
            exec.encode(&mut buf);

            if params.is_empty() {
                return Ok(());
            }

            let null_bitmap_len = params.len().div_ceil(8);
            let bitmap_start = 10;
            let null_bitmap = &buf[bitmap_start..bitmap_start + null_bitmap_len];
            prop_assert_eq!(null_bitmap.len(), null_bitmap_len);

            for (i, &is_null) in nulls.iter().enumerate() {
                let bit = null_bitmap[i / 8] & (1 << (i % 8)) != 0;
                prop_assert_eq!(bit, is_null);
            }
        }
    }
}
