//! Decoded result rows (spec §3 "Row messages carry `FieldValue`s").
//!
//! Grounded on `sqlx_core::mysql::row::MySqlRow` and `column.rs`'s
//! `MySqlColumn`; unlike the teacher, decoding is eager — every field is
//! turned into a concrete [`MySqlValue`] as the row is built, rather than
//! lazily through a generic `Decode` trait, matching this crate's
//! concrete-enum value model (spec §1 non-goals).

use bytes::{Buf, Bytes};

use crate::codec::{self, MySqlValue};
use crate::context::ConnectionContext;
use crate::error::{protocol_err, Error, Result};
use crate::io::MySqlBufExt;
use crate::message::server::ColumnDefinition;
use crate::value::{FieldValue, MySqlValueFormat, MySqlValueRef};

const UNSIGNED_FLAG: u16 = 0x0020;

/// A result column's metadata, stripped down from the wire
/// [`ColumnDefinition`] to what callers need after the row has been
/// decoded.
#[derive(Debug, Clone)]
pub struct MySqlColumn {
    pub name: String,
    pub(crate) type_id: u8,
    pub(crate) is_unsigned: bool,
    pub(crate) collation: u16,
    pub(crate) max_size: u32,
}

impl From<&ColumnDefinition> for MySqlColumn {
    fn from(def: &ColumnDefinition) -> Self {
        MySqlColumn {
            name: def.name.clone(),
            type_id: def.type_id,
            is_unsigned: def.flags & UNSIGNED_FLAG != 0,
            collation: def.char_set,
            max_size: def.max_size,
        }
    }
}

/// One decoded result row: every field already resolved to a
/// [`MySqlValue`], in column order.
#[derive(Debug, Clone)]
pub struct MySqlRow {
    columns: std::sync::Arc<[MySqlColumn]>,
    values: Vec<MySqlValue>,
}

impl MySqlRow {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn columns(&self) -> &[MySqlColumn] {
        &self.columns
    }

    /// Fetches a value by ordinal position.
    pub fn get(&self, index: usize) -> Result<&MySqlValue> {
        self.values.get(index).ok_or_else(|| Error::ColumnIndexOutOfBounds {
            index,
            len: self.values.len(),
        })
    }

    /// Fetches a value by column name; the first match wins if the result
    /// set has duplicate column names (e.g. a join with no aliasing).
    pub fn get_by_name(&self, name: &str) -> Result<&MySqlValue> {
        let index = self
            .columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| Error::ColumnNotFound(name.into()))?;
        Ok(&self.values[index])
    }

    /// Builds a row with no wire representation, for results synthesized by
    /// the connection layer rather than decoded from the server (spec §4.6
    /// "Last insert id synthesis").
    pub(crate) fn synthetic(columns: std::sync::Arc<[MySqlColumn]>, values: Vec<MySqlValue>) -> Self {
        MySqlRow { columns, values }
    }

    pub(crate) fn decode_text(
        payload: &Bytes,
        columns: std::sync::Arc<[MySqlColumn]>,
        ctx: &ConnectionContext,
    ) -> Result<Self> {
        let mut buf = &payload[..];
        let mut values = Vec::with_capacity(columns.len());

        for column in columns.iter() {
            if buf.first() == Some(&0xFB) {
                buf.advance(1);
                values.push(MySqlValue::Null);
                continue;
            }

            let raw = buf.get_bytes_lenenc()?;
            let field = FieldValue::Inline(Bytes::from(raw));
            let value_ref = MySqlValueRef {
                value: Some(&field),
                format: MySqlValueFormat::Text,
                type_id: column.type_id,
                is_unsigned: column.is_unsigned,
                collation: column.collation,
            };
            values.push(decode_with_tiny_int1(&value_ref, column, ctx)?);
        }

        Ok(MySqlRow { columns, values })
    }

    pub(crate) fn decode_binary(
        payload: &Bytes,
        columns: std::sync::Arc<[MySqlColumn]>,
        ctx: &ConnectionContext,
    ) -> Result<Self> {
        let mut buf = &payload[..];
        let header = buf.try_get_u8()?;
        if header != 0x00 {
            return Err(protocol_err!(
                "expected binary row header byte 0x00; received 0x{header:02X}"
            ));
        }

        let null_bitmap_len = (columns.len() + 7 + 2) / 8;
        let null_bitmap = buf.get_bytes(null_bitmap_len)?;

        let mut values = Vec::with_capacity(columns.len());

        for (i, column) in columns.iter().enumerate() {
            let bit = i + 2;
            let is_null = null_bitmap[bit / 8] & (1 << (bit % 8)) != 0;

            if is_null {
                values.push(MySqlValue::Null);
                continue;
            }

            let width = binary_field_width(column.type_id, &buf)?;
            let raw = buf.get_bytes(width)?;
            let field = FieldValue::Inline(Bytes::from(raw));
            let value_ref = MySqlValueRef {
                value: Some(&field),
                format: MySqlValueFormat::Binary,
                type_id: column.type_id,
                is_unsigned: column.is_unsigned,
                collation: column.collation,
            };
            values.push(decode_with_tiny_int1(&value_ref, column, ctx)?);
        }

        Ok(MySqlRow { columns, values })
    }
}

/// Applies `tinyInt1isBit` (spec §6): a `TINYINT(1)` column decodes to
/// [`MySqlValue::Bit`] instead of [`MySqlValue::TinyInt`]/[`MySqlValue::TinyUint`]
/// when the option is set, since this crate has no separate boolean variant.
fn decode_with_tiny_int1(
    value_ref: &MySqlValueRef<'_>,
    column: &MySqlColumn,
    ctx: &ConnectionContext,
) -> Result<MySqlValue> {
    if ctx.tiny_int1_is_bit
        && column.type_id == codec::type_id::TINY
        && column.max_size == 1
        && !value_ref.is_null()
    {
        let bytes = value_ref.as_bytes().expect("checked non-null above");
        let is_true = match value_ref.format() {
            MySqlValueFormat::Text => bytes.as_ref() != b"0",
            MySqlValueFormat::Binary => bytes.first().copied().unwrap_or(0) != 0,
        };
        return Ok(MySqlValue::Bit(is_true as u64));
    }

    codec::decode_field(value_ref, ctx.zero_date)
}

/// The number of payload bytes a binary-protocol field occupies, for the
/// fixed-width types whose size isn't self-describing via a length prefix
/// (spec §4.7's "MySQL binary/text field formats"). Variable-length types
/// carry their own lenenc length and are peeked from `buf` without
/// consuming it, since [`MySqlRow::decode_binary`] still needs the whole
/// field (prefix included) via [`MySqlBufExt::get_bytes`].
fn binary_field_width(type_id: u8, buf: &&[u8]) -> Result<usize> {
    use codec::type_id::*;

    Ok(match type_id {
        LONGLONG | DOUBLE => 8,
        LONG | INT24 | FLOAT => 4,
        SHORT | YEAR => 2,
        TINY => 1,
        NULL => 0,
        VARCHAR | VAR_STRING | STRING | ENUM | SET | DECIMAL | NEWDECIMAL | TINY_BLOB
        | MEDIUM_BLOB | LONG_BLOB | BLOB | BIT | DATE | TIME | DATETIME | TIMESTAMP | JSON
        | GEOMETRY => lenenc_field_width(buf)?,
        other => return Err(protocol_err!("unrecognized binary-protocol type id 0x{other:02X}")),
    })
}

/// For length-encoded fields, the total width (prefix + payload) so the
/// caller can slice it off in one `get_bytes` call.
fn lenenc_field_width(buf: &&[u8]) -> Result<usize> {
    let mut peek = *buf;
    if peek.is_empty() {
        return Err(protocol_err!("truncated length-encoded field"));
    }
    let prefix_len = match peek[0] {
        0xFC => 3,
        0xFD => 4,
        0xFE => 9,
        _ => 1,
    };
    let len = peek.get_uint_lenenc()?.unwrap_or(0) as usize;
    Ok(prefix_len + len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ZeroDate;

    fn context() -> ConnectionContext {
        ConnectionContext {
            connection_id: 1,
            server_version: Default::default(),
            capabilities: crate::capabilities::Capabilities::empty(),
            status: crate::status::ServerStatus::empty(),
            client_collation: crate::collation::COLLATION_UTF8MB4_UNICODE_CI,
            server_collation: crate::collation::COLLATION_UTF8MB4_UNICODE_CI,
            connection_time_zone: Default::default(),
            zero_date: ZeroDate::UseRound,
            local_infile_root: None,
            local_infile_buffer_size: 0,
            preserve_instants: true,
            tiny_int1_is_bit: false,
            auth_plugin_name: String::new(),
            auth_nonce: Vec::new(),
        }
    }

    fn long_column(name: &str) -> MySqlColumn {
        MySqlColumn {
            name: name.to_string(),
            type_id: codec::type_id::LONG,
            is_unsigned: false,
            collation: crate::collation::COLLATION_BINARY,
            max_size: 11,
        }
    }

    #[test]
    fn decodes_text_row_with_null() {
        let mut payload = Vec::new();
        payload.push(1u8); // lenenc len 1
        payload.push(b'5');
        payload.push(0xFB); // NULL

        let columns: std::sync::Arc<[MySqlColumn]> =
            vec![long_column("a"), long_column("b")].into();
        let row = MySqlRow::decode_text(&Bytes::from(payload), columns, &context()).unwrap();

        assert_eq!(row.get(0).unwrap(), &MySqlValue::Int(5));
        assert_eq!(row.get(1).unwrap(), &MySqlValue::Null);
    }

    #[test]
    fn decodes_binary_row_fixed_width() {
        let mut payload = vec![0x00u8];
        payload.push(0b0000_0000); // null bitmap, 1 column -> 1 byte, no nulls
        payload.extend_from_slice(&42i32.to_le_bytes());

        let columns: std::sync::Arc<[MySqlColumn]> = vec![long_column("a")].into();
        let row = MySqlRow::decode_binary(&Bytes::from(payload), columns, &context()).unwrap();

        assert_eq!(row.get(0).unwrap(), &MySqlValue::Int(42));
    }

    #[test]
    fn get_by_name_finds_column() {
        let mut payload = vec![0x00u8, 0b0000_0000];
        payload.extend_from_slice(&7i32.to_le_bytes());

        let columns: std::sync::Arc<[MySqlColumn]> = vec![long_column("count")].into();
        let row = MySqlRow::decode_binary(&Bytes::from(payload), columns, &context()).unwrap();

        assert_eq!(row.get_by_name("count").unwrap(), &MySqlValue::Int(7));
        assert!(row.get_by_name("missing").is_err());
    }
}
