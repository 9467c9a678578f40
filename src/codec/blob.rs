//! Binary blob codec (spec §4.7): `TINY_BLOB`/`BLOB`/`MEDIUM_BLOB`/
//! `LONG_BLOB`, and any character-string column whose collation is binary
//! (e.g. `VARBINARY`, which the wire protocol represents with the same type
//! ids as `VARCHAR`, distinguished only by collation — spec §4.7 "MySQL
//! binary/text field formats").
//!
//! Grounded on `sqlx_core/src/mysql/types/bytes.rs`.

use bytes::BytesMut;

use crate::codec::type_id;
use crate::error::Result;
use crate::io::MySqlBufMutExt;
use crate::message::client::EncodedParam;

use super::MySqlValue;

pub(crate) fn decode(bytes: &[u8], _collation: u16) -> Result<MySqlValue> {
    Ok(MySqlValue::Blob(bytes.to_vec()))
}

pub(crate) fn encode(bytes: &[u8]) -> EncodedParam {
    let mut buf = BytesMut::new();
    buf.put_bytes_lenenc(bytes);
    EncodedParam {
        type_id: type_id::BLOB,
        is_unsigned: false,
        is_null: false,
        payload: buf.to_vec(),
    }
}
