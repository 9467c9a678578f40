//! Character-string codec (spec §4.7): `VARCHAR`/`CHAR`/`TEXT`/`ENUM`/`SET`
//! and the decimal types (decoded as text, since this crate carries no
//! arbitrary-precision type by default — see the `bigdecimal`/`rust_decimal`
//! features).
//!
//! Grounded on `sqlx_core/src/mysql/types/str.rs`; collation-driven
//! is-binary detection reuses [`crate::collation::is_binary_collation`]
//! rather than re-deriving it from the column's character-set id.

use bytes::BytesMut;

use crate::codec::type_id;
use crate::collation::is_binary_collation;
use crate::error::{protocol_err, Result};
use crate::io::MySqlBufMutExt;
use crate::message::client::EncodedParam;

use super::MySqlValue;

pub(crate) fn decode(bytes: &[u8], collation: u16) -> Result<MySqlValue> {
    if is_binary_collation(collation) {
        return super::blob::decode(bytes, collation);
    }
    let s = std::str::from_utf8(bytes)
        .map_err(|_| protocol_err!("column declared as a character string was not valid UTF-8"))?;
    Ok(MySqlValue::Text(s.to_string()))
}

/// `COM_STMT_EXECUTE` binary params are variable-length and therefore
/// length-encoded (spec §4.3); fixed-width numeric types carry no such
/// prefix since the type id alone determines their width, but this one does
/// — `EncodedParam::payload` is written to the wire verbatim, so the lenenc
/// length prefix belongs here, not in the message encoder.
pub(crate) fn encode(s: &str) -> EncodedParam {
    let mut buf = BytesMut::new();
    buf.put_bytes_lenenc(s.as_bytes());
    EncodedParam {
        type_id: type_id::VAR_STRING,
        is_unsigned: false,
        is_null: false,
        payload: buf.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_utf8_text() {
        let v = decode("hello".as_bytes(), crate::collation::COLLATION_UTF8MB4_UNICODE_CI).unwrap();
        assert_eq!(v, MySqlValue::Text("hello".to_string()));
    }

    #[test]
    fn binary_collation_decodes_as_blob() {
        let v = decode(&[0xff, 0xfe], crate::collation::COLLATION_BINARY).unwrap();
        assert_eq!(v, MySqlValue::Blob(vec![0xff, 0xfe]));
    }
}
