//! `JSON` codec (spec §4.7), feature-gated on `json` since it pulls in
//! `serde_json`.
//!
//! Grounded on `sqlx_core/src/mysql/types/json.rs`: the wire representation
//! is the same for text and binary protocols — a UTF-8 JSON document, with
//! no MySQL-specific binary encoding (unlike the internal on-disk JSON
//! storage format, which this crate never sees over the wire).

use bytes::BytesMut;

use crate::codec::type_id;
use crate::error::{protocol_err, Result};
use crate::io::MySqlBufMutExt;
use crate::message::client::EncodedParam;

use super::MySqlValue;

pub(crate) fn decode(bytes: &[u8]) -> Result<MySqlValue> {
    let value = serde_json::from_slice(bytes)
        .map_err(|e| protocol_err!("malformed JSON column value: {e}"))?;
    Ok(MySqlValue::Json(value))
}

pub(crate) fn encode(value: &serde_json::Value) -> EncodedParam {
    let text = value.to_string();
    let mut buf = BytesMut::new();
    buf.put_bytes_lenenc(text.as_bytes());
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
    use serde_json::json;

    #[test]
    fn decodes_json_object() {
        let v = decode(br#"{"a":1}"#).unwrap();
        assert_eq!(v, MySqlValue::Json(json!({"a": 1})));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(decode(b"{not json").is_err());
    }

    #[test]
    fn encode_length_prefixes_payload() {
        let encoded = encode(&json!({"a": 1}));
        assert_eq!(encoded.payload[0] as usize, encoded.payload.len() - 1);
    }
}
