//! `BIT(M)` codec (spec §4.7): up to 64 bits, wire-encoded as the raw
//! big-endian byte string in both text and binary protocols (no separate
//! binary form — unlike the fixed-width integer types).
//!
//! Grounded on `sqlx_core/src/mysql/types/bit.rs` (absent from the
//! retrieval snapshot; the encoding itself is directly in the MySQL manual's
//! `BIT` column description, which the teacher's sibling integer codecs
//! already follow the shape of).

use bytes::BytesMut;

use crate::codec::type_id;
use crate::error::{protocol_err, Result};
use crate::io::MySqlBufMutExt;
use crate::message::client::EncodedParam;

use super::MySqlValue;

pub(crate) fn decode(bytes: &[u8]) -> Result<MySqlValue> {
    if bytes.len() > 8 {
        return Err(protocol_err!("BIT value wider than 64 bits is not representable"));
    }
    let mut v: u64 = 0;
    for &b in bytes {
        v = (v << 8) | b as u64;
    }
    Ok(MySqlValue::Bit(v))
}

pub(crate) fn encode(v: u64) -> EncodedParam {
    // Trim to the minimal big-endian byte string MySQL expects; an all-zero
    // value is still sent as a single zero byte.
    let full = v.to_be_bytes();
    let first_nonzero = full.iter().position(|&b| b != 0).unwrap_or(7);
    let mut buf = BytesMut::new();
    buf.put_bytes_lenenc(&full[first_nonzero..]);
    EncodedParam {
        type_id: type_id::BIT,
        is_unsigned: true,
        is_null: false,
        payload: buf.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_small_bit_value() {
        let encoded = encode(0b1011);
        assert_eq!(encoded.payload, vec![1, 0b1011]);
        let decoded = decode(&encoded.payload[1..]).unwrap();
        assert_eq!(decoded, MySqlValue::Bit(0b1011));
    }
}
