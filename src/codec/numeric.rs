//! Integer and floating-point codecs (spec §4.7).
//!
//! Grounded on `sqlx_core/src/mysql/types/int.rs` and `float.rs`: text-format
//! values are ASCII decimal (parsed with the `atoi` crate, matching the
//! teacher's choice over a full `str::parse` for hot-path integer columns);
//! binary-format values are fixed-width little-endian.

use crate::codec::type_id;
use crate::error::{protocol_err, Error, Result};
use crate::message::client::EncodedParam;
use crate::value::MySqlValueFormat;

use super::MySqlValue;

fn decode_err(what: &'static str) -> Error {
    protocol_err!("malformed {what} value")
}

macro_rules! text_int {
    ($bytes:expr, $ty:ty) => {
        atoi::atoi::<$ty>($bytes).ok_or_else(|| decode_err(stringify!($ty)))
    };
}

pub(crate) fn decode_tiny(bytes: &[u8], format: MySqlValueFormat, unsigned: bool) -> Result<MySqlValue> {
    match format {
        MySqlValueFormat::Text => Ok(if unsigned {
            MySqlValue::TinyUint(text_int!(bytes, u8)?)
        } else {
            MySqlValue::TinyInt(text_int!(bytes, i8)?)
        }),
        MySqlValueFormat::Binary => {
            let b = *bytes.first().ok_or_else(|| decode_err("TINY"))?;
            Ok(if unsigned {
                MySqlValue::TinyUint(b)
            } else {
                MySqlValue::TinyInt(b as i8)
            })
        }
    }
}

pub(crate) fn decode_short(bytes: &[u8], format: MySqlValueFormat, unsigned: bool) -> Result<MySqlValue> {
    match format {
        MySqlValueFormat::Text => Ok(if unsigned {
            MySqlValue::SmallUint(text_int!(bytes, u16)?)
        } else {
            MySqlValue::SmallInt(text_int!(bytes, i16)?)
        }),
        MySqlValueFormat::Binary => {
            let arr: [u8; 2] = bytes.get(..2).ok_or_else(|| decode_err("SHORT"))?.try_into().unwrap();
            let v = u16::from_le_bytes(arr);
            Ok(if unsigned {
                MySqlValue::SmallUint(v)
            } else {
                MySqlValue::SmallInt(v as i16)
            })
        }
    }
}

pub(crate) fn decode_long(bytes: &[u8], format: MySqlValueFormat, unsigned: bool) -> Result<MySqlValue> {
    match format {
        MySqlValueFormat::Text => Ok(if unsigned {
            MySqlValue::Uint(text_int!(bytes, u32)?)
        } else {
            MySqlValue::Int(text_int!(bytes, i32)?)
        }),
        MySqlValueFormat::Binary => {
            let arr: [u8; 4] = bytes.get(..4).ok_or_else(|| decode_err("LONG"))?.try_into().unwrap();
            let v = u32::from_le_bytes(arr);
            Ok(if unsigned {
                MySqlValue::Uint(v)
            } else {
                MySqlValue::Int(v as i32)
            })
        }
    }
}

pub(crate) fn decode_longlong(bytes: &[u8], format: MySqlValueFormat, unsigned: bool) -> Result<MySqlValue> {
    match format {
        MySqlValueFormat::Text => Ok(if unsigned {
            MySqlValue::BigUint(text_int!(bytes, u64)?)
        } else {
            MySqlValue::BigInt(text_int!(bytes, i64)?)
        }),
        MySqlValueFormat::Binary => {
            let arr: [u8; 8] = bytes.get(..8).ok_or_else(|| decode_err("LONGLONG"))?.try_into().unwrap();
            let v = u64::from_le_bytes(arr);
            Ok(if unsigned {
                MySqlValue::BigUint(v)
            } else {
                MySqlValue::BigInt(v as i64)
            })
        }
    }
}

pub(crate) fn decode_float(bytes: &[u8], format: MySqlValueFormat) -> Result<MySqlValue> {
    match format {
        MySqlValueFormat::Text => {
            let s = std::str::from_utf8(bytes).map_err(|_| decode_err("FLOAT"))?;
            Ok(MySqlValue::Float(s.parse().map_err(|_| decode_err("FLOAT"))?))
        }
        MySqlValueFormat::Binary => {
            let arr: [u8; 4] = bytes.get(..4).ok_or_else(|| decode_err("FLOAT"))?.try_into().unwrap();
            Ok(MySqlValue::Float(f32::from_le_bytes(arr)))
        }
    }
}

pub(crate) fn decode_double(bytes: &[u8], format: MySqlValueFormat) -> Result<MySqlValue> {
    match format {
        MySqlValueFormat::Text => {
            let s = std::str::from_utf8(bytes).map_err(|_| decode_err("DOUBLE"))?;
            Ok(MySqlValue::Double(s.parse().map_err(|_| decode_err("DOUBLE"))?))
        }
        MySqlValueFormat::Binary => {
            let arr: [u8; 8] = bytes.get(..8).ok_or_else(|| decode_err("DOUBLE"))?.try_into().unwrap();
            Ok(MySqlValue::Double(f64::from_le_bytes(arr)))
        }
    }
}

pub(crate) fn encode_tiny(v: u8, unsigned: bool) -> EncodedParam {
    EncodedParam {
        type_id: type_id::TINY,
        is_unsigned: unsigned,
        is_null: false,
        payload: vec![v],
    }
}

pub(crate) fn encode_short(v: u16, unsigned: bool) -> EncodedParam {
    EncodedParam {
        type_id: type_id::SHORT,
        is_unsigned: unsigned,
        is_null: false,
        payload: v.to_le_bytes().to_vec(),
    }
}

pub(crate) fn encode_long(v: u32, unsigned: bool) -> EncodedParam {
    EncodedParam {
        type_id: type_id::LONG,
        is_unsigned: unsigned,
        is_null: false,
        payload: v.to_le_bytes().to_vec(),
    }
}

pub(crate) fn encode_longlong(v: u64, unsigned: bool) -> EncodedParam {
    EncodedParam {
        type_id: type_id::LONGLONG,
        is_unsigned: unsigned,
        is_null: false,
        payload: v.to_le_bytes().to_vec(),
    }
}

pub(crate) fn encode_float(v: f32) -> EncodedParam {
    EncodedParam {
        type_id: type_id::FLOAT,
        is_unsigned: false,
        is_null: false,
        payload: v.to_le_bytes().to_vec(),
    }
}

pub(crate) fn encode_double(v: f64) -> EncodedParam {
    EncodedParam {
        type_id: type_id::DOUBLE,
        is_unsigned: false,
        is_null: false,
        payload: v.to_le_bytes().to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_text_and_binary_longlong() {
        let text = decode_longlong(b"-42", MySqlValueFormat::Text, false).unwrap();
        assert_eq!(text, MySqlValue::BigInt(-42));

        let binary = decode_longlong(&42i64.to_le_bytes(), MySqlValueFormat::Binary, false).unwrap();
        assert_eq!(binary, MySqlValue::BigInt(42));
    }

    #[test]
    fn decodes_unsigned_tiny() {
        let v = decode_tiny(&[200], MySqlValueFormat::Binary, true).unwrap();
        assert_eq!(v, MySqlValue::TinyUint(200));
    }
}
