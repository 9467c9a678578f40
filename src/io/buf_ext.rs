//! Length-encoded integer and string decoding, layered over [`bytes::Buf`].
//!
//! Grounded on `sqlx_core::mysql::io::buf_ext::BufExt` / `sqlx_core::io::Buf`.

use bytes::Buf;
use memchr::memchr;

use crate::error::{protocol_err, Error, Result};

/// Extensions for decoding MySQL's length-encoded integers and strings out
/// of a `bytes::Buf` (spec §6: "var-int (1/3/4/9-byte)").
pub(crate) trait MySqlBufExt: Buf {
    /// Decode a length-encoded integer. Returns `None` for the NULL marker
    /// (`0xFB`) so callers at the row level can distinguish NULL fields.
    fn get_uint_lenenc(&mut self) -> Result<Option<u64>> {
        if self.remaining() == 0 {
            return Err(protocol_eof());
        }

        let first = self.get_u8();

        Ok(match first {
            0xFB => None,
            0xFC => Some(self.try_get_u16_le()? as u64),
            0xFD => Some(self.try_get_u24_le()? as u64),
            0xFE => Some(self.try_get_u64_le()?),
            v => Some(v as u64),
        })
    }

    fn try_get_u24_le(&mut self) -> Result<u32> {
        if self.remaining() < 3 {
            return Err(protocol_eof());
        }
        let mut bytes = [0u8; 4];
        self.copy_to_slice(&mut bytes[..3]);
        Ok(u32::from_le_bytes(bytes))
    }

    fn try_get_u16_le(&mut self) -> Result<u16> {
        if self.remaining() < 2 {
            return Err(protocol_eof());
        }
        Ok(self.get_u16_le())
    }

    fn try_get_u32_le(&mut self) -> Result<u32> {
        if self.remaining() < 4 {
            return Err(protocol_eof());
        }
        Ok(self.get_u32_le())
    }

    fn try_get_u64_le(&mut self) -> Result<u64> {
        if self.remaining() < 8 {
            return Err(protocol_eof());
        }
        Ok(self.get_u64_le())
    }

    fn try_get_u8(&mut self) -> Result<u8> {
        if self.remaining() == 0 {
            return Err(protocol_eof());
        }
        Ok(self.get_u8())
    }

    /// A length-encoded byte string.
    fn get_bytes_lenenc(&mut self) -> Result<Vec<u8>> {
        let len = self.get_uint_lenenc()?.unwrap_or(0) as usize;
        self.get_bytes(len)
    }

    fn get_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        if self.remaining() < len {
            return Err(protocol_eof());
        }
        let mut out = vec![0u8; len];
        self.copy_to_slice(&mut out);
        Ok(out)
    }

    /// A length-encoded UTF-8 string.
    fn get_str_lenenc(&mut self) -> Result<String> {
        let bytes = self.get_bytes_lenenc()?;
        String::from_utf8(bytes)
            .map_err(|e| protocol_err!("invalid utf-8 in length-encoded string: {}", e))
    }

    /// A NUL-terminated UTF-8 string.
    fn get_str_nul(&mut self) -> Result<String> {
        let chunk = self.chunk();
        let len = memchr(0, chunk).ok_or_else(|| protocol_err!("missing NUL terminator"))?;
        let mut out = vec![0u8; len];
        out.copy_from_slice(&chunk[..len]);
        self.advance(len + 1);
        String::from_utf8(out).map_err(|e| protocol_err!("invalid utf-8 in nul string: {}", e))
    }

    /// The remainder of the buffer as a UTF-8 string (used for the trailing
    /// `info`/`error_message` fields that run to end-of-packet).
    fn get_str_eof(&mut self) -> Result<String> {
        let len = self.remaining();
        let bytes = self.get_bytes(len)?;
        String::from_utf8(bytes).map_err(|e| protocol_err!("invalid utf-8: {}", e))
    }
}

impl<T: Buf + ?Sized> MySqlBufExt for T {}

fn protocol_eof() -> Error {
    Error::protocol(format_args!("unexpected end of packet"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn decodes_lenenc_int_single_byte() {
        let mut buf = Bytes::from_static(&[0x05]);
        assert_eq!(buf.get_uint_lenenc().unwrap(), Some(5));
    }

    #[test]
    fn decodes_lenenc_int_two_byte() {
        let mut buf = Bytes::from_static(&[0xFC, 0x2C, 0x01]);
        assert_eq!(buf.get_uint_lenenc().unwrap(), Some(300));
    }

    #[test]
    fn decodes_lenenc_null_marker() {
        let mut buf = Bytes::from_static(&[0xFB]);
        assert_eq!(buf.get_uint_lenenc().unwrap(), None);
    }

    #[test]
    fn decodes_nul_terminated_string() {
        let mut buf = Bytes::from_static(b"root\0rest");
        assert_eq!(buf.get_str_nul().unwrap(), "root");
        assert_eq!(buf.get_str_eof().unwrap(), "rest");
    }
}
