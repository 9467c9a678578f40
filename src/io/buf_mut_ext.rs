//! Length-encoded integer and string encoding, layered over [`bytes::BufMut`].
//!
//! Grounded on `sqlx_core::mysql::io::buf_mut_ext::BufMutExt` /
//! `sqlx_core::io::BufMut`.

use bytes::BufMut;

/// Extensions for encoding MySQL's length-encoded integers and strings onto
/// a `bytes::BufMut` (spec §6: "var-int (1/3/4/9-byte)").
pub(crate) trait MySqlBufMutExt: BufMut {
    /// Encode a length-encoded integer. Callers that need to express NULL
    /// write the `0xFB` marker directly rather than calling this.
    fn put_uint_lenenc(&mut self, value: u64) {
        if value < 251 {
            self.put_u8(value as u8);
        } else if value <= 0xFFFF {
            self.put_u8(0xFC);
            self.put_u16_le(value as u16);
        } else if value <= 0xFF_FFFF {
            self.put_u24_le(value as u32);
        } else {
            self.put_u8(0xFE);
            self.put_u64_le(value);
        }
    }

    fn put_u24_le(&mut self, value: u32) {
        self.put_u8(0xFD);
        let bytes = value.to_le_bytes();
        self.put_slice(&bytes[..3]);
    }

    /// A length-encoded byte string (length prefix, then the raw bytes).
    fn put_bytes_lenenc(&mut self, bytes: &[u8]) {
        self.put_uint_lenenc(bytes.len() as u64);
        self.put_slice(bytes);
    }

    /// A length-encoded UTF-8 string.
    fn put_str_lenenc(&mut self, s: &str) {
        self.put_bytes_lenenc(s.as_bytes());
    }

    /// A NUL-terminated string.
    fn put_str_nul(&mut self, s: &str) {
        self.put_slice(s.as_bytes());
        self.put_u8(0);
    }
}

impl<T: BufMut + ?Sized> MySqlBufMutExt for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_small_lenenc_int() {
        let mut buf = Vec::new();
        buf.put_uint_lenenc(5);
        assert_eq!(buf, vec![0x05]);
    }

    #[test]
    fn round_trips_two_byte_lenenc_int() {
        let mut buf = Vec::new();
        buf.put_uint_lenenc(300);
        assert_eq!(buf, vec![0xFC, 0x2C, 0x01]);
    }

    #[test]
    fn round_trips_three_byte_lenenc_int() {
        let mut buf = Vec::new();
        buf.put_uint_lenenc(0x10_0000);
        assert_eq!(buf, vec![0xFD, 0x00, 0x00, 0x10]);
    }

    #[test]
    fn encodes_nul_terminated_string() {
        let mut buf = Vec::new();
        buf.put_str_nul("root");
        assert_eq!(buf, b"root\0");
    }
}
