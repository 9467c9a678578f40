//! The optional outer compression envelope (spec §4.1): `(24-bit
//! uncompressed length, 24-bit compressed length, 8-bit compression-seq,
//! payload)` wrapping the inner envelope stream once compression has been
//! negotiated during the handshake.
//!
//! Grounded on spec §4.1; crate choice follows `sqlx-mysql`'s
//! `zlib-compression`/`zstd-compression` features (`flate2`, `zstd`).

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{protocol_err, Result};

const HEADER_LEN: usize = 7;

/// Which compression algorithm was negotiated for this connection
/// (spec §1 non-goals: no algorithm beyond none/zlib/zstd).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionAlgorithm {
    Zlib,
    Zstd { level: i32 },
}

pub(crate) struct CompressionCodec {
    algorithm: CompressionAlgorithm,
    sequence: u8,
}

impl CompressionCodec {
    pub(crate) fn new(algorithm: CompressionAlgorithm) -> Self {
        Self {
            algorithm,
            sequence: 0,
        }
    }

    pub(crate) fn reset_sequence(&mut self) {
        self.sequence = 0;
    }

    /// Wraps an already-framed envelope stream into one compressed outer
    /// envelope. The server tolerates (and the protocol permits) shipping an
    /// uncompressed payload inside the wrapper when compressing is not
    /// worthwhile; we always compress for simplicity, mirroring what real
    /// clients do for anything but trivially small payloads.
    pub(crate) fn encode(&mut self, dst: &mut BytesMut, inner: &[u8]) -> Result<()> {
        let compressed = self.compress(inner)?;
        let uncompressed_len = inner.len() as u32;
        let compressed_len = compressed.len() as u32;

        dst.put_slice(&uncompressed_len.to_le_bytes()[..3]);
        dst.put_slice(&compressed_len.to_le_bytes()[..3]);
        dst.put_u8(self.sequence);
        dst.put_slice(&compressed);

        self.sequence = self.sequence.wrapping_add(1);
        Ok(())
    }

    /// Decodes one outer compression envelope, returning the inner
    /// (uncompressed) envelope-stream bytes.
    pub(crate) fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }

        let uncompressed_len = u32::from_le_bytes([src[0], src[1], src[2], 0]) as usize;
        let compressed_len = u32::from_le_bytes([src[3], src[4], src[5], 0]) as usize;
        let seq = src[6];

        if src.len() < HEADER_LEN + compressed_len {
            return Ok(None);
        }

        if seq != self.sequence {
            return Err(protocol_err!(
                "compression sequence id mismatch: expected {}, got {}",
                self.sequence,
                seq
            ));
        }
        self.sequence = self.sequence.wrapping_add(1);

        let _ = src.split_to(HEADER_LEN);
        let compressed = src.split_to(compressed_len);

        let payload = if uncompressed_len == 0 {
            // The protocol allows shipping an uncompressed envelope verbatim
            // when `uncompressed_len` is zero.
            compressed.freeze()
        } else {
            self.decompress(&compressed, uncompressed_len)?
        };

        Ok(Some(payload))
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self.algorithm {
            #[cfg(feature = "zlib-compression")]
            CompressionAlgorithm::Zlib => {
                use flate2::write::ZlibEncoder;
                use flate2::Compression;
                use std::io::Write;

                let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
                encoder
                    .write_all(data)
                    .map_err(|e| protocol_err!("zlib compression failed: {}", e))?;
                encoder
                    .finish()
                    .map_err(|e| protocol_err!("zlib compression failed: {}", e))
            }
            #[cfg(not(feature = "zlib-compression"))]
            CompressionAlgorithm::Zlib => Err(protocol_err!(
                "zlib compression negotiated but the `zlib-compression` feature is disabled"
            )),

            #[cfg(feature = "zstd-compression")]
            CompressionAlgorithm::Zstd { level } => zstd::stream::encode_all(data, level)
                .map_err(|e| protocol_err!("zstd compression failed: {}", e)),
            #[cfg(not(feature = "zstd-compression"))]
            CompressionAlgorithm::Zstd { .. } => Err(protocol_err!(
                "zstd compression negotiated but the `zstd-compression` feature is disabled"
            )),
        }
    }

    fn decompress(&self, data: &[u8], expected_len: usize) -> Result<Bytes> {
        let out = match self.algorithm {
            #[cfg(feature = "zlib-compression")]
            CompressionAlgorithm::Zlib => {
                use flate2::write::ZlibDecoder;
                use std::io::Write;

                let mut decoder = ZlibDecoder::new(Vec::with_capacity(expected_len));
                decoder
                    .write_all(data)
                    .map_err(|e| protocol_err!("zlib decompression failed: {}", e))?;
                decoder
                    .finish()
                    .map_err(|e| protocol_err!("zlib decompression failed: {}", e))?
            }
            #[cfg(not(feature = "zlib-compression"))]
            CompressionAlgorithm::Zlib => {
                return Err(protocol_err!(
                    "zlib compression negotiated but the `zlib-compression` feature is disabled"
                ))
            }

            #[cfg(feature = "zstd-compression")]
            CompressionAlgorithm::Zstd { .. } => zstd::stream::decode_all(data)
                .map_err(|e| protocol_err!("zstd decompression failed: {}", e))?,
            #[cfg(not(feature = "zstd-compression"))]
            CompressionAlgorithm::Zstd { .. } => {
                return Err(protocol_err!(
                    "zstd compression negotiated but the `zstd-compression` feature is disabled"
                ))
            }
        };

        if out.len() != expected_len {
            return Err(protocol_err!(
                "decompressed length mismatch: header said {}, got {}",
                expected_len,
                out.len()
            ));
        }

        Ok(Bytes::from(out))
    }
}

#[cfg(all(test, feature = "zlib-compression"))]
mod tests {
    use super::*;

    #[test]
    fn zlib_round_trips() {
        let mut codec = CompressionCodec::new(CompressionAlgorithm::Zlib);
        let payload = b"select 1".repeat(100);

        let mut wire = BytesMut::new();
        codec.encode(&mut wire, &payload).unwrap();

        let mut codec = CompressionCodec::new(CompressionAlgorithm::Zlib);
        let decoded = codec.decode(&mut wire).unwrap().unwrap();
        assert_eq!(&decoded[..], &payload[..]);
    }
}
