//! The envelope/packet codec (spec §4.1): splits and reassembles the
//! 3-byte-length + 1-byte-sequence envelope that wraps every MySQL payload,
//! transparently joining payloads that span more than one envelope.
//!
//! Grounded on spec §4.1 directly; the `Packet` newtype mirrors the shape
//! `sqlx_core::mysql::protocol::Packet` is threaded through in
//! `connection/executor.rs`, generalized to an explicit assembler since the
//! teacher relies on the transport already buffering whole frames.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{protocol_err, Result};

/// The largest payload a single envelope can carry. Payloads longer than
/// this are split across consecutive envelopes that share one logical
/// message (spec §4.1 "Outbound").
pub(crate) const MAX_ENVELOPE_LEN: usize = 0xFF_FFFF; // 16 MiB - 1

const HEADER_LEN: usize = 4;

/// Assembles inbound envelopes from a byte stream into complete logical
/// payloads, joining continuations at the [`MAX_ENVELOPE_LEN`] boundary.
///
/// One assembler instance lives for the whole connection; `reset_sequence`
/// is called at each of the sequence-reset events spec §4.1 names (post
/// login, compression upgrade, start of an independent exchange).
#[derive(Debug, Default)]
pub(crate) struct EnvelopeReader {
    sequence: u8,
    payload: BytesMut,
    in_progress: bool,
}

pub(crate) enum ReadOutcome {
    /// Not enough bytes buffered yet to assemble a full envelope.
    Incomplete,
    /// A complete logical payload has been assembled.
    Payload(Bytes),
}

impl EnvelopeReader {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Resets the sequence counter to zero ahead of an independent exchange,
    /// a successful login, or a compression upgrade (spec §4.1 "Sequence reset").
    pub(crate) fn reset_sequence(&mut self) {
        self.sequence = 0;
    }

    /// Attempts to assemble one complete logical payload out of `src`,
    /// consuming only the bytes that belong to completed envelopes.
    ///
    /// Call in a loop: each call either advances `src` past one envelope (and
    /// returns `Incomplete` unless that envelope closed out a payload) or
    /// leaves `src` untouched because the next envelope's header hasn't
    /// fully arrived.
    pub(crate) fn decode(&mut self, src: &mut BytesMut) -> Result<ReadOutcome> {
        loop {
            if src.len() < HEADER_LEN {
                return Ok(ReadOutcome::Incomplete);
            }

            let len = u32::from_le_bytes([src[0], src[1], src[2], 0]) as usize;
            let seq = src[3];

            if src.len() < HEADER_LEN + len {
                return Ok(ReadOutcome::Incomplete);
            }

            if seq != self.sequence {
                return Err(protocol_err!(
                    "sequence id mismatch: expected {}, got {}",
                    self.sequence,
                    seq
                ));
            }
            self.sequence = self.sequence.wrapping_add(1);

            src.advance(HEADER_LEN);
            let chunk = src.split_to(len);

            let was_max = len == MAX_ENVELOPE_LEN;

            if !self.in_progress && !was_max {
                // Common case: a single envelope carries the whole payload.
                return Ok(ReadOutcome::Payload(chunk.freeze()));
            }

            self.in_progress = true;
            self.payload.extend_from_slice(&chunk);

            if !was_max {
                self.in_progress = false;
                return Ok(ReadOutcome::Payload(self.payload.split().freeze()));
            }

            // Exactly MAX_ENVELOPE_LEN: keep accumulating, loop for more.
        }
    }
}

/// Splits a logical payload into the envelopes `encode` writes to the wire,
/// assigning sequence ids starting from `start_seq` and returning the next
/// free sequence id for the caller to carry into the following message.
pub(crate) fn encode(dst: &mut BytesMut, payload: &[u8], start_seq: u8) -> u8 {
    let mut seq = start_seq;
    let mut rest = payload;

    loop {
        let take = rest.len().min(MAX_ENVELOPE_LEN);
        write_envelope(dst, &rest[..take], seq);
        seq = seq.wrapping_add(1);
        rest = &rest[take..];

        if take < MAX_ENVELOPE_LEN {
            break;
        }
        if rest.is_empty() {
            // Exact multiple of the max: append the terminal zero-length envelope.
            write_envelope(dst, &[], seq);
            seq = seq.wrapping_add(1);
            break;
        }
    }

    seq
}

fn write_envelope(dst: &mut BytesMut, chunk: &[u8], seq: u8) {
    let len = chunk.len() as u32;
    let len_bytes = len.to_le_bytes();
    dst.put_slice(&len_bytes[..3]);
    dst.put_u8(seq);
    dst.put_slice(chunk);
}

/// The number of envelopes a payload of length `len` is split into by
/// [`encode`] (spec §8 testable property: `ceil(L / (2^24-1)) + [L mod
/// (2^24-1) == 0]`).
#[cfg(test)]
pub(crate) fn envelope_count(len: usize) -> usize {
    let max = MAX_ENVELOPE_LEN;
    let mut count = len.div_ceil(max).max(1);
    if len % max == 0 {
        count += 1;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn single_small_envelope_round_trips() {
        let mut wire = BytesMut::new();
        encode(&mut wire, b"hello", 0);

        let mut reader = EnvelopeReader::new();
        match reader.decode(&mut wire).unwrap() {
            ReadOutcome::Payload(p) => assert_eq!(&p[..], b"hello"),
            ReadOutcome::Incomplete => panic!("expected a complete payload"),
        }
    }

    #[test]
    fn sequence_mismatch_is_a_protocol_error() {
        let mut wire = BytesMut::new();
        encode(&mut wire, b"hello", 5);

        let mut reader = EnvelopeReader::new();
        assert!(reader.decode(&mut wire).is_err());
    }

    #[test]
    fn exact_multiple_of_max_gets_terminal_zero_envelope() {
        let payload = vec![0u8; MAX_ENVELOPE_LEN * 2];
        let mut wire = BytesMut::new();
        let next_seq = encode(&mut wire, &payload, 0);
        assert_eq!(next_seq, 3); // two full envelopes + one zero-length terminator

        let mut reader = EnvelopeReader::new();
        loop {
            match reader.decode(&mut wire).unwrap() {
                ReadOutcome::Payload(p) => {
                    assert_eq!(p.len(), payload.len());
                    break;
                }
                ReadOutcome::Incomplete => panic!("wire should contain the whole message"),
            }
        }
    }

    proptest! {
        #[test]
        fn round_trips_arbitrary_small_payloads(payload in proptest::collection::vec(any::<u8>(), 0..4096)) {
            let mut wire = BytesMut::new();
            encode(&mut wire, &payload, 0);

            let mut reader = EnvelopeReader::new();
            let mut assembled = None;
            while assembled.is_none() {
                match reader.decode(&mut wire).unwrap() {
                    ReadOutcome::Payload(p) => assembled = Some(p),
                    ReadOutcome::Incomplete => break,
                }
            }
            prop_assert_eq!(assembled.as_deref(), Some(payload.as_slice()));
        }
    }

    #[test]
    fn envelope_count_matches_formula() {
        assert_eq!(envelope_count(0), 1);
        assert_eq!(envelope_count(10), 1);
        assert_eq!(envelope_count(MAX_ENVELOPE_LEN), 2);
        assert_eq!(envelope_count(MAX_ENVELOPE_LEN + 1), 2);
        assert_eq!(envelope_count(MAX_ENVELOPE_LEN * 2), 3);
    }
}
