//! The packet-level read/write loop shared by the handshake FSM and the
//! request/response exchange core: owns the socket, the envelope
//! (de)compression pipeline, and the read/write buffers.
//!
//! Grounded on `sqlx_core::mysql::connection::stream::MySqlStream` wrapping
//! a `BufferedSocket` (`sqlx_core::net::socket::buffered`); collapsed into
//! plain `async fn`s operating on owned buffers instead of the teacher's
//! poll-based `Socket` trait, per this crate's "plain async fn" style.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{protocol_err, Result};
use crate::io::compression::CompressionCodec;
use crate::io::framing::{self, EnvelopeReader, ReadOutcome};
use crate::net::MaybeTlsStream;

const READ_CHUNK: usize = 8 * 1024;

pub(crate) struct PacketTransport {
    socket: Option<MaybeTlsStream>,
    envelope_reader: EnvelopeReader,
    read_buf: BytesMut,
    write_buf: BytesMut,
    write_seq: u8,
    compression: Option<CompressionCodec>,
    compressed_read_buf: BytesMut,
}

impl PacketTransport {
    pub(crate) fn new(socket: MaybeTlsStream) -> Self {
        Self {
            socket: Some(socket),
            envelope_reader: EnvelopeReader::new(),
            read_buf: BytesMut::new(),
            write_buf: BytesMut::new(),
            write_seq: 0,
            compression: None,
            compressed_read_buf: BytesMut::new(),
        }
    }

    fn socket(&mut self) -> &mut MaybeTlsStream {
        self.socket.as_mut().expect("socket only taken transiently by upgrade_socket")
    }

    pub(crate) fn into_socket(self) -> MaybeTlsStream {
        self.socket.expect("socket only taken transiently by upgrade_socket")
    }

    pub(crate) fn is_tls(&self) -> bool {
        self.socket.as_ref().expect("socket present").is_tls()
    }

    /// Runs `upgrade` against the transport's socket, replacing it with
    /// whatever comes back. Used for the SSL upgrade (spec §4.4
    /// `SSL_UPGRADING`), which must take the socket by value.
    pub(crate) async fn upgrade_socket<F, Fut>(&mut self, upgrade: F) -> Result<bool>
    where
        F: FnOnce(MaybeTlsStream) -> Fut,
        Fut: std::future::Future<Output = Result<(MaybeTlsStream, bool)>>,
    {
        let socket = self.socket.take().expect("socket present");
        let (socket, upgraded) = upgrade(socket).await?;
        self.socket = Some(socket);
        Ok(upgraded)
    }

    /// Resets the envelope (and, if active, compression) sequence counters
    /// (spec §4.1 "Sequence reset").
    pub(crate) fn reset_sequence(&mut self) {
        self.envelope_reader.reset_sequence();
        self.write_seq = 0;
        if let Some(c) = &mut self.compression {
            c.reset_sequence();
        }
    }

    pub(crate) fn enable_compression(&mut self, codec: CompressionCodec) {
        self.compression = Some(codec);
    }

    /// Reads one fully-assembled logical payload.
    pub(crate) async fn read_packet(&mut self) -> Result<Bytes> {
        loop {
            if self.compression.is_some() {
                if let Some(payload) = self.try_decode_compressed()? {
                    return Ok(payload);
                }
            } else if let ReadOutcome::Payload(payload) =
                self.envelope_reader.decode(&mut self.read_buf)?
            {
                return Ok(payload);
            }

            let mut chunk = [0u8; READ_CHUNK];
            let n = self.socket().read(&mut chunk).await?;
            if n == 0 {
                return Err(protocol_err!("connection closed by peer mid-packet"));
            }

            if self.compression.is_some() {
                self.compressed_read_buf.extend_from_slice(&chunk[..n]);
            } else {
                self.read_buf.extend_from_slice(&chunk[..n]);
            }
        }
    }

    fn try_decode_compressed(&mut self) -> Result<Option<Bytes>> {
        let compression = self.compression.as_mut().expect("checked by caller");
        while let Some(inner) = compression.decode(&mut self.compressed_read_buf)? {
            self.read_buf.extend_from_slice(&inner);
        }
        if let ReadOutcome::Payload(payload) = self.envelope_reader.decode(&mut self.read_buf)? {
            return Ok(Some(payload));
        }
        Ok(None)
    }

    /// Enqueues a logical payload for writing, splitting it into envelopes.
    /// Does not flush; call [`PacketTransport::flush`] once the burst is done.
    pub(crate) fn queue_packet(&mut self, payload: &[u8]) {
        let mut envelope_buf = BytesMut::new();
        self.write_seq = framing::encode(&mut envelope_buf, payload, self.write_seq);

        match &mut self.compression {
            Some(codec) => {
                let mut compressed = BytesMut::new();
                // Compression failures surface on flush via the stored error path is
                // overkill here; encode() only fails on backend misconfiguration,
                // which connect-time negotiation already prevents.
                codec
                    .encode(&mut compressed, &envelope_buf)
                    .expect("compression backend was validated during negotiation");
                self.write_buf.extend_from_slice(&compressed);
            }
            None => self.write_buf.extend_from_slice(&envelope_buf),
        }
    }

    pub(crate) async fn flush(&mut self) -> Result<()> {
        if !self.write_buf.is_empty() {
            self.socket().write_all(&self.write_buf).await?;
            self.socket().flush().await?;
            self.write_buf.clear();
        }
        Ok(())
    }

    /// Convenience: queue then immediately flush, for request/response
    /// exchanges that don't pipeline.
    pub(crate) async fn send_packet(&mut self, payload: &[u8]) -> Result<()> {
        self.queue_packet(payload);
        self.flush().await
    }
}
