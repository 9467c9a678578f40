//! The request/response exchange core (spec §4.5): serializes overlapping
//! client requests onto the single underlying connection, provides
//! cancellation-safe draining when a caller abandons a response stream
//! early, and sequences the `QUIT` shutdown.
//!
//! Grounded on `sqlx_core::mysql::connection::executor.rs::run`'s
//! `try_stream!` loop (request then decode-until-terminal, entirely on
//! `&mut self`) and `sqlx_core::common::channel::double_buffer.rs`'s
//! bounded-channel shape for the spec's stated 512-capacity bound. Unlike
//! the teacher, this crate never spawns a worker task per connection: spec
//! §5 "no locks are required" because every mutation happens on the caller's
//! own event-loop thread, which in plain `async fn` terms means every
//! method here takes `&mut self` and the borrow checker is the scheduler —
//! concurrent callers onto one connection is explicitly the out-of-scope
//! pooling/SPI facade's job (spec §1), not this core's.

use bytes::Bytes;

use crate::error::{CloseReason, Error, Result};
use crate::message::client;
use crate::transport::PacketTransport;

/// Bound named directly from spec §4.5's "bounded multicast with capacity
/// 512"; used by the row-streaming layer (`connection.rs`) as the cap on
/// how many decoded rows it will hold un-consumed before treating it as the
/// fatal overflow spec calls out, since a single connection cannot apply
/// backpressure to the wire without stalling every other exchange.
pub(crate) const RESPONSE_BUFFER_CAPACITY: usize = 512;

type TerminalCheck = Box<dyn FnMut(&Bytes) -> bool + Send>;

enum ExchangeState {
    Idle,
    Active,
    /// A response stream was dropped before observing its terminal packet
    /// (spec §9 open question 2: cancellation must not stall the
    /// connection). The leftover packets are drained the next time a
    /// request begins.
    NeedsDrain(TerminalCheck),
    Disposed,
}

/// Owns the packet transport and enforces the single-exchange-at-a-time
/// invariant (spec §4.5 "At most one client message is being encoded and
/// one server message being decoded concurrently per connection").
pub(crate) struct Exchange {
    transport: PacketTransport,
    state: ExchangeState,
}

impl Exchange {
    pub(crate) fn new(transport: PacketTransport) -> Self {
        Self {
            transport,
            state: ExchangeState::Idle,
        }
    }

    pub(crate) fn transport_mut(&mut self) -> &mut PacketTransport {
        &mut self.transport
    }

    pub(crate) fn is_disposed(&self) -> bool {
        matches!(self.state, ExchangeState::Disposed)
    }

    /// Starts a new exchange: drains any leftover packets from a cancelled
    /// prior exchange, resets the envelope sequence, and sends `payload` as
    /// the sole client message.
    pub(crate) async fn begin(&mut self, payload: &[u8]) -> Result<()> {
        self.settle_pending_drain().await?;

        match self.state {
            ExchangeState::Idle => {}
            ExchangeState::Disposed => {
                return Err(Error::ConnectionClosed(CloseReason::Expected));
            }
            ExchangeState::Active | ExchangeState::NeedsDrain(_) => {
                return Err(crate::error::protocol_err!(
                    "an exchange is already active on this connection"
                ));
            }
        }

        self.transport.reset_sequence();
        self.transport.send_packet(payload).await?;
        self.state = ExchangeState::Active;
        Ok(())
    }

    /// Receives the next raw response packet of the active exchange.
    pub(crate) async fn recv(&mut self) -> Result<Bytes> {
        if !matches!(self.state, ExchangeState::Active) {
            return Err(crate::error::protocol_err!("no exchange is active"));
        }
        self.transport.read_packet().await
    }

    /// Marks the current exchange complete; the next `begin` may proceed
    /// immediately.
    pub(crate) fn complete(&mut self) {
        self.state = ExchangeState::Idle;
    }

    /// Marks the current exchange abandoned (spec §9 open question 2): the
    /// caller's response stream was dropped without reaching a terminal
    /// packet. `is_terminal` recognizes that packet so the next `begin` can
    /// drain the leftovers without understanding this exchange's own
    /// decode context.
    pub(crate) fn abandon(&mut self, is_terminal: impl FnMut(&Bytes) -> bool + Send + 'static) {
        if matches!(self.state, ExchangeState::Active) {
            self.state = ExchangeState::NeedsDrain(Box::new(is_terminal));
        }
    }

    async fn settle_pending_drain(&mut self) -> Result<()> {
        let mut is_terminal = match std::mem::replace(&mut self.state, ExchangeState::Idle) {
            ExchangeState::NeedsDrain(f) => f,
            other => {
                self.state = other;
                return Ok(());
            }
        };

        loop {
            let packet = self.transport.read_packet().await?;
            if is_terminal(&packet) {
                break;
            }
        }
        self.state = ExchangeState::Idle;
        Ok(())
    }

    /// Sends `QUIT` and transitions to `Disposed` (spec §4.5 "Shutdown").
    /// Best-effort: the server never replies to `COM_QUIT`, and a transport
    /// error while sending it is not reported since the connection is being
    /// torn down regardless.
    pub(crate) async fn shutdown(&mut self) {
        if matches!(self.state, ExchangeState::Disposed) {
            return;
        }
        let mut buf = bytes::BytesMut::new();
        client::encode_quit(&mut buf);
        let _ = self.transport.send_packet(&buf).await;
        self.state = ExchangeState::Disposed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_terminal_marker(b: &Bytes) -> bool {
        b.first() == Some(&0xFE)
    }

    #[test]
    fn abandon_only_applies_while_active() {
        // Constructing a real `Exchange` needs a connected socket; this
        // exercises the state-transition logic in isolation via a
        // minimally-viable state value rather than a live transport.
        let mut state = ExchangeState::Idle;
        if matches!(state, ExchangeState::Active) {
            state = ExchangeState::NeedsDrain(Box::new(is_terminal_marker));
        }
        assert!(matches!(state, ExchangeState::Idle));
    }
}
