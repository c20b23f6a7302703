//! The per-connection protocol state machine.

use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::{debug, trace, warn};

use crate::error::{ProtocolError, TransportError};
use crate::frame::{self, Frame};
use crate::transport::{
    ACK_TIMEOUT, HANDSHAKE_TIMEOUT, MAX_CHUNK_RETRIES, PRODUCT_ID, PROTOCOL_VERSION, Transport,
    VENDOR_ID,
};

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No device. Terminal on detach or unrecoverable error.
    Disconnected,
    /// Looking for a device with the known vendor/product ids.
    Enumerating,
    /// Capability query sent, awaiting a bounded-time reply.
    Handshaking,
    /// Connected and quiescent; accepts deploys and parameter exchanges.
    Idle,
    /// Streaming a binary; still accepts parameter exchanges.
    Transferring,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Enumerating => "enumerating",
            SessionState::Handshaking => "handshaking",
            SessionState::Idle => "idle",
            SessionState::Transferring => "transferring",
        };
        f.write_str(name)
    }
}

/// Typed notifications for the editor collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The state machine moved.
    StateChanged(SessionState),
    /// Transfer progress in bytes.
    TransferProgress {
        /// Bytes acknowledged so far.
        sent: u64,
        /// Total binary size.
        total: u64,
    },
    /// The device reported a parameter change (e.g. a front-panel control).
    ///
    /// Apply it with `apply_device_value` so the change is not retransmitted.
    ParameterChanged {
        /// Runtime index of the parameter.
        index: u16,
        /// New raw value.
        value: i32,
    },
    /// The session dropped to Disconnected.
    Detached,
}

/// How a deploy ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployOutcome {
    /// Every byte acknowledged and the final count matched.
    Completed,
    /// Cancelled between chunks; the device's running firmware is untouched.
    Cancelled,
}

/// One connection to one device.
///
/// Single-threaded by design: outbound sends are serialized, with at most
/// one request awaiting acknowledgement at any time. Inbound notifications
/// are drained by [`Session::poll_inbound`] and during acknowledgement waits.
pub struct Session<T: Transport> {
    transport: T,
    state: SessionState,
    firmware_signature: Option<u64>,
    /// Coalesced pending updates, latest value per index, submission order.
    pending: Vec<(u16, i32)>,
    events: Sender<SessionEvent>,
}

impl<T: Transport> Session<T> {
    /// Create a session over a transport, plus the event stream observers
    /// subscribe to.
    pub fn new(transport: T) -> (Self, Receiver<SessionEvent>) {
        let (events, receiver) = unbounded();
        (
            Self {
                transport,
                state: SessionState::Disconnected,
                firmware_signature: None,
                pending: Vec::new(),
                events,
            },
            receiver,
        )
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Signature of the firmware the device reported at handshake.
    pub fn firmware_signature(&self) -> Option<u64> {
        self.firmware_signature
    }

    /// Borrow the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Borrow the underlying transport mutably.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Enumerate, open, and handshake with a device.
    ///
    /// On success the session is Idle. On any failure it is back to
    /// Disconnected and the caller must re-initiate enumeration.
    pub fn attach(&mut self) -> Result<(), ProtocolError> {
        if self.state != SessionState::Disconnected {
            return Err(ProtocolError::InvalidState {
                operation: "attach",
                state: self.state,
            });
        }

        self.set_state(SessionState::Enumerating);
        let found = self
            .transport
            .enumerate(VENDOR_ID, PRODUCT_ID)
            .map_err(|source| self.fail_transport(source))?;
        if !found {
            self.drop_to_disconnected();
            return Err(ProtocolError::NoDevice {
                vendor_id: VENDOR_ID,
                product_id: PRODUCT_ID,
            });
        }
        self.transport
            .open()
            .map_err(|source| self.fail_transport(source))?;

        self.set_state(SessionState::Handshaking);
        self.send_frame(&Frame::CapabilityQuery {
            protocol_version: PROTOCOL_VERSION,
        })?;
        let reply = match self.receive_frame(HANDSHAKE_TIMEOUT)? {
            Some(frame) => frame,
            None => {
                let state = self.state;
                self.drop_to_disconnected();
                return Err(ProtocolError::HandshakeTimeout { state });
            }
        };
        match reply {
            Frame::CapabilityReply {
                protocol_version,
                firmware_signature,
            } => {
                if protocol_version != PROTOCOL_VERSION {
                    let state = self.state;
                    self.drop_to_disconnected();
                    return Err(ProtocolError::ProtocolVersionMismatch {
                        state,
                        device: protocol_version,
                        expected: PROTOCOL_VERSION,
                    });
                }
                debug!(firmware_signature, "handshake complete");
                self.firmware_signature = Some(firmware_signature);
                self.set_state(SessionState::Idle);
                Ok(())
            }
            other => Err(self.fail_framing(format!("expected capability reply, got {other:?}"))),
        }
    }

    /// Close the transport and drop to Disconnected.
    pub fn detach(&mut self) {
        if self.state != SessionState::Disconnected {
            self.drop_to_disconnected();
        }
    }

    /// Stream a compiled binary to the device.
    ///
    /// Splits the binary into transport-sized chunks, each requiring a
    /// positive acknowledgement within [`ACK_TIMEOUT`]; a missing ACK is
    /// retried up to [`MAX_CHUNK_RETRIES`] times before the transfer fails
    /// with `TransferTimeout` and the session returns to Idle with nothing
    /// committed. The final acknowledgement must match the byte count sent.
    ///
    /// `cancel` is honored between chunks only; a cancelled transfer leaves
    /// the device's running firmware intact.
    ///
    /// A deploy discards pending parameter batches: the runtime indices they
    /// reference are invalidated by the new binary.
    pub fn deploy(
        &mut self,
        binary: &[u8],
        cancel: &AtomicBool,
    ) -> Result<DeployOutcome, ProtocolError> {
        if self.state != SessionState::Idle {
            return Err(ProtocolError::InvalidState {
                operation: "deploy",
                state: self.state,
            });
        }
        self.pending.clear();
        self.set_state(SessionState::Transferring);

        let total = binary.len() as u32;
        let chunk_len = self
            .transport
            .max_packet_size()
            .saturating_sub(frame::CHUNK_OVERHEAD)
            .max(1);
        debug!(total, chunk_len, "deploy start");

        self.send_frame(&Frame::DeployBegin { total_len: total })?;

        let mut offset = 0usize;
        while offset < binary.len() {
            if cancel.load(Ordering::Relaxed) {
                debug!(offset, "deploy cancelled between chunks");
                self.set_state(SessionState::Idle);
                return Ok(DeployOutcome::Cancelled);
            }
            let end = (offset + chunk_len).min(binary.len());
            let chunk = Frame::Chunk {
                offset: offset as u32,
                data: binary[offset..end].to_vec(),
            };
            self.send_chunk_acked(&chunk, offset as u32)?;
            offset = end;
            let _ = self.events.send(SessionEvent::TransferProgress {
                sent: offset as u64,
                total: u64::from(total),
            });
        }

        match self.await_ack("transfer ack")? {
            Frame::TransferAck { total: committed } => {
                if committed != total {
                    let state = self.state;
                    self.set_state(SessionState::Idle);
                    return Err(ProtocolError::TransferSizeMismatch {
                        state,
                        sent: total,
                        committed,
                    });
                }
                debug!(total, "deploy complete");
                self.set_state(SessionState::Idle);
                Ok(DeployOutcome::Completed)
            }
            other => Err(self.fail_framing(format!("expected transfer ack, got {other:?}"))),
        }
    }

    /// Queue a parameter update, coalescing with any pending update of the
    /// same index (latest value wins, submission order preserved).
    pub fn queue_parameter(&mut self, index: u16, raw: i32) {
        if let Some(entry) = self.pending.iter_mut().find(|(i, _)| *i == index) {
            entry.1 = raw;
        } else {
            self.pending.push((index, raw));
        }
    }

    /// Send all pending updates as one batch. Best-effort: no ACK awaited.
    ///
    /// Accepted while Idle or Transferring; parameter exchanges ride along
    /// with an in-progress transfer.
    pub fn flush_parameters(&mut self) -> Result<(), ProtocolError> {
        if !matches!(
            self.state,
            SessionState::Idle | SessionState::Transferring
        ) {
            return Err(ProtocolError::InvalidState {
                operation: "parameter flush",
                state: self.state,
            });
        }
        if self.pending.is_empty() {
            return Ok(());
        }
        let updates = core::mem::take(&mut self.pending);
        trace!(count = updates.len(), "parameter batch");
        self.send_frame(&Frame::ParamBatch { updates })
    }

    /// Drain device-originated frames without blocking.
    ///
    /// `ParamNotify` frames become [`SessionEvent::ParameterChanged`];
    /// anything else is out-of-sequence and forces Disconnected.
    pub fn poll_inbound(&mut self) -> Result<(), ProtocolError> {
        if self.state == SessionState::Disconnected {
            return Ok(());
        }
        while let Some(frame) = self.receive_frame(Duration::ZERO)? {
            match frame {
                Frame::ParamNotify { index, value } => {
                    trace!(index, value, "device parameter notify");
                    let _ = self
                        .events
                        .send(SessionEvent::ParameterChanged { index, value });
                }
                other => {
                    return Err(
                        self.fail_framing(format!("unexpected inbound frame {other:?}"))
                    );
                }
            }
        }
        Ok(())
    }

    // --- internals ---

    /// Send one chunk and await its positive acknowledgement, retrying a
    /// bounded number of times. Absence of a NAK is never treated as success.
    fn send_chunk_acked(&mut self, chunk: &Frame, offset: u32) -> Result<(), ProtocolError> {
        for attempt in 0..=MAX_CHUNK_RETRIES {
            if attempt > 0 {
                warn!(offset, attempt, "chunk unacknowledged, retrying");
            }
            self.send_frame(chunk)?;
            match self.await_frame(ACK_TIMEOUT)? {
                Some(Frame::ChunkAck { offset: acked }) if acked == offset => {
                    trace!(offset, "chunk acknowledged");
                    return Ok(());
                }
                Some(other) => {
                    return Err(
                        self.fail_framing(format!("out-of-sequence ack: {other:?}"))
                    );
                }
                None => {}
            }
        }
        let state = self.state;
        self.set_state(SessionState::Idle);
        Err(ProtocolError::TransferTimeout {
            state,
            offset,
            retries: MAX_CHUNK_RETRIES,
        })
    }

    /// Await the end-of-transfer acknowledgement with the same retry budget
    /// as a chunk (the device may still be flushing its final write).
    fn await_ack(&mut self, what: &'static str) -> Result<Frame, ProtocolError> {
        for _ in 0..=MAX_CHUNK_RETRIES {
            if let Some(frame) = self.await_frame(ACK_TIMEOUT)? {
                return Ok(frame);
            }
        }
        warn!(what, "no final acknowledgement");
        let state = self.state;
        self.set_state(SessionState::Idle);
        Err(ProtocolError::TransferTimeout {
            state,
            offset: 0,
            retries: MAX_CHUNK_RETRIES,
        })
    }

    /// Wait for a protocol frame, letting asynchronous parameter notifies
    /// through as events instead of treating them as out-of-sequence.
    fn await_frame(&mut self, timeout: Duration) -> Result<Option<Frame>, ProtocolError> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.receive_frame(remaining)? {
                Some(Frame::ParamNotify { index, value }) => {
                    let _ = self
                        .events
                        .send(SessionEvent::ParameterChanged { index, value });
                }
                Some(frame) => return Ok(Some(frame)),
                None => return Ok(None),
            }
        }
    }

    fn send_frame(&mut self, frame: &Frame) -> Result<(), ProtocolError> {
        let bytes = frame.encode();
        trace!(len = bytes.len(), "send frame");
        self.transport
            .send(&bytes)
            .map_err(|source| self.fail_transport(source))
    }

    fn receive_frame(&mut self, timeout: Duration) -> Result<Option<Frame>, ProtocolError> {
        let Some(bytes) = self
            .transport
            .receive(timeout)
            .map_err(|source| self.fail_transport(source))?
        else {
            return Ok(None);
        };
        match Frame::decode(&bytes) {
            Ok(frame) => Ok(Some(frame)),
            Err(err) => Err(self.fail_framing(err.to_string())),
        }
    }

    /// A framing error means both sides lost synchronization: drop the
    /// connection immediately, no mid-stream resync.
    fn fail_framing(&mut self, reason: String) -> ProtocolError {
        let state = self.state;
        warn!(%state, reason, "framing error");
        self.drop_to_disconnected();
        ProtocolError::Framing { state, reason }
    }

    fn fail_transport(&mut self, source: TransportError) -> ProtocolError {
        let state = self.state;
        warn!(%state, %source, "transport failure");
        self.drop_to_disconnected();
        ProtocolError::Transport { state, source }
    }

    fn drop_to_disconnected(&mut self) {
        self.transport.close();
        self.firmware_signature = None;
        self.pending.clear();
        self.set_state(SessionState::Disconnected);
        let _ = self.events.send(SessionEvent::Detached);
    }

    fn set_state(&mut self, next: SessionState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "session state");
            self.state = next;
            let _ = self.events.send(SessionEvent::StateChanged(next));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loopback::LoopbackTransport;

    #[test]
    fn parameter_flush_is_accepted_mid_transfer() {
        let (mut session, _events) = Session::new(LoopbackTransport::new());
        session.attach().unwrap();

        // Force the in-transfer state directly; deploy() itself never yields
        // control mid-transfer on this thread.
        session.state = SessionState::Transferring;
        session.queue_parameter(2, 41);
        session.flush_parameters().unwrap();

        assert_eq!(session.transport().batch_count(), 1);
        assert_eq!(session.transport().param(2), Some(41));
    }

    #[test]
    fn parameter_flush_is_rejected_during_handshake_states() {
        let (mut session, _events) = Session::new(LoopbackTransport::new());
        session.state = SessionState::Enumerating;
        session.queue_parameter(0, 1);
        assert!(matches!(
            session.flush_parameters(),
            Err(ProtocolError::InvalidState {
                operation: "parameter flush",
                ..
            })
        ));
    }
}
