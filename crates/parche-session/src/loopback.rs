//! In-memory device emulator.
//!
//! Implements [`Transport`] by decoding host frames and queueing the replies
//! a well-behaved board would send: a capability reply at handshake, a
//! positive acknowledgement per chunk, a final transfer acknowledgement once
//! every byte is staged. Fault injection knobs cover the failure paths the
//! session must survive: dropped acknowledgements, a wrong protocol version,
//! a silent device, a lying byte count, and garbage frames.
//!
//! Used by integration tests and the CLI's dry-run deploy.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::time::Duration;

use crate::error::TransportError;
use crate::frame::Frame;
use crate::transport::{PRODUCT_ID, PROTOCOL_VERSION, Transport, VENDOR_ID};

/// Firmware signature the emulator reports at handshake.
pub const LOOPBACK_SIGNATURE: u64 = 0x7061_7263_6865_2121;

/// An emulated board behind the transport interface.
pub struct LoopbackTransport {
    present: bool,
    opened: bool,
    packet_size: usize,
    inbound: VecDeque<Vec<u8>>,
    staging: Vec<u8>,
    expected_total: u32,
    committed: Vec<u8>,
    params: BTreeMap<u16, i32>,
    batches: usize,
    reply_version: u16,
    silent_handshake: bool,
    drop_ack_once: HashSet<u32>,
    drop_acks_from: Option<u32>,
    transfer_total_override: Option<u32>,
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackTransport {
    /// A present, well-behaved device with a 64-byte packet budget.
    pub fn new() -> Self {
        Self {
            present: true,
            opened: false,
            packet_size: 64,
            inbound: VecDeque::new(),
            staging: Vec::new(),
            expected_total: 0,
            committed: Vec::new(),
            params: BTreeMap::new(),
            batches: 0,
            reply_version: PROTOCOL_VERSION,
            silent_handshake: false,
            drop_ack_once: HashSet::new(),
            drop_acks_from: None,
            transfer_total_override: None,
        }
    }

    /// Change the packet budget.
    pub fn with_packet_size(mut self, packet_size: usize) -> Self {
        self.packet_size = packet_size;
        self
    }

    /// Unplug or plug the device for enumeration.
    pub fn set_present(&mut self, present: bool) {
        self.present = present;
    }

    /// Reply to the handshake with a different protocol version.
    pub fn reply_with_version(&mut self, version: u16) {
        self.reply_version = version;
    }

    /// Never answer the capability query.
    pub fn silence_handshake(&mut self) {
        self.silent_handshake = true;
    }

    /// Swallow the first acknowledgement for the chunk at `offset`.
    pub fn drop_ack_once(&mut self, offset: u32) {
        self.drop_ack_once.insert(offset);
    }

    /// Never acknowledge any chunk at or beyond `offset`.
    pub fn drop_acks_from(&mut self, offset: u32) {
        self.drop_acks_from = Some(offset);
    }

    /// Report a wrong byte count in the final transfer acknowledgement.
    pub fn override_transfer_total(&mut self, total: u32) {
        self.transfer_total_override = Some(total);
    }

    /// Queue a device-originated parameter change notification.
    pub fn push_notify(&mut self, index: u16, value: i32) {
        self.inbound
            .push_back(Frame::ParamNotify { index, value }.encode());
    }

    /// Queue bytes that decode to nothing.
    pub fn push_garbage(&mut self) {
        self.inbound.push_back(vec![0xFF, 0x00, 0x00, 0x00, 0x00]);
    }

    /// Bytes committed by the last completed transfer.
    pub fn committed(&self) -> &[u8] {
        &self.committed
    }

    /// Last value the device applied for a runtime index.
    pub fn param(&self, index: u16) -> Option<i32> {
        self.params.get(&index).copied()
    }

    /// Number of parameter batches received.
    pub fn batch_count(&self) -> usize {
        self.batches
    }

    /// Whether the link is currently open.
    pub fn is_open(&self) -> bool {
        self.opened
    }

    fn handle(&mut self, frame: Frame) {
        match frame {
            Frame::CapabilityQuery { .. } => {
                if !self.silent_handshake {
                    self.reply(Frame::CapabilityReply {
                        protocol_version: self.reply_version,
                        firmware_signature: LOOPBACK_SIGNATURE,
                    });
                }
            }
            Frame::DeployBegin { total_len } => {
                self.staging.clear();
                self.expected_total = total_len;
                if total_len == 0 {
                    self.commit();
                }
            }
            Frame::Chunk { offset, data } => {
                let offset_usize = offset as usize;
                let end = offset_usize + data.len();
                if self.staging.len() < end {
                    self.staging.resize(end, 0);
                }
                self.staging[offset_usize..end].copy_from_slice(&data);

                if self.drop_acks_from.is_some_and(|from| offset >= from) {
                    return;
                }
                if self.drop_ack_once.remove(&offset) {
                    return;
                }
                self.reply(Frame::ChunkAck { offset });
                if self.staging.len() as u32 == self.expected_total {
                    self.commit();
                }
            }
            Frame::ParamBatch { updates } => {
                self.batches += 1;
                for (index, value) in updates {
                    self.params.insert(index, value);
                }
            }
            // Device-originated frames arriving from the host are ignored.
            Frame::CapabilityReply { .. }
            | Frame::ChunkAck { .. }
            | Frame::TransferAck { .. }
            | Frame::ParamNotify { .. } => {}
        }
    }

    fn commit(&mut self) {
        self.committed = core::mem::take(&mut self.staging);
        let total = self
            .transfer_total_override
            .unwrap_or(self.committed.len() as u32);
        self.reply(Frame::TransferAck { total });
    }

    fn reply(&mut self, frame: Frame) {
        self.inbound.push_back(frame.encode());
    }
}

impl Transport for LoopbackTransport {
    fn enumerate(&mut self, vendor_id: u16, product_id: u16) -> Result<bool, TransportError> {
        Ok(self.present && vendor_id == VENDOR_ID && product_id == PRODUCT_ID)
    }

    fn open(&mut self) -> Result<(), TransportError> {
        if !self.present {
            return Err(TransportError::Closed);
        }
        self.opened = true;
        Ok(())
    }

    fn close(&mut self) {
        self.opened = false;
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if !self.opened {
            return Err(TransportError::Closed);
        }
        if let Ok(frame) = Frame::decode(bytes) {
            self.handle(frame);
        }
        Ok(())
    }

    fn receive(&mut self, _timeout: Duration) -> Result<Option<Vec<u8>>, TransportError> {
        if !self.opened {
            return Ok(None);
        }
        Ok(self.inbound.pop_front())
    }

    fn max_packet_size(&self) -> usize {
        self.packet_size
    }
}
