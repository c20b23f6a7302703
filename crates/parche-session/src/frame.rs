//! Wire frame codec.
//!
//! Layout: opcode (1 byte), payload length (u16 LE), payload, CRC-16 (u16 LE)
//! computed over opcode + length + payload. Integers are little-endian. A
//! frame that fails any structural check decodes to a [`FrameError`]; the
//! session maps that to a framing protocol error and disconnects.

use thiserror::Error;

/// Fixed bytes around a payload: opcode + length + checksum.
pub const HEADER_LEN: usize = 3;
/// Trailing checksum bytes.
pub const CRC_LEN: usize = 2;
/// Bytes a chunk frame occupies beyond its data payload (header, offset, CRC).
pub const CHUNK_OVERHEAD: usize = HEADER_LEN + 4 + CRC_LEN;

const OP_CAPABILITY_QUERY: u8 = 0x01;
const OP_CAPABILITY_REPLY: u8 = 0x02;
const OP_DEPLOY_BEGIN: u8 = 0x03;
const OP_CHUNK: u8 = 0x04;
const OP_CHUNK_ACK: u8 = 0x05;
const OP_TRANSFER_ACK: u8 = 0x06;
const OP_PARAM_BATCH: u8 = 0x07;
const OP_PARAM_NOTIFY: u8 = 0x08;

/// One protocol-level unit exchanged with the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Host → device: which protocol revision does the device speak?
    CapabilityQuery {
        /// Revision the host speaks.
        protocol_version: u16,
    },
    /// Device → host: revision plus the signature of the running firmware.
    CapabilityReply {
        /// Revision the device speaks.
        protocol_version: u16,
        /// Identifies the binary currently flashed.
        firmware_signature: u64,
    },
    /// Host → device: a transfer of `total_len` bytes follows.
    DeployBegin {
        /// Total binary size in bytes.
        total_len: u32,
    },
    /// Host → device: one binary chunk at the given byte offset.
    Chunk {
        /// Byte offset within the binary.
        offset: u32,
        /// Chunk payload.
        data: Vec<u8>,
    },
    /// Device → host: positive acknowledgement of the chunk at `offset`.
    ChunkAck {
        /// Echoed chunk offset.
        offset: u32,
    },
    /// Device → host: transfer complete, `total` bytes committed.
    TransferAck {
        /// Bytes the device committed.
        total: u32,
    },
    /// Host → device: coalesced parameter updates, latest value per index.
    ParamBatch {
        /// `(runtime index, raw value)` pairs in submission order.
        updates: Vec<(u16, i32)>,
    },
    /// Device → host: a parameter changed on the device side.
    ParamNotify {
        /// Runtime index of the parameter.
        index: u16,
        /// New raw value.
        value: i32,
    },
}

/// Structural decode failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Fewer bytes than a minimal frame.
    #[error("frame truncated: {len} bytes")]
    Truncated {
        /// Bytes received.
        len: usize,
    },
    /// Declared payload length disagrees with the bytes present.
    #[error("payload length mismatch: declared {declared}, present {present}")]
    LengthMismatch {
        /// Length field value.
        declared: usize,
        /// Payload bytes actually present.
        present: usize,
    },
    /// Checksum failure.
    #[error("bad checksum: computed {computed:#06x}, received {received:#06x}")]
    BadChecksum {
        /// CRC this side computed.
        computed: u16,
        /// CRC carried by the frame.
        received: u16,
    },
    /// Unknown opcode byte.
    #[error("unknown opcode {opcode:#04x}")]
    UnknownOpcode {
        /// The offending byte.
        opcode: u8,
    },
    /// Payload does not parse under its opcode's layout.
    #[error("malformed {opcode:#04x} payload")]
    MalformedPayload {
        /// Opcode whose payload failed to parse.
        opcode: u8,
    },
}

impl Frame {
    /// Encode into one wire packet.
    pub fn encode(&self) -> Vec<u8> {
        let (opcode, payload) = self.payload();
        let mut out = Vec::with_capacity(HEADER_LEN + payload.len() + CRC_LEN);
        out.push(opcode);
        out.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        out.extend_from_slice(&payload);
        let crc = crc16(&out);
        out.extend_from_slice(&crc.to_le_bytes());
        out
    }

    /// Decode one wire packet.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() < HEADER_LEN + CRC_LEN {
            return Err(FrameError::Truncated { len: bytes.len() });
        }
        let declared = usize::from(u16::from_le_bytes([bytes[1], bytes[2]]));
        let present = bytes.len() - HEADER_LEN - CRC_LEN;
        if declared != present {
            return Err(FrameError::LengthMismatch { declared, present });
        }
        let body = &bytes[..bytes.len() - CRC_LEN];
        let received = u16::from_le_bytes([bytes[bytes.len() - 2], bytes[bytes.len() - 1]]);
        let computed = crc16(body);
        if computed != received {
            return Err(FrameError::BadChecksum { computed, received });
        }

        let opcode = bytes[0];
        let payload = &bytes[HEADER_LEN..bytes.len() - CRC_LEN];
        let malformed = FrameError::MalformedPayload { opcode };
        match opcode {
            OP_CAPABILITY_QUERY => Ok(Frame::CapabilityQuery {
                protocol_version: read_u16(payload, 0).ok_or(malformed)?,
            }),
            OP_CAPABILITY_REPLY => {
                if payload.len() != 10 {
                    return Err(malformed);
                }
                Ok(Frame::CapabilityReply {
                    protocol_version: read_u16(payload, 0).ok_or(malformed.clone())?,
                    firmware_signature: read_u64(payload, 2).ok_or(malformed)?,
                })
            }
            OP_DEPLOY_BEGIN => Ok(Frame::DeployBegin {
                total_len: read_u32(payload, 0).ok_or(malformed)?,
            }),
            OP_CHUNK => {
                if payload.len() < 4 {
                    return Err(malformed);
                }
                Ok(Frame::Chunk {
                    offset: read_u32(payload, 0).ok_or(malformed)?,
                    data: payload[4..].to_vec(),
                })
            }
            OP_CHUNK_ACK => Ok(Frame::ChunkAck {
                offset: read_u32(payload, 0).ok_or(malformed)?,
            }),
            OP_TRANSFER_ACK => Ok(Frame::TransferAck {
                total: read_u32(payload, 0).ok_or(malformed)?,
            }),
            OP_PARAM_BATCH => {
                if payload.len() < 2 {
                    return Err(malformed);
                }
                let count = usize::from(u16::from_le_bytes([payload[0], payload[1]]));
                if payload.len() != 2 + count * 6 {
                    return Err(malformed);
                }
                let mut updates = Vec::with_capacity(count);
                for i in 0..count {
                    let base = 2 + i * 6;
                    let index = read_u16(payload, base).ok_or(malformed.clone())?;
                    let value = read_i32(payload, base + 2).ok_or(malformed.clone())?;
                    updates.push((index, value));
                }
                Ok(Frame::ParamBatch { updates })
            }
            OP_PARAM_NOTIFY => {
                if payload.len() != 6 {
                    return Err(malformed);
                }
                Ok(Frame::ParamNotify {
                    index: read_u16(payload, 0).ok_or(malformed.clone())?,
                    value: read_i32(payload, 2).ok_or(malformed)?,
                })
            }
            other => Err(FrameError::UnknownOpcode { opcode: other }),
        }
    }

    fn payload(&self) -> (u8, Vec<u8>) {
        match self {
            Frame::CapabilityQuery { protocol_version } => {
                (OP_CAPABILITY_QUERY, protocol_version.to_le_bytes().to_vec())
            }
            Frame::CapabilityReply {
                protocol_version,
                firmware_signature,
            } => {
                let mut payload = Vec::with_capacity(10);
                payload.extend_from_slice(&protocol_version.to_le_bytes());
                payload.extend_from_slice(&firmware_signature.to_le_bytes());
                (OP_CAPABILITY_REPLY, payload)
            }
            Frame::DeployBegin { total_len } => {
                (OP_DEPLOY_BEGIN, total_len.to_le_bytes().to_vec())
            }
            Frame::Chunk { offset, data } => {
                let mut payload = Vec::with_capacity(4 + data.len());
                payload.extend_from_slice(&offset.to_le_bytes());
                payload.extend_from_slice(data);
                (OP_CHUNK, payload)
            }
            Frame::ChunkAck { offset } => (OP_CHUNK_ACK, offset.to_le_bytes().to_vec()),
            Frame::TransferAck { total } => (OP_TRANSFER_ACK, total.to_le_bytes().to_vec()),
            Frame::ParamBatch { updates } => {
                let mut payload = Vec::with_capacity(2 + updates.len() * 6);
                payload.extend_from_slice(&(updates.len() as u16).to_le_bytes());
                for (index, value) in updates {
                    payload.extend_from_slice(&index.to_le_bytes());
                    payload.extend_from_slice(&value.to_le_bytes());
                }
                (OP_PARAM_BATCH, payload)
            }
            Frame::ParamNotify { index, value } => {
                let mut payload = Vec::with_capacity(6);
                payload.extend_from_slice(&index.to_le_bytes());
                payload.extend_from_slice(&value.to_le_bytes());
                (OP_PARAM_NOTIFY, payload)
            }
        }
    }
}

fn read_u16(bytes: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_le_bytes(
        bytes.get(at..at + 2)?.try_into().ok()?,
    ))
}

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    Some(u32::from_le_bytes(
        bytes.get(at..at + 4)?.try_into().ok()?,
    ))
}

fn read_i32(bytes: &[u8], at: usize) -> Option<i32> {
    Some(i32::from_le_bytes(
        bytes.get(at..at + 4)?.try_into().ok()?,
    ))
}

fn read_u64(bytes: &[u8], at: usize) -> Option<u64> {
    Some(u64::from_le_bytes(
        bytes.get(at..at + 8)?.try_into().ok()?,
    ))
}

/// CRC-16/CCITT-FALSE, polynomial 0x1021, initial value 0xFFFF.
fn crc16(bytes: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in bytes {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_round_trip() {
        let frames = [
            Frame::CapabilityQuery {
                protocol_version: 1,
            },
            Frame::CapabilityReply {
                protocol_version: 1,
                firmware_signature: 0xdead_beef_cafe_f00d,
            },
            Frame::DeployBegin { total_len: 4096 },
            Frame::Chunk {
                offset: 512,
                data: vec![0xAA; 48],
            },
            Frame::ChunkAck { offset: 512 },
            Frame::TransferAck { total: 4096 },
            Frame::ParamBatch {
                updates: vec![(0, 1 << 21), (7, -42)],
            },
            Frame::ParamNotify {
                index: 3,
                value: -1,
            },
        ];
        for frame in frames {
            let bytes = frame.encode();
            assert_eq!(Frame::decode(&bytes).unwrap(), frame);
        }
    }

    #[test]
    fn corrupted_byte_fails_checksum() {
        let mut bytes = Frame::ChunkAck { offset: 9 }.encode();
        bytes[4] ^= 0x01;
        assert!(matches!(
            Frame::decode(&bytes),
            Err(FrameError::BadChecksum { .. })
        ));
    }

    #[test]
    fn truncated_frame_is_rejected() {
        let bytes = Frame::TransferAck { total: 1 }.encode();
        assert!(matches!(
            Frame::decode(&bytes[..3]),
            Err(FrameError::Truncated { .. })
        ));
    }

    #[test]
    fn length_field_must_match_payload() {
        let mut bytes = Frame::ChunkAck { offset: 9 }.encode();
        bytes[1] = bytes[1].wrapping_add(1);
        assert!(matches!(
            Frame::decode(&bytes),
            Err(FrameError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn unknown_opcode_is_rejected() {
        let mut bytes = Frame::ChunkAck { offset: 9 }.encode();
        bytes[0] = 0x7F;
        // Recompute the CRC so only the opcode is at fault.
        let body_len = bytes.len() - CRC_LEN;
        let crc = crc16(&bytes[..body_len]);
        bytes[body_len..].copy_from_slice(&crc.to_le_bytes());
        assert!(matches!(
            Frame::decode(&bytes),
            Err(FrameError::UnknownOpcode { opcode: 0x7F })
        ));
    }

    #[test]
    fn chunk_payload_fits_packet_budget() {
        let data = vec![0u8; 55];
        let frame = Frame::Chunk {
            offset: 0,
            data: data.clone(),
        };
        assert_eq!(frame.encode().len(), data.len() + CHUNK_OVERHEAD);
    }

    #[test]
    fn param_batch_count_is_validated() {
        let mut bytes = Frame::ParamBatch {
            updates: vec![(1, 2)],
        }
        .encode();
        // Claim two updates while carrying one.
        bytes[3] = 2;
        let body_len = bytes.len() - CRC_LEN;
        let crc = crc16(&bytes[..body_len]);
        bytes[body_len..].copy_from_slice(&crc.to_le_bytes());
        assert!(matches!(
            Frame::decode(&bytes),
            Err(FrameError::MalformedPayload { .. })
        ));
    }
}
