//! Transport abstraction over the physical link.
//!
//! The bit-level signaling is supplied externally; the session only assumes
//! a fallible, time-boundable byte-packet primitive. Every operation may
//! fail or time out, and the session treats both accordingly.

use core::time::Duration;

use crate::error::TransportError;

/// Vendor id the session enumerates for.
pub const VENDOR_ID: u16 = 0x16c0;
/// Product id the session enumerates for.
pub const PRODUCT_ID: u16 = 0x0489;

/// Protocol version this build speaks.
pub const PROTOCOL_VERSION: u16 = 1;

/// Longest the session waits for a capability reply.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_millis(500);
/// Longest the session waits for a single chunk acknowledgement.
pub const ACK_TIMEOUT: Duration = Duration::from_millis(250);
/// Retries of one chunk before the transfer fails with `TransferTimeout`.
pub const MAX_CHUNK_RETRIES: u32 = 3;

/// A byte-packet link to a candidate device.
///
/// Object-safe so sessions can be generic over real hardware links and the
/// in-memory [`LoopbackTransport`](crate::LoopbackTransport).
pub trait Transport: Send {
    /// Look for a device matching the given vendor/product pair.
    fn enumerate(&mut self, vendor_id: u16, product_id: u16) -> Result<bool, TransportError>;

    /// Open the previously enumerated device.
    fn open(&mut self) -> Result<(), TransportError>;

    /// Close the link. Idempotent.
    fn close(&mut self);

    /// Send one packet.
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Receive one packet, waiting at most `timeout`.
    ///
    /// `Ok(None)` means nothing arrived in time; hard failures are `Err`.
    fn receive(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, TransportError>;

    /// Largest packet the link carries, in bytes. Chunk payloads are sized
    /// to fit one framed chunk per packet.
    fn max_packet_size(&self) -> usize;
}
