//! Device session protocol: framed, acknowledgement-based communication
//! with the DSP board over an unreliable packet transport.
//!
//! The session is a state machine (`Disconnected → Enumerating → Handshaking
//! → Idle ⇄ Transferring`) driving three exchanges:
//!
//! - **Handshake**: capability/version query with a bounded-time reply.
//! - **Deploy**: a compiled binary split into transport-sized chunks, each
//!   positively acknowledged; a missing ACK is retried a bounded number of
//!   times, never inferred from the absence of a NAK. A failed or cancelled
//!   transfer never leaves partial firmware active on the device.
//! - **Parameter updates**: dirty parameters coalesced into one outbound
//!   batch per flush, addressed by stable runtime index; device-originated
//!   notifications surface as events without marking anything dirty.
//!
//! Frames are length-prefixed and CRC-16 checked. Any malformed or
//! out-of-sequence frame forces an immediate transition to Disconnected: the
//! two sides have lost synchronization and cannot be trusted to resync
//! mid-stream.
//!
//! The session owns one transport and is single-threaded; outbound sends are
//! serialized with at most one request awaiting acknowledgement at a time.
//! Observers receive typed [`SessionEvent`]s on a crossbeam channel.

pub mod error;
pub mod frame;
pub mod loopback;
mod session;
pub mod transport;

pub use error::{ProtocolError, TransportError};
pub use frame::{Frame, FrameError};
pub use loopback::LoopbackTransport;
pub use session::{DeployOutcome, Session, SessionEvent, SessionState};
pub use transport::{
    ACK_TIMEOUT, HANDSHAKE_TIMEOUT, MAX_CHUNK_RETRIES, PRODUCT_ID, PROTOCOL_VERSION, Transport,
    VENDOR_ID,
};
