//! Session and transport error types.
//!
//! Protocol errors are immediate and transition-driving: the session cannot
//! continue in an ambiguous state, so each error names the state it occurred
//! in — that is the first thing needed to tell a device fault from a
//! transport fault from a bad binary.

use thiserror::Error;

use crate::session::SessionState;

/// Failures reported by a [`Transport`](crate::Transport) implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The operation did not complete in time.
    #[error("transport timed out")]
    Timeout,
    /// The link is gone; the device was detached or the handle closed.
    #[error("transport closed")]
    Closed,
    /// An underlying I/O failure.
    #[error("transport i/o failure")]
    Io(#[from] std::io::Error),
}

/// Terminal protocol failures.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Enumeration found no matching device.
    #[error("no device found (vendor {vendor_id:#06x}, product {product_id:#06x})")]
    NoDevice {
        /// Vendor id searched for.
        vendor_id: u16,
        /// Product id searched for.
        product_id: u16,
    },

    /// The requested operation is not legal in the current state.
    #[error("{operation} rejected in state {state}")]
    InvalidState {
        /// What was attempted.
        operation: &'static str,
        /// State the session was in.
        state: SessionState,
    },

    /// No capability reply arrived within the handshake window.
    #[error("handshake timed out in state {state}")]
    HandshakeTimeout {
        /// State the session was in.
        state: SessionState,
    },

    /// The device speaks a different protocol revision.
    #[error("protocol version mismatch in state {state}: device speaks v{device}, expected v{expected}")]
    ProtocolVersionMismatch {
        /// State the session was in.
        state: SessionState,
        /// Version the device reported.
        device: u16,
        /// Version this build speaks.
        expected: u16,
    },

    /// A chunk went unacknowledged through every retry.
    #[error(
        "transfer timed out in state {state}: chunk at offset {offset} unacknowledged after {retries} retries"
    )]
    TransferTimeout {
        /// State the session was in.
        state: SessionState,
        /// Byte offset of the chunk that was never acknowledged.
        offset: u32,
        /// Retries attempted before giving up.
        retries: u32,
    },

    /// The final acknowledgement does not match the byte count sent.
    ///
    /// The whole transfer must be restarted; there is no partial resume.
    #[error("transfer size mismatch in state {state}: device committed {committed} of {sent} bytes")]
    TransferSizeMismatch {
        /// State the session was in.
        state: SessionState,
        /// Bytes this side sent.
        sent: u32,
        /// Bytes the device claims to have committed.
        committed: u32,
    },

    /// A malformed or out-of-sequence frame arrived. Never retried.
    #[error("framing error in state {state}: {reason}")]
    Framing {
        /// State the session was in.
        state: SessionState,
        /// What was wrong with the frame.
        reason: String,
    },

    /// The transport itself failed mid-exchange.
    #[error("transport failure in state {state}")]
    Transport {
        /// State the session was in.
        state: SessionState,
        /// The underlying failure.
        #[source]
        source: TransportError,
    },
}
