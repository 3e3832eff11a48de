//! fOS IPC (Inter-Process Communication)
//!
//! Ordered, reliable message passing between the content process and the
//! parent process.
//! - Typed messages with a routing id
//! - Checksummed frames
//! - FIFO channel endpoints (lossless, per-channel ordering)
//! - Compact binary serialization

mod message;
mod channel;
mod serialize;

pub use message::*;
pub use channel::*;
pub use serialize::*;

/// IPC errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IpcError {
    #[error("Buffer too short")]
    BufferTooShort,

    #[error("Invalid format")]
    InvalidFormat,

    #[error("Unknown message type: {0}")]
    UnknownMessageType(u16),

    #[error("Invalid UTF-8")]
    InvalidUtf8,

    #[error("Checksum mismatch")]
    ChecksumMismatch,

    #[error("Channel {0} disconnected")]
    Disconnected(String),
}
