//! Error types for wire-format parsing.
//!
//! Every variant maps to one "count and drop" bucket in the data plane:
//! the pipeline logs the error, bumps a counter, and keeps running. None
//! of these abort anything.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while decoding eHuB or Art-Net packets.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Datagram shorter than the fixed header it must carry.
    #[error("datagram too short: {len} bytes, need at least {need}")]
    TooShort {
        /// Actual datagram length.
        len: usize,
        /// Minimum length required.
        need: usize,
    },

    /// The 4-byte eHuB signature did not match.
    #[error("bad eHuB signature: {found:02x?}")]
    BadMagic {
        /// The four bytes found where `"eHuB"` was expected.
        found: [u8; 4],
    },

    /// The header's declared payload length overruns the datagram.
    #[error("declared payload length {declared} exceeds remaining {available} bytes")]
    LengthMismatch {
        /// Compressed payload length claimed by the header.
        declared: usize,
        /// Bytes actually present after the header.
        available: usize,
    },

    /// Gzip inflation of the payload failed.
    #[error("gzip inflate failed: {0}")]
    Gzip(#[source] std::io::Error),

    /// The header carried a message type this bridge does not know.
    #[error("unknown eHuB message type {0}")]
    UnknownType(u8),

    /// The 8-byte Art-Net signature did not match.
    #[error("bad Art-Net signature")]
    BadArtNetSignature,

    /// An Art-Net packet with an OpCode other than ArtDmx (0x5000).
    #[error("unexpected Art-Net opcode {0:#06x}")]
    UnexpectedOpcode(u16),
}
