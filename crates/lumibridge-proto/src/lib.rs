//! Wire formats for the lumibridge realtime pipeline.
//!
//! Two protocols meet in this crate:
//!
//! - **eHuB** (ingress): the upstream renderer's UDP protocol. A fixed
//!   10-byte header followed by a gzip-compressed payload of either
//!   topology ranges (Config) or per-entity colors (Update). See [`ehub`].
//! - **Art-Net ArtDmx** (egress): the standard UDP encapsulation of a
//!   512-channel DMX frame, sent to lighting controllers on port 6454.
//!   See [`artnet`].
//!
//! Everything here is pure: bytes in, typed records out (and back). No
//! sockets, no clocks. The decoders never panic on malformed input; every
//! failure is a structured [`ProtocolError`].

#![forbid(unsafe_code)]

pub mod artnet;
pub mod ehub;
mod errors;

pub use ehub::{
    ConfigMessage, ConfigRange, EntityState, Message, PacketHeader, UpdateMessage, decode_packet,
    encode_config, encode_update,
};
pub use errors::{ProtocolError, Result};
