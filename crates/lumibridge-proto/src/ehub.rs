//! eHuB packet framing and payload codec.
//!
//! An eHuB datagram is a fixed 10-byte header followed by a gzip-compressed
//! payload:
//!
//! ```text
//! offset  size  field
//! 0       4     magic "eHuB"
//! 4       1     message_type  (1 = Config, 2 = Update)
//! 5       1     ehub_universe
//! 6       2     reserved
//! 8       2     compressed_payload_length (little endian)
//! 10      N     gzip(payload)
//! ```
//!
//! The payload is a run of fixed-size little-endian records: 8 bytes per
//! [`ConfigRange`], 6 bytes per [`EntityState`]. Trailing bytes smaller
//! than one record are padding and are ignored.
//!
//! Decoding holds no state between packets; a fresh gzip decoder is built
//! per datagram. The decoder accepts datagrams longer than
//! `10 + compressed_payload_length` (upstream senders pad), but rejects
//! headers whose declared length overruns the datagram.

use std::io::{Read, Write};

use flate2::{Compression, read::GzDecoder, write::GzEncoder};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::errors::{ProtocolError, Result};

/// The 4-byte signature opening every eHuB datagram.
pub const EHUB_MAGIC: [u8; 4] = *b"eHuB";

/// Fixed 10-byte eHuB packet header.
///
/// Fields are raw byte arrays so the struct is alignment-free and can be
/// cast directly from an arbitrary offset of a receive buffer; typed
/// accessors decode the little-endian length field.
#[repr(C)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct PacketHeader {
    magic: [u8; 4],
    message_type: u8,
    universe: u8,
    reserved: [u8; 2],
    compressed_len: [u8; 2],
}

impl PacketHeader {
    /// Size of the serialized header (10 bytes).
    pub const SIZE: usize = 10;

    /// `message_type` value for a Config (topology) message.
    pub const TYPE_CONFIG: u8 = 1;

    /// `message_type` value for an Update (color) message.
    pub const TYPE_UPDATE: u8 = 2;

    /// Build a header for an outgoing packet.
    #[must_use]
    pub fn new(message_type: u8, universe: u8, compressed_len: u16) -> Self {
        Self {
            magic: EHUB_MAGIC,
            message_type,
            universe,
            reserved: [0; 2],
            compressed_len: compressed_len.to_le_bytes(),
        }
    }

    /// Cast the leading 10 bytes of `datagram` as a header.
    ///
    /// Only the length is checked here; signature validation happens in
    /// [`decode_packet`] so the error can report the offending bytes.
    pub fn parse(datagram: &[u8]) -> Result<(&Self, &[u8])> {
        Self::ref_from_prefix(datagram).map_err(|_| ProtocolError::TooShort {
            len: datagram.len(),
            need: Self::SIZE,
        })
    }

    /// The eHuB message type byte.
    #[must_use]
    pub fn message_type(&self) -> u8 {
        self.message_type
    }

    /// The eHuB universe tag carried in the header.
    #[must_use]
    pub fn universe(&self) -> u8 {
        self.universe
    }

    /// Declared length of the gzip-compressed payload.
    #[must_use]
    pub fn compressed_len(&self) -> u16 {
        u16::from_le_bytes(self.compressed_len)
    }

    fn magic_ok(&self) -> bool {
        self.magic == EHUB_MAGIC
    }
}

impl std::fmt::Debug for PacketHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketHeader")
            .field("message_type", &self.message_type)
            .field("universe", &self.universe)
            .field("compressed_len", &self.compressed_len())
            .finish()
    }
}

/// One contiguous block of live entity IDs declared by a Config message.
///
/// Encoded as an 8-byte little-endian record. The sextuor fields describe
/// the upstream renderer's fixture grouping and are carried through
/// untouched; routing only looks at the entity bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigRange {
    /// First sextuor index of the block.
    pub sextuor_start: u16,
    /// First live entity ID of the block.
    pub entity_start: u16,
    /// Last sextuor index of the block.
    pub sextuor_end: u16,
    /// Last live entity ID of the block (inclusive).
    pub entity_end: u16,
}

/// A decoded eHuB Config message: the set of entity IDs currently live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigMessage {
    /// eHuB universe tag from the packet header.
    pub universe: u8,
    /// Declared entity ranges, in wire order.
    pub ranges: Vec<ConfigRange>,
}

impl ConfigMessage {
    /// Largest `entity_end` declared by any range, or `None` when empty.
    #[must_use]
    pub fn max_entity_end(&self) -> Option<u16> {
        self.ranges.iter().map(|r| r.entity_end).max()
    }
}

/// Color state for a single entity, as carried by an Update message.
///
/// Encoded as a 6-byte little-endian record: `id:u16, r, g, b, w`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityState {
    /// Logical entity ID.
    pub id: u16,
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// White channel. Routed installations here are RGB-only; the value is
    /// carried but never written to DMX.
    pub w: u8,
}

/// A decoded eHuB Update message: new colors for a set of entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateMessage {
    /// eHuB universe tag from the packet header.
    pub universe: u8,
    /// Entity states in wire order. Repeats are legal; later wins.
    pub entities: Vec<EntityState>,
}

/// Either kind of eHuB message, as produced by [`decode_packet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Topology declaration.
    Config(ConfigMessage),
    /// Color update.
    Update(UpdateMessage),
}

/// Decode one eHuB datagram into a typed message.
///
/// Validates the length, the signature, and the declared payload length,
/// inflates the gzip payload, and parses the record run for the declared
/// message type.
///
/// # Errors
///
/// - [`ProtocolError::TooShort`] for datagrams under 10 bytes
/// - [`ProtocolError::BadMagic`] when the signature is not `"eHuB"`
/// - [`ProtocolError::LengthMismatch`] when `compressed_payload_length`
///   overruns the datagram
/// - [`ProtocolError::Gzip`] when the payload does not inflate
/// - [`ProtocolError::UnknownType`] for message types other than 1 or 2
pub fn decode_packet(datagram: &[u8]) -> Result<Message> {
    let (header, rest) = PacketHeader::parse(datagram)?;

    if !header.magic_ok() {
        let mut found = [0u8; 4];
        found.copy_from_slice(&datagram[..4]);
        return Err(ProtocolError::BadMagic { found });
    }

    let declared = header.compressed_len() as usize;
    if declared > rest.len() {
        return Err(ProtocolError::LengthMismatch { declared, available: rest.len() });
    }

    let payload = inflate(&rest[..declared])?;

    match header.message_type() {
        PacketHeader::TYPE_CONFIG => {
            Ok(Message::Config(parse_config(header.universe(), &payload)))
        },
        PacketHeader::TYPE_UPDATE => {
            Ok(Message::Update(parse_update(header.universe(), &payload)))
        },
        other => Err(ProtocolError::UnknownType(other)),
    }
}

fn inflate(compressed: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(compressed);
    let mut payload = Vec::new();
    decoder.read_to_end(&mut payload).map_err(ProtocolError::Gzip)?;
    Ok(payload)
}

fn parse_config(universe: u8, payload: &[u8]) -> ConfigMessage {
    let ranges = payload
        .chunks_exact(8)
        .map(|rec| ConfigRange {
            sextuor_start: u16::from_le_bytes([rec[0], rec[1]]),
            entity_start: u16::from_le_bytes([rec[2], rec[3]]),
            sextuor_end: u16::from_le_bytes([rec[4], rec[5]]),
            entity_end: u16::from_le_bytes([rec[6], rec[7]]),
        })
        .collect();

    ConfigMessage { universe, ranges }
}

fn parse_update(universe: u8, payload: &[u8]) -> UpdateMessage {
    let entities = payload
        .chunks_exact(6)
        .map(|rec| EntityState {
            id: u16::from_le_bytes([rec[0], rec[1]]),
            r: rec[2],
            g: rec[3],
            b: rec[4],
            w: rec[5],
        })
        .collect();

    UpdateMessage { universe, entities }
}

/// Encode a Config message as a complete eHuB datagram.
///
/// # Errors
///
/// [`ProtocolError::LengthMismatch`] when the compressed payload does not
/// fit the header's 16-bit length field.
pub fn encode_config(msg: &ConfigMessage) -> Result<Vec<u8>> {
    let mut payload = Vec::with_capacity(msg.ranges.len() * 8);
    for range in &msg.ranges {
        payload.extend_from_slice(&range.sextuor_start.to_le_bytes());
        payload.extend_from_slice(&range.entity_start.to_le_bytes());
        payload.extend_from_slice(&range.sextuor_end.to_le_bytes());
        payload.extend_from_slice(&range.entity_end.to_le_bytes());
    }
    frame(PacketHeader::TYPE_CONFIG, msg.universe, &payload)
}

/// Encode an Update message as a complete eHuB datagram.
///
/// # Errors
///
/// [`ProtocolError::LengthMismatch`] when the compressed payload does not
/// fit the header's 16-bit length field.
pub fn encode_update(msg: &UpdateMessage) -> Result<Vec<u8>> {
    let mut payload = Vec::with_capacity(msg.entities.len() * 6);
    for entity in &msg.entities {
        payload.extend_from_slice(&entity.id.to_le_bytes());
        payload.extend_from_slice(&[entity.r, entity.g, entity.b, entity.w]);
    }
    frame(PacketHeader::TYPE_UPDATE, msg.universe, &payload)
}

fn frame(message_type: u8, universe: u8, payload: &[u8]) -> Result<Vec<u8>> {
    let compressed = deflate(payload)?;

    let declared = u16::try_from(compressed.len()).map_err(|_| ProtocolError::LengthMismatch {
        declared: compressed.len(),
        available: u16::MAX as usize,
    })?;

    let header = PacketHeader::new(message_type, universe, declared);
    let mut datagram = Vec::with_capacity(PacketHeader::SIZE + compressed.len());
    datagram.extend_from_slice(header.as_bytes());
    datagram.extend_from_slice(&compressed);
    Ok(datagram)
}

fn deflate(payload: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(payload).map_err(ProtocolError::Gzip)?;
    encoder.finish().map_err(ProtocolError::Gzip)
}
