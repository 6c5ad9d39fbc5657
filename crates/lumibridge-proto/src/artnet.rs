//! Art-Net ArtDmx packet building and parsing.
//!
//! Only the ArtDmx packet type (OpCode `0x5000`) is implemented; the
//! bridge emits full 512-channel frames and nothing else. The 18-byte
//! header layout:
//!
//! ```text
//! 0..8    "Art-Net\0"
//! 8..10   OpCode   = 0x5000 (little endian)
//! 10..12  ProtVer  = 14     (big endian)
//! 12      Sequence = 0
//! 13      Physical = 0
//! 14..16  Universe (little endian, lower 15 bits)
//! 16..18  Length   = 512    (big endian)
//! ```
//!
//! Headers are immutable per universe, so the emitter precomputes one with
//! [`build_header`] and splices frames in with [`build_packet`].
//! [`ArtDmx::parse`] is the inverse, used to verify emitted traffic.

use crate::errors::{ProtocolError, Result};

/// DMX channels per universe; every ArtDmx frame here carries all of them.
pub const DMX_CHANNELS: usize = 512;

/// Size of the ArtDmx header.
pub const HEADER_LEN: usize = 18;

/// Total size of an emitted ArtDmx packet.
pub const PACKET_LEN: usize = HEADER_LEN + DMX_CHANNELS;

/// UDP port lighting controllers listen on.
pub const ARTNET_PORT: u16 = 6454;

const SIGNATURE: [u8; 8] = *b"Art-Net\0";
const OP_DMX: u16 = 0x5000;
const PROTOCOL_VERSION: u16 = 14;

/// Build the constant 18-byte ArtDmx header for one universe.
#[must_use]
pub fn build_header(universe: u16) -> [u8; HEADER_LEN] {
    let mut header = [0u8; HEADER_LEN];
    header[0..8].copy_from_slice(&SIGNATURE);
    header[8..10].copy_from_slice(&OP_DMX.to_le_bytes());
    header[10..12].copy_from_slice(&PROTOCOL_VERSION.to_be_bytes());
    // Sequence and Physical stay zero.
    header[14..16].copy_from_slice(&(universe & 0x7fff).to_le_bytes());
    header[16..18].copy_from_slice(&(DMX_CHANNELS as u16).to_be_bytes());
    header
}

/// Splice a precomputed header and a DMX frame into a wire packet.
#[must_use]
pub fn build_packet(header: &[u8; HEADER_LEN], data: &[u8; DMX_CHANNELS]) -> [u8; PACKET_LEN] {
    let mut packet = [0u8; PACKET_LEN];
    packet[..HEADER_LEN].copy_from_slice(header);
    packet[HEADER_LEN..].copy_from_slice(data);
    packet
}

/// A parsed ArtDmx packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtDmx {
    /// Universe number (lower 15 bits of the wire field).
    pub universe: u16,
    /// Sequence byte; this bridge always sends 0.
    pub sequence: u8,
    /// DMX payload, zero-padded to 512 channels if the packet carried less.
    pub data: [u8; DMX_CHANNELS],
    /// Channel count declared by the packet.
    pub length: u16,
}

impl ArtDmx {
    /// Parse an ArtDmx packet.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::TooShort`] for packets without a full header plus
    ///   at least one data byte
    /// - [`ProtocolError::BadArtNetSignature`] for a wrong signature
    /// - [`ProtocolError::UnexpectedOpcode`] for non-ArtDmx packets
    pub fn parse(packet: &[u8]) -> Result<Self> {
        if packet.len() < HEADER_LEN + 1 {
            return Err(ProtocolError::TooShort { len: packet.len(), need: HEADER_LEN + 1 });
        }

        if packet[0..8] != SIGNATURE {
            return Err(ProtocolError::BadArtNetSignature);
        }

        let opcode = u16::from_le_bytes([packet[8], packet[9]]);
        if opcode != OP_DMX {
            return Err(ProtocolError::UnexpectedOpcode(opcode));
        }

        let sequence = packet[12];
        let universe = u16::from_le_bytes([packet[14], packet[15]]) & 0x7fff;
        let length = u16::from_be_bytes([packet[16], packet[17]]);

        let available = packet.len() - HEADER_LEN;
        let carried = (length as usize).min(available).min(DMX_CHANNELS);

        let mut data = [0u8; DMX_CHANNELS];
        data[..carried].copy_from_slice(&packet[HEADER_LEN..HEADER_LEN + carried]);

        Ok(Self { universe, sequence, data, length })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout_matches_wire_table() {
        let header = build_header(0x1234);

        assert_eq!(&header[0..8], b"Art-Net\0");
        assert_eq!(header[8..10], [0x00, 0x50]);
        assert_eq!(header[10..12], [0x00, 14]);
        assert_eq!(header[12], 0);
        assert_eq!(header[13], 0);
        // 0x1234 & 0x7fff, little endian.
        assert_eq!(header[14..16], [0x34, 0x12]);
        assert_eq!(header[16..18], [0x02, 0x00]);
    }

    #[test]
    fn universe_keeps_lower_fifteen_bits() {
        let header = build_header(0xffff);
        assert_eq!(u16::from_le_bytes([header[14], header[15]]), 0x7fff);
    }

    #[test]
    fn packet_round_trip() {
        let mut data = [0u8; DMX_CHANNELS];
        data[0] = 200;
        data[1] = 100;
        data[2] = 50;

        let header = build_header(7);
        let packet = build_packet(&header, &data);
        assert_eq!(packet.len(), PACKET_LEN);

        let parsed = ArtDmx::parse(&packet).unwrap();
        assert_eq!(parsed.universe, 7);
        assert_eq!(parsed.sequence, 0);
        assert_eq!(parsed.length, 512);
        assert_eq!(parsed.data, data);
    }

    #[test]
    fn rejects_foreign_packets() {
        assert!(matches!(
            ArtDmx::parse(&[0u8; 30]).unwrap_err(),
            ProtocolError::BadArtNetSignature
        ));

        let mut poll = [0u8; 30];
        poll[0..8].copy_from_slice(b"Art-Net\0");
        poll[8..10].copy_from_slice(&0x2000u16.to_le_bytes());
        assert!(matches!(
            ArtDmx::parse(&poll).unwrap_err(),
            ProtocolError::UnexpectedOpcode(0x2000)
        ));

        assert!(matches!(
            ArtDmx::parse(b"Art-Net\0").unwrap_err(),
            ProtocolError::TooShort { .. }
        ));
    }
}
