//! Fuzz target for the eHuB encode/decode round trip.
//!
//! Builds arbitrary Config and Update messages, frames them as wire
//! datagrams, and decodes them back.
//!
//! # Invariants
//!
//! - Encoding a valid message always succeeds (payloads stay far below
//!   the 16-bit compressed length limit at these sizes)
//! - Decode(encode(msg)) is identity
//! - Neither direction panics

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use lumibridge_proto::{
    ConfigMessage, ConfigRange, EntityState, Message, UpdateMessage, decode_packet, encode_config,
    encode_update,
};

#[derive(Debug, Arbitrary)]
struct FuzzRange {
    sextuor_start: u16,
    entity_start: u16,
    sextuor_end: u16,
    entity_end: u16,
}

#[derive(Debug, Arbitrary)]
struct FuzzEntity {
    id: u16,
    r: u8,
    g: u8,
    b: u8,
    w: u8,
}

#[derive(Debug, Arbitrary)]
enum FuzzMessage {
    Config { universe: u8, ranges: Vec<FuzzRange> },
    Update { universe: u8, entities: Vec<FuzzEntity> },
}

fuzz_target!(|input: FuzzMessage| {
    match input {
        FuzzMessage::Config { universe, ranges } => {
            if ranges.len() > 4096 {
                return;
            }
            let msg = ConfigMessage {
                universe,
                ranges: ranges
                    .into_iter()
                    .map(|r| ConfigRange {
                        sextuor_start: r.sextuor_start,
                        entity_start: r.entity_start,
                        sextuor_end: r.sextuor_end,
                        entity_end: r.entity_end,
                    })
                    .collect(),
            };

            let wire = encode_config(&msg).expect("config encodes");
            assert_eq!(decode_packet(&wire).expect("config decodes"), Message::Config(msg));
        },
        FuzzMessage::Update { universe, entities } => {
            if entities.len() > 4096 {
                return;
            }
            let msg = UpdateMessage {
                universe,
                entities: entities
                    .into_iter()
                    .map(|e| EntityState { id: e.id, r: e.r, g: e.g, b: e.b, w: e.w })
                    .collect(),
            };

            let wire = encode_update(&msg).expect("update encodes");
            assert_eq!(decode_packet(&wire).expect("update decodes"), Message::Update(msg));
        },
    }
});
