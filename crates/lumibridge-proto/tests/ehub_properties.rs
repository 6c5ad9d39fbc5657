//! Property-based tests for the eHuB codec.
//!
//! Verifies the codec for ALL inputs proptest can reach, not just the
//! examples in the unit tests: arbitrary messages survive an
//! encode/decode round-trip, and arbitrary bytes never panic the decoder.

use lumibridge_proto::{
    ConfigMessage, ConfigRange, EntityState, Message, UpdateMessage, decode_packet, encode_config,
    encode_update,
};
use proptest::prelude::*;

fn arbitrary_entity() -> impl Strategy<Value = EntityState> {
    (any::<u16>(), any::<u8>(), any::<u8>(), any::<u8>(), any::<u8>())
        .prop_map(|(id, r, g, b, w)| EntityState { id, r, g, b, w })
}

fn arbitrary_range() -> impl Strategy<Value = ConfigRange> {
    (any::<u16>(), any::<u16>(), any::<u16>(), any::<u16>()).prop_map(
        |(sextuor_start, entity_start, sextuor_end, entity_end)| ConfigRange {
            sextuor_start,
            entity_start,
            sextuor_end,
            entity_end,
        },
    )
}

proptest! {
    #[test]
    fn update_round_trips(
        universe in any::<u8>(),
        entities in prop::collection::vec(arbitrary_entity(), 0..512),
    ) {
        let msg = UpdateMessage { universe, entities };
        let wire = encode_update(&msg).expect("encode should succeed");
        prop_assert_eq!(decode_packet(&wire).expect("decode should succeed"), Message::Update(msg));
    }

    #[test]
    fn config_round_trips(
        universe in any::<u8>(),
        ranges in prop::collection::vec(arbitrary_range(), 0..128),
    ) {
        let msg = ConfigMessage { universe, ranges };
        let wire = encode_config(&msg).expect("encode should succeed");
        prop_assert_eq!(decode_packet(&wire).expect("decode should succeed"), Message::Config(msg));
    }

    #[test]
    fn decoder_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..2048)) {
        // Any outcome is fine as long as it is a value, not a panic.
        let _ = decode_packet(&bytes);
    }

    #[test]
    fn truncated_packets_never_decode(
        entities in prop::collection::vec(arbitrary_entity(), 1..64),
    ) {
        let msg = UpdateMessage { universe: 0, entities };
        let wire = encode_update(&msg).expect("encode should succeed");

        // Chopping anything off the end invalidates the declared length.
        prop_assert!(decode_packet(&wire[..wire.len() - 1]).is_err());
    }
}
