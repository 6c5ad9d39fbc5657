//! Property-based tests for the frame accumulator.
//!
//! These pin the realtime path's invariants for ALL inputs proptest can
//! reach: the noise gate, the unmapped-entity no-op, recompilation
//! suppression, and the patch source/destination semantics.

use std::net::{IpAddr, Ipv4Addr};

use lumibridge_core::{Accumulator, NOISE_THRESHOLD, PatchMap, PhysicalConfig, RangeSpec};
use lumibridge_proto::{ConfigMessage, ConfigRange, EntityState, UpdateMessage};
use proptest::prelude::*;

const FIRST_ID: u16 = 100;
const LAST_ID: u16 = 169;

fn controller() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5))
}

/// A 70-entity strip on universe 0.
fn physical() -> PhysicalConfig {
    PhysicalConfig::from_ranges(vec![RangeSpec {
        name: "strip".to_string(),
        entity_start: FIRST_ID,
        entity_end: LAST_ID,
        ip: controller(),
        universe: 0,
    }])
}

fn live_config() -> ConfigMessage {
    ConfigMessage {
        universe: 0,
        ranges: vec![ConfigRange {
            sextuor_start: 0,
            entity_start: FIRST_ID,
            sextuor_end: 0,
            entity_end: LAST_ID,
        }],
    }
}

fn primed_accumulator() -> Accumulator {
    let mut acc = Accumulator::new(physical());
    assert!(acc.handle_config(live_config()));
    acc
}

fn arbitrary_entity(id_range: std::ops::RangeInclusive<u16>) -> impl Strategy<Value = EntityState> {
    (id_range, any::<u8>(), any::<u8>(), any::<u8>(), any::<u8>())
        .prop_map(|(id, r, g, b, w)| EntityState { id, r, g, b, w })
}

proptest! {
    /// Every entity dim on all three RGB channels lands as black at its
    /// destination offset.
    #[test]
    fn noise_gated_entities_write_black(
        id in FIRST_ID..=LAST_ID,
        r in 0..NOISE_THRESHOLD,
        g in 0..NOISE_THRESHOLD,
        b in 0..NOISE_THRESHOLD,
    ) {
        let mut acc = primed_accumulator();
        let update = UpdateMessage {
            universe: 0,
            entities: vec![EntityState { id, r, g, b, w: 0 }],
        };

        let out = acc.handle_update(&update);
        prop_assert_eq!(out.frames.len(), 1);

        let offset = usize::from(id - FIRST_ID) * 3;
        prop_assert_eq!(&out.frames[0].data[offset..offset + 3], &[0u8, 0, 0][..]);
    }

    /// Entities without a routing slot leave the DMX state byte-identical.
    #[test]
    fn unmapped_entities_are_pure_noops(
        entities in prop::collection::vec(arbitrary_entity(0..=u16::MAX), 1..64),
    ) {
        let mut acc = primed_accumulator();
        // Establish some baseline state.
        acc.handle_update(&UpdateMessage {
            universe: 0,
            entities: vec![EntityState { id: FIRST_ID, r: 50, g: 60, b: 70, w: 0 }],
        });
        let before = *acc.persistent(0).unwrap();

        let unmapped: Vec<EntityState> = entities
            .into_iter()
            .filter(|e| !(FIRST_ID..=LAST_ID).contains(&e.id))
            .collect();
        prop_assume!(!unmapped.is_empty());

        let out = acc.handle_update(&UpdateMessage { universe: 0, entities: unmapped });

        prop_assert!(out.frames.is_empty());
        prop_assert_eq!(acc.persistent(0).unwrap(), &before);
    }

    /// A Config deep-equal to the last-used one never recompiles.
    #[test]
    fn equal_configs_do_not_recompile(
        ranges in prop::collection::vec(
            (any::<u16>(), any::<u16>(), any::<u16>(), any::<u16>()).prop_map(
                |(ss, es, se, ee)| ConfigRange {
                    sextuor_start: ss,
                    entity_start: es.min(ee),
                    sextuor_end: se,
                    entity_end: es.max(ee),
                },
            ),
            0..8,
        ),
    ) {
        let mut acc = Accumulator::new(physical());
        let config = ConfigMessage { universe: 0, ranges };

        prop_assert!(acc.handle_config(config.clone()));
        prop_assert!(!acc.handle_config(config.clone()));
        prop_assert!(!acc.handle_config(config));
    }

    /// Patching moves the source triplet to every destination in the
    /// outgoing frame, zeroes the source there, and never touches the
    /// persistent buffer.
    #[test]
    fn patch_moves_triplets_in_out_frame_only(
        source_channel in 1u16..=70,
        dest_channels in prop::collection::btree_set(1u16..=70, 1..4),
        r in NOISE_THRESHOLD..=255u8,
        g in 0u8..=255,
        b in 0u8..=255,
    ) {
        prop_assume!(!dest_channels.contains(&source_channel));

        let mut patch = PatchMap::new();
        for &dest in &dest_channels {
            patch.insert(0, source_channel, dest).unwrap();
        }

        let mut acc = primed_accumulator();
        acc.set_patch(patch);

        // The entity whose triplet is DMX channel `source_channel`.
        let id = FIRST_ID + source_channel - 1;
        let out = acc.handle_update(&UpdateMessage {
            universe: 0,
            entities: vec![EntityState { id, r, g, b, w: 0 }],
        });

        let frame = &out.frames[0];
        let src = usize::from(source_channel - 1) * 3;
        prop_assert_eq!(&frame.data[src..src + 3], &[0u8, 0, 0][..]);
        for &dest in &dest_channels {
            let dst = usize::from(dest - 1) * 3;
            prop_assert_eq!(&frame.data[dst..dst + 3], &[r, g, b][..]);
        }

        // Persistent state still holds the unpatched triplet.
        prop_assert_eq!(&acc.persistent(0).unwrap()[src..src + 3], &[r, g, b][..]);
    }

    /// The white channel survives the noise gate untouched.
    #[test]
    fn white_channel_is_never_gated(
        id in FIRST_ID..=LAST_ID,
        w in any::<u8>(),
    ) {
        let mut acc = primed_accumulator();
        let out = acc.handle_update(&UpdateMessage {
            universe: 0,
            entities: vec![EntityState { id, r: 1, g: 1, b: 1, w }],
        });

        prop_assert_eq!(out.snapshots[0].input[0].w, w);
    }
}
