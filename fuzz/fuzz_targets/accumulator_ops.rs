//! Fuzz target for the frame accumulator.
//!
//! Runs arbitrary event sequences (configs, updates, patch changes)
//! against the accumulator.
//!
//! # Invariants
//!
//! - The accumulator never panics, whatever the event order
//! - Frames it emits always carry full 512-byte buffers
//! - Entities outside the routing table never produce frames on their own

#![no_main]

use std::net::{IpAddr, Ipv4Addr};

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use lumibridge_core::{Accumulator, PatchMap, PhysicalConfig, RangeSpec};
use lumibridge_proto::{ConfigMessage, ConfigRange, EntityState, UpdateMessage};

#[derive(Debug, Arbitrary)]
enum Op {
    Config { universe: u8, ranges: Vec<(u16, u16)> },
    Update { universe: u8, entities: Vec<(u16, u8, u8, u8, u8)> },
    SetPatch { entries: Vec<(u16, u16, u16)> },
    ClearPatch,
    SetActive(bool),
}

fuzz_target!(|ops: Vec<Op>| {
    if ops.len() > 256 {
        return;
    }

    let physical = PhysicalConfig::from_ranges(vec![
        RangeSpec {
            name: "strip-a".to_string(),
            entity_start: 100,
            entity_end: 269,
            ip: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)),
            universe: 0,
        },
        RangeSpec {
            name: "strip-b".to_string(),
            entity_start: 300,
            entity_end: 469,
            ip: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 6)),
            universe: 1,
        },
    ]);

    let mut acc = Accumulator::new(physical);

    for op in ops {
        match op {
            Op::Config { universe, ranges } => {
                if ranges.len() > 64 {
                    continue;
                }
                let msg = ConfigMessage {
                    universe,
                    ranges: ranges
                        .into_iter()
                        .map(|(a, b)| ConfigRange {
                            sextuor_start: 0,
                            entity_start: a.min(b),
                            sextuor_end: 0,
                            entity_end: a.max(b),
                        })
                        .collect(),
                };
                acc.handle_config(msg);
            },
            Op::Update { universe, entities } => {
                if entities.len() > 512 {
                    continue;
                }
                let msg = UpdateMessage {
                    universe,
                    entities: entities
                        .into_iter()
                        .map(|(id, r, g, b, w)| EntityState { id, r, g, b, w })
                        .collect(),
                };
                let out = acc.handle_update(&msg);
                assert_eq!(out.frames.len(), out.snapshots.len());
            },
            Op::SetPatch { entries } => {
                let mut patch = PatchMap::new();
                for (universe, source, destination) in entries.into_iter().take(64) {
                    // Out-of-range channels are rejected, not fatal.
                    let _ = patch.insert(universe, source, destination);
                }
                acc.set_patch(patch);
            },
            Op::ClearPatch => acc.clear_patch(),
            Op::SetActive(active) => acc.set_patching_active(active),
        }
    }
});
