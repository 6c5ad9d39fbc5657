//! Stateful DMX frame accumulation.
//!
//! The accumulator owns one persistent 512-byte buffer per universe.
//! Updates mutate triplets in place, so an entity omitted from a later
//! update keeps its last color — upstream renderers send deltas, not full
//! frames. For every update it also decides when the routing table needs
//! recompiling, gates sensor noise to black, and produces the outgoing
//! per-universe frame copies (with the optional channel patch applied to
//! the copy only).
//!
//! This is a pure state machine: events in (`handle_config`,
//! `handle_update`), values out ([`UpdateOutput`]). The runtime wraps it
//! in a single task, which serializes all mutations.

use std::{collections::BTreeMap, net::IpAddr};

use tracing::warn;

use lumibridge_proto::{ConfigMessage, EntityState, UpdateMessage, artnet::DMX_CHANNELS};

use crate::{config::PhysicalConfig, patch::PatchMap, router::RoutingTable};

/// RGB values below this on all three channels are clamped to black.
///
/// Upstream capture rigs leak low-level noise on idle entities; without
/// the gate that noise keeps every universe permanently "dirty" and
/// defeats the emitter's diffing. The white channel is deliberately left
/// ungated: it never reaches DMX on RGB installations, and gating it would
/// change what observers see.
pub const NOISE_THRESHOLD: u8 = 15;

/// One outgoing DMX frame, by value.
///
/// The emitter receives its own copy; nothing it does is observable back
/// in the accumulator's persistent state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameOut {
    /// Destination controller.
    pub ip: IpAddr,
    /// Art-Net universe.
    pub universe: u16,
    /// Full 512-channel frame.
    pub data: [u8; DMX_CHANNELS],
}

/// Snapshot published to observers for one touched universe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSnapshot {
    /// The universe this snapshot describes.
    pub universe: u16,
    /// The update entities that routed into this universe, post noise
    /// gate, in update order.
    pub input: Vec<EntityState>,
    /// The outgoing frame, patch included.
    pub output: [u8; DMX_CHANNELS],
}

/// Everything one update produced.
#[derive(Debug, Default)]
pub struct UpdateOutput {
    /// Frames for the emitter, one per touched universe.
    pub frames: Vec<FrameOut>,
    /// Snapshots for the monitor tap, parallel to `frames`.
    pub snapshots: Vec<MonitorSnapshot>,
}

/// Data-plane skip counters. These are expected to tick in steady state
/// (unmapped entities especially); they exist for operator diagnostics,
/// not for flow control.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccumulatorStats {
    /// Entities with no routing slot (or past the table end).
    pub unmapped: u64,
    /// Entities whose triplet would overrun the universe.
    pub offset_out_of_range: u64,
    /// Touched universes with no controller address.
    pub missing_universe_ip: u64,
}

/// The stateful frame accumulator.
pub struct Accumulator {
    physical: PhysicalConfig,
    routing: Option<RoutingTable>,
    last_config: Option<ConfigMessage>,
    persistent: BTreeMap<u16, [u8; DMX_CHANNELS]>,
    patch: Option<PatchMap>,
    patching_active: bool,
    stats: AccumulatorStats,
}

impl Accumulator {
    /// Create an accumulator for one pipeline incarnation.
    ///
    /// The physical configuration is fixed for the accumulator's lifetime;
    /// structural changes restart the pipeline with a fresh one.
    #[must_use]
    pub fn new(physical: PhysicalConfig) -> Self {
        Self {
            physical,
            routing: None,
            last_config: None,
            persistent: BTreeMap::new(),
            patch: None,
            patching_active: false,
            stats: AccumulatorStats::default(),
        }
    }

    /// Process an eHuB Config message.
    ///
    /// Returns true when the routing table was recompiled. Configs arrive
    /// continuously and are usually identical to the last one; only a
    /// structural change (deep inequality) triggers recompilation.
    pub fn handle_config(&mut self, config: ConfigMessage) -> bool {
        if self.last_config.as_ref() == Some(&config) {
            return false;
        }

        self.routing = Some(RoutingTable::compile(&config, &self.physical));
        self.last_config = Some(config);
        true
    }

    /// Process an eHuB Update message.
    ///
    /// Applies the noise gate, routes each entity into its universe's
    /// persistent buffer, and returns one outgoing frame (plus monitor
    /// snapshot) per touched universe. Without a compiled routing table
    /// (no Config seen yet) the update is dropped whole.
    pub fn handle_update(&mut self, update: &UpdateMessage) -> UpdateOutput {
        let Some(routing) = &self.routing else {
            return UpdateOutput::default();
        };

        let mut touched: BTreeMap<u16, Vec<EntityState>> = BTreeMap::new();

        for entity in &update.entities {
            let gated = noise_gate(*entity);

            let Some(route) = routing.lookup(gated.id) else {
                self.stats.unmapped += 1;
                continue;
            };

            if route.dmx_offset + 3 > DMX_CHANNELS {
                self.stats.offset_out_of_range += 1;
                continue;
            }

            let buffer = self.persistent.entry(route.universe).or_insert([0u8; DMX_CHANNELS]);
            buffer[route.dmx_offset] = gated.r;
            buffer[route.dmx_offset + 1] = gated.g;
            buffer[route.dmx_offset + 2] = gated.b;

            touched.entry(route.universe).or_default().push(gated);
        }

        let mut output = UpdateOutput::default();

        for (universe, input) in touched {
            let Some(&ip) = self.physical.universe_ip().get(&universe) else {
                self.stats.missing_universe_ip += 1;
                warn!(universe, "no controller address for touched universe");
                continue;
            };

            // The persistent buffer exists for every touched universe.
            let mut out = self.persistent.get(&universe).copied().unwrap_or([0u8; DMX_CHANNELS]);

            if let (true, Some(patch)) = (self.patching_active, &self.patch) {
                patch.apply(universe, &mut out);
            }

            output.frames.push(FrameOut { ip, universe, data: out });
            output.snapshots.push(MonitorSnapshot { universe, input, output: out });
        }

        output
    }

    /// Install a patch map and activate patching.
    pub fn set_patch(&mut self, patch: PatchMap) {
        self.patch = Some(patch);
        self.patching_active = true;
    }

    /// Drop the patch map and deactivate patching.
    pub fn clear_patch(&mut self) {
        self.patch = None;
        self.patching_active = false;
    }

    /// Toggle patching without touching the loaded map.
    pub fn set_patching_active(&mut self, active: bool) {
        self.patching_active = active;
    }

    /// True when a patch map is loaded and active.
    #[must_use]
    pub fn patching_active(&self) -> bool {
        self.patching_active && self.patch.is_some()
    }

    /// Current skip counters.
    #[must_use]
    pub fn stats(&self) -> AccumulatorStats {
        self.stats
    }

    /// Read access to one universe's persistent buffer, if it was ever
    /// touched. Test and inspection use only.
    #[must_use]
    pub fn persistent(&self, universe: u16) -> Option<&[u8; DMX_CHANNELS]> {
        self.persistent.get(&universe)
    }
}

fn noise_gate(mut entity: EntityState) -> EntityState {
    if entity.r < NOISE_THRESHOLD && entity.g < NOISE_THRESHOLD && entity.b < NOISE_THRESHOLD {
        entity.r = 0;
        entity.g = 0;
        entity.b = 0;
    }
    entity
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use lumibridge_proto::ConfigRange;

    use super::*;
    use crate::config::RangeSpec;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    fn config(ranges: &[(u16, u16)]) -> ConfigMessage {
        ConfigMessage {
            universe: 0,
            ranges: ranges
                .iter()
                .map(|&(start, end)| ConfigRange {
                    sextuor_start: 0,
                    entity_start: start,
                    sextuor_end: 0,
                    entity_end: end,
                })
                .collect(),
        }
    }

    fn update(entities: &[(u16, u8, u8, u8)]) -> UpdateMessage {
        UpdateMessage {
            universe: 0,
            entities: entities
                .iter()
                .map(|&(id, r, g, b)| EntityState { id, r, g, b, w: 0 })
                .collect(),
        }
    }

    /// One strip of ten entities (101..=110) on universe 0 at 10.0.0.5.
    fn accumulator() -> Accumulator {
        let physical = PhysicalConfig::from_ranges(vec![RangeSpec {
            name: "strip".to_string(),
            entity_start: 101,
            entity_end: 110,
            ip: ip(5),
            universe: 0,
        }]);
        let mut acc = Accumulator::new(physical);
        assert!(acc.handle_config(config(&[(101, 110)])));
        acc
    }

    #[test]
    fn identical_config_does_not_recompile() {
        let mut acc = accumulator();
        assert!(!acc.handle_config(config(&[(101, 110)])));
        assert!(acc.handle_config(config(&[(101, 111)])));
    }

    #[test]
    fn update_routes_rgb_to_offsets() {
        let mut acc = accumulator();
        let out = acc.handle_update(&update(&[(101, 200, 100, 50)]));

        assert_eq!(out.frames.len(), 1);
        let frame = &out.frames[0];
        assert_eq!(frame.ip, ip(5));
        assert_eq!(frame.universe, 0);
        assert_eq!(&frame.data[0..3], &[200, 100, 50]);
        assert!(frame.data[3..].iter().all(|&b| b == 0));
    }

    #[test]
    fn omitted_entities_keep_their_last_value() {
        let mut acc = accumulator();
        acc.handle_update(&update(&[(101, 200, 100, 50)]));
        let out = acc.handle_update(&update(&[(102, 30, 40, 50)]));

        let frame = &out.frames[0];
        assert_eq!(&frame.data[0..3], &[200, 100, 50]);
        assert_eq!(&frame.data[3..6], &[30, 40, 50]);
    }

    #[test]
    fn repeats_within_one_update_overwrite() {
        let mut acc = accumulator();
        let out = acc.handle_update(&update(&[(101, 10, 0, 0), (101, 99, 0, 0)]));
        assert_eq!(out.frames[0].data[0], 99);
    }

    #[test]
    fn noise_gate_clamps_dim_rgb_to_black() {
        let mut acc = accumulator();
        let out = acc.handle_update(&update(&[(101, 10, 14, 1)]));
        assert_eq!(&out.frames[0].data[0..3], &[0, 0, 0]);

        // One channel at the threshold defeats the gate.
        let out = acc.handle_update(&update(&[(101, 10, 15, 1)]));
        assert_eq!(&out.frames[0].data[0..3], &[10, 15, 1]);
    }

    #[test]
    fn noise_gate_preserves_white() {
        let mut acc = accumulator();
        let out = acc.handle_update(&UpdateMessage {
            universe: 0,
            entities: vec![EntityState { id: 101, r: 1, g: 2, b: 3, w: 200 }],
        });

        let snapshot = &out.snapshots[0];
        assert_eq!(snapshot.input[0].w, 200);
        assert_eq!((snapshot.input[0].r, snapshot.input[0].g, snapshot.input[0].b), (0, 0, 0));
    }

    #[test]
    fn unmapped_entities_change_nothing() {
        let mut acc = accumulator();
        acc.handle_update(&update(&[(101, 200, 100, 50)]));
        let before = *acc.persistent(0).unwrap();

        let out = acc.handle_update(&update(&[(500, 1, 2, 3), (60000, 4, 5, 6)]));
        assert!(out.frames.is_empty());
        assert_eq!(acc.persistent(0).unwrap(), &before);
        assert_eq!(acc.stats().unmapped, 2);
    }

    #[test]
    fn updates_before_first_config_are_dropped() {
        let physical = PhysicalConfig::from_ranges(vec![RangeSpec {
            name: "strip".to_string(),
            entity_start: 101,
            entity_end: 110,
            ip: ip(5),
            universe: 0,
        }]);
        let mut acc = Accumulator::new(physical);

        let out = acc.handle_update(&update(&[(101, 1, 2, 3)]));
        assert!(out.frames.is_empty());
        assert!(acc.persistent(0).is_none());
    }

    #[test]
    fn tail_offset_writes_the_last_three_bytes() {
        let physical = PhysicalConfig::from_entries(vec![crate::config::RoutingEntry {
            name: "edge".to_string(),
            entity_id: 7,
            ip: ip(5),
            universe: 0,
            dmx_offset: 509,
        }]);
        let mut acc = Accumulator::new(physical);
        acc.handle_config(config(&[(7, 7)]));

        let out = acc.handle_update(&update(&[(7, 201, 202, 203)]));
        assert_eq!(&out.frames[0].data[509..512], &[201, 202, 203]);
    }

    #[test]
    fn patch_rewrites_out_frame_but_not_persistent_state() {
        let mut acc = accumulator();
        let mut patch = PatchMap::new();
        patch.insert(0, 1, 2).unwrap();
        acc.set_patch(patch);

        let out = acc.handle_update(&update(&[(101, 200, 100, 50)]));
        let frame = &out.frames[0];

        assert_eq!(&frame.data[0..3], &[0, 0, 0]);
        assert_eq!(&frame.data[3..6], &[200, 100, 50]);

        // Persistent state keeps the unpatched triplet.
        assert_eq!(&acc.persistent(0).unwrap()[0..3], &[200, 100, 50]);
    }

    #[test]
    fn patching_can_be_toggled_without_reloading() {
        let mut acc = accumulator();
        let mut patch = PatchMap::new();
        patch.insert(0, 1, 2).unwrap();
        acc.set_patch(patch);
        acc.set_patching_active(false);

        let out = acc.handle_update(&update(&[(101, 200, 100, 50)]));
        assert_eq!(&out.frames[0].data[0..3], &[200, 100, 50]);

        acc.set_patching_active(true);
        let out = acc.handle_update(&update(&[(101, 200, 100, 50)]));
        assert_eq!(&out.frames[0].data[0..3], &[0, 0, 0]);
    }

    #[test]
    fn one_update_spanning_universes_emits_per_universe_frames() {
        let physical = PhysicalConfig::from_ranges(vec![
            RangeSpec {
                name: "a".to_string(),
                entity_start: 1,
                entity_end: 5,
                ip: ip(5),
                universe: 0,
            },
            RangeSpec {
                name: "b".to_string(),
                entity_start: 10,
                entity_end: 15,
                ip: ip(6),
                universe: 1,
            },
        ]);
        let mut acc = Accumulator::new(physical);
        acc.handle_config(config(&[(1, 5), (10, 15)]));

        let out = acc.handle_update(&update(&[(1, 100, 0, 0), (10, 0, 100, 0)]));

        assert_eq!(out.frames.len(), 2);
        assert_eq!(out.frames[0].universe, 0);
        assert_eq!(out.frames[0].ip, ip(5));
        assert_eq!(out.frames[1].universe, 1);
        assert_eq!(out.frames[1].ip, ip(6));

        assert_eq!(out.snapshots.len(), 2);
        assert_eq!(out.snapshots[0].input.len(), 1);
        assert_eq!(out.snapshots[0].input[0].id, 1);
    }
}
