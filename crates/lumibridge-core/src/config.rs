//! Physical routing configuration.
//!
//! The routing sheet binds logical entity IDs to `(controller IP, Art-Net
//! universe, DMX offset)` triples. Rows declare inclusive entity ranges;
//! [`PhysicalConfig::from_ranges`] expands them to one [`RoutingEntry`]
//! per ID with precomputed offsets, the shape the route compiler wants.

use std::{collections::BTreeMap, net::IpAddr};

use tracing::warn;

use lumibridge_proto::artnet::DMX_CHANNELS;

/// One row of the routing sheet before range expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeSpec {
    /// Fixture name, carried through for export and inspection.
    pub name: String,
    /// First entity ID of the range.
    pub entity_start: u16,
    /// Last entity ID of the range (inclusive; equal to `entity_start`
    /// for single-entity rows).
    pub entity_end: u16,
    /// Controller address for every entity in the range.
    pub ip: IpAddr,
    /// Art-Net universe for every entity in the range.
    pub universe: u16,
}

/// A single entity's routing destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingEntry {
    /// Fixture name from the sheet row this entry was expanded from.
    pub name: String,
    /// Logical entity ID.
    pub entity_id: u16,
    /// Controller address.
    pub ip: IpAddr,
    /// Art-Net universe.
    pub universe: u16,
    /// Byte offset of the entity's RGB triplet inside the universe.
    pub dmx_offset: usize,
}

/// The expanded physical configuration: per-entity routing entries in
/// sheet order plus the derived universe-to-controller mapping.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PhysicalConfig {
    entries: Vec<RoutingEntry>,
    universe_ip: BTreeMap<u16, IpAddr>,
}

impl PhysicalConfig {
    /// Expand sheet rows into per-entity routing entries.
    ///
    /// Ranges expand to `offset = (id - entity_start) * 3`; single-entity
    /// rows get offset 0. Entries whose triplet would not fit the 512
    /// channels (`offset + 3 > 512`) are dropped with a warning. The
    /// universe-to-IP mapping is first-writer-wins; conflicting rows are
    /// reported and ignored.
    #[must_use]
    pub fn from_ranges(ranges: Vec<RangeSpec>) -> Self {
        let mut entries = Vec::new();
        let mut universe_ip = BTreeMap::new();

        for spec in ranges {
            for id in spec.entity_start..=spec.entity_end {
                let dmx_offset = usize::from(id - spec.entity_start) * 3;
                if dmx_offset + 3 > DMX_CHANNELS {
                    warn!(
                        name = %spec.name,
                        entity_id = id,
                        dmx_offset,
                        "entity does not fit its universe, dropping"
                    );
                    continue;
                }

                entries.push(RoutingEntry {
                    name: spec.name.clone(),
                    entity_id: id,
                    ip: spec.ip,
                    universe: spec.universe,
                    dmx_offset,
                });

                let known = universe_ip.entry(spec.universe).or_insert(spec.ip);
                if *known != spec.ip {
                    warn!(
                        universe = spec.universe,
                        kept = %known,
                        ignored = %spec.ip,
                        "conflicting controller IPs for one universe"
                    );
                }
            }
        }

        Self { entries, universe_ip }
    }

    /// Build a configuration from already-expanded entries.
    ///
    /// Same validation as [`PhysicalConfig::from_ranges`]: entries whose
    /// triplet does not fit (`dmx_offset + 3 > 512`) are dropped, and the
    /// universe mapping is first-writer-wins. Offset 509 is the last one
    /// accepted — it writes bytes 509, 510 and 511.
    #[must_use]
    pub fn from_entries(entries: Vec<RoutingEntry>) -> Self {
        let mut kept = Vec::with_capacity(entries.len());
        let mut universe_ip = BTreeMap::new();

        for entry in entries {
            if entry.dmx_offset + 3 > DMX_CHANNELS {
                warn!(
                    name = %entry.name,
                    entity_id = entry.entity_id,
                    dmx_offset = entry.dmx_offset,
                    "entity does not fit its universe, dropping"
                );
                continue;
            }

            let known = universe_ip.entry(entry.universe).or_insert(entry.ip);
            if *known != entry.ip {
                warn!(
                    universe = entry.universe,
                    kept = %known,
                    ignored = %entry.ip,
                    "conflicting controller IPs for one universe"
                );
            }
            kept.push(entry);
        }

        Self { entries: kept, universe_ip }
    }

    /// Per-entity routing entries, preserving sheet order.
    #[must_use]
    pub fn entries(&self) -> &[RoutingEntry] {
        &self.entries
    }

    /// Derived universe-to-controller mapping.
    #[must_use]
    pub fn universe_ip(&self) -> &BTreeMap<u16, IpAddr> {
        &self.universe_ip
    }

    /// True when the sheet produced no usable entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All routed entity IDs, sorted and deduplicated.
    ///
    /// The pattern generator iterates this to synthesize full-installation
    /// frames.
    #[must_use]
    pub fn entity_ids(&self) -> Vec<u16> {
        let mut ids: Vec<u16> = self.entries.iter().map(|e| e.entity_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// All controller addresses, sorted and deduplicated.
    #[must_use]
    pub fn controller_ips(&self) -> Vec<IpAddr> {
        let mut ips: Vec<IpAddr> = self.universe_ip.values().copied().collect();
        ips.sort_unstable();
        ips.dedup();
        ips
    }

    /// Entity coverage of one controller: per-universe merged contiguous
    /// ID ranges, `(start, end)` inclusive.
    #[must_use]
    pub fn universe_ranges(&self, ip: IpAddr) -> BTreeMap<u16, Vec<(u16, u16)>> {
        let mut per_universe: BTreeMap<u16, Vec<u16>> = BTreeMap::new();
        for entry in self.entries.iter().filter(|e| e.ip == ip) {
            per_universe.entry(entry.universe).or_default().push(entry.entity_id);
        }

        per_universe
            .into_iter()
            .map(|(universe, mut ids)| {
                ids.sort_unstable();
                ids.dedup();
                (universe, merge_runs(&ids))
            })
            .collect()
    }

    /// Rewrite every occurrence of one controller address.
    ///
    /// Returns the number of routing entries touched.
    pub fn rewrite_ip(&mut self, old: IpAddr, new: IpAddr) -> usize {
        let mut touched = 0;
        for entry in &mut self.entries {
            if entry.ip == old {
                entry.ip = new;
                touched += 1;
            }
        }
        for ip in self.universe_ip.values_mut() {
            if *ip == old {
                *ip = new;
            }
        }
        touched
    }

    /// Rewrite the controller address of a single universe.
    ///
    /// Returns the number of routing entries touched.
    pub fn rewrite_universe_ip(&mut self, universe: u16, new: IpAddr) -> usize {
        let mut touched = 0;
        for entry in &mut self.entries {
            if entry.universe == universe {
                entry.ip = new;
                touched += 1;
            }
        }
        if let Some(ip) = self.universe_ip.get_mut(&universe) {
            *ip = new;
        }
        touched
    }
}

fn merge_runs(sorted_ids: &[u16]) -> Vec<(u16, u16)> {
    let mut runs = Vec::new();
    let Some((&first, rest)) = sorted_ids.split_first() else {
        return runs;
    };

    let (mut start, mut end) = (first, first);
    for &id in rest {
        if id == end + 1 {
            end = id;
        } else {
            runs.push((start, end));
            start = id;
            end = id;
        }
    }
    runs.push((start, end));
    runs
}
