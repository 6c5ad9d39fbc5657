//! Route compilation.
//!
//! Folds the latest eHuB Config (which entity IDs are live) into the
//! physical configuration (where each entity lives) to produce a dense
//! table with O(1) lookup on the update hot path. The table is sized by
//! the Config's largest declared `entity_end`, not the sheet's largest ID,
//! so sparse installations don't pay for unused tail slots.

use std::{collections::HashMap, net::IpAddr};

use lumibridge_proto::ConfigMessage;

use crate::config::PhysicalConfig;

/// A compiled routing slot: where one entity's RGB triplet goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    /// Destination controller.
    pub ip: IpAddr,
    /// Art-Net universe on that controller.
    pub universe: u16,
    /// Byte offset of the triplet inside the universe.
    pub dmx_offset: usize,
}

/// Dense routing table indexed by entity ID.
///
/// Slots hold `None` for IDs the physical sheet does not map; lookups past
/// the end are unmapped as well. Both cases are silently skipped by the
/// accumulator — entities can legitimately exist upstream without being
/// wired here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingTable {
    slots: Vec<Option<Route>>,
}

impl RoutingTable {
    /// Compile a table from the declared entity ranges and the sheet.
    ///
    /// When the sheet maps the same entity ID more than once, the first
    /// row wins (sheet order is preserved by [`PhysicalConfig`]).
    #[must_use]
    pub fn compile(config: &ConfigMessage, physical: &PhysicalConfig) -> Self {
        let mut by_id: HashMap<u16, Route> = HashMap::with_capacity(physical.entries().len());
        for entry in physical.entries() {
            by_id.entry(entry.entity_id).or_insert(Route {
                ip: entry.ip,
                universe: entry.universe,
                dmx_offset: entry.dmx_offset,
            });
        }

        let len = config.max_entity_end().map_or(0, |max| usize::from(max) + 1);
        let mut slots = vec![None; len];

        for range in &config.ranges {
            for id in range.entity_start..=range.entity_end {
                if let Some(route) = by_id.get(&id) {
                    slots[usize::from(id)] = Some(*route);
                }
            }
        }

        Self { slots }
    }

    /// Route for an entity ID, or `None` when unmapped or out of bounds.
    #[must_use]
    pub fn lookup(&self, id: u16) -> Option<&Route> {
        self.slots.get(usize::from(id))?.as_ref()
    }

    /// Number of slots (largest declared entity ID plus one).
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True for a table compiled from an empty Config.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
