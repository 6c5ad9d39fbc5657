//! Channel-level patching inside a universe.
//!
//! A patch duplicates source channels to destination channels and blanks
//! the sources in the outgoing frame. Channels are 1-indexed DMX triplet
//! slots: channel `c` addresses bytes `(c-1)*3 .. (c-1)*3+3`. Patching is
//! applied to a working copy of the frame right before transmission; the
//! accumulator's persistent state never sees it.

use std::collections::BTreeMap;

use lumibridge_proto::artnet::DMX_CHANNELS;

use crate::errors::ConfigError;

/// First valid patch channel.
pub const MIN_CHANNEL: u16 = 1;

/// Last valid patch channel.
pub const MAX_CHANNEL: u16 = 512;

/// Per-universe channel remap: `universe → (source → destinations)`.
///
/// Duplicate `(universe, source)` insertions accumulate destinations, so a
/// single source can fan out to several channels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchMap {
    universes: BTreeMap<u16, BTreeMap<u16, Vec<u16>>>,
}

impl PatchMap {
    /// An empty patch map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one `source → destination` pair for a universe.
    ///
    /// # Errors
    ///
    /// [`ConfigError::ChannelOutOfRange`] when either channel falls
    /// outside `1..=512`.
    pub fn insert(&mut self, universe: u16, source: u16, destination: u16) -> Result<(), ConfigError> {
        for channel in [source, destination] {
            if !(MIN_CHANNEL..=MAX_CHANNEL).contains(&channel) {
                return Err(ConfigError::ChannelOutOfRange { channel });
            }
        }

        self.universes.entry(universe).or_default().entry(source).or_default().push(destination);
        Ok(())
    }

    /// True when no universe carries patch entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.universes.is_empty()
    }

    /// Number of universes with at least one patch entry.
    #[must_use]
    pub fn universe_count(&self) -> usize {
        self.universes.len()
    }

    /// True when `universe` has patch entries.
    #[must_use]
    pub fn covers(&self, universe: u16) -> bool {
        self.universes.contains_key(&universe)
    }

    /// Apply this map's entries for `universe` to a working frame.
    ///
    /// Entries are processed in ascending source order. Every destination
    /// write reads the *pre-patch* value of its source (a snapshot taken
    /// on entry), and each entry's source triplet is zeroed after its
    /// destinations are written. Channels whose triplet would extend past
    /// the 512 bytes are skipped.
    pub fn apply(&self, universe: u16, frame: &mut [u8; DMX_CHANNELS]) {
        let Some(entries) = self.universes.get(&universe) else {
            return;
        };

        let snapshot = *frame;

        for (&source, destinations) in entries {
            let Some(src) = triplet_offset(source) else {
                continue;
            };

            for &destination in destinations {
                let Some(dst) = triplet_offset(destination) else {
                    continue;
                };
                frame[dst..dst + 3].copy_from_slice(&snapshot[src..src + 3]);
            }

            frame[src..src + 3].fill(0);
        }
    }
}

/// Byte offset of a 1-indexed channel's RGB triplet, or `None` when the
/// triplet would not fit the universe.
fn triplet_offset(channel: u16) -> Option<usize> {
    let offset = usize::from(channel.checked_sub(1)?) * 3;
    (offset + 3 <= DMX_CHANNELS).then_some(offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with(values: &[(usize, u8)]) -> [u8; DMX_CHANNELS] {
        let mut frame = [0u8; DMX_CHANNELS];
        for &(i, v) in values {
            frame[i] = v;
        }
        frame
    }

    #[test]
    fn destination_gets_source_and_source_is_zeroed() {
        let mut map = PatchMap::new();
        map.insert(0, 1, 2).unwrap();

        let mut frame = frame_with(&[(0, 200), (1, 100), (2, 50)]);
        map.apply(0, &mut frame);

        assert_eq!(&frame[0..3], &[0, 0, 0]);
        assert_eq!(&frame[3..6], &[200, 100, 50]);
    }

    #[test]
    fn one_source_fans_out_to_many_destinations() {
        let mut map = PatchMap::new();
        map.insert(0, 1, 2).unwrap();
        map.insert(0, 1, 4).unwrap();

        let mut frame = frame_with(&[(0, 9), (1, 8), (2, 7)]);
        map.apply(0, &mut frame);

        assert_eq!(&frame[0..3], &[0, 0, 0]);
        assert_eq!(&frame[3..6], &[9, 8, 7]);
        assert_eq!(&frame[9..12], &[9, 8, 7]);
    }

    #[test]
    fn destinations_read_pre_patch_values() {
        // 1 → 2 and 2 → 3: channel 3 must see channel 2's original value,
        // not channel 1's copied one.
        let mut map = PatchMap::new();
        map.insert(0, 1, 2).unwrap();
        map.insert(0, 2, 3).unwrap();

        let mut frame = frame_with(&[(0, 11), (3, 22)]);
        map.apply(0, &mut frame);

        assert_eq!(&frame[6..9], &[22, 0, 0]);
    }

    #[test]
    fn other_universes_are_untouched() {
        let mut map = PatchMap::new();
        map.insert(0, 1, 2).unwrap();

        let mut frame = frame_with(&[(0, 123)]);
        map.apply(1, &mut frame);

        assert_eq!(frame[0], 123);
    }

    #[test]
    fn channels_outside_dmx_range_are_rejected() {
        let mut map = PatchMap::new();
        assert!(matches!(
            map.insert(0, 0, 2),
            Err(ConfigError::ChannelOutOfRange { channel: 0 })
        ));
        assert!(matches!(
            map.insert(0, 1, 513),
            Err(ConfigError::ChannelOutOfRange { channel: 513 })
        ));
        assert!(map.insert(0, 1, 512).is_ok());
    }

    #[test]
    fn channels_past_the_last_triplet_are_skipped_on_apply() {
        // Channel 171's triplet would start at byte 510; there is no room
        // for three bytes, so the entry is a no-op.
        let mut map = PatchMap::new();
        map.insert(0, 171, 1).unwrap();
        map.insert(0, 1, 171).unwrap();

        let mut frame = frame_with(&[(0, 55), (510, 66)]);
        let before = frame;
        map.apply(0, &mut frame);

        // 1 → 171 skipped (destination out of room), then source 1 zeroed.
        assert_eq!(&frame[0..3], &[0, 0, 0]);
        assert_eq!(frame[510], before[510]);
    }
}
