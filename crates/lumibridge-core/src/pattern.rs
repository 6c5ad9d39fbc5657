//! Synthetic pattern frames.
//!
//! The faker drives the same pipeline the live decoder feeds, so patterns
//! are expressed as ordinary eHuB records: one synthetic Config covering
//! the installation's entity IDs, then Updates carrying the pattern
//! colors. This module is the pure frame math; the runtime task in the
//! server crate owns timing and cancellation.

use std::time::Duration;

use lumibridge_proto::{ConfigMessage, ConfigRange, EntityState, UpdateMessage};

/// Tick period for continuous patterns (25 Hz).
pub const PATTERN_TICK: Duration = Duration::from_millis(40);

/// Fraction of the strip lit by the travelling wave.
pub const WAVE_WIDTH: f32 = 0.3;

/// Position advance per wave tick; the wave wraps at 1.0.
pub const WAVE_STEP: f32 = 0.02;

/// Wave color (amber).
pub const WAVE_COLOR: (u8, u8, u8) = (255, 100, 0);

/// Synthetic Config declaring every routed entity live.
///
/// Mirrors what upstream renderers send: a single range from the lowest
/// to the highest ID. `ids` must be sorted; an empty installation yields
/// an empty Config, which downstream compiles to an empty table.
#[must_use]
pub fn synthetic_config(ids: &[u16]) -> ConfigMessage {
    let ranges = match (ids.first(), ids.last()) {
        (Some(&first), Some(&last)) => vec![ConfigRange {
            sextuor_start: 0,
            entity_start: first,
            sextuor_end: (ids.len().saturating_sub(1)) as u16,
            entity_end: last,
        }],
        _ => Vec::new(),
    };

    ConfigMessage { universe: 0, ranges }
}

/// Every entity at one color.
#[must_use]
pub fn solid_frame(ids: &[u16], r: u8, g: u8, b: u8, w: u8) -> UpdateMessage {
    UpdateMessage {
        universe: 0,
        entities: ids.iter().map(|&id| EntityState { id, r, g, b, w }).collect(),
    }
}

/// A linear color ramp across the entity list.
#[must_use]
pub fn gradient_frame(ids: &[u16], start: (u8, u8, u8), end: (u8, u8, u8)) -> UpdateMessage {
    let count = ids.len();
    let entities = ids
        .iter()
        .enumerate()
        .map(|(i, &id)| {
            let t = if count > 1 { i as f32 / (count - 1) as f32 } else { 0.0 };
            EntityState {
                id,
                r: lerp(start.0, end.0, t),
                g: lerp(start.1, end.1, t),
                b: lerp(start.2, end.2, t),
                w: 0,
            }
        })
        .collect();

    UpdateMessage { universe: 0, entities }
}

/// One frame of the travelling wave.
///
/// `position` is the wave center in `[0, 1]` along the entity list.
/// Intensity falls off linearly to zero at `WAVE_WIDTH / 2` from the
/// center.
#[must_use]
pub fn wave_frame(ids: &[u16], position: f32) -> UpdateMessage {
    let count = ids.len();
    let (r, g, b) = WAVE_COLOR;

    let entities = ids
        .iter()
        .enumerate()
        .map(|(i, &id)| {
            let entity_pos = if count > 1 { i as f32 / (count - 1) as f32 } else { 0.0 };
            let distance = (entity_pos - position).abs();
            let intensity = if distance <= WAVE_WIDTH / 2.0 {
                1.0 - distance / (WAVE_WIDTH / 2.0)
            } else {
                0.0
            };

            EntityState {
                id,
                r: scale(r, intensity),
                g: scale(g, intensity),
                b: scale(b, intensity),
                w: 0,
            }
        })
        .collect();

    UpdateMessage { universe: 0, entities }
}

/// Advance a wave position by one tick, wrapping past 1.0.
#[must_use]
pub fn advance_wave(position: f32) -> f32 {
    let next = position + WAVE_STEP;
    if next > 1.0 { 0.0 } else { next }
}

fn lerp(start: u8, end: u8, t: f32) -> u8 {
    (f32::from(start) + (f32::from(end) - f32::from(start)) * t) as u8
}

fn scale(value: u8, intensity: f32) -> u8 {
    (f32::from(value) * intensity) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDS: [u16; 5] = [101, 102, 103, 104, 105];

    #[test]
    fn synthetic_config_covers_id_span() {
        let config = synthetic_config(&IDS);
        assert_eq!(config.ranges.len(), 1);
        assert_eq!(config.ranges[0].entity_start, 101);
        assert_eq!(config.ranges[0].entity_end, 105);
        assert_eq!(config.max_entity_end(), Some(105));

        assert!(synthetic_config(&[]).ranges.is_empty());
    }

    #[test]
    fn solid_frame_covers_every_entity() {
        let frame = solid_frame(&IDS, 30, 0, 0, 0);
        assert_eq!(frame.entities.len(), 5);
        assert!(frame.entities.iter().all(|e| (e.r, e.g, e.b, e.w) == (30, 0, 0, 0)));
    }

    #[test]
    fn gradient_endpoints_are_exact() {
        let frame = gradient_frame(&IDS, (0, 0, 0), (200, 100, 40));
        let first = frame.entities.first().unwrap();
        let last = frame.entities.last().unwrap();

        assert_eq!((first.r, first.g, first.b), (0, 0, 0));
        assert_eq!((last.r, last.g, last.b), (200, 100, 40));
    }

    #[test]
    fn gradient_of_one_entity_uses_start_color() {
        let frame = gradient_frame(&[42], (7, 8, 9), (200, 100, 40));
        let only = &frame.entities[0];
        assert_eq!((only.r, only.g, only.b), (7, 8, 9));
    }

    #[test]
    fn wave_peaks_at_center_and_darkens_outside_width() {
        let frame = wave_frame(&IDS, 0.5);

        // Center entity carries the full wave color.
        assert_eq!(frame.entities[2].r, WAVE_COLOR.0);
        assert_eq!(frame.entities[2].g, WAVE_COLOR.1);

        // Ends are outside width/2 = 0.15 of the center.
        assert_eq!(frame.entities[0].r, 0);
        assert_eq!(frame.entities[4].r, 0);
    }

    #[test]
    fn wave_position_wraps() {
        let mut position = 0.0;
        for _ in 0..60 {
            position = advance_wave(position);
            assert!((0.0..=1.0).contains(&position));
        }
    }
}
