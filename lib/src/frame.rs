//! Turning one universe's slot data into pixel writes.

use std::collections::HashMap;

use smart_leds::RGB8;

use crate::plan::{CHANNELS_PER_PIXEL, UniverseSpan};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelWrite {
    pub index: usize,
    pub color: RGB8,
}

/// All pixel writes produced by one universe update. The caller applies them
/// and then presents the strip once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelWriteBatch {
    universe: u16,
    writes: Vec<PixelWrite>,
}

impl PixelWriteBatch {
    pub fn universe(&self) -> u16 {
        self.universe
    }

    pub fn writes(&self) -> &[PixelWrite] {
        &self.writes
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

impl IntoIterator for PixelWriteBatch {
    type Item = PixelWrite;
    type IntoIter = std::vec::IntoIter<PixelWrite>;

    fn into_iter(self) -> Self::IntoIter {
        self.writes.into_iter()
    }
}

/// Last slot data seen per universe, used only to skip unchanged frames.
#[derive(Debug, Default)]
pub struct FrameCache {
    last_seen: HashMap<u16, Vec<u8>>,
}

impl FrameCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, universe: u16) -> Option<&[u8]> {
        self.last_seen.get(&universe).map(Vec::as_slice)
    }

    pub fn clear(&mut self) {
        self.last_seen.clear();
    }

    pub fn len(&self) -> usize {
        self.last_seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_seen.is_empty()
    }
}

/// Maps the slots of `span` in `raw_slots` onto pixels.
///
/// Returns `None` when the span's slots are identical to the previous delivery
/// for that universe. Senders may transmit fewer slots than the span covers;
/// missing components are written as 0.
pub fn apply_universe_update(
    span: &UniverseSpan,
    raw_slots: &[u8],
    cache: &mut FrameCache,
) -> Option<PixelWriteBatch> {
    let start = span.first_channel.min(raw_slots.len());
    let end = (span.last_channel + 1).min(raw_slots.len());
    let slots = &raw_slots[start..end];

    if cache.get(span.universe) == Some(slots) {
        return None;
    }
    cache.last_seen.insert(span.universe, slots.to_vec());

    let slot = |i: usize| slots.get(i).copied().unwrap_or(0);
    let writes = (0..span.channel_count())
        .step_by(CHANNELS_PER_PIXEL)
        .map(|i| PixelWrite {
            index: span.first_pixel_index + i / CHANNELS_PER_PIXEL,
            color: RGB8::new(slot(i), slot(i + 1), slot(i + 2)),
        })
        .collect();

    Some(PixelWriteBatch {
        universe: span.universe,
        writes,
    })
}
