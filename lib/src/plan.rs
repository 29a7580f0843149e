//! Partitioning of a panel's pixels across lighting-network universes.
//!
//! A panel is addressed as a flat sequence of RGB pixels, row after row. Each
//! universe carries [`UNIVERSE_SIZE`] slots; a row is never split between two
//! universes, so the tail of a universe that cannot hold another whole row is
//! left unused.

use std::ops::RangeInclusive;
use thiserror::Error;

/// Number of slots in one universe.
pub const UNIVERSE_SIZE: usize = 512;

/// Red, green and blue.
pub const CHANNELS_PER_PIXEL: usize = 3;

/// Highest universe a panel may occupy. Art-Net port addresses are 15 bits.
pub const MAX_UNIVERSE: u16 = 0x7fff;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("invalid geometry {rows}x{columns}: {reason}")]
    InvalidGeometry {
        rows: usize,
        columns: usize,
        reason: &'static str,
    },
    #[error("invalid address (universe {universe}, channel {channel}): {reason}")]
    InvalidAddress {
        universe: u16,
        channel: usize,
        reason: &'static str,
    },
    #[error("universe {universe} is outside the subscribed range {first}..={last}")]
    OutOfRangeUniverse { universe: u16, first: u16, last: u16 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PanelGeometry {
    pub rows: usize,
    pub columns: usize,
}

impl PanelGeometry {
    pub fn new(rows: usize, columns: usize) -> Self {
        Self { rows, columns }
    }

    pub fn square(size: usize) -> Self {
        Self::new(size, size)
    }

    pub fn pixel_count(&self) -> usize {
        self.rows.saturating_mul(self.columns)
    }

    pub fn channels_per_row(&self) -> usize {
        self.columns.saturating_mul(CHANNELS_PER_PIXEL)
    }

    fn invalid(&self, reason: &'static str) -> PlanError {
        PlanError::InvalidGeometry {
            rows: self.rows,
            columns: self.columns,
            reason,
        }
    }
}

/// Where the panel's first pixel lives on the network.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PanelAddress {
    pub start_universe: u16,
    /// 0-based slot within `start_universe`.
    pub start_channel: usize,
}

impl PanelAddress {
    pub fn new(start_universe: u16, start_channel: usize) -> Result<Self, PlanError> {
        if start_channel >= UNIVERSE_SIZE {
            return Err(PlanError::InvalidAddress {
                universe: start_universe,
                channel: start_channel,
                reason: "start channel is past the end of the universe",
            });
        }
        Ok(Self {
            start_universe,
            start_channel,
        })
    }

    /// Builds an address from the 1-based DMX address operators work with.
    pub fn from_dmx_address(start_universe: u16, dmx_address: usize) -> Result<Self, PlanError> {
        match dmx_address.checked_sub(1) {
            Some(channel) => Self::new(start_universe, channel),
            None => Err(PlanError::InvalidAddress {
                universe: start_universe,
                channel: 0,
                reason: "DMX addresses start at 1",
            }),
        }
    }

    pub fn dmx_address(&self) -> usize {
        self.start_channel + 1
    }
}

/// The slots one universe contributes to the panel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UniverseSpan {
    pub universe: u16,
    pub first_channel: usize,
    /// Inclusive.
    pub last_channel: usize,
    /// Index of the pixel fed by `first_channel`.
    pub first_pixel_index: usize,
}

impl UniverseSpan {
    pub fn channels(&self) -> RangeInclusive<usize> {
        self.first_channel..=self.last_channel
    }

    pub fn channel_count(&self) -> usize {
        self.last_channel - self.first_channel + 1
    }

    pub fn pixel_count(&self) -> usize {
        self.channel_count() / CHANNELS_PER_PIXEL
    }
}

/// The complete universe layout for one geometry and address.
///
/// A plan is never edited: any change of geometry or address builds a new one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelPlan {
    geometry: PanelGeometry,
    address: PanelAddress,
    spans: Vec<UniverseSpan>,
    universe_count: usize,
}

impl ChannelPlan {
    /// Lays the panel out starting at `address`.
    ///
    /// The start universe takes as many whole rows as fit after
    /// `start_channel`, every following universe takes as many rows as fit
    /// from slot 0, and the last one takes whatever is left. When the start
    /// universe has no room for a single row it still counts toward
    /// [`universe_count`](Self::universe_count) but contributes no span.
    pub fn compute(geometry: PanelGeometry, address: PanelAddress) -> Result<Self, PlanError> {
        if geometry.rows == 0 || geometry.columns == 0 {
            return Err(geometry.invalid("panel has no pixels"));
        }
        if geometry.rows.checked_mul(geometry.columns).is_none()
            || geometry.columns.checked_mul(CHANNELS_PER_PIXEL).is_none()
        {
            return Err(geometry.invalid("panel is too large"));
        }
        if address.start_channel >= UNIVERSE_SIZE {
            return Err(PlanError::InvalidAddress {
                universe: address.start_universe,
                channel: address.start_channel,
                reason: "start channel is past the end of the universe",
            });
        }

        if address.start_universe > MAX_UNIVERSE {
            return Err(PlanError::InvalidAddress {
                universe: address.start_universe,
                channel: address.start_channel,
                reason: "start universe is past the last universe",
            });
        }

        let channels_per_row = geometry.channels_per_row();
        let rows_per_full_universe = UNIVERSE_SIZE / channels_per_row;
        if rows_per_full_universe == 0 {
            return Err(geometry.invalid("a single row does not fit in one universe"));
        }

        let rows_in_first =
            ((UNIVERSE_SIZE - address.start_channel) / channels_per_row).min(geometry.rows);

        let mut spans = Vec::new();
        let mut next_pixel = 0;
        if rows_in_first > 0 {
            spans.push(UniverseSpan {
                universe: address.start_universe,
                first_channel: address.start_channel,
                last_channel: address.start_channel + rows_in_first * channels_per_row - 1,
                first_pixel_index: 0,
            });
            next_pixel = rows_in_first * geometry.columns;
        }

        let mut universe_count = 1;
        let mut rows_left = geometry.rows - rows_in_first;
        while rows_left > 0 {
            let rows_here = rows_left.min(rows_per_full_universe);
            let universe = offset_universe(address, universe_count)?;
            spans.push(UniverseSpan {
                universe,
                first_channel: 0,
                last_channel: rows_here * channels_per_row - 1,
                first_pixel_index: next_pixel,
            });
            next_pixel += rows_here * geometry.columns;
            rows_left -= rows_here;
            universe_count += 1;
        }

        Ok(Self {
            geometry,
            address,
            spans,
            universe_count,
        })
    }

    pub fn geometry(&self) -> PanelGeometry {
        self.geometry
    }

    pub fn address(&self) -> PanelAddress {
        self.address
    }

    /// Spans in increasing universe order.
    pub fn spans(&self) -> &[UniverseSpan] {
        &self.spans
    }

    pub fn universe_count(&self) -> usize {
        self.universe_count
    }

    pub fn start_universe(&self) -> u16 {
        self.address.start_universe
    }

    pub fn last_universe(&self) -> u16 {
        // compute() already checked that the whole range fits in a u16
        self.address.start_universe + (self.universe_count - 1) as u16
    }

    /// Universes that actually carry pixel data.
    pub fn universes(&self) -> impl Iterator<Item = u16> + '_ {
        self.spans.iter().map(|span| span.universe)
    }

    pub fn span(&self, universe: u16) -> Result<&UniverseSpan, PlanError> {
        self.spans
            .iter()
            .find(|span| span.universe == universe)
            .ok_or(PlanError::OutOfRangeUniverse {
                universe,
                first: self.start_universe(),
                last: self.last_universe(),
            })
    }
}

fn offset_universe(address: PanelAddress, offset: usize) -> Result<u16, PlanError> {
    u16::try_from(offset)
        .ok()
        .and_then(|offset| address.start_universe.checked_add(offset))
        .filter(|universe| *universe <= MAX_UNIVERSE)
        .ok_or(PlanError::InvalidAddress {
            universe: address.start_universe,
            channel: address.start_channel,
            reason: "panel runs past the last universe",
        })
}
