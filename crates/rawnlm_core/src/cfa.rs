//! CFA tile geometry: period and per-pixel channel index.

use std::fmt;

use crate::error::NlmError;

/// Largest supported CFA period (6x6 X-Trans tile, 36 channels).
pub const MAX_CFA_PERIOD: usize = 6;

/// dcraw/libraw `filters` value that marks an X-Trans sensor.
const XTRANS_FILTERS: u32 = 9;

/// Square repeating CFA tile, described only by its side length.
///
/// The denoiser never needs to know which color a channel carries: it only
/// has to keep samples of different channels apart. Every position inside the
/// `P x P` tile is therefore its own channel with its own noise parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CfaLayout {
    period: usize,
}

impl CfaLayout {
    /// Create a layout with the given tile side length.
    pub fn new(period: usize) -> Result<Self, NlmError> {
        if period == 0 || period > MAX_CFA_PERIOD {
            return Err(NlmError::InvalidCfaPeriod {
                max: MAX_CFA_PERIOD,
                got: period,
            });
        }
        Ok(Self { period })
    }

    /// 2x2 Bayer tile (RGGB, BGGR, GRBG, GBRG all share this layout).
    pub fn bayer() -> Self {
        Self { period: 2 }
    }

    /// 6x6 X-Trans tile.
    pub fn xtrans() -> Self {
        Self { period: 6 }
    }

    /// Single-channel sensor without a color filter array.
    pub fn monochrome() -> Self {
        Self { period: 1 }
    }

    /// Derive the layout from a dcraw/libraw `filters` word.
    ///
    /// `9` is X-Trans; every other value, `0` included, is treated as a 2x2
    /// Bayer variant. Use [`CfaLayout::monochrome`] for sensors without a CFA.
    pub fn from_filters(filters: u32) -> Self {
        if filters == XTRANS_FILTERS {
            Self::xtrans()
        } else {
            Self::bayer()
        }
    }

    /// Tile side length P.
    #[inline]
    pub fn period(&self) -> usize {
        self.period
    }

    /// Number of distinct channels, P*P.
    #[inline]
    pub fn channel_count(&self) -> usize {
        self.period * self.period
    }

    /// Channel of pixel `(x, y)`: `(y mod P) * P + (x mod P)`.
    #[inline]
    pub fn channel_index(&self, x: usize, y: usize) -> usize {
        (y % self.period) * self.period + (x % self.period)
    }
}

impl fmt::Display for CfaLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.period {
            1 => f.write_str("monochrome"),
            2 => f.write_str("Bayer 2x2"),
            6 => f.write_str("X-Trans 6x6"),
            p => write!(f, "CFA {p}x{p}"),
        }
    }
}
