//! Patch-distance to averaging-weight conversion.

use crate::error::NlmError;
use crate::float_trait::NlmFloat;

/// IEEE-754 single-precision bit pattern of `2^0`.
const BITS_ONE: f32 = 0x3f80_0000u32 as f32;
/// IEEE-754 single-precision bit pattern of `2^-1`.
const BITS_HALF: f32 = 0x3f00_0000u32 as f32;
/// Smallest normal single-precision bit pattern; anything below flushes to 0.
const BITS_MIN_NORMAL: f32 = 0x0080_0000u32 as f32;

/// Fast approximation of `2^-x` for `x >= 0`.
///
/// Linearly interpolates the float bit pattern between `2^0` and `2^-1`,
/// which is exact at integer `x` and piecewise linear in the mantissa in
/// between. Results that would fall below the normal range flush to 0.
#[inline]
pub fn fast_mexp2(x: f32) -> f32 {
    let k0 = BITS_ONE + x * (BITS_HALF - BITS_ONE);
    // NaN fails the comparison and flushes to 0 as well.
    if k0 >= BITS_MIN_NORMAL {
        f32::from_bits(k0 as u32)
    } else {
        0.0
    }
}

/// `weight(d) = 2^(-d / h^2)` for a filter strength `h > 0`.
#[derive(Debug, Clone, Copy)]
pub struct WeightKernel<F: NlmFloat> {
    inv_h_sq: F,
}

impl<F: NlmFloat> WeightKernel<F> {
    pub fn new(filter_strength: F) -> Result<Self, NlmError> {
        if !filter_strength.is_finite() || filter_strength <= F::zero() {
            return Err(NlmError::InvalidFilterStrength(filter_strength.as_f64()));
        }
        Ok(Self {
            inv_h_sq: F::one() / (filter_strength * filter_strength),
        })
    }

    /// Weight in `[0, 1]`; non-increasing in `distance`, exactly 1 at 0.
    ///
    /// A NaN distance (overflowed differences) gets weight 0.
    #[inline]
    pub fn weight(&self, distance: F) -> F {
        let d = if distance >= F::zero() {
            distance
        } else if distance.is_nan() {
            return F::zero();
        } else {
            // Sliding sums can leave tiny negative residues.
            F::zero()
        };
        F::from_f32(fast_mexp2((d * self.inv_h_sq).as_f32())).unwrap_or_else(F::zero)
    }
}
