//! Per-channel Poisson-Gaussian noise model.
//!
//! Each CFA channel `c` is described by an affine variance law: a sample with
//! expected value `x` has variance `a[c] * (x - b[c]) + const`, i.e. `a[c]` is
//! the photon gain and `b[c]` the offset (black level plus read-noise term)
//! of the generalized Anscombe transform.

use crate::cfa::CfaLayout;
use crate::error::NlmError;
use crate::float_trait::NlmFloat;

/// Validated gain/offset pairs, one per channel of a CFA layout.
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseModel<F: NlmFloat> {
    cfa: CfaLayout,
    gain: Vec<F>,
    offset: Vec<F>,
}

impl<F: NlmFloat> NoiseModel<F> {
    /// Build a model from per-channel arrays of length `P*P`.
    ///
    /// Channel order follows [`CfaLayout::channel_index`]. Rejects any gain
    /// that is not finite and strictly positive, and any non-finite offset.
    pub fn new(cfa: CfaLayout, gain: Vec<F>, offset: Vec<F>) -> Result<Self, NlmError> {
        let expected = cfa.channel_count();
        if gain.len() != expected || offset.len() != expected {
            return Err(NlmError::NoiseModelSize {
                expected,
                got_a: gain.len(),
                got_b: offset.len(),
            });
        }
        for (channel, &a) in gain.iter().enumerate() {
            if !a.is_finite() || a <= F::zero() {
                return Err(NlmError::InvalidNoiseGain {
                    channel,
                    value: a.as_f64(),
                });
            }
        }
        for (channel, &b) in offset.iter().enumerate() {
            if !b.is_finite() {
                return Err(NlmError::InvalidNoiseOffset {
                    channel,
                    value: b.as_f64(),
                });
            }
        }
        Ok(Self { cfa, gain, offset })
    }

    /// Same gain and offset for every channel.
    pub fn uniform(cfa: CfaLayout, a: F, b: F) -> Result<Self, NlmError> {
        let n = cfa.channel_count();
        Self::new(cfa, vec![a; n], vec![b; n])
    }

    /// Pure Poisson noise (`a = 1`, `b = 0`), used when no camera profile is known.
    pub fn poissonian(cfa: CfaLayout) -> Self {
        let n = cfa.channel_count();
        Self {
            cfa,
            gain: vec![F::one(); n],
            offset: vec![F::zero(); n],
        }
    }

    #[inline]
    pub fn cfa(&self) -> CfaLayout {
        self.cfa
    }

    /// `(a[c], b[c])` for channel `c`.
    #[inline]
    pub fn params(&self, channel: usize) -> (F, F) {
        (self.gain[channel], self.offset[channel])
    }

    /// `(a, b)` for the channel of pixel `(x, y)`.
    #[inline]
    pub fn params_at(&self, x: usize, y: usize) -> (F, F) {
        self.params(self.cfa.channel_index(x, y))
    }

    pub fn gains(&self) -> &[F] {
        &self.gain
    }

    pub fn offsets(&self) -> &[F] {
        &self.offset
    }
}
