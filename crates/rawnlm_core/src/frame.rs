//! Raw sample types and the borrowed, strided mosaiced frame.

use ndarray::{ArrayView2, ShapeBuilder};

use crate::cfa::CfaLayout;
use crate::error::NlmError;

/// Storage type of a raw sensor sample.
///
/// Conversions go through f64 so both integer and float sensors share one
/// stabilization path. `from_signal` clamps to the representable range.
pub trait RawSample: Copy + Send + Sync + 'static {
    /// Smallest valid sample value.
    const MIN_SIGNAL: f64;
    /// Largest valid sample value.
    const MAX_SIGNAL: f64;

    fn to_signal(self) -> f64;

    fn from_signal(value: f64) -> Self;
}

impl RawSample for u16 {
    const MIN_SIGNAL: f64 = 0.0;
    const MAX_SIGNAL: f64 = u16::MAX as f64;

    #[inline]
    fn to_signal(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_signal(value: f64) -> Self {
        // NaN casts to 0.
        value.round().clamp(Self::MIN_SIGNAL, Self::MAX_SIGNAL) as u16
    }
}

impl RawSample for f32 {
    const MIN_SIGNAL: f64 = 0.0;
    const MAX_SIGNAL: f64 = f32::MAX as f64;

    #[inline]
    fn to_signal(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_signal(value: f64) -> Self {
        if value.is_nan() {
            return 0.0;
        }
        value.clamp(Self::MIN_SIGNAL, Self::MAX_SIGNAL) as f32
    }
}

/// A single-channel mosaiced frame borrowed from the caller.
///
/// Rows may be padded: the view carries the caller's row stride, and the
/// engine only ever reads `width` samples per row.
#[derive(Debug, Clone, Copy)]
pub struct RawFrame<'a, S: RawSample> {
    samples: ArrayView2<'a, S>,
    cfa: CfaLayout,
}

impl<'a, S: RawSample> RawFrame<'a, S> {
    /// Wrap an existing `(height, width)` view.
    pub fn new(samples: ArrayView2<'a, S>, cfa: CfaLayout) -> Self {
        Self { samples, cfa }
    }

    /// Wrap a tightly packed row-major buffer.
    pub fn from_slice(
        data: &'a [S],
        width: usize,
        height: usize,
        cfa: CfaLayout,
    ) -> Result<Self, NlmError> {
        Self::from_strided(data, width, height, width, cfa)
    }

    /// Wrap a row-major buffer whose rows start `stride` samples apart.
    pub fn from_strided(
        data: &'a [S],
        width: usize,
        height: usize,
        stride: usize,
        cfa: CfaLayout,
    ) -> Result<Self, NlmError> {
        if stride < width {
            return Err(NlmError::InvalidStride { stride, width });
        }
        let expected = if height == 0 || width == 0 {
            0
        } else {
            (height - 1) * stride + width
        };
        if data.len() < expected {
            return Err(NlmError::BufferTooShort {
                expected,
                got: data.len(),
            });
        }
        let samples = ArrayView2::from_shape((height, width).strides((stride, 1)), data)
            .map_err(|_| NlmError::BufferTooShort {
                expected,
                got: data.len(),
            })?;
        Ok(Self { samples, cfa })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.samples.ncols()
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.samples.nrows()
    }

    #[inline]
    pub fn cfa(&self) -> CfaLayout {
        self.cfa
    }

    /// The `(height, width)` sample view.
    #[inline]
    pub fn view(&self) -> ArrayView2<'a, S> {
        self.samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u16_conversion_rounds_and_clamps() {
        assert_eq!(u16::from_signal(12.4), 12);
        assert_eq!(u16::from_signal(12.6), 13);
        assert_eq!(u16::from_signal(-40.0), 0);
        assert_eq!(u16::from_signal(70_000.0), u16::MAX);
        assert_eq!(u16::from_signal(f64::NAN), 0);
        assert_eq!(513u16.to_signal(), 513.0);
    }

    #[test]
    fn test_f32_conversion_clamps_below_zero() {
        assert_eq!(f32::from_signal(-0.25), 0.0);
        assert_eq!(f32::from_signal(0.75), 0.75);
        assert_eq!(f32::from_signal(f64::NAN), 0.0);
    }

    #[test]
    fn test_strided_frame_skips_padding() {
        // 3x2 frame stored with stride 4; the 4th column is padding.
        let data: Vec<u16> = vec![1, 2, 3, 99, 4, 5, 6];
        let frame = RawFrame::from_strided(&data, 3, 2, 4, CfaLayout::bayer()).unwrap();
        assert_eq!(frame.width(), 3);
        assert_eq!(frame.height(), 2);
        let view = frame.view();
        assert_eq!(view[[0, 2]], 3);
        assert_eq!(view[[1, 0]], 4);
        assert_eq!(view[[1, 2]], 6);
    }

    #[test]
    fn test_rejects_malformed_buffers() {
        let data = vec![0u16; 10];
        assert_eq!(
            RawFrame::from_strided(&data, 4, 2, 3, CfaLayout::bayer()).unwrap_err(),
            NlmError::InvalidStride {
                stride: 3,
                width: 4
            }
        );
        assert_eq!(
            RawFrame::from_slice(&data, 4, 3, CfaLayout::bayer()).unwrap_err(),
            NlmError::BufferTooShort {
                expected: 12,
                got: 10
            }
        );
    }
}
