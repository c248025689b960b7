//! Weighted-average accumulation across shift vectors.

use ndarray::{Array2, ArrayView2, ArrayViewMut2, Axis, Zip};

use crate::float_trait::NlmFloat;
use crate::patch_distance::ValidRegion;
use crate::shift::Shift;
use crate::weight::WeightKernel;

/// `value_acc` and `weight_acc` for one denoise call.
///
/// Both start at zero and only ever grow; accumulation is a plain sum, so the
/// result does not depend on the order shifts or bands are visited in.
#[derive(Debug, Clone)]
pub struct AccumulationBuffers<F: NlmFloat> {
    pub(crate) value: Array2<F>,
    pub(crate) weight: Array2<F>,
}

impl<F: NlmFloat> AccumulationBuffers<F> {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            value: Array2::zeros((rows, cols)),
            weight: Array2::zeros((rows, cols)),
        }
    }

    /// Contribution of the zero shift: every pixel matches itself with
    /// weight exactly 1, whether or not its patch fits inside the frame.
    pub fn add_identity(&mut self, stabilized: ArrayView2<F>) {
        Zip::from(&mut self.value)
            .and(&mut self.weight)
            .and(stabilized)
            .for_each(|v, w, &z| {
                *v += z;
                *w += F::one();
            });
    }

    pub fn value(&self) -> ArrayView2<'_, F> {
        self.value.view()
    }

    pub fn weight(&self) -> ArrayView2<'_, F> {
        self.weight.view()
    }

    /// `value_acc / weight_acc`, the denoised frame in the stabilized domain.
    pub fn normalize(&self) -> Array2<F> {
        Zip::from(&self.value)
            .and(&self.weight)
            .map_collect(|&v, &w| v / w)
    }

    /// Split both buffers into matching row bands for parallel accumulation.
    pub(crate) fn bands_mut(
        &mut self,
        band_rows: usize,
    ) -> impl Iterator<Item = (ArrayViewMut2<'_, F>, ArrayViewMut2<'_, F>)> {
        self.value
            .axis_chunks_iter_mut(Axis(0), band_rows)
            .zip(self.weight.axis_chunks_iter_mut(Axis(0), band_rows))
    }
}

/// Add one shift's weighted candidates to the rows of a band.
///
/// `distances`, `value` and `weight` all hold frame rows
/// `band_start..band_start + value.nrows()`. Only pixels inside `region`
/// receive a contribution.
#[allow(clippy::too_many_arguments)]
pub fn accumulate_band<F: NlmFloat>(
    stabilized: ArrayView2<F>,
    distances: ArrayView2<F>,
    region: &ValidRegion,
    shift: Shift,
    kernel: &WeightKernel<F>,
    band_start: usize,
    mut value: ArrayViewMut2<F>,
    mut weight: ArrayViewMut2<F>,
) {
    let band_end = band_start + value.nrows();
    let y_lo = band_start.max(region.y_start);
    let y_hi = band_end.min(region.y_end);

    for y in y_lo..y_hi {
        let local = y - band_start;
        let candidates = stabilized.row(y.wrapping_add_signed(shift.dy));
        let dist_row = distances.row(local);
        let mut value_row = value.row_mut(local);
        let mut weight_row = weight.row_mut(local);
        for x in region.x_start..region.x_end {
            let w = kernel.weight(dist_row[x]);
            value_row[x] += w * candidates[x.wrapping_add_signed(shift.dx)];
            weight_row[x] += w;
        }
    }
}
