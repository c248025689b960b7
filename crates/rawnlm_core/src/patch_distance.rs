//! Sliding-window patch distances for one shift vector.
//!
//! For a shift `s` the distance of pixel `p` is the mean over its patch of
//! `(z(p + o) - z(p + s + o))^2`, with patch offsets `o` stepping by the CFA
//! period so only same-channel samples are compared.
//!
//! Evaluated naively this is `O(R^2)` per pixel. Instead we square the
//! per-pixel differences once per shift and keep two running sums:
//! - along a row, `H(x) = H(x - P) + d(x + R*P) - d(x - (R + 1)*P)`
//! - across rows, `C(y) = C(y - P) + H(y + R*P) - H(y - (R + 1)*P)`
//!
//! so each pixel costs two horizontal updates and one vertical update
//! regardless of the patch radius. Both recurrences have lag `P` because the
//! patch only contains every `P`-th sample; rows of one residue class mod `P`
//! form an independent chain.

use ndarray::{s, Array2, ArrayView1, ArrayView2, ArrayViewMut2, Axis};
use rayon::prelude::*;

use crate::float_trait::NlmFloat;
use crate::shift::Shift;

/// Patch radius together with the CFA period it steps by.
///
/// `R * P` and `(2R + 1)^2` are assumed not to overflow; the kernel caps `R`
/// at the frame size first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchGeometry {
    pub radius: usize,
    pub period: usize,
}

impl PatchGeometry {
    pub fn new(radius: usize, period: usize) -> Self {
        Self { radius, period }
    }

    /// Distance in pixels from the patch center to its outermost sample.
    #[inline]
    pub fn span(&self) -> usize {
        self.radius * self.period
    }

    /// Number of samples in a patch, `(2R + 1)^2`.
    #[inline]
    pub fn pixel_count(&self) -> usize {
        let side = 2 * self.radius + 1;
        side * side
    }
}

/// Pixels for which a shift contributes: both the patch around `p` and the
/// patch around `p + s` lie entirely inside the frame.
///
/// Ranges are half-open. Pixels outside the region are skipped for this
/// shift rather than compared against padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidRegion {
    pub x_start: usize,
    pub x_end: usize,
    pub y_start: usize,
    pub y_end: usize,
}

impl ValidRegion {
    /// `None` when no pixel of a `width x height` frame can use `shift`.
    pub fn for_shift(
        width: usize,
        height: usize,
        shift: Shift,
        geometry: PatchGeometry,
    ) -> Option<Self> {
        let (x_start, x_end) = axis_range(width, shift.dx, geometry.span())?;
        let (y_start, y_end) = axis_range(height, shift.dy, geometry.span())?;
        Some(Self {
            x_start,
            x_end,
            y_start,
            y_end,
        })
    }

    #[inline]
    pub fn contains(&self, x: usize, y: usize) -> bool {
        (self.x_start..self.x_end).contains(&x) && (self.y_start..self.y_end).contains(&y)
    }

    pub fn pixel_count(&self) -> usize {
        (self.x_end - self.x_start) * (self.y_end - self.y_start)
    }
}

fn axis_range(len: usize, delta: isize, span: usize) -> Option<(usize, usize)> {
    let start = span + delta.min(0).unsigned_abs();
    let trim = span + delta.max(0).unsigned_abs();
    let end = len.checked_sub(trim)?;
    (start < end).then_some((start, end))
}

/// Per-band scratch for the two running sums.
///
/// One instance is owned by each band task and handed to it explicitly; it is
/// never shared between tasks.
#[derive(Debug, Clone)]
pub struct RowScratch<F: NlmFloat> {
    row_sum: Vec<F>,
    column_sum: Vec<F>,
}

impl<F: NlmFloat> RowScratch<F> {
    pub fn new(width: usize) -> Self {
        Self {
            row_sum: vec![F::zero(); width],
            column_sum: vec![F::zero(); width],
        }
    }

    fn reset(&mut self) {
        self.row_sum.fill(F::zero());
        self.column_sum.fill(F::zero());
    }
}

/// Write `(z(p) - z(p + s))^2` for every pixel any patch of `region` reads.
///
/// Cells outside that support are left untouched and never read.
pub fn fill_squared_differences<F: NlmFloat>(
    stabilized: ArrayView2<F>,
    shift: Shift,
    region: &ValidRegion,
    geometry: PatchGeometry,
    diff: &mut Array2<F>,
) {
    let span = geometry.span();
    let (y0, y1) = (region.y_start - span, region.y_end + span);
    let (x0, x1) = (region.x_start - span, region.x_end + span);

    let mut support = diff.slice_mut(s![y0..y1, ..]);
    let rows: Vec<_> = support.axis_iter_mut(Axis(0)).collect();
    rows.into_par_iter().enumerate().for_each(|(i, mut out_row)| {
        let y = y0 + i;
        let ys = y.wrapping_add_signed(shift.dy);
        let row = stabilized.row(y);
        let shifted_row = stabilized.row(ys);
        for x in x0..x1 {
            let d = row[x] - shifted_row[x.wrapping_add_signed(shift.dx)];
            out_row[x] = d * d;
        }
    });
}

/// Horizontal patch sums of one squared-difference row over `x_start..x_end`.
fn horizontal_sums<F: NlmFloat>(
    diff_row: ArrayView1<F>,
    x_start: usize,
    x_end: usize,
    geometry: PatchGeometry,
    out: &mut [F],
) {
    let period = geometry.period;
    let span = geometry.span();
    let lead_end = (x_start + period).min(x_end);

    for x in x_start..lead_end {
        let mut sum = F::zero();
        for j in 0..=2 * geometry.radius {
            sum += diff_row[x - span + j * period];
        }
        out[x] = sum;
    }
    for x in lead_end..x_end {
        out[x] = out[x - period] + diff_row[x + span] - diff_row[x - span - period];
    }
}

/// Compute normalized patch distances for the rows of one band.
///
/// `distances` holds frame rows `band_start..band_start + distances.nrows()`.
/// Only cells inside `region` are written.
///
/// Each row chain (rows congruent mod P) starts with a full rebuild of the
/// column sum from `2R + 1` horizontal passes. The previous row's column
/// state is reused only when that row lies inside both the band and the
/// region, i.e. its patch was not clipped by the frame edge or the shift.
pub fn fill_band_distances<F: NlmFloat>(
    diff: ArrayView2<F>,
    region: &ValidRegion,
    geometry: PatchGeometry,
    band_start: usize,
    mut distances: ArrayViewMut2<F>,
    scratch: &mut RowScratch<F>,
) {
    let band_end = band_start + distances.nrows();
    let y_lo = band_start.max(region.y_start);
    let y_hi = band_end.min(region.y_end);
    if y_lo >= y_hi {
        return;
    }

    let period = geometry.period;
    let span = geometry.span();
    let (x_start, x_end) = (region.x_start, region.x_end);
    let inv_count = F::one() / F::usize_as(geometry.pixel_count());

    scratch.reset();
    let RowScratch {
        row_sum,
        column_sum,
    } = scratch;

    for chain_start in y_lo..(y_lo + period).min(y_hi) {
        // Rebuild: patch rows of `chain_start` from scratch.
        column_sum[x_start..x_end].fill(F::zero());
        for j in 0..=2 * geometry.radius {
            let yy = chain_start - span + j * period;
            horizontal_sums(diff.row(yy), x_start, x_end, geometry, &mut row_sum[..]);
            for x in x_start..x_end {
                column_sum[x] += row_sum[x];
            }
        }
        write_distance_row(
            &mut distances,
            chain_start - band_start,
            &column_sum[..],
            x_start,
            x_end,
            inv_count,
        );

        let mut y = chain_start + period;
        while y < y_hi {
            horizontal_sums(diff.row(y + span), x_start, x_end, geometry, &mut row_sum[..]);
            for x in x_start..x_end {
                column_sum[x] += row_sum[x];
            }
            horizontal_sums(diff.row(y - span - period), x_start, x_end, geometry, &mut row_sum[..]);
            for x in x_start..x_end {
                column_sum[x] -= row_sum[x];
            }
            write_distance_row(
                &mut distances,
                y - band_start,
                &column_sum[..],
                x_start,
                x_end,
                inv_count,
            );
            y += period;
        }
    }
}

#[inline]
fn write_distance_row<F: NlmFloat>(
    distances: &mut ArrayViewMut2<F>,
    local_row: usize,
    column_sum: &[F],
    x_start: usize,
    x_end: usize,
    inv_count: F,
) {
    let mut row = distances.row_mut(local_row);
    for x in x_start..x_end {
        row[x] = column_sum[x] * inv_count;
    }
}

/// Reference `O(R^2)` distance of pixel `(x, y)` under `shift`.
///
/// Returns `None` when either patch leaves the frame.
pub fn brute_force_distance<F: NlmFloat>(
    stabilized: ArrayView2<F>,
    shift: Shift,
    geometry: PatchGeometry,
    x: usize,
    y: usize,
) -> Option<F> {
    let (rows, cols) = stabilized.dim();
    let region = ValidRegion::for_shift(cols, rows, shift, geometry)?;
    if !region.contains(x, y) {
        return None;
    }

    let span = geometry.span();
    let mut sum = F::zero();
    for j in 0..=2 * geometry.radius {
        let yy = y - span + j * geometry.period;
        let ys = yy.wrapping_add_signed(shift.dy);
        for i in 0..=2 * geometry.radius {
            let xx = x - span + i * geometry.period;
            let xs = xx.wrapping_add_signed(shift.dx);
            let d = stabilized[[yy, xx]] - stabilized[[ys, xs]];
            sum += d * d;
        }
    }
    Some(sum / F::usize_as(geometry.pixel_count()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shift::ShiftScanner;

    struct SimpleLcg {
        state: u64,
    }

    impl SimpleLcg {
        fn new(seed: u64) -> Self {
            Self { state: seed }
        }

        fn next_f64(&mut self) -> f64 {
            self.state = self.state.wrapping_mul(6364136223846793005).wrapping_add(1);
            (self.state >> 11) as f64 / (1u64 << 53) as f64
        }
    }

    // Stabilized-domain test frame: smooth ramp plus deterministic noise.
    fn synthetic_frame(rows: usize, cols: usize, seed: u64) -> Array2<f64> {
        let mut rng = SimpleLcg::new(seed);
        Array2::from_shape_fn((rows, cols), |(r, c)| {
            20.0 + 0.3 * r as f64 + 0.2 * c as f64 + 4.0 * rng.next_f64()
        })
    }

    fn sliding_distances(
        stabilized: &Array2<f64>,
        shift: Shift,
        geometry: PatchGeometry,
        band_rows: usize,
    ) -> Option<(ValidRegion, Array2<f64>)> {
        let (rows, cols) = stabilized.dim();
        let region = ValidRegion::for_shift(cols, rows, shift, geometry)?;
        let mut diff = Array2::zeros((rows, cols));
        fill_squared_differences(stabilized.view(), shift, &region, geometry, &mut diff);

        let mut distances = Array2::from_elem((rows, cols), f64::NAN);
        let mut scratch = RowScratch::new(cols);
        for (band_idx, band) in distances
            .axis_chunks_iter_mut(Axis(0), band_rows)
            .enumerate()
        {
            fill_band_distances(
                diff.view(),
                &region,
                geometry,
                band_idx * band_rows,
                band,
                &mut scratch,
            );
        }
        Some((region, distances))
    }

    fn assert_matches_brute_force(
        stabilized: &Array2<f64>,
        shift: Shift,
        geometry: PatchGeometry,
        band_rows: usize,
    ) {
        let Some((region, distances)) = sliding_distances(stabilized, shift, geometry, band_rows)
        else {
            return;
        };
        for y in region.y_start..region.y_end {
            for x in region.x_start..region.x_end {
                let expected = brute_force_distance(stabilized.view(), shift, geometry, x, y)
                    .expect("pixel inside region");
                let got = distances[[y, x]];
                let tol = 1e-5 * expected.abs().max(1.0);
                assert!(
                    (got - expected).abs() <= tol,
                    "R={} shift={:?} band_rows={} pixel ({}, {}): sliding {} vs brute force {}",
                    geometry.radius,
                    shift,
                    band_rows,
                    x,
                    y,
                    got,
                    expected
                );
            }
        }
    }

    #[test]
    fn test_region_for_bayer_shift() {
        let geometry = PatchGeometry::new(1, 2);
        let region = ValidRegion::for_shift(16, 12, Shift { dx: 2, dy: -4 }, geometry).unwrap();
        assert_eq!(region.x_start, 2);
        assert_eq!(region.x_end, 16 - 2 - 2);
        assert_eq!(region.y_start, 2 + 4);
        assert_eq!(region.y_end, 12 - 2);
        assert_eq!(region.pixel_count(), 10 * 4);
    }

    #[test]
    fn test_region_empty_when_shift_too_large() {
        let geometry = PatchGeometry::new(1, 2);
        assert!(ValidRegion::for_shift(8, 8, Shift { dx: 6, dy: 0 }, geometry).is_none());
        assert!(ValidRegion::for_shift(4, 4, Shift::ZERO, PatchGeometry::new(2, 2)).is_none());
        assert!(ValidRegion::for_shift(0, 0, Shift::ZERO, PatchGeometry::new(0, 2)).is_none());
    }

    #[test]
    fn test_sliding_matches_brute_force_bayer() {
        let stabilized = synthetic_frame(40, 44, 7);
        for radius in [0usize, 1, 2, 5] {
            let geometry = PatchGeometry::new(radius, 2);
            for shift in ShiftScanner::new(2, 2).iter() {
                assert_matches_brute_force(&stabilized, shift, geometry, 64);
            }
        }
    }

    #[test]
    fn test_sliding_matches_brute_force_across_bands() {
        // Small bands force chain rebuilds at every band boundary.
        let stabilized = synthetic_frame(37, 30, 11);
        for radius in [0usize, 1, 2, 5] {
            let geometry = PatchGeometry::new(radius, 2);
            for band_rows in [1usize, 3, 8] {
                assert_matches_brute_force(&stabilized, Shift { dx: -2, dy: 4 }, geometry, band_rows);
                assert_matches_brute_force(&stabilized, Shift { dx: 4, dy: -2 }, geometry, band_rows);
            }
        }
    }

    #[test]
    fn test_sliding_matches_brute_force_xtrans() {
        let stabilized = synthetic_frame(48, 54, 23);
        for radius in [0usize, 1, 2] {
            let geometry = PatchGeometry::new(radius, 6);
            for shift in ShiftScanner::new(1, 6).iter() {
                assert_matches_brute_force(&stabilized, shift, geometry, 16);
            }
        }
    }

    #[test]
    fn test_zero_shift_has_zero_distance() {
        let stabilized = synthetic_frame(20, 20, 3);
        let geometry = PatchGeometry::new(2, 2);
        let (region, distances) = sliding_distances(&stabilized, Shift::ZERO, geometry, 64).unwrap();
        for y in region.y_start..region.y_end {
            for x in region.x_start..region.x_end {
                assert_eq!(distances[[y, x]], 0.0);
            }
        }
    }

    #[test]
    fn test_cells_outside_region_are_not_written() {
        let stabilized = synthetic_frame(24, 24, 5);
        let geometry = PatchGeometry::new(1, 2);
        let shift = Shift { dx: 2, dy: 2 };
        let (region, distances) = sliding_distances(&stabilized, shift, geometry, 5).unwrap();
        for ((y, x), &d) in distances.indexed_iter() {
            assert_eq!(region.contains(x, y), !d.is_nan(), "pixel ({}, {})", x, y);
        }
    }

    #[test]
    fn test_brute_force_skips_clipped_pixels() {
        let stabilized = synthetic_frame(10, 10, 1);
        let geometry = PatchGeometry::new(1, 2);
        let shift = Shift { dx: 2, dy: 0 };
        assert!(brute_force_distance(stabilized.view(), shift, geometry, 1, 5).is_none());
        assert!(brute_force_distance(stabilized.view(), shift, geometry, 6, 5).is_none());
        assert!(brute_force_distance(stabilized.view(), shift, geometry, 5, 5).is_some());
    }

    #[test]
    fn test_sliding_f32_close_to_brute_force() {
        let stabilized = synthetic_frame(32, 32, 17).mapv(|v| v as f32);
        let geometry = PatchGeometry::new(2, 2);
        let shift = Shift { dx: -2, dy: 2 };
        let (rows, cols) = stabilized.dim();
        let region = ValidRegion::for_shift(cols, rows, shift, geometry).unwrap();
        let mut diff = Array2::zeros((rows, cols));
        fill_squared_differences(stabilized.view(), shift, &region, geometry, &mut diff);
        let mut distances = Array2::zeros((rows, cols));
        let mut scratch = RowScratch::new(cols);
        fill_band_distances(diff.view(), &region, geometry, 0, distances.view_mut(), &mut scratch);

        for y in region.y_start..region.y_end {
            for x in region.x_start..region.x_end {
                let expected = brute_force_distance(stabilized.view(), shift, geometry, x, y).unwrap();
                let got = distances[[y, x]];
                assert!(
                    (got - expected).abs() <= 1e-3 * expected.abs().max(1.0),
                    "pixel ({}, {}): {} vs {}",
                    x,
                    y,
                    got,
                    expected
                );
            }
        }
    }
}
