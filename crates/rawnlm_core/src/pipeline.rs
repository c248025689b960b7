//! NL-means kernel: shift loop, banded distance computation and accumulation.

use ndarray::{Array2, ArrayView2, Axis};
use rayon::prelude::*;
use std::time::Instant;

use crate::accumulation::{accumulate_band, AccumulationBuffers};
use crate::cfa::CfaLayout;
use crate::float_trait::NlmFloat;
use crate::patch_distance::{
    fill_band_distances, fill_squared_differences, PatchGeometry, RowScratch, ValidRegion,
};
use crate::shift::ShiftScanner;
use crate::weight::WeightKernel;

// =============================================================================
// Constants for the NL-means kernel
// =============================================================================

/// Default number of frame rows handled by one parallel band task.
///
/// Band boundaries are where the vertical running sum is rebuilt, so this is
/// fixed rather than derived from the thread count to keep output identical
/// across pool sizes.
pub const DEFAULT_BAND_ROWS: usize = 64;
const BAND_ROWS_ENV: &str = "RAWNLM_BAND_ROWS";
const PROFILE_TIMING_ENV: &str = "RAWNLM_PROFILE_TIMING";

/// Validated kernel parameters, shared by every band task.
#[derive(Debug, Clone, Copy)]
pub struct NlmKernelConfig<F: NlmFloat> {
    pub patch_radius: usize,
    pub neighborhood_radius: usize,
    pub weight_kernel: WeightKernel<F>,
    pub band_rows: usize,
}

/// Resolve band height from the environment with a safe fallback.
pub(crate) fn resolve_band_rows() -> usize {
    parse_band_rows(std::env::var(BAND_ROWS_ENV).ok().as_deref())
}

pub(crate) fn resolve_profile_timing() -> bool {
    parse_flag(std::env::var(PROFILE_TIMING_ENV).ok().as_deref())
}

fn parse_band_rows(value: Option<&str>) -> usize {
    value
        .and_then(|s| s.trim().parse::<usize>().ok())
        .filter(|&v| v > 0)
        .unwrap_or(DEFAULT_BAND_ROWS)
}

fn parse_flag(value: Option<&str>) -> bool {
    value
        .map(|value| {
            let v = value.trim();
            v == "1"
                || v.eq_ignore_ascii_case("true")
                || v.eq_ignore_ascii_case("yes")
                || v.eq_ignore_ascii_case("on")
        })
        .unwrap_or(false)
}

/// Cap a radius (in CFA cells) at the smallest value whose reach already
/// exceeds `extent` pixels. Shifts and patches past that never fit in the
/// frame, so the result is unchanged.
fn clamp_radius(radius: usize, period: usize, extent: usize) -> usize {
    radius.min(extent / period + 1)
}

#[derive(Default, Clone, Copy)]
struct KernelStageStats {
    shifts_applied: usize,
    shifts_skipped: usize,
    pixel_contributions: u64,
    difference_ns: u128,
    band_ns: u128,
}

/// Run the NL-means kernel on a stabilized frame.
///
/// The zero shift is added first for every pixel; every other shift from the
/// scanner is then processed one at a time. Within a shift, the squared
/// difference field is built row-parallel, after which fixed-height bands
/// compute their distances and accumulate in parallel, each with its own
/// [`RowScratch`].
pub fn run_nlm_kernel<F: NlmFloat>(
    stabilized: ArrayView2<F>,
    cfa: CfaLayout,
    config: &NlmKernelConfig<F>,
) -> AccumulationBuffers<F> {
    let (rows, cols) = stabilized.dim();
    let period = cfa.period();
    let extent = rows.max(cols);
    let patch_radius = clamp_radius(config.patch_radius, period, extent);
    let neighborhood_radius = clamp_radius(config.neighborhood_radius, period, extent);
    let geometry = PatchGeometry::new(patch_radius, period);
    let scanner = ShiftScanner::new(neighborhood_radius, period);
    let kernel = config.weight_kernel;
    let band_rows = config.band_rows.max(1);
    let band_count = rows.div_ceil(band_rows);
    let profile_timing = resolve_profile_timing();

    let mut acc = AccumulationBuffers::new(rows, cols);
    acc.add_identity(stabilized);

    // Transient per-call buffers, reused across shifts.
    let mut diff = Array2::<F>::zeros((rows, cols));
    let mut distances = Array2::<F>::zeros((rows, cols));
    let mut scratches: Vec<RowScratch<F>> =
        (0..band_count).map(|_| RowScratch::new(cols)).collect();

    let mut stats = KernelStageStats::default();

    for shift in scanner.iter() {
        if shift.is_zero() {
            continue;
        }
        let Some(region) = ValidRegion::for_shift(cols, rows, shift, geometry) else {
            stats.shifts_skipped += 1;
            continue;
        };

        let started = profile_timing.then(Instant::now);
        fill_squared_differences(stabilized, shift, &region, geometry, &mut diff);
        if let Some(t) = started {
            stats.difference_ns += t.elapsed().as_nanos();
        }

        let started = profile_timing.then(Instant::now);
        let diff_view = diff.view();
        let tasks: Vec<_> = distances
            .axis_chunks_iter_mut(Axis(0), band_rows)
            .zip(acc.bands_mut(band_rows))
            .zip(scratches.iter_mut())
            .enumerate()
            .collect();

        tasks
            .into_par_iter()
            .for_each(|(band_idx, ((mut band_distances, (value, weight)), scratch))| {
                let band_start = band_idx * band_rows;
                fill_band_distances(
                    diff_view,
                    &region,
                    geometry,
                    band_start,
                    band_distances.view_mut(),
                    scratch,
                );
                accumulate_band(
                    stabilized,
                    band_distances.view(),
                    &region,
                    shift,
                    &kernel,
                    band_start,
                    value,
                    weight,
                );
            });
        if let Some(t) = started {
            stats.band_ns += t.elapsed().as_nanos();
        }

        stats.shifts_applied += 1;
        stats.pixel_contributions += region.pixel_count() as u64;
    }

    tracing::debug!(
        rows,
        cols,
        period,
        patch_radius,
        neighborhood_radius,
        band_rows,
        band_count,
        shifts_applied = stats.shifts_applied,
        shifts_skipped = stats.shifts_skipped,
        pixel_contributions = stats.pixel_contributions,
        "nlm kernel finished"
    );
    if profile_timing {
        tracing::info!(
            difference_ms = stats.difference_ns as f64 / 1_000_000.0,
            band_ms = stats.band_ns as f64 / 1_000_000.0,
            "nlm kernel profile"
        );
    }

    acc
}
