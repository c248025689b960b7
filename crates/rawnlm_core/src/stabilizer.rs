//! Generalized Anscombe variance stabilization.
//!
//! The forward transform maps Poisson-Gaussian sensor noise to approximately
//! unit-variance Gaussian noise, so a single filter strength `h` applies to
//! every signal level and every CFA channel. The inverse is the closed-form
//! approximation of the exact unbiased inverse (Makitalo & Foi).

use ndarray::{Array2, ArrayView2, Axis};
use rayon::prelude::*;

use crate::float_trait::NlmFloat;
use crate::frame::RawSample;
use crate::noise_model::NoiseModel;

/// Rows below this count are transformed sequentially.
const PARALLEL_ROW_THRESHOLD: usize = 64;

/// Forward transform of one sample: `2 * sqrt(max(0, (raw - b) / a + 3/8))`.
#[inline]
pub fn forward<F: NlmFloat>(raw: F, a: F, b: F) -> F {
    let term = (raw - b) / a + F::from_f64_c(0.375);
    if term > F::zero() {
        F::from_f64_c(2.0) * term.sqrt()
    } else {
        F::zero()
    }
}

/// Exact unbiased inverse of [`forward`]; `z <= 0` maps to the offset `b`.
#[inline]
pub fn inverse<F: NlmFloat>(z: F, a: F, b: F) -> F {
    if z <= F::zero() {
        return b;
    }
    let z_inv = F::one() / z;
    let z_inv2 = z_inv * z_inv;
    let z_inv3 = z_inv2 * z_inv;
    let x = F::from_f64_c(0.25) * z * z + F::from_f64_c(0.25) * F::SQRT_3_2 * z_inv
        - F::from_f64_c(11.0 / 8.0) * z_inv2
        + F::from_f64_c(5.0 / 8.0) * F::SQRT_3_2 * z_inv3
        - F::from_f64_c(0.125);
    a * x + b
}

/// Apply [`forward`] to every sample with the parameters of its CFA channel.
pub fn stabilize_frame<S: RawSample, F: NlmFloat>(
    samples: ArrayView2<S>,
    model: &NoiseModel<F>,
) -> Array2<F> {
    let (rows, cols) = samples.dim();
    let mut output = Array2::zeros((rows, cols));

    let transform_row = |y: usize, out_row: &mut [F]| {
        let in_row = samples.row(y);
        for (x, (out, &raw)) in out_row.iter_mut().zip(in_row.iter()).enumerate() {
            let (a, b) = model.params_at(x, y);
            *out = forward(F::from_f64_c(raw.to_signal()), a, b);
        }
    };

    if rows >= PARALLEL_ROW_THRESHOLD {
        let output_rows: Vec<_> = output.axis_iter_mut(Axis(0)).collect();
        output_rows
            .into_par_iter()
            .enumerate()
            .for_each(|(y, mut out_row)| {
                if let Some(slice) = out_row.as_slice_mut() {
                    transform_row(y, slice);
                }
            });
    } else {
        for (y, mut out_row) in output.axis_iter_mut(Axis(0)).enumerate() {
            if let Some(slice) = out_row.as_slice_mut() {
                transform_row(y, slice);
            }
        }
    }

    output
}

/// Apply [`inverse`] to every value and convert back to the raw sample type,
/// clamping to the sample range.
pub fn destabilize_frame<S: RawSample, F: NlmFloat>(
    stabilized: ArrayView2<F>,
    model: &NoiseModel<F>,
) -> Array2<S> {
    let (rows, cols) = stabilized.dim();
    let mut output = Array2::from_elem((rows, cols), S::from_signal(0.0));

    let transform_row = |y: usize, out_row: &mut [S]| {
        let in_row = stabilized.row(y);
        for (x, (out, &z)) in out_row.iter_mut().zip(in_row.iter()).enumerate() {
            let (a, b) = model.params_at(x, y);
            *out = S::from_signal(inverse(z, a, b).as_f64());
        }
    };

    if rows >= PARALLEL_ROW_THRESHOLD {
        let output_rows: Vec<_> = output.axis_iter_mut(Axis(0)).collect();
        output_rows
            .into_par_iter()
            .enumerate()
            .for_each(|(y, mut out_row)| {
                if let Some(slice) = out_row.as_slice_mut() {
                    transform_row(y, slice);
                }
            });
    } else {
        for (y, mut out_row) in output.axis_iter_mut(Axis(0)).enumerate() {
            if let Some(slice) = out_row.as_slice_mut() {
                transform_row(y, slice);
            }
        }
    }

    output
}
