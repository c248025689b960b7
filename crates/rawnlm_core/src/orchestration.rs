//! Raw-domain NL-means denoising pipeline
//!
//! Runs the full chain on one CFA frame:
//! - Variance stabilization with the per-channel noise model
//! - Same-channel non-local means in the stabilized domain
//! - Normalization and inverse stabilization back to raw samples
//!
//! All configuration and noise-model checks happen before any pixel is
//! touched; a failed call produces no partial output.

use ndarray::Array2;
use std::time::Instant;

use crate::accumulation::AccumulationBuffers;
use crate::cfa::MAX_CFA_PERIOD;
use crate::error::NlmError;
use crate::float_trait::NlmFloat;
use crate::frame::{RawFrame, RawSample};
use crate::noise_model::NoiseModel;
use crate::pipeline::{resolve_band_rows, resolve_profile_timing, run_nlm_kernel, NlmKernelConfig};
use crate::shift::ShiftScanner;
use crate::stabilizer::{destabilize_frame, stabilize_frame};
use crate::weight::WeightKernel;

// =============================================================================
// Constants
// =============================================================================

/// Default patch radius in CFA cells
const DEFAULT_PATCH_RADIUS: usize = 4;

/// Default search neighborhood radius in CFA cells
const DEFAULT_NEIGHBORHOOD_RADIUS: usize = 4;

/// Default filter strength h
const DEFAULT_FILTER_STRENGTH: f64 = 1.0;

// =============================================================================
// Types
// =============================================================================

/// Configuration for raw NL-means denoising.
///
/// Use `Default::default()` for the standard settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NlmConfig<F: NlmFloat> {
    /// Patch radius R in CFA cells; patches are `(2R+1)^2` samples. Default: 4
    pub patch_radius: usize,
    /// Search radius N in CFA cells; `(2N+1)^2` shifts. Default: 4
    pub neighborhood_radius: usize,
    /// Filter strength h; larger values average more aggressively. Default: 1.0
    pub filter_strength: F,
    /// Rows per parallel band. `None` reads `RAWNLM_BAND_ROWS`, falling back
    /// to 64.
    pub band_rows: Option<usize>,
}

impl<F: NlmFloat> Default for NlmConfig<F> {
    fn default() -> Self {
        Self {
            patch_radius: DEFAULT_PATCH_RADIUS,
            neighborhood_radius: DEFAULT_NEIGHBORHOOD_RADIUS,
            filter_strength: F::from_f64_c(DEFAULT_FILTER_STRENGTH),
            band_rows: None,
        }
    }
}

impl<F: NlmFloat> NlmConfig<F> {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_patch_radius(mut self, patch_radius: usize) -> Self {
        self.patch_radius = patch_radius;
        self
    }

    pub fn with_neighborhood_radius(mut self, neighborhood_radius: usize) -> Self {
        self.neighborhood_radius = neighborhood_radius;
        self
    }

    pub fn with_filter_strength(mut self, filter_strength: F) -> Self {
        self.filter_strength = filter_strength;
        self
    }

    pub fn with_band_rows(mut self, band_rows: usize) -> Self {
        self.band_rows = Some(band_rows);
        self
    }

    /// Build a config from a host application's float parameters.
    ///
    /// Radii are truncated toward zero. Negative, non-finite or oversized
    /// radii and a non-positive `h` are rejected.
    pub fn from_host_params(
        patch_size: f32,
        neighborhood_size: f32,
        h: f32,
    ) -> Result<Self, NlmError> {
        let patch_radius = host_radius("patch_size", patch_size)?;
        let neighborhood_radius = host_radius("neighborhood_size", neighborhood_size)?;
        let filter_strength =
            F::from_f32(h).ok_or(NlmError::InvalidFilterStrength(f64::from(h)))?;
        let config = Self {
            patch_radius,
            neighborhood_radius,
            filter_strength,
            band_rows: None,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration parameters.
    ///
    /// Radii must keep `radius * MAX_CFA_PERIOD` within `isize` and
    /// `(2 * radius + 1)^2` within `usize`.
    pub fn validate(&self) -> Result<(), NlmError> {
        check_radius("patch_radius", self.patch_radius)?;
        check_radius("neighborhood_radius", self.neighborhood_radius)?;
        WeightKernel::new(self.filter_strength)?;
        if self.band_rows == Some(0) {
            return Err(NlmError::InvalidBandRows);
        }
        Ok(())
    }

    /// Band height actually used for a call.
    pub fn effective_band_rows(&self) -> usize {
        self.band_rows.unwrap_or_else(resolve_band_rows)
    }
}

fn check_radius(name: &'static str, radius: usize) -> Result<(), NlmError> {
    let span_fits = radius
        .checked_mul(MAX_CFA_PERIOD)
        .is_some_and(|span| isize::try_from(span).is_ok());
    let count_fits = radius
        .checked_mul(2)
        .and_then(|d| d.checked_add(1))
        .and_then(|side| side.checked_mul(side))
        .is_some();
    if span_fits && count_fits {
        Ok(())
    } else {
        Err(NlmError::InvalidRadius {
            name,
            value: radius as f64,
        })
    }
}

fn host_radius(name: &'static str, value: f32) -> Result<usize, NlmError> {
    if !value.is_finite() || value < 0.0 {
        return Err(NlmError::InvalidRadius {
            name,
            value: f64::from(value),
        });
    }
    Ok(value as usize)
}

/// Everything a denoise call produced, for callers that want to inspect the
/// stabilized domain.
#[derive(Debug, Clone)]
pub struct DenoiseOutput<S: RawSample, F: NlmFloat> {
    /// Denoised raw frame, same shape and sample type as the input.
    pub output: Array2<S>,
    /// Input after variance stabilization.
    pub stabilized: Array2<F>,
    /// Weighted sums and weight totals per pixel.
    pub accumulation: AccumulationBuffers<F>,
}

// =============================================================================
// Pipeline
// =============================================================================

fn check_inputs<S: RawSample, F: NlmFloat>(
    frame: &RawFrame<S>,
    model: &NoiseModel<F>,
    config: &NlmConfig<F>,
) -> Result<(), NlmError> {
    config.validate()?;
    let frame_period = frame.cfa().period();
    let model_period = model.cfa().period();
    if frame_period != model_period {
        return Err(NlmError::CfaMismatch {
            frame: frame_period,
            model: model_period,
        });
    }
    Ok(())
}

/// Denoise one raw CFA frame, returning intermediate buffers alongside the
/// result.
pub fn denoise_raw_detailed<S: RawSample, F: NlmFloat>(
    frame: &RawFrame<S>,
    model: &NoiseModel<F>,
    config: &NlmConfig<F>,
) -> Result<DenoiseOutput<S, F>, NlmError> {
    check_inputs(frame, model, config)?;

    let profile_timing = resolve_profile_timing();
    let kernel_config = NlmKernelConfig {
        patch_radius: config.patch_radius,
        neighborhood_radius: config.neighborhood_radius,
        weight_kernel: WeightKernel::new(config.filter_strength)?,
        band_rows: config.effective_band_rows(),
    };

    tracing::debug!(
        width = frame.width(),
        height = frame.height(),
        period = frame.cfa().period(),
        patch_radius = config.patch_radius,
        neighborhood_radius = config.neighborhood_radius,
        filter_strength = config.filter_strength.as_f64(),
        shifts = ShiftScanner::new(config.neighborhood_radius, frame.cfa().period()).len(),
        band_rows = kernel_config.band_rows,
        bands = frame.height().div_ceil(kernel_config.band_rows),
        "denoise_raw"
    );

    let t0 = Instant::now();
    let stabilized: Array2<F> = stabilize_frame(frame.view(), model);
    let stabilize_elapsed = t0.elapsed();

    let t1 = Instant::now();
    let accumulation = run_nlm_kernel(stabilized.view(), frame.cfa(), &kernel_config);
    let kernel_elapsed = t1.elapsed();

    let t2 = Instant::now();
    let output: Array2<S> = destabilize_frame(accumulation.normalize().view(), model);
    let inverse_elapsed = t2.elapsed();

    if profile_timing {
        tracing::info!(
            width = frame.width(),
            height = frame.height(),
            stabilize_ms = stabilize_elapsed.as_secs_f64() * 1000.0,
            kernel_ms = kernel_elapsed.as_secs_f64() * 1000.0,
            inverse_ms = inverse_elapsed.as_secs_f64() * 1000.0,
            "denoise_raw profile"
        );
    }

    Ok(DenoiseOutput {
        output,
        stabilized,
        accumulation,
    })
}

/// Denoise one raw CFA frame.
///
/// The result has the frame's dimensions and sample type. Fails before any
/// processing when the configuration is invalid or the frame and noise model
/// disagree on the CFA period.
pub fn denoise_raw<S: RawSample, F: NlmFloat>(
    frame: &RawFrame<S>,
    model: &NoiseModel<F>,
    config: &NlmConfig<F>,
) -> Result<Array2<S>, NlmError> {
    denoise_raw_detailed(frame, model, config).map(|result| result.output)
}
