//! Error type shared by configuration, noise-model and frame validation.

use thiserror::Error;

/// Precondition failures reported before any pixel is processed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NlmError {
    #[error("filter strength must be finite and > 0, got {0}")]
    InvalidFilterStrength(f64),

    #[error("{name} must be a finite value >= 0, got {value}")]
    InvalidRadius { name: &'static str, value: f64 },

    #[error("band_rows must be > 0")]
    InvalidBandRows,

    #[error("CFA period must be between 1 and {max}, got {got}")]
    InvalidCfaPeriod { max: usize, got: usize },

    #[error("noise gain a[{channel}] must be finite and > 0, got {value}")]
    InvalidNoiseGain { channel: usize, value: f64 },

    #[error("noise offset b[{channel}] must be finite, got {value}")]
    InvalidNoiseOffset { channel: usize, value: f64 },

    #[error("noise model needs {expected} entries per array (P*P), got a={got_a} b={got_b}")]
    NoiseModelSize {
        expected: usize,
        got_a: usize,
        got_b: usize,
    },

    #[error("CFA period mismatch: frame has period {frame}, noise model has period {model}")]
    CfaMismatch { frame: usize, model: usize },

    #[error("row stride {stride} is smaller than width {width}")]
    InvalidStride { stride: usize, width: usize },

    #[error("sample buffer too short: expected at least {expected} elements, got {got}")]
    BufferTooShort { expected: usize, got: usize },
}
