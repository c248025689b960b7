//! Raw NL-means Core Library
//!
//! Pure Rust non-local means denoising for raw sensor (CFA mosaic) data.
//! Samples are variance-stabilized per CFA channel with the generalized
//! Anscombe transform, averaged with patch-similarity weights against
//! same-channel neighbors only, and mapped back to raw values. Bayer (period
//! 2), X-Trans (period 6) and monochrome sensors share one engine.

pub mod accumulation;
pub mod cfa;
pub mod error;
pub mod float_trait;
pub mod frame;
pub mod noise_model;
pub mod orchestration;
pub mod patch_distance;
pub mod pipeline;
pub mod shift;
pub mod stabilizer;
pub mod weight;

// Re-export commonly used types at the crate root
pub use accumulation::AccumulationBuffers;
pub use cfa::{CfaLayout, MAX_CFA_PERIOD};
pub use error::NlmError;
pub use float_trait::NlmFloat;
pub use frame::{RawFrame, RawSample};
pub use noise_model::NoiseModel;
pub use orchestration::{denoise_raw, denoise_raw_detailed, DenoiseOutput, NlmConfig};
pub use pipeline::{run_nlm_kernel, NlmKernelConfig, DEFAULT_BAND_ROWS};
pub use stabilizer::{destabilize_frame, stabilize_frame};
pub use weight::{fast_mexp2, WeightKernel};
