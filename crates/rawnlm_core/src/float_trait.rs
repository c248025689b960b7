//! Float trait abstraction for f32/f64 working precision.
//!
//! The stabilized frame, distance field and accumulators are all stored in
//! one working float type. `f32` halves memory traffic; `f64` keeps the
//! sliding sums exact enough for verification against brute force.

use num_traits::{Float, FromPrimitive, NumAssign};
use std::fmt::Debug;
use std::iter::Sum;

/// Trait alias for the floating point types the engine works in.
///
/// Combines the bounds needed across the pipeline:
/// - Basic float operations (Float, NumAssign)
/// - Conversion from primitive types (FromPrimitive)
/// - Iteration support (Sum)
/// - Thread-safety for rayon bands (Send + Sync)
pub trait NlmFloat: Float + FromPrimitive + NumAssign + Sum + Debug + Send + Sync + 'static {
    /// `sqrt(3/2)`, used by the unbiased inverse Anscombe transform.
    const SQRT_3_2: Self;

    /// Create a value from an f64 constant.
    fn from_f64_c(val: f64) -> Self;

    /// Create a value from a usize constant.
    fn usize_as(val: usize) -> Self;

    /// Widen to f64 (lossless for both supported types).
    fn as_f64(self) -> f64;

    /// Narrow to f32 for the bit-level weight approximation.
    fn as_f32(self) -> f32;
}

impl NlmFloat for f32 {
    const SQRT_3_2: Self = 1.224_744_9;

    #[inline]
    fn from_f64_c(val: f64) -> Self {
        val as f32
    }

    #[inline]
    fn usize_as(val: usize) -> Self {
        val as f32
    }

    #[inline]
    fn as_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn as_f32(self) -> f32 {
        self
    }
}

impl NlmFloat for f64 {
    const SQRT_3_2: Self = 1.224_744_871_391_589;

    #[inline]
    fn from_f64_c(val: f64) -> Self {
        val
    }

    #[inline]
    fn usize_as(val: usize) -> Self {
        val as f64
    }

    #[inline]
    fn as_f64(self) -> f64 {
        self
    }

    #[inline]
    fn as_f32(self) -> f32 {
        self as f32
    }
}
