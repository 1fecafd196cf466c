use std::fmt::Debug;

use crate::error::Result;

/// Trait for pluggable compute backends.
///
/// Every operation is an unfused primitive: data comes in as f32 slices and
/// the full result is materialized as an owned vector. Chaining these is the
/// straightforward (and memory-hungry) way to evaluate a feed-forward layer,
/// which makes them the numerical baseline for the fused kernel.
pub trait ComputeBackend: Send + Sync + Debug {
    /// Returns the name of this backend (e.g., "cpu").
    fn name(&self) -> &str;

    /// Matrix multiplication: C = A @ B.
    ///
    /// - `a`: row-major data of shape [m, k]
    /// - `b`: row-major data of shape [k, n]
    /// - Returns: row-major data of shape [m, n]
    fn matmul(&self, a: &[f32], b: &[f32], m: usize, k: usize, n: usize) -> Result<Vec<f32>>;

    /// Element-wise addition: result[i] = a[i] + b[i].
    fn add(&self, a: &[f32], b: &[f32]) -> Result<Vec<f32>>;

    /// Adds `row` (length `n`) to every row of the row-major matrix `a`.
    fn add_row_broadcast(&self, a: &[f32], row: &[f32], n: usize) -> Result<Vec<f32>>;

    /// Scalar multiplication: result[i] = x[i] * s.
    fn scale(&self, x: &[f32], s: f32) -> Result<Vec<f32>>;

    /// Tanh-approximated GELU applied element-wise.
    fn gelu(&self, x: &[f32]) -> Result<Vec<f32>>;

    /// Inverted dropout with probability `p`, keyed by `(seed, i)` where `i`
    /// is the element index.
    fn dropout(&self, x: &[f32], p: f32, seed: u64) -> Result<Vec<f32>>;
}
