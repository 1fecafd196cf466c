pub mod matmul;
pub mod unary;

use crate::backend::ComputeBackend;
use crate::error::{Result, TensorError};

/// Pure-Rust CPU compute backend.
///
/// Implements all operations with straightforward loops optimized for
/// correctness rather than peak performance. Intended as a reference
/// implementation.
#[derive(Debug, Clone)]
pub struct CpuBackend;

impl CpuBackend {
    pub fn new() -> Self {
        CpuBackend
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputeBackend for CpuBackend {
    fn name(&self) -> &str {
        "cpu"
    }

    fn matmul(&self, a: &[f32], b: &[f32], m: usize, k: usize, n: usize) -> Result<Vec<f32>> {
        matmul::matmul_f32(a, b, m, k, n)
    }

    fn add(&self, a: &[f32], b: &[f32]) -> Result<Vec<f32>> {
        if a.len() != b.len() {
            return Err(TensorError::ShapeMismatch {
                expected: vec![a.len()],
                got: vec![b.len()],
            });
        }
        Ok(a.iter().zip(b.iter()).map(|(x, y)| x + y).collect())
    }

    fn add_row_broadcast(&self, a: &[f32], row: &[f32], n: usize) -> Result<Vec<f32>> {
        if row.len() != n {
            return Err(TensorError::ShapeMismatch {
                expected: vec![n],
                got: vec![row.len()],
            });
        }
        if n == 0 {
            return Ok(a.to_vec());
        }
        if a.len() % n != 0 {
            return Err(TensorError::Other(format!(
                "add_row_broadcast: a.len()={} is not a multiple of n={}",
                a.len(),
                n
            )));
        }
        Ok(a
            .chunks(n)
            .flat_map(|r| r.iter().zip(row.iter()).map(|(x, b)| x + b))
            .collect())
    }

    fn scale(&self, x: &[f32], s: f32) -> Result<Vec<f32>> {
        Ok(x.iter().map(|&v| v * s).collect())
    }

    fn gelu(&self, x: &[f32]) -> Result<Vec<f32>> {
        Ok(x.iter().map(|&v| unary::gelu_new(v)).collect())
    }

    fn dropout(&self, x: &[f32], p: f32, seed: u64) -> Result<Vec<f32>> {
        if !(0.0..1.0).contains(&p) {
            return Err(TensorError::Other(format!(
                "dropout: probability {} is outside [0, 1)",
                p
            )));
        }
        if p == 0.0 {
            return Ok(x.to_vec());
        }
        Ok(x
            .iter()
            .enumerate()
            .map(|(i, &v)| unary::dropout(v, p, seed, i as u64))
            .collect())
    }
}
