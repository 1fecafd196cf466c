use crate::error::{Result, TensorError};

/// Plain triple-loop matrix multiplication in f32: `C = A @ B`.
///
/// - `a`: row-major data of shape [m, k]
/// - `b`: row-major data of shape [k, n]
/// - Returns: row-major data of shape [m, n]
pub fn matmul_f32(a: &[f32], b: &[f32], m: usize, k: usize, n: usize) -> Result<Vec<f32>> {
    if a.len() != m * k {
        return Err(TensorError::Other(format!(
            "matmul: a.len()={} but expected m*k={}",
            a.len(),
            m * k
        )));
    }
    if b.len() != k * n {
        return Err(TensorError::Other(format!(
            "matmul: b.len()={} but expected k*n={}",
            b.len(),
            k * n
        )));
    }

    let mut c = vec![0.0f32; m * n];
    for i in 0..m {
        for j in 0..n {
            let mut sum = 0.0f32;
            for p in 0..k {
                sum += a[i * k + p] * b[p * n + j];
            }
            c[i * n + j] = sum;
        }
    }
    Ok(c)
}
