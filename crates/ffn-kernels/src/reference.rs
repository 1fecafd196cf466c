//! Unfused evaluation of the feed-forward epilogue.
//!
//! Each stage goes through a [`ComputeBackend`] primitive and materializes
//! its full result, in plain f32 with the native `tanh`. Used as the
//! baseline the fused kernel is compared against.

use ffn_tensor::{ComputeBackend, Shape, Tensor};

use crate::config::FeedForwardOptions;
use crate::error::{KernelError, Result};

/// `residual + dropout(gelu(x @ weight + bias))`, one stage at a time.
///
/// Accepts the same arguments as [`crate::fused_feed_forward`]. Strided
/// inputs are copied to contiguous form first. The result has `x`'s dtype.
pub fn unfused_feed_forward(
    backend: &dyn ComputeBackend,
    x: &Tensor,
    weight: &Tensor,
    bias: Option<&Tensor>,
    residual: Option<&Tensor>,
    options: &FeedForwardOptions,
) -> Result<Tensor> {
    options.validate()?;
    log::debug!("unfused_feed_forward on {} backend", backend.name());

    let (_, m, k) = x.shape().flatten_leading()?;
    let x2 = x.contiguous().reshape(Shape::new(vec![m, k]))?;
    let mut z = x2.matmul(weight, backend)?;
    let n = z.shape().dim(1);

    if let Some(b) = bias {
        let data = backend.add_row_broadcast(&z.to_vec_f32(), &b.to_vec_f32(), n)?;
        z = Tensor::new(data, z.shape().clone());
    }

    if options.apply_activation {
        z = Tensor::new(backend.gelu(&z.to_vec_f32())?, z.shape().clone());
    }

    if options.dropout_enabled() {
        let data = backend.dropout(&z.to_vec_f32(), options.dropout_probability, options.seed)?;
        z = Tensor::new(data, z.shape().clone());
    }

    if let Some(r) = residual {
        if r.shape().numel() != z.shape().numel() {
            return Err(KernelError::ShapeMismatch {
                operand: "residual",
                expected: format!("{} elements", z.shape().numel()),
                got: r.shape().dims().to_vec(),
            });
        }
        z = Tensor::new(backend.add(&z.to_vec_f32(), &r.to_vec_f32())?, z.shape().clone());
    }

    let out = z.reshape(x.shape().with_last_dim(n))?;
    Ok(out.to_dtype(x.dtype()))
}
