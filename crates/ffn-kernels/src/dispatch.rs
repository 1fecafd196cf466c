//! Host-side dispatcher for the fused feed-forward kernel.
//!
//! Turns a `(..., K) @ (K, N)` call into a 2D launch over output tiles and
//! restores the caller's leading dimensions on the way out. All validation
//! happens here, before any tile runs.

use std::panic::{self, AssertUnwindSafe};

use half::f16;
use rayon::prelude::*;

use ffn_tensor::{DType, Shape, Tensor};

use crate::config::FeedForwardOptions;
use crate::epilogue::{Dropout, Epilogue};
use crate::error::{KernelError, Result};
use crate::tile::{GemmProblem, LaunchGrid, OutputElement, TileCoord};

/// Validated dimensions of one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    /// Dimensions of X before the last one; restored on the output.
    pub leading: Vec<usize>,
    pub m: usize,
    pub k: usize,
    pub n: usize,
    pub grid: LaunchGrid,
}

impl LaunchPlan {
    /// Checks every precondition of a call and derives its launch grid.
    ///
    /// Checks run in this order: options, operand shapes (X, W, bias,
    /// residual), then contiguity of every provided operand.
    pub fn new(
        x: &Tensor,
        weight: &Tensor,
        bias: Option<&Tensor>,
        residual: Option<&Tensor>,
        options: &FeedForwardOptions,
    ) -> Result<LaunchPlan> {
        options.validate()?;

        let (leading, m, k) = x.shape().flatten_leading().map_err(|_| {
            KernelError::ShapeMismatch {
                operand: "x",
                expected: "[..., K] with rank >= 1".to_string(),
                got: x.shape().dims().to_vec(),
            }
        })?;

        let w_dims = weight.shape().dims();
        if w_dims.len() != 2 || w_dims[0] != k {
            return Err(KernelError::ShapeMismatch {
                operand: "weight",
                expected: format!("[{}, N]", k),
                got: w_dims.to_vec(),
            });
        }
        let n = w_dims[1];

        if let Some(b) = bias {
            if b.shape().dims() != [n] {
                return Err(KernelError::ShapeMismatch {
                    operand: "bias",
                    expected: format!("[{}]", n),
                    got: b.shape().dims().to_vec(),
                });
            }
        }

        if let Some(r) = residual {
            let views_as_output = match r.shape().flatten_leading() {
                Ok((_, rows, last)) => rows == m && last == n,
                Err(_) => false,
            };
            if !views_as_output {
                return Err(KernelError::ShapeMismatch {
                    operand: "residual",
                    expected: format!("[..., {}] viewable as [{}, {}]", n, m, n),
                    got: r.shape().dims().to_vec(),
                });
            }
        }

        ensure_contiguous("x", x)?;
        ensure_contiguous("weight", weight)?;
        if let Some(b) = bias {
            ensure_contiguous("bias", b)?;
        }
        if let Some(r) = residual {
            ensure_contiguous("residual", r)?;
        }

        let grid = LaunchGrid::new(m, n, &options.blocks);
        Ok(LaunchPlan {
            leading,
            m,
            k,
            n,
            grid,
        })
    }

    /// Logical output shape `(..., N)`.
    pub fn output_shape(&self) -> Shape {
        let mut dims = self.leading.clone();
        dims.push(self.n);
        Shape::new(dims)
    }
}

fn ensure_contiguous(operand: &'static str, t: &Tensor) -> Result<()> {
    if t.is_contiguous() {
        return Ok(());
    }
    Err(KernelError::NotContiguous {
        operand,
        shape: t.shape().dims().to_vec(),
        strides: t.strides().to_vec(),
    })
}

/// Computes `residual + dropout(gelu(x @ weight + bias))` in one pass over
/// output tiles.
///
/// - `x`: `[..., K]`, leading dimensions are flattened into `M`
/// - `weight`: `[K, N]`
/// - `bias`: optional `[N]`, broadcast over rows
/// - `residual`: optional, any shape `[..., N]` whose leading dims multiply to `M`
///
/// GELU runs only when `options.apply_activation` is set and dropout only
/// when `options.dropout_probability > 0`. Operands are rounded to f16 for
/// the products, accumulation and the epilogue run in f32, and the result
/// is stored at `x`'s dtype with shape `[..., N]`.
///
/// Dropout is keyed by `(options.seed, row * N + col)`, so repeating a call
/// with the same seed reproduces the same mask.
///
/// # Errors
/// `ShapeMismatch`, `NotContiguous` or `UnsupportedConfiguration` before
/// any work is scheduled; `LaunchFailed` if the launch itself aborts.
pub fn fused_feed_forward(
    x: &Tensor,
    weight: &Tensor,
    bias: Option<&Tensor>,
    residual: Option<&Tensor>,
    options: &FeedForwardOptions,
) -> Result<Tensor> {
    let plan = LaunchPlan::new(x, weight, bias, residual, options)?;

    log::debug!(
        "fused_feed_forward: m={} k={} n={} blocks={}x{}x{} grid={}x{} bias={} gelu={} dropout={} residual={}",
        plan.m,
        plan.k,
        plan.n,
        options.blocks.block_m,
        options.blocks.block_n,
        options.blocks.block_k,
        plan.grid.grid_m,
        plan.grid.grid_n,
        bias.is_some(),
        options.apply_activation,
        options.dropout_probability,
        residual.is_some(),
    );

    let problem = GemmProblem {
        x: x.storage().view(),
        w: weight.storage().view(),
        m: plan.m,
        n: plan.n,
        k: plan.k,
        blocks: options.blocks,
    };
    let epilogue = Epilogue {
        bias: bias.map(|b| b.storage().view()),
        activation: options.apply_activation,
        dropout: options.dropout_enabled().then_some(Dropout {
            probability: options.dropout_probability,
            seed: options.seed,
        }),
        residual: residual.map(|r| r.storage().view()),
        n: plan.n,
    };

    let numel = plan.m * plan.n;
    let out_shape = plan.output_shape();
    let out = match x.dtype() {
        DType::F32 => {
            let mut z = vec![0.0f32; numel];
            run_launch(&problem, &epilogue, plan.grid, &mut z)?;
            Tensor::new(z, out_shape)
        }
        DType::F16 => {
            let mut z = vec![f16::ZERO; numel];
            run_launch(&problem, &epilogue, plan.grid, &mut z)?;
            Tensor::from_f16(z, out_shape)
        }
    };
    Ok(out)
}

/// Runs `launch`, turning a panic anywhere in the launch into
/// `LaunchFailed`. There is no per-tile recovery.
fn run_launch<T: OutputElement>(
    problem: &GemmProblem<'_>,
    epilogue: &Epilogue<'_>,
    grid: LaunchGrid,
    out: &mut [T],
) -> Result<()> {
    panic::catch_unwind(AssertUnwindSafe(|| launch(problem, epilogue, grid, out)))
        .map_err(|payload| KernelError::LaunchFailed(panic_message(payload.as_ref())))?
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs every tile of `grid` and stores the results into `out` (`[m, n]`).
///
/// The output is split into disjoint bands of `block_m` rows; the column
/// tiles of a band run in parallel and are stored into that band once
/// finished. Tiles share nothing mutable, so no locking is needed.
pub(crate) fn launch<T: OutputElement>(
    problem: &GemmProblem<'_>,
    epilogue: &Epilogue<'_>,
    grid: LaunchGrid,
    out: &mut [T],
) -> Result<()> {
    if out.len() != problem.m * problem.n {
        return Err(KernelError::ShapeMismatch {
            operand: "output",
            expected: format!("{} elements", problem.m * problem.n),
            got: vec![out.len()],
        });
    }
    let band_len = problem.blocks.block_m.min(problem.m) * problem.n;
    if band_len == 0 {
        return Ok(());
    }

    out.par_chunks_mut(band_len)
        .enumerate()
        .for_each(|(pid_m, band)| {
            log::trace!("band {}/{}: {} column tiles", pid_m + 1, grid.grid_m, grid.grid_n);

            let tiles: Vec<_> = (0..grid.grid_n)
                .into_par_iter()
                .map(|pid_n| {
                    let mut tile = problem.compute(TileCoord { pid_m, pid_n });
                    epilogue.apply(&mut tile);
                    tile
                })
                .collect();

            for tile in &tiles {
                tile.store(band, problem.n);
            }
        });
    Ok(())
}
