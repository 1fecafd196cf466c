use ffn_tensor::TensorError;
use thiserror::Error;

/// Errors reported by the fused feed-forward dispatcher.
///
/// Everything except `LaunchFailed` is detected before any tile is
/// scheduled, so a failed call never leaves a partially written output.
#[derive(Error, Debug)]
pub enum KernelError {
    #[error("shape mismatch for {operand}: expected {expected}, got {got:?}")]
    ShapeMismatch {
        operand: &'static str,
        expected: String,
        got: Vec<usize>,
    },
    #[error("{operand} is not contiguous (shape {shape:?}, strides {strides:?})")]
    NotContiguous {
        operand: &'static str,
        shape: Vec<usize>,
        strides: Vec<usize>,
    },
    #[error("unsupported configuration: {0}")]
    UnsupportedConfiguration(String),
    #[error("launch failed: {0}")]
    LaunchFailed(String),
    #[error("tensor error: {0}")]
    Tensor(#[from] TensorError),
}

pub type Result<T> = std::result::Result<T, KernelError>;
