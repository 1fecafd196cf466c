//! `ffn-tensor` - Tensor substrate for the fused feed-forward kernel.
//!
//! This crate provides:
//! - A `Tensor` type backed by CPU storage, with strided (non-contiguous) views
//! - Data type definitions (F32 accumulator type, F16 compute type)
//! - Shape utilities, flattening and broadcasting
//! - A counter-based random generator keyed by `(seed, offset)`
//! - A `ComputeBackend` trait of unfused primitives and a reference `CpuBackend`

pub mod backend;
pub mod cpu;
pub mod dtype;
pub mod error;
pub mod random;
pub mod shape;
pub mod storage;
pub mod tensor;

// Re-export primary types at the crate root for convenience.
pub use backend::ComputeBackend;
pub use cpu::CpuBackend;
pub use dtype::DType;
pub use error::{Result, TensorError};
pub use shape::Shape;
pub use storage::{CpuStorage, StorageView};
pub use tensor::Tensor;
