use half::f16;

use crate::dtype::DType;
use crate::error::{Result, TensorError};

/// CPU-side tensor storage.
///
/// Elements are kept at their storage precision; reads widen to f32 and
/// writes narrow back, so compute code only ever sees f32 values.
#[derive(Debug, Clone)]
pub enum CpuStorage {
    /// 32-bit floating point storage.
    F32(Vec<f32>),
    /// 16-bit floating point storage.
    F16(Vec<f16>),
}

/// A borrowed, read-only view of storage that widens elements to f32.
///
/// Cheap to copy, so one view can be handed to every parallel tile.
#[derive(Debug, Clone, Copy)]
pub enum StorageView<'a> {
    F32(&'a [f32]),
    F16(&'a [f16]),
}

impl StorageView<'_> {
    /// Number of elements visible through this view.
    pub fn len(&self) -> usize {
        match self {
            StorageView::F32(v) => v.len(),
            StorageView::F16(v) => v.len(),
        }
    }

    /// Returns true if the view contains no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads element `i` as f32.
    ///
    /// # Panics
    /// Panics if `i >= len()`.
    #[inline]
    pub fn load(&self, i: usize) -> f32 {
        match self {
            StorageView::F32(v) => v[i],
            StorageView::F16(v) => v[i].to_f32(),
        }
    }
}

impl CpuStorage {
    /// Number of elements in this storage.
    pub fn len(&self) -> usize {
        match self {
            CpuStorage::F32(v) => v.len(),
            CpuStorage::F16(v) => v.len(),
        }
    }

    /// Returns true if the storage contains no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the data as an f32 slice.
    ///
    /// # Errors
    /// Returns an error if the storage is not F32.
    pub fn as_f32_slice(&self) -> Result<&[f32]> {
        match self {
            CpuStorage::F32(v) => Ok(v.as_slice()),
            other => Err(dtype_mismatch(DType::F32, other.dtype())),
        }
    }

    /// Returns the data as an f16 slice.
    ///
    /// # Errors
    /// Returns an error if the storage is not F16.
    pub fn as_f16_slice(&self) -> Result<&[f16]> {
        match self {
            CpuStorage::F16(v) => Ok(v.as_slice()),
            other => Err(dtype_mismatch(DType::F16, other.dtype())),
        }
    }

    /// Create zero-filled storage for the given dtype and element count.
    pub fn zeros(dtype: DType, n: usize) -> Self {
        match dtype {
            DType::F32 => CpuStorage::F32(vec![0.0; n]),
            DType::F16 => CpuStorage::F16(vec![f16::ZERO; n]),
        }
    }

    /// Create storage from an f32 vector.
    pub fn from_f32_vec(data: Vec<f32>) -> Self {
        CpuStorage::F32(data)
    }

    /// Create storage from an f16 vector.
    pub fn from_f16_vec(data: Vec<f16>) -> Self {
        CpuStorage::F16(data)
    }

    /// Returns the dtype of this storage.
    pub fn dtype(&self) -> DType {
        match self {
            CpuStorage::F32(_) => DType::F32,
            CpuStorage::F16(_) => DType::F16,
        }
    }

    /// Borrows the storage as a widening read-only view.
    pub fn view(&self) -> StorageView<'_> {
        match self {
            CpuStorage::F32(v) => StorageView::F32(v),
            CpuStorage::F16(v) => StorageView::F16(v),
        }
    }

    /// Reads element `i` as f32.
    #[inline]
    pub fn load(&self, i: usize) -> f32 {
        self.view().load(i)
    }

    /// Writes `value` to element `i`, rounding to the storage precision.
    ///
    /// # Panics
    /// Panics if `i >= len()`.
    #[inline]
    pub fn store(&mut self, i: usize, value: f32) {
        match self {
            CpuStorage::F32(v) => v[i] = value,
            CpuStorage::F16(v) => v[i] = f16::from_f32(value),
        }
    }
}

fn dtype_mismatch(expected: DType, got: DType) -> TensorError {
    TensorError::DTypeMismatch {
        expected: expected.to_string(),
        got: got.to_string(),
    }
}
