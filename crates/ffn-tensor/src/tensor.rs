use std::sync::Arc;

use half::f16;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::backend::ComputeBackend;
use crate::dtype::DType;
use crate::error::{Result, TensorError};
use crate::shape::Shape;
use crate::storage::CpuStorage;

/// A tensor backed by CPU storage.
///
/// Freshly created tensors are contiguous and row-major. Views such as
/// [`Tensor::transpose`] share the same storage with permuted strides and
/// are therefore not contiguous until [`Tensor::contiguous`] copies them.
/// Cloning a tensor is cheap: the storage is reference counted.
#[derive(Debug, Clone)]
pub struct Tensor {
    storage: Arc<CpuStorage>,
    shape: Shape,
    strides: Vec<usize>,
    dtype: DType,
}

impl Tensor {
    fn from_storage(storage: impl Into<Arc<CpuStorage>>, shape: Shape) -> Self {
        let storage = storage.into();
        let strides = shape.strides();
        let dtype = storage.dtype();
        Tensor {
            storage,
            shape,
            strides,
            dtype,
        }
    }

    /// Create a new tensor from f32 data and a shape.
    ///
    /// # Panics
    /// Panics if `data.len() != shape.numel()`.
    pub fn new(data: Vec<f32>, shape: Shape) -> Self {
        assert_eq!(
            data.len(),
            shape.numel(),
            "data length {} does not match shape {:?} (numel={})",
            data.len(),
            shape,
            shape.numel()
        );
        Tensor::from_storage(CpuStorage::from_f32_vec(data), shape)
    }

    /// Create a new half-precision tensor from f16 data and a shape.
    ///
    /// # Panics
    /// Panics if `data.len() != shape.numel()`.
    pub fn from_f16(data: Vec<f16>, shape: Shape) -> Self {
        assert_eq!(
            data.len(),
            shape.numel(),
            "data length {} does not match shape {:?} (numel={})",
            data.len(),
            shape,
            shape.numel()
        );
        Tensor::from_storage(CpuStorage::from_f16_vec(data), shape)
    }

    /// Create a zero-filled f32 tensor with the given shape.
    pub fn zeros(shape: Shape) -> Self {
        Tensor::zeros_with_dtype(shape, DType::F32)
    }

    /// Create a zero-filled tensor with the given shape and dtype.
    pub fn zeros_with_dtype(shape: Shape, dtype: DType) -> Self {
        let n = shape.numel();
        Tensor::from_storage(CpuStorage::zeros(dtype, n), shape)
    }

    /// Create a tensor filled with ones with the given shape.
    pub fn ones(shape: Shape) -> Self {
        let n = shape.numel();
        Tensor::new(vec![1.0; n], shape)
    }

    /// Create an f32 tensor of uniform `[0, 1)` samples from a seeded RNG.
    ///
    /// The same `(shape, seed)` always yields the same data.
    pub fn rand(shape: Shape, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let data = (0..shape.numel()).map(|_| rng.gen::<f32>()).collect();
        Tensor::new(data, shape)
    }

    /// Returns a reference to the tensor's shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Returns the element strides of each dimension.
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Returns the tensor's data type.
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Returns the underlying storage reference.
    pub fn storage(&self) -> &CpuStorage {
        &self.storage
    }

    /// Returns true if logical row-major order matches storage order.
    pub fn is_contiguous(&self) -> bool {
        self.shape.is_contiguous(&self.strides)
    }

    /// Storage index of the element at the given logical row-major index.
    fn storage_index(&self, mut flat: usize) -> usize {
        let mut idx = 0;
        for (&d, &s) in self.shape.dims().iter().zip(&self.strides).rev() {
            idx += (flat % d) * s;
            flat /= d;
        }
        idx
    }

    /// Copies the elements, widened to f32, in logical row-major order.
    pub fn to_vec_f32(&self) -> Vec<f32> {
        let n = self.shape.numel();
        if self.is_contiguous() {
            let view = self.storage.view();
            return (0..n).map(|i| view.load(i)).collect();
        }
        (0..n)
            .map(|i| self.storage.load(self.storage_index(i)))
            .collect()
    }

    /// Returns a contiguous tensor with the same logical contents.
    ///
    /// Already-contiguous tensors are cloned without reordering.
    pub fn contiguous(&self) -> Tensor {
        if self.is_contiguous() {
            return self.clone();
        }
        let n = self.shape.numel();
        let mut storage = CpuStorage::zeros(self.dtype, n);
        for i in 0..n {
            storage.store(i, self.storage.load(self.storage_index(i)));
        }
        Tensor::from_storage(storage, self.shape.clone())
    }

    /// Swaps the two axes of a 2D tensor without copying.
    ///
    /// The result shares storage with `self` and is generally not contiguous.
    pub fn transpose(&self) -> Result<Tensor> {
        if self.shape.ndim() != 2 {
            return Err(TensorError::InvalidRank {
                expected: 2,
                got: self.shape.ndim(),
            });
        }
        let dims = self.shape.dims();
        Ok(Tensor {
            storage: self.storage.clone(),
            shape: Shape::new(vec![dims[1], dims[0]]),
            strides: vec![self.strides[1], self.strides[0]],
            dtype: self.dtype,
        })
    }

    /// Reshape the tensor, returning a new tensor with the same data but
    /// a different shape.
    ///
    /// The total number of elements must remain the same, and the tensor
    /// must be contiguous.
    pub fn reshape(&self, new_shape: Shape) -> Result<Tensor> {
        if !self.is_contiguous() {
            return Err(TensorError::NotContiguous {
                shape: self.shape.dims().to_vec(),
                strides: self.strides.clone(),
            });
        }
        if self.shape.numel() != new_shape.numel() {
            return Err(TensorError::ShapeMismatch {
                expected: self.shape.dims().to_vec(),
                got: new_shape.dims().to_vec(),
            });
        }
        Ok(Tensor::from_storage(self.storage.clone(), new_shape))
    }

    /// Converts the tensor to another element type (always contiguous).
    pub fn to_dtype(&self, dtype: DType) -> Tensor {
        if dtype == self.dtype {
            return self.contiguous();
        }
        let data = self.to_vec_f32();
        match dtype {
            DType::F32 => Tensor::new(data, self.shape.clone()),
            DType::F16 => Tensor::from_f16(
                data.into_iter().map(f16::from_f32).collect(),
                self.shape.clone(),
            ),
        }
    }

    /// Matrix multiplication of two 2D tensors using the given backend.
    ///
    /// self is [m, k], other is [k, n], result is [m, n] in f32.
    pub fn matmul(&self, other: &Tensor, backend: &dyn ComputeBackend) -> Result<Tensor> {
        if self.shape.ndim() != 2 || other.shape.ndim() != 2 {
            return Err(TensorError::Other(
                "matmul requires 2D tensors".to_string(),
            ));
        }

        let m = self.shape.dim(0);
        let k = self.shape.dim(1);
        let k2 = other.shape.dim(0);
        let n = other.shape.dim(1);

        if k != k2 {
            return Err(TensorError::MatmulMismatch { m, k, k2, n });
        }

        let result_data = backend.matmul(&self.to_vec_f32(), &other.to_vec_f32(), m, k, n)?;
        Ok(Tensor::new(result_data, Shape::new(vec![m, n])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::CpuBackend;

    #[test]
    fn test_new_tensor() {
        let t = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], Shape::new(vec![2, 3]));
        assert_eq!(t.shape().ndim(), 2);
        assert_eq!(t.shape().dim(0), 2);
        assert_eq!(t.shape().dim(1), 3);
        assert_eq!(t.strides(), &[3, 1]);
        assert_eq!(t.dtype(), DType::F32);
        assert!(t.is_contiguous());
        assert_eq!(t.to_vec_f32(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_zeros_ones() {
        let z = Tensor::zeros(Shape::new(vec![2, 3]));
        assert_eq!(z.to_vec_f32(), vec![0.0; 6]);

        let o = Tensor::ones(Shape::new(vec![3]));
        assert_eq!(o.to_vec_f32(), vec![1.0, 1.0, 1.0]);

        let h = Tensor::zeros_with_dtype(Shape::new(vec![4]), DType::F16);
        assert_eq!(h.dtype(), DType::F16);
    }

    #[test]
    fn test_rand_is_seeded() {
        let a = Tensor::rand(Shape::new(vec![8, 8]), 1337);
        let b = Tensor::rand(Shape::new(vec![8, 8]), 1337);
        let c = Tensor::rand(Shape::new(vec![8, 8]), 1338);
        assert_eq!(a.to_vec_f32(), b.to_vec_f32());
        assert_ne!(a.to_vec_f32(), c.to_vec_f32());
        assert!(a.to_vec_f32().iter().all(|v| (0.0..1.0).contains(v)));
    }

    #[test]
    fn test_transpose_is_a_view() {
        let t = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], Shape::new(vec![2, 3]));
        let tt = t.transpose().unwrap();
        assert_eq!(tt.shape().dims(), &[3, 2]);
        assert_eq!(tt.strides(), &[1, 3]);
        assert!(!tt.is_contiguous());
        assert_eq!(tt.to_vec_f32(), vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
        assert!(Arc::ptr_eq(&t.storage, &tt.storage));
    }

    #[test]
    fn test_reshape_shares_storage() {
        let t = Tensor::ones(Shape::new(vec![2, 3]));
        let r = t.reshape(Shape::new(vec![6])).unwrap();
        assert!(Arc::ptr_eq(&t.storage, &r.storage));
    }

    #[test]
    fn test_contiguous_materializes() {
        let t = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], Shape::new(vec![2, 3]));
        let c = t.transpose().unwrap().contiguous();
        assert!(c.is_contiguous());
        assert_eq!(c.storage().as_f32_slice().unwrap(), &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }

    #[test]
    fn test_transpose_requires_2d() {
        let t = Tensor::zeros(Shape::new(vec![2, 2, 2]));
        assert!(t.transpose().is_err());
    }

    #[test]
    fn test_reshape() {
        let t = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], Shape::new(vec![2, 3]));
        let r = t.reshape(Shape::new(vec![3, 2])).unwrap();
        assert_eq!(r.shape().dims(), &[3, 2]);
        assert_eq!(r.to_vec_f32(), t.to_vec_f32());
    }

    #[test]
    fn test_reshape_mismatch() {
        let t = Tensor::new(vec![1.0, 2.0, 3.0], Shape::new(vec![3]));
        assert!(t.reshape(Shape::new(vec![2, 2])).is_err());
    }

    #[test]
    fn test_reshape_non_contiguous() {
        let t = Tensor::zeros(Shape::new(vec![2, 3])).transpose().unwrap();
        assert!(matches!(
            t.reshape(Shape::new(vec![6])),
            Err(TensorError::NotContiguous { .. })
        ));
    }

    #[test]
    fn test_to_dtype() {
        let t = Tensor::new(vec![0.5, -1.25], Shape::new(vec![2]));
        let h = t.to_dtype(DType::F16);
        assert_eq!(h.dtype(), DType::F16);
        assert_eq!(h.to_vec_f32(), vec![0.5, -1.25]);
        assert_eq!(h.to_dtype(DType::F32).dtype(), DType::F32);
    }

    #[test]
    #[should_panic]
    fn test_new_shape_mismatch_panics() {
        let _t = Tensor::new(vec![1.0, 2.0], Shape::new(vec![3]));
    }

    #[test]
    fn test_matmul() {
        let backend = CpuBackend::new();
        let a = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], Shape::new(vec![2, 2]));
        let b = Tensor::new(vec![5.0, 6.0, 7.0, 8.0], Shape::new(vec![2, 2]));
        let c = a.matmul(&b, &backend).unwrap();
        assert_eq!(c.shape().dims(), &[2, 2]);
        assert_eq!(c.to_vec_f32(), vec![19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    fn test_matmul_dimension_mismatch() {
        let backend = CpuBackend::new();
        let a = Tensor::new(vec![1.0, 2.0, 3.0], Shape::new(vec![1, 3]));
        let b = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], Shape::new(vec![2, 2]));
        assert!(a.matmul(&b, &backend).is_err());
    }
}
