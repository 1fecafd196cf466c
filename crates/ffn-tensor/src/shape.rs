use crate::error::{Result, TensorError};

/// A tensor shape, wrapping a vector of dimension sizes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    /// Create a new shape from a vector of dimensions.
    pub fn new(dims: Vec<usize>) -> Self {
        Shape { dims }
    }

    /// Number of dimensions (rank).
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Total number of elements (product of all dimension sizes).
    pub fn numel(&self) -> usize {
        self.dims.iter().product()
    }

    /// Returns the size of dimension `i`.
    ///
    /// # Panics
    /// Panics if `i >= ndim()`.
    pub fn dim(&self, i: usize) -> usize {
        self.dims[i]
    }

    /// Returns a reference to the underlying dimension sizes.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Computes row-major contiguous strides for this shape.
    ///
    /// For a shape [d0, d1, d2], the strides are [d1*d2, d2, 1].
    pub fn strides(&self) -> Vec<usize> {
        if self.dims.is_empty() {
            return vec![];
        }
        let mut strides = vec![0usize; self.dims.len()];
        strides[self.dims.len() - 1] = 1;
        for i in (0..self.dims.len() - 1).rev() {
            strides[i] = strides[i + 1] * self.dims[i + 1];
        }
        strides
    }

    /// Checks if the given strides correspond to a contiguous (row-major) layout
    /// for this shape.
    ///
    /// The stride of a size-1 dimension never affects addressing, so it is
    /// not compared.
    pub fn is_contiguous(&self, strides: &[usize]) -> bool {
        if strides.len() != self.dims.len() {
            return false;
        }
        let expected = self.strides();
        self.dims
            .iter()
            .zip(strides.iter().zip(expected.iter()))
            .all(|(&d, (s, e))| d == 1 || s == e)
    }

    /// Collapses every dimension except the last into a single row count.
    ///
    /// Returns `(leading_dims, rows, last)` so that a tensor of shape
    /// `[d0, .., dn-2, dn-1]` can be treated as a `[rows, last]` matrix and
    /// later restored with [`Shape::with_last_dim`]. A rank-1 shape has no
    /// leading dims and a single row.
    ///
    /// # Errors
    /// Returns `InvalidRank` for a scalar (rank-0) shape.
    pub fn flatten_leading(&self) -> Result<(Vec<usize>, usize, usize)> {
        let (&last, leading) = self
            .dims
            .split_last()
            .ok_or(TensorError::InvalidRank { expected: 1, got: 0 })?;
        let rows = leading.iter().product();
        Ok((leading.to_vec(), rows, last))
    }

    /// Returns a shape with the same leading dimensions and the last
    /// dimension replaced by `last`. A scalar shape becomes `[last]`.
    pub fn with_last_dim(&self, last: usize) -> Shape {
        let mut dims = self.dims.clone();
        match dims.last_mut() {
            Some(d) => *d = last,
            None => dims.push(last),
        }
        Shape::new(dims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_shape() {
        let s = Shape::new(vec![2, 3, 4]);
        assert_eq!(s.ndim(), 3);
        assert_eq!(s.numel(), 24);
        assert_eq!(s.dim(0), 2);
        assert_eq!(s.dim(1), 3);
        assert_eq!(s.dim(2), 4);
    }

    #[test]
    fn test_strides() {
        let s = Shape::new(vec![2, 3, 4]);
        assert_eq!(s.strides(), vec![12, 4, 1]);
    }

    #[test]
    fn test_is_contiguous() {
        let s = Shape::new(vec![2, 3, 4]);
        assert!(s.is_contiguous(&[12, 4, 1]));
        assert!(!s.is_contiguous(&[12, 1, 4]));
    }

    #[test]
    fn test_is_contiguous_ignores_unit_dims() {
        let s = Shape::new(vec![4, 1]);
        assert!(s.is_contiguous(&[1, 4]));
        assert!(!Shape::new(vec![4, 2]).is_contiguous(&[1, 4]));
    }

    #[test]
    fn test_scalar_shape() {
        let s = Shape::new(vec![]);
        assert_eq!(s.ndim(), 0);
        assert_eq!(s.numel(), 1); // product of empty = 1
        assert_eq!(s.strides(), vec![]);
    }

    #[test]
    fn test_flatten_leading() {
        let s = Shape::new(vec![2, 3, 4]);
        let (leading, rows, last) = s.flatten_leading().unwrap();
        assert_eq!(leading, vec![2, 3]);
        assert_eq!(rows, 6);
        assert_eq!(last, 4);
    }

    #[test]
    fn test_flatten_leading_rank_one() {
        let s = Shape::new(vec![5]);
        let (leading, rows, last) = s.flatten_leading().unwrap();
        assert!(leading.is_empty());
        assert_eq!(rows, 1);
        assert_eq!(last, 5);
    }

    #[test]
    fn test_flatten_leading_scalar() {
        assert!(Shape::new(vec![]).flatten_leading().is_err());
    }

    #[test]
    fn test_with_last_dim() {
        let s = Shape::new(vec![2, 3, 4]);
        assert_eq!(s.with_last_dim(7).dims(), &[2, 3, 7]);
        assert_eq!(Shape::new(vec![]).with_last_dim(3).dims(), &[3]);
    }
}
