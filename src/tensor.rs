//! Tensor implementation
//!
//! N-dimensional array with an explicit shape and a row-major buffer. The
//! transform functors read input tensors and write output tensors through
//! this type without ever resizing them: output shapes are fixed by functor
//! construction parameters, and a mismatch is a precondition violation, not
//! a reallocation.

use std::fmt;

use num_traits::Num;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TeselaError};

/// N-dimensional tensor with row-major storage
///
/// # Examples
///
/// ```
/// use tesela::Tensor;
///
/// let t = Tensor::from_vec(vec![2, 3], vec![
///     1.0, 2.0, 3.0,
///     4.0, 5.0, 6.0,
/// ]).unwrap();
///
/// assert_eq!(t.shape(), &[2, 3]);
/// assert_eq!(t.ndim(), 2);
/// assert_eq!(t.size(), 6);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor<T: Num> {
    /// Flattened data in row-major order
    data: Vec<T>,
    /// Shape of the tensor
    shape: Vec<usize>,
}

impl<T: Num + Clone> Tensor<T> {
    /// Create a new tensor from a vector and shape
    ///
    /// # Errors
    ///
    /// Returns `Err` if the shape is empty, contains a zero dimension, or
    /// the data size does not match the shape.
    ///
    /// # Examples
    ///
    /// ```
    /// use tesela::Tensor;
    ///
    /// let t = Tensor::from_vec(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
    /// assert_eq!(t.shape(), &[2, 2]);
    /// ```
    pub fn from_vec(shape: Vec<usize>, data: Vec<T>) -> Result<Self> {
        if shape.is_empty() {
            return Err(TeselaError::InvalidShape {
                reason: "Shape cannot be empty".to_string(),
            });
        }

        if shape.contains(&0) {
            return Err(TeselaError::InvalidShape {
                reason: "Shape dimensions cannot be zero".to_string(),
            });
        }

        let expected_size = shape.iter().product();

        if data.len() != expected_size {
            return Err(TeselaError::DataShapeMismatch {
                data_size: data.len(),
                shape: shape.clone(),
                expected: expected_size,
            });
        }

        Ok(Self { data, shape })
    }

    /// Create a zero-filled tensor with the given shape
    ///
    /// # Errors
    ///
    /// Returns `Err` if the shape is empty or contains a zero dimension.
    pub fn zeros(shape: Vec<usize>) -> Result<Self> {
        let size = shape.iter().product();
        Self::from_vec(shape, vec![T::zero(); size])
    }

    /// Get the shape of the tensor
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Get the size of dimension `i`
    ///
    /// # Panics
    ///
    /// Panics if `i` is out of range for the tensor rank.
    #[must_use]
    pub fn dim(&self, i: usize) -> usize {
        self.shape[i]
    }

    /// Get the number of dimensions
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Get the total number of elements
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Get a reference to the underlying data
    #[must_use]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Get a mutable reference to the underlying data
    ///
    /// The shape is fixed; only element values may change.
    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Flat offset of `(n, h, w, c)` in a 4-dimensional NHWC tensor
    ///
    /// # Panics
    ///
    /// Panics if the tensor is not 4-dimensional.
    #[must_use]
    pub fn nhwc_offset(&self, n: usize, h: usize, w: usize, c: usize) -> usize {
        assert_eq!(self.shape.len(), 4, "nhwc_offset requires a 4-D tensor");
        ((n * self.shape[1] + h) * self.shape[2] + w) * self.shape[3] + c
    }
}

impl<T: Num + Clone + fmt::Display> fmt::Display for Tensor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tensor(shape={:?}, data=[", self.shape)?;
        for (i, val) in self.data.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{val}")?;
        }
        write!(f, "])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_tensor() {
        let t = Tensor::from_vec(vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        assert_eq!(t.shape(), &[2, 3]);
        assert_eq!(t.ndim(), 2);
        assert_eq!(t.size(), 6);
    }

    #[test]
    fn test_empty_shape_error() {
        let result = Tensor::from_vec(vec![], vec![1.0, 2.0]);
        assert!(result.is_err());
        assert!(matches!(
            result.unwrap_err(),
            TeselaError::InvalidShape { .. }
        ));
    }

    #[test]
    fn test_zero_dimension_error() {
        let result = Tensor::<f32>::from_vec(vec![2, 0], vec![]);
        assert!(result.is_err());
    }

    #[test]
    fn test_size_mismatch_error() {
        let result = Tensor::from_vec(vec![2, 3], vec![1.0, 2.0]);
        assert!(result.is_err());
        assert!(matches!(
            result.unwrap_err(),
            TeselaError::DataShapeMismatch { .. }
        ));
    }

    #[test]
    fn test_zeros() {
        let t = Tensor::<f32>::zeros(vec![2, 2, 2]).unwrap();
        assert_eq!(t.size(), 8);
        assert!(t.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_nhwc_offset() {
        let t = Tensor::<f32>::zeros(vec![2, 4, 4, 3]).unwrap();
        assert_eq!(t.nhwc_offset(0, 0, 0, 0), 0);
        assert_eq!(t.nhwc_offset(0, 0, 0, 2), 2);
        assert_eq!(t.nhwc_offset(0, 0, 1, 0), 3);
        assert_eq!(t.nhwc_offset(0, 1, 0, 0), 12);
        assert_eq!(t.nhwc_offset(1, 0, 0, 0), 48);
    }

    #[test]
    fn test_data_mut_preserves_shape() {
        let mut t = Tensor::<f32>::zeros(vec![2, 2]).unwrap();
        t.data_mut()[3] = 5.0;
        assert_eq!(t.shape(), &[2, 2]);
        assert_eq!(t.data()[3], 5.0);
    }

    #[test]
    fn test_display() {
        let t = Tensor::from_vec(vec![2], vec![1.0, 2.0]).unwrap();
        let display = format!("{t}");
        assert!(display.contains("shape=[2]"));
        assert!(display.contains('1'));
        assert!(display.contains('2'));
    }
}
