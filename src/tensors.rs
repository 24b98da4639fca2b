//! Tensor values as seen by custom kernels.
//!
//! # Core Tensor Utilities
//!
//! Custom kernels only need two things from a tensor: its data and whether
//! autograd should track it. This module defines [`Tensor`], a row-major
//! N-dimensional array that carries a `stop_gradient` flag, and the
//! [`TensorLike`] trait that the gradient bookkeeping in [`crate::custom`]
//! is written against.
//!
//! ## Design Highlights
//! - Tensors are strongly typed: `Tensor<T>` for any element type (usually `f32` or `f64`)
//! - Shape is stored as a `Vec<usize>` and enforced at runtime
//! - New tensors are constants (`stop_gradient == true`) until marked otherwise
//! - The `tensor!` macro supports ergonomic tensor creation from nested arrays
//!
//! ## Example
//!
//! ```rust
//! use briny_kernel::tensors::{Tensor, TensorLike};
//! let t = Tensor::new(vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).with_stop_gradient(false);
//! assert_eq!(t.shape, vec![2, 3]);
//! assert!(!t.stop_gradient());
//! ```

/// Anything autograd can be asked about.
///
/// A value is a tensor for gradient bookkeeping purposes exactly when it
/// implements this trait; every other argument is recorded as
/// [`GradFlag::NotATensor`](crate::context::GradFlag::NotATensor).
pub trait TensorLike {
    /// Whether the value is treated as a constant by autograd.
    fn stop_gradient(&self) -> bool;

    /// Inverse of [`TensorLike::stop_gradient`].
    fn requires_grad(&self) -> bool {
        !self.stop_gradient()
    }
}

/// Represents an N-dimensional tensor with a shape and flat row-major data.
///
/// - All elements must be the same type (`T`).
/// - `shape` defines the structure, e.g., `[2, 3]` for a 2×3 matrix.
/// - `data` holds the flattened content in row-major order.
/// - `stop_gradient` marks the tensor as a constant for differentiation.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<T> {
    pub shape: Vec<usize>,
    pub data: Vec<T>,
    pub stop_gradient: bool,
}

impl<T> Tensor<T> {
    /// Creates a new tensor with the given shape and flat data.
    ///
    /// The tensor starts out with `stop_gradient` set.
    ///
    /// # Panics
    /// Panics if the number of elements in `data` does not match the shape product.
    pub fn new(shape: impl Into<Vec<usize>>, data: Vec<T>) -> Self {
        let shape = shape.into();
        assert_eq!(
            shape.iter().product::<usize>(),
            data.len(),
            "shape {:?} is incompatible with {} data elements",
            shape,
            data.len()
        );
        Self {
            shape,
            data,
            stop_gradient: true,
        }
    }

    /// Builder-style setter for `stop_gradient`.
    #[must_use]
    pub fn with_stop_gradient(mut self, stop_gradient: bool) -> Self {
        self.stop_gradient = stop_gradient;
        self
    }

    /// Sets `stop_gradient` in place.
    pub fn set_stop_gradient(&mut self, stop_gradient: bool) {
        self.stop_gradient = stop_gradient;
    }

    /// Number of elements.
    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Number of dimensions.
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Returns a copy that autograd treats as a constant.
    pub fn detach(&self) -> Self
    where
        T: Clone,
    {
        Self {
            shape: self.shape.clone(),
            data: self.data.clone(),
            stop_gradient: true,
        }
    }
}

impl<T> TensorLike for Tensor<T> {
    fn stop_gradient(&self) -> bool {
        self.stop_gradient
    }
}

impl<T: TensorLike + ?Sized> TensorLike for &T {
    fn stop_gradient(&self) -> bool {
        (**self).stop_gradient()
    }
}

/// Defines a tensor from nested literal arrays.
///
/// Supports arbitrary dimensionality as long as sublists are uniform in shape.
/// The result has `stop_gradient` set, like [`Tensor::new`].
///
/// # Example
/// ```
/// use briny_kernel::tensor;
/// let t = tensor!([[1.0, 2.0], [3.0, 4.0]]);
/// assert_eq!(t.shape, vec![2, 2]);
/// assert!(t.stop_gradient);
/// ```
#[macro_export]
macro_rules! tensor {
    ($lit:literal) => {
        $crate::tensors::Tensor::new(Vec::<usize>::new(), vec![$lit])
    };

    ([ $( $inner:tt ),+ $(,)? ]) => {{
        let children = vec![ $( $crate::tensor!($inner) ),+ ];
        let first_shape = &children[0].shape;
        assert!(children.iter().all(|c| c.shape == *first_shape),
            "ragged tensor literal (rows have mismatched shapes)");
        let mut shape = vec![children.len()];
        shape.extend_from_slice(first_shape);
        let mut data = Vec::with_capacity(children.len() * children[0].data.len());
        for c in children { data.extend(c.data); }
        $crate::tensors::Tensor::new(shape, data)
    }};
}
