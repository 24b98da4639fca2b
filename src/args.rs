//! Call arguments of a custom kernel.
//!
//! Kernels are invoked with positional arguments followed by keyword
//! arguments. Gradient bookkeeping only cares about the combined order
//! (positional first, then keyword values in insertion order), which is what
//! [`Args::iter`] yields.

use crate::tensors::Tensor;

/// A non-tensor argument value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar<'a> {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(&'a str),
}

/// One kernel argument: either a borrowed tensor or a plain value.
#[derive(Debug)]
pub enum Arg<'a, T> {
    Tensor(&'a T),
    Scalar(Scalar<'a>),
}

impl<'a, T> Arg<'a, T> {
    /// The tensor behind this argument, if any.
    pub fn as_tensor(&self) -> Option<&'a T> {
        match *self {
            Self::Tensor(t) => Some(t),
            Self::Scalar(_) => None,
        }
    }

    /// The plain value behind this argument, if any.
    pub fn as_scalar(&self) -> Option<Scalar<'a>> {
        match self {
            Self::Tensor(_) => None,
            Self::Scalar(s) => Some(*s),
        }
    }

    pub fn is_tensor(&self) -> bool {
        matches!(self, Self::Tensor(_))
    }
}

// manual impls: `T` itself need not be `Clone`/`Copy`, only the reference is copied
impl<T> Clone for Arg<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Arg<'_, T> {}

impl<'a, E> From<&'a Tensor<E>> for Arg<'a, Tensor<E>> {
    fn from(t: &'a Tensor<E>) -> Self {
        Self::Tensor(t)
    }
}

impl<'a, T> From<Scalar<'a>> for Arg<'a, T> {
    fn from(s: Scalar<'a>) -> Self {
        Self::Scalar(s)
    }
}

impl<T> From<bool> for Arg<'_, T> {
    fn from(v: bool) -> Self {
        Self::Scalar(Scalar::Bool(v))
    }
}

impl<T> From<i64> for Arg<'_, T> {
    fn from(v: i64) -> Self {
        Self::Scalar(Scalar::Int(v))
    }
}

impl<T> From<f64> for Arg<'_, T> {
    fn from(v: f64) -> Self {
        Self::Scalar(Scalar::Float(v))
    }
}

impl<'a, T> From<&'a str> for Arg<'a, T> {
    fn from(v: &'a str) -> Self {
        Self::Scalar(Scalar::Str(v))
    }
}

/// Ordered positional and keyword arguments of one kernel call.
///
/// # Example
/// ```
/// use briny_kernel::args::Args;
/// use briny_kernel::tensor;
///
/// let x = tensor!([1.0, 2.0]);
/// let args = Args::new().arg(&x).arg(3_i64).kwarg("scale", 0.5_f64);
/// assert_eq!(args.len(), 3);
/// assert!(args.iter().next().is_some_and(|a| a.is_tensor()));
/// ```
#[derive(Debug)]
pub struct Args<'a, T> {
    positional: Vec<Arg<'a, T>>,
    keyword: Vec<(&'a str, Arg<'a, T>)>,
}

impl<T> Default for Args<'_, T> {
    fn default() -> Self {
        Self {
            positional: Vec::new(),
            keyword: Vec::new(),
        }
    }
}

impl<T> Clone for Args<'_, T> {
    fn clone(&self) -> Self {
        Self {
            positional: self.positional.clone(),
            keyword: self.keyword.clone(),
        }
    }
}

impl<'a, T> Args<'a, T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional argument.
    #[must_use]
    pub fn arg(mut self, value: impl Into<Arg<'a, T>>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Sets a keyword argument.
    ///
    /// Re-binding an existing name replaces its value but keeps its
    /// original position.
    #[must_use]
    pub fn kwarg(mut self, name: &'a str, value: impl Into<Arg<'a, T>>) -> Self {
        let value = value.into();
        match self.keyword.iter_mut().find(|(k, _)| *k == name) {
            Some((_, slot)) => *slot = value,
            None => self.keyword.push((name, value)),
        }
        self
    }

    pub fn positional(&self) -> &[Arg<'a, T>] {
        &self.positional
    }

    /// Looks up a keyword argument by name.
    pub fn keyword(&self, name: &str) -> Option<&Arg<'a, T>> {
        self.keyword
            .iter()
            .find_map(|(k, v)| (*k == name).then_some(v))
    }

    /// Keyword names in insertion order.
    pub fn keyword_names(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.keyword.iter().map(|(k, _)| *k)
    }

    /// All argument values: positional first, then keyword values.
    pub fn iter(&self) -> impl Iterator<Item = &Arg<'a, T>> + '_ {
        self.positional
            .iter()
            .chain(self.keyword.iter().map(|(_, v)| v))
    }

    /// Total number of arguments, positional and keyword.
    pub fn len(&self) -> usize {
        self.positional.len() + self.keyword.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
