//! Per-invocation state shared by the forward and backward pass of a custom kernel.
//!
//! # Lifecycle
//!
//! 1. The caller creates an [`OpContext`] before running the forward pass.
//! 2. [`custom_fwd`](crate::custom::custom_fwd) stamps one [`GradFlag`] per
//!    argument into it, and the kernel may stash tensors with
//!    [`OpContext::save_for_backward`].
//! 3. [`custom_bwd`](crate::custom::custom_bwd) reads the flags back to filter
//!    the gradients the kernel's backward pass produced.
//! 4. The context is dropped.
//!
//! The context is owned by the caller and borrowed mutably by each phase, so
//! it cannot be shared between concurrent invocations.

use crate::args::Arg;
use crate::tensors::TensorLike;

/// What autograd needs to know about one kernel input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GradFlag {
    /// A tensor that is tracked by autograd.
    RequiresGrad,
    /// A tensor that is a constant (`stop_gradient`).
    NoGrad,
    /// Not a tensor at all; it never receives a gradient slot.
    NotATensor,
}

impl GradFlag {
    /// Classifies a single kernel argument.
    pub fn of<T: TensorLike>(arg: &Arg<'_, T>) -> Self {
        match arg.as_tensor() {
            Some(t) if t.requires_grad() => Self::RequiresGrad,
            Some(_) => Self::NoGrad,
            None => Self::NotATensor,
        }
    }

    pub fn requires_grad(self) -> bool {
        self == Self::RequiresGrad
    }

    pub fn is_tensor(self) -> bool {
        self != Self::NotATensor
    }
}

/// The context object handed to both passes of a custom kernel.
#[derive(Debug, Clone)]
pub struct OpContext<T> {
    needs_input_grad: Option<Vec<GradFlag>>,
    saved: Vec<T>,
}

impl<T> Default for OpContext<T> {
    fn default() -> Self {
        Self {
            needs_input_grad: None,
            saved: Vec::new(),
        }
    }
}

impl<T> OpContext<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The recorded input flags, if a forward pass has stamped them.
    pub fn needs_input_grad(&self) -> Option<&[GradFlag]> {
        self.needs_input_grad.as_deref()
    }

    /// Overwrites the recorded input flags.
    pub fn set_needs_input_grad(&mut self, flags: Vec<GradFlag>) {
        self.needs_input_grad = Some(flags);
    }

    /// Removes and returns the recorded input flags.
    pub fn take_needs_input_grad(&mut self) -> Option<Vec<GradFlag>> {
        self.needs_input_grad.take()
    }

    /// Returns the flag list, creating it with `len` [`GradFlag::NoGrad`]
    /// entries if none exists yet. An existing list shorter than `len` is
    /// padded with `NoGrad`; it is never truncated.
    pub(crate) fn flags_for(&mut self, len: usize) -> &mut Vec<GradFlag> {
        let flags = self
            .needs_input_grad
            .get_or_insert_with(|| vec![GradFlag::NoGrad; len]);
        if flags.len() < len {
            flags.resize(len, GradFlag::NoGrad);
        }
        flags
    }

    /// Whether any recorded input requires a gradient.
    pub fn needs_any_grad(&self) -> bool {
        self.needs_input_grad
            .as_ref()
            .is_some_and(|flags| flags.iter().any(|f| f.requires_grad()))
    }

    /// Stashes tensors for the backward pass, replacing anything saved earlier.
    pub fn save_for_backward(&mut self, tensors: impl IntoIterator<Item = T>) {
        self.saved = tensors.into_iter().collect();
    }

    pub fn saved_tensors(&self) -> &[T] {
        &self.saved
    }

    /// Moves the saved tensors out of the context.
    pub fn take_saved_tensors(&mut self) -> Vec<T> {
        std::mem::take(&mut self.saved)
    }
}
