//! Gradient bookkeeping for user-written kernels.
//!
//! # Forward / Backward Wrapping
//!
//! A custom kernel is a pair of functions sharing an [`OpContext`]. Wrapping
//! the forward pass with [`custom_fwd`] records, per argument, whether
//! autograd tracks it. Wrapping the backward pass with [`custom_bwd`] uses
//! that record to shape the returned gradients the way autograd expects:
//!
//! | recorded flag                     | gradient slot                |
//! |-----------------------------------|------------------------------|
//! | [`GradFlag::RequiresGrad`]        | `Some(grad)`                 |
//! | [`GradFlag::NoGrad`]              | `None`                       |
//! | [`GradFlag::NotATensor`]          | removed                      |
//!
//! Trailing `None`s are then dropped, since autograd treats missing trailing
//! gradients as absent.
//!
//! [`CustomOp`] and [`apply`] package both halves behind the usual
//! `(output, backward-closure)` convention.
//!
//! ## Example
//!
//! ```rust
//! use briny_kernel::args::Args;
//! use briny_kernel::context::{GradFlag, OpContext};
//! use briny_kernel::custom::{custom_bwd, custom_fwd};
//! use briny_kernel::tensors::Tensor;
//! use briny_kernel::tensor;
//!
//! let a = tensor!([1.0_f32, 2.0]).with_stop_gradient(false);
//! let b = tensor!([3.0_f32, 4.0]);
//! let args = Args::new().arg(&a).arg(5_i64).arg(&b);
//!
//! let forward = custom_fwd(|_ctx: &mut OpContext<Tensor<f32>>, args: &Args<Tensor<f32>>| args.len());
//! let mut ctx = OpContext::new();
//! assert_eq!(forward(&mut ctx, &args), 3);
//! assert_eq!(
//!     ctx.needs_input_grad(),
//!     Some(&[GradFlag::RequiresGrad, GradFlag::NotATensor, GradFlag::NoGrad][..])
//! );
//!
//! let backward = custom_bwd(|_ctx: &mut OpContext<Tensor<f32>>, g: f32| vec![g, 0.0, g]);
//! assert_eq!(backward(&mut ctx, 1.0).unwrap(), vec![Some(1.0)]);
//! ```

use log::{trace, warn};
use thiserror::Error;

use crate::args::Args;
use crate::context::{GradFlag, OpContext};
use crate::tensors::TensorLike;

/// Failure to line up backward gradients with recorded inputs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GradError {
    /// The backward pass produced a different number of gradients than the
    /// forward pass recorded inputs.
    #[error("backward produced {found} gradients but forward recorded {expected} inputs")]
    ArityMismatch { expected: usize, found: usize },
    /// The context was never stamped by a forward pass.
    #[error("context carries no recorded input flags; was the forward pass wrapped with `custom_fwd`?")]
    MissingFlags,
}

/// Stamps one [`GradFlag`] per argument of `args` into `ctx`.
///
/// A flag list already present on the context is kept: tensors that require
/// gradients mark their slot [`GradFlag::RequiresGrad`], non-tensors mark
/// theirs [`GradFlag::NotATensor`], and constant tensors leave their slot as
/// it was (a fresh list starts out all [`GradFlag::NoGrad`]).
pub fn record_input_grads<T: TensorLike>(ctx: &mut OpContext<T>, args: &Args<'_, T>) {
    let flags = ctx.flags_for(args.len());
    for (i, arg) in args.iter().enumerate() {
        match GradFlag::of(arg) {
            GradFlag::NoGrad => {}
            flag => flags[i] = flag,
        }
        trace!("input {i}: {:?}", flags[i]);
    }
}

/// Shapes backward-pass gradients according to the flags recorded in `ctx`.
///
/// # Errors
/// - [`GradError::MissingFlags`] if `ctx` was never stamped.
/// - [`GradError::ArityMismatch`] if `grads` and the recorded flags differ in length.
pub fn filter_input_grads<T, G>(
    ctx: &OpContext<T>,
    grads: Vec<G>,
) -> Result<Vec<Option<G>>, GradError> {
    let flags = ctx.needs_input_grad().ok_or(GradError::MissingFlags)?;
    if flags.len() != grads.len() {
        warn!(
            "gradient count {} does not match {} recorded inputs",
            grads.len(),
            flags.len()
        );
        return Err(GradError::ArityMismatch {
            expected: flags.len(),
            found: grads.len(),
        });
    }

    let mut result: Vec<Option<G>> = grads
        .into_iter()
        .zip(flags)
        .filter_map(|(grad, flag)| match flag {
            GradFlag::NotATensor => None,
            GradFlag::RequiresGrad => Some(Some(grad)),
            GradFlag::NoGrad => Some(None),
        })
        .collect();

    while matches!(result.last(), Some(None)) {
        result.pop();
    }
    Ok(result)
}

/// Wraps a forward pass so it records which inputs need gradients.
///
/// The returned function stamps the context (see [`record_input_grads`]),
/// then calls `f` with the arguments unchanged and returns its result as is.
pub fn custom_fwd<'a, T, R, F>(f: F) -> impl Fn(&mut OpContext<T>, &Args<'a, T>) -> R
where
    T: TensorLike + 'a,
    F: Fn(&mut OpContext<T>, &Args<'a, T>) -> R,
{
    move |ctx: &mut OpContext<T>, args: &Args<'a, T>| {
        record_input_grads(ctx, args);
        f(ctx, args)
    }
}

/// Wraps a backward pass so its gradients line up with what autograd expects.
///
/// `f` must return one gradient per forward input, in argument order. The
/// returned function filters them through [`filter_input_grads`].
///
/// # Errors
/// The wrapped function fails with [`GradError`] when the gradients cannot
/// be paired with the recorded flags.
pub fn custom_bwd<T, B, G, I, F>(
    f: F,
) -> impl Fn(&mut OpContext<T>, B) -> Result<Vec<Option<G>>, GradError>
where
    F: Fn(&mut OpContext<T>, B) -> I,
    I: IntoIterator<Item = G>,
{
    move |ctx: &mut OpContext<T>, grad_output: B| {
        let grads: Vec<G> = f(ctx, grad_output).into_iter().collect();
        filter_input_grads(ctx, grads)
    }
}

/// A differentiable kernel with a hand-written backward pass.
pub trait CustomOp<T: TensorLike> {
    /// Forward result; its gradient has the same type.
    type Output;
    /// Gradient produced for each input.
    type Grad;

    /// Computes the output. Anything the backward pass needs goes into `ctx`.
    fn forward(&self, ctx: &mut OpContext<T>, args: &Args<'_, T>) -> Self::Output;

    /// Maps `dL/d(out)` to one gradient per forward argument, in argument order.
    fn backward(&self, ctx: &mut OpContext<T>, grad_output: &Self::Output) -> Vec<Self::Grad>;
}

/// Runs a [`CustomOp`] forward and returns its output with the backward closure.
///
/// # Returns
/// - `out`: the forward result.
/// - `back`: closure that, given `dL/d(out)`, returns the filtered input
///   gradients (see [`filter_input_grads`]).
pub fn apply<'op, T, Op>(
    op: &'op Op,
    args: &Args<'_, T>,
) -> (
    Op::Output,
    impl FnOnce(&Op::Output) -> Result<Vec<Option<Op::Grad>>, GradError> + use<'op, T, Op>,
)
where
    T: TensorLike,
    Op: CustomOp<T>,
{
    let mut ctx = OpContext::new();
    let forward = custom_fwd(|ctx: &mut OpContext<T>, args: &Args<'_, T>| op.forward(ctx, args));
    let out = forward(&mut ctx, args);

    let back = move |grad_output: &Op::Output| {
        let backward = custom_bwd(|ctx: &mut OpContext<T>, g: &Op::Output| op.backward(ctx, g));
        backward(&mut ctx, grad_output)
    };

    (out, back)
}
