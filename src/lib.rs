//! briny_kernel: support code for hand-written kernels in briny_ai.
//!
//! Custom kernels bypass the framework's built-in autograd, so they have to
//! do some bookkeeping themselves. This crate provides that bookkeeping and a
//! couple of environment queries kernels commonly branch on.
//!
//! # Features
//!
//! - Recording which kernel inputs need gradients, and shaping the backward
//!   pass's output to match.
//! - Version gates on installed packages.
//! - Read access to the autocast (mixed precision) level and dtype.
//!
//! # Modules
//!
//! - [`tensors`] — Tensor values with a `stop_gradient` flag.
//! - [`args`] — Ordered positional and keyword kernel arguments.
//! - [`context`] — Per-invocation state shared by forward and backward.
//! - [`custom`] — `custom_fwd` / `custom_bwd` wrappers and the [`CustomOp`] runner.
//! - [`version`] — Parsing and ordering of version strings.
//! - [`package`] — Package registry and `compare_version`.
//! - [`amp`] — Autocast level and dtype.
//!
//! # Example
//!
//! ```rust
//! use briny_kernel::args::Args;
//! use briny_kernel::context::OpContext;
//! use briny_kernel::custom::{apply, CustomOp};
//! use briny_kernel::tensors::Tensor;
//! use briny_kernel::tensor;
//!
//! /// `y = x * k` for a scalar `k`.
//! struct Scale;
//!
//! impl CustomOp<Tensor<f32>> for Scale {
//!     type Output = Tensor<f32>;
//!     type Grad = Tensor<f32>;
//!
//!     fn forward(&self, _ctx: &mut OpContext<Tensor<f32>>, args: &Args<'_, Tensor<f32>>) -> Tensor<f32> {
//!         let x = args.positional()[0].as_tensor().unwrap();
//!         Tensor::new(x.shape.clone(), x.data.iter().map(|v| v * 2.0).collect())
//!     }
//!
//!     fn backward(&self, _ctx: &mut OpContext<Tensor<f32>>, grad: &Tensor<f32>) -> Vec<Tensor<f32>> {
//!         let dx = Tensor::new(grad.shape.clone(), grad.data.iter().map(|g| g * 2.0).collect());
//!         vec![dx, Tensor::new(Vec::<usize>::new(), vec![0.0])]
//!     }
//! }
//!
//! let x = tensor!([1.0_f32, 2.0]).with_stop_gradient(false);
//! let (y, back) = apply(&Scale, &Args::new().arg(&x).arg(2.0_f64));
//! assert_eq!(y.data, vec![2.0, 4.0]);
//!
//! let grads = back(&tensor!([1.0_f32, 1.0])).unwrap();
//! assert_eq!(grads.len(), 1);
//! assert_eq!(grads[0].as_ref().unwrap().data, vec![2.0, 2.0]);
//! ```

pub mod amp;
pub mod args;
pub mod context;
pub mod custom;
pub mod error;
pub mod package;
pub mod tensors;
pub mod version;

pub use amp::{get_autocast_gpu_dtype, is_autocast_enabled};
pub use context::{GradFlag, OpContext};
pub use custom::{CustomOp, apply, custom_bwd, custom_fwd};
pub use error::{Error, Result};
pub use package::compare_version;
pub use version::Version;
