use briny_kernel::args::{Arg, Args, Scalar};
use briny_kernel::context::{GradFlag, OpContext};
use briny_kernel::custom::{
    CustomOp, GradError, apply, custom_bwd, custom_fwd, filter_input_grads, record_input_grads,
};
use briny_kernel::tensor;
use briny_kernel::tensors::Tensor;

type T32 = Tensor<f32>;

fn tracked(data: Vec<f32>) -> T32 {
    Tensor::new(vec![data.len()], data).with_stop_gradient(false)
}

fn constant(data: Vec<f32>) -> T32 {
    Tensor::new(vec![data.len()], data)
}

#[test]
fn test_flags_follow_argument_kinds() {
    let a = tracked(vec![1.0]);
    let b = constant(vec![2.0]);
    let args = Args::new().arg(&a).arg(5_i64).arg(&b);

    let mut ctx = OpContext::new();
    record_input_grads(&mut ctx, &args);

    assert_eq!(
        ctx.needs_input_grad(),
        Some(&[GradFlag::RequiresGrad, GradFlag::NotATensor, GradFlag::NoGrad][..])
    );
    assert!(ctx.needs_any_grad());
}

#[test]
fn test_keyword_values_follow_positionals() {
    let a = constant(vec![1.0]);
    let w = tracked(vec![2.0]);
    let args = Args::new()
        .arg(&a)
        .kwarg("weight", &w)
        .kwarg("eps", 1e-5_f64)
        .kwarg("name", "ln");

    let mut ctx = OpContext::new();
    record_input_grads(&mut ctx, &args);

    assert_eq!(
        ctx.needs_input_grad().unwrap(),
        &[
            GradFlag::NoGrad,
            GradFlag::RequiresGrad,
            GradFlag::NotATensor,
            GradFlag::NotATensor
        ]
    );
}

#[test]
fn test_keyword_only_call() {
    let w = tracked(vec![2.0]);
    let args = Args::new().kwarg("weight", &w).kwarg("flag", true);
    assert!(args.positional().is_empty());

    let mut ctx = OpContext::new();
    record_input_grads(&mut ctx, &args);
    assert_eq!(
        ctx.needs_input_grad().unwrap(),
        &[GradFlag::RequiresGrad, GradFlag::NotATensor]
    );
}

#[test]
fn test_rebinding_keyword_keeps_position() {
    let args: Args<T32> = Args::new().kwarg("a", 1_i64).kwarg("b", 2_i64).kwarg("a", 3_i64);
    assert_eq!(args.len(), 2);
    assert_eq!(args.keyword_names().collect::<Vec<_>>(), vec!["a", "b"]);
    assert_eq!(args.keyword("a").and_then(Arg::as_scalar), Some(Scalar::Int(3)));
}

#[test]
fn test_flag_count_matches_argument_count() {
    let a = tracked(vec![1.0]);
    for n in 0..6 {
        let mut args = Args::new();
        for i in 0..n {
            args = if i % 2 == 0 { args.arg(&a) } else { args.arg(Scalar::None) };
        }
        let mut ctx = OpContext::new();
        record_input_grads(&mut ctx, &args);
        assert_eq!(ctx.needs_input_grad().unwrap().len(), n);
    }
}

#[test]
fn test_existing_flags_are_not_replaced() {
    let a = tracked(vec![1.0]);
    let b = constant(vec![2.0]);

    let mut ctx = OpContext::new();
    record_input_grads(&mut ctx, &Args::new().arg(&a).arg(&b));

    // second call sees `a` as a constant now; its earlier flag survives
    let a_const = constant(vec![1.0]);
    record_input_grads(&mut ctx, &Args::new().arg(&a_const).arg(&b));

    assert_eq!(
        ctx.needs_input_grad().unwrap(),
        &[GradFlag::RequiresGrad, GradFlag::NoGrad]
    );
}

#[test]
fn test_short_existing_flags_are_padded() {
    let a = tracked(vec![1.0]);
    let mut ctx = OpContext::new();
    ctx.set_needs_input_grad(vec![GradFlag::RequiresGrad]);

    record_input_grads(&mut ctx, &Args::new().arg(3_i64).arg(&a).arg(&constant(vec![0.0])));
    assert_eq!(
        ctx.needs_input_grad().unwrap(),
        &[GradFlag::NotATensor, GradFlag::RequiresGrad, GradFlag::NoGrad]
    );
}

#[test]
fn test_custom_fwd_returns_result_verbatim() {
    let a = tracked(vec![1.0, 2.0]);
    let args = Args::new().arg(&a).arg(0.5_f64);

    let forward = custom_fwd(|_ctx: &mut OpContext<T32>, args: &Args<T32>| {
        let x = args.positional()[0].as_tensor().unwrap();
        x.data.iter().sum::<f32>()
    });

    let mut ctx = OpContext::new();
    assert_eq!(forward(&mut ctx, &args), 3.0);
    assert_eq!(
        ctx.needs_input_grad().unwrap(),
        &[GradFlag::RequiresGrad, GradFlag::NotATensor]
    );
}

#[test]
fn test_backward_drops_non_tensors_and_trailing_none() {
    let a = tracked(vec![1.0]);
    let b = constant(vec![2.0]);
    let args = Args::new().arg(&a).arg(5_i64).arg(&b);

    let mut ctx = OpContext::new();
    custom_fwd(|_ctx: &mut OpContext<T32>, _args: &Args<T32>| ())(&mut ctx, &args);

    let backward = custom_bwd(|_ctx: &mut OpContext<T32>, _g: ()| ["grad_a", "grad_ignored", "grad_b"]);
    assert_eq!(backward(&mut ctx, ()), Ok(vec![Some("grad_a")]));
}

#[test]
fn test_backward_keeps_inner_none() {
    let mut ctx: OpContext<T32> = OpContext::new();
    ctx.set_needs_input_grad(vec![
        GradFlag::NoGrad,
        GradFlag::NotATensor,
        GradFlag::RequiresGrad,
        GradFlag::NoGrad,
        GradFlag::NoGrad,
    ]);

    let grads = filter_input_grads(&ctx, vec![1, 2, 3, 4, 5]).unwrap();
    assert_eq!(grads, vec![None, Some(3)]);
}

#[test]
fn test_backward_all_constant_is_empty() {
    let mut ctx: OpContext<T32> = OpContext::new();
    ctx.set_needs_input_grad(vec![GradFlag::NoGrad, GradFlag::NotATensor, GradFlag::NoGrad]);
    assert_eq!(filter_input_grads(&ctx, vec![1, 2, 3]), Ok(vec![]));
}

#[test]
fn test_backward_rejects_length_mismatch() {
    let mut ctx: OpContext<T32> = OpContext::new();
    ctx.set_needs_input_grad(vec![GradFlag::RequiresGrad, GradFlag::NoGrad]);

    assert_eq!(
        filter_input_grads(&ctx, vec![1.0]),
        Err(GradError::ArityMismatch { expected: 2, found: 1 })
    );
    assert_eq!(
        filter_input_grads(&ctx, vec![1.0, 2.0, 3.0]),
        Err(GradError::ArityMismatch { expected: 2, found: 3 })
    );
}

#[test]
fn test_backward_without_forward_fails() {
    let ctx: OpContext<T32> = OpContext::new();
    assert_eq!(filter_input_grads(&ctx, vec![1.0]), Err(GradError::MissingFlags));
}

#[test]
fn test_taking_flags_resets_the_context() {
    let a = tracked(vec![1.0]);
    let mut ctx = OpContext::new();
    record_input_grads(&mut ctx, &Args::new().arg(&a).arg(2_i64));

    let flags = ctx.take_needs_input_grad();
    assert_eq!(flags, Some(vec![GradFlag::RequiresGrad, GradFlag::NotATensor]));
    assert!(ctx.needs_input_grad().is_none());
    assert!(ctx.take_needs_input_grad().is_none());
    assert_eq!(filter_input_grads(&ctx, vec![1.0, 0.0]), Err(GradError::MissingFlags));
}

#[test]
fn test_saved_tensors_roundtrip_through_context() {
    let mut ctx: OpContext<T32> = OpContext::new();
    ctx.save_for_backward([tracked(vec![1.0]), constant(vec![2.0])]);
    assert_eq!(ctx.saved_tensors().len(), 2);

    let saved = ctx.take_saved_tensors();
    assert_eq!(saved[1].data, vec![2.0]);
    assert!(ctx.saved_tensors().is_empty());
}

/// `out = a * b` elementwise, with `alpha` as a non-tensor knob.
struct Mul;

impl CustomOp<T32> for Mul {
    type Output = T32;
    type Grad = T32;

    fn forward(&self, ctx: &mut OpContext<T32>, args: &Args<'_, T32>) -> T32 {
        let a = args.positional()[0].as_tensor().unwrap();
        let b = args.positional()[1].as_tensor().unwrap();
        ctx.save_for_backward([a.detach(), b.detach()]);
        Tensor::new(
            a.shape.clone(),
            a.data.iter().zip(&b.data).map(|(x, y)| x * y).collect(),
        )
    }

    fn backward(&self, ctx: &mut OpContext<T32>, grad: &T32) -> Vec<T32> {
        let saved = ctx.take_saved_tensors();
        let (a, b) = (&saved[0], &saved[1]);
        let da = grad.data.iter().zip(&b.data).map(|(g, y)| g * y).collect();
        let db = grad.data.iter().zip(&a.data).map(|(g, x)| g * x).collect();
        vec![
            Tensor::new(a.shape.clone(), da),
            Tensor::new(b.shape.clone(), db),
            Tensor::new(Vec::<usize>::new(), vec![0.0]),
        ]
    }
}

#[test]
fn test_apply_runs_both_passes() {
    let a = tensor!([1.0_f32, 2.0]).with_stop_gradient(false);
    let b = tensor!([3.0_f32, 4.0]);
    let args = Args::new().arg(&a).arg(&b).kwarg("alpha", 1.0_f64);

    let (out, back) = apply(&Mul, &args);
    assert_eq!(out.data, vec![3.0, 8.0]);

    let grads = back(&tensor!([1.0_f32, 1.0])).unwrap();
    assert_eq!(grads.len(), 1);
    assert_eq!(grads[0].as_ref().unwrap().data, vec![3.0, 4.0]);
}

#[test]
fn test_apply_with_both_inputs_tracked() {
    let a = tensor!([1.0_f32, 2.0]).with_stop_gradient(false);
    let b = tensor!([3.0_f32, 4.0]).with_stop_gradient(false);

    let (_, back) = apply(&Mul, &Args::new().arg(&a).arg(&b).kwarg("alpha", 1.0_f64));
    let grads = back(&tensor!([2.0_f32, 2.0])).unwrap();

    assert_eq!(grads.len(), 2);
    assert_eq!(grads[0].as_ref().unwrap().data, vec![6.0, 8.0]);
    assert_eq!(grads[1].as_ref().unwrap().data, vec![2.0, 4.0]);
}
