//! Scalable axes are never unrolled; contractions that would need it are
//! left untouched.

mod common;

use common::{check_lowering, contract_output, remaining_high_level};
use rand::SeedableRng;
use rand::rngs::StdRng;
use veclower::indexing::{IndexMap, IteratorType::*};
use veclower::{
    CombiningKind, ContractLowering, ContractionOp, ElementType, Graph, LoweringOptions, OpKind,
    OuterProductOp, Pattern, PatternSet, PeelPlan, Type, apply_patterns,
};

fn options(strategy: ContractLowering) -> LoweringOptions {
    LoweringOptions::default().with_contract_lowering(strategy)
}

/// `(m, k) x (k, n) -> (m, n)` with the given axes scalable.
fn matmul(g: &mut Graph, scalable_n: bool, scalable_k: bool) -> ContractionOp {
    let f32 = ElementType::F32;
    let a = g.argument("a", Type::scalable_vector(&[2, 4], &[false, scalable_k], f32));
    let b = g.argument(
        "b",
        Type::scalable_vector(&[4, 3], &[scalable_k, scalable_n], f32),
    );
    let c = g.argument("c", Type::scalable_vector(&[2, 3], &[false, scalable_n], f32));
    let maps = IndexMap::infer_from_lists(&[&[0, 2], &[2, 1], &[0, 1]]);
    ContractionOp::new(a, b, Some(c), maps, vec![Parallel, Parallel, Reduction])
}

#[test]
fn test_scalable_trailing_axis_through_outer_products() {
    let mut rng = StdRng::seed_from_u64(400);
    let mut g = Graph::new();
    let op = matmul(&mut g, true, false);
    contract_output(&mut g, op);
    let report = check_lowering(&g, options(ContractLowering::OuterProduct), &mut rng);
    assert!(report.failures.is_empty());
}

#[test]
fn test_scalable_result_axis_declines_dot_and_peeling() {
    let mut g = Graph::new();
    let op = matmul(&mut g, true, false);
    assert!(PeelPlan::simulate(&g, &op).unwrap().is_none());
    contract_output(&mut g, op);
    let before = g.len();

    let report = apply_patterns(&mut g, &PatternSet::contract_lowering(options(ContractLowering::Dot)));
    assert!(report.applied.is_empty());
    assert!(report.failures.is_empty());
    assert_eq!(report.remaining.len(), 1);
    assert_eq!(g.len(), before);
}

#[test]
fn test_scalable_reduction_axis_declines_everywhere() {
    for strategy in [
        ContractLowering::OuterProduct,
        ContractLowering::ParallelArith,
        ContractLowering::Peeling,
    ] {
        let mut g = Graph::new();
        let op = matmul(&mut g, false, true);
        contract_output(&mut g, op);
        let before = g.len();

        let report = apply_patterns(&mut g, &PatternSet::contract_lowering(options(strategy)));
        assert!(report.applied.is_empty(), "{strategy}");
        assert!(report.failures.is_empty(), "{strategy}");
        assert_eq!(g.len(), before, "{strategy}");
        assert_eq!(remaining_high_level(&g), 1);
    }
}

/// `(b, m, k) x (b, k, n) -> (b, m, n)` with a scalable `n`.
fn scalable_batch_matmul(g: &mut Graph) -> ContractionOp {
    let f32 = ElementType::F32;
    let a = g.argument("a", Type::vector(&[2, 3, 4], f32));
    let w = g.argument("w", Type::scalable_vector(&[2, 4, 3], &[false, false, true], f32));
    let c = g.argument("c", Type::scalable_vector(&[2, 3, 3], &[false, false, true], f32));
    let maps = IndexMap::infer_from_lists(&[&[0, 1, 3], &[0, 3, 2], &[0, 1, 2]]);
    ContractionOp::new(a, w, Some(c), maps, vec![Parallel, Parallel, Parallel, Reduction])
}

#[test]
fn test_scalable_batch_matmul_peels_batch_then_uses_outer_products() {
    let mut rng = StdRng::seed_from_u64(404);
    let mut g = Graph::new();
    let op = scalable_batch_matmul(&mut g);
    contract_output(&mut g, op);

    let report = check_lowering(&g, options(ContractLowering::OuterProduct), &mut rng);
    assert!(report.failures.is_empty());
    assert_eq!(report.applied[0].pattern, Pattern::ContractPeeling);
    assert_eq!(report.count(Pattern::ContractPeeling), 1);
    assert_eq!(report.count(Pattern::ContractToOuterProduct), 2);
}

#[test]
fn test_scalable_batch_matmul_is_left_whole_without_a_taker() {
    // No strategy lowers the per-batch children without unrolling n, so
    // the batch axis is not peeled either.
    for strategy in [ContractLowering::Dot, ContractLowering::Peeling] {
        let mut g = Graph::new();
        let op = scalable_batch_matmul(&mut g);
        contract_output(&mut g, op);
        let before = g.len();

        let report = apply_patterns(&mut g, &PatternSet::contract_lowering(options(strategy)));
        assert!(report.applied.is_empty(), "{strategy}");
        assert!(report.failures.is_empty(), "{strategy}");
        assert_eq!(g.len(), before, "{strategy}");
        assert_eq!(remaining_high_level(&g), 1);
    }
}

#[test]
fn test_dot_reduces_over_scalable_rows() {
    // Only output axes are unrolled by the dot lowering.
    let mut rng = StdRng::seed_from_u64(403);
    let mut g = Graph::new();
    let op = matmul(&mut g, false, true);
    contract_output(&mut g, op);
    let report = check_lowering(&g, options(ContractLowering::Dot), &mut rng);
    assert_eq!(report.applied.len(), 1);
}

#[test]
fn test_scalable_dot_product_needs_no_unrolling() {
    let mut rng = StdRng::seed_from_u64(401);
    let mut g = Graph::new();
    let ty = Type::scalable_vector(&[4], &[true], ElementType::F32);
    let a = g.argument("a", ty.clone());
    let b = g.argument("b", ty);
    let maps = IndexMap::infer_from_lists(&[&[0], &[0], &[]]);
    contract_output(
        &mut g,
        ContractionOp::new(a, b, None, maps, vec![Reduction]),
    );
    check_lowering(&g, options(ContractLowering::Peeling), &mut rng);
}

#[test]
fn test_all_scalable_outer_product_is_kept() {
    let mut g = Graph::new();
    let ty = Type::scalable_vector(&[4], &[true], ElementType::F32);
    let a = g.argument("a", ty.clone());
    let b = g.argument("b", ty);
    let r = g
        .outer_product(OuterProductOp::new(a, b, None, CombiningKind::Add))
        .unwrap();
    g.add_output(r);
    let before = g.len();

    let report = apply_patterns(&mut g, &PatternSet::outer_product_lowering());
    assert!(report.applied.is_empty());
    assert_eq!(report.remaining.len(), 1);
    assert_eq!(g.len(), before);
}

#[test]
fn test_scalable_axpy_is_expanded() {
    let mut rng = StdRng::seed_from_u64(402);
    let mut g = Graph::new();
    let ty = Type::scalable_vector(&[8], &[true], ElementType::I32);
    let a = g.argument("a", ty.clone());
    let s = g.argument("s", Type::scalar(ElementType::I32));
    let c = g.argument("c", ty);
    let r = g
        .outer_product(OuterProductOp::new(a, s, Some(c), CombiningKind::Add))
        .unwrap();
    g.add_output(r);

    let bindings = common::random_bindings(&g, &mut rng);
    let expected = common::eval_outputs(&g, &bindings);
    let report = apply_patterns(&mut g, &PatternSet::outer_product_lowering());
    assert!(report.is_complete());
    assert_eq!(g.count_ops(|k| matches!(k, OpKind::Broadcast { .. })), 1);
    common::assert_literal_eq(&common::eval_outputs(&g, &bindings)[0], &expected[0]);
}
