//! Lowering through outer products agrees with the naive contraction.

mod common;

use common::{Sizes, check_lowering, contract_output, is_matmat, layout_contraction};
use rand::SeedableRng;
use rand::rngs::StdRng;
use veclower::contract::layout_table;
use veclower::indexing::{IndexMap, IteratorType::*};
use veclower::{
    CombiningKind, ContractLowering, ContractionOp, ElementType, Graph, LoweringOptions, OpKind,
    Pattern, Type,
};

fn outer_options() -> LoweringOptions {
    LoweringOptions::default().with_contract_lowering(ContractLowering::OuterProduct)
}

#[test]
fn test_all_matmat_layouts_random() {
    let mut rng = StdRng::seed_from_u64(42);
    for (i, entry) in layout_table().iter().filter(is_matmat).enumerate() {
        for element in [ElementType::F32, ElementType::I32] {
            for _ in 0..4 {
                let sizes = Sizes::random(&mut rng);
                let mut g = Graph::new();
                let op = layout_contraction(&mut g, entry, sizes, element, true);
                contract_output(&mut g, op);

                let report = check_lowering(&g, outer_options(), &mut rng);
                assert_eq!(report.count(Pattern::ContractToOuterProduct), 1, "layout {i}");
                assert_eq!(report.count(Pattern::OuterProductExpansion), sizes.k, "layout {i}");
            }
        }
    }
}

#[test]
fn test_smallest_and_largest_sizes() {
    let mut rng = StdRng::seed_from_u64(7);
    for n in [1, 8] {
        for entry in layout_table().iter().filter(is_matmat) {
            let mut g = Graph::new();
            let sizes = Sizes { m: n, n, k: n };
            let op = layout_contraction(&mut g, entry, sizes, ElementType::I32, true);
            contract_output(&mut g, op);
            check_lowering(&g, outer_options(), &mut rng);
        }
    }
}

#[test]
fn test_vector_layouts_without_accumulator() {
    let mut rng = StdRng::seed_from_u64(11);
    for entry in layout_table().iter().filter(|e| !is_matmat(e)) {
        let sizes = Sizes::random(&mut rng);
        let mut g = Graph::new();
        let op = layout_contraction(&mut g, entry, sizes, ElementType::F32, false);
        contract_output(&mut g, op);
        let report = check_lowering(&g, outer_options(), &mut rng);
        assert_eq!(report.count(Pattern::ContractToOuterProduct), 1);
    }
}

#[test]
fn test_non_additive_kinds() {
    let mut rng = StdRng::seed_from_u64(3);
    let entry = &layout_table()[0];
    for (kind, element) in [
        (CombiningKind::MaxSI, ElementType::I32),
        (CombiningKind::MinSI, ElementType::I32),
        (CombiningKind::Xor, ElementType::I32),
        (CombiningKind::MaxNumF, ElementType::F32),
        (CombiningKind::Mul, ElementType::F32),
    ] {
        let mut g = Graph::new();
        let op = layout_contraction(&mut g, entry, Sizes::random(&mut rng), element, true)
            .with_kind(kind);
        contract_output(&mut g, op);
        check_lowering(&g, outer_options(), &mut rng);
    }
}

#[test]
fn test_mixed_precision_is_promoted() {
    let mut rng = StdRng::seed_from_u64(5);
    let mut g = Graph::new();
    let a = g.argument("a", Type::vector(&[3, 4], ElementType::I8));
    let b = g.argument("b", Type::vector(&[4, 2], ElementType::I8));
    let c = g.argument("c", Type::vector(&[3, 2], ElementType::I32));
    let maps = IndexMap::infer_from_lists(&[&[0, 2], &[2, 1], &[0, 1]]);
    let op = ContractionOp::new(a, b, Some(c), maps, vec![Parallel, Parallel, Reduction]);
    contract_output(&mut g, op);

    let mut lowered = g.clone();
    let report = veclower::apply_patterns(
        &mut lowered,
        &veclower::PatternSet::contract_lowering(outer_options()),
    );
    assert!(report.is_complete());
    assert_eq!(lowered.count_ops(|k| matches!(k, OpKind::Extend { .. })), 8);

    check_lowering(&g, outer_options(), &mut rng);
}

#[test]
fn test_expansion_produces_fma_rows() {
    let mut g = Graph::new();
    let entry = &layout_table()[0];
    let op = layout_contraction(
        &mut g,
        entry,
        Sizes { m: 3, n: 5, k: 2 },
        ElementType::F32,
        true,
    );
    contract_output(&mut g, op);
    let report = veclower::apply_patterns(
        &mut g,
        &veclower::PatternSet::contract_lowering(outer_options()),
    );
    assert!(report.is_complete());
    // One fma per row of every outer product.
    assert_eq!(g.count_ops(|k| matches!(k, OpKind::Fma { .. })), 3 * 2);
}
