//! Contraction to one dot product per output element.
//!
//! Operands are transposed so the reduction axis is innermost, then every
//! `(row, col)` of the result is `reduction <add> (row * col)` inserted into
//! a zero vector. The accumulator is added once at the end.

use tracing::trace;

use super::arith::{create_add, create_mul};
use super::outer::source_value;
use super::signature::Signature;
use crate::combining::CombiningKind;
use crate::contract::{ContractionOp, OperandPlan, classify};
use crate::error::LoweringError;
use crate::ir::{Graph, ValueId};
use crate::options::{ContractLowering, LoweringOptions};

/// Operand placement for the dot loop, when this strategy applies to `sig`.
pub(super) fn applicable(sig: &Signature, options: &LoweringOptions) -> Option<OperandPlan> {
    if sig.is_masked() {
        trace!("dot: masked contractions are not supported");
        return None;
    }
    if options.contract_lowering != ContractLowering::Dot {
        return None;
    }
    if sig.kind != CombiningKind::Add {
        trace!(kind = %sig.kind, "dot: only additive contractions");
        return None;
    }
    let Some(plan) = classify(&sig.maps, &sig.iterators).and_then(|e| e.dot) else {
        trace!("dot: layout not recognized");
        return None;
    };
    if !sig.same_element_types() {
        trace!("dot: mixed element types");
        return None;
    }
    if sig.res.scalable_dims().iter().any(|&s| s) {
        trace!("dot: output axes must be unrolled but are scalable");
        return None;
    }
    Some(plan)
}

pub(crate) fn lower(
    graph: &mut Graph,
    op: &ContractionOp,
    options: &LoweringOptions,
) -> Result<Option<ValueId>, LoweringError> {
    let sig = Signature::of(graph, op)?;
    let Some(plan) = applicable(&sig, options) else {
        return Ok(None);
    };
    let res_ty = sig.res;

    let lhs = source_value(graph, op, plan.first)?;
    let rhs = source_value(graph, op, plan.second)?;

    let rank = res_ty.rank();
    let rows = res_ty.dim_size(0);
    let cols = if rank == 1 { 1 } else { res_ty.dim_size(1) };

    let mut res = graph.zero(res_ty.clone());
    let mut columns: Vec<ValueId> = Vec::with_capacity(cols);
    for r in 0..rows {
        let row = graph.extract(lhs, &[r])?;
        for c in 0..cols {
            // Each column is extracted once and shared by all rows.
            if r == 0 {
                let col = if rank == 1 { rhs } else { graph.extract(rhs, &[c])? };
                columns.push(col);
            }
            let product = create_mul(graph, row, columns[c])?;
            let sum = graph.reduction(CombiningKind::Add, product, None, None)?;
            let pos = [r, c];
            res = graph.insert(sum, res, &pos[..rank])?;
        }
    }
    if let Some(acc) = op.acc {
        res = create_add(graph, res, acc)?;
    }
    Ok(Some(res))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexing::IndexMap;
    use crate::indexing::IteratorType::*;
    use crate::ir::OpKind;
    use crate::types::{ElementType, Type};

    fn matmul(g: &mut Graph, m: usize, n: usize, k: usize) -> ContractionOp {
        let a = g.argument("a", Type::vector(&[m, k], ElementType::I32));
        let b = g.argument("b", Type::vector(&[k, n], ElementType::I32));
        let c = g.argument("c", Type::vector(&[m, n], ElementType::I32));
        let maps = IndexMap::infer_from_lists(&[&[0, 2], &[2, 1], &[0, 1]]);
        ContractionOp::new(a, b, Some(c), maps, vec![Parallel, Parallel, Reduction])
    }

    #[test]
    fn test_one_reduction_per_output() {
        let mut g = Graph::new();
        let op = matmul(&mut g, 2, 3, 4);
        lower(&mut g, &op, &LoweringOptions::default()).unwrap().unwrap();
        assert_eq!(g.count_ops(|k| matches!(k, OpKind::Reduction { .. })), 6);
        // 2 rows of the lhs, 3 columns of the transposed rhs.
        assert_eq!(g.count_ops(|k| matches!(k, OpKind::Extract { .. })), 5);
        assert_eq!(g.count_ops(|k| matches!(k, OpKind::Transpose { .. })), 1);
    }

    #[test]
    fn test_masked_declines() {
        let mut g = Graph::new();
        let mut op = matmul(&mut g, 2, 2, 2);
        let m = g.argument("m", Type::vector(&[2, 2, 2], ElementType::I1));
        op.mask = Some(m);
        let before = g.len();
        assert!(lower(&mut g, &op, &LoweringOptions::default()).unwrap().is_none());
        assert_eq!(g.len(), before);
    }

    #[test]
    fn test_non_add_declines() {
        let mut g = Graph::new();
        let op = matmul(&mut g, 2, 2, 2).with_kind(CombiningKind::MaxSI);
        assert!(lower(&mut g, &op, &LoweringOptions::default()).unwrap().is_none());
    }

    #[test]
    fn test_tmatvec_has_no_dot_form() {
        let mut g = Graph::new();
        let a = g.argument("a", Type::vector(&[3, 2], ElementType::F32));
        let b = g.argument("b", Type::vector(&[3], ElementType::F32));
        let maps = IndexMap::infer_from_lists(&[&[0, 1], &[0], &[1]]);
        let op = ContractionOp::new(a, b, None, maps, vec![Reduction, Parallel]);
        assert!(lower(&mut g, &op, &LoweringOptions::default()).unwrap().is_none());
    }
}
