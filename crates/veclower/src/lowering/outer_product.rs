//! Expansion of the outer-product primitive.
//!
//! ```text
//! %z = constant splat(0)
//! %0 = extract %lhs[0]
//! %1 = broadcast %0
//! %2 = extract %acc[0]
//! %3 = fma %1, %rhs, %2
//! %4 = insert %3, %z[0]
//! ...
//! ```
//!
//! With a scalar rhs (axpy) the rhs is broadcast once instead and the whole
//! result is produced by one multiply-combine.

use tracing::trace;

use super::arith::create_contract_arith_op;
use crate::error::LoweringError;
use crate::ir::{Graph, OuterProductOp, ValueId};
use crate::types::Type;

pub(crate) fn lower(
    graph: &mut Graph,
    op: &OuterProductOp,
    res_ty: &Type,
) -> Result<Option<ValueId>, LoweringError> {
    let vector = match res_ty.as_vector() {
        Some(v) => v,
        None => return Ok(None),
    };
    if vector.rank() >= 2 && vector.all_dims_scalable() {
        trace!("outer product expansion: every result axis is scalable");
        return Ok(None);
    }
    let element = res_ty.element_type();
    if !op.kind.is_legal_for(element) {
        trace!(kind = %op.kind, %element, "outer product expansion: kind illegal for element type");
        return Ok(None);
    }

    let lhs_ty = graph.value_type(op.lhs).clone();
    let rhs_ty = graph.value_type(op.rhs).clone();

    if !rhs_ty.is_vector() {
        let b = graph.broadcast(op.rhs, lhs_ty)?;
        return create_contract_arith_op(graph, op.lhs, b, op.acc, op.kind, op.mask);
    }

    if res_ty.is_scalable_dim(0) {
        trace!("outer product expansion: leading axis is scalable");
        return Ok(None);
    }

    let mut result = graph.zero(res_ty.clone());
    for d in 0..res_ty.dim_size(0) {
        let x = graph.extract(op.lhs, &[d])?;
        let a = graph.broadcast(x, rhs_ty.clone())?;
        let r = match op.acc {
            Some(acc) => Some(graph.extract(acc, &[d])?),
            None => None,
        };
        let m = match op.mask {
            Some(mask) => Some(graph.extract(mask, &[d])?),
            None => None,
        };
        let Some(row) = create_contract_arith_op(graph, a, op.rhs, r, op.kind, m)? else {
            return Ok(None);
        };
        result = graph.insert(row, result, &[d])?;
    }
    Ok(Some(result))
}
