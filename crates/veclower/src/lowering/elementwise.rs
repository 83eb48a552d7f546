//! Contraction whose reduction axes all have extent 1, as plain
//! elementwise arithmetic.
//!
//! Each operand is broadcast over the result labels it lacks, transposed
//! so its unit reduction axes lead and its parallel axes follow in result
//! order, and stripped of the unit axes with a zero-offset extract. The two
//! operands then have the result shape and one multiply (or fma) finishes
//! the job.

use smallvec::SmallVec;
use tracing::trace;

use super::arith::create_contract_arith_op;
use super::signature::Signature;
use crate::contract::ContractionOp;
use crate::error::LoweringError;
use crate::indexing::{IndexMap, reduction_axes};
use crate::ir::{Graph, ValueId};
use crate::options::{ContractLowering, LoweringOptions};
use crate::types::Type;

/// How one operand is brought to the result shape.
struct OperandReshape {
    /// Result axes the operand lacks: (extent, scalable).
    broadcast: SmallVec<[(usize, bool); 4]>,
    permutation: SmallVec<[usize; 4]>,
    num_reductions: usize,
}

fn plan_operand(
    map: &IndexMap,
    acc_map: &IndexMap,
    reductions: &[usize],
    res_ty: &Type,
) -> OperandReshape {
    let num_parallel = acc_map.num_results();
    let num_to_broadcast = num_parallel - (map.num_results() - reductions.len());

    let mut broadcast = SmallVec::new();
    let mut permutation: SmallVec<[usize; 4]> =
        reductions.iter().map(|&axis| num_to_broadcast + axis).collect();
    for i in 0..num_parallel {
        match map.result_index(acc_map.dim_position(i)) {
            Some(axis) => permutation.push(num_to_broadcast + axis),
            None => {
                broadcast.push((res_ty.dim_size(i), res_ty.is_scalable_dim(i)));
                permutation.push(broadcast.len() - 1);
            }
        }
    }
    OperandReshape {
        broadcast,
        permutation,
        num_reductions: reductions.len(),
    }
}

fn apply_reshape(
    graph: &mut Graph,
    value: ValueId,
    reshape: &OperandReshape,
) -> Result<ValueId, LoweringError> {
    let mut value = value;
    if !reshape.broadcast.is_empty() {
        let ty = graph.value_type(value).clone();
        let shape: Vec<usize> = reshape
            .broadcast
            .iter()
            .map(|&(extent, _)| extent)
            .chain(ty.shape().iter().copied())
            .collect();
        let scalable: Vec<bool> = reshape
            .broadcast
            .iter()
            .map(|&(_, s)| s)
            .chain(ty.scalable_dims().iter().copied())
            .collect();
        let expanded = Type::scalable_vector(&shape, &scalable, ty.element_type());
        value = graph.broadcast(value, expanded)?;
    }
    let identity = reshape.permutation.iter().enumerate().all(|(i, &p)| i == p);
    if !identity {
        value = graph.transpose(value, &reshape.permutation)?;
    }
    let offsets: SmallVec<[usize; 4]> = SmallVec::from_elem(0, reshape.num_reductions);
    graph.extract(value, &offsets)
}

/// Whether every reduction axis of `sig` is a static unit axis and the
/// rest of this strategy's preconditions hold.
pub(super) fn applicable(sig: &Signature, options: &LoweringOptions) -> bool {
    if sig.is_masked() {
        trace!("elementwise: masked contractions are not supported");
        return false;
    }
    if options.contract_lowering != ContractLowering::ParallelArith {
        return false;
    }
    let unit = |ty: &Type, axis: usize| ty.dim_size(axis) == 1 && !ty.is_scalable_dim(axis);
    let lhs_unit = reduction_axes(&sig.maps[0], &sig.iterators)
        .into_iter()
        .all(|a| unit(&sig.lhs, a));
    let rhs_unit = reduction_axes(&sig.maps[1], &sig.iterators)
        .into_iter()
        .all(|a| unit(&sig.rhs, a));
    if !lhs_unit || !rhs_unit {
        trace!("elementwise: a reduction axis is not a static unit axis");
        return false;
    }
    if !sig.same_element_types() {
        trace!("elementwise: mixed element types");
        return false;
    }
    let element = sig.res.element_type();
    if !sig.kind.is_legal_for(element) {
        trace!(kind = %sig.kind, %element, "elementwise: combining kind illegal for element type");
        return false;
    }
    true
}

pub(crate) fn lower(
    graph: &mut Graph,
    op: &ContractionOp,
    options: &LoweringOptions,
) -> Result<Option<ValueId>, LoweringError> {
    let sig = Signature::of(graph, op)?;
    if !applicable(&sig, options) {
        return Ok(None);
    }
    let res_ty = sig.res;
    let lhs_reductions = reduction_axes(op.lhs_map(), &op.iterator_types);
    let rhs_reductions = reduction_axes(op.rhs_map(), &op.iterator_types);

    let lhs_plan = plan_operand(op.lhs_map(), op.acc_map(), &lhs_reductions, &res_ty);
    let rhs_plan = plan_operand(op.rhs_map(), op.acc_map(), &rhs_reductions, &res_ty);
    let lhs = apply_reshape(graph, op.lhs, &lhs_plan)?;
    let rhs = apply_reshape(graph, op.rhs, &rhs_plan)?;
    create_contract_arith_op(graph, lhs, rhs, op.acc, op.kind, None)
}
