//! Contraction to a chain of outer products along the reduction axis.
//!
//! ```text
//! %at = transpose %a, [1, 0]
//! %a0 = extract %at[0]
//! %b0 = extract %b[0]
//! %c0 = outerproduct %a0, %b0 acc(%c)
//! ...
//! %cK = outerproduct %aK, %bK acc(%cK-1)
//! ```

use tracing::trace;

use super::arith::promote;
use super::signature::Signature;
use crate::contract::{ContractionOp, LayoutEntry, Operand, Role, Source, classify};
use crate::error::LoweringError;
use crate::ir::{Graph, OuterProductOp, ValueId};
use crate::options::{ContractLowering, LoweringOptions};

/// Materialize a plan operand.
pub(super) fn source_value(
    graph: &mut Graph,
    op: &ContractionOp,
    source: Source,
) -> Result<ValueId, LoweringError> {
    let value = match source.operand {
        Operand::Lhs => op.lhs,
        Operand::Rhs => op.rhs,
    };
    if source.transpose {
        graph.transpose(value, &[1, 0])
    } else {
        Ok(value)
    }
}

/// The layout to unroll and the reduction extent, when this strategy
/// applies to `sig`.
pub(super) fn applicable(
    sig: &Signature,
    options: &LoweringOptions,
) -> Option<(&'static LayoutEntry, usize)> {
    if options.contract_lowering != ContractLowering::OuterProduct {
        return None;
    }
    let Some(entry) = classify(&sig.maps, &sig.iterators) else {
        trace!("outer product: layout not recognized");
        return None;
    };
    let axis = entry.lhs_reduction_axis();
    if sig.lhs.is_scalable_dim(axis) {
        trace!("outer product: reduction axis is scalable");
        return None;
    }
    Some((entry, sig.lhs.dim_size(axis)))
}

/// Lower a matmat/matvec/tmatvec contraction to outer products.
pub(crate) fn lower(
    graph: &mut Graph,
    op: &ContractionOp,
    options: &LoweringOptions,
) -> Result<Option<ValueId>, LoweringError> {
    let sig = Signature::of(graph, op)?;
    let Some((entry, size)) = applicable(&sig, options) else {
        return Ok(None);
    };
    let res_ty = sig.res;
    let element = res_ty.element_type();

    // Nothing is created before this point.
    let first = source_value(graph, op, entry.outer.first)?;
    let second = source_value(graph, op, entry.outer.second)?;
    let mask = match op.mask {
        Some(mask) => {
            // Reduction label first, then the result labels in result order.
            let k = entry.family.label(Role::K);
            let mut perm = vec![k];
            perm.extend_from_slice(op.acc_map().results());
            if perm.iter().enumerate().all(|(i, &p)| i == p) {
                Some(mask)
            } else {
                Some(graph.transpose(mask, &perm)?)
            }
        }
        None => None,
    };

    let mut res = match op.acc {
        Some(acc) => acc,
        None => {
            let identity = op.kind.identity(element);
            graph.splat(identity, res_ty.clone())
        }
    };
    for k in 0..size {
        let a = graph.extract(first, &[k])?;
        let b = graph.extract(second, &[k])?;
        let a = promote(graph, a, element)?;
        let b = promote(graph, b, element)?;
        let m = match mask {
            Some(mask) => Some(graph.extract(mask, &[k])?),
            None => None,
        };
        let step = OuterProductOp::new(a, b, Some(res), op.kind).with_mask(m);
        res = graph.outer_product(step)?;
    }
    Ok(Some(res))
}
