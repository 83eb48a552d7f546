//! Arithmetic emitted by the lowerings: multiply, combine, promote.

use crate::combining::{BinaryOp, CombiningKind};
use crate::error::LoweringError;
use crate::ir::{Graph, ValueId};
use crate::types::ElementType;

/// Promote `value` to `element` with an `extend`, if it is narrower.
pub(crate) fn promote(
    graph: &mut Graph,
    value: ValueId,
    element: ElementType,
) -> Result<ValueId, LoweringError> {
    if graph.value_type(value).element_type() == element {
        return Ok(value);
    }
    graph.extend(value, element)
}

pub(crate) fn create_mul(graph: &mut Graph, x: ValueId, y: ValueId) -> Result<ValueId, LoweringError> {
    let element = graph.value_type(x).element_type();
    graph.binary(BinaryOp::mul(element), x, y)
}

pub(crate) fn create_add(graph: &mut Graph, x: ValueId, y: ValueId) -> Result<ValueId, LoweringError> {
    let element = graph.value_type(x).element_type();
    graph.binary(BinaryOp::add(element), x, y)
}

/// Fold `value` into `acc` with `kind`; masked-out lanes keep `acc`.
pub(crate) fn make_arith_reduction(
    graph: &mut Graph,
    kind: CombiningKind,
    value: ValueId,
    acc: ValueId,
    mask: Option<ValueId>,
) -> Result<ValueId, LoweringError> {
    let element = graph.value_type(value).element_type();
    let op = kind.binary_op(element).ok_or_else(|| {
        LoweringError::invalid("combine", format!("kind '{kind}' is illegal for {element}"))
    })?;
    let combined = graph.binary(op, value, acc)?;
    match mask {
        Some(mask) => graph.select(mask, combined, acc),
        None => Ok(combined),
    }
}

/// `combine(acc, x * y)` for `kind`.
///
/// Returns `Ok(None)` without creating anything when `kind` is illegal for
/// the element type. Float addition into a vector accumulator becomes a
/// single `fma`.
pub(crate) fn create_contract_arith_op(
    graph: &mut Graph,
    x: ValueId,
    y: ValueId,
    acc: Option<ValueId>,
    kind: CombiningKind,
    mask: Option<ValueId>,
) -> Result<Option<ValueId>, LoweringError> {
    let element = graph.value_type(x).element_type();
    if !kind.is_legal_for(element) {
        return Ok(None);
    }

    if let Some(acc) = acc {
        if element.is_float() && kind == CombiningKind::Add && graph.value_type(acc).is_vector() {
            let fma = graph.fma(x, y, acc)?;
            // fma itself is unmasked; masked-out lanes must keep `acc`.
            return match mask {
                Some(mask) => graph.select(mask, fma, acc).map(Some),
                None => Ok(Some(fma)),
            };
        }
    }

    let mul = create_mul(graph, x, y)?;
    match acc {
        Some(acc) => make_arith_reduction(graph, kind, mul, acc, mask).map(Some),
        None => Ok(Some(mul)),
    }
}
