//! Slicing a value along an arbitrary axis with leading-axis extract/insert.
//!
//! `extract` and `insert` only address leading axes, so reaching axis `k`
//! means unrolling axes `0..k` and rebuilding the value around the slice.

use crate::error::LoweringError;
use crate::ir::{Graph, ValueId};

/// Slice of `value` at `pos` along `axis`; `None` leaves it unchanged.
pub(crate) fn reshape_load(
    graph: &mut Graph,
    value: ValueId,
    axis: Option<usize>,
    pos: usize,
) -> Result<ValueId, LoweringError> {
    let axis = match axis {
        None => return Ok(value),
        Some(axis) => axis,
    };
    if axis == 0 {
        return graph.extract(value, &[pos]);
    }

    let ty = graph.value_type(value).clone();
    let mut result = graph.zero(ty.drop_dim(axis));
    for d in 0..ty.dim_size(0) {
        let ext = graph.extract(value, &[d])?;
        let load = reshape_load(graph, ext, Some(axis - 1), pos)?;
        result = graph.insert(load, result, &[d])?;
    }
    Ok(result)
}

/// `result` with `value` spliced in at `pos` along `axis`; `None` returns
/// `value`.
pub(crate) fn reshape_store(
    graph: &mut Graph,
    value: ValueId,
    mut result: ValueId,
    axis: Option<usize>,
    pos: usize,
) -> Result<ValueId, LoweringError> {
    let axis = match axis {
        None => return Ok(value),
        Some(axis) => axis,
    };
    if axis == 0 {
        return graph.insert(value, result, &[pos]);
    }

    let extent = graph.value_type(result).dim_size(0);
    for d in 0..extent {
        let ext = graph.extract(result, &[d])?;
        let ins = graph.extract(value, &[d])?;
        let sto = reshape_store(graph, ins, ext, Some(axis - 1), pos)?;
        result = graph.insert(sto, result, &[d])?;
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::Evaluator;
    use crate::literal::Literal;
    use crate::scalar::Scalar;
    use crate::types::{ElementType, Type};

    fn iota(shape: &[usize]) -> Literal {
        let n: usize = shape.iter().product();
        let data = (0..n).map(|i| Scalar::Int(i as i64)).collect();
        Literal::from_vec(Type::vector(shape, ElementType::I32), data).unwrap()
    }

    #[test]
    fn test_load_inner_axis() {
        let mut g = Graph::new();
        let a = g.argument("a", Type::vector(&[2, 3, 4], ElementType::I32));
        let s = reshape_load(&mut g, a, Some(1), 2).unwrap();
        assert_eq!(g.value_type(s).shape(), &[2, 4]);

        let input = iota(&[2, 3, 4]);
        let mut ev = Evaluator::new(&g);
        ev.bind("a", input.clone());
        let out = ev.eval(s).unwrap();
        for i in 0..2 {
            for k in 0..4 {
                assert_eq!(out.get(&[i, k]).unwrap(), input.get(&[i, 2, k]).unwrap());
            }
        }
    }

    #[test]
    fn test_store_inner_axis() {
        let mut g = Graph::new();
        let dest = g.argument("dest", Type::vector(&[2, 3], ElementType::I32));
        let col = g.argument("col", Type::vector(&[2], ElementType::I32));
        let r = reshape_store(&mut g, col, dest, Some(1), 1).unwrap();

        let mut ev = Evaluator::new(&g);
        ev.bind("dest", iota(&[2, 3]));
        ev.bind(
            "col",
            Literal::from_vec(Type::vector(&[2], ElementType::I32), vec![Scalar::Int(-1), Scalar::Int(-2)])
                .unwrap(),
        );
        let out = ev.eval(r).unwrap();
        assert_eq!(out.get(&[0, 1]).unwrap(), Scalar::Int(-1));
        assert_eq!(out.get(&[1, 1]).unwrap(), Scalar::Int(-2));
        assert_eq!(out.get(&[1, 2]).unwrap(), Scalar::Int(5));
    }

    #[test]
    fn test_absent_axis_is_identity() {
        let mut g = Graph::new();
        let a = g.argument("a", Type::vector(&[2], ElementType::F32));
        let before = g.len();
        assert_eq!(reshape_load(&mut g, a, None, 0).unwrap(), a);
        assert_eq!(g.len(), before);
    }
}
