//! Types-only view of a contraction.
//!
//! The strategies decide whether they apply from a [`Signature`] alone, so
//! peeling can ask the same question about child contractions it has not
//! built yet.

use crate::combining::CombiningKind;
use crate::contract::ContractionOp;
use crate::error::LoweringError;
use crate::indexing::{IndexMap, IteratorType, drop_iterator};
use crate::ir::Graph;
use crate::types::Type;

#[derive(Debug, Clone)]
pub(crate) struct Signature {
    pub maps: [IndexMap; 3],
    pub iterators: Vec<IteratorType>,
    pub lhs: Type,
    pub rhs: Type,
    pub res: Type,
    pub mask: Option<Type>,
    pub has_acc: bool,
    pub kind: CombiningKind,
}

impl Signature {
    pub fn of(graph: &Graph, op: &ContractionOp) -> Result<Self, LoweringError> {
        Ok(Self {
            maps: op.indexing_maps.clone(),
            iterators: op.iterator_types.clone(),
            lhs: op.lhs_type(graph).clone(),
            rhs: op.rhs_type(graph).clone(),
            res: op.infer_result_type(graph)?,
            mask: op.mask.map(|m| graph.value_type(m).clone()),
            has_acc: op.acc.is_some(),
            kind: op.kind,
        })
    }

    pub fn is_masked(&self) -> bool {
        self.mask.is_some()
    }

    /// Both operands carry the result element type.
    pub fn same_element_types(&self) -> bool {
        let element = self.res.element_type();
        self.lhs.element_type() == element && self.rhs.element_type() == element
    }

    /// The contraction left after removing `label` from the domain and the
    /// given axes from the operands and result.
    ///
    /// Children always get an accumulator.
    pub fn without_label(
        &self,
        label: usize,
        lhs_axis: Option<usize>,
        rhs_axis: Option<usize>,
        res_axis: Option<usize>,
    ) -> Self {
        let drop = |ty: &Type, axis: Option<usize>| match axis {
            Some(a) => ty.drop_dim(a),
            None => ty.clone(),
        };
        Self {
            maps: self.maps.each_ref().map(|m| m.drop_dim(label)),
            iterators: drop_iterator(&self.iterators, label),
            lhs: drop(&self.lhs, lhs_axis),
            rhs: drop(&self.rhs, rhs_axis),
            res: drop(&self.res, res_axis),
            mask: self.mask.as_ref().map(|m| m.drop_dim(label)),
            has_acc: true,
            kind: self.kind,
        }
    }
}
