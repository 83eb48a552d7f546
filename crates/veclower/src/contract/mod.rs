//! The contraction operation.
//!
//! A contraction multiplies `lhs` and `rhs` elements whose axes are bound to
//! the same labels and folds the products over every reduction label into
//! the accumulator:
//!
//! ```text
//! result[par] = combine(acc[par], Σ_red lhs[lhs_map(par, red)] * rhs[rhs_map(par, red)])
//! ```
//!
//! # Example
//!
//! ```
//! use veclower::contract::ContractionOp;
//! use veclower::indexing::{IndexMap, IteratorType::*};
//! use veclower::ir::Graph;
//! use veclower::types::{ElementType, Type};
//!
//! let mut g = Graph::new();
//! let a = g.argument("a", Type::vector(&[2, 3], ElementType::F32));
//! let b = g.argument("b", Type::vector(&[3, 4], ElementType::F32));
//! let c = g.argument("c", Type::vector(&[2, 4], ElementType::F32));
//!
//! // (m, k) x (k, n) -> (m, n) with m = d0, n = d1, k = d2
//! let maps = IndexMap::infer_from_lists(&[&[0, 2], &[2, 1], &[0, 1]]);
//! let op = ContractionOp::new(a, b, Some(c), maps, vec![Parallel, Parallel, Reduction]);
//! let r = g.contract(op).unwrap();
//! assert_eq!(g.value_type(r).shape(), &[2, 4]);
//! ```

mod layout;
mod properties;

pub use layout::{
    LayoutEntry, LayoutFamily, Operand, OperandPlan, Role, Source, classify, layout_table,
};
pub use properties::ContractionDims;

use crate::combining::CombiningKind;
use crate::error::LoweringError;
use crate::indexing::{IndexMap, IteratorType};
use crate::ir::{Graph, ValueId};
use crate::types::Type;

/// Payload of a `contract` operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractionOp {
    pub lhs: ValueId,
    pub rhs: ValueId,
    /// Absent means the identity of `kind`.
    pub acc: Option<ValueId>,
    /// lhs, rhs and result maps, in that order.
    pub indexing_maps: [IndexMap; 3],
    pub iterator_types: Vec<IteratorType>,
    pub kind: CombiningKind,
    /// `i1` value shaped like the iteration domain.
    pub mask: Option<ValueId>,
}

impl ContractionOp {
    /// Create an additive contraction from its lhs, rhs and result maps.
    pub fn new(
        lhs: ValueId,
        rhs: ValueId,
        acc: Option<ValueId>,
        indexing_maps: [IndexMap; 3],
        iterator_types: Vec<IteratorType>,
    ) -> Self {
        Self {
            lhs,
            rhs,
            acc,
            indexing_maps,
            iterator_types,
            kind: CombiningKind::Add,
            mask: None,
        }
    }

    pub fn with_kind(mut self, kind: CombiningKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_mask(mut self, mask: Option<ValueId>) -> Self {
        self.mask = mask;
        self
    }

    #[inline]
    pub fn lhs_map(&self) -> &IndexMap {
        &self.indexing_maps[0]
    }

    #[inline]
    pub fn rhs_map(&self) -> &IndexMap {
        &self.indexing_maps[1]
    }

    #[inline]
    pub fn acc_map(&self) -> &IndexMap {
        &self.indexing_maps[2]
    }

    /// Size of the label domain.
    #[inline]
    pub fn num_dims(&self) -> usize {
        self.iterator_types.len()
    }

    pub fn lhs_type<'g>(&self, graph: &'g Graph) -> &'g Type {
        graph.value_type(self.lhs)
    }

    pub fn rhs_type<'g>(&self, graph: &'g Graph) -> &'g Type {
        graph.value_type(self.rhs)
    }

    pub fn is_masked(&self) -> bool {
        self.mask.is_some()
    }

    /// Batch, contracting and free axes of the operands.
    pub fn dims(&self) -> ContractionDims {
        ContractionDims::compute(&self.indexing_maps, &self.iterator_types)
    }

    /// `(extent, scalable)` of every label, read from whichever operand
    /// carries it.
    pub fn domain_extents(&self, graph: &Graph) -> Result<Vec<(usize, bool)>, LoweringError> {
        let operands = [
            (self.lhs_map(), self.lhs_type(graph)),
            (self.rhs_map(), self.rhs_type(graph)),
        ];
        (0..self.num_dims())
            .map(|dim| {
                operands
                    .iter()
                    .find_map(|(map, ty)| {
                        map.result_index(dim)
                            .map(|axis| (ty.dim_size(axis), ty.is_scalable_dim(axis)))
                    })
                    .ok_or_else(|| {
                        LoweringError::malformed(format!("label d{dim} appears in no operand map"))
                    })
            })
            .collect()
    }

    /// Check the structural rules and compute the result type.
    pub fn infer_result_type(&self, graph: &Graph) -> Result<Type, LoweringError> {
        let num_dims = self.num_dims();
        let lhs_ty = self.lhs_type(graph);
        let rhs_ty = self.rhs_type(graph);

        for (name, map) in ["lhs", "rhs", "result"].iter().zip(&self.indexing_maps) {
            if map.num_dims() != num_dims {
                return Err(LoweringError::malformed(format!(
                    "{name} map has {} dims, expected {num_dims}",
                    map.num_dims()
                )));
            }
            if !map.is_projected_permutation() {
                return Err(LoweringError::malformed(format!(
                    "{name} map {map} repeats a label"
                )));
            }
        }
        if self.lhs_map().num_results() != lhs_ty.rank() {
            return Err(LoweringError::RankMismatch {
                expected: self.lhs_map().num_results(),
                actual: lhs_ty.rank(),
            });
        }
        if self.rhs_map().num_results() != rhs_ty.rank() {
            return Err(LoweringError::RankMismatch {
                expected: self.rhs_map().num_results(),
                actual: rhs_ty.rank(),
            });
        }

        // Shared labels must agree in extent and scalability.
        for (i, &dim) in self.lhs_map().results().iter().enumerate() {
            if let Some(j) = self.rhs_map().result_index(dim) {
                if lhs_ty.dim_size(i) != rhs_ty.dim_size(j)
                    || lhs_ty.is_scalable_dim(i) != rhs_ty.is_scalable_dim(j)
                {
                    return Err(LoweringError::DimensionMismatch {
                        lhs_index: i,
                        rhs_index: j,
                        lhs_size: lhs_ty.dim_size(i),
                        rhs_size: rhs_ty.dim_size(j),
                    });
                }
            }
        }

        let extents = self.domain_extents(graph)?;
        for &dim in self.acc_map().results() {
            if self.iterator_types[dim].is_reduction() {
                return Err(LoweringError::malformed(format!(
                    "reduction label d{dim} appears in the result map"
                )));
            }
        }
        for (dim, it) in self.iterator_types.iter().enumerate() {
            if it.is_parallel() && self.acc_map().result_index(dim).is_none() {
                return Err(LoweringError::malformed(format!(
                    "parallel label d{dim} is missing from the result map"
                )));
            }
        }

        let element = match self.acc {
            Some(acc) => graph.value_type(acc).element_type(),
            None => lhs_ty.element_type(),
        };
        for (name, ty) in [("lhs", lhs_ty), ("rhs", rhs_ty)] {
            if !ty.element_type().can_extend_to(element) {
                return Err(LoweringError::invalid(
                    "contract",
                    format!("{name} element type {} cannot promote to {element}", ty.element_type()),
                ));
            }
        }

        let shape: Vec<usize> = self.acc_map().results().iter().map(|&d| extents[d].0).collect();
        let scalable: Vec<bool> = self.acc_map().results().iter().map(|&d| extents[d].1).collect();
        let result = Type::scalable_vector(&shape, &scalable, element);

        if let Some(acc) = self.acc {
            if graph.value_type(acc) != &result {
                return Err(LoweringError::invalid(
                    "contract",
                    format!("accumulator type {} differs from result type {result}", graph.value_type(acc)),
                ));
            }
        }
        if let Some(mask) = self.mask {
            let domain: Vec<usize> = extents.iter().map(|e| e.0).collect();
            let domain_scalable: Vec<bool> = extents.iter().map(|e| e.1).collect();
            let expected = Type::scalable_vector(&domain, &domain_scalable, crate::types::ElementType::I1);
            if graph.value_type(mask) != &expected {
                return Err(LoweringError::invalid(
                    "contract",
                    format!("mask type {} differs from iteration domain {expected}", graph.value_type(mask)),
                ));
            }
        }
        Ok(result)
    }
}
