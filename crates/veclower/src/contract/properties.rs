//! Structural analysis of a contraction.
//!
//! Classifies every operand axis by the role of the label it is bound to:
//!
//! - *batch*: a parallel label present on both operands (and therefore in
//!   the result)
//! - *contracting*: a reduction label present on both operands
//! - *free*: anything else, including a unit reduction axis that only one
//!   operand carries

use crate::indexing::{IndexMap, IteratorType};

/// Axis pairs and free axes of a contraction's operands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractionDims {
    /// Batch axis pairs: (axis in lhs, axis in rhs), in lhs axis order.
    pub batch: Vec<(usize, usize)>,

    /// Contracting axis pairs: (axis in lhs, axis in rhs), in lhs axis order.
    pub contracting: Vec<(usize, usize)>,

    /// Lhs axes that are not contracting (batch axes included).
    pub free_lhs: Vec<usize>,

    /// Rhs axes that are not contracting (batch axes included).
    pub free_rhs: Vec<usize>,
}

impl ContractionDims {
    /// Compute the axis classification from the lhs and rhs maps.
    ///
    /// # Example
    ///
    /// ```
    /// use veclower::contract::ContractionDims;
    /// use veclower::indexing::{IndexMap, IteratorType::*};
    ///
    /// // Batched matmul: (b, m, k) x (b, k, n) -> (b, m, n)
    /// // b = d0, m = d1, n = d2, k = d3
    /// let maps = IndexMap::infer_from_lists(&[&[0, 1, 3], &[0, 3, 2], &[0, 1, 2]]);
    /// let dims = ContractionDims::compute(&maps, &[Parallel, Parallel, Parallel, Reduction]);
    ///
    /// assert_eq!(dims.batch, vec![(0, 0)]);
    /// assert_eq!(dims.contracting, vec![(2, 1)]);
    /// assert_eq!(dims.free_lhs, vec![0, 1]);
    /// assert_eq!(dims.free_rhs, vec![0, 2]);
    /// ```
    pub fn compute(maps: &[IndexMap; 3], iterators: &[IteratorType]) -> Self {
        let (lhs_map, rhs_map) = (&maps[0], &maps[1]);

        let mut batch = Vec::new();
        let mut contracting = Vec::new();
        for (i, &label) in lhs_map.results().iter().enumerate() {
            if let Some(j) = rhs_map.result_index(label) {
                match iterators[label] {
                    IteratorType::Parallel => batch.push((i, j)),
                    IteratorType::Reduction => contracting.push((i, j)),
                }
            }
        }

        let free_lhs = (0..lhs_map.num_results())
            .filter(|i| !contracting.iter().any(|&(l, _)| l == *i))
            .collect();
        let free_rhs = (0..rhs_map.num_results())
            .filter(|j| !contracting.iter().any(|&(_, r)| r == *j))
            .collect();

        Self {
            batch,
            contracting,
            free_lhs,
            free_rhs,
        }
    }

    /// True if no axis of either operand is contracted.
    pub fn is_outer(&self) -> bool {
        self.contracting.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexing::IteratorType::*;

    fn maps(lists: &[&[usize]; 3]) -> [IndexMap; 3] {
        IndexMap::infer_from_lists(lists)
    }

    #[test]
    fn test_matmul() {
        // (m, k) x (k, n) -> (m, n)
        let dims = ContractionDims::compute(
            &maps(&[&[0, 2], &[2, 1], &[0, 1]]),
            &[Parallel, Parallel, Reduction],
        );
        assert!(dims.batch.is_empty());
        assert_eq!(dims.contracting, vec![(1, 0)]);
        assert_eq!(dims.free_lhs, vec![0]);
        assert_eq!(dims.free_rhs, vec![1]);
        assert!(!dims.is_outer());
    }

    #[test]
    fn test_outer_product() {
        // (i) x (j) -> (i, j)
        let dims = ContractionDims::compute(&maps(&[&[0], &[1], &[0, 1]]), &[Parallel, Parallel]);
        assert!(dims.is_outer());
        assert_eq!(dims.free_lhs, vec![0]);
        assert_eq!(dims.free_rhs, vec![0]);
    }

    #[test]
    fn test_one_sided_reduction_is_free() {
        // Unit reduction d1 only on lhs: (d0, d1) x (d0) -> (d0)
        let dims = ContractionDims::compute(&maps(&[&[0, 1], &[0], &[0]]), &[Parallel, Reduction]);
        assert_eq!(dims.batch, vec![(0, 0)]);
        assert!(dims.contracting.is_empty());
        assert_eq!(dims.free_lhs, vec![0, 1]);
    }

    #[test]
    fn test_dot() {
        // (k) x (k) -> ()
        let dims = ContractionDims::compute(&maps(&[&[0], &[0], &[]]), &[Reduction]);
        assert_eq!(dims.contracting, vec![(0, 0)]);
        assert!(dims.free_lhs.is_empty());
        assert!(dims.free_rhs.is_empty());
    }
}
