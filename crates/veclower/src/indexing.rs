//! Index maps and iterator types.
//!
//! A contraction iterates over a domain of labels `0..num_dims`. Each
//! operand carries an [`IndexMap`] listing, for every one of its axes, the
//! label that axis is bound to. Labels are plain dimension numbers: two
//! axes are bound to the same label exactly when their map entries are
//! equal.

use std::fmt;

use smallvec::SmallVec;

/// Whether a domain label is kept or folded away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IteratorType {
    Parallel,
    Reduction,
}

impl IteratorType {
    pub fn is_parallel(self) -> bool {
        self == IteratorType::Parallel
    }

    pub fn is_reduction(self) -> bool {
        self == IteratorType::Reduction
    }
}

impl fmt::Display for IteratorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IteratorType::Parallel => f.write_str("parallel"),
            IteratorType::Reduction => f.write_str("reduction"),
        }
    }
}

/// Ordered list of domain labels, one per operand axis.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexMap {
    num_dims: usize,
    results: SmallVec<[usize; 4]>,
}

impl IndexMap {
    /// Create a map over `num_dims` labels.
    ///
    /// # Panics
    ///
    /// Panics if a label is out of range.
    pub fn new(num_dims: usize, results: &[usize]) -> Self {
        assert!(
            results.iter().all(|&d| d < num_dims),
            "label out of range in {results:?} for {num_dims} dims"
        );
        Self {
            num_dims,
            results: results.iter().copied().collect(),
        }
    }

    /// Build the lhs, rhs and result maps from label lists, with the domain
    /// size inferred as one more than the largest label used.
    ///
    /// # Example
    ///
    /// ```
    /// use veclower::indexing::IndexMap;
    ///
    /// // (m, k), (k, n) -> (m, n) with m = 0, n = 1, k = 2
    /// let maps = IndexMap::infer_from_lists(&[&[0, 2], &[2, 1], &[0, 1]]);
    /// assert_eq!(maps[0].num_dims(), 3);
    /// assert_eq!(maps[1].dim_position(0), 2);
    /// ```
    pub fn infer_from_lists(lists: &[&[usize]; 3]) -> [IndexMap; 3] {
        let num_dims = lists
            .iter()
            .flat_map(|l| l.iter())
            .map(|&d| d + 1)
            .max()
            .unwrap_or(0);
        lists.map(|l| IndexMap::new(num_dims, l))
    }

    /// Size of the label domain.
    #[inline]
    pub fn num_dims(&self) -> usize {
        self.num_dims
    }

    /// Number of axes of the mapped operand.
    #[inline]
    pub fn num_results(&self) -> usize {
        self.results.len()
    }

    #[inline]
    pub fn results(&self) -> &[usize] {
        &self.results
    }

    /// Label bound to axis `axis`.
    #[inline]
    pub fn dim_position(&self, axis: usize) -> usize {
        self.results[axis]
    }

    /// Axis bound to label `dim`, if any.
    pub fn result_index(&self, dim: usize) -> Option<usize> {
        self.results.iter().position(|&d| d == dim)
    }

    /// Map with label `dim` removed from the domain.
    ///
    /// Axes bound to `dim` disappear; labels after it are renumbered down
    /// by one, preserving order.
    pub fn drop_dim(&self, dim: usize) -> IndexMap {
        let results = self
            .results
            .iter()
            .filter(|&&d| d != dim)
            .map(|&d| if d < dim { d } else { d - 1 })
            .collect();
        IndexMap {
            num_dims: self.num_dims - 1,
            results,
        }
    }

    /// Whether no label occurs twice.
    pub fn is_projected_permutation(&self) -> bool {
        let mut seen = vec![false; self.num_dims];
        for &d in &self.results {
            if seen[d] {
                return false;
            }
            seen[d] = true;
        }
        true
    }
}

impl fmt::Display for IndexMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for d in 0..self.num_dims {
            if d > 0 {
                f.write_str(", ")?;
            }
            write!(f, "d{d}")?;
        }
        f.write_str(") -> (")?;
        for (i, d) in self.results.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "d{d}")?;
        }
        f.write_str(")")
    }
}

/// Iterator types with the entry for label `dim` removed.
pub fn drop_iterator(iterators: &[IteratorType], dim: usize) -> Vec<IteratorType> {
    iterators
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != dim)
        .map(|(_, &it)| it)
        .collect()
}

/// Positions of the axes of `map` bound to reduction labels.
pub fn reduction_axes(map: &IndexMap, iterators: &[IteratorType]) -> Vec<usize> {
    (0..map.num_results())
        .filter(|&i| iterators[map.dim_position(i)].is_reduction())
        .collect()
}
