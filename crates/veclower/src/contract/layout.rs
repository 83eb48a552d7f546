//! Recognition of matrix-matrix and matrix-vector layouts.
//!
//! A contraction with one reduction label and one or two parallel labels
//! is one of 16 canonical layouts: 8 orientations of matrix-matrix
//! ("matmat"), 4 of matrix-vector with the parallel label first ("matvec")
//! and 4 with the reduction label first ("tmatvec"). Each layout is a row
//! of [`layout_table`]; matching compares all three maps exactly.
//!
//! A row also records how the unrolled lowerings consume the operands:
//! which original operand plays the first and second role, and whether it
//! must be transposed first.

use crate::indexing::{IndexMap, IteratorType};

/// Role of a label in a canonical layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    M,
    N,
    K,
}

/// Iterator structure of a layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutFamily {
    /// `(m, n, k)` with iterators parallel, parallel, reduction.
    Matmat,
    /// `(m, k)` with iterators parallel, reduction.
    Matvec,
    /// `(k, m)` with iterators reduction, parallel.
    Tmatvec,
}

impl LayoutFamily {
    /// Label bound to `role`.
    pub fn label(self, role: Role) -> usize {
        match (self, role) {
            (LayoutFamily::Matmat, Role::M) => 0,
            (LayoutFamily::Matmat, Role::N) => 1,
            (LayoutFamily::Matmat, Role::K) => 2,
            (LayoutFamily::Matvec, Role::M) => 0,
            (LayoutFamily::Matvec, Role::K) => 1,
            (LayoutFamily::Tmatvec, Role::K) => 0,
            (LayoutFamily::Tmatvec, Role::M) => 1,
            // Vector layouts have no `n`; no table row uses it.
            (_, Role::N) => usize::MAX,
        }
    }

    pub fn iterators(self) -> &'static [IteratorType] {
        use IteratorType::*;
        match self {
            LayoutFamily::Matmat => &[Parallel, Parallel, Reduction],
            LayoutFamily::Matvec => &[Parallel, Reduction],
            LayoutFamily::Tmatvec => &[Reduction, Parallel],
        }
    }
}

/// One of the two contraction operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Lhs,
    Rhs,
}

/// An operand, optionally transposed with `[1, 0]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Source {
    pub operand: Operand,
    pub transpose: bool,
}

/// The two values an unrolled lowering iterates over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperandPlan {
    pub first: Source,
    pub second: Source,
}

/// A row of the layout table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutEntry {
    pub family: LayoutFamily,
    pub lhs: &'static [Role],
    pub rhs: &'static [Role],
    pub acc: &'static [Role],
    /// Operands with the reduction axis leading.
    pub outer: OperandPlan,
    /// Operands with the reduction axis innermost; `None` for tmatvec.
    pub dot: Option<OperandPlan>,
}

impl LayoutEntry {
    /// Position of the reduction axis in the lhs.
    pub fn lhs_reduction_axis(&self) -> usize {
        self.lhs.iter().position(|&r| r == Role::K).unwrap_or(0)
    }

    /// Whether `maps` are exactly this row's maps.
    pub fn matches(&self, maps: &[IndexMap; 3], iterators: &[IteratorType]) -> bool {
        if iterators != self.family.iterators() {
            return false;
        }
        let num_dims = iterators.len();
        [self.lhs, self.rhs, self.acc]
            .iter()
            .zip(maps)
            .all(|(roles, map)| {
                map.num_dims() == num_dims
                    && map.num_results() == roles.len()
                    && roles
                        .iter()
                        .zip(map.results())
                        .all(|(&role, &label)| self.family.label(role) == label)
            })
    }
}

const fn src(operand: Operand, transpose: bool) -> Source {
    Source { operand, transpose }
}

const fn plan(first: Source, second: Source) -> OperandPlan {
    OperandPlan { first, second }
}

const L: Operand = Operand::Lhs;
const R: Operand = Operand::Rhs;

const fn matmat(
    lhs: &'static [Role],
    rhs: &'static [Role],
    acc: &'static [Role],
    outer: OperandPlan,
    dot: OperandPlan,
) -> LayoutEntry {
    LayoutEntry {
        family: LayoutFamily::Matmat,
        lhs,
        rhs,
        acc,
        outer,
        dot: Some(dot),
    }
}

const fn vector(
    family: LayoutFamily,
    lhs: &'static [Role],
    rhs: &'static [Role],
    outer: OperandPlan,
    dot: Option<OperandPlan>,
) -> LayoutEntry {
    LayoutEntry {
        family,
        lhs,
        rhs,
        acc: &[Role::M],
        outer,
        dot,
    }
}

use LayoutFamily::{Matvec, Tmatvec};
use Role::{K, M, N};

static LAYOUTS: [LayoutEntry; 16] = [
    matmat(&[M, K], &[K, N], &[M, N], plan(src(L, true), src(R, false)), plan(src(L, false), src(R, true))),
    matmat(&[M, K], &[N, K], &[M, N], plan(src(L, true), src(R, true)), plan(src(L, false), src(R, false))),
    matmat(&[K, M], &[K, N], &[M, N], plan(src(L, false), src(R, false)), plan(src(L, true), src(R, true))),
    matmat(&[K, M], &[N, K], &[M, N], plan(src(L, false), src(R, true)), plan(src(L, true), src(R, false))),
    // Transposed result: the rhs supplies the rows.
    matmat(&[M, K], &[K, N], &[N, M], plan(src(R, false), src(L, true)), plan(src(R, true), src(L, false))),
    matmat(&[M, K], &[N, K], &[N, M], plan(src(R, true), src(L, true)), plan(src(R, false), src(L, false))),
    matmat(&[K, M], &[K, N], &[N, M], plan(src(R, false), src(L, false)), plan(src(R, true), src(L, true))),
    matmat(&[K, M], &[N, K], &[N, M], plan(src(R, true), src(L, false)), plan(src(R, false), src(L, true))),
    vector(Matvec, &[M, K], &[K], plan(src(L, true), src(R, false)), Some(plan(src(L, false), src(R, false)))),
    vector(Matvec, &[K, M], &[K], plan(src(L, false), src(R, false)), Some(plan(src(L, true), src(R, false)))),
    vector(Matvec, &[K], &[M, K], plan(src(R, true), src(L, false)), Some(plan(src(R, false), src(L, false)))),
    vector(Matvec, &[K], &[K, M], plan(src(R, false), src(L, false)), Some(plan(src(R, true), src(L, false)))),
    vector(Tmatvec, &[M, K], &[K], plan(src(L, true), src(R, false)), None),
    vector(Tmatvec, &[K, M], &[K], plan(src(L, false), src(R, false)), None),
    vector(Tmatvec, &[K], &[M, K], plan(src(R, true), src(L, false)), None),
    vector(Tmatvec, &[K], &[K, M], plan(src(R, false), src(L, false)), None),
];

/// All recognized layouts, matmat rows first.
pub fn layout_table() -> &'static [LayoutEntry] {
    &LAYOUTS
}

/// The layout row equal to `maps`, if any.
pub fn classify(maps: &[IndexMap; 3], iterators: &[IteratorType]) -> Option<&'static LayoutEntry> {
    LAYOUTS.iter().find(|entry| entry.matches(maps, iterators))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexing::IteratorType::*;

    fn maps(lists: &[&[usize]; 3]) -> [IndexMap; 3] {
        IndexMap::infer_from_lists(lists)
    }

    #[test]
    fn test_table_size() {
        let table = layout_table();
        assert_eq!(table.len(), 16);
        let count = |f| table.iter().filter(|e| e.family == f).count();
        assert_eq!(count(LayoutFamily::Matmat), 8);
        assert_eq!(count(LayoutFamily::Matvec), 4);
        assert_eq!(count(LayoutFamily::Tmatvec), 4);
    }

    #[test]
    fn test_rows_are_distinct() {
        let table = layout_table();
        for (i, a) in table.iter().enumerate() {
            for b in &table[i + 1..] {
                assert!(
                    a.family != b.family || a.lhs != b.lhs || a.rhs != b.rhs || a.acc != b.acc,
                    "duplicate row {a:?}"
                );
            }
        }
    }

    #[test]
    fn test_classify_row_major_matmul() {
        let entry = classify(&maps(&[&[0, 2], &[2, 1], &[0, 1]]), &[Parallel, Parallel, Reduction])
            .unwrap();
        assert_eq!(entry.family, LayoutFamily::Matmat);
        assert_eq!(entry.lhs_reduction_axis(), 1);
        assert_eq!(entry.outer.first, Source { operand: Operand::Lhs, transpose: true });
    }

    #[test]
    fn test_classify_transposed_output() {
        let entry = classify(&maps(&[&[2, 0], &[2, 1], &[1, 0]]), &[Parallel, Parallel, Reduction])
            .unwrap();
        assert_eq!(entry.acc, &[Role::N, Role::M]);
        assert_eq!(entry.outer.first.operand, Operand::Rhs);
        assert!(!entry.outer.first.transpose && !entry.outer.second.transpose);
    }

    #[test]
    fn test_classify_vector_families() {
        let matvec = classify(&maps(&[&[0, 1], &[1], &[0]]), &[Parallel, Reduction]).unwrap();
        assert_eq!(matvec.family, LayoutFamily::Matvec);
        assert!(matvec.dot.is_some());

        // Same label lists, reduction label first.
        let tmatvec = classify(&maps(&[&[1, 0], &[0], &[1]]), &[Reduction, Parallel]).unwrap();
        assert_eq!(tmatvec.family, LayoutFamily::Tmatvec);
        assert_eq!(tmatvec.lhs, &[Role::M, Role::K]);
        assert!(tmatvec.dot.is_none());
    }

    #[test]
    fn test_no_partial_match() {
        // Batched matmul has four labels.
        let batched = maps(&[&[0, 1, 3], &[0, 3, 2], &[0, 1, 2]]);
        assert!(classify(&batched, &[Parallel, Parallel, Parallel, Reduction]).is_none());
        // Right maps, wrong iterators.
        let mm = maps(&[&[0, 2], &[2, 1], &[0, 1]]);
        assert!(classify(&mm, &[Parallel, Reduction, Parallel]).is_none());
    }
}
