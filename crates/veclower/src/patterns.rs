//! The rewrite patterns and the worklist driver that applies them.
//!
//! # Example
//!
//! ```
//! use veclower::indexing::{IndexMap, IteratorType::*};
//! use veclower::{
//!     ContractionOp, ContractLowering, ElementType, Graph, LoweringOptions, PatternSet, Type,
//!     apply_patterns,
//! };
//!
//! let mut g = Graph::new();
//! let a = g.argument("a", Type::vector(&[2, 3], ElementType::F32));
//! let b = g.argument("b", Type::vector(&[3, 4], ElementType::F32));
//! let c = g.argument("c", Type::vector(&[2, 4], ElementType::F32));
//! let maps = IndexMap::infer_from_lists(&[&[0, 2], &[2, 1], &[0, 1]]);
//! let op = ContractionOp::new(a, b, Some(c), maps, vec![Parallel, Parallel, Reduction]);
//! let r = g.contract(op).unwrap();
//! g.add_output(r);
//!
//! let options = LoweringOptions::default().with_contract_lowering(ContractLowering::OuterProduct);
//! let report = apply_patterns(&mut g, &PatternSet::contract_lowering(options));
//! assert!(report.is_complete());
//! assert_eq!(g.count_ops(|k| k.mnemonic() == "contract"), 0);
//! ```

use std::collections::VecDeque;
use std::fmt;

use tracing::{debug, instrument, trace, warn};

use crate::error::LoweringError;
use crate::ir::{Graph, OpId, OpKind, ValueId};
use crate::lowering::{dot, elementwise, outer, outer_product, peel};
use crate::options::LoweringOptions;

/// A rewrite rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pattern {
    /// `outerproduct` to extract/broadcast/fma/insert.
    OuterProductExpansion,
    ContractToOuterProduct,
    ContractToDot,
    ContractToElementwise,
    /// Generic fallback; always applicable to additive contractions.
    ContractPeeling,
}

impl Pattern {
    pub fn name(self) -> &'static str {
        match self {
            Pattern::OuterProductExpansion => "outer-product-expansion",
            Pattern::ContractToOuterProduct => "contract-to-outer-product",
            Pattern::ContractToDot => "contract-to-dot",
            Pattern::ContractToElementwise => "contract-to-elementwise",
            Pattern::ContractPeeling => "contract-peeling",
        }
    }

    /// Try to rewrite the operation `id`.
    ///
    /// Returns the value replacing the operation's result, `Ok(None)` when
    /// the pattern does not apply. Operations created by a failed or
    /// declined attempt are left in the graph; the driver rolls them back.
    pub fn match_and_rewrite(
        self,
        graph: &mut Graph,
        id: OpId,
        options: &LoweringOptions,
    ) -> Result<Option<ValueId>, LoweringError> {
        let op = graph.defining_op(id.result())?;
        match (self, op.kind()) {
            (Pattern::OuterProductExpansion, OpKind::OuterProduct(outer)) => {
                let outer = outer.clone();
                let ty = op.result_type().clone();
                outer_product::lower(graph, &outer, &ty)
            }
            (Pattern::OuterProductExpansion, _) => Ok(None),
            (_, OpKind::Contract(contract)) => {
                let contract = contract.as_ref().clone();
                if !options.accepts(graph, &contract) {
                    trace!(pattern = self.name(), "contraction rejected by filter");
                    return Ok(None);
                }
                match self {
                    Pattern::ContractToOuterProduct => outer::lower(graph, &contract, options),
                    Pattern::ContractToDot => dot::lower(graph, &contract, options),
                    Pattern::ContractToElementwise => elementwise::lower(graph, &contract, options),
                    Pattern::ContractPeeling => peel::lower(graph, &contract, options),
                    Pattern::OuterProductExpansion => Ok(None),
                }
            }
            _ => Ok(None),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered patterns plus the options they run with.
#[derive(Debug, Clone)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
    options: LoweringOptions,
}

impl PatternSet {
    /// Patterns lowering `contract` (and, unless disabled, the
    /// `outerproduct` ops it produces), in priority order.
    pub fn contract_lowering(options: LoweringOptions) -> Self {
        let mut patterns = Vec::with_capacity(5);
        if !options.disable_outer_product_lowering {
            patterns.push(Pattern::OuterProductExpansion);
        }
        patterns.extend([
            Pattern::ContractToOuterProduct,
            Pattern::ContractToDot,
            Pattern::ContractToElementwise,
            Pattern::ContractPeeling,
        ]);
        Self { patterns, options }
    }

    /// Only the `outerproduct` expander.
    pub fn outer_product_lowering() -> Self {
        Self {
            patterns: vec![Pattern::OuterProductExpansion],
            options: LoweringOptions::default(),
        }
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    pub fn options(&self) -> &LoweringOptions {
        &self.options
    }
}

/// One successful rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedRewrite {
    pub pattern: Pattern,
    pub op: OpId,
    /// Number of rewrites between a root operation and this one.
    pub depth: usize,
}

/// Outcome of [`apply_patterns`].
#[derive(Debug, Clone, Default)]
pub struct LoweringReport {
    pub applied: Vec<AppliedRewrite>,
    /// Operations whose lowering hit a hard failure; they are left in place.
    pub failures: Vec<(OpId, LoweringError)>,
    /// `contract`/`outerproduct` operations still live after the run.
    pub remaining: Vec<OpId>,
}

impl LoweringReport {
    /// No hard failure and nothing left to lower.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.remaining.is_empty()
    }

    pub fn max_depth(&self) -> usize {
        self.applied.iter().map(|r| r.depth).max().unwrap_or(0)
    }

    pub fn count(&self, pattern: Pattern) -> usize {
        self.applied.iter().filter(|r| r.pattern == pattern).count()
    }
}

fn is_lowerable(kind: &OpKind) -> bool {
    matches!(kind, OpKind::Contract(_) | OpKind::OuterProduct(_))
}

/// Rewrite `graph` until no pattern of `set` applies.
///
/// Every live `contract` and `outerproduct` is offered to the patterns in
/// order; the first that returns a value replaces the operation, and the
/// lowerable operations it created are queued in turn. Whatever a declined
/// or failed attempt created is rolled back.
#[instrument(skip_all, fields(patterns = set.patterns().len()))]
pub fn apply_patterns(graph: &mut Graph, set: &PatternSet) -> LoweringReport {
    let mut report = LoweringReport::default();
    let mut worklist: VecDeque<(OpId, usize)> = graph
        .live_ops()
        .filter(|&id| is_lowerable(graph.op(id).kind()))
        .map(|id| (id, 0))
        .collect();

    while let Some((id, depth)) = worklist.pop_front() {
        if graph.op(id).is_erased() {
            continue;
        }
        for &pattern in set.patterns() {
            let checkpoint = graph.checkpoint();
            match pattern.match_and_rewrite(graph, id, set.options()) {
                Ok(Some(value)) => {
                    graph.replace_all_uses_with(id.result(), value);
                    if let Err(err) = graph.erase(id) {
                        warn!(op = id.index(), %err, "rewritten operation still in use");
                        report.failures.push((id, err));
                        break;
                    }
                    let created: Vec<OpId> = graph
                        .ops_since(checkpoint)
                        .filter(|&new| is_lowerable(graph.op(new).kind()))
                        .collect();
                    debug!(
                        pattern = pattern.name(),
                        op = id.index(),
                        depth,
                        new_ops = graph.ops_since(checkpoint).count(),
                        "applied"
                    );
                    worklist.extend(created.into_iter().map(|new| (new, depth + 1)));
                    report.applied.push(AppliedRewrite {
                        pattern,
                        op: id,
                        depth,
                    });
                    break;
                }
                Ok(None) => graph.rollback(checkpoint),
                Err(err) => {
                    graph.rollback(checkpoint);
                    warn!(pattern = pattern.name(), op = id.index(), %err, "lowering failed");
                    report.failures.push((id, err));
                    break;
                }
            }
        }
    }

    report.remaining = graph
        .live_ops()
        .filter(|&id| is_lowerable(graph.op(id).kind()))
        .collect();
    report
}
