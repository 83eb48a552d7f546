//! Generic lowering by peeling one domain label at a time.
//!
//! Each rewrite removes one label from the iteration domain and emits one
//! smaller contraction per index of the peeled axis; the driver offers
//! those to the whole pattern set again. Labels are peeled in this order:
//!
//! 1. the first batch pair,
//! 2. the first lhs axis that is not contracted,
//! 3. the first rhs axis that is not contracted,
//! 4. reduction label 0, folding the running result through the children.
//!
//! A rank-1 by rank-1 reduction ends in `mul` + `reduction <add>`, and a
//! contraction over an empty domain ends in scalar `mul` + `add`.
//!
//! Before anything is emitted the path is simulated on types only
//! ([`PeelPlan`]) down to the first children that the preferred strategy
//! lowers outright, or to the terminal step. A contraction whose path would
//! unroll a scalable axis on the way is declined up front and stays
//! untouched.

use tracing::trace;

use super::arith::{create_contract_arith_op, create_mul};
use super::reshape::{reshape_load, reshape_store};
use super::signature::Signature;
use super::{dot, elementwise, outer};
use crate::combining::CombiningKind;
use crate::contract::{ContractionDims, ContractionOp};
use crate::error::LoweringError;
use crate::indexing::{IndexMap, IteratorType, drop_iterator};
use crate::ir::{Graph, ValueId};
use crate::options::{ContractLowering, LoweringOptions};
use crate::types::Type;

/// Which kind of axis a peeling step removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeelState {
    PeelingBatch,
    PeelingFreeLhs,
    PeelingFreeRhs,
    PeelingReduction,
    /// Nothing left to peel.
    Bottomed,
}

/// One step of the peel path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeelStep {
    pub state: PeelState,
    /// Domain size of the contraction this step applies to.
    pub num_dims: usize,
    /// Label removed from the domain; `None` when bottomed.
    pub label: Option<usize>,
    pub lhs_index: Option<usize>,
    pub rhs_index: Option<usize>,
    /// Result axis bound to `label`, if any.
    pub res_index: Option<usize>,
    /// Number of child contractions emitted.
    pub extent: usize,
    /// The step finishes with arithmetic instead of child contractions.
    pub terminal: bool,
}

/// The next step for `sig`, or `Ok(None)` when peeling cannot proceed.
fn next_step(sig: &Signature) -> Result<Option<PeelStep>, LoweringError> {
    let dims = ContractionDims::compute(&sig.maps, &sig.iterators);

    if let Some(&(l, r)) = dims.batch.first() {
        return parallel_step(sig, PeelState::PeelingBatch, Some(l), Some(r));
    }
    let contracting_lhs = |i: usize| dims.contracting.iter().any(|&(l, _)| l == i);
    let contracting_rhs = |j: usize| dims.contracting.iter().any(|&(_, r)| r == j);
    if let Some(l) = (0..sig.lhs.rank()).find(|&i| !contracting_lhs(i)) {
        return parallel_step(sig, PeelState::PeelingFreeLhs, Some(l), None);
    }
    if let Some(r) = (0..sig.rhs.rank()).find(|&j| !contracting_rhs(j)) {
        return parallel_step(sig, PeelState::PeelingFreeRhs, None, Some(r));
    }
    if !dims.contracting.is_empty() {
        return reduction_step(sig);
    }

    if !sig.has_acc {
        trace!("peel: empty domain without accumulator");
        return Ok(None);
    }
    Ok(Some(PeelStep {
        state: PeelState::Bottomed,
        num_dims: sig.iterators.len(),
        label: None,
        lhs_index: None,
        rhs_index: None,
        res_index: None,
        extent: 0,
        terminal: true,
    }))
}

fn parallel_step(
    sig: &Signature,
    state: PeelState,
    lhs_index: Option<usize>,
    rhs_index: Option<usize>,
) -> Result<Option<PeelStep>, LoweringError> {
    let (label, extent) = match (lhs_index, rhs_index) {
        (Some(l), _) => {
            let label = sig.maps[0].dim_position(l);
            if let Some(r) = rhs_index {
                if sig.maps[1].dim_position(r) != label {
                    return Err(LoweringError::malformed(format!(
                        "lhs axis {l} and rhs axis {r} map to different labels"
                    )));
                }
            }
            (label, sig.lhs.dim_size(l))
        }
        (None, Some(r)) => (sig.maps[1].dim_position(r), sig.rhs.dim_size(r)),
        (None, None) => {
            return Err(LoweringError::malformed("no operand axis to peel"));
        }
    };

    // A label missing from the result is only tolerated for a unit axis.
    let res_index = sig.maps[2].result_index(label);
    if res_index.is_none() && extent != 1 {
        trace!(label, extent, "peel: non-unit axis missing from the result");
        return Ok(None);
    }

    Ok(Some(PeelStep {
        state,
        num_dims: sig.iterators.len(),
        label: Some(label),
        lhs_index,
        rhs_index,
        res_index,
        extent,
        terminal: false,
    }))
}

fn reduction_step(sig: &Signature) -> Result<Option<PeelStep>, LoweringError> {
    if sig.res.is_vector() {
        trace!("peel: reduction with a vector result");
        return Ok(None);
    }
    let label = 0;
    let lhs_index = sig.maps[0].result_index(label).ok_or_else(|| {
        LoweringError::malformed(format!("reduction label d{label} has no lhs axis"))
    })?;
    let rhs_index = sig.maps[1].result_index(label).ok_or_else(|| {
        LoweringError::malformed(format!("reduction label d{label} has no rhs axis"))
    })?;
    let extent = sig.lhs.dim_size(lhs_index);
    if extent != sig.rhs.dim_size(rhs_index) {
        return Err(LoweringError::DimensionMismatch {
            lhs_index,
            rhs_index,
            lhs_size: extent,
            rhs_size: sig.rhs.dim_size(rhs_index),
        });
    }
    let terminal = sig.lhs.rank() == 1;
    if terminal && sig.rhs.rank() != 1 {
        trace!("peel: rank-1 lhs with higher-rank rhs");
        return Ok(None);
    }

    Ok(Some(PeelStep {
        state: PeelState::PeelingReduction,
        num_dims: sig.iterators.len(),
        label: Some(label),
        lhs_index: Some(lhs_index),
        rhs_index: Some(rhs_index),
        res_index: None,
        extent,
        terminal,
    }))
}

/// Whether `step` unrolls a scalable axis of any value it slices: the
/// peeled axis itself or a leading axis walked through to reach it.
fn unrolls_scalable(sig: &Signature, step: &PeelStep) -> bool {
    if step.terminal {
        return false;
    }
    let sliced = |ty: &Type, axis: Option<usize>| axis.is_some_and(|a| !ty.leading_dims_static(a));
    sliced(&sig.lhs, step.lhs_index)
        || sliced(&sig.rhs, step.rhs_index)
        || sliced(&sig.res, step.res_index)
        || sig.mask.as_ref().is_some_and(|m| sliced(m, step.label))
}

/// The contraction each child of `step` computes.
fn child(sig: &Signature, step: &PeelStep) -> Signature {
    sig.without_label(
        step.label.unwrap_or(0),
        step.lhs_index,
        step.rhs_index,
        step.res_index,
    )
}

/// Whether a strategy tried ahead of peeling lowers `sig` outright.
fn handled_by_preferred(sig: &Signature, options: &LoweringOptions) -> bool {
    outer::applicable(sig, options).is_some()
        || dot::applicable(sig, options).is_some()
        || elementwise::applicable(sig, options)
}

/// The sequence of peeling steps for one contraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeelPlan {
    pub steps: Vec<PeelStep>,
    /// Strategy that lowers the children of the last step, when peeling
    /// stops before bottoming out.
    pub handoff: Option<ContractLowering>,
}

impl PeelPlan {
    /// Simulate peeling `op` all the way down to its terminal step.
    ///
    /// Returns `Ok(None)` when some step would decline, including any step
    /// that unrolls a scalable axis.
    pub fn simulate(graph: &Graph, op: &ContractionOp) -> Result<Option<PeelPlan>, LoweringError> {
        let options = LoweringOptions::default().with_contract_lowering(ContractLowering::Peeling);
        Self::simulate_with(graph, op, &options)
    }

    /// Simulate peeling `op` until its children are either terminal or
    /// lowered by the strategy `options` prefers.
    ///
    /// Every step on the path is checked, so a contraction that would get
    /// stuck part way is declined before anything is emitted.
    pub fn simulate_with(
        graph: &Graph,
        op: &ContractionOp,
        options: &LoweringOptions,
    ) -> Result<Option<PeelPlan>, LoweringError> {
        let mut sig = Signature::of(graph, op)?;
        let mut steps = Vec::new();
        loop {
            let Some(step) = next_step(&sig)? else {
                return Ok(None);
            };
            if unrolls_scalable(&sig, &step) {
                trace!(?step, "peel: step would unroll a scalable axis");
                return Ok(None);
            }
            if step.terminal {
                steps.push(step);
                return Ok(Some(PeelPlan {
                    steps,
                    handoff: None,
                }));
            }
            sig = child(&sig, &step);
            steps.push(step);
            if handled_by_preferred(&sig, options) {
                return Ok(Some(PeelPlan {
                    steps,
                    handoff: Some(options.contract_lowering),
                }));
            }
        }
    }

    /// Steps that emit child contractions.
    pub fn num_peels(&self) -> usize {
        self.steps.iter().filter(|s| !s.terminal).count()
    }

    pub fn first(&self) -> &PeelStep {
        &self.steps[0]
    }
}

pub(crate) fn lower(
    graph: &mut Graph,
    op: &ContractionOp,
    options: &LoweringOptions,
) -> Result<Option<ValueId>, LoweringError> {
    let res_ty = op.infer_result_type(graph)?;
    let element = res_ty.element_type();
    if op.lhs_type(graph).element_type() != element || op.rhs_type(graph).element_type() != element {
        trace!("peel: mixed element types");
        return Ok(None);
    }
    if op.kind != CombiningKind::Add {
        return Err(LoweringError::UnsupportedCombiningKind { kind: op.kind });
    }

    if let Some(v) = outer::lower(graph, op, options)? {
        return Ok(Some(v));
    }
    if let Some(v) = dot::lower(graph, op, options)? {
        return Ok(Some(v));
    }
    if let Some(v) = elementwise::lower(graph, op, options)? {
        return Ok(Some(v));
    }

    let Some(plan) = PeelPlan::simulate_with(graph, op, options)? else {
        return Ok(None);
    };
    let step = plan.first();
    trace!(state = ?step.state, label = ?step.label, extent = step.extent, "peel");

    match step.state {
        PeelState::PeelingBatch | PeelState::PeelingFreeLhs | PeelState::PeelingFreeRhs => {
            lower_parallel(graph, op, step, &res_ty).map(Some)
        }
        PeelState::PeelingReduction if step.terminal => lower_dot_product(graph, op).map(Some),
        PeelState::PeelingReduction => lower_reduction(graph, op, step, &res_ty).map(Some),
        PeelState::Bottomed => {
            let acc = op.acc.ok_or_else(|| LoweringError::malformed("bottomed without accumulator"))?;
            create_contract_arith_op(graph, op.lhs, op.rhs, Some(acc), op.kind, op.mask)
        }
    }
}

fn child_maps(op: &ContractionOp, label: usize) -> ([IndexMap; 3], Vec<IteratorType>) {
    let maps = op.indexing_maps.each_ref().map(|m| m.drop_dim(label));
    (maps, drop_iterator(&op.iterator_types, label))
}

/// One child contraction per index of a parallel (or unit) axis.
fn lower_parallel(
    graph: &mut Graph,
    op: &ContractionOp,
    step: &PeelStep,
    res_ty: &Type,
) -> Result<ValueId, LoweringError> {
    let label = step.label.ok_or_else(|| LoweringError::malformed("parallel step without label"))?;
    let (maps, iterators) = child_maps(op, label);
    let acc = match op.acc {
        Some(acc) => acc,
        None => graph.zero(res_ty.clone()),
    };

    let mut result = graph.zero(res_ty.clone());
    for d in 0..step.extent {
        let lhs = reshape_load(graph, op.lhs, step.lhs_index, d)?;
        let rhs = reshape_load(graph, op.rhs, step.rhs_index, d)?;
        let low_acc = reshape_load(graph, acc, step.res_index, d)?;
        let low_mask = match op.mask {
            Some(mask) => Some(reshape_load(graph, mask, Some(label), d)?),
            None => None,
        };
        let child = ContractionOp::new(lhs, rhs, Some(low_acc), maps.clone(), iterators.clone())
            .with_kind(op.kind)
            .with_mask(low_mask);
        let low = graph.contract(child)?;
        result = reshape_store(graph, low, result, step.res_index, d)?;
    }
    Ok(result)
}

/// Fold the reduction label through one child per index.
fn lower_reduction(
    graph: &mut Graph,
    op: &ContractionOp,
    step: &PeelStep,
    res_ty: &Type,
) -> Result<ValueId, LoweringError> {
    let label = step.label.unwrap_or(0);
    let (maps, iterators) = child_maps(op, label);
    let mut result = match op.acc {
        Some(acc) => acc,
        None => graph.zero(res_ty.clone()),
    };
    for d in 0..step.extent {
        let lhs = reshape_load(graph, op.lhs, step.lhs_index, d)?;
        let rhs = reshape_load(graph, op.rhs, step.rhs_index, d)?;
        let low_mask = match op.mask {
            Some(mask) => Some(reshape_load(graph, mask, Some(label), d)?),
            None => None,
        };
        let child = ContractionOp::new(lhs, rhs, Some(result), maps.clone(), iterators.clone())
            .with_kind(op.kind)
            .with_mask(low_mask);
        result = graph.contract(child)?;
    }
    Ok(result)
}

/// `reduction <add> (lhs * rhs)` for two rank-1 operands.
fn lower_dot_product(graph: &mut Graph, op: &ContractionOp) -> Result<ValueId, LoweringError> {
    let product = create_mul(graph, op.lhs, op.rhs)?;
    graph.reduction(CombiningKind::Add, product, op.acc, op.mask)
}
