//! Operations of the value graph.

use std::fmt;

use smallvec::SmallVec;

use crate::combining::{BinaryOp, CombiningKind};
use crate::contract::ContractionOp;
use crate::scalar::Scalar;
use crate::types::Type;

/// Static positions into the leading axes of a vector.
pub type Position = SmallVec<[usize; 4]>;

/// Handle to the value defined by an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub(crate) usize);

impl ValueId {
    /// Get the internal index.
    pub fn index(&self) -> usize {
        self.0
    }

    /// The operation defining this value.
    pub fn defining_op(&self) -> OpId {
        OpId(self.0)
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Handle to an operation. Every operation defines exactly one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpId(pub(crate) usize);

impl OpId {
    pub fn index(&self) -> usize {
        self.0
    }

    /// The value defined by this operation.
    pub fn result(&self) -> ValueId {
        ValueId(self.0)
    }
}

/// Payload of a constant.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
    /// Every element equal.
    Splat(Scalar),
    /// Row-major elements.
    Dense(Vec<Scalar>),
}

/// `acc[d] = combine(acc[d], lhs[d] * rhs)` for every `d` of the lhs, or
/// `lhs * broadcast(rhs)` when `rhs` is a scalar.
#[derive(Debug, Clone, PartialEq)]
pub struct OuterProductOp {
    pub lhs: ValueId,
    pub rhs: ValueId,
    pub acc: Option<ValueId>,
    pub kind: CombiningKind,
    /// Lanes of the result that are computed; others keep `acc`.
    pub mask: Option<ValueId>,
}

impl OuterProductOp {
    pub fn new(lhs: ValueId, rhs: ValueId, acc: Option<ValueId>, kind: CombiningKind) -> Self {
        Self {
            lhs,
            rhs,
            acc,
            kind,
            mask: None,
        }
    }

    pub fn with_mask(mut self, mask: Option<ValueId>) -> Self {
        self.mask = mask;
        self
    }
}

/// The operation kinds of the graph.
#[derive(Debug, Clone, PartialEq)]
pub enum OpKind {
    /// Function argument bound at evaluation time.
    Argument { name: String },
    Constant(ConstantValue),
    /// Sub-value at `position` over the leading axes.
    Extract { source: ValueId, position: Position },
    /// `dest` with the sub-value at `position` replaced by `value`.
    Insert {
        value: ValueId,
        dest: ValueId,
        position: Position,
    },
    /// Scalar splat or leading-axis replication.
    Broadcast { source: ValueId },
    /// `permutation[i]` is the source axis of result axis `i`.
    Transpose {
        source: ValueId,
        permutation: Position,
    },
    /// Element-type promotion (sign extension for integers).
    Extend { source: ValueId },
    Binary {
        op: BinaryOp,
        lhs: ValueId,
        rhs: ValueId,
    },
    /// Fused `lhs * rhs + acc`.
    Fma {
        lhs: ValueId,
        rhs: ValueId,
        acc: ValueId,
    },
    /// Lane-wise choice between two values.
    Select {
        condition: ValueId,
        true_value: ValueId,
        false_value: ValueId,
    },
    /// Horizontal reduction of a rank-1 vector to a scalar.
    Reduction {
        kind: CombiningKind,
        vector: ValueId,
        acc: Option<ValueId>,
        mask: Option<ValueId>,
    },
    OuterProduct(OuterProductOp),
    Contract(Box<ContractionOp>),
}

impl OpKind {
    /// Operation name used in printed graphs.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            OpKind::Argument { .. } => "argument",
            OpKind::Constant(_) => "constant",
            OpKind::Extract { .. } => "extract",
            OpKind::Insert { .. } => "insert",
            OpKind::Broadcast { .. } => "broadcast",
            OpKind::Transpose { .. } => "transpose",
            OpKind::Extend { .. } => "extend",
            OpKind::Binary { op, .. } => op.mnemonic(),
            OpKind::Fma { .. } => "fma",
            OpKind::Select { .. } => "select",
            OpKind::Reduction { .. } => "reduction",
            OpKind::OuterProduct(_) => "outerproduct",
            OpKind::Contract(_) => "contract",
        }
    }

    /// Values read by this operation, in a fixed order.
    pub fn operands(&self) -> SmallVec<[ValueId; 4]> {
        let mut out = SmallVec::new();
        match self {
            OpKind::Argument { .. } | OpKind::Constant(_) => {}
            OpKind::Extract { source, .. }
            | OpKind::Broadcast { source }
            | OpKind::Transpose { source, .. }
            | OpKind::Extend { source } => out.push(*source),
            OpKind::Insert { value, dest, .. } => {
                out.push(*value);
                out.push(*dest);
            }
            OpKind::Binary { lhs, rhs, .. } => {
                out.push(*lhs);
                out.push(*rhs);
            }
            OpKind::Fma { lhs, rhs, acc } => {
                out.extend([*lhs, *rhs, *acc]);
            }
            OpKind::Select {
                condition,
                true_value,
                false_value,
            } => out.extend([*condition, *true_value, *false_value]),
            OpKind::Reduction {
                vector, acc, mask, ..
            } => {
                out.push(*vector);
                out.extend(acc.iter().copied());
                out.extend(mask.iter().copied());
            }
            OpKind::OuterProduct(op) => {
                out.push(op.lhs);
                out.push(op.rhs);
                out.extend(op.acc.iter().copied());
                out.extend(op.mask.iter().copied());
            }
            OpKind::Contract(op) => {
                out.push(op.lhs);
                out.push(op.rhs);
                out.extend(op.acc.iter().copied());
                out.extend(op.mask.iter().copied());
            }
        }
        out
    }

    /// Apply `f` to every operand slot.
    pub fn for_each_operand_mut(&mut self, mut f: impl FnMut(&mut ValueId)) {
        match self {
            OpKind::Argument { .. } | OpKind::Constant(_) => {}
            OpKind::Extract { source, .. }
            | OpKind::Broadcast { source }
            | OpKind::Transpose { source, .. }
            | OpKind::Extend { source } => f(source),
            OpKind::Insert { value, dest, .. } => {
                f(value);
                f(dest);
            }
            OpKind::Binary { lhs, rhs, .. } => {
                f(lhs);
                f(rhs);
            }
            OpKind::Fma { lhs, rhs, acc } => {
                f(lhs);
                f(rhs);
                f(acc);
            }
            OpKind::Select {
                condition,
                true_value,
                false_value,
            } => {
                f(condition);
                f(true_value);
                f(false_value);
            }
            OpKind::Reduction {
                vector, acc, mask, ..
            } => {
                f(vector);
                acc.iter_mut().for_each(&mut f);
                mask.iter_mut().for_each(&mut f);
            }
            OpKind::OuterProduct(op) => {
                f(&mut op.lhs);
                f(&mut op.rhs);
                op.acc.iter_mut().for_each(&mut f);
                op.mask.iter_mut().for_each(&mut f);
            }
            OpKind::Contract(op) => {
                f(&mut op.lhs);
                f(&mut op.rhs);
                op.acc.iter_mut().for_each(&mut f);
                op.mask.iter_mut().for_each(&mut f);
            }
        }
    }
}

/// A node of the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub(crate) kind: OpKind,
    pub(crate) ty: Type,
    pub(crate) erased: bool,
}

impl Operation {
    #[inline]
    pub fn kind(&self) -> &OpKind {
        &self.kind
    }

    /// Type of the defined value.
    #[inline]
    pub fn result_type(&self) -> &Type {
        &self.ty
    }

    #[inline]
    pub fn is_erased(&self) -> bool {
        self.erased
    }

    pub fn as_contract(&self) -> Option<&ContractionOp> {
        match &self.kind {
            OpKind::Contract(op) => Some(op),
            _ => None,
        }
    }

    pub fn as_outer_product(&self) -> Option<&OuterProductOp> {
        match &self.kind {
            OpKind::OuterProduct(op) => Some(op),
            _ => None,
        }
    }
}
