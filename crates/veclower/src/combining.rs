//! Combining kinds and the elementwise arithmetic they lower to.
//!
//! A contraction multiplies matching operand elements and folds the
//! products into the accumulator with its combining kind. The kind decides
//! both which element types are legal and which binary operation performs
//! the fold.

use std::fmt;
use std::str::FromStr;

use crate::error::LoweringError;
use crate::scalar::Scalar;
use crate::types::ElementType;

/// How products are folded into an accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CombiningKind {
    #[default]
    Add,
    Mul,
    MinUI,
    MinSI,
    MinNumF,
    MaxUI,
    MaxSI,
    MaxNumF,
    And,
    Or,
    Xor,
    MinimumF,
    MaximumF,
}

impl CombiningKind {
    pub const ALL: [CombiningKind; 13] = [
        CombiningKind::Add,
        CombiningKind::Mul,
        CombiningKind::MinUI,
        CombiningKind::MinSI,
        CombiningKind::MinNumF,
        CombiningKind::MaxUI,
        CombiningKind::MaxSI,
        CombiningKind::MaxNumF,
        CombiningKind::And,
        CombiningKind::Or,
        CombiningKind::Xor,
        CombiningKind::MinimumF,
        CombiningKind::MaximumF,
    ];

    /// Kinds that only make sense on floating-point elements.
    pub fn is_float_only(self) -> bool {
        matches!(
            self,
            CombiningKind::MinNumF
                | CombiningKind::MaxNumF
                | CombiningKind::MinimumF
                | CombiningKind::MaximumF
        )
    }

    /// Kinds that only make sense on integer elements.
    pub fn is_int_only(self) -> bool {
        matches!(
            self,
            CombiningKind::And
                | CombiningKind::Or
                | CombiningKind::Xor
                | CombiningKind::MinSI
                | CombiningKind::MaxSI
                | CombiningKind::MinUI
                | CombiningKind::MaxUI
        )
    }

    pub fn is_legal_for(self, element: ElementType) -> bool {
        if element.is_float() {
            !self.is_int_only()
        } else {
            !self.is_float_only()
        }
    }

    /// The binary operation folding a product into the accumulator.
    ///
    /// Returns `None` when the kind is illegal for `element`.
    pub fn binary_op(self, element: ElementType) -> Option<BinaryOp> {
        if !self.is_legal_for(element) {
            return None;
        }
        let float = element.is_float();
        Some(match self {
            CombiningKind::Add if float => BinaryOp::AddF,
            CombiningKind::Add => BinaryOp::AddI,
            CombiningKind::Mul if float => BinaryOp::MulF,
            CombiningKind::Mul => BinaryOp::MulI,
            CombiningKind::MinUI => BinaryOp::MinUI,
            CombiningKind::MinSI => BinaryOp::MinSI,
            CombiningKind::MinNumF => BinaryOp::MinNumF,
            CombiningKind::MaxUI => BinaryOp::MaxUI,
            CombiningKind::MaxSI => BinaryOp::MaxSI,
            CombiningKind::MaxNumF => BinaryOp::MaxNumF,
            CombiningKind::And => BinaryOp::AndI,
            CombiningKind::Or => BinaryOp::OrI,
            CombiningKind::Xor => BinaryOp::XOrI,
            CombiningKind::MinimumF => BinaryOp::MinimumF,
            CombiningKind::MaximumF => BinaryOp::MaximumF,
        })
    }

    /// Neutral element of the fold for `element`.
    pub fn identity(self, element: ElementType) -> Scalar {
        let bits = element.bit_width();
        let signed_max = if bits >= 64 { i64::MAX } else { (1i64 << (bits - 1)) - 1 };
        let signed_min = if bits >= 64 { i64::MIN } else { -(1i64 << (bits - 1)) };
        match self {
            CombiningKind::Add
            | CombiningKind::Or
            | CombiningKind::Xor
            | CombiningKind::MaxUI => Scalar::zero(element),
            CombiningKind::Mul => Scalar::one(element),
            CombiningKind::And | CombiningKind::MinUI => Scalar::Int(-1).normalize(element),
            CombiningKind::MinSI => Scalar::Int(signed_max),
            CombiningKind::MaxSI => Scalar::Int(signed_min),
            CombiningKind::MinNumF | CombiningKind::MinimumF => Scalar::Float(f64::INFINITY),
            CombiningKind::MaxNumF | CombiningKind::MaximumF => {
                Scalar::Float(f64::NEG_INFINITY)
            }
        }
    }

    /// Fold `value` into `acc`.
    pub fn combine(
        self,
        acc: Scalar,
        value: Scalar,
        element: ElementType,
    ) -> Result<Scalar, LoweringError> {
        let op = self.binary_op(element).ok_or_else(|| {
            LoweringError::invalid("combine", format!("kind '{self}' is illegal for {element}"))
        })?;
        Ok(op.apply(acc, value, element))
    }
}

impl fmt::Display for CombiningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CombiningKind::Add => "add",
            CombiningKind::Mul => "mul",
            CombiningKind::MinUI => "minui",
            CombiningKind::MinSI => "minsi",
            CombiningKind::MinNumF => "minnumf",
            CombiningKind::MaxUI => "maxui",
            CombiningKind::MaxSI => "maxsi",
            CombiningKind::MaxNumF => "maxnumf",
            CombiningKind::And => "and",
            CombiningKind::Or => "or",
            CombiningKind::Xor => "xor",
            CombiningKind::MinimumF => "minimumf",
            CombiningKind::MaximumF => "maximumf",
        };
        f.write_str(name)
    }
}

impl FromStr for CombiningKind {
    type Err = LoweringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CombiningKind::ALL
            .into_iter()
            .find(|k| k.to_string() == s)
            .ok_or_else(|| LoweringError::invalid("combining kind", format!("unknown kind '{s}'")))
    }
}

/// Elementwise binary arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    AddF,
    AddI,
    MulF,
    MulI,
    MinNumF,
    MaxNumF,
    MinimumF,
    MaximumF,
    MinSI,
    MaxSI,
    MinUI,
    MaxUI,
    AndI,
    OrI,
    XOrI,
}

impl BinaryOp {
    /// Whether the operation requires floating-point operands.
    pub fn is_float(self) -> bool {
        matches!(
            self,
            BinaryOp::AddF
                | BinaryOp::MulF
                | BinaryOp::MinNumF
                | BinaryOp::MaxNumF
                | BinaryOp::MinimumF
                | BinaryOp::MaximumF
        )
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            BinaryOp::AddF => "addf",
            BinaryOp::AddI => "addi",
            BinaryOp::MulF => "mulf",
            BinaryOp::MulI => "muli",
            BinaryOp::MinNumF => "minnumf",
            BinaryOp::MaxNumF => "maxnumf",
            BinaryOp::MinimumF => "minimumf",
            BinaryOp::MaximumF => "maximumf",
            BinaryOp::MinSI => "minsi",
            BinaryOp::MaxSI => "maxsi",
            BinaryOp::MinUI => "minui",
            BinaryOp::MaxUI => "maxui",
            BinaryOp::AndI => "andi",
            BinaryOp::OrI => "ori",
            BinaryOp::XOrI => "xori",
        }
    }

    /// Multiplication for `element`.
    pub fn mul(element: ElementType) -> Self {
        if element.is_float() { BinaryOp::MulF } else { BinaryOp::MulI }
    }

    /// Addition for `element`.
    pub fn add(element: ElementType) -> Self {
        if element.is_float() { BinaryOp::AddF } else { BinaryOp::AddI }
    }

    /// Scalar semantics of the operation on elements of type `element`.
    pub fn apply(self, a: Scalar, b: Scalar, element: ElementType) -> Scalar {
        let bits = element.bit_width();
        let result = match self {
            BinaryOp::AddF => Scalar::Float(a.as_f64() + b.as_f64()),
            BinaryOp::MulF => Scalar::Float(a.as_f64() * b.as_f64()),
            BinaryOp::MinNumF => Scalar::Float(a.as_f64().min(b.as_f64())),
            BinaryOp::MaxNumF => Scalar::Float(a.as_f64().max(b.as_f64())),
            BinaryOp::MinimumF => {
                let (x, y) = (a.as_f64(), b.as_f64());
                Scalar::Float(if x.is_nan() || y.is_nan() { f64::NAN } else { x.min(y) })
            }
            BinaryOp::MaximumF => {
                let (x, y) = (a.as_f64(), b.as_f64());
                Scalar::Float(if x.is_nan() || y.is_nan() { f64::NAN } else { x.max(y) })
            }
            BinaryOp::AddI => Scalar::Int(a.as_i64().wrapping_add(b.as_i64())),
            BinaryOp::MulI => Scalar::Int(a.as_i64().wrapping_mul(b.as_i64())),
            BinaryOp::MinSI => Scalar::Int(a.as_i64().min(b.as_i64())),
            BinaryOp::MaxSI => Scalar::Int(a.as_i64().max(b.as_i64())),
            BinaryOp::MinUI => {
                if a.as_unsigned(bits) <= b.as_unsigned(bits) { a } else { b }
            }
            BinaryOp::MaxUI => {
                if a.as_unsigned(bits) >= b.as_unsigned(bits) { a } else { b }
            }
            BinaryOp::AndI => Scalar::Int(a.as_i64() & b.as_i64()),
            BinaryOp::OrI => Scalar::Int(a.as_i64() | b.as_i64()),
            BinaryOp::XOrI => Scalar::Int(a.as_i64() ^ b.as_i64()),
        };
        result.normalize(element)
    }
}
