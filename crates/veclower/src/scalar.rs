//! Scalar element values used by constants and the reference evaluator.

use std::fmt;

use crate::types::ElementType;

/// A single element value.
///
/// Integers are stored sign-extended from their bit width (`i1` is stored
/// as 0 or 1); floats are stored as `f64` whatever their declared width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Int(i64),
    Float(f64),
}

impl Scalar {
    /// Returns the additive identity (zero) of `element`.
    pub fn zero(element: ElementType) -> Self {
        if element.is_float() {
            Scalar::Float(0.0)
        } else {
            Scalar::Int(0)
        }
    }

    /// Returns the multiplicative identity (one) of `element`.
    pub fn one(element: ElementType) -> Self {
        if element.is_float() {
            Scalar::Float(1.0)
        } else {
            Scalar::Int(1)
        }
    }

    /// Bring an integer value into the canonical form for `element`.
    pub fn normalize(self, element: ElementType) -> Self {
        match self {
            Scalar::Int(v) => Scalar::Int(truncate(v, element.bit_width())),
            Scalar::Float(v) => Scalar::Float(v),
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Scalar::Int(v) => v as f64,
            Scalar::Float(v) => v,
        }
    }

    pub fn as_i64(self) -> i64 {
        match self {
            Scalar::Int(v) => v,
            Scalar::Float(v) => v as i64,
        }
    }

    /// Interpretation of an `i1` mask lane.
    pub fn is_true(self) -> bool {
        match self {
            Scalar::Int(v) => v != 0,
            Scalar::Float(v) => v != 0.0,
        }
    }

    /// Unsigned view of an integer of `bits` width.
    pub fn as_unsigned(self, bits: u32) -> u64 {
        let v = self.as_i64() as u64;
        if bits >= 64 { v } else { v & ((1u64 << bits) - 1) }
    }
}

/// Sign-extend the low `bits` of `v` (`i1` stays unsigned).
pub(crate) fn truncate(v: i64, bits: u32) -> i64 {
    match bits {
        1 => v & 1,
        b if b >= 64 => v,
        b => (v << (64 - b)) >> (64 - b),
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(v) => write!(f, "{v}"),
            Scalar::Float(v) => write!(f, "{v:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_one() {
        assert_eq!(Scalar::zero(ElementType::F32), Scalar::Float(0.0));
        assert_eq!(Scalar::one(ElementType::F64), Scalar::Float(1.0));
        assert_eq!(Scalar::zero(ElementType::I32), Scalar::Int(0));
        assert_eq!(Scalar::one(ElementType::I8), Scalar::Int(1));
    }

    #[test]
    fn test_normalize_wraps() {
        assert_eq!(Scalar::Int(128).normalize(ElementType::I8), Scalar::Int(-128));
        assert_eq!(Scalar::Int(255).normalize(ElementType::I8), Scalar::Int(-1));
        assert_eq!(Scalar::Int(3).normalize(ElementType::I1), Scalar::Int(1));
        assert_eq!(Scalar::Int(i64::MIN).normalize(ElementType::I64), Scalar::Int(i64::MIN));
    }

    #[test]
    fn test_unsigned_view() {
        assert_eq!(Scalar::Int(-1).as_unsigned(8), 255);
        assert_eq!(Scalar::Int(-1).as_unsigned(64), u64::MAX);
    }
}
