//! Typed constructors for every operation kind.

use super::graph::Graph;
use super::op::{ConstantValue, OpKind, OuterProductOp, Position, ValueId};
use crate::combining::{BinaryOp, CombiningKind};
use crate::contract::ContractionOp;
use crate::error::LoweringError;
use crate::scalar::Scalar;
use crate::types::{ElementType, Type};

fn check_permutation(perm: &[usize], ndim: usize) -> Result<(), LoweringError> {
    let invalid = || LoweringError::InvalidPermutation {
        perm: perm.to_vec(),
        ndim,
    };
    if perm.len() != ndim {
        return Err(invalid());
    }
    let mut seen = vec![false; ndim];
    for &p in perm {
        if p >= ndim || seen[p] {
            return Err(invalid());
        }
        seen[p] = true;
    }
    Ok(())
}

impl Graph {
    /// Declare a function argument.
    pub fn argument(&mut self, name: impl Into<String>, ty: Type) -> ValueId {
        self.push(OpKind::Argument { name: name.into() }, ty)
    }

    /// Constant of type `ty`.
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if a dense payload has the wrong length.
    pub fn constant(&mut self, value: ConstantValue, ty: Type) -> Result<ValueId, LoweringError> {
        let element = ty.element_type();
        let value = match value {
            ConstantValue::Splat(s) => ConstantValue::Splat(s.normalize(element)),
            ConstantValue::Dense(data) => {
                if data.len() != ty.num_elements() {
                    return Err(LoweringError::ShapeMismatch {
                        expected: ty.num_elements(),
                        actual: data.len(),
                    });
                }
                ConstantValue::Dense(data.into_iter().map(|s| s.normalize(element)).collect())
            }
        };
        Ok(self.push(OpKind::Constant(value), ty))
    }

    /// Every element of `ty` equal to `value`.
    pub fn splat(&mut self, value: Scalar, ty: Type) -> ValueId {
        let value = value.normalize(ty.element_type());
        self.push(OpKind::Constant(ConstantValue::Splat(value)), ty)
    }

    /// Zero of type `ty`.
    pub fn zero(&mut self, ty: Type) -> ValueId {
        let zero = Scalar::zero(ty.element_type());
        self.splat(zero, ty)
    }

    /// Sub-value of `source` at `position` over its leading axes.
    ///
    /// An empty position returns `source` itself.
    pub fn extract(&mut self, source: ValueId, position: &[usize]) -> Result<ValueId, LoweringError> {
        if position.is_empty() {
            return Ok(source);
        }
        let ty = self.value_type(source).clone();
        if position.len() > ty.rank() {
            return Err(LoweringError::WrongNumberOfIndices {
                expected: ty.rank(),
                actual: position.len(),
            });
        }
        for (&p, &dim) in position.iter().zip(ty.shape()) {
            if p >= dim {
                return Err(LoweringError::IndexOutOfBounds {
                    index: p,
                    dim_size: dim,
                });
            }
        }
        let result = ty.drop_leading(position.len());
        Ok(self.push(
            OpKind::Extract {
                source,
                position: Position::from_slice(position),
            },
            result,
        ))
    }

    /// `dest` with the sub-value at `position` replaced by `value`.
    ///
    /// An empty position returns `value` itself.
    pub fn insert(
        &mut self,
        value: ValueId,
        dest: ValueId,
        position: &[usize],
    ) -> Result<ValueId, LoweringError> {
        let dest_ty = self.value_type(dest).clone();
        if position.len() > dest_ty.rank() {
            return Err(LoweringError::WrongNumberOfIndices {
                expected: dest_ty.rank(),
                actual: position.len(),
            });
        }
        let slot = dest_ty.drop_leading(position.len());
        if self.value_type(value) != &slot {
            return Err(LoweringError::invalid(
                "insert",
                format!("value of type {} does not fit slot {slot}", self.value_type(value)),
            ));
        }
        if position.is_empty() {
            return Ok(value);
        }
        for (&p, &dim) in position.iter().zip(dest_ty.shape()) {
            if p >= dim {
                return Err(LoweringError::IndexOutOfBounds {
                    index: p,
                    dim_size: dim,
                });
            }
        }
        Ok(self.push(
            OpKind::Insert {
                value,
                dest,
                position: Position::from_slice(position),
            },
            dest_ty,
        ))
    }

    /// Splat a scalar, or replicate a vector along new leading axes.
    pub fn broadcast(&mut self, source: ValueId, ty: Type) -> Result<ValueId, LoweringError> {
        let src = self.value_type(source);
        if src.element_type() != ty.element_type() {
            return Err(LoweringError::invalid(
                "broadcast",
                format!("element type {} differs from {}", src.element_type(), ty.element_type()),
            ));
        }
        let lead = ty.rank().checked_sub(src.rank()).ok_or_else(|| {
            LoweringError::invalid("broadcast", format!("cannot broadcast {src} to lower rank {ty}"))
        })?;
        if &ty.drop_leading(lead) != src {
            return Err(LoweringError::invalid(
                "broadcast",
                format!("{src} is not a trailing slice of {ty}"),
            ));
        }
        Ok(self.push(OpKind::Broadcast { source }, ty))
    }

    /// Reorder the axes of `source`; `permutation[i]` names the source axis
    /// of result axis `i`.
    pub fn transpose(&mut self, source: ValueId, permutation: &[usize]) -> Result<ValueId, LoweringError> {
        let ty = self.value_type(source);
        check_permutation(permutation, ty.rank())?;
        let result = ty.permuted(permutation);
        Ok(self.push(
            OpKind::Transpose {
                source,
                permutation: Position::from_slice(permutation),
            },
            result,
        ))
    }

    /// Promote `source` to the wider element type `element`.
    pub fn extend(&mut self, source: ValueId, element: ElementType) -> Result<ValueId, LoweringError> {
        let ty = self.value_type(source);
        if ty.element_type() == element || !ty.element_type().can_extend_to(element) {
            return Err(LoweringError::invalid(
                "extend",
                format!("cannot extend {} to {element}", ty.element_type()),
            ));
        }
        let result = ty.with_element_type(element);
        Ok(self.push(OpKind::Extend { source }, result))
    }

    /// Elementwise binary arithmetic on two values of the same type.
    pub fn binary(&mut self, op: BinaryOp, lhs: ValueId, rhs: ValueId) -> Result<ValueId, LoweringError> {
        let ty = self.value_type(lhs).clone();
        if self.value_type(rhs) != &ty {
            return Err(LoweringError::invalid(
                op.mnemonic(),
                format!("operand types {ty} and {} differ", self.value_type(rhs)),
            ));
        }
        if op.is_float() != ty.element_type().is_float() {
            return Err(LoweringError::invalid(
                op.mnemonic(),
                format!("not defined on {}", ty.element_type()),
            ));
        }
        Ok(self.push(OpKind::Binary { op, lhs, rhs }, ty))
    }

    /// Fused multiply-add on floating-point vectors.
    pub fn fma(&mut self, lhs: ValueId, rhs: ValueId, acc: ValueId) -> Result<ValueId, LoweringError> {
        let ty = self.value_type(acc).clone();
        if self.value_type(lhs) != &ty || self.value_type(rhs) != &ty {
            return Err(LoweringError::invalid("fma", "operand types differ"));
        }
        if !ty.is_vector() || !ty.element_type().is_float() {
            return Err(LoweringError::invalid(
                "fma",
                format!("expected a floating-point vector, got {ty}"),
            ));
        }
        Ok(self.push(OpKind::Fma { lhs, rhs, acc }, ty))
    }

    /// Lanes of `true_value` where `condition` is set, of `false_value`
    /// elsewhere.
    pub fn select(
        &mut self,
        condition: ValueId,
        true_value: ValueId,
        false_value: ValueId,
    ) -> Result<ValueId, LoweringError> {
        let ty = self.value_type(true_value).clone();
        if self.value_type(false_value) != &ty {
            return Err(LoweringError::invalid("select", "branch types differ"));
        }
        if self.value_type(condition) != &ty.with_element_type(ElementType::I1) {
            return Err(LoweringError::invalid(
                "select",
                format!("condition {} does not match {ty}", self.value_type(condition)),
            ));
        }
        Ok(self.push(
            OpKind::Select {
                condition,
                true_value,
                false_value,
            },
            ty,
        ))
    }

    /// Fold every lane of a rank-1 vector into a scalar.
    pub fn reduction(
        &mut self,
        kind: CombiningKind,
        vector: ValueId,
        acc: Option<ValueId>,
        mask: Option<ValueId>,
    ) -> Result<ValueId, LoweringError> {
        let ty = self.value_type(vector).clone();
        if ty.rank() != 1 {
            return Err(LoweringError::RankMismatch {
                expected: 1,
                actual: ty.rank(),
            });
        }
        let element = ty.element_type();
        if !kind.is_legal_for(element) {
            return Err(LoweringError::invalid(
                "reduction",
                format!("kind '{kind}' is illegal for {element}"),
            ));
        }
        let result = Type::scalar(element);
        if let Some(acc) = acc {
            if self.value_type(acc) != &result {
                return Err(LoweringError::invalid(
                    "reduction",
                    format!("accumulator {} is not {result}", self.value_type(acc)),
                ));
            }
        }
        if let Some(mask) = mask {
            if self.value_type(mask) != &ty.with_element_type(ElementType::I1) {
                return Err(LoweringError::invalid(
                    "reduction",
                    format!("mask {} does not match {ty}", self.value_type(mask)),
                ));
            }
        }
        Ok(self.push(
            OpKind::Reduction {
                kind,
                vector,
                acc,
                mask,
            },
            result,
        ))
    }

    /// Outer product of a rank-1 lhs with a rank-1 rhs, or with a scalar rhs
    /// (axpy form).
    ///
    /// The combining kind is not checked against the element type here;
    /// lowering declines illegal combinations.
    pub fn outer_product(&mut self, op: OuterProductOp) -> Result<ValueId, LoweringError> {
        let lhs_ty = self.value_type(op.lhs).clone();
        let rhs_ty = self.value_type(op.rhs).clone();
        if lhs_ty.rank() != 1 {
            return Err(LoweringError::RankMismatch {
                expected: 1,
                actual: lhs_ty.rank(),
            });
        }
        if rhs_ty.rank() > 1 {
            return Err(LoweringError::RankMismatch {
                expected: 1,
                actual: rhs_ty.rank(),
            });
        }
        let element = lhs_ty.element_type();
        if rhs_ty.element_type() != element {
            return Err(LoweringError::invalid("outerproduct", "operand element types differ"));
        }
        let result = if rhs_ty.is_vector() {
            Type::scalable_vector(
                &[lhs_ty.dim_size(0), rhs_ty.dim_size(0)],
                &[lhs_ty.is_scalable_dim(0), rhs_ty.is_scalable_dim(0)],
                element,
            )
        } else {
            lhs_ty
        };
        if let Some(acc) = op.acc {
            if self.value_type(acc) != &result {
                return Err(LoweringError::invalid(
                    "outerproduct",
                    format!("accumulator {} is not {result}", self.value_type(acc)),
                ));
            }
        }
        if let Some(mask) = op.mask {
            if op.acc.is_none() {
                return Err(LoweringError::invalid(
                    "outerproduct",
                    "a masked outer product needs an accumulator",
                ));
            }
            if self.value_type(mask) != &result.with_element_type(ElementType::I1) {
                return Err(LoweringError::invalid(
                    "outerproduct",
                    format!("mask {} does not match {result}", self.value_type(mask)),
                ));
            }
        }
        Ok(self.push(OpKind::OuterProduct(op), result))
    }

    /// Contraction with its result type inferred from the operands.
    pub fn contract(&mut self, op: ContractionOp) -> Result<ValueId, LoweringError> {
        let result = op.infer_result_type(self)?;
        Ok(self.push(OpKind::Contract(Box::new(op)), result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f32v(shape: &[usize]) -> Type {
        Type::vector(shape, ElementType::F32)
    }

    #[test]
    fn test_extract_drops_leading_axes() {
        let mut g = Graph::new();
        let a = g.argument("a", f32v(&[2, 3, 4]));
        let e = g.extract(a, &[1, 2]).unwrap();
        assert_eq!(g.value_type(e), &f32v(&[4]));
        assert_eq!(g.extract(a, &[]).unwrap(), a);
        assert!(matches!(
            g.extract(a, &[2]),
            Err(LoweringError::IndexOutOfBounds { index: 2, dim_size: 2 })
        ));
    }

    #[test]
    fn test_insert_checks_slot_type() {
        let mut g = Graph::new();
        let d = g.zero(f32v(&[2, 3]));
        let row = g.argument("row", f32v(&[3]));
        assert!(g.insert(row, d, &[1]).is_ok());
        let bad = g.argument("bad", f32v(&[2]));
        assert!(g.insert(bad, d, &[1]).is_err());
    }

    #[test]
    fn test_broadcast() {
        let mut g = Graph::new();
        let s = g.argument("s", Type::scalar(ElementType::F32));
        let v = g.broadcast(s, f32v(&[4])).unwrap();
        assert_eq!(g.value_type(v), &f32v(&[4]));
        let m = g.broadcast(v, f32v(&[3, 4])).unwrap();
        assert_eq!(g.value_type(m), &f32v(&[3, 4]));
        assert!(g.broadcast(v, f32v(&[4, 3])).is_err());
    }

    #[test]
    fn test_transpose_validates_permutation() {
        let mut g = Graph::new();
        let a = g.argument("a", f32v(&[2, 3, 4]));
        let t = g.transpose(a, &[2, 0, 1]).unwrap();
        assert_eq!(g.value_type(t), &f32v(&[4, 2, 3]));
        assert!(matches!(
            g.transpose(a, &[0, 0, 1]),
            Err(LoweringError::InvalidPermutation { .. })
        ));
    }

    #[test]
    fn test_binary_requires_matching_class() {
        let mut g = Graph::new();
        let a = g.argument("a", Type::vector(&[4], ElementType::I32));
        let b = g.argument("b", Type::vector(&[4], ElementType::I32));
        assert!(g.binary(BinaryOp::MulI, a, b).is_ok());
        assert!(g.binary(BinaryOp::MulF, a, b).is_err());
    }

    #[test]
    fn test_fma_rejects_integers() {
        let mut g = Graph::new();
        let a = g.argument("a", Type::vector(&[4], ElementType::I32));
        assert!(g.fma(a, a, a).is_err());
        let f = g.argument("f", f32v(&[4]));
        assert!(g.fma(f, f, f).is_ok());
    }

    #[test]
    fn test_outer_product_types() {
        let mut g = Graph::new();
        let a = g.argument("a", f32v(&[3]));
        let b = g.argument("b", f32v(&[5]));
        let r = g
            .outer_product(OuterProductOp::new(a, b, None, CombiningKind::Add))
            .unwrap();
        assert_eq!(g.value_type(r), &f32v(&[3, 5]));

        let s = g.argument("s", Type::scalar(ElementType::F32));
        let axpy = g
            .outer_product(OuterProductOp::new(a, s, None, CombiningKind::Add))
            .unwrap();
        assert_eq!(g.value_type(axpy), &f32v(&[3]));
    }

    #[test]
    fn test_masked_outer_product_needs_acc() {
        let mut g = Graph::new();
        let a = g.argument("a", f32v(&[3]));
        let b = g.argument("b", f32v(&[5]));
        let m = g.argument("m", Type::vector(&[3, 5], ElementType::I1));
        let op = OuterProductOp::new(a, b, None, CombiningKind::Add).with_mask(Some(m));
        assert!(g.outer_product(op).is_err());
    }

    #[test]
    fn test_reduction_to_scalar() {
        let mut g = Graph::new();
        let v = g.argument("v", f32v(&[8]));
        let r = g.reduction(CombiningKind::Add, v, None, None).unwrap();
        assert_eq!(g.value_type(r), &Type::scalar(ElementType::F32));
        assert!(g.reduction(CombiningKind::Xor, v, None, None).is_err());
    }

    #[test]
    fn test_dense_constant_length() {
        let mut g = Graph::new();
        let data = vec![Scalar::Int(1), Scalar::Int(2)];
        assert!(g
            .constant(ConstantValue::Dense(data), Type::vector(&[3], ElementType::I32))
            .is_err());
    }
}
