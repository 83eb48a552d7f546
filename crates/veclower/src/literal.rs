//! Concrete values bound to arguments and produced by the evaluator.
//!
//! A [`Literal`] is a dense row-major buffer of [`Scalar`]s tagged with its
//! [`Type`]. Scalable axes hold their base extent (vscale = 1).

use crate::error::LoweringError;
use crate::scalar::Scalar;
use crate::strides::{cartesian_to_linear, compute_strides, linear_to_cartesian};
use crate::types::Type;

/// A dense value of some [`Type`].
#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    ty: Type,
    data: Vec<Scalar>,
}

impl Literal {
    /// Every element equal to `value`.
    pub fn splat(value: Scalar, ty: Type) -> Self {
        let value = value.normalize(ty.element_type());
        let data = vec![value; ty.num_elements()];
        Self { ty, data }
    }

    pub fn zeros(ty: Type) -> Self {
        Self::splat(Scalar::zero(ty.element_type()), ty)
    }

    /// Create a literal from row-major data.
    ///
    /// # Errors
    ///
    /// Returns error if `data.len()` does not match the number of elements.
    ///
    /// # Examples
    ///
    /// ```
    /// use veclower::{ElementType, Literal, Scalar, Type};
    ///
    /// let ty = Type::vector(&[2, 3], ElementType::I32);
    /// let data = (0..6).map(Scalar::Int).collect();
    /// let lit = Literal::from_vec(ty, data).unwrap();
    ///
    /// // Row-major: the last axis is contiguous
    /// assert_eq!(lit.get(&[0, 1]).unwrap(), Scalar::Int(1));
    /// assert_eq!(lit.get(&[1, 0]).unwrap(), Scalar::Int(3));
    /// ```
    pub fn from_vec(ty: Type, data: Vec<Scalar>) -> Result<Self, LoweringError> {
        let expected = ty.num_elements();
        if data.len() != expected {
            return Err(LoweringError::ShapeMismatch {
                expected,
                actual: data.len(),
            });
        }
        let element = ty.element_type();
        let data = data.into_iter().map(|v| v.normalize(element)).collect();
        Ok(Self { ty, data })
    }

    /// Build a literal by evaluating `f` at every multi-index.
    pub fn from_fn(ty: Type, mut f: impl FnMut(&[usize]) -> Scalar) -> Self {
        let element = ty.element_type();
        let data = (0..ty.num_elements())
            .map(|i| f(&linear_to_cartesian(i, ty.shape())).normalize(element))
            .collect();
        Self { ty, data }
    }

    #[inline]
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        self.ty.shape()
    }

    /// Row-major elements.
    #[inline]
    pub fn data(&self) -> &[Scalar] {
        &self.data
    }

    /// The single element of a rank-0 literal.
    pub fn as_scalar(&self) -> Result<Scalar, LoweringError> {
        if self.ty.is_vector() {
            return Err(LoweringError::RankMismatch {
                expected: 0,
                actual: self.ty.rank(),
            });
        }
        Ok(self.data[0])
    }

    fn linear_index(&self, indices: &[usize]) -> Result<usize, LoweringError> {
        let shape = self.shape();
        if indices.len() != shape.len() {
            return Err(LoweringError::WrongNumberOfIndices {
                expected: shape.len(),
                actual: indices.len(),
            });
        }
        for (&index, &dim_size) in indices.iter().zip(shape) {
            if index >= dim_size {
                return Err(LoweringError::IndexOutOfBounds { index, dim_size });
            }
        }
        Ok(cartesian_to_linear(indices, &compute_strides(shape)))
    }

    /// Element at a full multi-index.
    pub fn get(&self, indices: &[usize]) -> Result<Scalar, LoweringError> {
        Ok(self.data[self.linear_index(indices)?])
    }

    pub fn set(&mut self, indices: &[usize], value: Scalar) -> Result<(), LoweringError> {
        let i = self.linear_index(indices)?;
        self.data[i] = value.normalize(self.ty.element_type());
        Ok(())
    }

    /// Range of `data` covered by the sub-value at a leading `position`.
    fn block(&self, position: &[usize]) -> Result<(usize, usize), LoweringError> {
        let shape = self.shape();
        if position.len() > shape.len() {
            return Err(LoweringError::WrongNumberOfIndices {
                expected: shape.len(),
                actual: position.len(),
            });
        }
        let mut start = 0;
        for (&index, &dim_size) in position.iter().zip(shape) {
            if index >= dim_size {
                return Err(LoweringError::IndexOutOfBounds { index, dim_size });
            }
            start = start * dim_size + index;
        }
        let len: usize = shape[position.len()..].iter().product();
        Ok((start * len, len))
    }

    /// Sub-value at `position` over the leading axes.
    pub fn extract(&self, position: &[usize]) -> Result<Literal, LoweringError> {
        let (start, len) = self.block(position)?;
        Ok(Literal {
            ty: self.ty.drop_leading(position.len()),
            data: self.data[start..start + len].to_vec(),
        })
    }

    /// Copy of `self` with the sub-value at `position` replaced.
    pub fn insert(&self, value: &Literal, position: &[usize]) -> Result<Literal, LoweringError> {
        let (start, len) = self.block(position)?;
        if value.data.len() != len {
            return Err(LoweringError::ShapeMismatch {
                expected: len,
                actual: value.data.len(),
            });
        }
        let mut out = self.clone();
        out.data[start..start + len].copy_from_slice(&value.data);
        Ok(out)
    }

    /// Permute axes; `perm[i]` is the source axis of result axis `i`.
    pub fn transpose(&self, perm: &[usize]) -> Result<Literal, LoweringError> {
        let rank = self.ty.rank();
        let mut seen = vec![false; rank];
        let valid = perm.len() == rank
            && perm
                .iter()
                .all(|&p| p < rank && !std::mem::replace(&mut seen[p], true));
        if !valid {
            return Err(LoweringError::InvalidPermutation {
                perm: perm.to_vec(),
                ndim: rank,
            });
        }
        let ty = self.ty.permuted(perm);
        let src_strides = compute_strides(self.shape());
        let data = (0..ty.num_elements())
            .map(|i| {
                let dst = linear_to_cartesian(i, ty.shape());
                let offset: usize = dst
                    .iter()
                    .zip(perm)
                    .map(|(&idx, &p)| idx * src_strides[p])
                    .sum();
                self.data[offset]
            })
            .collect();
        Ok(Literal { ty, data })
    }

    /// Replicate `self` over the leading axes of `ty`.
    pub fn broadcast_to(&self, ty: Type) -> Result<Literal, LoweringError> {
        let len = self.data.len();
        let total = ty.num_elements();
        if len == 0 || total % len != 0 {
            return Err(LoweringError::ShapeMismatch {
                expected: total,
                actual: len,
            });
        }
        let data = self.data.iter().copied().cycle().take(total).collect();
        Ok(Literal { ty, data })
    }

    /// Apply `f` lane-wise, producing a literal of type `ty`.
    pub fn map(&self, ty: Type, f: impl Fn(Scalar) -> Scalar) -> Literal {
        let element = ty.element_type();
        let data = self.data.iter().map(|&v| f(v).normalize(element)).collect();
        Literal { ty, data }
    }

    /// Combine two literals of the same shape lane-wise.
    pub fn zip_with(
        &self,
        other: &Literal,
        f: impl Fn(Scalar, Scalar) -> Scalar,
    ) -> Result<Literal, LoweringError> {
        if self.data.len() != other.data.len() {
            return Err(LoweringError::ShapeMismatch {
                expected: self.data.len(),
                actual: other.data.len(),
            });
        }
        let element = self.ty.element_type();
        let data = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(&a, &b)| f(a, b).normalize(element))
            .collect();
        Ok(Literal {
            ty: self.ty.clone(),
            data,
        })
    }
}
