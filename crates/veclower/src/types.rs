//! Element and vector types of the value graph.
//!
//! A vector type is an ordered list of axes, each with a static extent and a
//! scalability flag. A scalable axis has a runtime extent that is a multiple
//! of its static extent, so it can never be unrolled at rewrite time.

use std::fmt;

use smallvec::SmallVec;

/// Shape storage shared by types and literals.
pub type Shape = SmallVec<[usize; 4]>;

/// Scalar element types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    I1,
    I8,
    I16,
    I32,
    I64,
    Index,
    F16,
    BF16,
    F32,
    F64,
}

impl ElementType {
    /// Integer and index types (including `i1`).
    pub fn is_int(self) -> bool {
        !self.is_float()
    }

    pub fn is_float(self) -> bool {
        matches!(
            self,
            ElementType::F16 | ElementType::BF16 | ElementType::F32 | ElementType::F64
        )
    }

    pub fn bit_width(self) -> u32 {
        match self {
            ElementType::I1 => 1,
            ElementType::I8 => 8,
            ElementType::I16 | ElementType::F16 | ElementType::BF16 => 16,
            ElementType::I32 | ElementType::F32 => 32,
            ElementType::I64 | ElementType::Index | ElementType::F64 => 64,
        }
    }

    /// Whether values of `self` can be promoted to `target` without loss.
    pub fn can_extend_to(self, target: ElementType) -> bool {
        if self == target {
            return true;
        }
        if self.is_float() != target.is_float() {
            return false;
        }
        self.bit_width() < target.bit_width()
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementType::I1 => "i1",
            ElementType::I8 => "i8",
            ElementType::I16 => "i16",
            ElementType::I32 => "i32",
            ElementType::I64 => "i64",
            ElementType::Index => "index",
            ElementType::F16 => "f16",
            ElementType::BF16 => "bf16",
            ElementType::F32 => "f32",
            ElementType::F64 => "f64",
        };
        f.write_str(name)
    }
}

/// A vector type of rank >= 1.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VectorType {
    shape: Shape,
    scalable: SmallVec<[bool; 4]>,
    element: ElementType,
}

impl VectorType {
    /// Axis extents (static part for scalable axes).
    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[inline]
    pub fn scalable_dims(&self) -> &[bool] {
        &self.scalable
    }

    #[inline]
    pub fn element_type(&self) -> ElementType {
        self.element
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn all_dims_scalable(&self) -> bool {
        self.scalable.iter().all(|&s| s)
    }
}

/// Type of a value: a scalar or a vector.
///
/// Rank-0 vectors do not exist; dropping the last axis of a vector yields
/// the scalar element type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Scalar(ElementType),
    Vector(VectorType),
}

impl Type {
    /// Fixed-size vector type, or a scalar if `shape` is empty.
    pub fn vector(shape: &[usize], element: ElementType) -> Self {
        Self::scalable_vector(shape, &vec![false; shape.len()], element)
    }

    /// Vector type with per-axis scalability flags.
    ///
    /// # Panics
    ///
    /// Panics if `scalable` and `shape` have different lengths.
    pub fn scalable_vector(shape: &[usize], scalable: &[bool], element: ElementType) -> Self {
        assert_eq!(
            shape.len(),
            scalable.len(),
            "one scalability flag per axis"
        );
        if shape.is_empty() {
            return Type::Scalar(element);
        }
        Type::Vector(VectorType {
            shape: shape.iter().copied().collect(),
            scalable: scalable.iter().copied().collect(),
            element,
        })
    }

    pub fn scalar(element: ElementType) -> Self {
        Type::Scalar(element)
    }

    #[inline]
    pub fn element_type(&self) -> ElementType {
        match self {
            Type::Scalar(e) => *e,
            Type::Vector(v) => v.element,
        }
    }

    /// Axis extents; empty for scalars.
    #[inline]
    pub fn shape(&self) -> &[usize] {
        match self {
            Type::Scalar(_) => &[],
            Type::Vector(v) => &v.shape,
        }
    }

    /// Scalability flags; empty for scalars.
    #[inline]
    pub fn scalable_dims(&self) -> &[bool] {
        match self {
            Type::Scalar(_) => &[],
            Type::Vector(v) => &v.scalable,
        }
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.shape().len()
    }

    #[inline]
    pub fn is_vector(&self) -> bool {
        matches!(self, Type::Vector(_))
    }

    pub fn as_vector(&self) -> Option<&VectorType> {
        match self {
            Type::Vector(v) => Some(v),
            Type::Scalar(_) => None,
        }
    }

    pub fn dim_size(&self, dim: usize) -> usize {
        self.shape()[dim]
    }

    pub fn is_scalable_dim(&self, dim: usize) -> bool {
        self.scalable_dims().get(dim).copied().unwrap_or(false)
    }

    /// True if axes `0..=dim` are all static, i.e. they can be unrolled.
    pub fn leading_dims_static(&self, dim: usize) -> bool {
        self.scalable_dims().iter().take(dim + 1).all(|&s| !s)
    }

    /// Number of elements (static extents).
    pub fn num_elements(&self) -> usize {
        self.shape().iter().product()
    }

    /// Same shape with a different element type.
    pub fn with_element_type(&self, element: ElementType) -> Self {
        Self::scalable_vector(self.shape(), self.scalable_dims(), element)
    }

    /// Type with axis `dim` removed.
    pub fn drop_dim(&self, dim: usize) -> Self {
        let mut shape: Shape = self.shape().iter().copied().collect();
        let mut scalable: SmallVec<[bool; 4]> = self.scalable_dims().iter().copied().collect();
        shape.remove(dim);
        scalable.remove(dim);
        Self::scalable_vector(&shape, &scalable, self.element_type())
    }

    /// Type with the first `count` axes removed.
    pub fn drop_leading(&self, count: usize) -> Self {
        Self::scalable_vector(
            &self.shape()[count..],
            &self.scalable_dims()[count..],
            self.element_type(),
        )
    }

    /// Type with axes reordered; `perm[i]` is the source axis of axis `i`.
    pub fn permuted(&self, perm: &[usize]) -> Self {
        let shape: Shape = perm.iter().map(|&p| self.shape()[p]).collect();
        let scalable: SmallVec<[bool; 4]> =
            perm.iter().map(|&p| self.scalable_dims()[p]).collect();
        Self::scalable_vector(&shape, &scalable, self.element_type())
    }
}

impl From<VectorType> for Type {
    fn from(v: VectorType) -> Self {
        Type::Vector(v)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Scalar(e) => write!(f, "{e}"),
            Type::Vector(v) => {
                f.write_str("vector<")?;
                for (&size, &scalable) in v.shape.iter().zip(v.scalable.iter()) {
                    if scalable {
                        write!(f, "[{size}]x")?;
                    } else {
                        write!(f, "{size}x")?;
                    }
                }
                write!(f, "{}>", v.element)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_shape_is_scalar() {
        assert_eq!(Type::vector(&[], ElementType::F32), Type::Scalar(ElementType::F32));
    }

    #[test]
    fn test_drop_dim() {
        let t = Type::scalable_vector(&[2, 3, 4], &[false, true, false], ElementType::F32);
        let d = t.drop_dim(1);
        assert_eq!(d.shape(), &[2, 4]);
        assert_eq!(d.scalable_dims(), &[false, false]);
        assert_eq!(Type::vector(&[5], ElementType::I32).drop_dim(0), Type::Scalar(ElementType::I32));
    }

    #[test]
    fn test_permuted() {
        let t = Type::scalable_vector(&[2, 3, 4], &[true, false, false], ElementType::F64);
        let p = t.permuted(&[2, 0, 1]);
        assert_eq!(p.shape(), &[4, 2, 3]);
        assert_eq!(p.scalable_dims(), &[false, true, false]);
    }

    #[test]
    fn test_leading_dims_static() {
        let t = Type::scalable_vector(&[2, 3, 4], &[false, true, false], ElementType::F32);
        assert!(t.leading_dims_static(0));
        assert!(!t.leading_dims_static(1));
        assert!(!t.leading_dims_static(2));
    }

    #[test]
    fn test_display() {
        let t = Type::scalable_vector(&[4, 8], &[false, true], ElementType::F32);
        assert_eq!(t.to_string(), "vector<4x[8]xf32>");
        assert_eq!(Type::scalar(ElementType::Index).to_string(), "index");
    }

    #[test]
    fn test_extend_rules() {
        assert!(ElementType::I8.can_extend_to(ElementType::I32));
        assert!(ElementType::F16.can_extend_to(ElementType::F32));
        assert!(!ElementType::I32.can_extend_to(ElementType::F32));
        assert!(!ElementType::F64.can_extend_to(ElementType::F32));
    }
}
