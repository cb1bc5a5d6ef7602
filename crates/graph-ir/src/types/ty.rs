//! Tensor type descriptor: element kind, shape and optional quantization.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::types::ElemKind;

/// Inline storage for dimension lists; most tensors have rank four or less.
pub type Dims = SmallVec<[usize; 4]>;

/// Affine quantization parameters (`real = scale * (q - offset)`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Quantization {
    pub scale: f32,
    pub offset: i32,
}

impl Quantization {
    pub fn new(scale: f32, offset: i32) -> Self {
        Self { scale, offset }
    }
}

// Scale is compared by bit pattern so that equality stays reflexive and
// consistent with `Hash`.
impl PartialEq for Quantization {
    fn eq(&self, other: &Self) -> bool {
        self.scale.to_bits() == other.scale.to_bits() && self.offset == other.offset
    }
}

impl Eq for Quantization {}

impl Hash for Quantization {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.scale.to_bits().hash(state);
        self.offset.hash(state);
    }
}

/// Immutable tensor type. Two types are equal when every field is equal.
///
/// The default value (float elements, no dimensions) is the void type used by
/// operators without a meaningful result shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Type {
    elem: ElemKind,
    dims: Dims,
    quant: Option<Quantization>,
}

impl Type {
    /// Builds an unquantized type.
    pub fn new(elem: ElemKind, dims: &[usize]) -> Self {
        Self {
            elem,
            dims: Dims::from_slice(dims),
            quant: None,
        }
    }

    /// Builds a quantized type with the given scale and offset.
    pub fn quantized(elem: ElemKind, dims: &[usize], scale: f32, offset: i32) -> Self {
        Self {
            elem,
            dims: Dims::from_slice(dims),
            quant: Some(Quantization::new(scale, offset)),
        }
    }

    /// Returns a copy with the same element kind and quantization but new dims.
    pub fn with_dims(&self, dims: &[usize]) -> Self {
        Self {
            elem: self.elem,
            dims: Dims::from_slice(dims),
            quant: self.quant,
        }
    }

    pub fn elem_kind(&self) -> ElemKind {
        self.elem
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn quantization(&self) -> Option<Quantization> {
        self.quant
    }

    pub fn is_quantized(&self) -> bool {
        self.quant.is_some()
    }

    pub fn scale(&self) -> Option<f32> {
        self.quant.map(|q| q.scale)
    }

    pub fn offset(&self) -> Option<i32> {
        self.quant.map(|q| q.offset)
    }

    /// Number of elements described by the shape. A rank-0 type has one element.
    ///
    /// Saturates at `usize::MAX`; use [`Type::checked_size`] to detect overflow.
    pub fn size(&self) -> usize {
        self.dims.iter().fold(1usize, |acc, d| acc.saturating_mul(*d))
    }

    /// Element count, or `None` when it does not fit in `usize`.
    pub fn checked_size(&self) -> Option<usize> {
        self.dims.iter().try_fold(1usize, |acc, d| acc.checked_mul(*d))
    }

    /// Returns `true` when both types have the same element kind and dims,
    /// ignoring quantization parameters.
    pub fn same_shape_and_kind(&self, other: &Type) -> bool {
        self.elem == other.elem && self.dims == other.dims
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims = self
            .dims
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join(" x ");
        match self.quant {
            Some(q) => write!(
                f,
                "{}<{}>[S:{} O:{}]",
                self.elem, dims, q.scale, q.offset
            ),
            None => write!(f, "{}<{}>", self.elem, dims),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn void_type_is_default() {
        let void = Type::default();
        assert_eq!(void.elem_kind(), ElemKind::Float);
        assert_eq!(void.rank(), 0);
        assert_eq!(void.size(), 1);
    }

    #[test]
    fn size_does_not_wrap() {
        let huge = Type::new(ElemKind::Float, &[usize::MAX, 2]);
        assert_eq!(huge.checked_size(), None);
        assert_eq!(huge.size(), usize::MAX);
        assert_eq!(Type::new(ElemKind::Float, &[2, 3]).checked_size(), Some(6));
    }

    #[test]
    fn with_dims_keeps_quantization() {
        let base = Type::quantized(ElemKind::Int8Q, &[2, 3], 0.5, -3);
        let reshaped = base.with_dims(&[6]);
        assert_eq!(reshaped.dims(), &[6]);
        assert_eq!(reshaped.scale(), Some(0.5));
        assert_eq!(reshaped.offset(), Some(-3));
    }

    #[test]
    fn display_lists_dims() {
        let ty = Type::new(ElemKind::Float, &[1, 32, 32, 3]);
        assert_eq!(ty.to_string(), "float<1 x 32 x 32 x 3>");
    }
}
