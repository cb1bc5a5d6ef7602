//! Enumerates the scalar element kinds a graph tensor may carry.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Scalar element kind of a tensor type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ElemKind {
    /// 32-bit floating point following IEEE-754 semantics.
    #[default]
    Float,
    /// 16-bit floating point (fp16).
    Float16,
    /// 8-bit quantized integer with scale and offset.
    Int8Q,
    /// 32-bit quantized integer with scale and offset.
    Int32Q,
    /// Unsigned index type used for positions and gather/top-k indices.
    Index,
}

impl ElemKind {
    /// Returns `true` when values of this kind carry quantization parameters.
    pub fn is_quantized(self) -> bool {
        matches!(self, ElemKind::Int8Q | ElemKind::Int32Q)
    }

    /// Returns `true` for floating-point kinds.
    pub fn is_float(self) -> bool {
        matches!(self, ElemKind::Float | ElemKind::Float16)
    }

    /// Returns the number of bytes required per scalar element.
    pub fn size_in_bytes(self) -> usize {
        match self {
            ElemKind::Float | ElemKind::Int32Q => 4,
            ElemKind::Float16 => 2,
            ElemKind::Int8Q => 1,
            ElemKind::Index => std::mem::size_of::<usize>(),
        }
    }

    /// Short lowercase name used in textual dumps.
    pub fn name(self) -> &'static str {
        match self {
            ElemKind::Float => "float",
            ElemKind::Float16 => "float16",
            ElemKind::Int8Q => "i8q",
            ElemKind::Int32Q => "i32q",
            ElemKind::Index => "index",
        }
    }
}

impl fmt::Display for ElemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
