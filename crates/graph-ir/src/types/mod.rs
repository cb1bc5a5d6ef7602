//! Tensor types and the per-module type pool.

mod elem_kind;
mod pool;
mod ty;

pub use elem_kind::ElemKind;
pub use pool::{TypePool, TypeRef};
pub use ty::{Dims, Quantization, Type};
