use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{ElemKind, Type};

/// Stable handle to a type interned in a [`TypePool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeRef(pub u32);

/// Deduplicating store of tensor types owned by one module.
///
/// Handles stay valid for the pool's lifetime; types are never removed.
#[derive(Debug, Default)]
pub struct TypePool {
    types: Vec<Type>,
    lookup: HashMap<Type, TypeRef>,
}

impl TypePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the handle of the stored type equal to `candidate`, inserting it
    /// first when no such type exists.
    pub fn intern(&mut self, candidate: Type) -> TypeRef {
        if let Some(existing) = self.lookup.get(&candidate) {
            return *existing;
        }
        let handle = TypeRef(self.types.len() as u32);
        self.types.push(candidate.clone());
        self.lookup.insert(candidate, handle);
        handle
    }

    pub fn intern_dims(&mut self, elem: ElemKind, dims: &[usize]) -> TypeRef {
        self.intern(Type::new(elem, dims))
    }

    pub fn intern_quantized(
        &mut self,
        elem: ElemKind,
        dims: &[usize],
        scale: f32,
        offset: i32,
    ) -> TypeRef {
        self.intern(Type::quantized(elem, dims, scale, offset))
    }

    /// Interns a type with `base`'s element kind and quantization but shape `dims`.
    pub fn with_new_shape(&mut self, base: TypeRef, dims: &[usize]) -> TypeRef {
        let derived = self.get(base).with_dims(dims);
        self.intern(derived)
    }

    /// The singleton empty type.
    pub fn void_type(&mut self) -> TypeRef {
        self.intern(Type::default())
    }

    /// Resolves a handle produced by this pool.
    ///
    /// Panics when `handle` was issued by a different pool and is out of range.
    pub fn get(&self, handle: TypeRef) -> &Type {
        &self.types[handle.0 as usize]
    }

    pub fn try_get(&self, handle: TypeRef) -> Option<&Type> {
        self.types.get(handle.0 as usize)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TypeRef, &Type)> {
        self.types
            .iter()
            .enumerate()
            .map(|(idx, ty)| (TypeRef(idx as u32), ty))
    }
}
