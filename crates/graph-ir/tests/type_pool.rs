use graph_ir::{ElemKind, Module, Type, TypePool};

#[test]
fn interning_equal_types_returns_same_handle() {
    let mut pool = TypePool::new();
    let a = pool.intern(Type::new(ElemKind::Float, &[2, 3]));
    let b = pool.intern(Type::new(ElemKind::Float, &[2, 3]));
    let c = pool.intern(Type::new(ElemKind::Float, &[3, 2]));
    let d = pool.intern(Type::new(ElemKind::Float16, &[2, 3]));
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_ne!(a, d);
    assert_eq!(pool.len(), 3);
}

#[test]
fn quantization_parameters_take_part_in_identity() {
    let mut pool = TypePool::new();
    let a = pool.intern_quantized(ElemKind::Int8Q, &[4], 0.5, 3);
    let b = pool.intern_quantized(ElemKind::Int8Q, &[4], 0.5, 3);
    let c = pool.intern_quantized(ElemKind::Int8Q, &[4], 0.25, 3);
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn with_new_shape_keeps_element_kind_and_quantization() {
    let mut pool = TypePool::new();
    let base = pool.intern_quantized(ElemKind::Int8Q, &[2, 8], 0.1, -4);
    let derived = pool.with_new_shape(base, &[16]);
    let ty = pool.get(derived);
    assert_eq!(ty.elem_kind(), ElemKind::Int8Q);
    assert_eq!(ty.dims(), &[16]);
    assert_eq!(ty.scale(), Some(0.1));
    assert_eq!(ty.offset(), Some(-4));
    assert_eq!(pool.with_new_shape(base, &[16]), derived);
}

#[test]
fn void_type_is_a_singleton() {
    let mut module = Module::new();
    let a = module.void_type();
    let b = module.void_type();
    assert_eq!(a, b);
    assert_eq!(module.ty(a), &Type::default());
}
