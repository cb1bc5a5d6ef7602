//! Typed intermediate representation for neural-network graphs.
//!
//! A [`Module`] owns a [`TypePool`], the persistent [`Variable`]s and any
//! number of named [`Function`]s. Functions are built through
//! [`FunctionMut`], whose `create_*` builders check operand shapes and derive
//! result types before a node is appended. [`Module::verify`] checks name
//! uniqueness, edge closure, per-node consistency and acyclicity.
//!
//! ```
//! use graph_ir::{ElemKind, InitPolicy, IoError, Module, Visibility};
//!
//! let mut module = Module::new();
//! let input = module.create_variable_dims(
//!     ElemKind::Float,
//!     &[1, 32, 32, 3],
//!     "input",
//!     Visibility::Public,
//!     InitPolicy::None,
//! );
//! let main = module.create_function("main").expect("fresh name");
//! let mut f = module.function_mut(main).expect("function exists");
//! let conv = f.create_conv("conv", input, 16, 5, 1, 2).expect("valid conv");
//! assert_eq!(f.type_of(conv.into()).expect("typed").dims(), &[1, 32, 32, 16]);
//! module.verify().expect("well formed");
//! ```

mod env;
pub mod graph;
pub mod types;

pub use graph::{
    ArithmeticOp, CloneError, Function, FunctionId, FunctionMut, GraphError, GraphResult,
    InitPolicy, IoError, Module, Node, NodeId, NodeKind, NodeRef, NodeValue, Variable, VariableId,
    VerifyError, Visibility, NAME_DELIMITER,
};
pub use types::{Dims, ElemKind, Quantization, Type, TypePool, TypeRef};
