//! Graph container, functions, nodes and the passes that inspect them.

mod builders;
mod cloner;
mod dot;
pub mod error;
mod function;
mod hashing;
mod ids;
mod kind;
mod module;
mod node;
mod shape_helpers;
mod text;
mod traversal;
mod variable;
mod verify;

pub use builders::PROFILE_HISTOGRAM_BUCKETS;
pub use error::{CloneError, GraphError, GraphResult, IoError, VerifyError};
pub use function::{Function, FunctionMut};
pub use ids::{FunctionId, NodeId, NodeRef, NodeValue, VariableId};
pub use kind::{ArithmeticOp, NodeKind};
pub use module::{Module, NAME_DELIMITER};
pub use node::Node;
pub use variable::{InitPolicy, Variable, Visibility};
