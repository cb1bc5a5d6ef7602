use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::graph::ids::{FunctionId, NodeRef, NodeValue, VariableId};
use crate::types::TypeRef;

/// Structural violation found by an explicit verification pass.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VerifyError {
    #[error("name '{name}' conflicts with a previous definition\ncurrent: {current}\nprevious: {previous}")]
    NameConflict {
        name: String,
        current: String,
        previous: String,
    },
    #[error("input {input} of node '{node}' references {producer}, which is neither a module variable nor a node of this function")]
    DanglingEdge {
        node: String,
        input: usize,
        producer: NodeRef,
    },
    #[error("predicate of node '{node}' references {producer}, which is neither a module variable nor a node of this function")]
    DanglingPredicate { node: String, producer: NodeRef },
    #[error("input {input} of node '{node}' reads result slot {res_no} of {producer}, which has {available} results")]
    InvalidResultSlot {
        node: String,
        input: usize,
        producer: NodeRef,
        res_no: u32,
        available: usize,
    },
    #[error("node '{node}' is inconsistent: {reason}")]
    InvalidNode { node: String, reason: String },
    #[error("node '{node}' is part of a cycle")]
    Cycle { node: String },
}

/// Failure while duplicating a function.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CloneError {
    #[error("input {input} of node '{node}' references {producer}, which has no clone and is not a variable")]
    MissingMapping {
        node: String,
        input: usize,
        producer: NodeRef,
    },
}

/// Shared handle to an I/O failure, so that [`GraphError`] stays `Clone`.
///
/// Two values compare equal when their [`io::ErrorKind`]s match.
#[derive(Debug, Clone, Error)]
#[error(transparent)]
pub struct IoError(Arc<io::Error>);

impl IoError {
    pub fn kind(&self) -> io::ErrorKind {
        self.0.kind()
    }

    pub fn get_ref(&self) -> &io::Error {
        &self.0
    }
}

impl From<io::Error> for IoError {
    fn from(err: io::Error) -> Self {
        IoError(Arc::new(err))
    }
}

impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind()
    }
}

/// Errors returned by graph construction and inspection.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    #[error("a function named '{0}' already exists")]
    DuplicateFunction(String),
    #[error("unknown function {0:?}")]
    UnknownFunction(FunctionId),
    #[error("unknown variable {0:?}")]
    UnknownVariable(VariableId),
    #[error("node {0} was not found")]
    NodeNotFound(NodeRef),
    #[error("operand {operand} of '{op}' does not resolve in this function")]
    UnknownOperand { op: String, operand: NodeValue },
    #[error("'{op}': type handle {ty:?} was not issued by this module's type pool")]
    UnknownType { op: String, ty: TypeRef },
    #[error("'{op}': shape mismatch, expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        op: String,
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    #[error("'{op}': rank mismatch, expected {expected}, got {got}")]
    RankMismatch {
        op: String,
        expected: usize,
        got: usize,
    },
    #[error("'{op}': element kind mismatch: {detail}")]
    ElemKindMismatch { op: String, detail: String },
    #[error("'{op}': invalid attribute: {detail}")]
    InvalidAttribute { op: String, detail: String },
    #[error("failed to write {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: IoError,
    },
    #[error(transparent)]
    Verify(#[from] VerifyError),
    #[error(transparent)]
    Clone(#[from] CloneError),
}

impl GraphError {
    pub(crate) fn attr(op: &str, detail: impl Into<String>) -> Self {
        GraphError::InvalidAttribute {
            op: op.to_string(),
            detail: detail.into(),
        }
    }

    pub(crate) fn shape(op: &str, expected: &[usize], got: &[usize]) -> Self {
        GraphError::ShapeMismatch {
            op: op.to_string(),
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }

    pub(crate) fn rank(op: &str, expected: usize, got: usize) -> Self {
        GraphError::RankMismatch {
            op: op.to_string(),
            expected,
            got,
        }
    }

    pub(crate) fn elem(op: &str, detail: impl Into<String>) -> Self {
        GraphError::ElemKindMismatch {
            op: op.to_string(),
            detail: detail.into(),
        }
    }
}

/// Convenience alias for results returned by graph routines.
pub type GraphResult<T> = Result<T, GraphError>;
