//! Lightweight handles into the module's arenas.
//!
//! Edges store handles rather than references so that erasing or cloning a
//! function can never leave a dangling pointer into the variable arena.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a persistent variable owned by a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VariableId(pub u32);

/// Identifier of an operator node. Unique across every function of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// Identifier of a function owned by a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FunctionId(pub u32);

/// Producer side of an edge: either a module variable or an operator node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeRef {
    Variable(VariableId),
    Node(NodeId),
}

impl NodeRef {
    pub fn as_variable(self) -> Option<VariableId> {
        match self {
            NodeRef::Variable(id) => Some(id),
            NodeRef::Node(_) => None,
        }
    }

    pub fn as_node(self) -> Option<NodeId> {
        match self {
            NodeRef::Node(id) => Some(id),
            NodeRef::Variable(_) => None,
        }
    }

    pub fn is_variable(self) -> bool {
        matches!(self, NodeRef::Variable(_))
    }
}

impl From<VariableId> for NodeRef {
    fn from(id: VariableId) -> Self {
        NodeRef::Variable(id)
    }
}

impl From<NodeId> for NodeRef {
    fn from(id: NodeId) -> Self {
        NodeRef::Node(id)
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRef::Variable(id) => write!(f, "@v{}", id.0),
            NodeRef::Node(id) => write!(f, "%{}", id.0),
        }
    }
}

/// Non-owning edge to one result slot of a producer.
///
/// Equality compares both the producer and the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeValue {
    pub producer: NodeRef,
    pub res_no: u32,
}

impl NodeValue {
    pub fn new(producer: impl Into<NodeRef>, res_no: u32) -> Self {
        Self {
            producer: producer.into(),
            res_no,
        }
    }
}

impl From<NodeRef> for NodeValue {
    fn from(producer: NodeRef) -> Self {
        Self {
            producer,
            res_no: 0,
        }
    }
}

impl From<NodeId> for NodeValue {
    fn from(id: NodeId) -> Self {
        NodeValue::from(NodeRef::Node(id))
    }
}

impl From<VariableId> for NodeValue {
    fn from(id: VariableId) -> Self {
        NodeValue::from(NodeRef::Variable(id))
    }
}

impl fmt::Display for NodeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.res_no == 0 {
            write!(f, "{}", self.producer)
        } else {
            write!(f, "{}#{}", self.producer, self.res_no)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_equality_compares_slot() {
        let a = NodeValue::new(NodeId(3), 0);
        let b = NodeValue::new(NodeId(3), 1);
        assert_ne!(a, b);
        assert_eq!(a, NodeValue::from(NodeId(3)));
    }

    #[test]
    fn display_marks_variables() {
        assert_eq!(NodeValue::from(VariableId(2)).to_string(), "@v2");
        assert_eq!(NodeValue::new(NodeId(7), 1).to_string(), "%7#1");
    }
}
