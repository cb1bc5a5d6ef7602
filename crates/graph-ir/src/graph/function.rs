use std::collections::HashMap;

use smallvec::SmallVec;
use tracing::debug;

use crate::graph::error::{GraphError, GraphResult};
use crate::graph::ids::{FunctionId, NodeId, NodeRef, NodeValue, VariableId};
use crate::graph::kind::NodeKind;
use crate::graph::module::ModuleState;
use crate::graph::node::Node;
use crate::graph::variable::Variable;
use crate::types::{Type, TypePool, TypeRef};

/// Named subgraph of operator nodes.
///
/// A function owns its nodes in insertion order and references module
/// variables by handle. It is always reached through its [`Module`], which
/// plays the role of the parent container.
///
/// [`Module`]: crate::graph::Module
#[derive(Debug, Clone)]
pub struct Function {
    id: FunctionId,
    name: String,
    nodes: Vec<Node>,
    index: HashMap<NodeId, usize>,
}

impl Function {
    pub(crate) fn new(id: FunctionId, name: String) -> Self {
        Self {
            id,
            name,
            nodes: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn id(&self) -> FunctionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.index.get(&id).map(|&pos| &self.nodes[pos])
    }

    pub fn node_by_name(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.name() == name)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let pos = *self.index.get(&id)?;
        self.nodes.get_mut(pos)
    }

    pub(crate) fn push(&mut self, node: Node) {
        self.index.insert(node.id(), self.nodes.len());
        self.nodes.push(node);
    }

    fn remove(&mut self, id: NodeId) -> Option<Node> {
        let pos = self.index.remove(&id)?;
        let node = self.nodes.remove(pos);
        for slot in self.index.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        Some(node)
    }
}

/// Mutable view of one function together with the module state it builds on.
///
/// Obtained from [`Module::function_mut`]. All node builders live on this
/// type so they can intern types, create variables and add nodes in one call.
///
/// [`Module::function_mut`]: crate::graph::Module::function_mut
pub struct FunctionMut<'m> {
    pub(crate) state: &'m mut ModuleState,
    pub(crate) function: &'m mut Function,
}

impl<'m> FunctionMut<'m> {
    pub(crate) fn new(state: &'m mut ModuleState, function: &'m mut Function) -> Self {
        Self { state, function }
    }

    pub fn id(&self) -> FunctionId {
        self.function.id()
    }

    pub fn name(&self) -> &str {
        self.function.name()
    }

    /// Read-only view of the function being edited.
    pub fn function(&self) -> &Function {
        self.function
    }

    pub fn types(&self) -> &TypePool {
        &self.state.types
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.function.node(id)
    }

    /// Edits a node in place. Edge rewrites are only checked by `verify`.
    pub fn node_mut(&mut self, id: NodeId) -> GraphResult<&mut Node> {
        self.function
            .node_mut(id)
            .ok_or(GraphError::NodeNotFound(NodeRef::Node(id)))
    }

    pub fn variable(&self, id: VariableId) -> GraphResult<&Variable> {
        self.state.variable(id)
    }

    /// Resolves the type carried by an edge of this function.
    pub fn type_of(&self, value: NodeValue) -> GraphResult<&Type> {
        let ty = self.type_ref_of(value)?;
        self.state
            .types
            .try_get(ty)
            .ok_or_else(|| GraphError::UnknownType {
                op: value.to_string(),
                ty,
            })
    }

    pub(crate) fn type_ref_of(&self, value: NodeValue) -> GraphResult<TypeRef> {
        let found = match value.producer {
            NodeRef::Variable(id) => self
                .state
                .variables
                .get(&id)
                .filter(|_| value.res_no == 0)
                .map(|var| var.ty()),
            NodeRef::Node(id) => self
                .function
                .node(id)
                .and_then(|node| node.result_type(value.res_no)),
        };
        found.ok_or(GraphError::NodeNotFound(value.producer))
    }

    /// Appends a node with a uniqued name and a fresh module-wide identifier.
    ///
    /// Operands must already be resolvable in this function and every result
    /// handle must come from the module's type pool.
    pub fn add_node(
        &mut self,
        kind: NodeKind,
        name: &str,
        inputs: &[NodeValue],
        results: &[TypeRef],
    ) -> GraphResult<NodeId> {
        for operand in inputs {
            if self.type_ref_of(*operand).is_err() {
                return Err(GraphError::UnknownOperand {
                    op: name.to_string(),
                    operand: *operand,
                });
            }
        }
        if let Some(&ty) = results.iter().find(|ty| self.state.types.try_get(**ty).is_none()) {
            return Err(GraphError::UnknownType {
                op: name.to_string(),
                ty,
            });
        }
        let id = self.state.next_node_id();
        let name = self.state.unique_name(name);
        self.function.push(Node {
            id,
            name,
            kind,
            inputs: SmallVec::from_slice(inputs),
            results: SmallVec::from_slice(results),
            predicate: None,
        });
        Ok(id)
    }

    /// Erases an operator node, or the module variable when `target` names one.
    ///
    /// Edges that still point at the erased entity are reported by `verify`.
    pub fn erase_node(&mut self, target: impl Into<NodeRef>) -> GraphResult<()> {
        match target.into() {
            NodeRef::Variable(id) => {
                self.state.erase_variable(id)?;
            }
            NodeRef::Node(id) => {
                let removed = self
                    .function
                    .remove(id)
                    .ok_or(GraphError::NodeNotFound(NodeRef::Node(id)))?;
                debug!(function = %self.function.name(), node = %removed.name(), "erased node");
            }
        }
        Ok(())
    }

    pub fn verify(&self) -> GraphResult<()> {
        crate::graph::verify::verify_function(self.state, self.function)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Module;
    use crate::types::ElemKind;

    #[test]
    fn erase_keeps_lookup_consistent() {
        let mut module = Module::new();
        let fid = module.create_function("main").unwrap();
        let mut f = module.function_mut(fid).unwrap();
        let ty = f.state.types.intern_dims(ElemKind::Float, &[2]);
        let a = f.add_node(NodeKind::Splat { value: 1.0 }, "a", &[], &[ty]).unwrap();
        let b = f.add_node(NodeKind::Splat { value: 2.0 }, "b", &[], &[ty]).unwrap();
        let c = f.add_node(NodeKind::Splat { value: 3.0 }, "c", &[], &[ty]).unwrap();

        f.erase_node(b).unwrap();
        assert!(f.node(b).is_none());
        assert_eq!(f.node(c).unwrap().kind(), &NodeKind::Splat { value: 3.0 });
        assert_eq!(f.node(a).unwrap().name(), "a__0");
        assert_eq!(
            f.erase_node(b).unwrap_err(),
            GraphError::NodeNotFound(NodeRef::Node(b))
        );
    }

    #[test]
    fn add_node_rejects_foreign_operands() {
        let mut module = Module::new();
        let fid = module.create_function("main").unwrap();
        let mut f = module.function_mut(fid).unwrap();
        let ty = f.state.types.intern_dims(ElemKind::Float, &[2]);
        let err = f
            .add_node(NodeKind::Relu, "relu", &[NodeValue::from(NodeId(99))], &[ty])
            .unwrap_err();
        assert!(matches!(err, GraphError::UnknownOperand { .. }));
    }

    #[test]
    fn add_node_rejects_foreign_result_types() {
        let mut module = Module::new();
        let fid = module.create_function("main").unwrap();
        let mut f = module.function_mut(fid).unwrap();
        let err = f
            .add_node(NodeKind::Splat { value: 0.0 }, "splat", &[], &[TypeRef(7)])
            .unwrap_err();
        assert_eq!(
            err,
            GraphError::UnknownType {
                op: "splat".to_string(),
                ty: TypeRef(7)
            }
        );
        assert!(f.function().is_empty());
    }
}
