use std::collections::HashMap;

use tracing::debug;

use crate::graph::error::{CloneError, GraphError, GraphResult};
use crate::graph::function::Function;
use crate::graph::ids::{FunctionId, NodeId, NodeRef, NodeValue};
use crate::graph::module::{Module, ModuleState};
use crate::graph::node::Node;

impl Module {
    /// Duplicates every node of `source` into a new function named `new_name`.
    ///
    /// Variables are shared, not copied. Node names and attributes are kept;
    /// identifiers are fresh. The returned map covers exactly the source nodes.
    /// On failure the module is left without the new function.
    pub fn clone_function(
        &mut self,
        source: FunctionId,
        new_name: impl Into<String>,
    ) -> GraphResult<(FunctionId, HashMap<NodeId, NodeId>)> {
        let new_name = new_name.into();
        if self.has_function(&new_name) {
            return Err(GraphError::DuplicateFunction(new_name));
        }
        let id = FunctionId(self.functions.len() as u32);
        let original = self
            .functions
            .get(source.0 as usize)
            .ok_or(GraphError::UnknownFunction(source))?;

        let mut mapping = HashMap::with_capacity(original.len());
        for node in original.nodes() {
            mapping.insert(node.id(), self.state.next_node_id());
        }

        let mut copy = Function::new(id, new_name);
        for node in original.nodes() {
            copy.push(duplicate(&self.state, node, &mapping)?);
        }

        debug!(
            source = %original.name(),
            clone = %copy.name(),
            nodes = copy.len(),
            "cloned function"
        );
        self.functions.push(copy);
        Ok((id, mapping))
    }
}

fn duplicate(
    state: &ModuleState,
    node: &Node,
    mapping: &HashMap<NodeId, NodeId>,
) -> Result<Node, CloneError> {
    let remap = |input: usize, value: NodeValue| -> Result<NodeValue, CloneError> {
        let producer = match value.producer {
            NodeRef::Node(id) => mapping.get(&id).copied().map(NodeRef::Node),
            NodeRef::Variable(id) => state
                .variables
                .contains_key(&id)
                .then_some(NodeRef::Variable(id)),
        };
        producer
            .map(|producer| NodeValue::new(producer, value.res_no))
            .ok_or_else(|| CloneError::MissingMapping {
                node: node.name().to_string(),
                input,
                producer: value.producer,
            })
    };

    let mut copy = node.duplicate(mapping[&node.id()]);
    for (idx, slot) in copy.inputs.iter_mut().enumerate() {
        *slot = remap(idx, *slot)?;
    }
    if let Some(predicate) = copy.predicate {
        copy.predicate = Some(remap(copy.inputs.len(), predicate)?);
    }
    Ok(copy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::variable::{InitPolicy, Visibility};
    use crate::types::ElemKind;

    #[test]
    fn erased_variable_blocks_clone() {
        let mut module = Module::new();
        let x = module.create_variable_dims(
            ElemKind::Float,
            &[4],
            "x",
            Visibility::Public,
            InitPolicy::None,
        );
        let fid = module.create_function("main").unwrap();
        module.function_mut(fid).unwrap().create_relu("relu", x).unwrap();
        module.erase_variable(x).unwrap();

        let err = module.clone_function(fid, "copy").unwrap_err();
        assert!(matches!(
            err,
            GraphError::Clone(CloneError::MissingMapping { input: 0, .. })
        ));
        assert!(!module.has_function("copy"));
    }
}
