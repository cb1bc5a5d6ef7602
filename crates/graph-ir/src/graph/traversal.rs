use std::collections::HashSet;

use crate::graph::function::Function;
use crate::graph::ids::NodeRef;
use crate::graph::node::Node;

impl Function {
    /// Nodes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes().iter()
    }

    /// Depth-first, visit-once walk started from every node in insertion
    /// order. Each node is reported before its predicate and then its inputs.
    /// Variables reached through edges are reported once, like nodes. Edges
    /// to producers outside the function are skipped.
    pub fn depth_first(&self) -> Vec<NodeRef> {
        let mut visited: HashSet<NodeRef> = HashSet::new();
        let mut order = Vec::new();
        let mut stack: Vec<NodeRef> = Vec::new();

        for root in self.nodes() {
            stack.push(NodeRef::Node(root.id()));
            while let Some(current) = stack.pop() {
                if !visited.insert(current) {
                    continue;
                }
                let node = match current {
                    NodeRef::Variable(_) => {
                        order.push(current);
                        continue;
                    }
                    NodeRef::Node(id) => match self.node(id) {
                        Some(node) => node,
                        None => continue,
                    },
                };
                order.push(current);
                let operands = node.predicate().into_iter().chain(node.inputs().iter().copied());
                let pending: Vec<NodeRef> = operands
                    .map(|value| value.producer)
                    .filter(|producer| !visited.contains(producer))
                    .collect();
                stack.extend(pending.into_iter().rev());
            }
        }
        order
    }
}
