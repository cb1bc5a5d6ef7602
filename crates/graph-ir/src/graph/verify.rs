//! Structural verification of a function against its module.
//!
//! Checks run in order: name uniqueness, edge closure, per-node consistency,
//! acyclicity. The first violation is returned.

use std::collections::HashMap;

use tracing::error;

use crate::env;
use crate::graph::error::VerifyError;
use crate::graph::function::Function;
use crate::graph::ids::{NodeId, NodeRef, NodeValue};
use crate::graph::module::ModuleState;
use crate::graph::node::Node;
use crate::graph::text;
use crate::types::Type;

pub(crate) fn verify_function(state: &ModuleState, function: &Function) -> Result<(), VerifyError> {
    let outcome = check_names(state, function)
        .and_then(|()| check_edges(state, function))
        .and_then(|()| check_nodes(state, function))
        .and_then(|()| check_acyclic(function));
    if let Err(err) = &outcome {
        error!(function = %function.name(), error = %err, "verification failed");
        if env::dump_on_verify_failure() {
            error!(
                function = %function.name(),
                "function dump:\n{}",
                text::function_dump(state, function)
            );
        }
    }
    outcome
}

fn describe(state: &ModuleState, function: &Function, producer: NodeRef) -> String {
    match producer {
        NodeRef::Variable(id) => state
            .variables
            .get(&id)
            .map(|var| var.debug_desc(state.types.get(var.ty())))
            .unwrap_or_default(),
        NodeRef::Node(id) => function
            .node(id)
            .map(|node| node.debug_desc(&state.types))
            .unwrap_or_default(),
    }
}

fn check_names(state: &ModuleState, function: &Function) -> Result<(), VerifyError> {
    let mut seen: HashMap<&str, NodeRef> = HashMap::new();
    let entries = state
        .variables
        .values()
        .map(|var| (var.name(), NodeRef::Variable(var.id())))
        .chain(
            function
                .nodes()
                .iter()
                .map(|node| (node.name(), NodeRef::Node(node.id()))),
        );
    for (name, current) in entries {
        if let Some(previous) = seen.insert(name, current) {
            return Err(VerifyError::NameConflict {
                name: name.to_string(),
                current: describe(state, function, current),
                previous: describe(state, function, previous),
            });
        }
    }
    Ok(())
}

/// Number of result slots of `producer`, or `None` when it does not resolve
/// to a module variable or a node of `function`.
fn available_results(state: &ModuleState, function: &Function, producer: NodeRef) -> Option<usize> {
    match producer {
        NodeRef::Variable(id) => state.variables.get(&id).map(|_| 1),
        NodeRef::Node(id) => function.node(id).map(Node::num_results),
    }
}

fn check_edges(state: &ModuleState, function: &Function) -> Result<(), VerifyError> {
    for node in function.nodes() {
        for (input, value) in node.inputs().iter().enumerate() {
            let Some(available) = available_results(state, function, value.producer) else {
                return Err(VerifyError::DanglingEdge {
                    node: node.name().to_string(),
                    input,
                    producer: value.producer,
                });
            };
            if value.res_no as usize >= available {
                return Err(VerifyError::InvalidResultSlot {
                    node: node.name().to_string(),
                    input,
                    producer: value.producer,
                    res_no: value.res_no,
                    available,
                });
            }
        }
        if let Some(predicate) = node.predicate() {
            match available_results(state, function, predicate.producer) {
                None => {
                    return Err(VerifyError::DanglingPredicate {
                        node: node.name().to_string(),
                        producer: predicate.producer,
                    })
                }
                Some(available) if predicate.res_no as usize >= available => {
                    return Err(VerifyError::InvalidNode {
                        node: node.name().to_string(),
                        reason: format!(
                            "predicate reads result slot {} of {}, which has {available} results",
                            predicate.res_no, predicate.producer
                        ),
                    })
                }
                Some(_) => {}
            }
        }
    }
    Ok(())
}

/// Type carried by an edge already known to resolve.
fn edge_type<'a>(state: &'a ModuleState, function: &Function, value: NodeValue) -> Option<&'a Type> {
    let ty = match value.producer {
        NodeRef::Variable(id) => state.variables.get(&id)?.ty(),
        NodeRef::Node(id) => function.node(id)?.result_type(value.res_no)?,
    };
    state.types.try_get(ty)
}

fn check_nodes(state: &ModuleState, function: &Function) -> Result<(), VerifyError> {
    for node in function.nodes() {
        let invalid = |reason: String| VerifyError::InvalidNode {
            node: node.name().to_string(),
            reason,
        };
        let mut input_types = Vec::with_capacity(node.num_inputs());
        for value in node.inputs() {
            let ty = edge_type(state, function, *value)
                .ok_or_else(|| invalid(format!("input {value} has no type in this module")))?;
            input_types.push(ty);
        }
        let mut result_types = Vec::with_capacity(node.num_results());
        for ty in node.results() {
            let ty = state
                .types
                .try_get(*ty)
                .ok_or_else(|| invalid(format!("result type {ty:?} is not interned")))?;
            result_types.push(ty);
        }
        node.verify(&input_types, &result_types).map_err(invalid)?;
    }
    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Active,
    Done,
}

fn node_operands(node: &Node) -> impl Iterator<Item = NodeId> + '_ {
    node.inputs()
        .iter()
        .copied()
        .chain(node.predicate())
        .filter_map(|value| value.producer.as_node())
}

fn check_acyclic(function: &Function) -> Result<(), VerifyError> {
    let mut marks: HashMap<NodeId, Mark> = function
        .nodes()
        .iter()
        .map(|node| (node.id(), Mark::Unvisited))
        .collect();

    for root in function.nodes() {
        if marks.get(&root.id()) != Some(&Mark::Unvisited) {
            continue;
        }
        marks.insert(root.id(), Mark::Active);
        let mut stack: Vec<(NodeId, Vec<NodeId>)> =
            vec![(root.id(), node_operands(root).collect())];

        while let Some((current, pending)) = stack.last_mut() {
            let Some(next) = pending.pop() else {
                marks.insert(*current, Mark::Done);
                stack.pop();
                continue;
            };
            match marks.get(&next) {
                Some(Mark::Active) => {
                    let name = function
                        .node(next)
                        .map(|node| node.name().to_string())
                        .unwrap_or_default();
                    return Err(VerifyError::Cycle { node: name });
                }
                Some(Mark::Unvisited) => {
                    if let Some(node) = function.node(next) {
                        marks.insert(next, Mark::Active);
                        stack.push((next, node_operands(node).collect()));
                    }
                }
                Some(Mark::Done) | None => {}
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::variable::{InitPolicy, Visibility};
    use crate::graph::Module;
    use crate::types::ElemKind;

    #[test]
    fn self_loop_is_a_cycle() {
        let mut module = Module::new();
        let x = module.create_variable_dims(
            ElemKind::Float,
            &[4],
            "x",
            Visibility::Public,
            InitPolicy::None,
        );
        let fid = module.create_function("main").unwrap();
        let mut f = module.function_mut(fid).unwrap();
        let relu = f.create_relu("relu", x).unwrap();
        f.node_mut(relu).unwrap().set_nth_input(0, relu.into());
        let err = verify_function(f.state, f.function).unwrap_err();
        assert_eq!(
            err,
            VerifyError::Cycle {
                node: "relu__1".to_string()
            }
        );
    }

    #[test]
    fn out_of_range_slot_is_reported() {
        let mut module = Module::new();
        let x = module.create_variable_dims(
            ElemKind::Float,
            &[4],
            "x",
            Visibility::Public,
            InitPolicy::None,
        );
        let fid = module.create_function("main").unwrap();
        let mut f = module.function_mut(fid).unwrap();
        let relu = f.create_relu("relu", x).unwrap();
        let tanh = f.create_tanh("tanh", relu).unwrap();
        f.node_mut(tanh)
            .unwrap()
            .set_nth_input(0, NodeValue::new(relu, 3));
        assert!(matches!(
            verify_function(f.state, f.function),
            Err(VerifyError::InvalidResultSlot { res_no: 3, available: 1, .. })
        ));
    }
}
