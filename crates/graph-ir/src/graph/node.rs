use smallvec::SmallVec;

use crate::graph::ids::{NodeId, NodeValue};
use crate::graph::kind::NodeKind;
use crate::types::{Type, TypePool, TypeRef};

/// Operator instance owned by exactly one function.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) name: String,
    pub(crate) kind: NodeKind,
    pub(crate) inputs: SmallVec<[NodeValue; 4]>,
    pub(crate) results: SmallVec<[TypeRef; 1]>,
    pub(crate) predicate: Option<NodeValue>,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renames the node without disambiguation. Uniqueness is checked by `verify`.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn inputs(&self) -> &[NodeValue] {
        &self.inputs
    }

    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn nth_input(&self, idx: usize) -> Option<NodeValue> {
        self.inputs.get(idx).copied()
    }

    /// Rewrites one input edge. Returns the previous edge, or `None` when
    /// `idx` is out of range (in which case nothing changes).
    pub fn set_nth_input(&mut self, idx: usize, value: NodeValue) -> Option<NodeValue> {
        let slot = self.inputs.get_mut(idx)?;
        Some(std::mem::replace(slot, value))
    }

    pub fn results(&self) -> &[TypeRef] {
        &self.results
    }

    pub fn num_results(&self) -> usize {
        self.results.len()
    }

    pub fn result_type(&self, res_no: u32) -> Option<TypeRef> {
        self.results.get(res_no as usize).copied()
    }

    pub fn predicate(&self) -> Option<NodeValue> {
        self.predicate
    }

    pub fn has_predicate(&self) -> bool {
        self.predicate.is_some()
    }

    pub fn set_predicate(&mut self, predicate: NodeValue) {
        self.predicate = Some(predicate);
    }

    pub fn clear_predicate(&mut self) {
        self.predicate = None;
    }

    pub fn input_name(&self, idx: usize) -> String {
        self.kind.input_name(idx)
    }

    pub fn output_name(&self, idx: usize) -> String {
        self.kind.output_name(idx)
    }

    pub fn is_overwritten_input(&self, idx: usize) -> bool {
        self.kind.is_overwritten_input(idx)
    }

    /// Multi-line descriptor used by dumps, the DOT exporter and verification
    /// diagnostics.
    pub fn debug_desc(&self, types: &TypePool) -> String {
        let mut lines = vec![self.kind.name().to_string(), format!("name : {}", self.name)];
        for (key, value) in self.kind.attributes() {
            lines.push(format!("{key} : {value}"));
        }
        for (idx, ty) in self.results.iter().enumerate() {
            let ty = types
                .try_get(*ty)
                .map(|ty| ty.to_string())
                .unwrap_or_else(|| "<unknown type>".to_string());
            lines.push(format!("{} : {}", self.output_name(idx).to_lowercase(), ty));
        }
        lines.join("\n")
    }

    /// Checks the node's own invariants given the resolved operand and result
    /// types (same order as `inputs()` and `results()`).
    pub(crate) fn verify(&self, input_types: &[&Type], result_types: &[&Type]) -> Result<(), String> {
        match self.kind.num_inputs() {
            Some(expected) if expected != self.inputs.len() => {
                return Err(format!(
                    "{} expects {expected} inputs, has {}",
                    self.kind.name(),
                    self.inputs.len()
                ));
            }
            None if self.inputs.is_empty() => {
                return Err(format!("{} needs at least one input", self.kind.name()));
            }
            _ => {}
        }
        if self.results.len() != self.kind.num_results() {
            return Err(format!(
                "{} expects {} results, has {}",
                self.kind.name(),
                self.kind.num_results(),
                self.results.len()
            ));
        }
        self.kind.check(input_types, result_types)
    }

    /// Copies every attribute and edge under a fresh identifier.
    pub(crate) fn duplicate(&self, id: NodeId) -> Node {
        Node { id, ..self.clone() }
    }
}
