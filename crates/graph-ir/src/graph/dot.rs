//! Graphviz export built on the public port names and debug descriptors.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::env;
use crate::graph::error::{GraphError, GraphResult};
use crate::graph::function::Function;
use crate::graph::hashing;
use crate::graph::ids::{FunctionId, NodeRef};
use crate::graph::module::{Module, ModuleState};
use crate::graph::variable::{Variable, Visibility};

const NODE_COLORS: [&str; 20] = [
    "AliceBlue",
    "CadetBlue1",
    "Coral",
    "DarkOliveGreen1",
    "DarkSeaGreen1",
    "GhostWhite",
    "Khaki1",
    "LavenderBlush1",
    "LemonChiffon1",
    "LightSkyBlue",
    "MistyRose1",
    "MistyRose2",
    "PaleTurquoise2",
    "PeachPuff1",
    "PowderBlue",
    "Salmon",
    "Thistle1",
    "Thistle3",
    "Wheat1",
    "Yellow2",
];

#[derive(Default)]
struct DotWriter {
    vertices: Vec<String>,
    edges: Vec<String>,
    seen_edges: HashSet<String>,
}

impl DotWriter {
    fn add_edge(&mut self, edge: String) {
        if self.seen_edges.insert(edge.clone()) {
            self.edges.push(edge);
        }
    }

    fn finish(self) -> String {
        let mut out = String::from("digraph DAG {\n\trankdir=TB;\n");
        for vertex in &self.vertices {
            out.push_str(vertex);
            out.push('\n');
        }
        for edge in &self.edges {
            out.push_str(edge);
            out.push_str(";\n");
        }
        out.push('}');
        out
    }
}

fn vertex_name(producer: NodeRef) -> String {
    match producer {
        NodeRef::Variable(id) => format!("\"v{}\"", id.0),
        NodeRef::Node(id) => format!("\"n{}\"", id.0),
    }
}

/// Escapes a descriptor for use inside a record label. Lines are left-justified.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\n' => out.push_str("\\l"),
            '"' | '{' | '}' | '<' | '>' | '|' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out.push_str("\\l");
    out
}

fn port_row(names: &[String]) -> String {
    let cells = names
        .iter()
        .map(|name| format!("<{name}>{name}"))
        .collect::<Vec<_>>()
        .join("|");
    format!("{{{cells}}}")
}

fn record(name: String, inputs: &[String], desc: &str, outputs: &[String], colors: &str) -> String {
    let mut label = String::from("{");
    if !inputs.is_empty() {
        label.push_str(&port_row(inputs));
        label.push('|');
    }
    label.push_str(&format!("{{{}}}", escape(desc)));
    if !outputs.is_empty() {
        label.push('|');
        label.push_str(&port_row(outputs));
    }
    label.push('}');
    format!(
        "{name}[\n\tlabel = \"{label}\"\n\tshape = \"record\"\n\tstyle=\"filled,rounded\"\n\t{colors}\npenwidth = 2];"
    )
}

fn variable_vertex(state: &ModuleState, var: &Variable) -> String {
    let colors = match var.visibility() {
        Visibility::Public => "fillcolor=Snow2; color=DarkOliveGreen4",
        Visibility::Private => "fillcolor=Snow3; color=DeepSkyBlue4",
    };
    record(
        vertex_name(NodeRef::Variable(var.id())),
        &[],
        &var.debug_desc(state.types.get(var.ty())),
        &[var.output_name().to_string()],
        colors,
    )
}

fn output_port(state: &ModuleState, function: &Function, producer: NodeRef, res_no: u32) -> String {
    match producer {
        NodeRef::Variable(id) => state
            .variables
            .get(&id)
            .map(|var| var.output_name().to_string())
            .unwrap_or_else(|| "Output".to_string()),
        NodeRef::Node(id) => function
            .node(id)
            .map(|node| node.output_name(res_no as usize))
            .unwrap_or_else(|| format!("Result{res_no}")),
    }
}

/// Renders one function: every vertex reachable by the depth-first walk, with
/// one edge per input port and one per predicate.
pub(crate) fn function_dot(state: &ModuleState, function: &Function) -> String {
    let mut writer = DotWriter::default();
    for producer in function.depth_first() {
        match producer {
            NodeRef::Variable(id) => {
                if let Some(var) = state.variables.get(&id) {
                    writer.vertices.push(variable_vertex(state, var));
                }
            }
            NodeRef::Node(id) => {
                let Some(node) = function.node(id) else {
                    continue;
                };
                let target = vertex_name(producer);
                if let Some(pred) = node.predicate() {
                    let port = output_port(state, function, pred.producer, pred.res_no);
                    writer.add_edge(format!(
                        "{}:{port} -> {target}:w",
                        vertex_name(pred.producer)
                    ));
                }
                for (idx, value) in node.inputs().iter().enumerate() {
                    let port = output_port(state, function, value.producer, value.res_no);
                    let mut edge = format!(
                        "{}:{port} -> {target}:{}",
                        vertex_name(value.producer),
                        node.input_name(idx)
                    );
                    if node.is_overwritten_input(idx) {
                        edge.push_str(" [dir=\"both\"]");
                    }
                    writer.add_edge(edge);
                }

                let inputs: Vec<String> = (0..node.num_inputs()).map(|i| node.input_name(i)).collect();
                let outputs: Vec<String> =
                    (0..node.num_results()).map(|i| node.output_name(i)).collect();
                let color = hashing::pick(&NODE_COLORS, node.kind().name()).copied().unwrap_or("White");
                writer.vertices.push(record(
                    target,
                    &inputs,
                    &node.debug_desc(&state.types),
                    &outputs,
                    &format!("fillcolor={color}"),
                ));
            }
        }
    }
    writer.finish()
}

/// Renders the module: one vertex per variable, one box per function, and an
/// edge from each variable into every function that reads it.
pub(crate) fn module_dot(module: &Module) -> String {
    let state = &module.state;
    let mut writer = DotWriter::default();
    for var in state.variables.values() {
        writer.vertices.push(variable_vertex(state, var));
    }
    for function in &module.functions {
        let target = format!("\"f{}\"", function.id().0);
        writer.vertices.push(format!(
            "{target}[\n\tlabel = \"Function\\lname : {}\\lnode count : {}\\l\"\n\tshape = box\n\tfillcolor=gray89, style=\"filled,rounded\"\n];",
            escape_plain(function.name()),
            function.len()
        ));
        for node in function.nodes() {
            for (idx, value) in node.inputs().iter().enumerate() {
                let NodeRef::Variable(id) = value.producer else {
                    continue;
                };
                let Some(var) = state.variables.get(&id) else {
                    continue;
                };
                let mut edge = format!(
                    "{}:{} -> {target}",
                    vertex_name(value.producer),
                    var.output_name()
                );
                if node.is_overwritten_input(idx) {
                    edge.push_str(" [dir=\"both\"]");
                }
                writer.add_edge(edge);
            }
        }
    }
    writer.finish()
}

fn escape_plain(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

fn resolve_path(path: Option<&Path>, default_name: &str) -> PathBuf {
    match path {
        Some(path) => path.to_path_buf(),
        None => env::dot_dir().join(default_name),
    }
}

fn write_dot(path: PathBuf, contents: &str, what: &str) -> GraphResult<PathBuf> {
    if let Err(err) = fs::write(&path, contents) {
        return Err(GraphError::Io {
            path,
            source: err.into(),
        });
    }
    info!(path = %path.display(), "wrote {what} graph");
    Ok(path)
}

impl Module {
    /// Graphviz source for the module overview.
    pub fn to_dot(&self) -> String {
        module_dot(self)
    }

    /// Graphviz source for one function.
    pub fn function_to_dot(&self, id: FunctionId) -> GraphResult<String> {
        Ok(function_dot(&self.state, self.function(id)?))
    }

    /// Writes the module overview. Without an explicit path the file lands in
    /// the configured DOT directory. Returns the path written.
    pub fn dump_dag(&self, path: Option<&Path>) -> GraphResult<PathBuf> {
        let path = resolve_path(path, "dotty_graph_dump_module.dot");
        write_dot(path, &module_dot(self), "module")
    }

    /// Writes one function's graph, defaulting to
    /// `dotty_graph_dump_<function>.dot` in the configured DOT directory.
    pub fn dump_function_dag(&self, id: FunctionId, path: Option<&Path>) -> GraphResult<PathBuf> {
        let function = self.function(id)?;
        let path = resolve_path(path, &format!("dotty_graph_dump_{}.dot", function.name()));
        write_dot(path, &function_dot(&self.state, function), "function")
    }
}
