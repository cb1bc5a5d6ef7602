//! Textual debug dumps of modules and functions.
//!
//! The format is for humans only; nothing parses it back.

use std::fmt;

use crate::graph::error::GraphResult;
use crate::graph::function::{Function, FunctionMut};
use crate::graph::ids::{FunctionId, NodeValue};
use crate::graph::module::{Module, ModuleState};
use crate::graph::node::Node;
use crate::graph::variable::Visibility;

struct ModuleDump<'a> {
    module: &'a Module,
}

struct FunctionDump<'a> {
    state: &'a ModuleState,
    function: &'a Function,
}

impl fmt::Display for ModuleDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = &self.module.state;
        write_line(f, 0, "module {")?;
        write_line(f, 1, "variables:")?;
        for var in state.variables.values() {
            let visibility = match var.visibility() {
                Visibility::Public => "public",
                Visibility::Private => "private",
            };
            let init = var.init_policy();
            let line = format!(
                "@v{} {} : {} {} init={}({})",
                var.id().0,
                var.name(),
                state.types.get(var.ty()),
                visibility,
                init.name(),
                init.arg()
            );
            write_line(f, 2, &line)?;
        }
        write_line(f, 1, "functions:")?;
        for function in &self.module.functions {
            write_line(
                f,
                2,
                &format!("{} ({} nodes)", function.name(), function.len()),
            )?;
        }
        write_line(f, 0, "}")
    }
}

impl fmt::Display for FunctionDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_line(f, 0, &format!("function {} {{", self.function.name()))?;
        for node in self.function.nodes() {
            fmt_node(self.state, node, f)?;
        }
        write_line(f, 0, "}")
    }
}

fn fmt_node(state: &ModuleState, node: &Node, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let operands = node
        .inputs()
        .iter()
        .map(|value| format_operand(state, *value))
        .collect::<Vec<_>>()
        .join(", ");
    let results = node
        .results()
        .iter()
        .map(|ty| {
            state
                .types
                .try_get(*ty)
                .map(|ty| ty.to_string())
                .unwrap_or_else(|| "?".to_string())
        })
        .collect::<Vec<_>>()
        .join(", ");
    let mut line = format!(
        "%{} {} = {}({}) -> {}",
        node.id().0,
        node.name(),
        node.kind().name(),
        operands,
        results
    );
    let attrs = node.kind().attributes();
    if !attrs.is_empty() {
        let attrs = attrs
            .iter()
            .map(|(key, value)| format!("{key}: {value}"))
            .collect::<Vec<_>>()
            .join(", ");
        line.push_str(&format!(" {{{attrs}}}"));
    }
    if let Some(predicate) = node.predicate() {
        line.push_str(&format!(" if {}", format_operand(state, predicate)));
    }
    write_line(f, 1, &line)
}

fn format_operand(state: &ModuleState, value: NodeValue) -> String {
    match value.producer.as_variable() {
        Some(id) => match state.variables.get(&id) {
            Some(var) => format!("{value}:{}", var.name()),
            None => format!("{value}:<erased>"),
        },
        None => value.to_string(),
    }
}

fn write_line(f: &mut fmt::Formatter<'_>, indent: usize, line: &str) -> fmt::Result {
    for _ in 0..indent {
        f.write_str("  ")?;
    }
    writeln!(f, "{line}")
}

pub(crate) fn function_dump(state: &ModuleState, function: &Function) -> String {
    FunctionDump { state, function }.to_string()
}

impl Module {
    /// Lists the module's variables and function names.
    pub fn dump(&self) -> String {
        ModuleDump { module: self }.to_string()
    }

    /// Lists a function's nodes in insertion order.
    pub fn dump_function(&self, id: FunctionId) -> GraphResult<String> {
        let function = self.function(id)?;
        Ok(function_dump(&self.state, function))
    }
}

impl FunctionMut<'_> {
    pub fn dump(&self) -> String {
        function_dump(self.state, self.function)
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::variable::{InitPolicy, Visibility};
    use crate::graph::Module;
    use crate::types::ElemKind;

    #[test]
    fn function_dump_lists_nodes_in_order() {
        let mut module = Module::new();
        let x = module.create_variable_dims(
            ElemKind::Float,
            &[2, 2],
            "x",
            Visibility::Public,
            InitPolicy::None,
        );
        let fid = module.create_function("main").unwrap();
        let mut f = module.function_mut(fid).unwrap();
        let relu = f.create_relu("relu", x).unwrap();
        f.create_tanh("tanh", relu).unwrap();

        let dump = module.dump_function(fid).unwrap();
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines[0], "function main {");
        assert_eq!(lines[1], "  %0 relu__1 = Relu(@v0:x__0) -> float<2 x 2>");
        assert_eq!(lines[2], "  %1 tanh__2 = Tanh(%0) -> float<2 x 2>");
        assert_eq!(lines[3], "}");
    }

    #[test]
    fn module_dump_mentions_functions() {
        let mut module = Module::new();
        module.create_function("main").unwrap();
        let dump = module.dump();
        assert!(dump.contains("functions:"));
        assert!(dump.contains("main (0 nodes)"));
    }
}
