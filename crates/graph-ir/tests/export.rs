use std::error::Error as _;
use std::io;
use std::thread;

use anyhow::Result;
use graph_ir::{
    ElemKind, FunctionId, GraphError, InitPolicy, Module, NodeKind, NodeRef, Type, Visibility,
};

fn small_graph() -> Result<(Module, FunctionId)> {
    let mut module = Module::new();
    let x = module.create_variable_dims(
        ElemKind::Float,
        &[2, 4],
        "x",
        Visibility::Public,
        InitPolicy::None,
    );
    let fid = module.create_function("main")?;
    let mut f = module.function_mut(fid)?;
    let relu = f.create_relu("relu", x)?;
    let tanh = f.create_tanh("tanh", relu)?;
    f.node_mut(tanh)?.set_predicate(relu.into());
    f.create_save("out", tanh)?;
    Ok((module, fid))
}

#[test]
fn function_dot_marks_ports_predicates_and_in_place_writes() -> Result<()> {
    let (module, fid) = small_graph()?;
    let dot = module.function_to_dot(fid)?;
    assert!(dot.starts_with("digraph DAG {\n\trankdir=TB;\n"));
    assert!(dot.ends_with('}'));
    assert!(dot.contains("shape = \"record\""));
    assert!(dot.contains("\"n0\":Result -> \"n1\":w"));
    assert!(dot.contains("\"n0\":Result -> \"n1\":Input"));
    assert!(dot.contains(":Output [dir=\"both\"]"));
    assert!(dot.contains("fillcolor=Snow2; color=DarkOliveGreen4"));
    Ok(())
}

#[test]
fn module_dot_links_variables_to_functions() -> Result<()> {
    let (module, _) = small_graph()?;
    let dot = module.to_dot();
    assert!(dot.contains("\"v0\":Output -> \"f0\""));
    assert!(dot.contains("name : main"));
    assert!(dot.contains("node count : 3"));
    Ok(())
}

#[test]
fn dump_dag_writes_the_requested_file() -> Result<()> {
    let (module, fid) = small_graph()?;
    let dir = std::env::temp_dir().join(format!("graph-ir-dot-{}", std::process::id()));
    std::fs::create_dir_all(&dir)?;

    let path = module.dump_function_dag(fid, Some(dir.join("main.dot").as_path()))?;
    let written = std::fs::read_to_string(&path)?;
    assert_eq!(written, module.function_to_dot(fid)?);

    let path = module.dump_dag(Some(dir.join("module.dot").as_path()))?;
    assert!(std::fs::read_to_string(path)?.contains("digraph DAG"));

    std::fs::remove_dir_all(&dir)?;
    Ok(())
}

#[test]
fn failed_writes_keep_the_io_error() -> Result<()> {
    let (module, fid) = small_graph()?;
    let missing = std::env::temp_dir()
        .join(format!("graph-ir-missing-{}", std::process::id()))
        .join("nested")
        .join("main.dot");

    let err = module
        .dump_function_dag(fid, Some(missing.as_path()))
        .expect_err("parent directory does not exist");
    let GraphError::Io { path, source } = &err else {
        panic!("expected an io error, got {err:?}");
    };
    assert_eq!(path, &missing);
    assert_eq!(source.kind(), io::ErrorKind::NotFound);
    let chained = err.source().expect("io error is chained");
    assert!(chained.to_string().contains(&source.get_ref().to_string()));
    Ok(())
}

#[test]
fn depth_first_walk_visits_each_producer_once() -> Result<()> {
    let (module, fid) = small_graph()?;
    let function = module.function(fid)?;
    let walk = function.depth_first();
    let nodes = walk.iter().filter(|r| matches!(r, NodeRef::Node(_))).count();
    let variables = walk.iter().filter(|r| r.is_variable()).count();
    assert_eq!(nodes, function.len());
    assert_eq!(variables, 2);
    assert_eq!(walk[0], NodeRef::Node(function.nodes()[0].id()));
    Ok(())
}

#[test]
fn descriptors_serialize_to_json() -> Result<()> {
    let ty = Type::quantized(ElemKind::Int8Q, &[2, 3], 0.5, -1);
    let json = serde_json::to_string(&ty)?;
    assert_eq!(serde_json::from_str::<Type>(&json)?, ty);

    let kind = NodeKind::Convolution {
        kernel: 3,
        stride: 1,
        pad: 1,
        depth: 8,
    };
    let value = serde_json::to_value(&kind)?;
    assert_eq!(value["Convolution"]["depth"], 8);
    Ok(())
}

#[test]
fn independent_modules_build_concurrently() {
    let names: Vec<Vec<String>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..2)
            .map(|_| {
                scope.spawn(|| {
                    let (module, fid) = small_graph().expect("graph builds");
                    module.verify().expect("graph verifies");
                    module
                        .function(fid)
                        .expect("function exists")
                        .nodes()
                        .iter()
                        .map(|node| node.name().to_string())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("thread finished"))
            .collect()
    });
    assert_eq!(names[0], names[1]);
    assert_eq!(names[0][0], "relu__1");
}
