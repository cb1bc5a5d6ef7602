use anyhow::Result;
use graph_ir::{ElemKind, FunctionId, GraphError, InitPolicy, Module, NodeRef, Visibility};

fn build_network(module: &mut Module) -> Result<FunctionId> {
    let x = module.create_variable_dims(
        ElemKind::Float,
        &[1, 8, 8, 3],
        "input",
        Visibility::Public,
        InitPolicy::None,
    );
    let fid = module.create_function("main")?;
    let mut f = module.function_mut(fid)?;
    let conv = f.create_conv("conv", x, 4, 3, 1, 1)?;
    let relu = f.create_relu("relu", conv)?;
    let pool = f.create_pool_max("pool", relu, 2, 2, 0)?;
    let fc = f.create_fully_connected("fc", pool, 10)?;
    let top = f.create_top_k("top", fc, 3)?;
    f.create_save("scores", top)?;
    f.node_mut(fc)?.set_predicate(relu.into());
    Ok(fid)
}

#[test]
fn clone_preserves_topology_and_shares_variables() -> Result<()> {
    let mut module = Module::new();
    let fid = build_network(&mut module)?;
    let variables_before = module.variables().count();

    let (copy_id, mapping) = module.clone_function(fid, "main_copy")?;
    assert_eq!(module.variables().count(), variables_before);

    let original = module.function(fid)?;
    let copy = module.function(copy_id)?;
    assert_eq!(copy.name(), "main_copy");
    assert_eq!(copy.len(), original.len());
    assert_eq!(mapping.len(), original.len());

    for (node, cloned) in original.nodes().iter().zip(copy.nodes()) {
        assert_eq!(mapping[&node.id()], cloned.id());
        assert_ne!(node.id(), cloned.id());
        assert_eq!(node.name(), cloned.name());
        assert_eq!(node.kind(), cloned.kind());
        assert_eq!(node.results(), cloned.results());
        assert_eq!(node.num_inputs(), cloned.num_inputs());
        for (before, after) in node.inputs().iter().zip(cloned.inputs()) {
            assert_eq!(before.res_no, after.res_no);
            match before.producer {
                NodeRef::Variable(_) => assert_eq!(before, after),
                NodeRef::Node(id) => assert_eq!(after.producer, NodeRef::Node(mapping[&id])),
            }
        }
        match (node.predicate(), cloned.predicate()) {
            (Some(before), Some(after)) => {
                let id = before.producer.as_node().expect("predicate is a node");
                assert_eq!(after.producer, NodeRef::Node(mapping[&id]));
            }
            (None, None) => {}
            other => panic!("predicate not preserved: {other:?}"),
        }
    }

    module.verify()?;
    Ok(())
}

#[test]
fn clone_is_independent_of_its_source() -> Result<()> {
    let mut module = Module::new();
    let fid = build_network(&mut module)?;
    let (copy_id, mapping) = module.clone_function(fid, "copy")?;

    let first = module.function(fid)?.nodes()[0].id();
    module
        .function_mut(copy_id)?
        .node_mut(mapping[&first])?
        .set_name("renamed");
    assert_ne!(module.function(fid)?.nodes()[0].name(), "renamed");

    module.function_mut(fid)?.erase_node(first)?;
    assert_eq!(
        module.function(copy_id)?.len(),
        module.function(fid)?.len() + 1
    );
    Ok(())
}

#[test]
fn clone_rejects_taken_or_unknown_names() -> Result<()> {
    let mut module = Module::new();
    let fid = build_network(&mut module)?;
    assert_eq!(
        module.clone_function(fid, "main").expect_err("name taken"),
        GraphError::DuplicateFunction("main".to_string())
    );
    assert_eq!(
        module
            .clone_function(FunctionId(42), "other")
            .expect_err("no such function"),
        GraphError::UnknownFunction(FunctionId(42))
    );
    Ok(())
}
