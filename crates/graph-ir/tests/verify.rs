use anyhow::Result;
use graph_ir::{
    ElemKind, FunctionId, GraphError, InitPolicy, Module, NodeId, NodeRef, NodeValue, VariableId,
    VerifyError, Visibility,
};

fn module_with_input(dims: &[usize]) -> (Module, VariableId) {
    let mut module = Module::new();
    let x = module.create_variable_dims(ElemKind::Float, dims, "x", Visibility::Public, InitPolicy::None);
    (module, x)
}

fn relu_chain(module: &mut Module, name: &str, x: VariableId) -> Result<(FunctionId, NodeId, NodeId)> {
    let fid = module.create_function(name)?;
    let mut f = module.function_mut(fid)?;
    let a = f.create_relu("a", x)?;
    let b = f.create_tanh("b", a)?;
    Ok((fid, a, b))
}

#[test]
fn well_formed_network_verifies() -> Result<()> {
    let (mut module, x) = module_with_input(&[1, 16, 16, 3]);
    let labels = module.create_variable_dims(
        ElemKind::Index,
        &[1, 1],
        "labels",
        Visibility::Public,
        InitPolicy::None,
    );
    let fid = module.create_function("main")?;
    let mut f = module.function_mut(fid)?;
    let conv = f.create_conv("conv", x, 8, 3, 1, 1)?;
    let relu = f.create_relu("relu", conv)?;
    let pool = f.create_pool_avg("pool", relu, 2, 2, 0)?;
    let fc = f.create_fully_connected("fc", pool, 10)?;
    let sm = f.create_softmax("sm", fc, labels)?;
    f.create_save("result", sm)?;
    f.verify()?;
    module.verify()?;
    Ok(())
}

#[test]
fn duplicate_node_names_report_both_definitions() -> Result<()> {
    let (mut module, x) = module_with_input(&[2, 8]);
    let fid = module.create_function("main")?;
    let mut f = module.function_mut(fid)?;
    let fc1 = f.create_fully_connected("fc1", x, 8)?;
    let fc2 = f.create_fully_connected("fc2", fc1, 4)?;
    f.node_mut(fc1)?.set_name("fc1");
    f.node_mut(fc2)?.set_name("fc1");

    let err = module.verify().expect_err("names collide");
    let GraphError::Verify(VerifyError::NameConflict {
        name,
        current,
        previous,
    }) = &err
    else {
        panic!("expected a name conflict, got {err:?}");
    };
    assert_eq!(name, "fc1");
    assert!(current.starts_with("FullyConnected\nname : fc1"));
    assert!(previous.starts_with("FullyConnected\nname : fc1"));
    assert!(current.contains("result : float<2 x 4>"));
    assert!(previous.contains("result : float<2 x 8>"));
    Ok(())
}

#[test]
fn node_named_like_a_variable_conflicts() -> Result<()> {
    let (mut module, x) = module_with_input(&[4]);
    let (fid, a, _) = relu_chain(&mut module, "main", x)?;
    let var_name = module.variable(x)?.name().to_string();
    module.function_mut(fid)?.node_mut(a)?.set_name(var_name.clone());

    let err = module.verify_function(fid).expect_err("shadowed variable");
    let GraphError::Verify(VerifyError::NameConflict { name, current, previous }) = &err else {
        panic!("expected a name conflict, got {err:?}");
    };
    assert_eq!(name, &var_name);
    assert!(previous.starts_with("Variable\n"));
    assert!(current.starts_with("Relu\n"));
    Ok(())
}

#[test]
fn edge_into_another_function_is_dangling() -> Result<()> {
    let (mut module, x) = module_with_input(&[4]);
    let (_, foreign, _) = relu_chain(&mut module, "first", x)?;
    let (second, _, b) = relu_chain(&mut module, "second", x)?;

    module
        .function_mut(second)?
        .node_mut(b)?
        .set_nth_input(0, foreign.into());

    let err = module.verify_function(second).expect_err("foreign producer");
    assert!(matches!(
        err,
        GraphError::Verify(VerifyError::DanglingEdge {
            input: 0,
            producer: NodeRef::Node(id),
            ..
        }) if id == foreign
    ));
    assert!(module.verify().is_err());
    Ok(())
}

#[test]
fn erased_variable_leaves_a_dangling_edge() -> Result<()> {
    let (mut module, x) = module_with_input(&[4]);
    let (fid, _, _) = relu_chain(&mut module, "main", x)?;
    module.function_mut(fid)?.erase_node(x)?;
    assert!(module.variable(x).is_err());

    let err = module.verify().expect_err("erased producer");
    assert!(matches!(
        err,
        GraphError::Verify(VerifyError::DanglingEdge {
            producer: NodeRef::Variable(_),
            ..
        })
    ));
    Ok(())
}

#[test]
fn dangling_predicate_is_reported() -> Result<()> {
    let (mut module, x) = module_with_input(&[4]);
    let (fid, _, b) = relu_chain(&mut module, "main", x)?;
    module
        .function_mut(fid)?
        .node_mut(b)?
        .set_predicate(NodeValue::from(NodeId(999)));

    let err = module.verify().expect_err("missing predicate");
    assert!(matches!(
        err,
        GraphError::Verify(VerifyError::DanglingPredicate { .. })
    ));

    module.function_mut(fid)?.node_mut(b)?.set_predicate(x.into());
    module.verify()?;
    Ok(())
}

#[test]
fn rewired_edges_forming_a_cycle_are_rejected() -> Result<()> {
    let (mut module, x) = module_with_input(&[4]);
    let (fid, a, b) = relu_chain(&mut module, "main", x)?;
    module.function_mut(fid)?.node_mut(a)?.set_nth_input(0, b.into());

    let err = module.verify().expect_err("cycle");
    assert!(matches!(err, GraphError::Verify(VerifyError::Cycle { .. })));
    Ok(())
}

#[test]
fn inconsistent_operand_shape_fails_local_check() -> Result<()> {
    let (mut module, x) = module_with_input(&[4]);
    let wide = module.create_variable_dims(
        ElemKind::Float,
        &[8],
        "wide",
        Visibility::Public,
        InitPolicy::None,
    );
    let fid = module.create_function("main")?;
    let mut f = module.function_mut(fid)?;
    let sum = f.create_add("sum", x, x)?;
    f.node_mut(sum)?.set_nth_input(1, wide.into());

    let err = f.verify().expect_err("shape mismatch");
    assert!(matches!(
        err,
        GraphError::Verify(VerifyError::InvalidNode { .. })
    ));
    Ok(())
}

#[test]
fn erasing_missing_nodes_fails() -> Result<()> {
    let (mut module, x) = module_with_input(&[4]);
    let (fid, a, _) = relu_chain(&mut module, "main", x)?;
    let mut f = module.function_mut(fid)?;
    assert_eq!(
        f.erase_node(NodeId(1234)).expect_err("unknown node"),
        GraphError::NodeNotFound(NodeRef::Node(NodeId(1234)))
    );
    f.erase_node(a)?;
    assert_eq!(f.function().len(), 1);
    Ok(())
}
