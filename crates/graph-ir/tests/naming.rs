use std::collections::HashSet;

use graph_ir::{ElemKind, InitPolicy, Module, Visibility, NAME_DELIMITER};
use proptest::prelude::*;

#[test]
fn variables_and_nodes_share_the_counter() {
    let mut module = Module::new();
    let x = module.create_variable_dims(
        ElemKind::Float,
        &[4],
        "x",
        Visibility::Public,
        InitPolicy::None,
    );
    let fid = module.create_function("main").expect("fresh function");
    let mut f = module.function_mut(fid).expect("function exists");
    let relu = f.create_relu("relu", x).expect("relu");
    let relu_name = f.node(relu).expect("node").name().to_string();

    assert_eq!(module.variable(x).expect("variable").name(), "x__0");
    assert_eq!(relu_name, "relu__1");
}

#[test]
fn delimiter_truncates_requested_names() {
    let mut module = Module::new();
    let name = module.unique_name(&format!("layer{NAME_DELIMITER}weights"));
    assert_eq!(name, "layer__0");
}

proptest! {
    #[test]
    fn generated_names_are_pairwise_distinct(
        requests in prop::collection::vec("[a-z]{1,6}(__[0-9]{1,3})?", 1..40)
    ) {
        let mut module = Module::new();
        let mut seen = HashSet::new();
        for requested in &requests {
            let name = module.unique_name(requested);
            prop_assert!(seen.insert(name));
        }
    }

    #[test]
    fn reuniquing_keeps_the_prefix(prefix in "[a-z][a-z0-9]{0,8}") {
        let mut module = Module::new();
        let first = module.unique_name(&prefix);
        let second = module.unique_name(&first);
        prop_assert_ne!(&first, &second);
        for name in [&first, &second] {
            let bare = name.split(NAME_DELIMITER).next().unwrap_or_default();
            prop_assert_eq!(bare, prefix.as_str());
        }
    }

    #[test]
    fn builder_names_never_collide(relus in 1usize..12, params in 0usize..6) {
        let mut module = Module::new();
        let x = module.create_variable_dims(
            ElemKind::Float,
            &[2, 4],
            "x",
            Visibility::Public,
            InitPolicy::None,
        );
        for _ in 0..params {
            module.create_variable_dims(
                ElemKind::Float,
                &[4],
                "x",
                Visibility::Private,
                InitPolicy::Broadcast(0.0),
            );
        }
        let fid = module.create_function("main").expect("fresh function");
        let mut f = module.function_mut(fid).expect("function exists");
        let mut last = graph_ir::NodeValue::from(x);
        for _ in 0..relus {
            last = f.create_relu("x", last).expect("relu").into();
        }

        let mut names: HashSet<String> = module.variables().map(|v| v.name().to_string()).collect();
        let function = module.function(fid).expect("function exists");
        for node in function.nodes() {
            prop_assert!(names.insert(node.name().to_string()));
        }
        prop_assert!(module.verify().is_ok());
    }
}
