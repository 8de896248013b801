//! Integration tests for loading and abstracting models.
use avpp::input::load_model;
use avpp::pipeline::{AbstractionOptions, abstract_tree};
use std::path::PathBuf;

/// Get the path to the demo model.
fn get_model_dir() -> PathBuf {
    PathBuf::from("demos/simple")
}

#[test]
fn test_abstract_demo_model() {
    let mut model = load_model(get_model_dir()).unwrap();
    assert_eq!(model.tree.leaf_count(), 8);

    let options = AbstractionOptions::from(&model.parameters);
    abstract_tree(&mut model.tree, &options).unwrap();

    for node in model.tree.post_order() {
        let plant = model.tree.plant(node);
        if !plant.is_aggregate {
            continue;
        }

        // Every aggregate's regions span its bounds and contain its initial production
        let regions = plant.feasible_regions().unwrap();
        assert_eq!(regions.span().unwrap(), plant.power_bounds);
        assert!(regions.contains_value(plant.initial_power()));
        assert!(plant.horizon.len() <= options.horizon as usize);
    }

    // The root can supply everything its plants can supply together
    let root = model.tree.plant(model.tree.root().unwrap());
    let total_max: f64 = model
        .tree
        .post_order()
        .into_iter()
        .filter(|node| model.tree.is_leaf(*node))
        .map(|node| model.tree.plant(node).power_bounds.max)
        .sum();
    assert!((root.power_bounds.max - total_max).abs() < 1e-6);
}

#[test]
fn test_load_model_reproducible() {
    let first = load_model(get_model_dir()).unwrap();
    let second = load_model(get_model_dir()).unwrap();

    let ids = |tree: &avpp::avpp::AvppGraph| -> Vec<String> {
        tree.post_order()
            .into_iter()
            .map(|node| tree.plant(node).id.to_string())
            .collect()
    };
    assert_eq!(ids(&first.tree), ids(&second.tree));
}
