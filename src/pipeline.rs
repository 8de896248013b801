//! Abstraction of a whole tree of aggregates, from the leaves upwards.
//!
//! Each aggregate is abstracted once all of its children have been, so that child aggregates can
//! stand in for their plants. The results are stored on the aggregate itself.
use crate::abstraction::{GeneralAbstraction, TemporalAbstraction};
use crate::avpp::AvppGraph;
use crate::constraint::DEFAULT_DELTA_TIME;
use crate::interval::{IntervalSet, SupplyRegions};
use crate::model::ModelParameters;
use crate::plant::PowerPlantData;
use crate::pwl::PiecewiseLinearFunction;
use crate::sampling::selector::SamplingPointSelector;
use crate::sampling::solver::Solver;
use crate::sampling::{SamplingAbstraction, standard_criteria};
use anyhow::{Context, Result, ensure};
use log::{debug, info, warn};
use petgraph::graph::NodeIndex;

/// Settings for abstracting a tree
#[derive(Debug, Clone, PartialEq)]
pub struct AbstractionOptions {
    /// Number of steps in the planning horizon
    pub horizon: u32,
    /// The length of a step in minutes
    pub minutes_per_step: f64,
    /// Whether to perform the temporal abstraction and derive delta functions
    pub temporal_abstraction: bool,
}

impl Default for AbstractionOptions {
    fn default() -> Self {
        Self {
            horizon: 4,
            minutes_per_step: DEFAULT_DELTA_TIME,
            temporal_abstraction: true,
        }
    }
}

impl From<&ModelParameters> for AbstractionOptions {
    fn from(parameters: &ModelParameters) -> Self {
        Self {
            horizon: parameters.horizon,
            minutes_per_step: parameters.minutes_per_step,
            temporal_abstraction: parameters.temporal_abstraction,
        }
    }
}

/// The results of abstracting a single aggregate
struct NodeAbstraction {
    supply: SupplyRegions,
    initial_power: f64,
    horizon: IntervalSet,
    positive_delta: Option<PiecewiseLinearFunction>,
    negative_delta: Option<PiecewiseLinearFunction>,
}

/// Abstract every aggregate in the tree, children before their parents
pub fn abstract_tree(tree: &mut AvppGraph, options: &AbstractionOptions) -> Result<()> {
    for node in tree.post_order() {
        if tree.plant(node).is_aggregate {
            abstract_node(tree, node, options)?;
        }
    }

    Ok(())
}

/// Abstract one aggregate, whose children must already have been abstracted
fn abstract_node(
    tree: &mut AvppGraph,
    node: NodeIndex,
    options: &AbstractionOptions,
) -> Result<()> {
    let result = {
        let children = tree.child_plants(node);
        let id = &tree.plant(node).id;
        compute_abstraction(children, options)
            .with_context(|| format!("Failed to abstract {id}"))?
    };

    let plant = tree.plant_mut(node);
    plant.power_bounds = result
        .supply
        .feasible_regions
        .span()
        .with_context(|| format!("Aggregate {} has no feasible regions", plant.id))?;
    plant.parameters.power_init = Some(result.initial_power);
    plant.supply = Some(result.supply);
    if plant.make_bounds_consistent(result.initial_power) {
        warn!(
            "Widened feasible regions of {} to contain its initial production {}",
            plant.id, result.initial_power
        );
    }
    plant.horizon = result.horizon;
    plant.positive_delta = result.positive_delta;
    plant.negative_delta = result.negative_delta;

    info!(
        "Abstracted {} with bounds {}, {} feasible regions and {} horizon steps",
        plant.id,
        plant.power_bounds,
        plant.feasible_regions().map_or(0, |regions| regions.len()),
        plant.horizon.len()
    );

    Ok(())
}

fn compute_abstraction(
    children: Vec<&PowerPlantData>,
    options: &AbstractionOptions,
) -> Result<NodeAbstraction> {
    let initial_power = children.iter().map(|child| child.initial_power()).sum();

    let mut general = GeneralAbstraction::new(children.clone());
    general.perform()?;
    let supply = general.into_result()?;

    let mut result = NodeAbstraction {
        supply,
        initial_power,
        horizon: IntervalSet::new(),
        positive_delta: None,
        negative_delta: None,
    };
    if !options.temporal_abstraction {
        return Ok(result);
    }

    let temporal = TemporalAbstraction::new(children)
        .with_general_regions(result.supply.feasible_regions.clone())
        .with_minutes_per_step(options.minutes_per_step);
    result.horizon = temporal.perform(options.horizon)?;
    debug!("Temporal abstraction gave {} steps", result.horizon.len());

    match temporal.positive_delta(&result.horizon) {
        Ok(function) => result.positive_delta = Some(function),
        Err(err) => warn!("{err:#}"),
    }
    match temporal.negative_delta(&result.horizon) {
        Ok(function) => result.negative_delta = Some(function),
        Err(err) => warn!("{err:#}"),
    }

    Ok(result)
}

/// Learn the delta and cost functions of an abstracted aggregate by sampling its model.
///
/// The learned functions replace any the aggregate already has.
///
/// # Arguments
///
/// * `tree` - The tree containing the aggregate
/// * `node` - The aggregate to sample
/// * `solver` - Solves the aggregate's optimisation model
/// * `selector` - Chooses which inputs to sample
/// * `budget` - Maximum number of inputs to request from the selector for each function
pub fn sample_node(
    tree: &mut AvppGraph,
    node: NodeIndex,
    solver: &mut dyn Solver,
    selector: &mut dyn SamplingPointSelector,
    budget: usize,
) -> Result<()> {
    let plant = tree.plant(node);
    ensure!(
        plant.is_aggregate,
        "Only aggregates can be sampled, but {} is a physical plant",
        plant.id
    );
    let supply = plant
        .supply
        .clone()
        .with_context(|| format!("Aggregate {} has not been abstracted", plant.id))?;

    let criteria = standard_criteria();
    let mut functions =
        SamplingAbstraction::new(supply).perform(solver, selector, &criteria, budget)?;
    let [positive, negative, cost] = [&criteria[0], &criteria[1], &criteria[2]]
        .map(|criterion| functions.swap_remove(criterion));

    let plant = tree.plant_mut(node);
    plant.positive_delta = positive;
    plant.negative_delta = negative;
    plant.cost_function = cost;
    info!("Sampled delta and cost functions for {}", plant.id);

    Ok(())
}
