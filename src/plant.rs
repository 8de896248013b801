//! Power plants, both physical units and aggregates (AVPPs), and their dynamic state.
//!
//! [`PowerPlantData`] holds what is known about a plant independently of time: its technical bounds,
//! parameters, constraints and, for aggregates, the results of abstraction. [`PlantState`] tracks a
//! plant's production and on/off status while it is stepped through a planning horizon.
use crate::constraint::{Constraint, ConstraintKind};
use crate::id::{define_id_getter, define_id_type};
use crate::interval::{FeasibleRegions, Interval, IntervalSet, SupplyRegions};
use crate::pwl::PiecewiseLinearFunction;
use anyhow::{Context, Result};
use std::collections::HashMap;

pub mod factory;
pub mod source;

define_id_type! {PlantID}

/// The dynamic quantities of a plant on which constraints depend
pub trait Plant {
    /// The plant's ID
    fn id(&self) -> &PlantID;

    /// Static technical minimum and maximum production
    fn technical_bounds(&self) -> Interval<f64>;

    /// The range of production in the current step
    fn power(&self) -> Interval<f64>;

    /// Whether the plant is on in the current step.
    ///
    /// This is uncertain (`[false, true]`) if the plant could be either on or off.
    fn running(&self) -> Interval<bool>;

    /// The number of consecutive steps for which the plant has been on
    fn cons_running(&self) -> Interval<u32>;

    /// The number of consecutive steps for which the plant has been off
    fn cons_stopping(&self) -> Interval<u32>;

    /// The index of the current simulation step
    fn simulation_step(&self) -> u32;

    /// The constraints attached to the plant
    fn constraints(&self) -> &[Constraint];

    /// Whether the plant is certainly on
    fn only_on(&self) -> bool {
        let running = self.running();
        running.min && running.max
    }

    /// Whether the plant is certainly off
    fn only_off(&self) -> bool {
        let running = self.running();
        !running.min && !running.max
    }

    /// Whether the plant could be either on or off
    fn on_or_off(&self) -> bool {
        let running = self.running();
        running.min != running.max
    }
}

/// Parameters describing a plant's initial state and dynamic behaviour
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlantParameters {
    /// Production in the initial step
    pub power_init: Option<f64>,
    /// Consecutive steps the plant has been on in the initial step
    pub cons_running_init: Option<u32>,
    /// Consecutive steps the plant has been off in the initial step
    pub cons_stopping_init: Option<u32>,
    /// Maximum relative change in production per reference step
    pub rate_of_change: f64,
    /// Maximum absolute change in production per reference step
    pub max_production_change: f64,
    /// Minimum number of steps a plant must stay off once switched off
    pub min_off_time: u32,
    /// Minimum number of steps a plant must stay on once switched on
    pub min_on_time: u32,
}

/// A physical power plant or an aggregate of plants
#[derive(Debug, Clone, PartialEq)]
pub struct PowerPlantData {
    /// Unique name of the plant
    pub id: PlantID,
    /// Technical minimum and maximum production
    pub power_bounds: Interval<f64>,
    /// Initial state and dynamic behaviour
    pub parameters: PlantParameters,
    /// Constraints in the order they were attached
    pub constraints: Vec<Constraint>,
    /// Whether this is an aggregate of other plants
    pub is_aggregate: bool,
    /// Feasible regions and holes at one instant (aggregates only)
    pub supply: Option<SupplyRegions>,
    /// Feasible regions and holes for each step of the planning horizon (aggregates only)
    pub horizon: IntervalSet,
    /// Upper bound on next-step production given current production
    pub positive_delta: Option<PiecewiseLinearFunction>,
    /// Lower bound on next-step production given current production
    pub negative_delta: Option<PiecewiseLinearFunction>,
    /// Cost of producing a given amount
    pub cost_function: Option<PiecewiseLinearFunction>,
    /// The next identifier for each kind of constraint
    constraint_counters: HashMap<&'static str, u32>,
}
define_id_getter! {PowerPlantData, PlantID}

impl PowerPlantData {
    /// Create a new physical plant
    pub fn new(id: PlantID, power_bounds: Interval<f64>) -> Self {
        Self {
            id,
            power_bounds,
            parameters: PlantParameters::default(),
            constraints: Vec::new(),
            is_aggregate: false,
            supply: None,
            horizon: IntervalSet::new(),
            positive_delta: None,
            negative_delta: None,
            cost_function: None,
            constraint_counters: HashMap::new(),
        }
    }

    /// Create a new aggregate plant, whose bounds are set once it has been abstracted
    pub fn new_aggregate(id: PlantID) -> Self {
        Self {
            is_aggregate: true,
            ..Self::new(id, Interval::point(0.0))
        }
    }

    /// Attach a hard constraint, stamping it with the next identifier for its kind
    pub fn add_constraint(&mut self, kind: ConstraintKind) -> &mut Constraint {
        let counter = self.constraint_counters.entry(kind.name()).or_insert(0);
        let constraint = Constraint::new(kind, self.id.clone(), *counter);
        *counter += 1;

        let index = self.constraints.len();
        self.constraints.push(constraint);
        &mut self.constraints[index]
    }

    /// Attach a soft constraint with the given weight
    pub fn add_soft_constraint(&mut self, kind: ConstraintKind, weight: u32) -> &mut Constraint {
        let constraint = self.add_constraint(kind);
        constraint.soft = true;
        constraint.weight = weight;
        constraint
    }

    /// Whether the plant must always be on
    pub fn must_run(&self) -> bool {
        self.constraints
            .iter()
            .any(|c| !c.soft && c.kind == ConstraintKind::ForceOn)
    }

    /// Production in the initial step, defaulting to the technical minimum
    pub fn initial_power(&self) -> f64 {
        self.parameters
            .power_init
            .unwrap_or(self.power_bounds.min)
    }

    /// The feasible regions from the general abstraction, if performed
    pub fn feasible_regions(&self) -> Option<&FeasibleRegions> {
        self.supply.as_ref().map(|supply| &supply.feasible_regions)
    }

    /// The holes from the general abstraction, if performed
    pub fn holes(&self) -> Option<&[Interval<f64>]> {
        self.supply.as_ref().map(|supply| supply.holes.as_slice())
    }

    /// The ranges of production this plant can contribute at one instant.
    ///
    /// A physical plant contributes its technical bounds, plus zero if it can be switched off.
    /// An aggregate contributes its feasible regions.
    pub fn supply_options(&self) -> Result<Vec<Interval<f64>>> {
        if self.is_aggregate {
            let regions = self
                .feasible_regions()
                .with_context(|| format!("Aggregate {} has not been abstracted", self.id))?;
            return Ok(regions.as_slice().to_vec());
        }

        let mut options = Vec::with_capacity(2);
        if !self.must_run() {
            options.push(Interval::point(0.0));
        }
        options.push(self.power_bounds);
        Ok(options)
    }

    /// The feasible regions for a step of the planning horizon.
    ///
    /// Falls back to the general feasible regions if the step hasn't been computed.
    pub fn regions_for_step(&self, step: usize) -> Option<&FeasibleRegions> {
        self.horizon
            .get(step)
            .map(|supply| &supply.feasible_regions)
            .filter(|regions| !regions.is_empty())
            .or_else(|| self.feasible_regions())
    }

    /// Widen the general feasible regions so that they include `power`.
    ///
    /// Returns `true` if the regions had to be changed.
    pub fn make_bounds_consistent(&mut self, power: f64) -> bool {
        let Some(supply) = self.supply.as_mut() else {
            return false;
        };

        let changed = supply.feasible_regions.make_consistent(power);
        if changed {
            supply.holes = supply.feasible_regions.holes();
        }

        changed
    }
}

/// The state of a plant at one step of the planning horizon
#[derive(Debug, Clone)]
pub struct PlantState<'a> {
    data: &'a PowerPlantData,
    constraints: Vec<Constraint>,
    power: Interval<f64>,
    running: Interval<bool>,
    cons_running: Interval<u32>,
    cons_stopping: Interval<u32>,
    simulation_step: u32,
}

impl<'a> PlantState<'a> {
    /// Create the initial state of a plant from its parameters.
    ///
    /// Missing counters default to a plant which has just been switched on and missing power to the
    /// technical minimum.
    pub fn initialize(data: &'a PowerPlantData) -> Self {
        let params = &data.parameters;
        let cons_running = params.cons_running_init.unwrap_or(1);
        let cons_stopping = params.cons_stopping_init.unwrap_or(0);

        Self {
            data,
            constraints: data.constraints.clone(),
            power: Interval::point(data.initial_power()),
            running: Interval::point(cons_running > 0),
            cons_running: Interval::point(cons_running),
            cons_stopping: Interval::point(cons_stopping),
            simulation_step: 0,
        }
    }

    /// Create the state of a plant which has just been switched on and produces `power`
    pub fn at_power(data: &'a PowerPlantData, power: f64) -> Self {
        Self {
            data,
            constraints: data.constraints.clone(),
            power: Interval::point(power),
            running: Interval::point(true),
            cons_running: Interval::point(1),
            cons_stopping: Interval::point(0),
            simulation_step: 0,
        }
    }

    /// The plant this state belongs to
    pub fn data(&self) -> &'a PowerPlantData {
        self.data
    }

    /// Set the length of a step for all of the plant's constraints
    pub fn set_delta_time(&mut self, delta_time: f64) {
        for constraint in &mut self.constraints {
            constraint.delta_time = delta_time;
        }
    }

    /// Set the index of the current step
    pub fn set_simulation_step(&mut self, step: u32) {
        self.simulation_step = step;
    }

    /// Set the range of production
    pub fn set_power(&mut self, power: Interval<f64>) {
        self.power = power;
    }

    /// Set the on/off status
    pub fn set_running(&mut self, running: Interval<bool>) {
        self.running = running;
    }

    /// Set the consecutive running and stopping counters
    pub fn set_counters(&mut self, cons_running: Interval<u32>, cons_stopping: Interval<u32>) {
        self.cons_running = cons_running;
        self.cons_stopping = cons_stopping;
    }

    /// Advance the consecutive running/stopping counters into a step with the given on/off bounds.
    ///
    /// Each counter is an interval over every on/off trajectory the plant could have followed. A
    /// plant which must be on can't also be forced off, so `on_min` takes precedence.
    pub fn update_running(&mut self, on_min: bool, on_max: bool) {
        let on_max = on_max || on_min;
        let (cons_running, cons_stopping) = (self.cons_running, self.cons_stopping);

        self.cons_running = Interval {
            min: if on_min { cons_running.min + 1 } else { 0 },
            max: match (on_max, self.running.max) {
                (false, _) => 0,
                (true, true) => cons_running.max + 1,
                (true, false) => 1,
            },
        };
        self.cons_stopping = Interval {
            min: if on_max { 0 } else { cons_stopping.min + 1 },
            max: match (on_min, self.running.min) {
                (true, _) => 0,
                (false, false) => cons_stopping.max + 1,
                (false, true) => 1,
            },
        };
        self.running = Interval {
            min: on_min,
            max: on_max,
        };
    }
}

impl Plant for PlantState<'_> {
    fn id(&self) -> &PlantID {
        &self.data.id
    }

    fn technical_bounds(&self) -> Interval<f64> {
        self.data.power_bounds
    }

    fn power(&self) -> Interval<f64> {
        self.power
    }

    fn running(&self) -> Interval<bool> {
        self.running
    }

    fn cons_running(&self) -> Interval<u32> {
        self.cons_running
    }

    fn cons_stopping(&self) -> Interval<u32> {
        self.cons_stopping
    }

    fn simulation_step(&self) -> u32 {
        self.simulation_step
    }

    fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, plant_p1};
    use rstest::rstest;

    #[rstest]
    fn test_add_constraint_ids(mut plant_p1: PowerPlantData) {
        plant_p1.constraints.clear();
        plant_p1.constraint_counters.clear();

        plant_p1.add_constraint(ConstraintKind::Bounds);
        plant_p1.add_constraint(ConstraintKind::FixedChange { max_change: 5.0 });
        plant_p1.add_constraint(ConstraintKind::FixedChange { max_change: 10.0 });
        plant_p1.add_soft_constraint(ConstraintKind::GraduallyOff, 3);

        let identities: Vec<_> = plant_p1.constraints.iter().map(Constraint::identity).collect();
        assert_eq!(
            identities,
            [
                "P1BoundsConstraint_0",
                "P1FixedChangeConstraint_0",
                "P1FixedChangeConstraint_1",
                "P1GraduallyOffConstraint_0"
            ]
        );
        assert!(plant_p1.constraints[3].soft);
        assert_eq!(plant_p1.constraints[3].weight, 3);
    }

    #[rstest]
    fn test_supply_options(mut plant_p1: PowerPlantData) {
        assert_eq!(
            plant_p1.supply_options().unwrap(),
            [Interval::new(50.0, 100.0)]
        );

        plant_p1.constraints.retain(|c| c.kind != ConstraintKind::ForceOn);
        assert_eq!(
            plant_p1.supply_options().unwrap(),
            [Interval::point(0.0), Interval::new(50.0, 100.0)]
        );
    }

    #[test]
    fn test_supply_options_aggregate() {
        let mut aggregate = PowerPlantData::new_aggregate("AVPP_1".into());
        assert_error!(
            aggregate.supply_options(),
            "Aggregate AVPP_1 has not been abstracted"
        );

        aggregate.supply = Some(SupplyRegions::from_regions(
            FeasibleRegions::from_intervals([Interval::point(0.0), Interval::new(10.0, 20.0)])
                .unwrap(),
        ));
        assert_eq!(
            aggregate.supply_options().unwrap(),
            [Interval::point(0.0), Interval::new(10.0, 20.0)]
        );
    }

    #[test]
    fn test_make_bounds_consistent() {
        let mut aggregate = PowerPlantData::new_aggregate("AVPP_1".into());
        assert!(!aggregate.make_bounds_consistent(5.0));

        aggregate.supply = Some(SupplyRegions::from_regions(
            FeasibleRegions::from_intervals([Interval::point(0.0), Interval::new(10.0, 20.0)])
                .unwrap(),
        ));
        assert!(!aggregate.make_bounds_consistent(15.0));
        assert!(aggregate.make_bounds_consistent(8.0));
        assert_eq!(aggregate.holes().unwrap(), [Interval::new(0.0, 8.0)]);
    }

    #[rstest]
    fn test_initialize(plant_p1: PowerPlantData) {
        let state = PlantState::initialize(&plant_p1);
        assert_eq!(state.power(), Interval::point(60.0));
        assert!(state.only_on());
        assert_eq!(state.cons_running(), Interval::point(1));
        assert_eq!(state.cons_stopping(), Interval::point(0));
    }

    #[test]
    fn test_initialize_off() {
        let mut data = PowerPlantData::new("P".into(), Interval::new(10.0, 20.0));
        data.parameters.cons_running_init = Some(0);
        data.parameters.cons_stopping_init = Some(3);
        data.parameters.power_init = Some(0.0);

        let state = PlantState::initialize(&data);
        assert!(state.only_off());
        assert_eq!(state.cons_stopping(), Interval::point(3));
    }

    #[rstest]
    fn test_update_running(plant_p1: PowerPlantData) {
        let mut state = PlantState::initialize(&plant_p1);

        // Could switch off
        state.update_running(false, true);
        assert!(state.on_or_off());
        assert_eq!(state.cons_running(), Interval::new(0, 2));
        assert_eq!(state.cons_stopping(), Interval::new(0, 1));

        // Stays uncertain
        state.update_running(false, true);
        assert_eq!(state.cons_running(), Interval::new(0, 3));
        assert_eq!(state.cons_stopping(), Interval::new(0, 2));

        // Forced off
        state.update_running(false, false);
        assert!(state.only_off());
        assert_eq!(state.cons_running(), Interval::point(0));
        assert_eq!(state.cons_stopping(), Interval::new(1, 3));

        // Forced on
        state.update_running(true, true);
        assert!(state.only_on());
        assert_eq!(state.cons_running(), Interval::point(1));
        assert_eq!(state.cons_stopping(), Interval::point(0));
    }

    #[rstest]
    fn test_update_running_conflicting_bounds(plant_p1: PowerPlantData) {
        let mut state = PlantState::initialize(&plant_p1);
        state.update_running(true, false);
        assert!(state.only_on());
        assert_eq!(state.cons_running(), Interval::point(2));
    }
}
