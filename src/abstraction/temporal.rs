//! The temporal abstraction: feasible regions of a group of plants over a planning horizon.
//!
//! Each physical plant is stepped forward from its initial state. At every step its hard
//! constraints bound the production and on/off status it can reach, and the reachable ranges of all
//! plants are combined as in the general abstraction. Child aggregates contribute the regions of
//! their own temporal abstraction for the same step.
use super::hole_detection::detect_supply_holes;
use crate::constraint::DEFAULT_DELTA_TIME;
use crate::interval::{FeasibleRegions, Interval, IntervalSet};
use crate::plant::{Plant, PlantState, PowerPlantData};
use crate::pwl::{InOutPair, PiecewiseLinearFunction};
use anyhow::{Context, Result};
use derive_more::Display;
use log::debug;

/// Minimum width of the production range of a running plant in one step, capped at its technical
/// maximum
pub const MIN_REGION_WIDTH: f64 = 2.0;
/// Tolerance within which a step's regions are considered equal to the general regions
const CONVERGENCE_EPSILON: f64 = 0.1;
/// Totals closer than this to the current production don't get their own delta sample
const EXTREME_TOLERANCE: f64 = 0.05;
/// Production is considered to have stopped changing when steps differ by less than this
const STATIONARY_TOLERANCE: f64 = 1e-3;
/// Delta samples whose inputs are closer than this are duplicates
const INPUT_TOLERANCE: f64 = 1e-5;

/// Which bound of next-step production a delta function describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
enum DeltaDirection {
    #[display("positive")]
    Positive,
    #[display("negative")]
    Negative,
}

impl DeltaDirection {
    /// The production a plant starts from when sampling the extreme of its range
    fn extreme(self, bounds: Interval<f64>) -> f64 {
        match self {
            Self::Positive => bounds.min,
            Self::Negative => bounds.max,
        }
    }

    /// The furthest production reachable in a step
    fn reachable(self, regions: &FeasibleRegions) -> Option<f64> {
        match self {
            Self::Positive => regions.last().map(|region| region.max),
            Self::Negative => regions.first().map(|region| region.min),
        }
    }

    /// The delta function of an abstracted aggregate in this direction
    fn delta_of(self, plant: &PowerPlantData) -> Option<&PiecewiseLinearFunction> {
        match self {
            Self::Positive => plant.positive_delta.as_ref(),
            Self::Negative => plant.negative_delta.as_ref(),
        }
    }
}

/// Computes the feasible regions of the plants in an aggregate for each step of a horizon
pub struct TemporalAbstraction<'a> {
    plants: Vec<&'a PowerPlantData>,
    general_regions: Option<FeasibleRegions>,
    minutes_per_step: f64,
}

impl<'a> TemporalAbstraction<'a> {
    /// Create an abstraction over the given plants, which may include abstracted aggregates
    pub fn new(plants: Vec<&'a PowerPlantData>) -> Self {
        Self {
            plants,
            general_regions: None,
            minutes_per_step: DEFAULT_DELTA_TIME,
        }
    }

    /// Stop early once a step's regions match the regions of the general abstraction
    pub fn with_general_regions(mut self, regions: FeasibleRegions) -> Self {
        self.general_regions = Some(regions);
        self
    }

    /// Set the length of a step in minutes
    pub fn with_minutes_per_step(mut self, minutes_per_step: f64) -> Self {
        self.minutes_per_step = minutes_per_step;
        self
    }

    fn physical_plants(&self) -> impl Iterator<Item = &'a PowerPlantData> + '_ {
        self.plants.iter().copied().filter(|plant| !plant.is_aggregate)
    }

    fn aggregates(&self) -> impl Iterator<Item = &'a PowerPlantData> + '_ {
        self.plants.iter().copied().filter(|plant| plant.is_aggregate)
    }

    /// Total production in the initial step
    fn initial_total(&self) -> f64 {
        self.plants.iter().map(|plant| plant.initial_power()).sum()
    }

    /// Compute the feasible regions for steps `1..=horizon`, starting from the plants' initial
    /// states.
    ///
    /// Fewer steps are returned if the regions converge to the general regions first.
    pub fn perform(&self, horizon: u32) -> Result<IntervalSet> {
        let states = self.physical_plants().map(PlantState::initialize).collect();
        self.propagate(states, self.initial_total(), horizon)
    }

    /// Step the given states forward, repairing each step's regions so that they contain `anchor`
    fn propagate(
        &self,
        mut states: Vec<PlantState<'a>>,
        anchor: f64,
        horizon: u32,
    ) -> Result<IntervalSet> {
        for state in &mut states {
            state.set_delta_time(self.minutes_per_step);
        }

        let mut steps = IntervalSet::new();
        for step in 1..=horizon {
            let mut options: Vec<_> = states
                .iter_mut()
                .map(|state| advance_state(state, step))
                .collect();
            for aggregate in self.aggregates() {
                let regions = aggregate
                    .regions_for_step(step as usize - 1)
                    .with_context(|| {
                        format!("Aggregate {} has not been abstracted", aggregate.id)
                    })?;
                options.push(regions.as_slice().to_vec());
            }

            let mut supply = detect_supply_holes(&options)?;
            if supply.feasible_regions.is_empty() {
                break;
            }
            if supply.feasible_regions.make_consistent(anchor) {
                debug!("Widened feasible regions of step {step} to contain production {anchor}");
                supply.holes = supply.feasible_regions.holes();
            }

            let converged = self.general_regions.as_ref().is_some_and(|general| {
                supply
                    .feasible_regions
                    .approx_eq(general, CONVERGENCE_EPSILON)
            });
            steps.push(supply);
            if converged {
                debug!("Temporal abstraction converged after {step} steps");
                break;
            }
        }

        Ok(steps)
    }

    /// The upper bound on next-step production as a function of current production.
    ///
    /// `steps` are the results of [`TemporalAbstraction::perform`].
    pub fn positive_delta(&self, steps: &IntervalSet) -> Result<PiecewiseLinearFunction> {
        self.delta_function(steps, DeltaDirection::Positive)
    }

    /// The lower bound on next-step production as a function of current production.
    ///
    /// `steps` are the results of [`TemporalAbstraction::perform`].
    pub fn negative_delta(&self, steps: &IntervalSet) -> Result<PiecewiseLinearFunction> {
        self.delta_function(steps, DeltaDirection::Negative)
    }

    fn delta_function(
        &self,
        steps: &IntervalSet,
        direction: DeltaDirection,
    ) -> Result<PiecewiseLinearFunction> {
        let pairs = self.delta_pairs(steps, direction)?;
        PiecewiseLinearFunction::from_pairs(&pairs)
            .with_context(|| format!("Could not derive {direction} delta function"))
    }

    /// Sample next-step production from the extreme total and along the horizon from the current
    /// total
    fn delta_pairs(
        &self,
        steps: &IntervalSet,
        direction: DeltaDirection,
    ) -> Result<Vec<InOutPair>> {
        let current_total = self.initial_total();
        let mut pairs: Vec<_> = self
            .extreme_step(direction)?
            .into_iter()
            .filter(|pair| (pair.input - current_total).abs() > EXTREME_TOLERANCE)
            .collect();

        let mut current = current_total;
        for supply in steps.iter() {
            let Some(next) = direction.reachable(&supply.feasible_regions) else {
                break;
            };
            pairs.push(InOutPair::new(current, next));
            if (current - next).abs() < STATIONARY_TOLERANCE {
                break;
            }
            current = next;
        }

        // Continue the only observed change at the same rate
        if let [only] = pairs.as_slice() {
            let extrapolated = InOutPair::new(only.output, 2.0 * only.output - only.input);
            pairs.push(extrapolated);
        }

        pairs.sort();
        pairs.dedup_by(|pair, previous| (pair.input - previous.input).abs() < INPUT_TOLERANCE);
        Ok(pairs)
    }

    /// The production reachable in one step when every plant starts from the extreme of its range.
    ///
    /// A child aggregate can't reach its whole next-step region from its own extreme, so it
    /// contributes the value of its delta function there instead. Without a delta function it
    /// contributes its span.
    fn extreme_step(&self, direction: DeltaDirection) -> Result<Option<InOutPair>> {
        let mut extreme_total = 0.0;
        let mut options = Vec::with_capacity(self.plants.len());
        for plant in self.physical_plants() {
            let power = direction.extreme(plant.power_bounds);
            extreme_total += power;

            let mut state = PlantState::at_power(plant, power);
            state.set_delta_time(self.minutes_per_step);
            options.push(advance_state(&mut state, 1));
        }
        for aggregate in self.aggregates() {
            let span = aggregate
                .feasible_regions()
                .and_then(FeasibleRegions::span)
                .with_context(|| format!("Aggregate {} has not been abstracted", aggregate.id))?;
            let power = direction.extreme(span);
            extreme_total += power;

            let reach = direction
                .delta_of(aggregate)
                .map_or(span, |delta| Interval::point(delta.evaluate(power)));
            options.push(vec![reach]);
        }

        let supply = detect_supply_holes(&options)?;
        Ok(direction
            .reachable(&supply.feasible_regions)
            .map(|next| InOutPair::new(extreme_total, next)))
    }
}

/// Advance a plant into the next step, returning the production ranges it could supply
fn advance_state(state: &mut PlantState, step: u32) -> Vec<Interval<f64>> {
    state.set_simulation_step(step);

    let (mut power_min, mut power_max) = (f64::NEG_INFINITY, f64::INFINITY);
    let (mut on_min, mut on_max) = (false, true);
    let plant: &PlantState = state;
    for constraint in plant.constraints().iter().filter(|c| !c.soft) {
        power_min = power_min.max(constraint.minimize(plant));
        power_max = power_max.min(constraint.maximize(plant));
        on_min |= constraint.minimize_bool(plant);
        on_max &= constraint.maximize_bool(plant);
    }

    state.update_running(on_min, on_max);
    let running = state.running();
    let technical = state.technical_bounds();
    if !running.min {
        power_min = 0.0;
    }
    if running.max {
        power_max = power_max.max(technical.min);
    } else {
        power_max = 0.0;
    }
    state.set_power(Interval {
        min: power_min,
        max: power_max.max(power_min),
    });

    let mut options = Vec::with_capacity(2);
    if !state.only_on() {
        options.push(Interval::point(0.0));
    }
    if !state.only_off() {
        let min = power_min.max(technical.min);
        let max = power_max
            .max(technical.min + MIN_REGION_WIDTH)
            .min(technical.max.max(min))
            .max(min);
        options.push(Interval { min, max });
    }

    options
}
