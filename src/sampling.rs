//! The sampling abstraction: learning piecewise linear surrogates of an aggregate's model.
//!
//! The aggregate's optimisation model is solved by an external [`Solver`] for a series of values of
//! its input (current production). For each [`OptimizationCriterion`], the optimal values found are
//! fitted with a [`PiecewiseLinearFunction`]. Which inputs are tried is decided by a
//! [`SamplingPointSelector`].
use crate::interval::SupplyRegions;
use crate::pwl::{InOutPair, PiecewiseLinearFunction};
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use log::{debug, info, warn};
use std::fmt;

pub mod active_learning;
pub mod selector;
pub mod solver;

use selector::SamplingPointSelector;
use solver::Solver;

/// The decision expression for the aggregate's current production
pub const INPUT_EXPRESSION: &str = "totalProductionInit";
/// The decision expression for the aggregate's production in the next step
pub const SUCCESSOR_PRODUCTION: &str = "totalProductionSucc";
/// The decision expression for the cost of the aggregate's current production
pub const INITIAL_COST: &str = "totalCostInit";

/// Sampled inputs closer than this to the requested input are taken to be equal to it
const INPUT_SNAP_TOLERANCE: f64 = 1e-4;
/// Candidate inputs closer than this are duplicates
const DUPLICATE_INPUT_TOLERANCE: f64 = 1e-5;
/// Statically sampled outputs within this of the previous output or of the input are snapped to it
const OUTPUT_SNAP_TOLERANCE: f64 = 1e-3;

/// A decision expression along with whether it is minimised or maximised
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OptimizationCriterion {
    /// The expression to optimise
    pub expression: String,
    /// Whether to minimise (rather than maximise) the expression
    pub minimize: bool,
    /// Whether the optimum is bounded by the input (e.g. the maximum next-step production is at
    /// least the current production)
    pub extensive: bool,
}

impl OptimizationCriterion {
    /// Create a criterion. Everything but the cost is extensive.
    pub fn new(expression: &str, minimize: bool) -> Self {
        Self {
            expression: expression.to_string(),
            minimize,
            extensive: expression != INITIAL_COST,
        }
    }

    /// A name for the criterion, e.g. `max_totalProductionSucc`
    pub fn identifier(&self) -> String {
        self.to_string()
    }

    /// Whether a sampled pair is impossible for an extensive criterion, i.e. a maximised output
    /// below its input or a minimised output above it
    pub fn violates_extensivity(&self, pair: InOutPair) -> bool {
        self.extensive
            && if self.minimize {
                pair.output > pair.input
            } else {
                pair.output < pair.input
            }
    }
}

impl fmt::Display for OptimizationCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = if self.minimize { "min" } else { "max" };
        write!(f, "{prefix}_{}", self.expression)
    }
}

/// The criteria for the positive delta, negative delta and cost function, in that order
pub fn standard_criteria() -> Vec<OptimizationCriterion> {
    vec![
        OptimizationCriterion::new(SUCCESSOR_PRODUCTION, false),
        OptimizationCriterion::new(SUCCESSOR_PRODUCTION, true),
        OptimizationCriterion::new(INITIAL_COST, true),
    ]
}

/// Sampled pairs sorted by input, with at most one pair per input
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampledPairs(Vec<InOutPair>);

impl SampledPairs {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pair. Returns `false` (and keeps the existing pair) if the input was already sampled.
    pub fn insert(&mut self, pair: InOutPair) -> bool {
        match self.0.binary_search(&pair) {
            Ok(_) => false,
            Err(index) => {
                self.0.insert(index, pair);
                true
            }
        }
    }

    /// Whether `input` has been sampled
    pub fn contains_input(&self, input: f64) -> bool {
        self.0.binary_search(&InOutPair::new(input, 0.0)).is_ok()
    }

    /// The number of pairs
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no pairs
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The pairs in order of input
    pub fn as_slice(&self) -> &[InOutPair] {
        &self.0
    }
}

impl FromIterator<InOutPair> for SampledPairs {
    fn from_iter<I: IntoIterator<Item = InOutPair>>(iter: I) -> Self {
        let mut pairs = Self::new();
        for pair in iter {
            pairs.insert(pair);
        }
        pairs
    }
}

/// Learns functions of an aggregate's production by sampling its model
#[derive(Debug, Clone)]
pub struct SamplingAbstraction {
    supply: SupplyRegions,
    initial_sampling_points: usize,
    tolerance: f64,
    prolong_ad_infinitum: bool,
}

impl SamplingAbstraction {
    /// Create an abstraction for an aggregate with the given general feasible regions and holes
    pub fn new(supply: SupplyRegions) -> Self {
        Self {
            supply,
            initial_sampling_points: 0,
            tolerance: 0.0,
            prolong_ad_infinitum: false,
        }
    }

    /// Number of equidistant inputs sampled before the selector takes over. The boundaries of the
    /// feasible regions are always sampled first.
    pub fn with_initial_sampling_points(mut self, initial_sampling_points: usize) -> Self {
        self.initial_sampling_points = initial_sampling_points;
        self
    }

    /// How far the solver may move away from a requested input, as a fraction of the distance
    /// between equidistant inputs
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Extend the outermost slopes of learned functions to infinity rather than keeping them flat
    pub fn with_prolong_ad_infinitum(mut self, prolong_ad_infinitum: bool) -> Self {
        self.prolong_ad_infinitum = prolong_ad_infinitum;
        self
    }

    /// The total width of the feasible regions
    fn domain_width(&self) -> f64 {
        self.supply
            .feasible_regions
            .iter()
            .map(|region| region.max - region.min)
            .sum()
    }

    /// The distance between equidistant inputs when `sample_points` are spread over the domain
    pub fn step_size(&self, sample_points: usize) -> f64 {
        if sample_points < 2 {
            return self.domain_width();
        }
        self.domain_width() / (sample_points - 1) as f64
    }

    /// Spread `sample_points` equidistant inputs over the feasible regions, treating them as one
    /// contiguous domain with the holes cut out.
    ///
    /// The boundaries of every region are always included, so there may be more inputs than
    /// requested. The inputs are sorted and free of duplicates.
    pub fn calculate_input_points(&self, sample_points: usize) -> Vec<f64> {
        let mut regions = self.supply.feasible_regions.iter();
        let Some(mut region) = regions.next() else {
            return Vec::new();
        };

        let mut points: Vec<f64> = self
            .supply
            .feasible_regions
            .iter()
            .flat_map(|region| [region.min, region.max])
            .collect();

        let step = self.step_size(sample_points);
        let mut current = region.min;
        'steps: for _ in 2..sample_points {
            let mut next = current + step;
            while next > region.max {
                let offset = next - region.max;
                let Some(next_region) = regions.next() else {
                    warn!("Input {next} lies beyond the last feasible region {region}");
                    break 'steps;
                };
                region = next_region;
                next = region.min + offset;
            }

            current = next;
            points.push(current);
        }

        points.sort_by(f64::total_cmp);
        points.dedup_by(|point, previous| (*point - *previous).abs() < DUPLICATE_INPUT_TOLERANCE);
        points
    }

    /// Learn a function for each criterion by walking through `sample_points` equidistant inputs.
    ///
    /// Unlike [`SamplingAbstraction::perform`], a failed solve for an extensive criterion is
    /// recorded as the output being equal to the input, and outputs which are only off by solver
    /// noise are snapped to the previous output or to the input.
    pub fn perform_static(
        &self,
        solver: &mut dyn Solver,
        criteria: &[OptimizationCriterion],
        sample_points: usize,
    ) -> Result<IndexMap<OptimizationCriterion, PiecewiseLinearFunction>> {
        let sample_points = sample_points + self.initial_sampling_points;
        let inputs = self.calculate_input_points(sample_points);
        let input_tolerance = self.tolerance * self.step_size(sample_points);
        solver.set_abstraction_data(&self.supply);

        let mut functions = IndexMap::new();
        for criterion in criteria {
            solver.set_objective(&criterion.expression, !criterion.minimize);
            solver.set_input_expression(INPUT_EXPRESSION);

            let function = self.sample_statically(solver, criterion, &inputs, input_tolerance)?;
            info!(
                "Learned {criterion} with {} breakpoints",
                function.breakpoints().len()
            );
            functions.insert(criterion.clone(), function);
        }

        Ok(functions)
    }

    fn sample_statically(
        &self,
        solver: &mut dyn Solver,
        criterion: &OptimizationCriterion,
        inputs: &[f64],
        input_tolerance: f64,
    ) -> Result<PiecewiseLinearFunction> {
        let mut sampled = SampledPairs::new();
        let mut previous_output = None;
        for &input in inputs {
            let mut pair = match solve_for_input(solver, input, input_tolerance, criterion) {
                Ok(pair) => pair,
                Err(err) => {
                    warn!("Could not sample {criterion} at input {input}: {err:#}");
                    if criterion.extensive {
                        sampled.insert(InOutPair::new(input, input));
                    }
                    continue;
                }
            };

            if let Some(previous) = previous_output.filter(|&previous| {
                pair.output < previous && previous - pair.output <= OUTPUT_SNAP_TOLERANCE
            }) {
                pair.output = previous;
            }
            if (pair.input - pair.output).abs() < OUTPUT_SNAP_TOLERANCE {
                pair.output = pair.input;
            }
            ensure!(
                !criterion.violates_extensivity(pair),
                "Output {} of {criterion} at input {} violates extensivity",
                pair.output,
                pair.input
            );

            previous_output = Some(pair.output);
            sampled.insert(pair);
        }

        self.fit(criterion, &sampled)
    }

    /// Learn a function for each criterion, sampling up to `budget` inputs chosen by `selector`
    pub fn perform(
        &self,
        solver: &mut dyn Solver,
        selector: &mut dyn SamplingPointSelector,
        criteria: &[OptimizationCriterion],
        budget: usize,
    ) -> Result<IndexMap<OptimizationCriterion, PiecewiseLinearFunction>> {
        solver.set_abstraction_data(&self.supply);
        let input_tolerance = self.tolerance * self.step_size(budget);

        let mut functions = IndexMap::new();
        for criterion in criteria {
            solver.set_objective(&criterion.expression, !criterion.minimize);
            solver.set_input_expression(INPUT_EXPRESSION);

            let function =
                self.sample_function(solver, selector, criterion, budget, input_tolerance)?;
            info!(
                "Learned {criterion} with {} breakpoints",
                function.breakpoints().len()
            );
            functions.insert(criterion.clone(), function);
        }

        Ok(functions)
    }

    fn sample_function(
        &self,
        solver: &mut dyn Solver,
        selector: &mut dyn SamplingPointSelector,
        criterion: &OptimizationCriterion,
        budget: usize,
        input_tolerance: f64,
    ) -> Result<PiecewiseLinearFunction> {
        let mut sampled = SampledPairs::new();
        for input in self.calculate_input_points(self.initial_sampling_points) {
            match solve_for_input(solver, input, input_tolerance, criterion) {
                Ok(pair) => {
                    sampled.insert(pair);
                }
                Err(err) => warn!("Could not sample {criterion} at initial input {input}: {err:#}"),
            }
        }

        selector.reset();
        selector.set_initial_points(sampled.as_slice());
        selector.set_abstraction_data(&self.supply);

        for _ in 0..budget {
            if !selector.has_next() {
                break;
            }
            let Some(requested) = selector.next_input() else {
                break;
            };

            match solve_for_input(solver, requested, input_tolerance, criterion) {
                Ok(mut pair) => {
                    if (pair.input - requested).abs() < INPUT_SNAP_TOLERANCE {
                        pair.input = requested;
                    } else {
                        debug!("Asked for input {requested} but the solver used {}", pair.input);
                    }
                    selector.inform(pair);
                    sampled.insert(pair);
                }
                Err(err) => {
                    warn!("Could not sample {criterion} at input {requested}: {err:#}");
                    selector.inform_failure(requested);
                }
            }
        }

        self.fit(criterion, &sampled)
    }

    /// Fit a piecewise linear function through the sampled pairs
    fn fit(
        &self,
        criterion: &OptimizationCriterion,
        sampled: &SampledPairs,
    ) -> Result<PiecewiseLinearFunction> {
        ensure!(!sampled.is_empty(), "No samples could be found for {criterion}");
        let mut function = PiecewiseLinearFunction::from_pairs(sampled.as_slice())
            .with_context(|| format!("Could not fit {criterion}"))?;
        if self.prolong_ad_infinitum {
            function.prolong_ad_infinitum();
        }

        Ok(function)
    }
}

/// Solve the model with its input fixed to `input`, cleaning up afterwards
fn solve_for_input(
    solver: &mut dyn Solver,
    input: f64,
    tolerance: f64,
    criterion: &OptimizationCriterion,
) -> Result<InOutPair> {
    solver.set_input(input, tolerance);
    if criterion.extensive {
        solver.require_extensive();
    }

    let pair = read_solution(solver);
    solver.cleanup();
    pair
}

fn read_solution(solver: &mut dyn Solver) -> Result<InOutPair> {
    solver.solve()?;
    let input = solver.result(INPUT_EXPRESSION)?;
    let output = solver.objective()?;
    Ok(InOutPair::new(input, output))
}
