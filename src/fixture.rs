//! Fixtures for tests
use crate::constraint::ConstraintKind;
use crate::interval::Interval;
use crate::plant::PowerPlantData;
use crate::sampling::INPUT_EXPRESSION;
use crate::sampling::solver::Solver;
use anyhow::{Context, Result, ensure};
use rstest::fixture;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

/// A plant which is always on and may change production by a fixed amount per step
pub fn fixed_change_plant(name: &str, max_change: f64, power_init: f64) -> PowerPlantData {
    let mut plant = PowerPlantData::new(name.into(), Interval::new(50.0, 100.0));
    plant.parameters.power_init = Some(power_init);
    plant.parameters.cons_running_init = Some(1);
    plant.parameters.cons_stopping_init = Some(0);
    plant.parameters.max_production_change = max_change;

    plant.add_constraint(ConstraintKind::Bounds);
    plant.add_constraint(ConstraintKind::GraduallyOff);
    plant.add_constraint(ConstraintKind::StartWithMin);
    plant.add_constraint(ConstraintKind::FixedChange { max_change });
    plant.add_constraint(ConstraintKind::ForceOn);
    plant
}

/// A plant which can be switched on or off freely
pub fn on_off_plant(name: &str, min: f64, max: f64) -> PowerPlantData {
    let mut plant = PowerPlantData::new(name.into(), Interval::new(min, max));
    plant.add_constraint(ConstraintKind::Bounds);
    plant.add_constraint(ConstraintKind::StartWithMin);
    plant
}

#[fixture]
pub fn plant_p1() -> PowerPlantData {
    fixed_change_plant("P1", 5.0, 60.0)
}

#[fixture]
pub fn fixed_change_plants() -> Vec<PowerPlantData> {
    vec![
        fixed_change_plant("P1", 5.0, 60.0),
        fixed_change_plant("P2", 20.0, 100.0),
        fixed_change_plant("P3", 20.0, 90.0),
    ]
}

#[fixture]
pub fn on_off_plants() -> Vec<PowerPlantData> {
    vec![
        on_off_plant("P1", 50.0, 100.0),
        on_off_plant("P2", 15.0, 35.0),
        on_off_plant("P3", 200.0, 400.0),
    ]
}

/// A set of plants with the given maximum powers and a minimum of 20% of the maximum
pub fn plants_with_max(max_powers: &[f64]) -> Vec<PowerPlantData> {
    max_powers
        .iter()
        .enumerate()
        .map(|(i, &max)| on_off_plant(&format!("plant_{i}"), 0.2 * max, max))
        .collect()
}

/// A solver for a model whose objective is linear in the input.
///
/// The objective is `slope * input` when maximising and half that when minimising. Inputs above
/// the maximum input are infeasible.
pub struct LinearSolver {
    slope: f64,
    max_input: f64,
    input_jitter: f64,
    maximize: bool,
    input: Option<f64>,
    cleanups: usize,
}

impl LinearSolver {
    pub fn new(slope: f64) -> Self {
        Self {
            slope,
            max_input: f64::INFINITY,
            input_jitter: 0.0,
            maximize: true,
            input: None,
            cleanups: 0,
        }
    }

    /// Make inputs above `max_input` infeasible
    pub fn with_max_input(mut self, max_input: f64) -> Self {
        self.max_input = max_input;
        self
    }

    /// Report an input which differs from the requested one by `jitter`
    pub fn with_input_jitter(mut self, jitter: f64) -> Self {
        self.input_jitter = jitter;
        self
    }

    pub fn cleanups(&self) -> usize {
        self.cleanups
    }

    fn input(&self) -> Result<f64> {
        self.input.context("No input has been set")
    }
}

impl Solver for LinearSolver {
    fn set_objective(&mut self, _expression: &str, maximize: bool) {
        self.maximize = maximize;
    }

    fn set_input_expression(&mut self, _expression: &str) {}

    fn set_input(&mut self, value: f64, _tolerance: f64) {
        self.input = Some(value);
    }

    fn solve(&mut self) -> Result<()> {
        let input = self.input()?;
        ensure!(input <= self.max_input, "No solution for input {input}");
        Ok(())
    }

    fn result(&self, expression: &str) -> Result<f64> {
        ensure!(
            expression == INPUT_EXPRESSION,
            "Unknown expression {expression}"
        );
        Ok(self.input()? + self.input_jitter)
    }

    fn objective(&self) -> Result<f64> {
        let slope = if self.maximize {
            self.slope
        } else {
            0.5 * self.slope
        };
        Ok(slope * self.input()?)
    }

    fn cleanup(&mut self) {
        self.input = None;
        self.cleanups += 1;
    }
}
