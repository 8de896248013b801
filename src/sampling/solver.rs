//! The interface to an external constraint solver holding the model of an aggregate.
use crate::interval::SupplyRegions;
use anyhow::Result;

/// A solver for the optimisation model of an aggregate.
///
/// The model has an input expression (the aggregate's current production) which is fixed before
/// each solve, and one or more decision expressions which can be optimised or read back.
pub trait Solver {
    /// Set the expression to optimise
    fn set_objective(&mut self, expression: &str, maximize: bool);

    /// Set the expression which [`Solver::set_input`] fixes
    fn set_input_expression(&mut self, expression: &str);

    /// Fix the input expression to `value`, allowing it to deviate by up to `tolerance`
    fn set_input(&mut self, value: f64, tolerance: f64);

    /// Restrict the objective so that it can't be worse than the input (e.g. next-step production
    /// can't be less than current production when maximising it)
    fn require_extensive(&mut self) {}

    /// Inform the model about the general feasible regions and holes of the aggregate
    fn set_abstraction_data(&mut self, _supply: &SupplyRegions) {}

    /// Solve the model. An error means no solution was found for the current input.
    fn solve(&mut self) -> Result<()>;

    /// The value of an expression in the last solution
    fn result(&self, expression: &str) -> Result<f64>;

    /// The objective value of the last solution
    fn objective(&self) -> Result<f64>;

    /// Remove any per-solve restrictions, ready for the next input
    fn cleanup(&mut self);
}
