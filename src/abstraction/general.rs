//! The general abstraction: which total production a group of plants can supply at one instant.
use super::hole_detection::detect_supply_holes;
use crate::interval::{FeasibleRegions, Interval, SupplyRegions};
use crate::plant::PowerPlantData;
use anyhow::{Context, Result};
use log::debug;

/// Computes the feasible regions and holes of the plants in an aggregate.
///
/// The abstraction is idle until [`GeneralAbstraction::perform`] is called, after which its
/// results can be queried.
pub struct GeneralAbstraction<'a> {
    plants: Vec<&'a PowerPlantData>,
    result: Option<SupplyRegions>,
}

impl<'a> GeneralAbstraction<'a> {
    /// Create an abstraction over the given plants, which may include abstracted aggregates
    pub fn new(plants: Vec<&'a PowerPlantData>) -> Self {
        Self {
            plants,
            result: None,
        }
    }

    /// Compute the feasible regions and holes.
    ///
    /// Fails if any of the plants is an aggregate which has not been abstracted yet.
    pub fn perform(&mut self) -> Result<&SupplyRegions> {
        let options = self
            .plants
            .iter()
            .map(|plant| plant.supply_options())
            .collect::<Result<Vec<_>>>()?;
        let supply = detect_supply_holes(&options)?;
        debug!(
            "General abstraction of {} plants gives {} feasible regions",
            self.plants.len(),
            supply.feasible_regions.len()
        );

        Ok(self.result.insert(supply))
    }

    /// The result of the abstraction. Fails if it hasn't been performed.
    pub fn result(&self) -> Result<&SupplyRegions> {
        self.result
            .as_ref()
            .context("General abstraction has not been performed")
    }

    /// The feasible regions. Fails if the abstraction hasn't been performed.
    pub fn feasible_regions(&self) -> Result<&FeasibleRegions> {
        Ok(&self.result()?.feasible_regions)
    }

    /// The holes. Fails if the abstraction hasn't been performed.
    pub fn holes(&self) -> Result<&[Interval<f64>]> {
        Ok(&self.result()?.holes)
    }

    /// Consume the abstraction, returning its result
    pub fn into_result(self) -> Result<SupplyRegions> {
        self.result
            .context("General abstraction has not been performed")
    }
}
