//! Construction of plants of a given archetype.
//!
//! Each archetype maps to an ordered list of constraint builders in a [`ConstraintRegistry`]. The
//! [`PlantFactory`] draws an archetype's parameters from an [`RngContext`] and then attaches the
//! constraints built from them.
use super::PowerPlantData;
use crate::constraint::ConstraintKind;
use crate::interval::Interval;
use crate::random::RngContext;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde_string_enum::DeserializeLabeledStringEnum;

/// Lower limit for randomly drawn plant power
const RAND_P_MIN: f64 = 5000.0;
/// Upper limit for randomly drawn plant power
const RAND_P_MAX: f64 = 100_000.0;
/// Limits for the relative change drawn for fossil fuel and heat plants
const CHANGE_PERC_MIN: f64 = 0.20;
const CHANGE_PERC_MAX: f64 = 0.05;
/// Limits for the relative change drawn for plants read from files
const RATE_OF_CHANGE_MIN: f64 = 0.05;
const RATE_OF_CHANGE_MAX: f64 = 0.15;

/// The kinds of plant which can be constructed
#[derive(DeserializeLabeledStringEnum, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlantArchetype {
    /// A fossil fuel plant with a relative rate of change and minimum on/off times
    #[string = "fossil_fuel"]
    FossilFuel,
    /// A heat-led plant which must always run, with a fixed change per step
    #[string = "simple_heat"]
    SimpleHeat,
    /// A plant with only technical bounds
    #[string = "canonical"]
    Canonical,
    /// A biomass plant with a random change constraint and a stop time
    #[string = "bio"]
    Bio,
    /// A gas plant with a random change constraint
    #[string = "gas"]
    Gas,
}

/// Builds a constraint for a plant whose parameters have been set
pub type ConstraintBuilder = Box<dyn Fn(&PowerPlantData) -> ConstraintKind>;

fn bounds() -> ConstraintBuilder {
    Box::new(|_: &PowerPlantData| ConstraintKind::Bounds)
}

fn rate_of_change() -> ConstraintBuilder {
    Box::new(|plant: &PowerPlantData| ConstraintKind::RateOfChange {
        rate: plant.parameters.rate_of_change,
    })
}

fn fixed_change() -> ConstraintBuilder {
    Box::new(|plant: &PowerPlantData| ConstraintKind::FixedChange {
        max_change: plant.parameters.max_production_change,
    })
}

/// Whichever change constraint the plant has a parameter for
fn change() -> ConstraintBuilder {
    Box::new(|plant: &PowerPlantData| {
        if plant.parameters.rate_of_change > 0.0 {
            ConstraintKind::RateOfChange {
                rate: plant.parameters.rate_of_change,
            }
        } else {
            ConstraintKind::FixedChange {
                max_change: plant.parameters.max_production_change,
            }
        }
    })
}

fn stop_time() -> ConstraintBuilder {
    Box::new(|plant: &PowerPlantData| ConstraintKind::StopTime {
        min_off_time: plant.parameters.min_off_time,
        min_on_time: plant.parameters.min_on_time,
    })
}

fn gradually_off() -> ConstraintBuilder {
    Box::new(|_: &PowerPlantData| ConstraintKind::GraduallyOff)
}

fn force_on() -> ConstraintBuilder {
    Box::new(|_: &PowerPlantData| ConstraintKind::ForceOn)
}

fn start_with_min() -> ConstraintBuilder {
    Box::new(|_: &PowerPlantData| ConstraintKind::StartWithMin)
}

/// Maps each plant archetype to the constraints attached to plants of that archetype
pub struct ConstraintRegistry(IndexMap<PlantArchetype, Vec<ConstraintBuilder>>);

impl ConstraintRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    /// The constraints for each of the built-in archetypes
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(
            PlantArchetype::FossilFuel,
            vec![bounds(), rate_of_change(), gradually_off(), stop_time()],
        );
        registry.register(
            PlantArchetype::SimpleHeat,
            vec![bounds(), fixed_change(), gradually_off(), force_on()],
        );
        registry.register(
            PlantArchetype::Canonical,
            vec![bounds(), gradually_off(), start_with_min()],
        );
        registry.register(
            PlantArchetype::Bio,
            vec![
                bounds(),
                gradually_off(),
                start_with_min(),
                change(),
                stop_time(),
            ],
        );
        registry.register(
            PlantArchetype::Gas,
            vec![bounds(), gradually_off(), start_with_min(), change()],
        );
        registry
    }

    /// Set the constraint builders for an archetype, replacing any existing ones
    pub fn register(&mut self, archetype: PlantArchetype, builders: Vec<ConstraintBuilder>) {
        self.0.insert(archetype, builders);
    }

    /// Attach the constraints for `archetype` to a plant, in registration order
    pub fn attach_constraints(
        &self,
        plant: &mut PowerPlantData,
        archetype: PlantArchetype,
    ) -> Result<()> {
        let builders = self
            .0
            .get(&archetype)
            .with_context(|| format!("No constraints registered for {archetype:?} plants"))?;
        for build in builders {
            let kind = build(plant);
            plant.add_constraint(kind);
        }

        Ok(())
    }
}

impl Default for ConstraintRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

/// Creates plants of different archetypes with randomly drawn parameters
#[derive(Default)]
pub struct PlantFactory {
    registry: ConstraintRegistry,
    running_number: u32,
}

impl PlantFactory {
    /// Create a factory using the given constraint registry
    pub fn new(registry: ConstraintRegistry) -> Self {
        Self {
            registry,
            running_number: 0,
        }
    }

    /// Create a plant with randomly drawn power bounds and a generated name
    pub fn create(
        &mut self,
        archetype: PlantArchetype,
        rng: &mut RngContext,
    ) -> Result<PowerPlantData> {
        let bounds = rng.interval(RAND_P_MIN, RAND_P_MAX)?;
        let name = format!("CPP_{}", self.running_number);
        self.running_number += 1;

        self.build(&name, bounds, archetype, rng)
    }

    /// Create a plant with the given name and bounds, drawing its dynamic parameters.
    ///
    /// The plant starts at its technical minimum, having just been switched on.
    pub fn build(
        &self,
        name: &str,
        bounds: Interval<f64>,
        archetype: PlantArchetype,
        rng: &mut RngContext,
    ) -> Result<PowerPlantData> {
        let mut plant = PowerPlantData::new(name.into(), bounds);
        plant.parameters.power_init = Some(bounds.min);
        plant.parameters.cons_running_init = Some(1);
        plant.parameters.cons_stopping_init = Some(0);
        draw_parameters(&mut plant, archetype, rng)?;

        self.registry.attach_constraints(&mut plant, archetype)?;
        Ok(plant)
    }
}

/// Draw the dynamic parameters which an archetype's constraints depend on
fn draw_parameters(
    plant: &mut PowerPlantData,
    archetype: PlantArchetype,
    rng: &mut RngContext,
) -> Result<()> {
    let params = &mut plant.parameters;
    match archetype {
        PlantArchetype::FossilFuel => {
            params.min_off_time = 2;
            params.min_on_time = 2;
            params.rate_of_change = rng.double(CHANGE_PERC_MIN, CHANGE_PERC_MAX)?;
        }
        PlantArchetype::SimpleHeat => {
            params.max_production_change =
                plant.power_bounds.max * rng.double(CHANGE_PERC_MIN, CHANGE_PERC_MAX)?;
        }
        PlantArchetype::Canonical => {}
        PlantArchetype::Bio | PlantArchetype::Gas => {
            let rate = rng.double(RATE_OF_CHANGE_MIN, RATE_OF_CHANGE_MAX)?;
            if rng.boolean(0.5)? {
                params.rate_of_change = rate;
            } else {
                params.max_production_change = rate * plant.power_bounds.max;
            }
            params.min_off_time = 0;
        }
    }

    Ok(())
}
