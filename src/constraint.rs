//! Constraints limiting how a plant's production and on/off status may change from one step to the
//! next.
//!
//! Each constraint narrows the bounds of the next step's production (`maximize`/`minimize`) and
//! on/off status (`maximize_bool`/`minimize_bool`) given the plant's current state. Constraints which
//! don't restrict a quantity return the permissive default (±infinity for production, `true` for
//! the upper on/off bound and `false` for the lower one).
use crate::plant::{Plant, PlantID};
use strum::IntoStaticStr;

pub mod relationships;

/// The default length of a simulation step in minutes
pub const DEFAULT_DELTA_TIME: f64 = 15.0;

/// The step length in minutes to which rates of change refer
const REFERENCE_DELTA_TIME: f64 = 15.0;

/// The kinds of constraint which can be attached to a plant
#[derive(Debug, Clone, PartialEq, IntoStaticStr)]
pub enum ConstraintKind {
    /// Production must lie within the plant's technical bounds
    Bounds,
    /// Production may change by at most a fraction of its current value per reference step
    RateOfChange {
        /// Maximum relative change (e.g. 0.1 for 10%)
        rate: f64,
    },
    /// Production may change by at most a fixed amount per reference step
    FixedChange {
        /// Maximum absolute change
        max_change: f64,
    },
    /// A plant must stay on or off for a minimum number of steps before switching
    StopTime {
        /// Minimum number of consecutive steps a plant must be off before turning on again
        min_off_time: u32,
        /// Minimum number of consecutive steps a plant must be on before turning off again
        min_on_time: u32,
    },
    /// A plant may only be switched off once it has been ramped down to its technical minimum
    GraduallyOff,
    /// The plant must always be on
    ForceOn,
    /// The plant starts at its technical minimum. Has no effect on bounds.
    StartWithMin,
}

impl ConstraintKind {
    /// The name of the constraint kind
    pub fn name(&self) -> &'static str {
        self.into()
    }
}

/// A constraint attached to a plant
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    /// What the constraint restricts
    pub kind: ConstraintKind,
    /// The plant the constraint belongs to
    pub plant_id: PlantID,
    /// Running identifier, unique per plant and constraint kind
    pub id: u32,
    /// Whether the constraint may be violated
    pub soft: bool,
    /// Importance of a soft constraint relative to others
    pub weight: u32,
    /// Length of a simulation step in minutes
    pub delta_time: f64,
}

impl Constraint {
    /// Create a new hard constraint
    pub fn new(kind: ConstraintKind, plant_id: PlantID, id: u32) -> Self {
        Self {
            kind,
            plant_id,
            id,
            soft: false,
            weight: 1,
            delta_time: DEFAULT_DELTA_TIME,
        }
    }

    /// A name identifying this constraint uniquely among all plants
    pub fn identity(&self) -> String {
        format!("{}{}Constraint_{}", self.plant_id, self.kind.name(), self.id)
    }

    /// Factor by which change limits are scaled for the current step length
    fn time_scale(&self) -> f64 {
        self.delta_time / REFERENCE_DELTA_TIME
    }

    /// Upper bound on production in the next step
    pub fn maximize(&self, plant: &dyn Plant) -> f64 {
        let power = plant.power();
        match self.kind {
            ConstraintKind::Bounds => plant.technical_bounds().max,
            ConstraintKind::RateOfChange { rate } => (1.0 + rate * self.time_scale()) * power.max,
            ConstraintKind::FixedChange { max_change } => {
                power.max + max_change * self.time_scale()
            }
            _ => f64::INFINITY,
        }
    }

    /// Lower bound on production in the next step
    pub fn minimize(&self, plant: &dyn Plant) -> f64 {
        let power = plant.power();
        match self.kind {
            ConstraintKind::Bounds => plant.technical_bounds().min,
            ConstraintKind::RateOfChange { rate } => {
                ((1.0 - rate * self.time_scale()) * power.min).max(0.0)
            }
            ConstraintKind::FixedChange { max_change } => {
                (power.min - max_change * self.time_scale()).max(0.0)
            }
            _ => f64::NEG_INFINITY,
        }
    }

    /// Upper bound on the on/off status in the next step (`false` means the plant must be off)
    pub fn maximize_bool(&self, plant: &dyn Plant) -> bool {
        match self.kind {
            ConstraintKind::StopTime { min_off_time, .. } => {
                plant.running().max || plant.cons_stopping().max >= min_off_time
            }
            _ => true,
        }
    }

    /// Lower bound on the on/off status in the next step (`true` means the plant must be on)
    pub fn minimize_bool(&self, plant: &dyn Plant) -> bool {
        match self.kind {
            ConstraintKind::StopTime { min_on_time, .. } => {
                plant.running().min && plant.cons_running().min < min_on_time
            }
            ConstraintKind::GraduallyOff => plant.power().min > plant.technical_bounds().min,
            ConstraintKind::ForceOn => true,
            _ => false,
        }
    }
}
