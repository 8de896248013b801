//! Multi-level abstraction of aggregated virtual power plants (AVPPs).
//!
//! Physical plants are grouped into a tree of aggregates. Each aggregate is abstracted so that it
//! can stand in for its children with the interface of a single plant: its feasible regions, how
//! those regions evolve over a planning horizon and piecewise linear bounds on how fast its
//! production can change.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod abstraction;
pub mod avpp;
pub mod cli;
pub mod constraint;
pub mod id;
pub mod input;
pub mod interval;
pub mod log;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod plant;
pub mod pwl;
pub mod random;
pub mod sampling;
pub mod settings;

#[cfg(test)]
mod fixture;

/// Get config dir for program.
///
/// Falls back to the current directory if the user config dir can't be determined.
pub fn get_avpp_config_dir() -> PathBuf {
    let Some(mut config_dir) = dirs::config_dir() else {
        return PathBuf::from(".");
    };
    config_dir.push("avpp");

    config_dir
}
