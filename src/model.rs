//! The model represents the plants of an experiment arranged into a tree of aggregates.
use crate::avpp::AvppGraph;
use std::path::PathBuf;

pub mod parameters;
pub use parameters::ModelParameters;

/// Model definition
#[derive(Debug)]
pub struct Model {
    /// Path to model folder
    pub model_dir: PathBuf,
    /// Parameters from the model TOML file
    pub parameters: ModelParameters,
    /// The plants of the model, arranged into a tree of aggregates
    pub tree: AvppGraph,
}
