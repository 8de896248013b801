//! Common routines for handling input data.
use crate::avpp::{AvppCreator, AvppGraph};
use crate::id::collect_by_id;
use crate::model::Model;
use crate::model::parameters::ModelParameters;
use crate::plant::PowerPlantData;
use crate::plant::factory::PlantFactory;
use crate::plant::source::read_plant_sources;
use crate::random::RngContext;
use anyhow::{Context, Result, ensure};
use log::info;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

/// Parse a TOML file at the specified path.
///
/// # Arguments
///
/// * `file_path` - Path to the TOML file
///
/// # Returns
///
/// * The deserialised TOML data or an error if the file could not be read or parsed.
pub fn read_toml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let toml_str = fs::read_to_string(file_path).with_context(|| input_err_msg(file_path))?;
    let toml_data = toml::from_str(&toml_str).with_context(|| input_err_msg(file_path))?;
    Ok(toml_data)
}

/// Format an error message to include the file path. To be used with `anyhow::Context`.
pub fn input_err_msg<P: AsRef<Path>>(file_path: P) -> String {
    format!("Error reading {}", file_path.as_ref().display())
}

/// Read the plants of a model and arrange them into a tree.
///
/// Plants from source files are read first, followed by the synthetic plants in the order they
/// are listed. All randomness is drawn from a single generator seeded from the model file.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
pub fn load_model<P: AsRef<Path>>(model_dir: P) -> Result<Model> {
    let model_dir = model_dir.as_ref();
    let parameters = ModelParameters::from_path(model_dir)?;

    let mut rng = RngContext::new();
    rng.initialize(parameters.seed)?;
    let mut factory = PlantFactory::default();

    let mut plants = read_plant_sources(model_dir, &parameters.plant_sources, &factory, &mut rng)?;
    for synthetic in &parameters.synthetic_plants {
        for _ in 0..synthetic.count {
            plants.push(factory.create(synthetic.archetype, &mut rng)?);
        }
    }
    ensure!(!plants.is_empty(), "Model must contain at least one plant");
    let plants: Vec<_> = collect_by_id(plants)?.into_values().collect();
    info!("Read {} plants", plants.len());

    let tree = build_tree(&parameters, plants)?;

    Ok(Model {
        model_dir: model_dir.to_path_buf(),
        parameters,
        tree,
    })
}

/// Arrange plants into a tree according to the hierarchy in the model parameters
fn build_tree(parameters: &ModelParameters, plants: Vec<PowerPlantData>) -> Result<AvppGraph> {
    let mut creator = AvppCreator::new(
        parameters.hierarchy,
        parameters.plants_per_avpp,
        parameters.avpps_per_avpp,
    )?;
    let tree = creator.create_graph(plants)?;
    tree.log_summary();

    Ok(tree)
}
