//! Defines the `ModelParameters` struct, which represents the contents of `model.toml`.
use crate::avpp::HierarchyType;
use crate::input::{input_err_msg, read_toml};
use crate::plant::factory::PlantArchetype;
use crate::plant::source::PlantSource;
use anyhow::{Context, Result, ensure};
use log::warn;
use serde::Deserialize;
use std::path::Path;

const MODEL_PARAMETERS_FILE_NAME: &str = "model.toml";

macro_rules! define_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            $value
        }
    };
}

define_param_default!(default_plants_per_avpp, usize, 3);
define_param_default!(default_avpps_per_avpp, usize, 2);
define_param_default!(default_horizon, u32, 4);
define_param_default!(default_minutes_per_step, f64, 15.0);
define_param_default!(default_temporal_abstraction, bool, true);

/// Represents the contents of the entire model file.
#[derive(Debug, Deserialize, PartialEq)]
pub struct ModelParameters {
    /// Seed for the random generator used to draw plant parameters and shuffle plants
    pub seed: u64,
    /// The strategy used to group plants into aggregates
    #[serde(default)]
    pub hierarchy: HierarchyType,
    /// Maximum number of plants per aggregate
    #[serde(default = "default_plants_per_avpp")]
    pub plants_per_avpp: usize,
    /// Maximum number of aggregates per aggregate.
    ///
    /// Only used by the `plus` hierarchy.
    #[serde(default = "default_avpps_per_avpp")]
    pub avpps_per_avpp: usize,
    /// Number of steps in the planning horizon of the temporal abstraction
    #[serde(default = "default_horizon")]
    pub horizon: u32,
    /// The length of a step in minutes
    #[serde(default = "default_minutes_per_step")]
    pub minutes_per_step: f64,
    /// Whether to perform the temporal abstraction after the general abstraction
    #[serde(default = "default_temporal_abstraction")]
    pub temporal_abstraction: bool,
    /// Files of plants to read, relative to the model directory
    #[serde(default)]
    pub plant_sources: Vec<PlantSource>,
    /// Plants to create with randomly drawn bounds
    #[serde(default)]
    pub synthetic_plants: Vec<SyntheticPlants>,
}

/// A number of randomly drawn plants of one archetype
#[derive(Debug, Deserialize, PartialEq)]
pub struct SyntheticPlants {
    /// The kind of plant to create
    pub archetype: PlantArchetype,
    /// How many plants to create
    pub count: usize,
}

/// Check that the `plants_per_avpp` parameter is valid
fn check_plants_per_avpp(value: usize) -> Result<()> {
    ensure!(value >= 2, "plants_per_avpp must be at least 2");

    Ok(())
}

/// Check that the `avpps_per_avpp` parameter is valid for the chosen hierarchy
fn check_avpps_per_avpp(hierarchy: HierarchyType, value: usize) -> Result<()> {
    if hierarchy == HierarchyType::Plus {
        ensure!(
            value >= 2,
            "avpps_per_avpp must be at least 2 for plus hierarchies"
        );
    }

    Ok(())
}

/// Check that the `horizon` parameter is valid
fn check_horizon(value: u32) -> Result<()> {
    ensure!(value > 0, "horizon cannot be zero");

    Ok(())
}

/// Check that the `minutes_per_step` parameter is valid
fn check_minutes_per_step(value: f64) -> Result<()> {
    ensure!(
        value.is_finite() && value > 0.0,
        "minutes_per_step must be a finite number greater than zero"
    );

    Ok(())
}

/// Check that the model describes at least one plant
fn check_plants_present(sources: &[PlantSource], synthetic: &[SyntheticPlants]) -> Result<()> {
    ensure!(
        !sources.is_empty() || synthetic.iter().any(|plants| plants.count > 0),
        "Model must contain at least one plant"
    );

    Ok(())
}

impl ModelParameters {
    /// Read a model file from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `model_dir` - Folder containing model configuration files
    ///
    /// # Returns
    ///
    /// The model file contents as a [`ModelParameters`] struct or an error if the file is invalid
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<ModelParameters> {
        let file_path = model_dir.as_ref().join(MODEL_PARAMETERS_FILE_NAME);
        let model_params: ModelParameters = read_toml(&file_path)?;

        model_params
            .validate()
            .with_context(|| input_err_msg(file_path))?;

        Ok(model_params)
    }

    /// Validate parameters after reading in file
    fn validate(&self) -> Result<()> {
        check_plants_per_avpp(self.plants_per_avpp)?;
        check_avpps_per_avpp(self.hierarchy, self.avpps_per_avpp)?;
        check_horizon(self.horizon)?;
        check_minutes_per_step(self.minutes_per_step)?;
        check_plants_present(&self.plant_sources, &self.synthetic_plants)?;

        if !self.temporal_abstraction {
            warn!("Temporal abstraction is disabled; aggregates will have no delta functions");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fmt::Display;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    /// Helper function to assert validation result based on expected validity
    fn assert_validation_result<T, U: Display>(
        result: Result<T>,
        expected_valid: bool,
        value: U,
        expected_error_fragment: &str,
    ) {
        if expected_valid {
            assert!(
                result.is_ok(),
                "Expected value {} to be valid, but got error: {:?}",
                value,
                result.err()
            );
        } else {
            assert!(
                result.is_err(),
                "Expected value {value} to be invalid, but it was accepted",
            );
            let error_message = result.err().unwrap().to_string();
            assert!(
                error_message.contains(expected_error_fragment),
                "Error message should mention the validation constraint, got: {error_message}",
            );
        }
    }

    fn write_model_file(dir_path: &Path, contents: &str) {
        let mut file = File::create(dir_path.join(MODEL_PARAMETERS_FILE_NAME)).unwrap();
        write!(file, "{contents}").unwrap();
    }

    #[test]
    fn test_model_params_from_path() {
        let dir = tempdir().unwrap();
        write_model_file(
            dir.path(),
            "seed = 42\n[[synthetic_plants]]\narchetype = \"canonical\"\ncount = 4\n",
        );

        let model_params = ModelParameters::from_path(dir.path()).unwrap();
        assert_eq!(
            model_params,
            ModelParameters {
                seed: 42,
                hierarchy: HierarchyType::IsoSplit,
                plants_per_avpp: 3,
                avpps_per_avpp: 2,
                horizon: 4,
                minutes_per_step: 15.0,
                temporal_abstraction: true,
                plant_sources: Vec::new(),
                synthetic_plants: vec![SyntheticPlants {
                    archetype: PlantArchetype::Canonical,
                    count: 4
                }],
            }
        );
    }

    #[test]
    fn test_model_params_from_path_invalid() {
        let dir = tempdir().unwrap();

        // No plants
        write_model_file(dir.path(), "seed = 42\n");
        assert!(ModelParameters::from_path(dir.path()).is_err());

        // Unknown hierarchy
        write_model_file(
            dir.path(),
            "seed = 42\nhierarchy = \"star\"\n[[synthetic_plants]]\narchetype = \"gas\"\ncount = 1\n",
        );
        assert!(ModelParameters::from_path(dir.path()).is_err());

        // Missing seed
        write_model_file(
            dir.path(),
            "[[synthetic_plants]]\narchetype = \"gas\"\ncount = 1\n",
        );
        assert!(ModelParameters::from_path(dir.path()).is_err());
    }

    #[rstest]
    #[case(2, true)] // Valid minimum value
    #[case(3, true)] // Valid default value
    #[case(100, true)] // Valid large value
    #[case(1, false)] // Invalid: a single plant per aggregate
    #[case(0, false)] // Invalid: zero
    fn test_check_plants_per_avpp(#[case] value: usize, #[case] expected_valid: bool) {
        assert_validation_result(
            check_plants_per_avpp(value),
            expected_valid,
            value,
            "plants_per_avpp must be at least 2",
        );
    }

    #[rstest]
    #[case(HierarchyType::Plus, 2, true)]
    #[case(HierarchyType::Plus, 1, false)]
    #[case(HierarchyType::Plus, 0, false)]
    #[case(HierarchyType::IsoSplit, 0, true)] // Ignored for other hierarchies
    #[case(HierarchyType::Flat, 1, true)]
    fn test_check_avpps_per_avpp(
        #[case] hierarchy: HierarchyType,
        #[case] value: usize,
        #[case] expected_valid: bool,
    ) {
        assert_validation_result(
            check_avpps_per_avpp(hierarchy, value),
            expected_valid,
            value,
            "avpps_per_avpp must be at least 2",
        );
    }

    #[rstest]
    #[case(1, true)]
    #[case(96, true)]
    #[case(0, false)]
    fn test_check_horizon(#[case] value: u32, #[case] expected_valid: bool) {
        assert_validation_result(
            check_horizon(value),
            expected_valid,
            value,
            "horizon cannot be zero",
        );
    }

    #[rstest]
    #[case(15.0, true)] // Valid default value
    #[case(1e-3, true)] // Valid small value
    #[case(60.0, true)] // Valid hourly steps
    #[case(0.0, false)] // Invalid: exactly zero
    #[case(-15.0, false)] // Invalid: negative value
    #[case(f64::INFINITY, false)] // Invalid: infinite value
    #[case(f64::NAN, false)] // Invalid: NaN value
    fn test_check_minutes_per_step(#[case] value: f64, #[case] expected_valid: bool) {
        assert_validation_result(
            check_minutes_per_step(value),
            expected_valid,
            value,
            "minutes_per_step must be a finite number greater than zero",
        );
    }

    #[test]
    fn test_check_plants_present() {
        let synthetic = |count| {
            vec![SyntheticPlants {
                archetype: PlantArchetype::Gas,
                count,
            }]
        };
        let sources = [PlantSource {
            file: "plants.txt".into(),
            archetype: PlantArchetype::Bio,
        }];

        assert!(check_plants_present(&sources, &[]).is_ok());
        assert!(check_plants_present(&[], &synthetic(1)).is_ok());
        assert!(check_plants_present(&[], &synthetic(0)).is_err());
        assert!(check_plants_present(&[], &[]).is_err());
    }
}
