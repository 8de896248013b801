//! Code for reading plants from plant source files.
//!
//! A plant source file is a plain text file with one line per plant containing its maximum power.
use super::PowerPlantData;
use super::factory::{PlantArchetype, PlantFactory};
use crate::input::input_err_msg;
use crate::interval::Interval;
use crate::random::RngContext;
use anyhow::{Context, Result, ensure};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Minimum power of a plant as a fraction of its maximum
const MIN_POWER_FRACTION: f64 = 0.2;

/// A file of plants of one archetype
#[derive(Debug, Deserialize, PartialEq)]
pub struct PlantSource {
    /// Path to the file, relative to the model directory
    pub file: PathBuf,
    /// The archetype of the plants in the file
    pub archetype: PlantArchetype,
}

/// Read the maximum powers listed in a plant source file
fn read_max_powers(file_path: &Path) -> Result<Vec<f64>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_path(file_path)?;

    let mut max_powers = Vec::new();
    for record in reader.deserialize() {
        let (max_power,): (f64,) = record?;
        ensure!(
            max_power.is_finite() && max_power > 0.0,
            "Maximum power must be a positive number, got {max_power}"
        );
        max_powers.push(max_power);
    }
    ensure!(!max_powers.is_empty(), "Plant file cannot be empty");

    Ok(max_powers)
}

/// Read the plants in a plant source file.
///
/// Plants are named after the file stem and their line number, starting from zero.
pub fn read_plants(
    file_path: &Path,
    archetype: PlantArchetype,
    factory: &PlantFactory,
    rng: &mut RngContext,
) -> Result<Vec<PowerPlantData>> {
    let max_powers = read_max_powers(file_path).with_context(|| input_err_msg(file_path))?;
    let stem = file_path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .context("Invalid plant file name")?;

    max_powers
        .into_iter()
        .enumerate()
        .map(|(i, max_power)| {
            let bounds = Interval::new(MIN_POWER_FRACTION * max_power, max_power);
            factory.build(&format!("{stem}_{i}"), bounds, archetype, rng)
        })
        .collect()
}

/// Read the plants from all sources in a model directory and shuffle them together
pub fn read_plant_sources(
    model_dir: &Path,
    sources: &[PlantSource],
    factory: &PlantFactory,
    rng: &mut RngContext,
) -> Result<Vec<PowerPlantData>> {
    let mut plants = Vec::new();
    for source in sources {
        let file_path = model_dir.join(&source.file);
        plants.extend(read_plants(&file_path, source.archetype, factory, rng)?);
    }
    rng.shuffle(&mut plants)?;

    Ok(plants)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    /// Create a plant file with the given contents in `dir_path`
    fn create_plant_file(dir_path: &Path, file_name: &str, contents: &str) -> PathBuf {
        let file_path = dir_path.join(file_name);
        let mut file = File::create(&file_path).unwrap();
        write!(file, "{contents}").unwrap();
        file_path
    }

    #[test]
    fn test_read_plants() {
        let dir = tempdir().unwrap();
        let file_path = create_plant_file(dir.path(), "bio.txt", "100\n250\n");
        let mut rng = RngContext::seeded(1);

        let plants = read_plants(
            &file_path,
            PlantArchetype::Canonical,
            &PlantFactory::default(),
            &mut rng,
        )
        .unwrap();
        assert_eq!(plants.len(), 2);
        assert_eq!(plants[0].id.to_string(), "bio_0");
        assert_eq!(plants[0].power_bounds, Interval::new(20.0, 100.0));
        assert_eq!(plants[1].id.to_string(), "bio_1");
        assert_eq!(plants[1].power_bounds, Interval::new(50.0, 250.0));
    }

    #[test]
    fn test_read_plants_invalid() {
        let dir = tempdir().unwrap();
        let factory = PlantFactory::default();
        let mut rng = RngContext::seeded(1);

        for (name, contents) in [("empty.txt", ""), ("neg.txt", "-5\n"), ("text.txt", "abc\n")] {
            let file_path = create_plant_file(dir.path(), name, contents);
            assert!(
                read_plants(&file_path, PlantArchetype::Canonical, &factory, &mut rng).is_err()
            );
        }
    }

    #[test]
    fn test_read_plant_sources() {
        let dir = tempdir().unwrap();
        create_plant_file(dir.path(), "bio.txt", "100\n200\n300\n");
        create_plant_file(dir.path(), "gas.txt", "400\n500\n");
        let sources = [
            PlantSource {
                file: "bio.txt".into(),
                archetype: PlantArchetype::Bio,
            },
            PlantSource {
                file: "gas.txt".into(),
                archetype: PlantArchetype::Gas,
            },
        ];
        let mut rng = RngContext::seeded(1337);

        let plants =
            read_plant_sources(dir.path(), &sources, &PlantFactory::default(), &mut rng).unwrap();
        assert_eq!(plants.len(), 5);

        let mut names: Vec<_> = plants.iter().map(|p| p.id.to_string()).collect();
        names.sort();
        assert_eq!(names, ["bio_0", "bio_1", "bio_2", "gas_0", "gas_1"]);

        for plant in &plants {
            let has_stop_time = plant.constraints.iter().any(|c| c.kind.name() == "StopTime");
            assert_eq!(has_stop_time, plant.id.0.starts_with("bio"));
        }
    }
}
