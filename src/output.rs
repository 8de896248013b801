//! The module responsible for writing output data to disk.
use crate::avpp::AvppGraph;
use crate::interval::{Interval, SupplyRegions};
use crate::plant::{PlantID, PowerPlantData};
use crate::pwl::PiecewiseLinearFunction;
use anyhow::{Context, Result, ensure};
use log::debug;
use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};

/// The root folder in which model-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "avpp_results";

/// The output file name for feasible regions
const FEASIBLE_REGIONS_FILE_NAME: &str = "feasible_regions.csv";

/// The output file name for holes
const HOLES_FILE_NAME: &str = "holes.csv";

/// The output file name for the aggregates in the tree
const AVPPS_FILE_NAME: &str = "avpps.csv";

/// Suffix of the file containing an aggregate's positive delta function
const POSITIVE_DELTA_SUFFIX: &str = "_positive_delta.dat";

/// Suffix of the file containing an aggregate's negative delta function
const NEGATIVE_DELTA_SUFFIX: &str = "_negative_delta.dat";

/// Get the default output directory for the model specified at `model_dir`
pub fn get_output_dir(model_dir: &Path) -> Result<PathBuf> {
    // Get the model name from the dir path. This ends up being convoluted because we need to check
    // for all possible errors. Ugh.
    let model_dir = model_dir
        .canonicalize() // canonicalise in case the user has specified "."
        .context("Could not resolve path to model")?;

    let model_name = model_dir
        .file_name()
        .context("Model cannot be in root folder")?
        .to_str()
        .context("Invalid chars in model dir name")?;

    // Construct path
    Ok([OUTPUT_DIRECTORY_ROOT, model_name].iter().collect())
}

/// Create a new output directory, replacing an existing non-empty one if `allow_overwrite` is set.
///
/// Returns `true` if an existing non-empty folder was replaced.
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    let mut overwrite = false;
    if output_dir.is_dir() {
        let is_empty = output_dir
            .read_dir()
            .context("Could not read output directory")?
            .next()
            .is_none();
        if is_empty {
            return Ok(false);
        }

        ensure!(
            allow_overwrite,
            "Output folder already exists and is not empty. Use the --overwrite option or set \
            `overwrite = true` in the settings file to replace it."
        );
        fs::remove_dir_all(output_dir)?;
        overwrite = true;
    }

    // Try to create the directory, with parents
    fs::create_dir_all(output_dir)?;

    Ok(overwrite)
}

/// Represents a row in the feasible regions or holes CSV files
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct RegionRow {
    avpp: PlantID,
    step: usize,
    min: f64,
    max: f64,
}

impl RegionRow {
    fn new(avpp: &PlantID, step: usize, interval: &Interval<f64>) -> Self {
        Self {
            avpp: avpp.clone(),
            step,
            min: interval.min,
            max: interval.max,
        }
    }
}

/// Represents a row in the aggregates CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct AvppRow {
    avpp: PlantID,
    height: u32,
    children: usize,
    power_min: f64,
    power_max: f64,
}

/// An object for writing the results of abstraction to file
pub struct DataWriter {
    output_path: PathBuf,
    regions_writer: csv::Writer<File>,
    holes_writer: csv::Writer<File>,
    avpps_writer: csv::Writer<File>,
}

impl DataWriter {
    /// Open CSV files to write output data to
    ///
    /// # Arguments
    ///
    /// * `output_path` - Folder where files will be saved
    pub fn create(output_path: &Path) -> Result<Self> {
        let new_writer = |file_name| {
            let file_path = output_path.join(file_name);
            csv::Writer::from_path(file_path)
        };

        Ok(Self {
            output_path: output_path.to_path_buf(),
            regions_writer: new_writer(FEASIBLE_REGIONS_FILE_NAME)?,
            holes_writer: new_writer(HOLES_FILE_NAME)?,
            avpps_writer: new_writer(AVPPS_FILE_NAME)?,
        })
    }

    /// Write the abstraction results of every aggregate in the tree, children first
    pub fn write_tree(&mut self, tree: &AvppGraph) -> Result<()> {
        for node in tree.post_order() {
            if tree.plant(node).is_aggregate {
                self.write_avpp(tree, node)?;
            }
        }

        Ok(())
    }

    /// Write the results for a single aggregate
    fn write_avpp(&mut self, tree: &AvppGraph, node: NodeIndex) -> Result<()> {
        let plant = tree.plant(node);
        debug!("Writing abstraction results for {}", plant.id);

        self.avpps_writer.serialize(AvppRow {
            avpp: plant.id.clone(),
            height: tree.height(node),
            children: tree.children(node).len(),
            power_min: plant.power_bounds.min,
            power_max: plant.power_bounds.max,
        })?;

        // Step 0 is the general abstraction, followed by the steps of the planning horizon
        let steps = plant.supply.iter().chain(plant.horizon.iter());
        for (step, supply) in steps.enumerate() {
            self.write_supply(&plant.id, step, supply)?;
        }

        self.write_delta_functions(plant)
    }

    /// Write the feasible regions and holes for one step
    fn write_supply(&mut self, avpp: &PlantID, step: usize, supply: &SupplyRegions) -> Result<()> {
        for region in &supply.feasible_regions {
            self.regions_writer.serialize(RegionRow::new(avpp, step, region))?;
        }
        for hole in &supply.holes {
            self.holes_writer.serialize(RegionRow::new(avpp, step, hole))?;
        }

        Ok(())
    }

    /// Write the delta functions of an aggregate, if it has them
    fn write_delta_functions(&self, plant: &PowerPlantData) -> Result<()> {
        let functions = [
            (POSITIVE_DELTA_SUFFIX, plant.positive_delta.as_ref()),
            (NEGATIVE_DELTA_SUFFIX, plant.negative_delta.as_ref()),
        ];
        for (suffix, function) in functions {
            let Some(function) = function else {
                continue;
            };
            let file_path = self.output_path.join(format!("{}{suffix}", plant.id));
            write_pwl(&file_path, function)?;
        }

        Ok(())
    }

    /// Flush output files
    pub fn flush(&mut self) -> Result<()> {
        self.regions_writer.flush()?;
        self.holes_writer.flush()?;
        self.avpps_writer.flush()?;

        Ok(())
    }
}

/// Write a piecewise linear function in its export format
fn write_pwl(file_path: &Path, function: &PiecewiseLinearFunction) -> Result<()> {
    fs::write(file_path, function.to_export_string())
        .with_context(|| format!("Failed to write {}", file_path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::{FeasibleRegions, IntervalSet};
    use itertools::{Itertools, assert_equal};
    use tempfile::tempdir;

    /// A tree with one aggregate of two leaves, abstracted by hand
    fn abstracted_tree() -> AvppGraph {
        let mut tree = AvppGraph::new();
        let leaves = [
            tree.add_leaf(PowerPlantData::new("P1".into(), Interval::new(50.0, 100.0))),
            tree.add_leaf(PowerPlantData::new("P2".into(), Interval::new(200.0, 400.0))),
        ];

        let mut avpp = PowerPlantData::new_aggregate("AVPP_0".into());
        let regions = FeasibleRegions::from_intervals([
            Interval::new(0.0, 100.0),
            Interval::new(200.0, 500.0),
        ])
        .unwrap();
        avpp.power_bounds = Interval::new(0.0, 500.0);
        avpp.supply = Some(SupplyRegions::from_regions(regions));
        let mut horizon = IntervalSet::new();
        horizon.push(SupplyRegions::from_regions(
            FeasibleRegions::from_intervals([Interval::new(0.0, 150.0)]).unwrap(),
        ));
        avpp.horizon = horizon;
        avpp.positive_delta =
            Some(PiecewiseLinearFunction::from_linear_function(0.0, 500.0, 1.0).unwrap());

        let root = tree.add_aggregate(avpp, &leaves);
        tree.set_root(root, 1);
        tree
    }

    #[test]
    fn test_write_tree() {
        let tree = abstracted_tree();
        let dir = tempdir().unwrap();

        // Write results
        {
            let mut writer = DataWriter::create(dir.path()).unwrap();
            writer.write_tree(&tree).unwrap();
            writer.flush().unwrap();
        }

        // Read back and compare
        let avpp: PlantID = "AVPP_0".into();
        let expected = [
            RegionRow::new(&avpp, 0, &Interval::new(0.0, 100.0)),
            RegionRow::new(&avpp, 0, &Interval::new(200.0, 500.0)),
            RegionRow::new(&avpp, 1, &Interval::new(0.0, 150.0)),
        ];
        let records: Vec<RegionRow> =
            csv::Reader::from_path(dir.path().join(FEASIBLE_REGIONS_FILE_NAME))
                .unwrap()
                .into_deserialize()
                .try_collect()
                .unwrap();
        assert_equal(records, expected);

        let records: Vec<RegionRow> = csv::Reader::from_path(dir.path().join(HOLES_FILE_NAME))
            .unwrap()
            .into_deserialize()
            .try_collect()
            .unwrap();
        assert_equal(
            records,
            [RegionRow::new(&avpp, 0, &Interval::new(100.0, 200.0))],
        );

        let records: Vec<AvppRow> = csv::Reader::from_path(dir.path().join(AVPPS_FILE_NAME))
            .unwrap()
            .into_deserialize()
            .try_collect()
            .unwrap();
        assert_equal(
            records,
            [AvppRow {
                avpp: avpp.clone(),
                height: 1,
                children: 2,
                power_min: 0.0,
                power_max: 500.0,
            }],
        );

        // Only the positive delta function was set
        let contents = fs::read_to_string(dir.path().join("AVPP_0_positive_delta.dat")).unwrap();
        assert!(contents.starts_with("n=2;\n"));
        assert!(!dir.path().join("AVPP_0_negative_delta.dat").exists());
    }

    #[test]
    fn test_create_output_directory() {
        let dir = tempdir().unwrap();
        let output_dir = dir.path().join("results");

        // New directory
        assert!(!create_output_directory(&output_dir, false).unwrap());
        assert!(output_dir.is_dir());

        // Existing empty directory
        assert!(!create_output_directory(&output_dir, false).unwrap());

        // Existing non-empty directory
        fs::write(output_dir.join("file.txt"), "contents").unwrap();
        assert!(create_output_directory(&output_dir, false).is_err());
        assert!(create_output_directory(&output_dir, true).unwrap());
        assert!(!output_dir.join("file.txt").exists());
    }
}
