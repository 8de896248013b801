//! Integration tests for the `run` command.
use avpp::cli::{RunOpts, handle_run_command};
use avpp::settings::Settings;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

/// Get the path to the demo model.
fn get_model_dir() -> PathBuf {
    PathBuf::from("demos/simple")
}

/// An integration test for the `run` command.
#[test]
fn test_handle_run_command() {
    unsafe { std::env::set_var("AVPP_LOG_LEVEL", "off") };

    // Save results to non-existent directory to check that directory creation works
    let tempdir = tempdir().unwrap();
    let output_dir = tempdir.path().join("results");
    let opts = RunOpts {
        output_dir: Some(output_dir.clone()),
        overwrite: false,
    };
    handle_run_command(&get_model_dir(), &opts, Some(Settings::default())).unwrap();

    for file_name in [
        "feasible_regions.csv",
        "holes.csv",
        "avpps.csv",
        "avpp_info.log",
        "avpp_error.log",
    ] {
        assert!(output_dir.join(file_name).is_file(), "Missing {file_name}");
    }

    // One row per aggregate, plus the header
    let avpps = fs::read_to_string(output_dir.join("avpps.csv")).unwrap();
    let mut lines = avpps.lines();
    assert_eq!(
        lines.next(),
        Some("avpp,height,children,power_min,power_max")
    );
    assert!(lines.count() >= 2);

    // Running again into the same folder requires overwriting
    assert!(handle_run_command(&get_model_dir(), &opts, Some(Settings::default())).is_err());
}
