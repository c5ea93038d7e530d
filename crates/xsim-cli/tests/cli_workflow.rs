use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;
use xsim_core::modules::profile::GridSpec;
use xsim_core::modules::serialization::render_xy_table;
use xsim_core::modules::simulation::{
    SimulationConfig, SimulationContext, load_simulation_config, load_simulation_inputs,
};

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .to_path_buf()
}

fn fixture_path(fixture: &str, file: &str) -> PathBuf {
    workspace_root().join("tasks/fixtures").join(fixture).join(file)
}

fn run_xsim(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_xsim"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("xsim should be executable")
}

fn path_arg(path: &Path) -> &str {
    path.to_str().expect("utf-8 path")
}

fn data_rows(content: &str) -> Vec<Vec<f64>> {
    content
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .map(|line| {
            line.split_whitespace()
                .map(|token| token.parse::<f64>().expect("numeric column"))
                .collect()
        })
        .collect()
}

#[test]
fn simulate_writes_a_spectrum_table() {
    let temp = TempDir::new().expect("tempdir should be created");
    let output_path = temp.path().join("out/spectrum.dat");
    let config = fixture_path("cu-kalpha1", "config.json");
    let inputs = fixture_path("cu-kalpha1", "inputs.json");

    let output = run_xsim(&[
        "simulate",
        "--config",
        path_arg(&config),
        "--inputs",
        path_arg(&inputs),
        "--output",
        path_arg(&output_path),
    ]);

    assert!(
        output.status.success(),
        "command should succeed, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Assembled 1 groups on 201 grid points"), "{}", stdout);
    assert!(stdout.contains("Peak energy: 8047.8000"), "{}", stdout);

    let content = fs::read_to_string(&output_path).expect("spectrum should be written");
    assert!(content.starts_with('#'));
    let rows = data_rows(&content);
    assert_eq!(rows.len(), 201);
    assert!(rows.iter().all(|row| row.len() == 6));
    assert_eq!(rows[0][0], 8040.0);
    assert_eq!(rows[200][0], 8060.0);
    for row in &rows {
        assert!((row[1] - row[2]).abs() <= 1.0e-12 * row[1].abs().max(1.0));
        assert_eq!(row[3], 0.0);
    }
}

#[test]
fn simulate_json_output_carries_group_curves() {
    let temp = TempDir::new().expect("tempdir should be created");
    let output_path = temp.path().join("spectrum.json");
    let config = fixture_path("cu-kalpha1", "config.json");
    let inputs = fixture_path("cu-kalpha1", "inputs.json");

    let output = run_xsim(&[
        "simulate",
        "--config",
        path_arg(&config),
        "--inputs",
        path_arg(&inputs),
        "--output",
        path_arg(&output_path),
        "--json",
    ]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let parsed: Value =
        serde_json::from_str(&fs::read_to_string(&output_path).expect("json output"))
            .expect("valid json");
    let groups = parsed["groups"].as_array().expect("groups array");
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["entryId"], "KL3");
    assert_eq!(groups[0]["category"], "diagram");
    assert_eq!(groups[0]["curve"].as_array().map(Vec::len), Some(201));
    assert_eq!(parsed["totals"]["total"], groups[0]["curve"]);
    assert_eq!(parsed["badSelections"].as_array().map(Vec::len), Some(0));
}

#[test]
fn fit_recovers_energy_offset_of_a_shifted_measurement() {
    let temp = TempDir::new().expect("tempdir should be created");
    let config_path = fixture_path("cu-kalpha1", "config.json");
    let inputs_path = fixture_path("cu-kalpha1", "inputs.json");

    let base = load_simulation_config(&config_path).expect("config");
    let shifted = SimulationConfig {
        energy_offset: 0.5,
        grid: GridSpec {
            start: 8035.0,
            end: 8060.0,
            points: 101,
        },
        ..base
    };
    let mut context =
        SimulationContext::new(load_simulation_inputs(&inputs_path).expect("inputs"))
            .expect("context");
    let snapshots = shifted.selections().expect("selections");
    let measured = context.assemble(&shifted, &snapshots).expect("spectrum");
    let experiment_path = temp.path().join("measured.dat");
    let mut content = String::from("# energy intensity sigma\n");
    for line in render_xy_table(&measured.grid, &measured.totals.total).lines() {
        content.push_str(line);
        content.push_str("  1.0E-2\n");
    }
    fs::write(&experiment_path, content).expect("experiment should be written");

    let report_path = temp.path().join("fit.json");
    let model_path = temp.path().join("model.dat");
    let output = run_xsim(&[
        "fit",
        "--config",
        path_arg(&config_path),
        "--inputs",
        path_arg(&inputs_path),
        "--experiment",
        path_arg(&experiment_path),
        "--output",
        path_arg(&report_path),
        "--model",
        path_arg(&model_path),
    ]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report: Value =
        serde_json::from_str(&fs::read_to_string(&report_path).expect("fit report"))
            .expect("valid json");
    assert_eq!(report["points"], 101);
    assert_eq!(report["freeParameters"], 4);
    assert_eq!(report["converged"], true);
    let offset = report["parameters"]["energyOffset"]["value"]
        .as_f64()
        .expect("offset value");
    assert!((offset - 0.5).abs() <= 1.0e-3, "fitted offset {}", offset);
    let height = report["parameters"]["heightAnchor"]["value"]
        .as_f64()
        .expect("height value");
    assert!((height - 1.0).abs() <= 1.0e-3, "fitted height {}", height);

    let model = data_rows(&fs::read_to_string(&model_path).expect("model output"));
    assert_eq!(model.len(), 101);
}

#[test]
fn batch_writes_one_spectrum_per_offset() {
    let temp = TempDir::new().expect("tempdir should be created");
    let output_dir = temp.path().join("batch");
    let config = fixture_path("cu-kalpha1", "config.json");
    let inputs = fixture_path("cu-kalpha1", "inputs.json");

    let output = run_xsim(&[
        "batch",
        "--config",
        path_arg(&config),
        "--inputs",
        path_arg(&inputs),
        "--offsets=-1.0,0,1.5",
        "--output-dir",
        path_arg(&output_dir),
        "--jobs",
        "2",
    ]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let summary: Value =
        serde_json::from_str(&fs::read_to_string(output_dir.join("batch.json")).expect("summary"))
            .expect("valid json");
    let entries = summary.as_array().expect("entries");
    assert_eq!(entries.len(), 3);
    let expected_peaks = [8046.8, 8047.8, 8049.3];
    for (index, entry) in entries.iter().enumerate() {
        assert_eq!(entry["index"], index);
        let file = entry["output"].as_str().expect("file name");
        assert_eq!(file, format!("spectrum_{:03}.dat", index));
        assert!(output_dir.join(file).is_file());
        let peak = entry["peakEnergy"].as_f64().expect("peak");
        assert!((peak - expected_peaks[index]).abs() <= 1.0e-6, "{}", peak);
    }

    let unshifted = fs::read_to_string(output_dir.join("spectrum_001.dat")).expect("spectrum");
    let single_path = temp.path().join("single.dat");
    let output = run_xsim(&[
        "simulate",
        "--config",
        path_arg(&config),
        "--inputs",
        path_arg(&inputs),
        "--output",
        path_arg(&single_path),
    ]);
    assert!(output.status.success());
    assert_eq!(
        fs::read_to_string(&single_path).expect("single spectrum"),
        unshifted
    );
}

#[test]
fn catalog_lists_radiative_and_auger_entries() {
    let output = run_xsim(&["catalog"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 28);
    assert!(
        stdout
            .lines()
            .any(|line| line.starts_with("KL3") && line.ends_with("Kα1"))
    );

    let output = run_xsim(&["catalog", "--auger", "--json"]);
    assert!(output.status.success());
    let parsed: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    let entries = parsed.as_array().expect("entries");
    assert_eq!(entries.len(), 9);
    assert_eq!(entries[0]["id"], "KLL");
    assert_eq!(entries[0]["augerLevel"], "L");
}

#[test]
fn missing_config_is_an_io_failure() {
    let temp = TempDir::new().expect("tempdir should be created");
    let missing = temp.path().join("absent.json");
    let inputs = fixture_path("cu-kalpha1", "inputs.json");

    let output = run_xsim(&[
        "simulate",
        "--config",
        path_arg(&missing),
        "--inputs",
        path_arg(&inputs),
    ]);
    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: [IO.CONFIG_READ]"), "{}", stderr);
    assert!(stderr.contains("FATAL EXIT CODE: 3"), "{}", stderr);
}

#[test]
fn invalid_grid_and_unknown_commands_are_input_errors() {
    let temp = TempDir::new().expect("tempdir should be created");
    let config = temp.path().join("config.json");
    fs::write(
        &config,
        r#"{ "grid": { "start": 8060.0, "end": 8040.0, "points": 201 }, "selection": ["KL3"] }"#,
    )
    .expect("config should be written");
    let inputs = fixture_path("cu-kalpha1", "inputs.json");

    let output = run_xsim(&[
        "simulate",
        "--config",
        path_arg(&config),
        "--inputs",
        path_arg(&inputs),
        "--output",
        path_arg(&temp.path().join("never.dat")),
    ]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("[CONFIG.GRID]"));
    assert!(!temp.path().join("never.dat").exists());

    let output = run_xsim(&["transmogrify"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("[INPUT.CLI_USAGE]"));
}
