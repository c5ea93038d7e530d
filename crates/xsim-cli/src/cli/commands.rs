use super::CliError;
use super::helpers::*;
use anyhow::Context;
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};
use xsim_core::domain::{SimError, SimResult};
use xsim_core::modules::fit::{FitHarness, FitOutcome, fit_spectrum};
use xsim_core::modules::serialization::{render_spectrum_table, render_xy_table};
use xsim_core::modules::simulation::SimulationConfig;
use xsim_core::transitions::{CatalogEntry, CatalogKind};

#[derive(clap::Args)]
pub(super) struct SimulateArgs {
    /// Simulation settings (JSON)
    #[arg(long)]
    config: PathBuf,

    /// Element tables, shake rows and formation levels (JSON)
    #[arg(long)]
    inputs: PathBuf,

    /// Output path for the spectrum
    #[arg(long, default_value = "spectrum.dat")]
    output: PathBuf,

    /// Write the full spectrum, every group curve included, as JSON
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args)]
pub(super) struct FitArgs {
    /// Simulation settings (JSON); `fit` and `fitOptions` seed the fit
    #[arg(long)]
    config: PathBuf,

    /// Element tables, shake rows and formation levels (JSON)
    #[arg(long)]
    inputs: PathBuf,

    /// Measured spectrum: whitespace columns `x y [sigma]`
    #[arg(long)]
    experiment: PathBuf,

    /// JSON report output path
    #[arg(long, default_value = "fit.json")]
    output: PathBuf,

    /// Also write the best-fit model on the experimental axis
    #[arg(long)]
    model: Option<PathBuf>,
}

#[derive(clap::Args)]
pub(super) struct BatchArgs {
    /// Simulation settings (JSON)
    #[arg(long)]
    config: PathBuf,

    /// Element tables, shake rows and formation levels (JSON)
    #[arg(long)]
    inputs: PathBuf,

    /// Comma-separated energy offsets, one spectrum each
    #[arg(long, value_delimiter = ',', required = true, allow_hyphen_values = true)]
    offsets: Vec<f64>,

    /// Directory receiving `spectrum_NNN.dat` and `batch.json`
    #[arg(long)]
    output_dir: PathBuf,

    /// Worker threads (defaults to the number of CPUs)
    #[arg(long)]
    jobs: Option<usize>,
}

#[derive(clap::Args)]
pub(super) struct CatalogArgs {
    /// List the Auger catalog instead of the radiative one
    #[arg(long)]
    auger: bool,

    /// Print entries as JSON
    #[arg(long)]
    json: bool,
}

pub(super) fn run_simulate_command(args: SimulateArgs) -> Result<i32, CliError> {
    let Session {
        config,
        mut context,
    } = load_session(&args.config, &args.inputs)?;
    let snapshots = config.selections()?;
    let spectrum = context.assemble(&config, &snapshots)?;

    if args.json {
        write_json_output(&args.output, &spectrum)?;
    } else {
        write_text_output(&args.output, &render_spectrum_table(&spectrum))?;
    }

    println!(
        "Assembled {} groups on {} grid points",
        spectrum.groups.len(),
        spectrum.grid.len()
    );
    match spectrum.peak_energy() {
        Some(peak) => println!("Peak energy: {:.4}", peak),
        None => println!("Peak energy: none (empty spectrum)"),
    }
    if !spectrum.bad_selections.is_empty() {
        let keys: Vec<String> = spectrum
            .bad_selections
            .iter()
            .map(|bad| match &bad.channel {
                Some(channel) => format!("{}@{}", bad.key, channel),
                None => bad.key.clone(),
            })
            .collect();
        println!("Bad selections: {}", keys.join(", "));
    }
    println!("Spectrum: {}", args.output.display());
    Ok(0)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FitReport<'a> {
    #[serde(flatten)]
    outcome: &'a FitOutcome,
    points: usize,
    free_parameters: usize,
}

pub(super) fn run_fit_command(args: FitArgs) -> Result<i32, CliError> {
    let Session {
        config,
        mut context,
    } = load_session(&args.config, &args.inputs)?;
    let experiment = load_experiment(&args.experiment)?;
    let snapshots = config.selections()?;

    let lines = context.collect_lines(&config, &snapshots)?;
    let harness = FitHarness::new(&lines, &experiment, config.line_shape, config.normalization);
    let outcome = fit_spectrum(&harness, &config.fit, &config.fit_options).map_err(SimError::from)?;

    let report = FitReport {
        outcome: &outcome,
        points: experiment.len(),
        free_parameters: config.fit.free_count(),
    };
    write_json_output(&args.output, &report)?;
    if let Some(model_path) = &args.model {
        let model = harness.model(&outcome.parameters);
        write_text_output(model_path, &render_xy_table(&experiment.x, &model))?;
    }

    let fitted = &outcome.parameters;
    println!(
        "Fit {} after {} iterations: chi2 = {:.6E}",
        if outcome.converged {
            "converged"
        } else {
            "stopped"
        },
        outcome.iterations,
        outcome.chi_square
    );
    println!(
        "energyOffset = {:.6}, verticalOffset = {:.6E}, resolution = {:.6}, heightAnchor = {:.6E}",
        fitted.energy_offset.value,
        fitted.vertical_offset.value,
        fitted.resolution.value,
        fitted.height_anchor.value
    );
    println!("Fit report: {}", args.output.display());
    Ok(0)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchEntry {
    index: usize,
    energy_offset: f64,
    output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    peak_energy: Option<f64>,
    bad_selections: usize,
}

pub(super) fn run_batch_command(args: BatchArgs) -> Result<i32, CliError> {
    let session = load_session(&args.config, &args.inputs)?;
    let snapshots = session.config.selections()?;
    fs::create_dir_all(&args.output_dir).with_context(|| {
        format!(
            "failed to create output directory '{}'",
            args.output_dir.display()
        )
    })?;

    let jobs = args.jobs.unwrap_or(0);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .context("failed to build batch thread pool")?;
    info!(
        spectra = args.offsets.len(),
        threads = pool.current_num_threads(),
        "starting batch"
    );

    let results: Vec<SimResult<(BatchEntry, String)>> = pool.install(|| {
        args.offsets
            .par_iter()
            .enumerate()
            .map(|(index, offset)| {
                let config = SimulationConfig {
                    energy_offset: *offset,
                    ..session.config.clone()
                };
                let mut context = session.context.clone();
                let spectrum = context.assemble(&config, &snapshots)?;
                debug!(index, offset, "batch spectrum assembled");
                let entry = BatchEntry {
                    index,
                    energy_offset: *offset,
                    output: format!("spectrum_{:03}.dat", index),
                    peak_energy: spectrum.peak_energy(),
                    bad_selections: spectrum.bad_selection_count(),
                };
                Ok((entry, render_spectrum_table(&spectrum)))
            })
            .collect()
    });

    let mut entries = Vec::with_capacity(results.len());
    for result in results {
        let (entry, table) = result?;
        write_text_output(&args.output_dir.join(&entry.output), &table)?;
        entries.push(entry);
    }
    write_json_output(&args.output_dir.join("batch.json"), &entries)?;

    println!(
        "Wrote {} spectra to {}",
        entries.len(),
        args.output_dir.display()
    );
    Ok(0)
}

pub(super) fn run_catalog_command(args: CatalogArgs) -> Result<i32, CliError> {
    let kind = if args.auger {
        CatalogKind::Auger
    } else {
        CatalogKind::Radiative
    };
    let entries = kind.entries();

    if args.json {
        let content = serde_json::to_string_pretty(entries)
            .context("failed to serialize transition catalog")?;
        println!("{}", content);
        return Ok(0);
    }

    for entry in entries {
        println!("{}", catalog_row(entry));
    }
    Ok(0)
}

fn catalog_row(entry: &CatalogEntry) -> String {
    match entry.auger_level {
        Some(auger_level) => format!(
            "{:<6} {:<4} {:<4} {:<4}",
            entry.id, entry.low_level, entry.high_level, auger_level
        ),
        None => format!(
            "{:<6} {:<4} {:<4} {}",
            entry.id, entry.low_level, entry.high_level, entry.readable_name
        ),
    }
}
