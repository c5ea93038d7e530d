use super::CliError;
use anyhow::Context;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing_subscriber::EnvFilter;
use xsim_core::domain::SimError;
use xsim_core::modules::fit::ExperimentalSpectrum;
use xsim_core::modules::serialization::write_text_artifact;
use xsim_core::modules::simulation::{
    SimulationConfig, SimulationContext, load_simulation_config, load_simulation_inputs,
};

const DEFAULT_FILTER: &str = "xsim=info,xsim_core=info";
const VERBOSE_FILTER: &str = "xsim=debug,xsim_core=debug";

/// `RUST_LOG` wins over `--verbose`. Logs go to stderr so stdout stays
/// machine-readable.
pub(super) fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            VERBOSE_FILTER
        } else {
            DEFAULT_FILTER
        })
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub(super) struct Session {
    pub(super) config: SimulationConfig,
    pub(super) context: SimulationContext,
}

/// Load both JSON files, build the context and prepare the shake model.
pub(super) fn load_session(config_path: &Path, inputs_path: &Path) -> Result<Session, CliError> {
    let config = load_simulation_config(config_path).map_err(SimError::from)?;
    config.validate()?;
    let inputs = load_simulation_inputs(inputs_path).map_err(SimError::from)?;
    let mut context = SimulationContext::new(inputs)?;
    context.setup_shake()?;
    Ok(Session { config, context })
}

pub(super) fn load_experiment(path: &Path) -> Result<ExperimentalSpectrum, CliError> {
    let content = fs::read_to_string(path).map_err(|source| {
        SimError::io_system(
            "IO.EXPERIMENT_READ",
            format!("failed to read experiment '{}': {}", path.display(), source),
        )
    })?;
    ExperimentalSpectrum::parse_columns(&content)
        .map_err(|error| CliError::Compute(SimError::from(error)))
}

pub(super) fn ensure_parent_dir(path: &Path) -> Result<(), CliError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory '{}'", parent.display()))?;
        }
    }
    Ok(())
}

pub(super) fn write_text_output(path: &Path, content: &str) -> Result<(), CliError> {
    ensure_parent_dir(path)?;
    write_text_artifact(path, content).map_err(|source| {
        CliError::Compute(SimError::io_system(
            "IO.OUTPUT_WRITE",
            format!("failed to write '{}': {}", path.display(), source),
        ))
    })
}

pub(super) fn write_json_output<T: Serialize>(path: &Path, value: &T) -> Result<(), CliError> {
    let content = serde_json::to_string_pretty(value)
        .with_context(|| format!("failed to serialize '{}'", path.display()))?;
    write_text_output(path, &content)
}
