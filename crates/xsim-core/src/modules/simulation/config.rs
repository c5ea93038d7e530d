use crate::common::elements::resolve_element;
use crate::domain::{ChannelMode, NormalizationMode, SimError, SimResult};
use crate::modules::cross_section::CrossSectionModel;
use crate::modules::fit::{FitOptions, FitParameters};
use crate::modules::formation::FormationRows;
use crate::modules::overlap::BeamProfile;
use crate::modules::profile::{GridSpec, RenderSettings};
use crate::modules::selection::{JjRestriction, MatchMode, MatchRule};
use crate::modules::shake::ShakeRow;
use crate::modules::tables::{ChannelSource, ChannelTables, ChannelSet, RateTableSources};
use crate::numerics::LineShape;
use crate::transitions::{CatalogKind, SelectionSnapshot, SelectionState};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Presentation-layer settings of one simulation.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimulationConfig {
    /// Excitation beam energy; `0` disables overlap suppression.
    pub beam_energy: f64,
    pub beam_fwhm: f64,
    /// Beam energy used for cross sections when no beam is set.
    pub default_beam_energy: f64,
    pub resolution: f64,
    pub energy_offset: f64,
    pub vertical_offset: f64,
    pub line_shape: LineShape,
    pub normalization: NormalizationMode,
    pub grid: GridSpec,
    pub include_cascades: bool,
    pub allowed_two_j: Vec<u32>,
    pub match_mode: MatchMode,
    pub require_auger: bool,
    /// Glob patterns over radiative catalog ids / names.
    pub selection: Vec<String>,
    pub auger_selection: Vec<String>,
    pub shake_amplitudes: BTreeMap<String, f64>,
    pub channel_mode: ChannelMode,
    /// Mixing weight per charge state or excitation channel.
    pub mixing: BTreeMap<String, f64>,
    pub cross_section: CrossSectionModel,
    pub alpha: f64,
    pub fit: FitParameters,
    pub fit_options: FitOptions,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            beam_energy: 0.0,
            beam_fwhm: 1.0,
            default_beam_energy: 0.0,
            resolution: 1.0,
            energy_offset: 0.0,
            vertical_offset: 0.0,
            line_shape: LineShape::default(),
            normalization: NormalizationMode::default(),
            grid: GridSpec::default(),
            include_cascades: false,
            allowed_two_j: Vec::new(),
            match_mode: MatchMode::default(),
            require_auger: false,
            selection: Vec::new(),
            auger_selection: Vec::new(),
            shake_amplitudes: BTreeMap::new(),
            channel_mode: ChannelMode::default(),
            mixing: BTreeMap::new(),
            cross_section: CrossSectionModel::default(),
            alpha: 1.0,
            fit: FitParameters::default(),
            fit_options: FitOptions::default(),
        }
    }
}

impl SimulationConfig {
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        parse_json(content, Path::new("<inline-config>"))
    }

    pub fn validate(&self) -> SimResult<()> {
        self.grid.validate()?;
        if !(self.resolution.is_finite() && self.resolution >= 0.0) {
            return Err(SimError::input_validation(
                "CONFIG.RESOLUTION",
                format!("resolution must be finite and >= 0, got {}", self.resolution),
            ));
        }
        if !self.beam_energy.is_finite() || !(self.beam_fwhm.is_finite() && self.beam_fwhm >= 0.0)
        {
            return Err(SimError::input_validation(
                "CONFIG.BEAM",
                format!(
                    "beam energy must be finite and beam FWHM finite and >= 0, got {} / {}",
                    self.beam_energy, self.beam_fwhm
                ),
            ));
        }
        if !self.alpha.is_finite() {
            return Err(SimError::input_validation(
                "CONFIG.ALPHA",
                format!("alpha must be finite, got {}", self.alpha),
            ));
        }
        if self.channel_mode != ChannelMode::Single && self.mixing.is_empty() {
            return Err(SimError::input_validation(
                "CONFIG.CHANNEL_MIXING",
                format!(
                    "channel mode {:?} needs at least one mixing weight",
                    self.channel_mode
                ),
            ));
        }
        if let Some((name, weight)) = self
            .mixing
            .iter()
            .find(|(_, weight)| !(weight.is_finite() && **weight >= 0.0))
        {
            return Err(SimError::input_validation(
                "CONFIG.CHANNEL_MIXING",
                format!("mixing weight for '{}' must be finite and >= 0, got {}", name, weight),
            ));
        }
        if let Some((label, amplitude)) = self
            .shake_amplitudes
            .iter()
            .find(|(_, amplitude)| !amplitude.is_finite())
        {
            return Err(SimError::input_validation(
                "CONFIG.SHAKE_AMPLITUDE",
                format!("shake amplitude for '{}' must be finite, got {}", label, amplitude),
            ));
        }
        Ok(())
    }

    pub fn beam(&self) -> BeamProfile {
        BeamProfile::new(self.beam_energy, self.beam_fwhm)
    }

    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            shape: self.line_shape,
            resolution: self.resolution,
            energy_offset: self.energy_offset,
        }
    }

    pub fn match_rule(&self) -> MatchRule {
        MatchRule::new(self.match_mode, self.require_auger)
    }

    pub fn restriction(&self) -> JjRestriction {
        JjRestriction::new(self.allowed_two_j.iter().copied())
    }

    /// Radiative and Auger selection snapshots compiled from the glob lists.
    pub fn selections(&self) -> SimResult<Vec<SelectionSnapshot>> {
        let mut snapshots = Vec::with_capacity(2);
        for (kind, patterns) in [
            (CatalogKind::Radiative, &self.selection),
            (CatalogKind::Auger, &self.auger_selection),
        ] {
            let mut state = SelectionState::new(kind);
            if !patterns.is_empty() && state.select_matching(patterns)? == 0 {
                warn!(?kind, ?patterns, "selection patterns matched no catalog entries");
            }
            snapshots.push(state.snapshot());
        }
        Ok(snapshots)
    }
}

/// Collaborator data of one element load.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimulationInputs {
    /// Element symbol or atomic number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element: Option<String>,
    pub tables: RateTableSources,
    pub charge_states: BTreeMap<String, ChannelSource>,
    pub excitations: BTreeMap<String, ChannelSource>,
    pub shake_off: Vec<ShakeRow>,
    pub shake_up: Vec<ShakeRow>,
    pub shake_labels: Vec<String>,
    pub formation: FormationRows,
}

impl SimulationInputs {
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        parse_json(content, Path::new("<inline-inputs>"))
    }

    /// Resolved `(Z, symbol)`; an unknown element is an input error.
    pub fn element(&self) -> SimResult<Option<(usize, &'static str)>> {
        let Some(spec) = self.element.as_deref() else {
            return Ok(None);
        };
        resolve_element(spec).map(Some).ok_or_else(|| {
            SimError::input_validation("INPUT.ELEMENT", format!("unknown element '{}'", spec))
        })
    }

    pub fn channel_set(&self) -> ChannelSet {
        ChannelSet {
            base: self.tables.resolve(),
            charge_states: resolve_channels(&self.charge_states),
            excitations: resolve_channels(&self.excitations),
        }
    }
}

fn resolve_channels(sources: &BTreeMap<String, ChannelSource>) -> BTreeMap<String, ChannelTables> {
    sources
        .iter()
        .map(|(name, source)| (name.clone(), ChannelTables::from_source(source)))
        .collect()
}

#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "failed to read '{}': {}", path.display(), source)
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse '{}': {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
        }
    }
}

impl From<ConfigError> for SimError {
    fn from(error: ConfigError) -> Self {
        match &error {
            ConfigError::Read { .. } => SimError::io_system("IO.CONFIG_READ", error.to_string()),
            ConfigError::Parse { .. } => {
                SimError::input_validation("CONFIG.PARSE", error.to_string())
            }
        }
    }
}

pub fn load_simulation_config(path: impl AsRef<Path>) -> Result<SimulationConfig, ConfigError> {
    load_json(path.as_ref())
}

pub fn load_simulation_inputs(path: impl AsRef<Path>) -> Result<SimulationInputs, ConfigError> {
    load_json(path.as_ref())
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_json(&content, path)
}

fn parse_json<T: DeserializeOwned>(content: &str, path: &Path) -> Result<T, ConfigError> {
    serde_json::from_str(content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
