use super::config::{SimulationConfig, SimulationInputs};
use crate::domain::{CascadeCategory, ChannelMode, SimError, SimResult};
use crate::modules::cascade::{BoostCache, BoostMap};
use crate::modules::fit::{ExperimentalSpectrum, FitHarness, FitOutcome, fit_spectrum};
use crate::modules::formation::FormationTables;
use crate::modules::overlap::OverlapVariant;
use crate::modules::profile::{
    ChannelBoosts, ChannelView, CompositionSettings, LineSet, Spectrum, collect_channel, render,
};
use crate::modules::shake::{ShakeModel, ShakeModelInput, ShakeRow};
use crate::modules::tables::{ChannelSet, RateTables};
use crate::transitions::SelectionSnapshot;
use tracing::{debug, info, warn};

/// Owner of one element load and of every cache derived from it.
///
/// `setup_shake` must run before compositing for shake probabilities to take
/// effect; without it diagram populations are not depleted and satellites
/// vanish. Boost maps are built lazily per channel and category.
#[derive(Debug, Clone)]
pub struct SimulationContext {
    element: Option<(usize, &'static str)>,
    channels: ChannelSet,
    formation: FormationTables,
    shake_off: Vec<ShakeRow>,
    shake_up: Vec<ShakeRow>,
    shake_labels: Vec<String>,
    shake: Option<ShakeModel>,
    boosts: BoostCache,
}

impl SimulationContext {
    pub fn new(inputs: SimulationInputs) -> SimResult<Self> {
        let element = inputs.element()?;
        let channels = inputs.channel_set();
        let formation = FormationTables::from_rows(&inputs.formation);
        debug!(
            element = element.map_or("unknown", |(_, symbol)| symbol),
            lines = channels.base.line_count(),
            charge_states = channels.charge_states.len(),
            excitations = channels.excitations.len(),
            "loaded simulation inputs"
        );
        Ok(Self {
            element,
            channels,
            formation,
            shake_off: inputs.shake_off,
            shake_up: inputs.shake_up,
            shake_labels: inputs.shake_labels,
            shake: None,
            boosts: BoostCache::default(),
        })
    }

    pub fn element(&self) -> Option<(usize, &'static str)> {
        self.element
    }

    pub fn channels(&self) -> &ChannelSet {
        &self.channels
    }

    pub fn formation(&self) -> &FormationTables {
        &self.formation
    }

    pub fn shake(&self) -> Option<&ShakeModel> {
        self.shake.as_ref()
    }

    pub fn cached_boost_maps(&self) -> usize {
        self.boosts.len()
    }

    /// Build the shake model from the loaded rows.
    pub fn setup_shake(&mut self) -> SimResult<&ShakeModel> {
        let model = ShakeModel::build(ShakeModelInput {
            shake_off: &self.shake_off,
            shake_up: &self.shake_up,
            labels: &self.shake_labels,
            shake_up_lines: &self.channels.base.shake_up,
        })?;
        Ok(self.shake.insert(model))
    }

    /// Drop the shake model and every boost map.
    pub fn invalidate_caches(&mut self) {
        self.shake = None;
        self.boosts.invalidate();
    }

    /// Swap in a new element load; caches are invalidated.
    pub fn replace_inputs(&mut self, inputs: SimulationInputs) -> SimResult<()> {
        *self = Self::new(inputs)?;
        Ok(())
    }

    /// Boost map of the base tables for `category`, built on first use.
    pub fn boost_map(&mut self, category: CascadeCategory) -> &BoostMap {
        self.boosts
            .get_or_compute(None, category, &self.channels.base, &self.formation)
    }

    /// Collect the line groups of every configured channel.
    pub fn collect_lines(
        &mut self,
        config: &SimulationConfig,
        snapshots: &[SelectionSnapshot],
    ) -> SimResult<LineSet> {
        config.validate()?;
        if self.shake.is_none() {
            warn!("shake model not set up; shake probabilities are treated as absent");
        }

        let plan = self.channel_plan(config)?;
        if config.include_cascades {
            for channel in &plan {
                let (tables, formation) = channel_data(
                    &self.channels,
                    &self.formation,
                    config.channel_mode,
                    channel.name.as_deref(),
                )?;
                for category in CascadeCategory::ALL {
                    self.boosts.get_or_compute(
                        channel.cache_key.as_deref(),
                        category,
                        tables,
                        formation,
                    );
                }
            }
        }

        let match_rule = config.match_rule();
        let restriction = config.restriction();
        let shake_labels = match &self.shake {
            Some(model) => model.labels(),
            None => self.shake_labels.as_slice(),
        };
        let settings = CompositionSettings {
            beam: config.beam(),
            default_beam_energy: config.default_beam_energy,
            cross_section: &config.cross_section,
            include_cascades: config.include_cascades,
            shake: self.shake.as_ref(),
            shake_labels,
            shake_amplitudes: &config.shake_amplitudes,
            match_rule,
            restriction: &restriction,
            alpha: config.alpha,
        };

        let mut lines = LineSet::default();
        for channel in &plan {
            let (tables, formation) = channel_data(
                &self.channels,
                &self.formation,
                config.channel_mode,
                channel.name.as_deref(),
            )?;
            let boosts = if config.include_cascades {
                let key = channel.cache_key.as_deref();
                ChannelBoosts {
                    diagram: self.boosts.get(key, CascadeCategory::Diagram),
                    auger: self.boosts.get(key, CascadeCategory::Auger),
                    satellite: self.boosts.get(key, CascadeCategory::Satellite),
                }
            } else {
                ChannelBoosts::default()
            };
            let view = ChannelView {
                name: channel.name.as_deref(),
                tables,
                formation,
                boosts,
                weight: channel.weight,
                overlap_variant: channel.overlap_variant,
            };
            collect_channel(&view, &settings, snapshots, &mut lines)?;
        }

        if !lines.bad_selections.is_empty() {
            warn!(
                count = lines.bad_selection_count(),
                "selected transitions produced no lines"
            );
        }
        Ok(lines)
    }

    /// Assemble the spectrum of `config` for the given selection snapshots.
    pub fn assemble(
        &mut self,
        config: &SimulationConfig,
        snapshots: &[SelectionSnapshot],
    ) -> SimResult<Spectrum> {
        let lines = self.collect_lines(config, snapshots)?;
        let grid = config.grid.build()?;
        let mut spectrum = render(&lines, &grid, &config.render_settings());
        if config.vertical_offset != 0.0 {
            for value in &mut spectrum.totals.total {
                *value += config.vertical_offset;
            }
        }
        info!(
            groups = spectrum.groups.len(),
            lines = lines.line_count(),
            bad_selections = spectrum.bad_selection_count(),
            "assembled spectrum"
        );
        Ok(spectrum)
    }

    /// Fit `experiment` starting from the configured fit parameters.
    pub fn fit(
        &mut self,
        config: &SimulationConfig,
        snapshots: &[SelectionSnapshot],
        experiment: &ExperimentalSpectrum,
    ) -> SimResult<FitOutcome> {
        let lines = self.collect_lines(config, snapshots)?;
        let harness = FitHarness::new(&lines, experiment, config.line_shape, config.normalization);
        Ok(fit_spectrum(&harness, &config.fit, &config.fit_options)?)
    }

    fn channel_plan(&self, config: &SimulationConfig) -> SimResult<Vec<PlannedChannel>> {
        let (prefix, variant) = match config.channel_mode {
            ChannelMode::Single => {
                return Ok(vec![PlannedChannel {
                    name: None,
                    cache_key: None,
                    weight: None,
                    overlap_variant: OverlapVariant::Standard,
                }]);
            }
            ChannelMode::ChargeStates => ("charge", OverlapVariant::Standard),
            ChannelMode::Excitations => ("excitation", OverlapVariant::Excitation),
        };

        config
            .mixing
            .iter()
            .map(|(name, weight)| {
                if self.channels.channel(config.channel_mode, Some(name)).is_none() {
                    return Err(SimError::input_validation(
                        "CONFIG.CHANNEL_UNKNOWN",
                        format!("mixing weight given for unknown channel '{}'", name),
                    ));
                }
                Ok(PlannedChannel {
                    name: Some(name.clone()),
                    cache_key: Some(format!("{}/{}", prefix, name)),
                    weight: Some(*weight),
                    overlap_variant: variant,
                })
            })
            .collect()
    }
}

fn channel_data<'a>(
    channels: &'a ChannelSet,
    base_formation: &'a FormationTables,
    mode: ChannelMode,
    name: Option<&str>,
) -> SimResult<(&'a RateTables, &'a FormationTables)> {
    let tables = channels.channel(mode, name).ok_or_else(|| {
        SimError::internal("SYS.CHANNEL", format!("planned channel {:?} disappeared", name))
    })?;
    let formation = name
        .and_then(|name| channels.channel_formation(mode, name))
        .unwrap_or(base_formation);
    Ok((tables, formation))
}

struct PlannedChannel {
    name: Option<String>,
    cache_key: Option<String>,
    weight: Option<f64>,
    overlap_variant: OverlapVariant,
}
