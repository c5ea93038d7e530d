use crate::domain::{LineCategory, SimResult};
use crate::modules::cascade::BoostMap;
use crate::modules::cross_section::CrossSectionProvider;
use crate::modules::formation::FormationTables;
use crate::modules::overlap::{BeamProfile, OverlapVariant, overlap};
use crate::modules::shake::{
    ShakeModel, canonical_two_hole_label, shake_up_query, shell_order_pair,
};
use crate::transitions::{LevelKey, LevelLabel, TransitionLine};
use std::collections::BTreeMap;

/// Everything the compositor needs besides the line itself.
#[derive(Clone, Copy)]
pub struct IntensityRequest<'a> {
    pub beam: BeamProfile,
    /// Beam energy used for cross sections when `beam` is inactive.
    pub default_beam_energy: f64,
    pub cross_section: &'a dyn CrossSectionProvider,
    pub include_cascades: bool,
    pub boost_type: LineCategory,
    pub boosts: Option<&'a BoostMap>,
    pub shake: Option<&'a ShakeModel>,
    /// Shake label of the group the line was selected into.
    pub shake_key: Option<&'a str>,
    pub shake_amplitudes: &'a BTreeMap<String, f64>,
    pub formation: &'a FormationTables,
    pub overlap_variant: OverlapVariant,
    pub alpha: f64,
}

/// Factors entering one effective intensity, kept for reporting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntensityFactors {
    pub cross_section: f64,
    pub depletion: f64,
    pub mix: f64,
    pub overlap: f64,
    pub shake_off_amplitude: f64,
    pub shake_off: f64,
    pub shake_up_amplitude: f64,
    pub shake_up: f64,
    pub cascade: f64,
}

impl IntensityFactors {
    pub fn direct(&self) -> f64 {
        self.cross_section
            * self.depletion
            * self.mix
            * self.overlap
            * self.shake_off_amplitude
            * self.shake_off
            * self.shake_up_amplitude
            * self.shake_up
    }
}

/// `intensity * (direct + cascade) * alpha`. The cascade term is added even
/// when the direct population vanishes.
pub fn effective_intensity(
    line: &TransitionLine,
    request: &IntensityRequest<'_>,
) -> SimResult<f64> {
    let factors = intensity_factors(line, request)?;
    Ok(line.intensity * (factors.direct() + factors.cascade) * request.alpha)
}

pub fn intensity_factors(
    line: &TransitionLine,
    request: &IntensityRequest<'_>,
) -> SimResult<IntensityFactors> {
    let canonical = |key: &LevelKey| canonical_label(request.shake, &key.label);

    let cross_section = cross_section_factor(line, request, canonical)?;
    let overlap = match line.overlap_scale {
        Some(scale) => scale,
        None => overlap(
            line,
            request.beam,
            request.formation,
            request.overlap_variant,
            canonical,
        )?,
    };
    let mix = line.mix_fraction.unwrap_or(1.0);
    let cascade = match request.boosts {
        Some(boosts) if request.include_cascades => cascade_boost(boosts, &line.initial, canonical),
        _ => 0.0,
    };

    let mut factors = IntensityFactors {
        cross_section,
        depletion: 1.0,
        mix,
        overlap,
        shake_off_amplitude: 1.0,
        shake_off: 1.0,
        shake_up_amplitude: 1.0,
        shake_up: 1.0,
        cascade,
    };

    match request.boost_type {
        LineCategory::Diagram | LineCategory::Auger => {
            factors.depletion = request
                .shake
                .map_or(1.0, |model| 1.0 - model.total_shake_probability());
        }
        LineCategory::Satellite => {
            let key = shake_label_for(line, request.shake_key);
            factors.shake_off_amplitude = amplitude(request.shake_amplitudes, key.as_deref());
            factors.shake_off = match (request.shake, key.as_deref()) {
                (Some(model), Some(label)) => model.shake_off_probability(label),
                _ => 0.0,
            };
        }
        LineCategory::ShakeUp => {
            let key = shake_label_for(line, request.shake_key);
            factors.shake_up_amplitude = amplitude(request.shake_amplitudes, key.as_deref());
            factors.shake_up = match (request.shake, shake_up_query(line)) {
                (Some(model), Some((shake_key, principal))) => {
                    model.shake_up_probability(&shake_key, principal)
                }
                _ => 0.0,
            };
        }
    }

    Ok(factors)
}

fn cross_section_factor<F>(
    line: &TransitionLine,
    request: &IntensityRequest<'_>,
    canonical: F,
) -> SimResult<f64>
where
    F: Fn(&LevelKey) -> Option<String>,
{
    let beam_energy = if request.beam.is_active() {
        request.beam.energy
    } else {
        request.default_beam_energy
    };
    let orbital = primary_orbital(line);
    if !request.cross_section.depends_on_energy() {
        return Ok(request.cross_section.cross_section(orbital, 0.0, beam_energy));
    }
    if !(beam_energy.is_finite() && beam_energy > 0.0) {
        return Ok(1.0);
    }

    let level = request.formation.level_for_line(line, canonical)?;
    Ok(request
        .cross_section
        .cross_section(orbital, level.energy, beam_energy))
}

/// Boost of `key`, retrying a two-hole label in canonical order.
fn cascade_boost<F>(boosts: &BoostMap, key: &LevelKey, canonical: F) -> f64
where
    F: Fn(&LevelKey) -> Option<String>,
{
    if let Some(boost) = boosts.get(key) {
        return *boost;
    }
    canonical(key)
        .and_then(|label| boosts.get(&key.with_label(label)))
        .copied()
        .unwrap_or(0.0)
}

/// Orbital ionised by the primary process: the first hole of the initial level.
fn primary_orbital(line: &TransitionLine) -> &str {
    LevelLabel::parse(&line.initial.label)
        .and_then(|parsed| parsed.holes.first().copied())
        .unwrap_or(line.initial.label.as_str())
}

fn shake_label_for(line: &TransitionLine, explicit: Option<&str>) -> Option<String> {
    if let Some(label) = explicit {
        return Some(label.to_string());
    }
    LevelLabel::parse(&line.initial.label)
        .and_then(|parsed| parsed.spectator())
        .map(str::to_string)
}

fn amplitude(amplitudes: &BTreeMap<String, f64>, key: Option<&str>) -> f64 {
    key.and_then(|key| amplitudes.get(key))
        .copied()
        .unwrap_or(1.0)
}

pub(crate) fn canonical_label(shake: Option<&ShakeModel>, label: &str) -> Option<String> {
    match shake {
        Some(model) => model.canonical_label(label),
        None => canonical_two_hole_label(label, shell_order_pair),
    }
}
