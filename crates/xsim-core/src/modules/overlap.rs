//! Overlap between an excitation beam and the formation profile of a level.
//!
//! Both profiles are expressed in the scaled variable `u = (E - E0) / width`.
//! The level profile is the low-energy half of a Lorentzian of unit FWHM,
//! held at its peak above threshold. The beam profile is one up to the beam
//! energy and falls off as a Gaussian of the beam FWHM above it. The overlap
//! is `integral(min(level, beam)) / integral(level)`.

use crate::common::constants::{
    EXCITATION_WIDTH_SCALE, FWHM_PER_SIGMA, MIN_PROFILE_WIDTH, OVERLAP_SAMPLE_COUNT,
    OVERLAP_WINDOW_WIDTHS,
};
use crate::domain::{SimError, SimResult};
use crate::modules::formation::{FormationLevel, FormationTables};
use crate::numerics::integrate_simpson_fn;
use crate::transitions::{LevelKey, TransitionLine};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapVariant {
    #[default]
    Standard,
    /// Excitation channels use an empirically narrowed level width.
    Excitation,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BeamProfile {
    pub energy: f64,
    pub fwhm: f64,
}

impl BeamProfile {
    pub fn new(energy: f64, fwhm: f64) -> Self {
        Self { energy, fwhm }
    }

    pub fn is_active(&self) -> bool {
        self.energy.is_finite() && self.energy > 0.0
    }
}

/// Overlap of `beam` with an explicit formation level. Always finite and in
/// `[0, 1]`; an inactive beam gives 1.
pub fn overlap_with_level(
    level: FormationLevel,
    beam: BeamProfile,
    variant: OverlapVariant,
) -> SimResult<f64> {
    if !beam.is_active() {
        return Ok(1.0);
    }

    let mut width = if level.width.is_finite() { level.width } else { 0.0 };
    width = width.max(MIN_PROFILE_WIDTH);
    if variant == OverlapVariant::Excitation {
        width *= EXCITATION_WIDTH_SCALE;
    }

    let beam_sigma = beam.fwhm.max(MIN_PROFILE_WIDTH) / FWHM_PER_SIGMA;
    let beam_edge = (beam.energy - level.energy) / width;
    let beam_profile = |u: f64| -> f64 {
        if u <= beam_edge {
            1.0
        } else {
            let offset = (u - beam_edge) * width / beam_sigma;
            (-0.5 * offset * offset).exp()
        }
    };

    let start = -OVERLAP_WINDOW_WIDTHS;
    let end = OVERLAP_WINDOW_WIDTHS;
    let level_area = integrate_simpson_fn(level_profile, start, end, OVERLAP_SAMPLE_COUNT)
        .map_err(overlap_error)?;
    let shared_area = integrate_simpson_fn(
        |u| level_profile(u).min(beam_profile(u)),
        start,
        end,
        OVERLAP_SAMPLE_COUNT,
    )
    .map_err(overlap_error)?;

    if level_area <= 0.0 {
        return Ok(1.0);
    }
    Ok((shared_area / level_area).clamp(0.0, 1.0))
}

/// Overlap of `beam` with the formation profile of the initial level of
/// `line`. A level absent from its formation table is a fatal input error.
pub fn overlap<F>(
    line: &TransitionLine,
    beam: BeamProfile,
    formation: &FormationTables,
    variant: OverlapVariant,
    canonical_label: F,
) -> SimResult<f64>
where
    F: Fn(&LevelKey) -> Option<String>,
{
    if !beam.is_active() {
        return Ok(1.0);
    }
    let level = formation.level_for_line(line, canonical_label)?;
    overlap_with_level(level, beam, variant)
}

/// Compute and store the overlap scale on `line`.
pub fn overlap_line<F>(
    line: &mut TransitionLine,
    beam: BeamProfile,
    formation: &FormationTables,
    variant: OverlapVariant,
    canonical_label: F,
) -> SimResult<f64>
where
    F: Fn(&LevelKey) -> Option<String>,
{
    let scale = overlap(line, beam, formation, variant, canonical_label)?;
    line.overlap_scale = Some(scale);
    Ok(scale)
}

fn level_profile(u: f64) -> f64 {
    if u < 0.0 { 1.0 / (1.0 + 4.0 * u * u) } else { 1.0 }
}

fn overlap_error(source: crate::numerics::IntegrationError) -> SimError {
    SimError::computation(
        "RUN.OVERLAP_INTEGRAL",
        format!("overlap integration failed: {}", source),
    )
}
