//! Broadening of selected lines onto an energy grid.
//!
//! Assembly runs in two stages. [`assembler::collect_channel`] turns the
//! selected catalog entries of one channel into [`LineGroup`]s of parallel
//! `(energy, intensity, width)` arrays; [`render`] then sums a line-shape
//! kernel over every group on a grid. The fit harness keeps the collected
//! groups and re-renders them for every parameter set.

pub mod assembler;

pub use assembler::{ChannelBoosts, ChannelView, CompositionSettings, collect_channel};

use crate::domain::{LineCategory, SimError, SimResult};
use crate::numerics::{LineShape, linear_grid, stable_sum_by};
use serde::{Deserialize, Serialize};

/// Parallel energy / intensity / natural-width arrays of one group.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LineArrays {
    pub energies: Vec<f64>,
    pub intensities: Vec<f64>,
    pub widths: Vec<f64>,
}

impl LineArrays {
    pub fn push(&mut self, energy: f64, intensity: f64, width: f64) {
        self.energies.push(energy);
        self.intensities.push(intensity);
        self.widths.push(width);
    }

    pub fn len(&self) -> usize {
        self.energies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.energies.is_empty()
    }

    pub fn total_intensity(&self) -> f64 {
        stable_sum_by(self.intensities.iter(), |value| *value)
    }

    /// Sum of the broadened lines at `x`.
    pub fn evaluate(&self, x: f64, settings: &RenderSettings) -> f64 {
        stable_sum_by(0..self.len(), |index| {
            self.intensities[index]
                * settings.shape.evaluate(
                    x,
                    self.energies[index] + settings.energy_offset,
                    self.widths[index],
                    settings.resolution,
                )
        })
    }
}

/// Lines of one catalog entry, for one shake label and one channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineGroup {
    pub category: LineCategory,
    pub entry_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shake_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    pub lines: LineArrays,
    /// Zero-filled stand-in for a selection that matched nothing.
    pub placeholder: bool,
}

impl LineGroup {
    pub fn new(
        category: LineCategory,
        entry_id: impl Into<String>,
        shake_label: Option<String>,
        channel: Option<String>,
    ) -> Self {
        Self {
            category,
            entry_id: entry_id.into(),
            shake_label,
            channel,
            lines: LineArrays::default(),
            placeholder: false,
        }
    }
}

/// A selected catalog entry that produced no lines.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct BadSelection {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

/// Collected groups of every channel of one assembly pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineSet {
    pub groups: Vec<LineGroup>,
    pub bad_selections: Vec<BadSelection>,
}

impl LineSet {
    pub fn bad_selection_count(&self) -> usize {
        self.bad_selections.len()
    }

    pub fn line_count(&self) -> usize {
        self.groups.iter().map(|group| group.lines.len()).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSettings {
    pub shape: LineShape,
    /// Experimental resolution (FWHM, eV).
    pub resolution: f64,
    /// Added to every line energy before evaluation.
    pub energy_offset: f64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            shape: LineShape::default(),
            resolution: 1.0,
            energy_offset: 0.0,
        }
    }
}

/// Uniform energy grid as written in a configuration.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct GridSpec {
    pub start: f64,
    pub end: f64,
    pub points: usize,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self {
            start: 0.0,
            end: 1.0,
            points: 2,
        }
    }
}

impl GridSpec {
    pub fn validate(&self) -> SimResult<()> {
        if !self.start.is_finite() || !self.end.is_finite() || self.end <= self.start {
            return Err(SimError::input_validation(
                "CONFIG.GRID",
                format!(
                    "grid must satisfy start < end with finite bounds, got [{}, {}]",
                    self.start, self.end
                ),
            ));
        }
        if self.points < 2 {
            return Err(SimError::input_validation(
                "CONFIG.GRID",
                format!("grid needs at least 2 points, got {}", self.points),
            ));
        }
        Ok(())
    }

    pub fn build(&self) -> SimResult<Vec<f64>> {
        self.validate()?;
        linear_grid(self.start, self.end, self.points).ok_or_else(|| {
            SimError::internal("SYS.GRID", "validated grid could not be constructed")
        })
    }
}

/// Category totals on the grid.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpectrumTotals {
    pub diagram: Vec<f64>,
    pub satellite: Vec<f64>,
    pub shake_up: Vec<f64>,
    pub auger: Vec<f64>,
    pub total: Vec<f64>,
}

impl SpectrumTotals {
    fn zeros(len: usize) -> Self {
        Self {
            diagram: vec![0.0; len],
            satellite: vec![0.0; len],
            shake_up: vec![0.0; len],
            auger: vec![0.0; len],
            total: vec![0.0; len],
        }
    }

    pub fn category(&self, category: LineCategory) -> &[f64] {
        match category {
            LineCategory::Diagram => &self.diagram,
            LineCategory::Satellite => &self.satellite,
            LineCategory::ShakeUp => &self.shake_up,
            LineCategory::Auger => &self.auger,
        }
    }

    fn category_mut(&mut self, category: LineCategory) -> &mut Vec<f64> {
        match category {
            LineCategory::Diagram => &mut self.diagram,
            LineCategory::Satellite => &mut self.satellite,
            LineCategory::ShakeUp => &mut self.shake_up,
            LineCategory::Auger => &mut self.auger,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedGroup {
    #[serde(flatten)]
    pub group: LineGroup,
    pub curve: Vec<f64>,
}

/// Assembled spectrum: every group curve, category totals and the bad
/// selections of the pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Spectrum {
    pub grid: Vec<f64>,
    pub groups: Vec<RenderedGroup>,
    pub totals: SpectrumTotals,
    pub bad_selections: Vec<BadSelection>,
}

impl Spectrum {
    pub fn bad_selection_count(&self) -> usize {
        self.bad_selections.len()
    }

    pub fn bad_selections_for(&self, channel: Option<&str>) -> Vec<&BadSelection> {
        self.bad_selections
            .iter()
            .filter(|bad| bad.channel.as_deref() == channel)
            .collect()
    }

    /// Grid energy of the largest total, `None` for an all-zero spectrum.
    pub fn peak_energy(&self) -> Option<f64> {
        self.totals
            .total
            .iter()
            .enumerate()
            .filter(|(_, value)| value.is_finite() && **value > 0.0)
            .max_by(|lhs, rhs| lhs.1.total_cmp(rhs.1))
            .map(|(index, _)| self.grid[index])
    }
}

/// Sum each group onto `grid` and accumulate category totals. Groups are
/// rendered in collection order, so identical inputs give identical bits.
pub fn render(lines: &LineSet, grid: &[f64], settings: &RenderSettings) -> Spectrum {
    let mut totals = SpectrumTotals::zeros(grid.len());
    let mut groups = Vec::with_capacity(lines.groups.len());

    for group in &lines.groups {
        let curve: Vec<f64> = grid
            .iter()
            .map(|x| group.lines.evaluate(*x, settings))
            .collect();
        let category_total = totals.category_mut(group.category);
        for (slot, value) in category_total.iter_mut().zip(&curve) {
            *slot += *value;
        }
        for (slot, value) in totals.total.iter_mut().zip(&curve) {
            *slot += *value;
        }
        groups.push(RenderedGroup {
            group: group.clone(),
            curve,
        });
    }

    Spectrum {
        grid: grid.to_vec(),
        groups,
        totals,
        bad_selections: lines.bad_selections.clone(),
    }
}

/// Total curve only, for repeated evaluation on an experimental axis.
pub fn render_total(lines: &LineSet, x: &[f64], settings: &RenderSettings) -> Vec<f64> {
    x.iter()
        .map(|x| stable_sum_by(&lines.groups, |group| group.lines.evaluate(*x, settings)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{
        BadSelection, GridSpec, LineArrays, LineGroup, LineSet, RenderSettings, render,
        render_total,
    };
    use crate::domain::LineCategory;
    use crate::numerics::LineShape;
    use std::f64::consts::PI;

    fn assert_scalar_close(label: &str, expected: f64, actual: f64, abs_tol: f64, rel_tol: f64) {
        let diff = (expected - actual).abs();
        let tolerance = abs_tol.max(rel_tol * expected.abs().max(actual.abs()));
        assert!(
            diff <= tolerance,
            "{} mismatch: expected={} actual={} diff={} tol={}",
            label,
            expected,
            actual,
            diff,
            tolerance
        );
    }

    fn group(category: LineCategory, lines: &[(f64, f64, f64)]) -> LineGroup {
        let mut group = LineGroup::new(category, "KL3", None, None);
        for (energy, intensity, width) in lines {
            group.lines.push(*energy, *intensity, *width);
        }
        group
    }

    #[test]
    fn single_lorentzian_line_peaks_at_closed_form_height() {
        let (energy, intensity, width) = (8047.8, 1.7, 2.5);
        let set = LineSet {
            groups: vec![group(LineCategory::Diagram, &[(energy, intensity, width)])],
            bad_selections: Vec::new(),
        };
        let settings = RenderSettings {
            shape: LineShape::Lorentzian,
            resolution: 0.0,
            energy_offset: 0.0,
        };
        let spectrum = render(&set, &[energy - 1.0, energy, energy + 1.0], &settings);
        assert_scalar_close(
            "lorentzian peak",
            intensity * 2.0 / (PI * width),
            spectrum.totals.total[1],
            1.0e-14,
            1.0e-12,
        );
        assert_eq!(spectrum.totals.diagram, spectrum.totals.total);
        assert_eq!(spectrum.peak_energy(), Some(energy));
    }

    #[test]
    fn energy_offset_shifts_every_line() {
        let set = LineSet {
            groups: vec![group(LineCategory::Auger, &[(100.0, 1.0, 1.0)])],
            bad_selections: Vec::new(),
        };
        let shifted = RenderSettings {
            shape: LineShape::Gaussian,
            resolution: 0.5,
            energy_offset: 2.0,
        };
        let reference = RenderSettings {
            energy_offset: 0.0,
            ..shifted
        };
        assert_eq!(
            render_total(&set, &[102.0], &shifted),
            render_total(&set, &[100.0], &reference)
        );
    }

    #[test]
    fn totals_split_by_category_and_sum_to_total() {
        let set = LineSet {
            groups: vec![
                group(LineCategory::Diagram, &[(10.0, 1.0, 1.0)]),
                group(LineCategory::Satellite, &[(12.0, 0.3, 1.5), (13.0, 0.2, 1.5)]),
                group(LineCategory::Auger, &[(8.0, 0.1, 3.0)]),
            ],
            bad_selections: Vec::new(),
        };
        let grid: Vec<f64> = (0..41).map(|index| 5.0 + 0.25 * index as f64).collect();
        let spectrum = render(&set, &grid, &RenderSettings::default());
        for index in 0..grid.len() {
            let parts = spectrum.totals.diagram[index]
                + spectrum.totals.satellite[index]
                + spectrum.totals.shake_up[index]
                + spectrum.totals.auger[index];
            assert_scalar_close("total", parts, spectrum.totals.total[index], 1.0e-15, 1.0e-12);
            assert_eq!(spectrum.totals.shake_up[index], 0.0);
        }
        assert_eq!(spectrum.groups.len(), 3);
        assert_eq!(set.line_count(), 4);
    }

    #[test]
    fn rendering_is_bit_identical_across_calls() {
        let set = LineSet {
            groups: vec![group(
                LineCategory::Diagram,
                &[(8027.8, 0.51, 2.6), (8047.8, 1.0, 2.5)],
            )],
            bad_selections: vec![BadSelection {
                key: "KM3".to_string(),
                channel: None,
            }],
        };
        let grid = GridSpec {
            start: 8000.0,
            end: 8060.0,
            points: 601,
        }
        .build()
        .expect("grid");
        let settings = RenderSettings::default();
        let first = render(&set, &grid, &settings);
        let second = render(&set, &grid, &settings);
        assert_eq!(first, second);
        assert_eq!(first.bad_selection_count(), 1);
        assert_eq!(first.bad_selections_for(None).len(), 1);
    }

    #[test]
    fn empty_groups_render_as_zero_curves() {
        let mut placeholder = LineGroup::new(LineCategory::Diagram, "KM3", None, None);
        placeholder.placeholder = true;
        let set = LineSet {
            groups: vec![placeholder],
            bad_selections: Vec::new(),
        };
        let spectrum = render(&set, &[1.0, 2.0, 3.0], &RenderSettings::default());
        assert_eq!(spectrum.groups[0].curve, vec![0.0; 3]);
        assert_eq!(spectrum.peak_energy(), None);
        assert!(LineArrays::default().is_empty());
    }

    #[test]
    fn invalid_grids_are_configuration_errors() {
        for spec in [
            GridSpec {
                start: 10.0,
                end: 5.0,
                points: 10,
            },
            GridSpec {
                start: 0.0,
                end: 5.0,
                points: 1,
            },
        ] {
            let error = spec.build().expect_err("invalid grid");
            assert_eq!(error.placeholder(), "CONFIG.GRID");
        }
    }
}
