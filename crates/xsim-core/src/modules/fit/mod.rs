//! Residual harness around the profile assembler and a bounded
//! Levenberg-Marquardt driver.

mod optimizer;

pub use optimizer::{FitOptions, FitOutcome, fit_spectrum};

use crate::domain::{NormalizationMode, SimError};
use crate::modules::profile::{LineSet, RenderSettings, render_total};
use crate::numerics::{LineShape, LinearSolveError, finite_max, stable_sum_by};
use crate::transitions::parse_f64_or;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FitError {
    #[error("experimental spectrum is empty")]
    EmptyExperiment,
    #[error("experimental columns differ in length: x={x}, y={y}, sigma={sigma}")]
    LengthMismatch { x: usize, y: usize, sigma: usize },
    #[error("sigma at point {index} must be finite and positive, got {value}")]
    NonPositiveSigma { index: usize, value: f64 },
    #[error("{points} points cannot constrain {free} free parameters")]
    InsufficientDegreesOfFreedom { points: usize, free: usize },
    #[error("normal equations could not be solved: {0}")]
    Solve(#[from] LinearSolveError),
}

impl From<FitError> for SimError {
    fn from(error: FitError) -> Self {
        let placeholder = match &error {
            FitError::EmptyExperiment
            | FitError::LengthMismatch { .. }
            | FitError::NonPositiveSigma { .. } => {
                return SimError::input_validation("INPUT.EXPERIMENT", error.to_string());
            }
            FitError::InsufficientDegreesOfFreedom { .. } => "RUN.FIT_DOF",
            FitError::Solve(_) => "RUN.FIT_SOLVE",
        };
        SimError::computation(placeholder, error.to_string())
    }
}

/// Measured `(x, y, sigma)` columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExperimentalSpectrum {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub sigma: Vec<f64>,
}

impl ExperimentalSpectrum {
    /// Missing uncertainties default to `sqrt(max(|y|, 1))`.
    pub fn new(x: Vec<f64>, y: Vec<f64>, sigma: Option<Vec<f64>>) -> Result<Self, FitError> {
        let sigma = sigma.unwrap_or_else(|| y.iter().map(|y| default_sigma(*y)).collect());
        if x.len() != y.len() || x.len() != sigma.len() {
            return Err(FitError::LengthMismatch {
                x: x.len(),
                y: y.len(),
                sigma: sigma.len(),
            });
        }
        if x.is_empty() {
            return Err(FitError::EmptyExperiment);
        }
        if let Some((index, value)) = sigma
            .iter()
            .copied()
            .enumerate()
            .find(|(_, value)| !(value.is_finite() && *value > 0.0))
        {
            return Err(FitError::NonPositiveSigma { index, value });
        }
        Ok(Self { x, y, sigma })
    }

    /// Whitespace columns `x y [sigma]`. Comment (`#`) lines, blank lines and
    /// rows whose `x` or `y` do not parse are skipped.
    pub fn parse_columns(source: &str) -> Result<Self, FitError> {
        let mut x = Vec::new();
        let mut y = Vec::new();
        let mut sigma = Vec::new();
        for line in source.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 2 {
                continue;
            }
            let x_value = parse_f64_or(fields[0], f64::NAN);
            let y_value = parse_f64_or(fields[1], f64::NAN);
            if !(x_value.is_finite() && y_value.is_finite()) {
                continue;
            }
            let sigma_value = fields
                .get(2)
                .map(|token| parse_f64_or(token, f64::NAN))
                .filter(|value| value.is_finite() && *value > 0.0)
                .unwrap_or_else(|| default_sigma(y_value));
            x.push(x_value);
            y.push(y_value);
            sigma.push(sigma_value);
        }
        Self::new(x, y, Some(sigma))
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

fn default_sigma(y: f64) -> f64 {
    y.abs().max(1.0).sqrt()
}

/// One fit parameter; bounds are inclusive and optional.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FitParameter {
    pub value: f64,
    #[serde(default = "default_free")]
    pub free: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

fn default_free() -> bool {
    true
}

impl FitParameter {
    pub fn free(value: f64, min: Option<f64>, max: Option<f64>) -> Self {
        Self {
            value,
            free: true,
            min,
            max,
        }
    }

    pub fn fixed(value: f64) -> Self {
        Self {
            value,
            free: false,
            min: None,
            max: None,
        }
    }

    pub fn clamp(&self, value: f64) -> f64 {
        let lower = self.min.unwrap_or(f64::NEG_INFINITY);
        let upper = self.max.unwrap_or(f64::INFINITY);
        if lower > upper {
            return value;
        }
        value.clamp(lower, upper)
    }
}

/// Parameters of the fit model
/// `height_anchor * total(x; energy_offset, resolution) + vertical_offset`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FitParameters {
    pub energy_offset: FitParameter,
    pub vertical_offset: FitParameter,
    pub resolution: FitParameter,
    pub height_anchor: FitParameter,
}

impl Default for FitParameters {
    fn default() -> Self {
        Self {
            energy_offset: FitParameter::free(0.0, Some(-50.0), Some(50.0)),
            vertical_offset: FitParameter::free(0.0, None, None),
            resolution: FitParameter::free(1.0, Some(0.0), Some(50.0)),
            height_anchor: FitParameter::free(1.0, Some(0.0), None),
        }
    }
}

impl FitParameters {
    pub const NAMES: [&'static str; 4] = [
        "energyOffset",
        "verticalOffset",
        "resolution",
        "heightAnchor",
    ];

    pub fn as_array(&self) -> [&FitParameter; 4] {
        [
            &self.energy_offset,
            &self.vertical_offset,
            &self.resolution,
            &self.height_anchor,
        ]
    }

    fn as_array_mut(&mut self) -> [&mut FitParameter; 4] {
        [
            &mut self.energy_offset,
            &mut self.vertical_offset,
            &mut self.resolution,
            &mut self.height_anchor,
        ]
    }

    pub fn free_count(&self) -> usize {
        self.as_array().iter().filter(|parameter| parameter.free).count()
    }

    pub fn free_values(&self) -> Vec<f64> {
        self.as_array()
            .iter()
            .filter(|parameter| parameter.free)
            .map(|parameter| parameter.value)
            .collect()
    }

    /// Copy with the free parameters replaced (in declaration order) and
    /// clamped into their bounds.
    pub fn with_free_values(&self, values: &[f64]) -> Self {
        let mut next = *self;
        let mut values = values.iter();
        for parameter in next.as_array_mut() {
            if !parameter.free {
                continue;
            }
            if let Some(value) = values.next() {
                parameter.value = parameter.clamp(*value);
            }
        }
        next
    }

    pub fn clamped(&self) -> Self {
        let mut next = *self;
        for parameter in next.as_array_mut() {
            parameter.value = parameter.clamp(parameter.value);
        }
        next
    }
}

/// Residuals of a fixed line set against one experiment. Holds no state that
/// changes between evaluations.
#[derive(Debug, Clone, Copy)]
pub struct FitHarness<'a> {
    lines: &'a LineSet,
    experiment: &'a ExperimentalSpectrum,
    shape: LineShape,
    normalization: NormalizationMode,
}

impl<'a> FitHarness<'a> {
    pub fn new(
        lines: &'a LineSet,
        experiment: &'a ExperimentalSpectrum,
        shape: LineShape,
        normalization: NormalizationMode,
    ) -> Self {
        Self {
            lines,
            experiment,
            shape,
            normalization,
        }
    }

    pub fn experiment(&self) -> &ExperimentalSpectrum {
        self.experiment
    }

    /// Model evaluated on the experimental axis.
    pub fn model(&self, parameters: &FitParameters) -> Vec<f64> {
        let settings = RenderSettings {
            shape: self.shape,
            resolution: parameters.resolution.value.max(0.0),
            energy_offset: parameters.energy_offset.value,
        };
        let mut total = render_total(self.lines, &self.experiment.x, &settings);
        if self.normalization == NormalizationMode::UnitMax {
            scale_to_unit_max(&mut total);
        }
        total
            .iter()
            .map(|value| {
                parameters.height_anchor.value * value + parameters.vertical_offset.value
            })
            .collect()
    }

    /// Experimental intensities and uncertainties as compared against the
    /// model.
    fn target(&self) -> (Vec<f64>, Vec<f64>) {
        let mut y = self.experiment.y.clone();
        let mut sigma = self.experiment.sigma.clone();
        if self.normalization == NormalizationMode::UnitMax {
            let scale = scale_to_unit_max(&mut y);
            for value in &mut sigma {
                *value *= scale;
            }
        }
        (y, sigma)
    }

    /// Signed residuals `model - experiment`.
    pub fn residuals(&self, parameters: &FitParameters) -> Vec<f64> {
        let (target, _) = self.target();
        self.model(parameters)
            .iter()
            .zip(&target)
            .map(|(model, measured)| model - measured)
            .collect()
    }

    /// Residuals divided by their uncertainties.
    pub fn weighted_residuals(&self, parameters: &FitParameters) -> Vec<f64> {
        let (target, sigma) = self.target();
        self.model(parameters)
            .iter()
            .zip(target.iter().zip(&sigma))
            .map(|(model, (measured, sigma))| (model - measured) / sigma)
            .collect()
    }

    pub fn check_degrees_of_freedom(&self, free: usize) -> Result<usize, FitError> {
        let points = self.experiment.len();
        if points <= free {
            return Err(FitError::InsufficientDegreesOfFreedom { points, free });
        }
        Ok(points - free)
    }

    /// Reduced chi-square `sum(r^2 / sigma^2) / (N - n_free)`.
    pub fn chi_square(&self, parameters: &FitParameters) -> Result<f64, FitError> {
        let dof = self.check_degrees_of_freedom(parameters.free_count())?;
        let weighted = self.weighted_residuals(parameters);
        Ok(stable_sum_by(weighted.iter(), |value| value * value) / dof as f64)
    }
}

/// Divide by the largest value when it is positive; returns the factor applied.
fn scale_to_unit_max(values: &mut [f64]) -> f64 {
    match finite_max(values) {
        Some(max) if max > 0.0 => {
            let scale = 1.0 / max;
            for value in values.iter_mut() {
                *value *= scale;
            }
            scale
        }
        _ => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::{ExperimentalSpectrum, FitError, FitHarness, FitParameter, FitParameters};
    use crate::domain::{LineCategory, NormalizationMode, SimError};
    use crate::modules::profile::{LineGroup, LineSet};
    use crate::numerics::LineShape;

    fn line_set() -> LineSet {
        let mut group = LineGroup::new(LineCategory::Diagram, "KL3", None, None);
        group.lines.push(8047.8, 1.0, 2.5);
        group.lines.push(8027.8, 0.5, 2.6);
        LineSet {
            groups: vec![group],
            bad_selections: Vec::new(),
        }
    }

    fn axis() -> Vec<f64> {
        (0..81).map(|index| 8020.0 + 0.5 * index as f64).collect()
    }

    #[test]
    fn residuals_vanish_at_generating_parameters_and_are_repeatable() {
        let lines = line_set();
        let truth = FitParameters {
            energy_offset: FitParameter::free(0.4, None, None),
            vertical_offset: FitParameter::free(0.01, None, None),
            resolution: FitParameter::free(1.2, Some(0.0), None),
            height_anchor: FitParameter::free(3.0, Some(0.0), None),
        };
        let blank = ExperimentalSpectrum::new(axis(), vec![0.0; 81], None).expect("blank axis");
        let model = FitHarness::new(&lines, &blank, LineShape::Gaussian, NormalizationMode::None)
            .model(&truth);

        let experiment = ExperimentalSpectrum::new(axis(), model, None).expect("experiment");
        let harness =
            FitHarness::new(&lines, &experiment, LineShape::Gaussian, NormalizationMode::None);
        let first = harness.residuals(&truth);
        assert!(first.iter().all(|value| value.abs() <= 1.0e-12));
        assert_eq!(first, harness.residuals(&truth));
        assert!(harness.chi_square(&truth).expect("chi square") <= 1.0e-20);

        let shifted = FitParameters {
            energy_offset: FitParameter::free(1.4, None, None),
            ..truth
        };
        assert!(harness.chi_square(&shifted).expect("chi square") > 1.0e-6);
    }

    #[test]
    fn unit_max_normalisation_compares_shapes() {
        let lines = line_set();
        let x = axis();
        let blank = ExperimentalSpectrum::new(x.clone(), vec![0.0; x.len()], None).expect("blank axis");
        let unit = FitParameters {
            vertical_offset: FitParameter::fixed(0.0),
            height_anchor: FitParameter::fixed(1.0),
            ..FitParameters::default()
        };
        let model = FitHarness::new(&lines, &blank, LineShape::Voigt, NormalizationMode::None)
            .model(&unit);
        let scaled: Vec<f64> = model.iter().map(|value| 250.0 * value).collect();

        let experiment = ExperimentalSpectrum::new(x, scaled, None).expect("experiment");
        let harness =
            FitHarness::new(&lines, &experiment, LineShape::Voigt, NormalizationMode::UnitMax);
        assert!(
            harness
                .residuals(&unit)
                .iter()
                .all(|value| value.abs() <= 1.0e-12)
        );
    }

    #[test]
    fn chi_square_needs_more_points_than_free_parameters() {
        let lines = line_set();
        let experiment =
            ExperimentalSpectrum::new(vec![1.0, 2.0, 3.0], vec![0.0; 3], None).expect("experiment");
        let harness =
            FitHarness::new(&lines, &experiment, LineShape::Gaussian, NormalizationMode::None);
        let error = harness
            .chi_square(&FitParameters::default())
            .expect_err("dof");
        assert_eq!(
            error,
            FitError::InsufficientDegreesOfFreedom { points: 3, free: 4 }
        );
        assert_eq!(SimError::from(error).placeholder(), "RUN.FIT_DOF");
    }

    #[test]
    fn experiment_columns_parse_with_default_sigma() {
        let experiment = ExperimentalSpectrum::parse_columns(
            "# energy counts sigma\n8040.0 4.0\n8041.0 16.0 2.0\nbad row\n8042.0 0.25\n",
        )
        .expect("experiment");
        assert_eq!(experiment.x, vec![8040.0, 8041.0, 8042.0]);
        assert_eq!(experiment.sigma, vec![2.0, 2.0, 1.0]);

        let error = ExperimentalSpectrum::parse_columns("# nothing\n").expect_err("empty");
        assert_eq!(SimError::from(error).placeholder(), "INPUT.EXPERIMENT");

        let error = ExperimentalSpectrum::new(vec![1.0], vec![1.0], Some(vec![0.0]))
            .expect_err("sigma");
        assert!(matches!(error, FitError::NonPositiveSigma { index: 0, .. }));
    }

    #[test]
    fn free_values_round_trip_through_bounds() {
        let parameters = FitParameters {
            vertical_offset: FitParameter::fixed(0.5),
            ..FitParameters::default()
        };
        assert_eq!(parameters.free_count(), 3);
        assert_eq!(parameters.free_values(), vec![0.0, 1.0, 1.0]);

        let next = parameters.with_free_values(&[80.0, -2.0, 4.0]);
        assert_eq!(next.energy_offset.value, 50.0);
        assert_eq!(next.vertical_offset.value, 0.5);
        assert_eq!(next.resolution.value, 0.0);
        assert_eq!(next.height_anchor.value, 4.0);
    }
}
