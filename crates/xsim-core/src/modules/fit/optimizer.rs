use super::{FitError, FitHarness, FitParameters};
use crate::numerics::{LinearSolveError, solve_dense, stable_sum_by};
use faer::Mat;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const MIN_DAMPING: f64 = 1.0e-12;
const MAX_DAMPING: f64 = 1.0e16;
const MIN_CURVATURE: f64 = 1.0e-12;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FitOptions {
    pub max_iterations: usize,
    /// Relative decrease of the weighted cost below which the fit stops.
    pub tolerance: f64,
    pub initial_damping: f64,
    /// Relative forward-difference step of the Jacobian.
    pub difference_step: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            tolerance: 1.0e-10,
            initial_damping: 1.0e-3,
            difference_step: 1.0e-6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FitOutcome {
    pub parameters: FitParameters,
    pub chi_square: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Minimise the weighted residuals of `harness` over the free parameters of
/// `initial`. Bounds are enforced by clamping every trial point.
pub fn fit_spectrum(
    harness: &FitHarness<'_>,
    initial: &FitParameters,
    options: &FitOptions,
) -> Result<FitOutcome, FitError> {
    let mut parameters = initial.clamped();
    let free = parameters.free_count();
    harness.check_degrees_of_freedom(free)?;

    let mut residual = harness.weighted_residuals(&parameters);
    let mut cost = sum_of_squares(&residual);
    let mut damping = options.initial_damping.max(MIN_DAMPING);
    let mut iterations = 0;
    let mut converged = free == 0 || cost == 0.0;

    while !converged && iterations < options.max_iterations {
        iterations += 1;
        let jacobian = forward_jacobian(harness, &parameters, &residual, options.difference_step);
        let (normal, gradient) = normal_equations(&jacobian, &residual, free);
        let rhs: Vec<f64> = gradient.iter().map(|value| -value).collect();

        let mut improved = false;
        while damping <= MAX_DAMPING {
            let mut damped = normal.clone();
            for index in 0..free {
                damped[(index, index)] += damping * normal[(index, index)].max(MIN_CURVATURE);
            }
            let step = match solve_dense(&damped, &rhs) {
                Ok(step) => step,
                Err(LinearSolveError::SingularMatrix { .. }) => {
                    damping *= 10.0;
                    continue;
                }
                Err(source) => return Err(FitError::Solve(source)),
            };

            let trial_values: Vec<f64> = parameters
                .free_values()
                .iter()
                .zip(&step)
                .map(|(value, delta)| value + delta)
                .collect();
            let trial = parameters.with_free_values(&trial_values);
            let trial_residual = harness.weighted_residuals(&trial);
            let trial_cost = sum_of_squares(&trial_residual);

            if trial_cost.is_finite() && trial_cost < cost {
                let decrease = cost - trial_cost;
                converged = decrease <= options.tolerance * cost || trial_cost == 0.0;
                parameters = trial;
                residual = trial_residual;
                cost = trial_cost;
                damping = (damping / 10.0).max(MIN_DAMPING);
                improved = true;
                break;
            }
            damping *= 10.0;
        }

        if !improved {
            // No damped step lowers the cost any more.
            debug!(iterations, cost, "fit stalled at maximum damping");
            converged = true;
        }
    }

    let chi_square = harness.chi_square(&parameters)?;
    info!(iterations, chi_square, converged, "spectrum fit finished");
    Ok(FitOutcome {
        parameters,
        chi_square,
        iterations,
        converged,
    })
}

fn sum_of_squares(values: &[f64]) -> f64 {
    stable_sum_by(values.iter(), |value| value * value)
}

/// Columns of `d residual / d parameter` for each free parameter. A step that
/// would leave the bounds is taken backwards instead.
fn forward_jacobian(
    harness: &FitHarness<'_>,
    parameters: &FitParameters,
    residual: &[f64],
    relative_step: f64,
) -> Vec<Vec<f64>> {
    let values = parameters.free_values();
    let mut columns = Vec::with_capacity(values.len());
    for index in 0..values.len() {
        let step = relative_step * values[index].abs().max(1.0);
        let mut shifted = values.clone();
        shifted[index] = values[index] + step;
        let mut trial = parameters.with_free_values(&shifted);
        if trial.free_values()[index] == values[index] {
            shifted[index] = values[index] - step;
            trial = parameters.with_free_values(&shifted);
        }

        let delta = trial.free_values()[index] - values[index];
        if delta == 0.0 {
            columns.push(vec![0.0; residual.len()]);
            continue;
        }
        let shifted_residual = harness.weighted_residuals(&trial);
        columns.push(
            shifted_residual
                .iter()
                .zip(residual)
                .map(|(shifted, base)| (shifted - base) / delta)
                .collect(),
        );
    }
    columns
}

/// `J^T J` and `J^T r` from Jacobian columns.
fn normal_equations(columns: &[Vec<f64>], residual: &[f64], free: usize) -> (Mat<f64>, Vec<f64>) {
    let mut normal = Mat::<f64>::zeros(free, free);
    let mut gradient = vec![0.0; free];
    for row in 0..free {
        gradient[row] = stable_sum_by(columns[row].iter().zip(residual), |(j, r)| j * r);
        for col in row..free {
            let value =
                stable_sum_by(columns[row].iter().zip(&columns[col]), |(lhs, rhs)| lhs * rhs);
            normal[(row, col)] = value;
            normal[(col, row)] = value;
        }
    }
    (normal, gradient)
}
