pub mod integration;
pub mod lineshape;
pub mod linalg;
pub mod spline;

pub use integration::{IntegrationError, SimpsonInput, integrate_simpson, integrate_simpson_fn};
pub use lineshape::{LineShape, faddeeva, gaussian, lorentzian, voigt};
pub use linalg::{LinearSolveError, solve_dense};
pub use spline::{CubicSpline, SplineError};

fn kahan_add(sum: &mut f64, correction: &mut f64, value: f64) {
    let corrected = value - *correction;
    let next = *sum + corrected;
    *correction = (next - *sum) - corrected;
    *sum = next;
}

pub fn stable_sum(values: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut correction = 0.0;

    for &value in values {
        kahan_add(&mut sum, &mut correction, value);
    }

    sum
}

/// Sum of `f(item)` over an iterator with compensated accumulation.
pub fn stable_sum_by<I, F>(items: I, mut f: F) -> f64
where
    I: IntoIterator,
    F: FnMut(I::Item) -> f64,
{
    let mut sum = 0.0;
    let mut correction = 0.0;
    for item in items {
        kahan_add(&mut sum, &mut correction, f(item));
    }
    sum
}

pub fn linear_grid(start: f64, end: f64, count: usize) -> Option<Vec<f64>> {
    if count < 2 {
        return None;
    }

    let step = (end - start) / ((count - 1) as f64);
    let mut grid = Vec::with_capacity(count);
    for index in 0..count {
        grid.push(start + step * (index as f64));
    }

    if let Some(last) = grid.last_mut() {
        *last = end;
    }

    Some(grid)
}

/// Largest value of a slice, `None` for empty input or when every entry is NaN.
pub fn finite_max(values: &[f64]) -> Option<f64> {
    values
        .iter()
        .copied()
        .filter(|value| value.is_finite())
        .max_by(|lhs, rhs| lhs.total_cmp(rhs))
}
