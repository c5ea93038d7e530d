#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimpsonInput<'a> {
    pub samples: &'a [f64],
    pub step: f64,
}

impl<'a> SimpsonInput<'a> {
    pub fn new(samples: &'a [f64], step: f64) -> Self {
        Self { samples, step }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IntegrationError {
    #[error("simpson integration requires at least 3 samples, got {actual}")]
    InsufficientPoints { actual: usize },
    #[error("simpson integration requires an odd sample count, got {actual}")]
    EvenSampleCount { actual: usize },
    #[error("simpson step must be finite and > 0, got {value}")]
    InvalidStep { value: f64 },
    #[error("integrand must be finite, index {index} got {value}")]
    NonFiniteSample { index: usize, value: f64 },
    #[error("integration bounds must be finite with start < end, got [{start}, {end}]")]
    InvalidBounds { start: f64, end: f64 },
}

/// Composite Simpson rule on uniformly spaced samples:
/// `h/3 * (f0 + 4 f1 + 2 f2 + ... + 4 f(n-2) + f(n-1))`.
pub fn integrate_simpson(input: SimpsonInput<'_>) -> Result<f64, IntegrationError> {
    validate_input(input)?;

    let last = input.samples.len() - 1;
    let mut odd = 0.0;
    let mut even = 0.0;
    for (index, value) in input.samples.iter().copied().enumerate() {
        if index == 0 || index == last {
            continue;
        }
        if index % 2 == 1 {
            odd += value;
        } else {
            even += value;
        }
    }

    let ends = input.samples[0] + input.samples[last];
    Ok(input.step / 3.0 * (ends + 4.0 * odd + 2.0 * even))
}

/// Sample `integrand` at `points` uniform nodes over `[start, end]` and
/// integrate with [`integrate_simpson`].
pub fn integrate_simpson_fn<F>(
    integrand: F,
    start: f64,
    end: f64,
    points: usize,
) -> Result<f64, IntegrationError>
where
    F: Fn(f64) -> f64,
{
    if !start.is_finite() || !end.is_finite() || start >= end {
        return Err(IntegrationError::InvalidBounds { start, end });
    }
    if points < 3 {
        return Err(IntegrationError::InsufficientPoints { actual: points });
    }

    let step = (end - start) / (points - 1) as f64;
    let samples: Vec<f64> = (0..points)
        .map(|index| integrand(start + step * index as f64))
        .collect();
    integrate_simpson(SimpsonInput::new(&samples, step))
}

fn validate_input(input: SimpsonInput<'_>) -> Result<(), IntegrationError> {
    let count = input.samples.len();
    if count < 3 {
        return Err(IntegrationError::InsufficientPoints { actual: count });
    }
    if count % 2 == 0 {
        return Err(IntegrationError::EvenSampleCount { actual: count });
    }
    if !input.step.is_finite() || input.step <= 0.0 {
        return Err(IntegrationError::InvalidStep { value: input.step });
    }

    for (index, value) in input.samples.iter().copied().enumerate() {
        if !value.is_finite() {
            return Err(IntegrationError::NonFiniteSample { index, value });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{IntegrationError, SimpsonInput, integrate_simpson, integrate_simpson_fn};

    #[test]
    fn simpson_is_exact_for_cubics() {
        let actual = integrate_simpson_fn(|x| 2.0 * x * x * x - x + 4.0, -1.0, 2.0, 7)
            .expect("integration");
        let expected = 0.5 * (16.0 - 1.0) - 0.5 * (4.0 - 1.0) + 4.0 * 3.0;
        assert_scalar_close("cubic", expected, actual, 1.0e-12, 1.0e-12);
    }

    #[test]
    fn simpson_converges_on_gaussian_area() {
        let sigma = 0.7_f64;
        let actual = integrate_simpson_fn(
            |x| (-(x * x) / (2.0 * sigma * sigma)).exp(),
            -12.0,
            12.0,
            3001,
        )
        .expect("integration");
        let expected = sigma * (2.0 * std::f64::consts::PI).sqrt();
        assert_scalar_close("gaussian", expected, actual, 1.0e-10, 1.0e-10);
    }

    #[test]
    fn simpson_rejects_even_sample_counts() {
        let samples = [1.0, 2.0, 3.0, 4.0];
        let error = integrate_simpson(SimpsonInput::new(&samples, 0.5))
            .expect_err("even count should fail");
        assert_eq!(error, IntegrationError::EvenSampleCount { actual: 4 });
    }

    #[test]
    fn simpson_rejects_non_finite_integrand() {
        let samples = [1.0, f64::NAN, 3.0];
        let error = integrate_simpson(SimpsonInput::new(&samples, 0.5))
            .expect_err("nan should fail");
        assert!(matches!(
            error,
            IntegrationError::NonFiniteSample { index: 1, .. }
        ));
    }

    #[test]
    fn simpson_rejects_reversed_bounds() {
        let error = integrate_simpson_fn(|x| x, 1.0, 0.0, 5).expect_err("bounds");
        assert_eq!(
            error,
            IntegrationError::InvalidBounds {
                start: 1.0,
                end: 0.0
            }
        );
    }

    fn assert_scalar_close(label: &str, expected: f64, actual: f64, abs_tol: f64, rel_tol: f64) {
        let abs_diff = (actual - expected).abs();
        let rel_diff = abs_diff / expected.abs().max(1.0);
        assert!(
            abs_diff <= abs_tol || rel_diff <= rel_tol,
            "{label} expected={expected:.15e} actual={actual:.15e} abs_diff={abs_diff:.15e} rel_diff={rel_diff:.15e}"
        );
    }
}
