/// Natural cubic spline through `(knot, value)` pairs.
///
/// Evaluation outside `[first knot, last knot]` is an error rather than an
/// extrapolation. A single knot is allowed and only answers at that knot.
#[derive(Debug, Clone, PartialEq)]
pub struct CubicSpline {
    knots: Vec<f64>,
    values: Vec<f64>,
    second_derivatives: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SplineError {
    #[error("spline requires at least one knot")]
    Empty,
    #[error("spline input length mismatch: knots={knots}, values={values}")]
    LengthMismatch { knots: usize, values: usize },
    #[error("spline knots must be strictly increasing, index {index} has {current} after {previous}")]
    NonIncreasingKnots {
        index: usize,
        previous: f64,
        current: f64,
    },
    #[error("spline input must be finite, index {index} got {value}")]
    NonFiniteValue { index: usize, value: f64 },
    #[error("spline query {query} lies outside [{min}, {max}]")]
    OutOfRange { query: f64, min: f64, max: f64 },
}

impl CubicSpline {
    pub fn natural(knots: &[f64], values: &[f64]) -> Result<Self, SplineError> {
        validate_input(knots, values)?;

        let count = knots.len();
        let mut second_derivatives = vec![0.0; count];
        if count > 2 {
            // Tridiagonal system for the interior second derivatives, natural
            // boundary conditions pin both ends at zero.
            let interior = count - 2;
            let mut diagonal = vec![0.0; interior];
            let mut upper = vec![0.0; interior];
            let mut rhs = vec![0.0; interior];
            for row in 0..interior {
                let index = row + 1;
                let h_left = knots[index] - knots[index - 1];
                let h_right = knots[index + 1] - knots[index];
                diagonal[row] = 2.0 * (h_left + h_right);
                upper[row] = h_right;
                rhs[row] = 6.0
                    * ((values[index + 1] - values[index]) / h_right
                        - (values[index] - values[index - 1]) / h_left);
            }

            for row in 1..interior {
                let lower = knots[row + 1] - knots[row];
                let factor = lower / diagonal[row - 1];
                diagonal[row] -= factor * upper[row - 1];
                rhs[row] -= factor * rhs[row - 1];
            }

            let mut solution = vec![0.0; interior];
            for row in (0..interior).rev() {
                let carried = if row + 1 < interior {
                    upper[row] * solution[row + 1]
                } else {
                    0.0
                };
                solution[row] = (rhs[row] - carried) / diagonal[row];
            }
            second_derivatives[1..count - 1].copy_from_slice(&solution);
        }

        Ok(Self {
            knots: knots.to_vec(),
            values: values.to_vec(),
            second_derivatives,
        })
    }

    pub fn domain(&self) -> (f64, f64) {
        (self.knots[0], self.knots[self.knots.len() - 1])
    }

    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn evaluate(&self, query: f64) -> Result<f64, SplineError> {
        let (min, max) = self.domain();
        if !query.is_finite() || query < min || query > max {
            return Err(SplineError::OutOfRange { query, min, max });
        }
        if self.knots.len() == 1 {
            return Ok(self.values[0]);
        }

        let upper = match self.knots.binary_search_by(|knot| knot.total_cmp(&query)) {
            Ok(index) => return Ok(self.values[index]),
            Err(upper) => upper,
        };
        let lower = upper - 1;
        let step = self.knots[upper] - self.knots[lower];
        let a = (self.knots[upper] - query) / step;
        let b = (query - self.knots[lower]) / step;
        let curvature = ((a * a * a - a) * self.second_derivatives[lower]
            + (b * b * b - b) * self.second_derivatives[upper])
            * step
            * step
            / 6.0;

        Ok(a * self.values[lower] + b * self.values[upper] + curvature)
    }
}

fn validate_input(knots: &[f64], values: &[f64]) -> Result<(), SplineError> {
    if knots.is_empty() {
        return Err(SplineError::Empty);
    }
    if knots.len() != values.len() {
        return Err(SplineError::LengthMismatch {
            knots: knots.len(),
            values: values.len(),
        });
    }

    for (index, (knot, value)) in knots.iter().copied().zip(values.iter().copied()).enumerate() {
        if !knot.is_finite() {
            return Err(SplineError::NonFiniteValue { index, value: knot });
        }
        if !value.is_finite() {
            return Err(SplineError::NonFiniteValue { index, value });
        }
        if index > 0 && knot <= knots[index - 1] {
            return Err(SplineError::NonIncreasingKnots {
                index,
                previous: knots[index - 1],
                current: knot,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{CubicSpline, SplineError};

    #[test]
    fn spline_interpolates_knots_exactly() {
        let knots = [2.0, 3.0, 4.0, 5.0, 6.0];
        let values = [0.12, 0.05, 0.02, 0.011, 0.007];
        let spline = CubicSpline::natural(&knots, &values).expect("spline");
        for (knot, value) in knots.iter().zip(values) {
            assert_eq!(spline.evaluate(*knot).expect("knot"), value);
        }
    }

    #[test]
    fn spline_reproduces_straight_lines() {
        let knots = [0.0, 1.0, 2.5, 4.0];
        let values: Vec<f64> = knots.iter().map(|x| 3.0 * x - 1.0).collect();
        let spline = CubicSpline::natural(&knots, &values).expect("spline");
        for query in [0.25, 1.7, 3.9] {
            let actual = spline.evaluate(query).expect("in range");
            assert!((actual - (3.0 * query - 1.0)).abs() <= 1.0e-12);
        }
    }

    #[test]
    fn spline_matches_smooth_function_between_knots() {
        let knots: Vec<f64> = (0..=20).map(|index| index as f64 * 0.25).collect();
        let values: Vec<f64> = knots.iter().map(|x| x.sin()).collect();
        let spline = CubicSpline::natural(&knots, &values).expect("spline");
        let actual = spline.evaluate(2.3).expect("in range");
        assert!((actual - 2.3_f64.sin()).abs() <= 1.0e-3);
    }

    #[test]
    fn spline_queries_outside_domain_fail() {
        let spline = CubicSpline::natural(&[3.0, 4.0], &[0.1, 0.2]).expect("spline");
        assert_eq!(
            spline.evaluate(5.0),
            Err(SplineError::OutOfRange {
                query: 5.0,
                min: 3.0,
                max: 4.0
            })
        );
        assert!((spline.evaluate(3.5).expect("in range") - 0.15).abs() <= 1.0e-15);
    }

    #[test]
    fn single_knot_spline_answers_only_at_its_knot() {
        let spline = CubicSpline::natural(&[4.0], &[0.3]).expect("spline");
        assert_eq!(spline.evaluate(4.0), Ok(0.3));
        assert!(spline.evaluate(4.5).is_err());
    }

    #[test]
    fn spline_rejects_unsorted_knots() {
        let error = CubicSpline::natural(&[1.0, 3.0, 2.0], &[0.0, 0.0, 0.0])
            .expect_err("unsorted knots");
        assert!(matches!(error, SplineError::NonIncreasingKnots { index: 2, .. }));
    }
}
