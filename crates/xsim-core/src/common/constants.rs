//! Numeric constants shared by the synthesis kernels.

/// `2 * sqrt(2 ln 2)`: Gaussian FWHM per standard deviation.
pub const FWHM_PER_SIGMA: f64 = 2.354_820_045_030_949_4_f64;
pub const SQRT_TWO_PI: f64 = 2.506_628_274_631_000_5_f64;
pub const INV_SQRT_PI: f64 = 0.564_189_583_547_756_3_f64;

/// Half-width of the overlap integration window, in level widths.
pub const OVERLAP_WINDOW_WIDTHS: f64 = 100.0;
pub const OVERLAP_SAMPLE_COUNT: usize = 3001;
/// Floor applied to level and beam widths before integrating.
pub const MIN_PROFILE_WIDTH: f64 = 1.0e-9;
/// Empirical width scaling for excitation-channel levels (`1/2` then `3/4`).
pub const EXCITATION_WIDTH_SCALE: f64 = 0.5 * 0.75;

pub const MAX_CASCADE_DEPTH: usize = 64;

#[cfg(test)]
mod tests {
    use super::{EXCITATION_WIDTH_SCALE, FWHM_PER_SIGMA, INV_SQRT_PI, SQRT_TWO_PI};
    use std::f64::consts::PI;

    #[test]
    fn constants_match_expected_relationships() {
        assert!((FWHM_PER_SIGMA - 2.0 * (2.0 * 2.0_f64.ln()).sqrt()).abs() <= 1.0e-15);
        assert!((SQRT_TWO_PI - (2.0 * PI).sqrt()).abs() <= 1.0e-15);
        assert!((INV_SQRT_PI - 1.0 / PI.sqrt()).abs() <= 1.0e-15);
        assert_eq!(EXCITATION_WIDTH_SCALE, 0.375);
    }
}
