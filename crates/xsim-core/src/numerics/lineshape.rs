use crate::common::constants::{FWHM_PER_SIGMA, INV_SQRT_PI, MIN_PROFILE_WIDTH, SQRT_TWO_PI};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, SQRT_2};

/// Area-normalised line-shape kernel used to broaden each transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineShape {
    Gaussian,
    Lorentzian,
    #[default]
    Voigt,
}

impl LineShape {
    /// Evaluate the kernel for a line of natural width `natural_width` seen
    /// with experimental resolution `resolution` (both FWHM, eV).
    ///
    /// - Lorentzian: FWHM `W + R`.
    /// - Gaussian: FWHM `sqrt(W^2 + R^2)`.
    /// - Voigt: Lorentzian `W` convolved with Gaussian `R`.
    pub fn evaluate(self, x: f64, center: f64, natural_width: f64, resolution: f64) -> f64 {
        let natural_width = natural_width.max(0.0);
        let resolution = resolution.max(0.0);
        match self {
            Self::Lorentzian => lorentzian(x, center, natural_width + resolution),
            Self::Gaussian => gaussian(x, center, natural_width.hypot(resolution)),
            Self::Voigt => {
                if resolution <= MIN_PROFILE_WIDTH {
                    lorentzian(x, center, natural_width)
                } else if natural_width <= MIN_PROFILE_WIDTH {
                    gaussian(x, center, resolution)
                } else {
                    voigt(x, center, natural_width, resolution)
                }
            }
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gaussian => "gaussian",
            Self::Lorentzian => "lorentzian",
            Self::Voigt => "voigt",
        }
    }
}

pub fn gaussian(x: f64, center: f64, fwhm: f64) -> f64 {
    let sigma = fwhm.max(MIN_PROFILE_WIDTH) / FWHM_PER_SIGMA;
    let offset = (x - center) / sigma;
    (-0.5 * offset * offset).exp() / (sigma * SQRT_TWO_PI)
}

pub fn lorentzian(x: f64, center: f64, fwhm: f64) -> f64 {
    let half_width = 0.5 * fwhm.max(MIN_PROFILE_WIDTH);
    let offset = x - center;
    half_width / (PI * (offset * offset + half_width * half_width))
}

pub fn voigt(x: f64, center: f64, lorentz_fwhm: f64, gauss_fwhm: f64) -> f64 {
    let sigma = gauss_fwhm.max(MIN_PROFILE_WIDTH) / FWHM_PER_SIGMA;
    let half_width = 0.5 * lorentz_fwhm.max(0.0);
    let scale = sigma * SQRT_2;
    let z = Complex64::new((x - center) / scale, half_width / scale);
    faddeeva(z).re / (sigma * SQRT_TWO_PI)
}

/// Faddeeva function `w(z) = exp(-z^2) erfc(-iz)` for `Im z >= 0`, Humlicek
/// W4 rational approximation (relative accuracy ~1e-4).
pub fn faddeeva(z: Complex64) -> Complex64 {
    let x = z.re;
    let y = z.im.max(0.0);
    let t = Complex64::new(y, -x);
    let s = x.abs() + y;
    let u = t * t;

    if s >= 15.0 {
        t * INV_SQRT_PI / (u + 0.5)
    } else if s >= 5.5 {
        t * (u * 0.564_189_6 + 1.410_474) / (u * (u + 3.0) + 0.75)
    } else if y >= 0.195 * x.abs() - 0.176 {
        let numerator =
            t * (t * (t * (t * 0.564_223_6 + 3.778_987) + 11.964_82) + 20.209_33) + 16.4955;
        let denominator = t
            * (t * (t * (t * (t + 6.699_398) + 21.692_74) + 39.271_21) + 38.823_63)
            + 16.4955;
        numerator / denominator
    } else {
        let numerator = t
            * (Complex64::new(36_183.31, 0.0)
                - u * (Complex64::new(3_321.990_5, 0.0)
                    - u * (Complex64::new(1_540.787, 0.0)
                        - u * (Complex64::new(219.031_3, 0.0)
                            - u * (Complex64::new(35.766_83, 0.0)
                                - u * (Complex64::new(1.320_522, 0.0) - u * 0.564_19))))));
        let denominator = Complex64::new(32_066.6, 0.0)
            - u * (Complex64::new(24_322.84, 0.0)
                - u * (Complex64::new(9_022.228, 0.0)
                    - u * (Complex64::new(2_186.181, 0.0)
                        - u * (Complex64::new(364.219_1, 0.0)
                            - u * (Complex64::new(61.570_37, 0.0)
                                - u * (Complex64::new(1.841_439, 0.0) - u))))));
        u.exp() - numerator / denominator
    }
}

#[cfg(test)]
mod tests {
    use super::{LineShape, faddeeva, gaussian, lorentzian, voigt};
    use crate::numerics::integrate_simpson_fn;
    use num_complex::Complex64;
    use std::f64::consts::PI;

    #[test]
    fn lorentzian_peak_matches_closed_form() {
        let width = 2.5;
        let peak = LineShape::Lorentzian.evaluate(8047.8, 8047.8, width, 0.0);
        assert_scalar_close("peak", 2.0 / (PI * width), peak, 1.0e-15, 1.0e-14);
    }

    #[test]
    fn gaussian_combines_natural_width_and_resolution_in_quadrature() {
        let combined = LineShape::Gaussian.evaluate(1.0, 0.0, 3.0, 4.0);
        assert_eq!(combined, gaussian(1.0, 0.0, 5.0));
    }

    #[test]
    fn kernels_are_area_normalised() {
        let kernels: [(&str, fn(f64) -> f64); 3] = [
            ("gaussian", |x| gaussian(x, 0.0, 1.2)),
            ("lorentzian", |x| lorentzian(x, 0.0, 1.0)),
            ("voigt", |x| voigt(x, 0.0, 1.0, 1.0)),
        ];
        for (label, kernel) in kernels {
            let area = integrate_simpson_fn(kernel, -500.0, 500.0, 200_001).expect("area");
            assert!(
                (area - 1.0).abs() <= 2.0e-3,
                "{} area should be close to 1, got {}",
                label,
                area
            );
        }
    }

    #[test]
    fn voigt_reduces_to_its_components() {
        let lorentz_limit = voigt(0.3, 0.0, 2.0, 1.0e-3);
        assert_scalar_close("lorentz", lorentzian(0.3, 0.0, 2.0), lorentz_limit, 0.0, 1.0e-3);

        let gauss_limit = voigt(0.4, 0.0, 1.0e-6, 1.5);
        assert_scalar_close("gauss", gaussian(0.4, 0.0, 1.5), gauss_limit, 0.0, 1.0e-3);
    }

    #[test]
    fn voigt_kernel_falls_back_when_a_component_vanishes() {
        assert_eq!(
            LineShape::Voigt.evaluate(0.5, 0.0, 1.0, 0.0),
            lorentzian(0.5, 0.0, 1.0)
        );
        assert_eq!(
            LineShape::Voigt.evaluate(0.5, 0.0, 0.0, 1.0),
            gaussian(0.5, 0.0, 1.0)
        );
    }

    #[test]
    fn faddeeva_matches_reference_values() {
        // w(i) = exp(1) erfc(1)
        let on_axis = faddeeva(Complex64::new(0.0, 1.0));
        assert_scalar_close("w(i)", 0.427_583_576_155_807, on_axis.re, 0.0, 5.0e-4);
        assert!(on_axis.im.abs() <= 1.0e-6);

        // w(x) on the real axis has real part exp(-x^2)
        let real_axis = faddeeva(Complex64::new(1.0, 0.0));
        assert_scalar_close("w(1)", (-1.0_f64).exp(), real_axis.re, 0.0, 1.0e-4);

        let far = faddeeva(Complex64::new(20.0, 1.0));
        let expected = Complex64::new(0.0, 1.0) / (PI.sqrt() * Complex64::new(20.0, 1.0));
        assert!((far - expected).norm() <= 1.0e-4);
    }

    fn assert_scalar_close(label: &str, expected: f64, actual: f64, abs_tol: f64, rel_tol: f64) {
        let abs_diff = (actual - expected).abs();
        let rel_diff = abs_diff / expected.abs().max(f64::MIN_POSITIVE);
        assert!(
            abs_diff <= abs_tol || rel_diff <= rel_tol,
            "{label} expected={expected:.15e} actual={actual:.15e} abs_diff={abs_diff:.15e} rel_diff={rel_diff:.15e}"
        );
    }
}
