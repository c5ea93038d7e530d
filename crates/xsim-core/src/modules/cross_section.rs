use serde::{Deserialize, Serialize};
use std::f64::consts::E;

/// Ionisation cross section of an orbital as a function of its formation
/// (threshold) energy and the beam energy, in arbitrary relative units.
pub trait CrossSectionProvider {
    fn cross_section(&self, orbital: &str, formation_energy: f64, beam_energy: f64) -> f64;

    /// Whether the value depends on the formation energy. Constant providers
    /// are evaluated without a formation-table lookup.
    fn depends_on_energy(&self) -> bool {
        true
    }
}

/// Built-in cross-section models.
///
/// Both energy-dependent models are zero below threshold and scaled to a peak
/// of one: electron impact follows the Lotz form `ln(u)/u` (`u = E/P`, peak at
/// `u = e`), photoionisation falls as `u^-7/2` from threshold.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(tag = "model", rename_all = "camelCase")]
pub enum CrossSectionModel {
    Constant { value: f64 },
    ElectronImpact,
    Photoionization,
}

impl Default for CrossSectionModel {
    fn default() -> Self {
        Self::Constant { value: 1.0 }
    }
}

impl CrossSectionModel {
    pub fn is_constant(&self) -> bool {
        matches!(self, Self::Constant { .. })
    }
}

impl CrossSectionProvider for CrossSectionModel {
    fn depends_on_energy(&self) -> bool {
        !self.is_constant()
    }

    fn cross_section(&self, _orbital: &str, formation_energy: f64, beam_energy: f64) -> f64 {
        let ratio = || -> Option<f64> {
            if formation_energy <= 0.0 || !formation_energy.is_finite() || !beam_energy.is_finite() {
                return None;
            }
            Some(beam_energy / formation_energy)
        };

        match *self {
            Self::Constant { value } => value,
            Self::ElectronImpact => match ratio() {
                Some(u) if u > 1.0 => E * u.ln() / u,
                Some(_) => 0.0,
                None => 1.0,
            },
            Self::Photoionization => match ratio() {
                Some(u) if u >= 1.0 => u.powf(-3.5),
                Some(_) => 0.0,
                None => 1.0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CrossSectionModel, CrossSectionProvider};
    use std::f64::consts::E;

    #[test]
    fn electron_impact_peaks_at_e_times_threshold() {
        let model = CrossSectionModel::ElectronImpact;
        let threshold = 8979.0;
        let peak = model.cross_section("K1", threshold, E * threshold);
        assert!((peak - 1.0).abs() <= 1.0e-12);
        assert!(model.cross_section("K1", threshold, 2.0 * threshold) < peak);
        assert!(model.cross_section("K1", threshold, 4.0 * threshold) < peak);
        assert_eq!(model.cross_section("K1", threshold, 0.9 * threshold), 0.0);
        assert_eq!(model.cross_section("K1", threshold, threshold), 0.0);
    }

    #[test]
    fn photoionization_falls_from_threshold() {
        let model = CrossSectionModel::Photoionization;
        assert_eq!(model.cross_section("K1", 1000.0, 1000.0), 1.0);
        assert!((model.cross_section("K1", 1000.0, 2000.0) - 2.0_f64.powf(-3.5)).abs() <= 1.0e-15);
        assert_eq!(model.cross_section("K1", 1000.0, 999.0), 0.0);
    }

    #[test]
    fn constant_model_ignores_energies() {
        let model = CrossSectionModel::Constant { value: 0.25 };
        assert_eq!(model.cross_section("L3", 0.0, 0.0), 0.25);
        assert_eq!(CrossSectionModel::default(), CrossSectionModel::Constant { value: 1.0 });
    }

    #[test]
    fn models_deserialize_from_tagged_json() {
        let model: CrossSectionModel =
            serde_json::from_str(r#"{"model": "electronImpact"}"#).expect("model");
        assert_eq!(model, CrossSectionModel::ElectronImpact);
        let model: CrossSectionModel =
            serde_json::from_str(r#"{"model": "constant", "value": 2.0}"#).expect("model");
        assert_eq!(model, CrossSectionModel::Constant { value: 2.0 });
    }
}
