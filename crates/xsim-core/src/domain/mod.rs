pub mod errors;

pub use errors::{SimError, SimErrorCategory, SimResult};

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Family a transition line belongs to. Doubles as the boost type selector of
/// the intensity compositor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineCategory {
    Diagram,
    Satellite,
    #[serde(rename = "shakeup")]
    ShakeUp,
    Auger,
}

impl LineCategory {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Diagram => "diagram",
            Self::Satellite => "satellite",
            Self::ShakeUp => "shakeup",
            Self::Auger => "auger",
        }
    }

    /// Cascade map consulted for this category. Shake-up lines reuse the
    /// satellite map.
    pub const fn cascade_category(self) -> CascadeCategory {
        match self {
            Self::Diagram => CascadeCategory::Diagram,
            Self::Auger => CascadeCategory::Auger,
            Self::Satellite | Self::ShakeUp => CascadeCategory::Satellite,
        }
    }

    /// Diagram and Auger lines start from a one-hole level whose population is
    /// depleted by shake processes.
    pub const fn is_depleted_by_shake(self) -> bool {
        matches!(self, Self::Diagram | Self::Auger)
    }
}

impl Display for LineCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

impl FromStr for LineCategory {
    type Err = SimError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "diagram" => Ok(Self::Diagram),
            "satellite" => Ok(Self::Satellite),
            "shakeup" | "shake-up" | "shake_up" => Ok(Self::ShakeUp),
            "auger" => Ok(Self::Auger),
            _ => Err(SimError::input_validation(
                "CONFIG.BOOST_TYPE",
                format!(
                    "unknown boost type '{}'; expected diagram, satellite, shakeup or auger",
                    value
                ),
            )),
        }
    }
}

/// Rate-table family for which a cascade boost map is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CascadeCategory {
    Diagram,
    Auger,
    Satellite,
}

impl CascadeCategory {
    pub const ALL: [CascadeCategory; 3] = [Self::Diagram, Self::Auger, Self::Satellite];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Diagram => "diagram",
            Self::Auger => "auger",
            Self::Satellite => "satellite",
        }
    }
}

impl Display for CascadeCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

impl FromStr for CascadeCategory {
    type Err = SimError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "diagram" => Ok(Self::Diagram),
            "auger" => Ok(Self::Auger),
            "satellite" => Ok(Self::Satellite),
            _ => Err(SimError::input_validation(
                "CONFIG.CASCADE_TYPE",
                format!(
                    "unknown cascade type '{}'; expected diagram, auger or satellite",
                    value
                ),
            )),
        }
    }
}

/// How per-channel rate tables are combined into one spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ChannelMode {
    /// Base tables only.
    #[default]
    Single,
    ChargeStates,
    Excitations,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NormalizationMode {
    #[default]
    None,
    /// Model and experiment are both scaled to a unit maximum before comparison.
    UnitMax,
}
