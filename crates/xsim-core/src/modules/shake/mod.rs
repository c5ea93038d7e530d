//! Shake-off and shake-up probabilities for spectator vacancies.
//!
//! Shake-off rows give the probability that an electron of a given orbital is
//! ejected during the primary ionisation; a `SUM` row carries the tabulated
//! total. Shake-up rows are additionally indexed by the principal quantum
//! number of the bound orbital the electron is promoted into, and are
//! interpolated in that index with one natural cubic spline per `(orbital, 2J)`.

mod model;

pub(crate) use model::canonical_two_hole_label;
pub use model::{ShakeModel, shell_order_pair};

use crate::common::shells::shell_label_from_orbital;
use crate::transitions::{LevelLabel, TransitionLine};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShakeRow {
    pub orbital: String,
    #[serde(default)]
    pub two_j: u32,
    pub probability: f64,
    #[serde(default)]
    pub is_sum: bool,
    /// Principal quantum number of the excited orbital; shake-up rows only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excited_n: Option<u32>,
}

impl ShakeRow {
    pub fn is_sum_row(&self) -> bool {
        self.is_sum || self.orbital.trim().eq_ignore_ascii_case("SUM")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShakeKey {
    pub orbital: String,
    pub two_j: u32,
}

impl ShakeKey {
    pub fn new(orbital: impl Into<String>, two_j: u32) -> Self {
        Self {
            orbital: orbital.into(),
            two_j,
        }
    }
}

impl Display for ShakeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/2J={}", self.orbital, self.two_j)
    }
}

/// Inputs of [`ShakeModel::build`].
#[derive(Debug, Clone, Copy)]
pub struct ShakeModelInput<'a> {
    pub shake_off: &'a [ShakeRow],
    pub shake_up: &'a [ShakeRow],
    /// Ordered shake-orbital labels.
    pub labels: &'a [String],
    /// Known shake-up lines; their excited orbitals fix where backfill goes.
    pub shake_up_lines: &'a [TransitionLine],
}

/// Orbital names in spectroscopic notation (`2p3/2`) become shell tokens
/// (`L3`); anything else is kept as written.
pub fn normalize_orbital(orbital: &str) -> String {
    shell_label_from_orbital(orbital).unwrap_or_else(|| orbital.trim().to_string())
}

/// Spline key and excited principal quantum number addressed by a shake-up
/// line: the spectator is the last hole of the initial level.
pub fn shake_up_query(line: &TransitionLine) -> Option<(ShakeKey, u32)> {
    let parsed = LevelLabel::parse(&line.initial.label)?;
    let principal = parsed.excited_principal()?;
    let spectator = parsed.spectator()?;
    Some((ShakeKey::new(spectator, line.initial.two_j), principal))
}
