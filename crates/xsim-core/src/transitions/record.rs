use crate::common::shells::{parse_excited_orbital, split_shell_tokens};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub const RADIATIVE_FIELD_COUNT: usize = 15;
pub const AUGER_FIELD_COUNT: usize = 16;

/// Identity of one atomic level: hole configuration, `2J` and eigenstate index.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelKey {
    pub label: String,
    pub two_j: u32,
    #[serde(default)]
    pub eigenstate: u32,
}

impl LevelKey {
    pub fn new(label: impl Into<String>, two_j: u32, eigenstate: u32) -> Self {
        Self {
            label: label.into(),
            two_j,
            eigenstate,
        }
    }

    pub fn parsed_label(&self) -> Option<LevelLabel<'_>> {
        LevelLabel::parse(&self.label)
    }

    pub fn shape(&self) -> Option<LevelShape> {
        self.parsed_label().map(|parsed| parsed.shape())
    }

    /// Same level under a different hole label.
    pub fn with_label(&self, label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            two_j: self.two_j,
            eigenstate: self.eigenstate,
        }
    }
}

impl Display for LevelKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(2J={}, #{})", self.label, self.two_j, self.eigenstate)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LevelShape {
    /// One hole.
    Diagram,
    /// Two or more holes.
    Satellite,
    /// Holes plus a spectator excited into a bound orbital.
    ShakeUp,
}

/// A level label split into its hole tokens and optional excited orbital, e.g.
/// `K1M5_5d -> holes [K1, M5], excited (5, 2)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelLabel<'a> {
    pub holes: Vec<&'a str>,
    pub hole_part: &'a str,
    pub excited: Option<(u32, u32)>,
}

impl<'a> LevelLabel<'a> {
    pub fn parse(label: &'a str) -> Option<Self> {
        let label = label.trim();
        let (hole_part, excited) = match label.split_once('_') {
            Some((holes, orbital)) => (holes, Some(parse_excited_orbital(orbital)?)),
            None => (label, None),
        };
        let holes = split_shell_tokens(hole_part)?;
        if excited.is_some() && holes.len() < 2 {
            return None;
        }

        Some(Self {
            holes,
            hole_part,
            excited,
        })
    }

    pub fn shape(&self) -> LevelShape {
        if self.excited.is_some() {
            LevelShape::ShakeUp
        } else if self.holes.len() == 1 {
            LevelShape::Diagram
        } else {
            LevelShape::Satellite
        }
    }

    /// Shell of the spectator hole: the last hole token.
    pub fn spectator(&self) -> Option<&'a str> {
        if self.holes.len() < 2 {
            return None;
        }
        self.holes.last().copied()
    }

    pub fn excited_principal(&self) -> Option<u32> {
        self.excited.map(|(principal, _)| principal)
    }
}

/// Column layout of a tokenized rate-table row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Radiative,
    Auger,
}

impl RowKind {
    pub const fn field_count(self) -> usize {
        match self {
            Self::Radiative => RADIATIVE_FIELD_COUNT,
            Self::Auger => AUGER_FIELD_COUNT,
        }
    }
}

/// One computed atomic transition.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionLine {
    #[serde(default)]
    pub sequence: u32,
    pub initial: LevelKey,
    #[serde(rename = "final")]
    pub final_level: LevelKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ejected_shell: Option<String>,
    pub energy: f64,
    #[serde(default)]
    pub branching_ratio: f64,
    #[serde(default)]
    pub radiative_yield: f64,
    pub intensity: f64,
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub radiative_width: f64,
    #[serde(default)]
    pub auger_width: f64,
    #[serde(default)]
    pub total_width: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlap_scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mix_fraction: Option<f64>,
}

impl TransitionLine {
    /// Build a line from whitespace-separated columns.
    ///
    /// Radiative rows: `seq ilabel i2J ieig flabel f2J feig energy br ry
    /// intensity weight rwidth awidth twidth`. Auger rows carry the ejected
    /// shell right after `flabel`. A malformed numeric field falls back to zero;
    /// a row with too few columns yields `None`.
    pub fn from_fields(fields: &[&str], kind: RowKind) -> Option<Self> {
        if fields.len() < kind.field_count() {
            return None;
        }

        let (ejected_shell, rest) = match kind {
            RowKind::Radiative => (None, &fields[5..]),
            RowKind::Auger => (Some(fields[5].trim().to_string()), &fields[6..]),
        };

        Some(Self {
            sequence: parse_u32_or(fields[0], 0),
            initial: LevelKey::new(
                fields[1].trim(),
                parse_u32_or(fields[2], 0),
                parse_u32_or(fields[3], 0),
            ),
            final_level: LevelKey::new(
                fields[4].trim(),
                parse_u32_or(rest[0], 0),
                parse_u32_or(rest[1], 0),
            ),
            ejected_shell,
            energy: parse_f64_or(rest[2], 0.0),
            branching_ratio: parse_f64_or(rest[3], 0.0),
            radiative_yield: parse_f64_or(rest[4], 0.0),
            intensity: parse_f64_or(rest[5], 0.0),
            weight: parse_f64_or(rest[6], 0.0),
            radiative_width: parse_f64_or(rest[7], 0.0),
            auger_width: parse_f64_or(rest[8], 0.0),
            total_width: parse_f64_or(rest[9], 0.0),
            overlap_scale: None,
            mix_fraction: None,
        })
    }

    /// Level the decay lands in. For Auger lines the ejected shell adds a
    /// second hole to the final label.
    pub fn final_key(&self) -> LevelKey {
        match self.ejected_shell.as_deref().map(str::trim) {
            Some(ejected) if !ejected.is_empty() => self
                .final_level
                .with_label(format!("{}{}", self.final_level.label, ejected)),
            _ => self.final_level.clone(),
        }
    }

    pub fn is_auger(&self) -> bool {
        self.ejected_shell
            .as_deref()
            .is_some_and(|shell| !shell.trim().is_empty())
    }

    /// Branching ratio with missing or non-finite values treated as zero.
    pub fn effective_branching_ratio(&self) -> f64 {
        if self.branching_ratio.is_finite() {
            self.branching_ratio
        } else {
            0.0
        }
    }
}

/// Tokenize rate-table text into lines. Blank lines, `#` comments and rows with
/// too few columns are skipped.
pub fn parse_rate_rows(source: &str, kind: RowKind) -> Vec<TransitionLine> {
    source
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            TransitionLine::from_fields(&fields, kind)
        })
        .collect()
}

pub fn parse_f64_or(token: &str, fallback: f64) -> f64 {
    let trimmed = token.trim_matches(|character: char| {
        character.is_whitespace() || matches!(character, ',' | ';' | '(' | ')')
    });
    if trimmed.is_empty() {
        return fallback;
    }
    let normalized = trimmed.replace(['D', 'd'], "E");
    match normalized.parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => fallback,
    }
}

pub fn parse_u32_or(token: &str, fallback: u32) -> u32 {
    token.trim().parse::<u32>().unwrap_or(fallback)
}
