use crate::domain::{SimError, SimResult};
use crate::transitions::{LevelKey, LevelShape, TransitionLine};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ground-referenced formation energy and total width of one level.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct FormationLevel {
    pub energy: f64,
    pub width: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormationRow {
    pub label: String,
    pub two_j: u32,
    #[serde(default)]
    pub eigenstate: u32,
    pub energy: f64,
    pub width: f64,
}

impl FormationRow {
    pub fn key(&self) -> LevelKey {
        LevelKey::new(self.label.trim(), self.two_j, self.eigenstate)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormationRows {
    #[serde(default)]
    pub diagram: Vec<FormationRow>,
    #[serde(default)]
    pub auger: Vec<FormationRow>,
    #[serde(default)]
    pub satellite: Vec<FormationRow>,
    #[serde(default)]
    pub shake_up: Vec<FormationRow>,
}

pub type FormationTable = BTreeMap<LevelKey, FormationLevel>;

/// Formation energy / width tables, one per level family.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormationTables {
    pub diagram: FormationTable,
    pub auger: FormationTable,
    pub satellite: FormationTable,
    pub shake_up: FormationTable,
}

impl FormationTables {
    /// Later rows for the same key replace earlier ones.
    pub fn from_rows(rows: &FormationRows) -> Self {
        Self {
            diagram: table_from_rows(&rows.diagram),
            auger: table_from_rows(&rows.auger),
            satellite: table_from_rows(&rows.satellite),
            shake_up: table_from_rows(&rows.shake_up),
        }
    }

    pub fn table_for_shape(&self, shape: LevelShape) -> &FormationTable {
        match shape {
            LevelShape::Diagram => &self.diagram,
            LevelShape::Satellite => &self.satellite,
            LevelShape::ShakeUp => &self.shake_up,
        }
    }

    /// Formation data for the initial level of `line`, picking the table from
    /// the label shape. Two-hole labels that are absent as written are retried
    /// under `canonical_label`.
    pub fn level_for_line<F>(
        &self,
        line: &TransitionLine,
        canonical_label: F,
    ) -> SimResult<FormationLevel>
    where
        F: Fn(&LevelKey) -> Option<String>,
    {
        let key = &line.initial;
        let shape = key.shape().ok_or_else(|| {
            SimError::input_validation(
                "INPUT.LEVEL_LABEL",
                format!("line {} has an unrecognised level label {}", line.sequence, key),
            )
        })?;
        let table = self.table_for_shape(shape);

        if let Some(level) = table.get(key) {
            return Ok(*level);
        }
        if shape == LevelShape::Satellite
            && let Some(label) = canonical_label(key)
            && let Some(level) = table.get(&key.with_label(label))
        {
            return Ok(*level);
        }

        Err(SimError::input_validation(
            "INPUT.FORMATION_LEVEL",
            format!(
                "level {} of line {} is missing from the {} formation table",
                key,
                line.sequence,
                shape_name(shape)
            ),
        ))
    }
}

fn table_from_rows(rows: &[FormationRow]) -> FormationTable {
    rows.iter()
        .map(|row| {
            (
                row.key(),
                FormationLevel {
                    energy: row.energy,
                    width: row.width,
                },
            )
        })
        .collect()
}

fn shape_name(shape: LevelShape) -> &'static str {
    match shape {
        LevelShape::Diagram => "diagram",
        LevelShape::Satellite => "satellite",
        LevelShape::ShakeUp => "shake-up",
    }
}
