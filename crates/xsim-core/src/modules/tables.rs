use crate::domain::{ChannelMode, LineCategory};
use crate::modules::formation::{FormationRows, FormationTables};
use crate::transitions::{RowKind, TransitionLine, parse_rate_rows};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Transition lines of one element (or one charge state / excitation channel).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateTables {
    pub diagram: Vec<TransitionLine>,
    pub satellite: Vec<TransitionLine>,
    pub shake_up: Vec<TransitionLine>,
    pub auger: Vec<TransitionLine>,
}

impl RateTables {
    pub fn lines(&self, category: LineCategory) -> &[TransitionLine] {
        match category {
            LineCategory::Diagram => &self.diagram,
            LineCategory::Satellite => &self.satellite,
            LineCategory::ShakeUp => &self.shake_up,
            LineCategory::Auger => &self.auger,
        }
    }

    pub fn line_count(&self) -> usize {
        self.diagram.len() + self.satellite.len() + self.shake_up.len() + self.auger.len()
    }
}

/// One rate table as it appears in an inputs file: structured lines,
/// whitespace-separated rows, or both (rows are appended after lines).
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateTableSource {
    #[serde(default)]
    pub lines: Vec<TransitionLine>,
    #[serde(default)]
    pub rows: Vec<String>,
}

impl RateTableSource {
    pub fn resolve(&self, kind: RowKind) -> Vec<TransitionLine> {
        let mut lines = self.lines.clone();
        lines.extend(parse_rate_rows(&self.rows.join("\n"), kind));
        lines
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateTableSources {
    #[serde(default)]
    pub diagram: RateTableSource,
    #[serde(default)]
    pub satellite: RateTableSource,
    #[serde(default)]
    pub shake_up: RateTableSource,
    #[serde(default)]
    pub auger: RateTableSource,
}

impl RateTableSources {
    pub fn resolve(&self) -> RateTables {
        RateTables {
            diagram: self.diagram.resolve(RowKind::Radiative),
            satellite: self.satellite.resolve(RowKind::Radiative),
            shake_up: self.shake_up.resolve(RowKind::Radiative),
            auger: self.auger.resolve(RowKind::Auger),
        }
    }
}

/// Rate tables of a named charge state or excitation channel. Channels may
/// carry their own formation tables; otherwise the element's are used.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSource {
    #[serde(flatten)]
    pub tables: RateTableSources,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formation: Option<FormationRows>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelTables {
    pub tables: RateTables,
    pub formation: Option<FormationTables>,
}

impl ChannelTables {
    pub fn from_source(source: &ChannelSource) -> Self {
        Self {
            tables: source.tables.resolve(),
            formation: source.formation.as_ref().map(FormationTables::from_rows),
        }
    }
}

/// Every table set of an element load, keyed by channel name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelSet {
    pub base: RateTables,
    pub charge_states: BTreeMap<String, ChannelTables>,
    pub excitations: BTreeMap<String, ChannelTables>,
}

impl ChannelSet {
    /// Tables for a named channel, `None` when the channel is unknown. `Single`
    /// always answers with the base tables.
    pub fn channel(&self, mode: ChannelMode, name: Option<&str>) -> Option<&RateTables> {
        match (mode, name) {
            (ChannelMode::Single, _) | (_, None) => Some(&self.base),
            (ChannelMode::ChargeStates, Some(name)) => {
                self.charge_states.get(name).map(|channel| &channel.tables)
            }
            (ChannelMode::Excitations, Some(name)) => {
                self.excitations.get(name).map(|channel| &channel.tables)
            }
        }
    }

    pub fn channel_formation(&self, mode: ChannelMode, name: &str) -> Option<&FormationTables> {
        let channels = match mode {
            ChannelMode::Single => return None,
            ChannelMode::ChargeStates => &self.charge_states,
            ChannelMode::Excitations => &self.excitations,
        };
        channels.get(name).and_then(|channel| channel.formation.as_ref())
    }

    pub fn channel_names(&self, mode: ChannelMode) -> Vec<&str> {
        match mode {
            ChannelMode::Single => Vec::new(),
            ChannelMode::ChargeStates => self.charge_states.keys().map(String::as_str).collect(),
            ChannelMode::Excitations => self.excitations.keys().map(String::as_str).collect(),
        }
    }
}
