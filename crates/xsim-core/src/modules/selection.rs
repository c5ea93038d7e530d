use crate::transitions::{CatalogEntry, LevelLabel, TransitionLine};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Strictness of shell matching between a catalog entry and a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchMode {
    /// Initial and final labels equal the entry's low and high levels.
    Exact,
    /// Exact initial label, final label containing the high level.
    #[default]
    ExactLowFuzzyHigh,
    /// Both labels contain the respective levels.
    Fuzzy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatchRule {
    pub mode: MatchMode,
    /// Also require the ejected shell to match the entry's Auger level.
    pub with_auger: bool,
}

impl MatchRule {
    pub fn new(mode: MatchMode, with_auger: bool) -> Self {
        Self { mode, with_auger }
    }
}

/// Allowed initial-level `2J` values; empty accepts everything.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JjRestriction {
    allowed: BTreeSet<u32>,
}

impl JjRestriction {
    pub fn new<I: IntoIterator<Item = u32>>(allowed: I) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
        }
    }

    pub fn is_active(&self) -> bool {
        !self.allowed.is_empty()
    }

    pub fn accepts(&self, two_j: u32) -> bool {
        self.allowed.is_empty() || self.allowed.contains(&two_j)
    }
}

pub fn line_matches(entry: &CatalogEntry, line: &TransitionLine, rule: MatchRule) -> bool {
    let initial = line.initial.label.as_str();
    let final_label = line.final_level.label.as_str();
    let shells_match = match rule.mode {
        MatchMode::Exact => initial == entry.low_level && final_label == entry.high_level,
        MatchMode::ExactLowFuzzyHigh => {
            initial == entry.low_level && final_label.contains(entry.high_level)
        }
        MatchMode::Fuzzy => {
            initial.contains(entry.low_level) && final_label.contains(entry.high_level)
        }
    };
    if !shells_match {
        return false;
    }

    match (rule.with_auger, entry.auger_level) {
        (true, Some(auger_level)) => match line.ejected_shell.as_deref().map(str::trim) {
            Some(ejected) if rule.mode == MatchMode::Exact => ejected == auger_level,
            Some(ejected) => ejected.contains(auger_level),
            None => false,
        },
        _ => true,
    }
}

/// Lines of `lines` matching `entry`, in table order.
pub fn select_lines<'a>(
    entry: &CatalogEntry,
    lines: &'a [TransitionLine],
    rule: MatchRule,
    restriction: &JjRestriction,
) -> Vec<&'a TransitionLine> {
    lines
        .iter()
        .filter(|line| restriction.accepts(line.initial.two_j))
        .filter(|line| line_matches(entry, line, rule))
        .collect()
}

/// Lines of one shake label.
#[derive(Debug, Clone, PartialEq)]
pub struct ShakeGroup<'a> {
    pub shake_label: String,
    pub lines: Vec<&'a TransitionLine>,
}

/// Partition satellite lines of `entry` by shake label. Each line joins the
/// first label (in label order) under which one of the naming patterns
/// matches; unmatched lines are dropped. Only non-empty groups are returned.
pub fn group_satellites<'a>(
    entry: &CatalogEntry,
    lines: &'a [TransitionLine],
    shake_labels: &[String],
    restriction: &JjRestriction,
) -> Vec<ShakeGroup<'a>> {
    group_by_shake_label(entry, lines, shake_labels, restriction, |label| Some(label))
}

/// As [`group_satellites`], matching the hole part of shake-up labels
/// (`K1M5_4d -> K1M5`).
pub fn group_shake_up<'a>(
    entry: &CatalogEntry,
    lines: &'a [TransitionLine],
    shake_labels: &[String],
    restriction: &JjRestriction,
) -> Vec<ShakeGroup<'a>> {
    group_by_shake_label(entry, lines, shake_labels, restriction, |label| {
        LevelLabel::parse(label)
            .filter(|parsed| parsed.excited.is_some())
            .map(|parsed| parsed.hole_part)
    })
}

fn group_by_shake_label<'a, F>(
    entry: &CatalogEntry,
    lines: &'a [TransitionLine],
    shake_labels: &[String],
    restriction: &JjRestriction,
    hole_part: F,
) -> Vec<ShakeGroup<'a>>
where
    F: for<'l> Fn(&'l str) -> Option<&'l str>,
{
    let mut groups: Vec<ShakeGroup<'a>> = shake_labels
        .iter()
        .map(|label| ShakeGroup {
            shake_label: label.clone(),
            lines: Vec::new(),
        })
        .collect();

    for line in lines {
        if !restriction.accepts(line.initial.two_j) {
            continue;
        }
        let (Some(initial), Some(final_label)) = (
            hole_part(line.initial.label.as_str()),
            hole_part(line.final_level.label.as_str()),
        ) else {
            continue;
        };

        let position = shake_labels.iter().position(|shake| {
            shake_patterns(entry.low_level, entry.high_level, shake)
                .iter()
                .any(|(low, high)| initial.contains(low.as_str()) && final_label.contains(high.as_str()))
        });
        if let Some(index) = position {
            groups[index].lines.push(line);
        }
    }

    groups.retain(|group| !group.lines.is_empty());
    groups
}

/// `low+s / high+s`, `s+low / s+high`, `low+s / s+high`, `s+low / high+s`.
fn shake_patterns(low: &str, high: &str, shake: &str) -> [(String, String); 4] {
    let low_then = format!("{}{}", low, shake);
    let then_low = format!("{}{}", shake, low);
    let high_then = format!("{}{}", high, shake);
    let then_high = format!("{}{}", shake, high);
    [
        (low_then.clone(), high_then.clone()),
        (then_low.clone(), then_high.clone()),
        (low_then, then_high),
        (then_low, high_then),
    ]
}
