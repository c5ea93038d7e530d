use super::{ShakeKey, ShakeModelInput, ShakeRow, normalize_orbital, shake_up_query};
use crate::common::shells::shell_info;
use crate::domain::{SimError, SimResult};
use crate::numerics::{CubicSpline, stable_sum, stable_sum_by};
use crate::transitions::LevelLabel;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Completed shake probabilities for one element load.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShakeModel {
    labels: Vec<String>,
    shake_off: BTreeMap<String, f64>,
    shake_off_sum: Option<f64>,
    missing_shake_off: f64,
    missing_count: usize,
    splines: BTreeMap<ShakeKey, CubicSpline>,
    shake_up_sums: BTreeMap<ShakeKey, f64>,
    backfill: BTreeMap<ShakeKey, f64>,
    greater: BTreeMap<String, BTreeSet<String>>,
    lesser: BTreeMap<String, BTreeSet<String>>,
}

impl ShakeModel {
    pub fn build(input: ShakeModelInput<'_>) -> SimResult<Self> {
        let (shake_off, shake_off_sum) = collect_shake_off(input.shake_off);
        let labels = ordered_labels(input.labels, input.shake_off);

        let missing_count = labels
            .iter()
            .filter(|label| !shake_off.contains_key(*label))
            .count();
        let explicit_total = stable_sum_by(shake_off.values(), |value| *value);
        let missing_shake_off = match shake_off_sum {
            Some(sum) if missing_count > 0 => (sum - explicit_total).max(0.0) / missing_count as f64,
            _ => 0.0,
        };

        let (tabulated, shake_up_sums) = collect_shake_up(input.shake_up);
        let mut splines = BTreeMap::new();
        for (key, values_by_n) in &tabulated {
            let knots: Vec<f64> = values_by_n.keys().map(|n| f64::from(*n)).collect();
            let values: Vec<f64> = values_by_n.values().copied().collect();
            let spline = CubicSpline::natural(&knots, &values).map_err(|source| {
                SimError::computation(
                    "RUN.SHAKE_SPLINE",
                    format!("failed to build shake-up spline for {}: {}", key, source),
                )
            })?;
            splines.insert(key.clone(), spline);
        }

        let mut known_principals: BTreeMap<ShakeKey, BTreeSet<u32>> = BTreeMap::new();
        for line in input.shake_up_lines {
            if let Some((key, principal)) = shake_up_query(line) {
                known_principals.entry(key).or_default().insert(principal);
            }
        }

        let mut backfill = BTreeMap::new();
        for (key, sum) in &shake_up_sums {
            let Some(principals) = known_principals.get(key) else {
                continue;
            };
            // Principals outside the spline range always answer 0, so the
            // shortfall is shared among the reachable ones only.
            let spline = splines.get(key);
            let reachable: Vec<f64> = principals
                .iter()
                .filter_map(|principal| match spline {
                    Some(spline) => spline
                        .evaluate(f64::from(*principal))
                        .ok()
                        .map(|value| value.max(0.0)),
                    None => Some(0.0),
                })
                .collect();
            if reachable.is_empty() {
                continue;
            }
            let covered = stable_sum(&reachable);
            let value = (sum - covered).max(0.0) / reachable.len() as f64;
            backfill.insert(key.clone(), value);
        }

        let (greater, lesser) = label_relations(&labels);

        debug!(
            labels = labels.len(),
            explicit_shake_off = shake_off.len(),
            missing_shake_off,
            splines = splines.len(),
            "built shake model"
        );

        Ok(Self {
            labels,
            shake_off,
            shake_off_sum,
            missing_shake_off,
            missing_count,
            splines,
            shake_up_sums,
            backfill,
            greater,
            lesser,
        })
    }

    /// Ordered shake-orbital labels.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn missing_shake_off(&self) -> f64 {
        self.missing_shake_off
    }

    pub fn missing_count(&self) -> usize {
        self.missing_count
    }

    pub fn explicit_shake_off(&self, label: &str) -> Option<f64> {
        self.shake_off.get(&normalize_orbital(label)).copied()
    }

    /// Shake-off probability for `label`: the tabulated value, or the missing
    /// backfill for labels without an explicit row.
    pub fn shake_off_probability(&self, label: &str) -> f64 {
        self.explicit_shake_off(label)
            .unwrap_or(self.missing_shake_off)
    }

    pub fn has_spline(&self, key: &ShakeKey) -> bool {
        self.splines.contains_key(key)
    }

    pub fn shake_up_backfill(&self, key: &ShakeKey) -> f64 {
        self.backfill.get(key).copied().unwrap_or(0.0)
    }

    /// Completed shake-up probability for promotion into principal quantum
    /// number `principal`. A query outside the tabulated range yields 0.
    pub fn shake_up_probability(&self, key: &ShakeKey, principal: u32) -> f64 {
        let backfill = self.shake_up_backfill(key);
        let Some(spline) = self.splines.get(key) else {
            return backfill;
        };
        match spline.evaluate(f64::from(principal)) {
            Ok(value) => value.max(0.0) + backfill,
            Err(error) => {
                debug!(%key, principal, %error, "shake-up spline lookup missed");
                0.0
            }
        }
    }

    /// Tabulated total for a shake-up key: its `SUM` row, else the sum of the
    /// tabulated values.
    pub fn shake_up_total(&self, key: &ShakeKey) -> f64 {
        if let Some(sum) = self.shake_up_sums.get(key) {
            return sum.max(0.0);
        }
        self.splines.get(key).map_or(0.0, |spline| {
            stable_sum_by(spline.values(), |value| value.max(0.0))
        })
    }

    /// Probability that the primary vacancy is accompanied by any shake
    /// process, used to deplete one-hole populations. Shake-up totals are
    /// averaged over the `2J` keys of each orbital.
    pub fn total_shake_probability(&self) -> f64 {
        let shake_off = self.shake_off_sum.unwrap_or_else(|| {
            stable_sum_by(self.shake_off.values(), |value| *value)
        });

        let mut per_orbital: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        let keys: BTreeSet<&ShakeKey> = self
            .splines
            .keys()
            .chain(self.shake_up_sums.keys())
            .collect();
        for key in keys {
            per_orbital
                .entry(key.orbital.as_str())
                .or_default()
                .push(self.shake_up_total(key));
        }
        let shake_up = stable_sum_by(per_orbital.values(), |totals| {
            stable_sum(totals) / totals.len() as f64
        });

        (shake_off.max(0.0) + shake_up).clamp(0.0, 1.0)
    }

    pub fn greater_than(&self, label: &str) -> Option<&BTreeSet<String>> {
        self.greater.get(label)
    }

    pub fn lesser_than(&self, label: &str) -> Option<&BTreeSet<String>> {
        self.lesser.get(label)
    }

    /// Order two hole labels consistently: shake-label order when both are
    /// known shake labels, otherwise shell order.
    pub fn canonical_pair<'a>(&self, first: &'a str, second: &'a str) -> (&'a str, &'a str) {
        if self
            .greater
            .get(first)
            .is_some_and(|set| set.contains(second))
        {
            (first, second)
        } else if self
            .lesser
            .get(first)
            .is_some_and(|set| set.contains(second))
        {
            (second, first)
        } else {
            shell_order_pair(first, second)
        }
    }

    /// Two-hole label rewritten in canonical order; `None` for other shapes.
    pub fn canonical_label(&self, label: &str) -> Option<String> {
        canonical_two_hole_label(label, |first, second| self.canonical_pair(first, second))
    }
}

/// Order two shell tokens by shell energy order, then lexically.
pub fn shell_order_pair<'a>(first: &'a str, second: &'a str) -> (&'a str, &'a str) {
    let ordering = match (shell_info(first), shell_info(second)) {
        (Some(lhs), Some(rhs)) => lhs.order_index().cmp(&rhs.order_index()),
        _ => Ordering::Equal,
    }
    .then_with(|| first.cmp(second));
    if ordering == Ordering::Greater {
        (second, first)
    } else {
        (first, second)
    }
}

pub(crate) fn canonical_two_hole_label<F>(label: &str, order: F) -> Option<String>
where
    F: for<'a> Fn(&'a str, &'a str) -> (&'a str, &'a str),
{
    let parsed = LevelLabel::parse(label)?;
    if parsed.excited.is_some() || parsed.holes.len() != 2 {
        return None;
    }
    let (first, second) = order(parsed.holes[0], parsed.holes[1]);
    Some(format!("{}{}", first, second))
}

fn collect_shake_off(rows: &[ShakeRow]) -> (BTreeMap<String, f64>, Option<f64>) {
    let mut explicit: BTreeMap<String, f64> = BTreeMap::new();
    let mut sum = None;
    for row in rows {
        if !row.probability.is_finite() {
            warn!(orbital = %row.orbital, "skipping non-finite shake-off probability");
            continue;
        }
        if row.is_sum_row() {
            sum = Some(sum.unwrap_or(0.0) + row.probability);
        } else {
            *explicit.entry(normalize_orbital(&row.orbital)).or_default() += row.probability;
        }
    }
    (explicit, sum)
}

type TabulatedShakeUp = BTreeMap<ShakeKey, BTreeMap<u32, f64>>;

fn collect_shake_up(rows: &[ShakeRow]) -> (TabulatedShakeUp, BTreeMap<ShakeKey, f64>) {
    let mut tabulated: TabulatedShakeUp = BTreeMap::new();
    let mut sums: BTreeMap<ShakeKey, f64> = BTreeMap::new();
    for row in rows {
        if !row.probability.is_finite() {
            warn!(orbital = %row.orbital, two_j = row.two_j, "skipping non-finite shake-up probability");
            continue;
        }
        let key = ShakeKey::new(normalize_orbital(&row.orbital), row.two_j);
        if row.is_sum_row() {
            *sums.entry(key).or_default() += row.probability;
            continue;
        }
        match row.excited_n {
            Some(principal) => {
                *tabulated
                    .entry(key)
                    .or_default()
                    .entry(principal)
                    .or_default() += row.probability;
            }
            None => warn!(%key, "shake-up row without an excited principal quantum number"),
        }
    }
    (tabulated, sums)
}

/// Label order as given, followed by explicit shake-off orbitals the list does
/// not mention.
fn ordered_labels(labels: &[String], shake_off: &[ShakeRow]) -> Vec<String> {
    let mut ordered: Vec<String> = Vec::new();
    let candidates = labels.iter().map(|label| normalize_orbital(label)).chain(
        shake_off
            .iter()
            .filter(|row| !row.is_sum_row())
            .map(|row| normalize_orbital(&row.orbital)),
    );
    for label in candidates {
        if !label.is_empty() && !ordered.contains(&label) {
            ordered.push(label);
        }
    }
    ordered
}

type LabelRelations = BTreeMap<String, BTreeSet<String>>;

fn label_relations(labels: &[String]) -> (LabelRelations, LabelRelations) {
    let mut greater = BTreeMap::new();
    let mut lesser = BTreeMap::new();
    for (index, label) in labels.iter().enumerate() {
        greater.insert(label.clone(), labels[index + 1..].iter().cloned().collect());
        lesser.insert(label.clone(), labels[..index].iter().cloned().collect());
    }
    (greater, lesser)
}
