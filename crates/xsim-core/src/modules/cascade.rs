//! Cascade feeding of vacancy levels.
//!
//! A level `L` receives extra population from every line whose decay lands in
//! it, in proportion to that line's branching ratio, and recursively from
//! whatever feeds the line's initial level:
//!
//! `boost(L) = sum over feeders (br * (1 + boost(initial)))`
//!
//! Contributions add across independent feeders and multiply along a chain.

use crate::common::constants::MAX_CASCADE_DEPTH;
use crate::domain::CascadeCategory;
use crate::modules::formation::FormationTables;
use crate::modules::tables::RateTables;
use crate::transitions::{LevelKey, TransitionLine};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

pub type BoostMap = BTreeMap<LevelKey, f64>;

/// `final level -> [(initial level, branching ratio)]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CascadeGraph {
    feeders: BTreeMap<LevelKey, Vec<(LevelKey, f64)>>,
}

impl CascadeGraph {
    pub fn from_lines<'a, I>(lines: I) -> Self
    where
        I: IntoIterator<Item = &'a TransitionLine>,
    {
        let mut feeders: BTreeMap<LevelKey, Vec<(LevelKey, f64)>> = BTreeMap::new();
        for line in lines {
            feeders
                .entry(line.final_key())
                .or_default()
                .push((line.initial.clone(), line.effective_branching_ratio()));
        }
        Self { feeders }
    }

    /// Feeder lines of each category: diagram levels are fed by diagram lines,
    /// Auger levels additionally by Auger decays, satellite (two-hole) levels
    /// by satellite lines and by Auger decays that leave two holes behind.
    pub fn for_category(category: CascadeCategory, tables: &RateTables) -> Self {
        match category {
            CascadeCategory::Diagram => Self::from_lines(&tables.diagram),
            CascadeCategory::Auger => Self::from_lines(tables.diagram.iter().chain(&tables.auger)),
            CascadeCategory::Satellite => {
                Self::from_lines(tables.satellite.iter().chain(&tables.auger))
            }
        }
    }

    pub fn feeders(&self, level: &LevelKey) -> &[(LevelKey, f64)] {
        self.feeders.get(level).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn level_count(&self) -> usize {
        self.feeders.len()
    }
}

struct Frame {
    level: LevelKey,
    next_feeder: usize,
    accumulated: f64,
    incoming_ratio: f64,
    depth: usize,
    /// Some feeder below this frame was cut by a cycle or the depth bound.
    truncated: bool,
}

/// Boost of `root` with memoisation across calls. A feeder that would close a
/// cycle on the current path, or exceed the depth bound, contributes its
/// branching ratio without further feeding. Results that depend on such a cut
/// are path-dependent and never enter `memo`.
pub fn boost_for_level(
    graph: &CascadeGraph,
    root: &LevelKey,
    memo: &mut BTreeMap<LevelKey, f64>,
) -> f64 {
    if let Some(value) = memo.get(root) {
        return *value;
    }

    let mut on_path: BTreeSet<LevelKey> = BTreeSet::new();
    on_path.insert(root.clone());
    let mut stack = vec![Frame {
        level: root.clone(),
        next_feeder: 0,
        accumulated: 0.0,
        incoming_ratio: 0.0,
        depth: 0,
        truncated: false,
    }];

    loop {
        let Some(frame) = stack.last_mut() else {
            return 0.0;
        };
        let feeders = graph.feeders(&frame.level);

        if let Some((initial, ratio)) = feeders.get(frame.next_feeder) {
            frame.next_feeder += 1;
            if let Some(known) = memo.get(initial) {
                frame.accumulated += ratio * (1.0 + known);
                continue;
            }
            if on_path.contains(initial) {
                warn!(
                    level = %frame.level,
                    feeder = %initial,
                    "cascade feeder closes a cycle; not following it"
                );
                frame.accumulated += ratio;
                frame.truncated = true;
                continue;
            }
            if frame.depth + 1 > MAX_CASCADE_DEPTH {
                warn!(
                    level = %frame.level,
                    depth = frame.depth,
                    "cascade depth bound reached; truncating chain"
                );
                frame.accumulated += ratio;
                frame.truncated = true;
                continue;
            }

            let depth = frame.depth + 1;
            on_path.insert(initial.clone());
            stack.push(Frame {
                level: initial.clone(),
                next_feeder: 0,
                accumulated: 0.0,
                incoming_ratio: *ratio,
                depth,
                truncated: false,
            });
            continue;
        }

        let Some(finished) = stack.pop() else {
            return 0.0;
        };
        on_path.remove(&finished.level);
        if !finished.truncated {
            memo.insert(finished.level.clone(), finished.accumulated);
        }
        match stack.last_mut() {
            Some(parent) => {
                parent.accumulated += finished.incoming_ratio * (1.0 + finished.accumulated);
                parent.truncated |= finished.truncated;
            }
            None => return finished.accumulated,
        }
    }
}

/// Boost for every seed level. Seeds are the level keys of the category's
/// width table.
pub fn compute_boost(
    category: CascadeCategory,
    tables: &RateTables,
    formation: &FormationTables,
) -> BoostMap {
    let graph = CascadeGraph::for_category(category, tables);
    let seeds = match category {
        CascadeCategory::Diagram => &formation.diagram,
        CascadeCategory::Auger => &formation.auger,
        CascadeCategory::Satellite => &formation.satellite,
    };

    let mut memo = BTreeMap::new();
    let boosts: BoostMap = seeds
        .keys()
        .map(|seed| (seed.clone(), boost_for_level(&graph, seed, &mut memo)))
        .collect();

    debug!(
        category = %category,
        seeds = boosts.len(),
        fed_levels = graph.level_count(),
        "computed cascade boosts"
    );
    boosts
}

/// Boost maps per `(channel, category)` kept until the caller replaces rate
/// tables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoostCache {
    maps: BTreeMap<(Option<String>, CascadeCategory), BoostMap>,
}

impl BoostCache {
    pub fn get(&self, channel: Option<&str>, category: CascadeCategory) -> Option<&BoostMap> {
        self.maps.get(&(channel.map(str::to_string), category))
    }

    pub fn get_or_compute(
        &mut self,
        channel: Option<&str>,
        category: CascadeCategory,
        tables: &RateTables,
        formation: &FormationTables,
    ) -> &BoostMap {
        self.maps
            .entry((channel.map(str::to_string), category))
            .or_insert_with(|| compute_boost(category, tables, formation))
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    pub fn invalidate(&mut self) {
        self.maps.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::{BoostCache, CascadeGraph, boost_for_level, compute_boost};
    use crate::domain::CascadeCategory;
    use crate::modules::formation::{FormationRow, FormationRows, FormationTables};
    use crate::modules::tables::RateTables;
    use crate::transitions::{LevelKey, TransitionLine};
    use std::collections::BTreeMap;

    fn line(initial: &str, final_label: &str, branching_ratio: f64) -> TransitionLine {
        TransitionLine {
            sequence: 0,
            initial: LevelKey::new(initial, 1, 1),
            final_level: LevelKey::new(final_label, 1, 1),
            ejected_shell: None,
            energy: 1000.0,
            branching_ratio,
            radiative_yield: 1.0,
            intensity: 1.0,
            weight: 1.0,
            radiative_width: 1.0,
            auger_width: 0.0,
            total_width: 1.0,
            overlap_scale: None,
            mix_fraction: None,
        }
    }

    fn key(label: &str) -> LevelKey {
        LevelKey::new(label, 1, 1)
    }

    fn seeds(labels: &[&str]) -> Vec<FormationRow> {
        labels
            .iter()
            .map(|label| FormationRow {
                label: label.to_string(),
                two_j: 1,
                eigenstate: 1,
                energy: 1.0,
                width: 1.0,
            })
            .collect()
    }

    #[test]
    fn chain_boost_is_multiplicative_along_the_path() {
        let (r1, r2) = (0.3, 0.6);
        let tables = RateTables {
            diagram: vec![line("K1", "L1", r1), line("L1", "M1", r2)],
            ..RateTables::default()
        };
        let formation = FormationTables::from_rows(&FormationRows {
            diagram: seeds(&["K1", "L1", "M1"]),
            ..FormationRows::default()
        });

        let boosts = compute_boost(CascadeCategory::Diagram, &tables, &formation);
        assert_eq!(boosts[&key("K1")], 0.0);
        assert_eq!(boosts[&key("L1")], r1);
        assert_scalar_close("C", r2 + r1 * r2, boosts[&key("M1")], 1.0e-15, 1.0e-14);
    }

    #[test]
    fn independent_feeders_add() {
        let graph = CascadeGraph::from_lines(&[line("K1", "M1", 0.2), line("L1", "M1", 0.5)]);
        let mut memo = BTreeMap::new();
        let boost = boost_for_level(&graph, &key("M1"), &mut memo);
        assert_scalar_close("M1", 0.7, boost, 1.0e-15, 1.0e-14);
    }

    #[test]
    fn missing_branching_ratio_counts_as_zero() {
        let graph = CascadeGraph::from_lines(&[line("K1", "L1", f64::NAN), line("L2", "L1", 0.25)]);
        let mut memo = BTreeMap::new();
        assert_eq!(boost_for_level(&graph, &key("L1"), &mut memo), 0.25);
    }

    #[test]
    fn cycles_terminate_without_following_the_back_edge() {
        let graph = CascadeGraph::from_lines(&[
            line("A1", "B1", 0.5),
            line("B1", "A1", 0.5),
            line("B1", "C1", 0.4),
        ]);
        let mut memo = BTreeMap::new();
        let boost = boost_for_level(&graph, &key("C1"), &mut memo);
        // C <- B (0.4) <- A (0.5) <- B closes the cycle and contributes 0.5 alone.
        let expected_a = 0.5;
        let expected_b = 0.5 * (1.0 + expected_a);
        assert_scalar_close("C", 0.4 * (1.0 + expected_b), boost, 1.0e-15, 1.0e-14);
    }

    #[test]
    fn cyclic_boost_does_not_depend_on_other_seeds() {
        let tables = RateTables {
            diagram: vec![
                line("M1", "L1", 0.5),
                line("L1", "M1", 0.5),
                line("L1", "K1", 0.4),
            ],
            ..RateTables::default()
        };
        let alone = FormationTables::from_rows(&FormationRows {
            diagram: seeds(&["M1"]),
            ..FormationRows::default()
        });
        let with_upstream = FormationTables::from_rows(&FormationRows {
            diagram: seeds(&["K1", "L1", "M1"]),
            ..FormationRows::default()
        });

        let isolated = compute_boost(CascadeCategory::Diagram, &tables, &alone);
        let shared = compute_boost(CascadeCategory::Diagram, &tables, &with_upstream);
        // M1 <- L1 (0.5) <- M1 closes the cycle: L1 contributes 0.5 alone.
        assert_scalar_close("M1", 0.75, isolated[&key("M1")], 1.0e-15, 1.0e-14);
        assert_eq!(shared[&key("M1")], isolated[&key("M1")]);
        assert_scalar_close("L1", 0.75, shared[&key("L1")], 1.0e-15, 1.0e-14);
        assert_scalar_close("K1", 0.4 * 1.75, shared[&key("K1")], 1.0e-15, 1.0e-14);
    }

    #[test]
    fn self_feeding_level_terminates() {
        let graph = CascadeGraph::from_lines(&[line("A1", "A1", 0.9)]);
        let mut memo = BTreeMap::new();
        assert_eq!(boost_for_level(&graph, &key("A1"), &mut memo), 0.9);
    }

    #[test]
    fn auger_decays_feed_two_hole_levels() {
        let mut auger = line("K1", "L2", 0.4);
        auger.ejected_shell = Some("L3".to_string());
        let tables = RateTables {
            auger: vec![auger],
            satellite: vec![line("K1L2L3", "L2L3", 0.1)],
            ..RateTables::default()
        };
        let formation = FormationTables::from_rows(&FormationRows {
            satellite: seeds(&["L2L3"]),
            ..FormationRows::default()
        });

        let boosts = compute_boost(CascadeCategory::Satellite, &tables, &formation);
        assert_scalar_close("L2L3", 0.5, boosts[&key("L2L3")], 1.0e-15, 1.0e-14);
        assert!(compute_boost(CascadeCategory::Diagram, &tables, &formation).is_empty());
    }

    #[test]
    fn cache_keeps_maps_until_invalidated() {
        let tables = RateTables {
            diagram: vec![line("K1", "L1", 0.3)],
            ..RateTables::default()
        };
        let formation = FormationTables::from_rows(&FormationRows {
            diagram: seeds(&["L1"]),
            ..FormationRows::default()
        });

        let mut cache = BoostCache::default();
        let first = cache
            .get_or_compute(None, CascadeCategory::Diagram, &tables, &formation)
            .clone();
        assert_eq!(first[&key("L1")], 0.3);

        let replaced = RateTables::default();
        let cached = cache.get_or_compute(None, CascadeCategory::Diagram, &replaced, &formation);
        assert_eq!(cached, &first);
        assert!(cache.get(Some("2+"), CascadeCategory::Diagram).is_none());

        cache.invalidate();
        assert!(cache.is_empty());
        let rebuilt = cache.get_or_compute(None, CascadeCategory::Diagram, &replaced, &formation);
        assert_eq!(rebuilt[&key("L1")], 0.0);
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
