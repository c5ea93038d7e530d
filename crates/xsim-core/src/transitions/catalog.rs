use crate::domain::{SimError, SimResult};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Static definition of a named transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub id: &'static str,
    pub low_level: &'static str,
    pub high_level: &'static str,
    pub auger_level: Option<&'static str>,
    pub readable_name: &'static str,
}

impl CatalogEntry {
    const fn radiative(
        id: &'static str,
        low_level: &'static str,
        high_level: &'static str,
        readable_name: &'static str,
    ) -> Self {
        Self {
            id,
            low_level,
            high_level,
            auger_level: None,
            readable_name,
        }
    }

    const fn auger(
        id: &'static str,
        low_level: &'static str,
        high_level: &'static str,
        auger_level: &'static str,
    ) -> Self {
        Self {
            id,
            low_level,
            high_level,
            auger_level: Some(auger_level),
            readable_name: id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogKind {
    Radiative,
    Auger,
}

impl CatalogKind {
    pub fn entries(self) -> &'static [CatalogEntry] {
        match self {
            Self::Radiative => radiative_catalog(),
            Self::Auger => auger_catalog(),
        }
    }
}

const RADIATIVE_CATALOG: [CatalogEntry; 28] = [
    CatalogEntry::radiative("KL1", "K1", "L1", "K-L1"),
    CatalogEntry::radiative("KL2", "K1", "L2", "Kα2"),
    CatalogEntry::radiative("KL3", "K1", "L3", "Kα1"),
    CatalogEntry::radiative("KM2", "K1", "M2", "Kβ3"),
    CatalogEntry::radiative("KM3", "K1", "M3", "Kβ1"),
    CatalogEntry::radiative("KM4", "K1", "M4", "Kβ5II"),
    CatalogEntry::radiative("KM5", "K1", "M5", "Kβ5I"),
    CatalogEntry::radiative("KN2", "K1", "N2", "Kβ2II"),
    CatalogEntry::radiative("KN3", "K1", "N3", "Kβ2I"),
    CatalogEntry::radiative("L1M2", "L1", "M2", "Lβ4"),
    CatalogEntry::radiative("L1M3", "L1", "M3", "Lβ3"),
    CatalogEntry::radiative("L1N2", "L1", "N2", "Lγ2"),
    CatalogEntry::radiative("L1N3", "L1", "N3", "Lγ3"),
    CatalogEntry::radiative("L2M1", "L2", "M1", "Lη"),
    CatalogEntry::radiative("L2M4", "L2", "M4", "Lβ1"),
    CatalogEntry::radiative("L2N1", "L2", "N1", "Lγ5"),
    CatalogEntry::radiative("L2N4", "L2", "N4", "Lγ1"),
    CatalogEntry::radiative("L3M1", "L3", "M1", "Lℓ"),
    CatalogEntry::radiative("L3M4", "L3", "M4", "Lα2"),
    CatalogEntry::radiative("L3M5", "L3", "M5", "Lα1"),
    CatalogEntry::radiative("L3N1", "L3", "N1", "Lβ6"),
    CatalogEntry::radiative("L3N4", "L3", "N4", "Lβ15"),
    CatalogEntry::radiative("L3N5", "L3", "N5", "Lβ2"),
    CatalogEntry::radiative("M3N5", "M3", "N5", "Mγ"),
    CatalogEntry::radiative("M4N6", "M4", "N6", "Mβ"),
    CatalogEntry::radiative("M5N6", "M5", "N6", "Mα2"),
    CatalogEntry::radiative("M5N7", "M5", "N7", "Mα1"),
    CatalogEntry::radiative("M4N2", "M4", "N2", "Mζ2"),
];

const AUGER_CATALOG: [CatalogEntry; 9] = [
    CatalogEntry::auger("KLL", "K1", "L", "L"),
    CatalogEntry::auger("KLM", "K1", "L", "M"),
    CatalogEntry::auger("KMM", "K1", "M", "M"),
    CatalogEntry::auger("L1MM", "L1", "M", "M"),
    CatalogEntry::auger("L2MM", "L2", "M", "M"),
    CatalogEntry::auger("L3MM", "L3", "M", "M"),
    CatalogEntry::auger("L3MN", "L3", "M", "N"),
    CatalogEntry::auger("M4NN", "M4", "N", "N"),
    CatalogEntry::auger("M5NN", "M5", "N", "N"),
];

/// Radiative diagram and satellite transitions.
pub fn radiative_catalog() -> &'static [CatalogEntry] {
    &RADIATIVE_CATALOG
}

pub fn auger_catalog() -> &'static [CatalogEntry] {
    &AUGER_CATALOG
}

pub fn find_entry(kind: CatalogKind, id: &str) -> Option<&'static CatalogEntry> {
    kind.entries().iter().find(|entry| entry.id == id)
}

/// Caller-owned `selected` flags for one catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionState {
    kind: CatalogKind,
    flags: BTreeMap<&'static str, bool>,
}

impl SelectionState {
    /// All entries start unselected.
    pub fn new(kind: CatalogKind) -> Self {
        Self {
            kind,
            flags: kind.entries().iter().map(|entry| (entry.id, false)).collect(),
        }
    }

    pub fn kind(&self) -> CatalogKind {
        self.kind
    }

    /// Set one flag; returns `false` for an id the catalog does not know.
    pub fn set(&mut self, id: &str, selected: bool) -> bool {
        match self.flags.get_mut(id) {
            Some(flag) => {
                *flag = selected;
                true
            }
            None => false,
        }
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.flags.get(id).copied().unwrap_or(false)
    }

    pub fn clear(&mut self) {
        for flag in self.flags.values_mut() {
            *flag = false;
        }
    }

    /// Select every entry whose id or readable name matches one of the glob
    /// patterns. Returns the number of entries selected by this call.
    pub fn select_matching<S: AsRef<str>>(&mut self, patterns: &[S]) -> SimResult<usize> {
        let matcher = compile_patterns(patterns)?;
        let mut count = 0;
        for entry in self.kind.entries() {
            if matcher.is_match(entry.id) || matcher.is_match(entry.readable_name) {
                if let Some(flag) = self.flags.get_mut(entry.id) {
                    *flag = true;
                    count += 1;
                }
            }
        }
        Ok(count)
    }

    /// Read-only view for one assembly pass.
    pub fn snapshot(&self) -> SelectionSnapshot {
        SelectionSnapshot {
            kind: self.kind,
            selected: self
                .flags
                .iter()
                .filter(|(_, selected)| **selected)
                .map(|(id, _)| *id)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionSnapshot {
    kind: CatalogKind,
    selected: BTreeSet<&'static str>,
}

impl SelectionSnapshot {
    pub fn empty(kind: CatalogKind) -> Self {
        Self {
            kind,
            selected: BTreeSet::new(),
        }
    }

    pub fn kind(&self) -> CatalogKind {
        self.kind
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.contains(id)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Selected entries in catalog order.
    pub fn entries(&self) -> impl Iterator<Item = &'static CatalogEntry> + '_ {
        self.kind
            .entries()
            .iter()
            .filter(|entry| self.selected.contains(entry.id))
    }
}

fn compile_patterns<S: AsRef<str>>(patterns: &[S]) -> SimResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let pattern = pattern.as_ref();
        let glob = Glob::new(pattern).map_err(|source| {
            SimError::input_validation(
                "CONFIG.SELECTION_GLOB",
                format!("invalid selection pattern '{}': {}", pattern, source),
            )
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| {
        SimError::input_validation(
            "CONFIG.SELECTION_GLOB",
            format!("failed to compile selection patterns: {}", source),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::{
        CatalogKind, SelectionState, auger_catalog, find_entry, radiative_catalog,
    };
    use std::collections::BTreeSet;

    #[test]
    fn catalog_names_are_unique_and_map_to_valid_shells() {
        for kind in [CatalogKind::Radiative, CatalogKind::Auger] {
            let entries = kind.entries();
            let ids: BTreeSet<&str> = entries.iter().map(|entry| entry.id).collect();
            let names: BTreeSet<&str> = entries.iter().map(|entry| entry.readable_name).collect();
            assert_eq!(ids.len(), entries.len());
            assert_eq!(names.len(), entries.len());
        }

        for entry in radiative_catalog() {
            assert!(crate::common::shells::is_shell(entry.low_level), "{}", entry.id);
            assert!(crate::common::shells::is_shell(entry.high_level), "{}", entry.id);
            assert!(entry.auger_level.is_none());
        }
        assert!(auger_catalog().iter().all(|entry| entry.auger_level.is_some()));
    }

    #[test]
    fn k_alpha_entries_point_at_l_subshells() {
        let alpha1 = find_entry(CatalogKind::Radiative, "KL3").expect("KL3");
        assert_eq!(
            (alpha1.low_level, alpha1.high_level, alpha1.readable_name),
            ("K1", "L3", "Kα1")
        );
        assert!(find_entry(CatalogKind::Auger, "KL3").is_none());
    }

    #[test]
    fn snapshot_is_detached_from_later_flag_changes() {
        let mut state = SelectionState::new(CatalogKind::Radiative);
        assert!(state.set("KL3", true));
        assert!(!state.set("XYZ", true));

        let snapshot = state.snapshot();
        state.set("KL3", false);
        state.set("KL2", true);

        assert!(snapshot.is_selected("KL3"));
        assert!(!snapshot.is_selected("KL2"));
        assert_eq!(snapshot.len(), 1);
        assert!(state.snapshot().is_selected("KL2"));
    }

    #[test]
    fn glob_patterns_match_ids_and_readable_names() {
        let mut state = SelectionState::new(CatalogKind::Radiative);
        let count = state.select_matching(&["KL*"]).expect("patterns");
        assert_eq!(count, 3);

        state.clear();
        let count = state.select_matching(&["Kβ*", "L3M5"]).expect("patterns");
        assert_eq!(count, 7);
        let ids: Vec<&str> = state.snapshot().entries().map(|entry| entry.id).collect();
        assert_eq!(ids, vec!["KM2", "KM3", "KM4", "KM5", "KN2", "KN3", "L3M5"]);
    }

    #[test]
    fn malformed_glob_is_a_configuration_error() {
        let mut state = SelectionState::new(CatalogKind::Auger);
        let error = state
            .select_matching(&["K[L"])
            .expect_err("unterminated class");
        assert_eq!(error.placeholder(), "CONFIG.SELECTION_GLOB");
    }
}
