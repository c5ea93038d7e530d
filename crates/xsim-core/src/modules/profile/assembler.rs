use super::{BadSelection, LineGroup, LineSet};
use crate::domain::{CascadeCategory, LineCategory, SimResult};
use crate::modules::cascade::BoostMap;
use crate::modules::cross_section::CrossSectionProvider;
use crate::modules::formation::FormationTables;
use crate::modules::intensity::{IntensityRequest, canonical_label, effective_intensity};
use crate::modules::overlap::{BeamProfile, OverlapVariant, overlap_line};
use crate::modules::selection::{
    JjRestriction, MatchRule, group_satellites, group_shake_up, select_lines,
};
use crate::modules::shake::ShakeModel;
use crate::modules::tables::RateTables;
use crate::transitions::{CatalogEntry, CatalogKind, SelectionSnapshot, TransitionLine};
use std::collections::BTreeMap;
use tracing::warn;

/// Boost maps available to one channel; `None` when cascades are off.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelBoosts<'a> {
    pub diagram: Option<&'a BoostMap>,
    pub auger: Option<&'a BoostMap>,
    pub satellite: Option<&'a BoostMap>,
}

impl<'a> ChannelBoosts<'a> {
    pub fn get(&self, category: CascadeCategory) -> Option<&'a BoostMap> {
        match category {
            CascadeCategory::Diagram => self.diagram,
            CascadeCategory::Auger => self.auger,
            CascadeCategory::Satellite => self.satellite,
        }
    }
}

/// Tables and per-channel factors of one assembly channel.
#[derive(Debug, Clone, Copy)]
pub struct ChannelView<'a> {
    /// `None` for the element's base tables.
    pub name: Option<&'a str>,
    pub tables: &'a RateTables,
    pub formation: &'a FormationTables,
    pub boosts: ChannelBoosts<'a>,
    /// Mixing weight stored on every line as its mix fraction.
    pub weight: Option<f64>,
    pub overlap_variant: OverlapVariant,
}

/// Settings shared by every channel of one pass.
#[derive(Clone, Copy)]
pub struct CompositionSettings<'a> {
    pub beam: BeamProfile,
    pub default_beam_energy: f64,
    pub cross_section: &'a dyn CrossSectionProvider,
    pub include_cascades: bool,
    pub shake: Option<&'a ShakeModel>,
    pub shake_labels: &'a [String],
    pub shake_amplitudes: &'a BTreeMap<String, f64>,
    pub match_rule: MatchRule,
    pub restriction: &'a JjRestriction,
    pub alpha: f64,
}

/// Append the groups of every selected entry of `snapshots` for one channel.
/// A selected entry without lines is recorded as a bad selection and gets a
/// zero-filled placeholder group.
pub fn collect_channel(
    view: &ChannelView<'_>,
    settings: &CompositionSettings<'_>,
    snapshots: &[SelectionSnapshot],
    out: &mut LineSet,
) -> SimResult<()> {
    for snapshot in snapshots {
        for entry in snapshot.entries() {
            let before = out.groups.len();
            match snapshot.kind() {
                CatalogKind::Radiative => collect_radiative(view, settings, entry, out)?,
                CatalogKind::Auger => {
                    let lines = select_lines(
                        entry,
                        &view.tables.auger,
                        settings.match_rule,
                        settings.restriction,
                    );
                    push_group(view, settings, entry, LineCategory::Auger, None, &lines, out)?;
                }
            }

            if out.groups.len() == before {
                warn!(
                    entry = entry.id,
                    channel = view.name.unwrap_or("base"),
                    "selected transition matched no lines"
                );
                let channel = view.name.map(str::to_string);
                out.bad_selections.push(BadSelection {
                    key: entry.id.to_string(),
                    channel: channel.clone(),
                });
                let mut placeholder =
                    LineGroup::new(placeholder_category(snapshot.kind()), entry.id, None, channel);
                placeholder.placeholder = true;
                out.groups.push(placeholder);
            }
        }
    }
    Ok(())
}

fn collect_radiative(
    view: &ChannelView<'_>,
    settings: &CompositionSettings<'_>,
    entry: &CatalogEntry,
    out: &mut LineSet,
) -> SimResult<()> {
    let diagram = select_lines(
        entry,
        &view.tables.diagram,
        settings.match_rule,
        settings.restriction,
    );
    push_group(view, settings, entry, LineCategory::Diagram, None, &diagram, out)?;

    for group in group_satellites(
        entry,
        &view.tables.satellite,
        settings.shake_labels,
        settings.restriction,
    ) {
        push_group(
            view,
            settings,
            entry,
            LineCategory::Satellite,
            Some(group.shake_label),
            &group.lines,
            out,
        )?;
    }

    for group in group_shake_up(
        entry,
        &view.tables.shake_up,
        settings.shake_labels,
        settings.restriction,
    ) {
        push_group(
            view,
            settings,
            entry,
            LineCategory::ShakeUp,
            Some(group.shake_label),
            &group.lines,
            out,
        )?;
    }
    Ok(())
}

fn push_group(
    view: &ChannelView<'_>,
    settings: &CompositionSettings<'_>,
    entry: &CatalogEntry,
    category: LineCategory,
    shake_label: Option<String>,
    lines: &[&TransitionLine],
    out: &mut LineSet,
) -> SimResult<()> {
    if lines.is_empty() {
        return Ok(());
    }

    let request = IntensityRequest {
        beam: settings.beam,
        default_beam_energy: settings.default_beam_energy,
        cross_section: settings.cross_section,
        include_cascades: settings.include_cascades,
        boost_type: category,
        boosts: view.boosts.get(category.cascade_category()),
        shake: settings.shake,
        shake_key: shake_label.as_deref(),
        shake_amplitudes: settings.shake_amplitudes,
        formation: view.formation,
        overlap_variant: view.overlap_variant,
        alpha: settings.alpha,
    };

    let mut group = LineGroup::new(
        category,
        entry.id,
        shake_label.clone(),
        view.name.map(str::to_string),
    );
    for line in lines {
        let mut line = (*line).clone();
        line.mix_fraction = view.weight;
        if settings.beam.is_active() {
            overlap_line(
                &mut line,
                settings.beam,
                view.formation,
                view.overlap_variant,
                |key| canonical_label(settings.shake, &key.label),
            )?;
        }
        let intensity = effective_intensity(&line, &request)?;
        group.lines.push(line.energy, intensity, line.total_width);
    }
    out.groups.push(group);
    Ok(())
}

fn placeholder_category(kind: CatalogKind) -> LineCategory {
    match kind {
        CatalogKind::Radiative => LineCategory::Diagram,
        CatalogKind::Auger => LineCategory::Auger,
    }
}
