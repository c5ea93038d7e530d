use crate::modules::profile::Spectrum;
use std::fs;
use std::path::Path;

pub fn format_fixed_f64(value: f64, width: usize, precision: usize) -> String {
    format!(
        "{value:>width$.precision$}",
        width = width,
        precision = precision
    )
}

pub fn format_scientific_f64(value: f64, width: usize, precision: usize) -> String {
    format!(
        "{value:>width$.precision$E}",
        width = width,
        precision = precision
    )
}

pub fn normalize_text_artifact(content: &str) -> String {
    let mut normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    if !normalized.is_empty() && !normalized.ends_with('\n') {
        normalized.push('\n');
    }
    normalized
}

pub fn write_text_artifact(path: &Path, content: &str) -> std::io::Result<()> {
    fs::write(path, normalize_text_artifact(content))
}

/// Whitespace table of the grid and the category totals, one row per grid
/// point.
pub fn render_spectrum_table(spectrum: &Spectrum) -> String {
    let mut content = String::new();
    content.push_str("#       energy            total          diagram        satellite          shakeup            auger\n");
    let totals = &spectrum.totals;
    for (index, energy) in spectrum.grid.iter().enumerate() {
        content.push_str(&format_fixed_f64(*energy, 14, 4));
        for column in [
            &totals.total,
            &totals.diagram,
            &totals.satellite,
            &totals.shake_up,
            &totals.auger,
        ] {
            let value = column.get(index).copied().unwrap_or(0.0);
            content.push(' ');
            content.push_str(&format_scientific_f64(value, 16, 8));
        }
        content.push('\n');
    }
    content
}

/// Two-column (`x`, value) table.
pub fn render_xy_table(x: &[f64], values: &[f64]) -> String {
    let mut content = String::new();
    for (x, value) in x.iter().zip(values) {
        content.push_str(&format_fixed_f64(*x, 14, 4));
        content.push(' ');
        content.push_str(&format_scientific_f64(*value, 16, 8));
        content.push('\n');
    }
    content
}
