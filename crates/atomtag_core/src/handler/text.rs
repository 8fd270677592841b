//! Fixed-width column rendering shared by the text viewers.

use crate::model::core_types::{FILENAME, NAME, TITLE};
use crate::model::entity::EntityId;
use crate::model::molecule::Molecule;
use crate::handler::Verbosity;

pub const ID_LENGTH: usize = 6;
pub const TAG_LENGTH: usize = 32;
pub const DATA_MIN_LENGTH: usize = 10;

/// Atom types whose data best summarizes a molecule, highest priority first.
const SUMMARY_TYPES: [&str; 3] = [TITLE, FILENAME, NAME];

/// Shortens `value` to `length` characters, marking the cut with `...`.
pub fn cut(value: &str, length: usize) -> String {
    if value.chars().count() <= length {
        return value.to_string();
    }
    let mut shortened: String = value.chars().take(length.saturating_sub(3)).collect();
    shortened.push_str("...");
    shortened
}

/// Width left for the data column on a line of `max_length` characters.
pub fn data_width(max_length: usize) -> usize {
    max_length
        .saturating_sub(ID_LENGTH + TAG_LENGTH + 3)
        .max(DATA_MIN_LENGTH)
}

/// Data of the first title/filename/name atom, else all data joined by `; `.
pub fn summary_data(molecule: &Molecule) -> String {
    SUMMARY_TYPES
        .iter()
        .find_map(|value| molecule.atoms().iter().find(|atom| atom.has_type(value)))
        .map(|atom| atom.data().to_string())
        .unwrap_or_else(|| {
            molecule
                .atoms()
                .iter()
                .map(|atom| atom.data())
                .collect::<Vec<_>>()
                .join("; ")
        })
}

/// Text form of a molecule in the column layout.
pub fn render_molecule(molecule: &Molecule, max_length: usize, verbosity: Verbosity) -> String {
    let width = data_width(max_length);
    match verbosity {
        Verbosity::Default => row(
            molecule.id(),
            &bracketed(molecule.tags()),
            &summary_data(molecule),
            width,
        ),
        Verbosity::Verbose => {
            let mut lines = Vec::with_capacity(molecule.atoms().len() + 2);
            lines.push(format!(
                " {:>id_width$} {}",
                molecule.id(),
                cut(
                    &bracketed(molecule.tags()),
                    max_length.saturating_sub(ID_LENGTH + 2)
                ),
                id_width = ID_LENGTH
            ));
            lines.push(format!(" {}", "-".repeat(max_length.saturating_sub(1))));
            for atom in molecule.atoms() {
                lines.push(row(atom.id(), &bracketed(atom.types()), atom.data(), width));
            }
            lines.join("\n")
        }
    }
}

fn row(id: EntityId, labels: &str, data: &str, width: usize) -> String {
    format!(
        " {:>id_width$} {:<tag_width$} {:<width$}",
        id,
        cut(labels, TAG_LENGTH),
        cut(&data.replace(['\r', '\n'], " "), width),
        id_width = ID_LENGTH,
        tag_width = TAG_LENGTH,
    )
}

fn bracketed(values: &[String]) -> String {
    format!("[{}]", values.join(", "))
}
