//! Shareable metadata for `derivgen_core::vocab` registries.
//!
//! ## Notes
//! - These types are `Copy`-friendly so registries can live in `const` tables.
//! - Metadata is meant for tooling, docs and diagnostics; enforcement lives in the analysis core.

/// Identify the generator version a vocabulary item is available since.
pub type SinceVersion = &'static str;

/// Shared metadata shape for registry items.
///
/// - stable identity (`id`)
/// - accepted spellings (`canonical` + `aliases`)
/// - documentation (`description`)
#[derive(Debug, Clone, Copy)]
pub struct VocabItemInfo<Id> {
    pub id: Id,
    pub canonical: &'static str,
    pub aliases: &'static [&'static str],
    pub description: &'static str,
    pub since_version: SinceVersion,
}

/// Find a registry entry whose canonical spelling or one of its aliases equals `name`.
pub fn lookup<Id: Copy>(table: &[VocabItemInfo<Id>], name: &str) -> Option<Id> {
    if let Some(info) = table.iter().find(|i| i.canonical == name) {
        return Some(info.id);
    }
    table.iter().find(|i| i.aliases.contains(&name)).map(|i| i.id)
}
