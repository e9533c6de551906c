//! Marker attribute vocabulary.
//!
//! A marker attribute is the declarative annotation that tells a driver to generate members for the
//! annotated declaration. Source code may spell the same attribute several ways (`Track`,
//! `TrackAttribute`, `Medicine.Track`, `global::Medicine.TrackAttribute`); [`from_attribute_name`]
//! folds all of them into one [`MarkerId`].

use crate::vocab::registry::{self, VocabItemInfo};

/// Namespace that owns every marker attribute.
pub const MARKER_NAMESPACE: &str = "Medicine";

/// Stable identifier for supported marker attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MarkerId {
    Track,
    Singleton,
    Inject,
    UnionHeader,
    Union,
    UnmanagedAccess,
    GenerateUnityConstants,
}

/// What kind of declaration a marker may be applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerTarget {
    /// Classes and interfaces.
    ClassOrInterface,
    Class,
    Struct,
    Method,
    Assembly,
}

/// Metadata entry for a marker attribute.
pub type MarkerInfo = VocabItemInfo<MarkerId>;

/// Registry of supported marker attributes.
pub const MARKERS: &[MarkerInfo] = &[
    info(
        MarkerId::Track,
        "Track",
        &["Tracked"],
        "Register enabled instances in a global tracked-instances registry.",
    ),
    info(
        MarkerId::Singleton,
        "Singleton",
        &[],
        "Register the single enabled instance and expose it through a static `Instance` property.",
    ),
    info(
        MarkerId::Inject,
        "Inject",
        &[],
        "Turn every `Name = expr;` assignment in the method into a generated property.",
    ),
    info(
        MarkerId::UnionHeader,
        "UnionHeader",
        &[],
        "Declare the shared header struct of a tagged union family.",
    ),
    info(
        MarkerId::Union,
        "Union",
        &["UnionStruct"],
        "Declare one variant of a tagged union family.",
    ),
    info(
        MarkerId::UnmanagedAccess,
        "UnmanagedAccess",
        &[],
        "Generate ref accessors that read instance fields through raw offsets.",
    ),
    info(
        MarkerId::GenerateUnityConstants,
        "GenerateUnityConstants",
        &[],
        "Generate tag and layer enumerations from the project's tag manager asset.",
    ),
];

/// Resolve a canonical marker spelling to its stable id.
pub fn from_str(name: &str) -> Option<MarkerId> {
    if let Some(id) = registry::lookup(MARKERS, name) {
        return Some(id);
    }
    name.strip_suffix("Attribute").and_then(|n| registry::lookup(MARKERS, n))
}

/// Resolve an attribute name as written in source (possibly qualified) to a marker id.
///
/// Only the marker namespace is accepted as a qualifier, so `Other.Track` is not a marker.
pub fn from_attribute_name(name: &str) -> Option<MarkerId> {
    let name = name.strip_prefix("global::").unwrap_or(name);
    match name.rsplit_once('.') {
        Some((ns, simple)) if ns == MARKER_NAMESPACE => from_str(simple),
        Some(_) => None,
        None => from_str(name),
    }
}

/// Return the canonical spelling for a marker.
pub fn as_str(id: MarkerId) -> &'static str {
    info_for(id).canonical
}

/// Return the metadata entry for a marker.
pub fn info_for(id: MarkerId) -> &'static MarkerInfo {
    MARKERS
        .iter()
        .find(|m| m.id == id)
        .expect("INVARIANT: every MarkerId has a registry entry")
}

/// Return where a marker may be applied.
pub fn target(id: MarkerId) -> MarkerTarget {
    match id {
        MarkerId::Track | MarkerId::Singleton => MarkerTarget::ClassOrInterface,
        MarkerId::UnmanagedAccess => MarkerTarget::Class,
        MarkerId::UnionHeader | MarkerId::Union => MarkerTarget::Struct,
        MarkerId::Inject => MarkerTarget::Method,
        MarkerId::GenerateUnityConstants => MarkerTarget::Assembly,
    }
}

const fn info(id: MarkerId, canonical: &'static str, aliases: &'static [&'static str], description: &'static str) -> MarkerInfo {
    VocabItemInfo {
        id,
        canonical,
        aliases,
        description,
        since_version: "0.1.0",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_marker_has_info() {
        for m in MARKERS {
            assert_eq!(info_for(m.id).canonical, m.canonical);
        }
    }

    #[test]
    fn test_attribute_suffix_and_namespace_are_folded() {
        assert_eq!(from_attribute_name("TrackAttribute"), Some(MarkerId::Track));
        assert_eq!(from_attribute_name("Medicine.Singleton"), Some(MarkerId::Singleton));
        assert_eq!(
            from_attribute_name("global::Medicine.UnionHeaderAttribute"),
            Some(MarkerId::UnionHeader)
        );
        assert_eq!(from_attribute_name("UnionStruct"), Some(MarkerId::Union));
    }

    #[test]
    fn test_foreign_namespace_is_not_a_marker() {
        assert_eq!(from_attribute_name("Other.Track"), None);
        assert_eq!(from_attribute_name("Serializable"), None);
    }
}
