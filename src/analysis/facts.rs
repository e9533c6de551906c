//! Per-declaration fact extraction.
//!
//! [`extract_facts`] flattens everything a driver needs to know about one marked declaration into a
//! [`DeclarationFacts`] record: identity, effective accessibility, nesting, the nearest marked ancestor,
//! and the capability interfaces the declaration adds on top of that ancestor.
//!
//! Facts are derived from declaration shape only, never from generated output, so they are stable for
//! an unchanged declaration graph.

use std::collections::{BTreeSet, HashSet, VecDeque};

use derivgen_core::vocab::interfaces::{self, WellKnownInterface};
use derivgen_core::vocab::markers;
use derivgen_core::{DiagnosticCode, MarkerId};
use tokio_util::sync::CancellationToken;

use super::aggregate::{MarkerIndex, accepts};
use super::cache::Fingerprint;
use super::options::{self, OptionError, SingletonOptions, TrackOptions};
use super::scratch::{self, Rented};
use super::{Cancelled, check_cancelled};
use crate::diagnostics::{Diagnostic, Location};
use crate::host::{Accessibility, SymbolKey, SymbolOracle, TypeDecl, TypeKind, TypeRef, self_type};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FactError {
    #[error("`{0}` is not a class, struct or interface declaration")]
    NotATypeDeclaration(SymbolKey),

    #[error("[{marker}] cannot be applied to `{symbol}`")]
    InvalidTarget { symbol: SymbolKey, marker: &'static str },

    #[error(transparent)]
    Attribute(#[from] OptionError),

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

/// One type the declaration is nested in, outermost first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainingType {
    pub name: String,
    pub kind: TypeKind,
    pub type_params: Vec<String>,
}

/// Associated type arguments collected from the well-known capability interfaces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Capabilities {
    /// `IUnmanagedData<TData>` payloads, first-seen order.
    pub unmanaged_data: Vec<TypeRef>,
    /// `IFindByID<TId>` id types.
    pub find_by_id: Vec<TypeRef>,
    /// `ICustomStorage<TStorage>` storage types.
    pub custom_storage: Vec<TypeRef>,
    pub instance_index: bool,
}

impl Capabilities {
    pub fn is_empty(&self) -> bool {
        self.unmanaged_data.is_empty() && self.find_by_id.is_empty() && self.custom_storage.is_empty() && !self.instance_index
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationFacts {
    pub key: SymbolKey,
    /// `Name<T, ...>` over the declaration's own parameters.
    pub ty: TypeRef,
    pub marker: MarkerId,
    pub kind: TypeKind,
    pub type_params: Vec<String>,
    /// Minimum of the declaration's and its containing types' accessibility.
    pub accessibility: Accessibility,
    pub containing: Vec<ContainingType>,
    pub namespace: Option<String>,
    pub is_sealed: bool,
    pub is_abstract: bool,
    pub is_static: bool,
    /// Nearest ancestor that generates lifecycle members for the same marker family.
    pub marked_ancestor: Option<TypeRef>,
    pub tracked_ancestor: Option<TypeRef>,
    pub singleton_ancestor: Option<TypeRef>,
    /// Tracked interfaces implemented here and not already by the marked ancestor.
    pub marked_interfaces: Vec<TypeRef>,
    pub capabilities: Capabilities,
    pub track: Option<TrackOptions>,
    pub singleton: Option<SingletonOptions>,
    pub declared_members: BTreeSet<String>,
    pub fingerprint: Fingerprint,
    pub diagnostics: Vec<Diagnostic>,
}

impl DeclarationFacts {
    pub fn is_value_type(&self) -> bool {
        matches!(self.kind, TypeKind::Struct | TypeKind::Enum)
    }

    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    pub fn declares(&self, member: &str) -> bool {
        self.declared_members.contains(member)
    }

    /// Simple name with type parameters: `Pool<T>`.
    pub fn display_name(&self) -> String {
        let simple = self.key.simple_name();
        if self.type_params.is_empty() {
            simple.to_string()
        } else {
            format!("{simple}<{}>", self.type_params.join(", "))
        }
    }

    pub fn location(&self, file: Option<String>) -> Location {
        Location::symbol(self.key.name.clone()).with_file(file)
    }
}

/// Extract the facts for the declaration `key` carrying `marker`.
#[tracing::instrument(skip_all, fields(symbol = %key, marker = markers::as_str(marker)))]
pub fn extract_facts(
    oracle: &dyn SymbolOracle,
    index: &MarkerIndex,
    key: &SymbolKey,
    marker: MarkerId,
    cancel: &CancellationToken,
) -> Result<DeclarationFacts, FactError> {
    let decl = oracle
        .declaration(key)
        .filter(|d| d.kind != TypeKind::Enum)
        .ok_or_else(|| FactError::NotATypeDeclaration(key.clone()))?;
    if !accepts(marker, decl.kind) {
        return Err(FactError::InvalidTarget {
            symbol: key.clone(),
            marker: markers::as_str(marker),
        });
    }
    check_cancelled(cancel)?;

    let track = decl.attribute(MarkerId::Track).map(options::track_options).transpose()?;
    let singleton = decl.attribute(MarkerId::Singleton).map(options::singleton_options).transpose()?;

    let ty = self_type(decl);
    let (containing, accessibility) = nesting(oracle, decl);

    let ancestors = base_chain(oracle, &ty, cancel)?;
    let tracked_ancestor = ancestors.iter().find(|a| index.tracked.contains(a)).cloned();
    let singleton_ancestor = ancestors.iter().find(|a| index.singletons.contains(a)).cloned();
    let marked_ancestor = match marker {
        MarkerId::Track | MarkerId::Singleton => ancestors
            .iter()
            .find(|a| index.tracked.contains(a) || index.singletons.contains(a))
            .cloned(),
        _ => ancestors
            .iter()
            .find(|a| oracle.declaration(&SymbolKey::of(a)).is_some_and(|d| d.has_attribute(marker)))
            .cloned(),
    };

    let inherited: HashSet<TypeRef> = match &marked_ancestor {
        Some(ancestor) => all_interfaces(oracle, ancestor, cancel)?.into_iter().collect(),
        None => HashSet::new(),
    };
    let own: Vec<TypeRef> = all_interfaces(oracle, &ty, cancel)?
        .into_iter()
        .filter(|i| !inherited.contains(i))
        .collect();

    let marked_interfaces = own
        .iter()
        .filter(|i| index.tracked.get(i).is_some_and(|t| t.is_interface))
        .cloned()
        .collect();
    let capabilities = classify_capabilities(&own);

    let mut facts = DeclarationFacts {
        key: key.clone(),
        ty,
        marker,
        kind: decl.kind,
        type_params: decl.type_params.clone(),
        accessibility,
        containing,
        namespace: oracle.namespace_of(key),
        is_sealed: decl.is_sealed,
        is_abstract: decl.is_abstract,
        is_static: decl.is_static,
        marked_ancestor,
        tracked_ancestor,
        singleton_ancestor,
        marked_interfaces,
        capabilities,
        track,
        singleton,
        declared_members: decl.member_names().map(str::to_string).collect(),
        fingerprint: Fingerprint::of_declarations(oracle, std::slice::from_ref(key), &(), cancel)?,
        diagnostics: Vec::new(),
    };
    if let Some(diagnostic) = registration_mismatch(index, decl, &facts) {
        facts.diagnostics.push(diagnostic);
    }
    Ok(facts)
}

/// Containing types (outermost first) and the effective accessibility.
pub fn nesting(oracle: &dyn SymbolOracle, decl: &TypeDecl) -> (Vec<ContainingType>, Accessibility) {
    let mut containing = Vec::new();
    let mut accessibility = decl.accessibility;
    let mut current = decl;
    while let Some(outer) = oracle.containing(current) {
        if containing.len() >= 16 {
            break;
        }
        accessibility = accessibility.min(outer.accessibility);
        containing.push(ContainingType {
            name: outer.simple_name().to_string(),
            kind: outer.kind,
            type_params: outer.type_params.clone(),
        });
        current = outer;
    }
    containing.reverse();
    (containing, accessibility)
}

/// Base types of `ty`, nearest first, substituted.
pub fn base_chain(oracle: &dyn SymbolOracle, ty: &TypeRef, cancel: &CancellationToken) -> Result<Vec<TypeRef>, Cancelled> {
    let mut chain = Vec::new();
    let mut seen: Rented<HashSet<SymbolKey>> = scratch::rent();
    seen.insert(SymbolKey::of(ty));
    let mut current = oracle.base_type(ty);
    while let Some(base) = current {
        check_cancelled(cancel)?;
        if !seen.insert(SymbolKey::of(&base)) {
            break;
        }
        current = oracle.base_type(&base);
        chain.push(base);
    }
    Ok(chain)
}

/// Every interface `ty` implements, directly or through base types and other interfaces, breadth-first
/// in declaration order. Diamonds are visited once and cycles terminate.
pub fn all_interfaces(
    oracle: &dyn SymbolOracle,
    ty: &TypeRef,
    cancel: &CancellationToken,
) -> Result<Vec<TypeRef>, Cancelled> {
    let mut out = Vec::new();
    let mut seen: Rented<HashSet<TypeRef>> = scratch::rent();
    let mut queue: Rented<VecDeque<TypeRef>> = scratch::rent();
    queue.push_back(ty.clone());
    seen.insert(ty.clone());
    while let Some(current) = queue.pop_front() {
        check_cancelled(cancel)?;
        for iface in oracle.declared_interfaces(&current) {
            if seen.insert(iface.clone()) {
                out.push(iface.clone());
                queue.push_back(iface);
            }
        }
        if let Some(base) = oracle.base_type(&current) {
            if seen.insert(base.clone()) {
                queue.push_back(base);
            }
        }
    }
    Ok(out)
}

fn classify_capabilities(interfaces: &[TypeRef]) -> Capabilities {
    let mut caps = Capabilities::default();
    for iface in interfaces {
        let Some(kind) = interfaces::classify(&iface.name, iface.args.len()) else {
            continue;
        };
        let target = match kind {
            WellKnownInterface::InstanceIndex => {
                caps.instance_index = true;
                continue;
            }
            WellKnownInterface::UnmanagedData => &mut caps.unmanaged_data,
            WellKnownInterface::FindById => &mut caps.find_by_id,
            WellKnownInterface::CustomStorage => &mut caps.custom_storage,
        };
        if let Some(arg) = iface.args.first() {
            if !target.contains(arg) {
                target.push(arg.clone());
            }
        }
    }
    caps
}

/// `DG0001` when the registration mode differs from the nearest marked ancestor's.
fn registration_mismatch(index: &MarkerIndex, decl: &TypeDecl, facts: &DeclarationFacts) -> Option<Diagnostic> {
    let tracked = facts.track.as_ref().zip(facts.tracked_ancestor.as_ref()).and_then(|(own, ancestor)| {
        let theirs = index.tracked.get(ancestor)?;
        (own.manual != theirs.options.manual).then_some((ancestor, own.manual))
    });
    let singleton = || {
        facts.singleton.as_ref().zip(facts.singleton_ancestor.as_ref()).and_then(|(own, ancestor)| {
            let theirs = index.singletons.get(ancestor)?;
            (own.manual != theirs.manual).then_some((ancestor, own.manual))
        })
    };
    let (ancestor, manual) = tracked.or_else(singleton)?;
    let mode = |manual: bool| if manual { "manual" } else { "automatic" };
    Some(Diagnostic::new(
        DiagnosticCode::RegistrationModeMismatch,
        format!(
            "`{}` uses {} registration but its base `{}` uses {} registration",
            facts.key.name,
            mode(manual),
            ancestor,
            mode(!manual)
        ),
        facts.location(decl.file.clone()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ModelHost;

    fn host() -> ModelHost {
        ModelHost::from_json(
            r#"{ "types": [
                { "name": "Game.Stats", "kind": "struct" },
                { "name": "Game.IHasStats", "kind": "interface", "interfaces": ["Medicine.IUnmanagedData<Stats>"] },
                { "name": "Game.ILoop", "kind": "interface", "interfaces": ["ILoop2", "IHasStats"] },
                { "name": "Game.ILoop2", "kind": "interface", "interfaces": ["ILoop"] },
                { "name": "Game.ITargetable", "kind": "interface", "attributes": [{ "name": "Track" }] },
                { "name": "Game.Unit", "kind": "class", "base": "UnityEngine.MonoBehaviour",
                  "attributes": [{ "name": "Track" }],
                  "interfaces": ["Medicine.IFindByID<int>", "ITargetable"] },
                { "name": "Game.Enemy", "kind": "class", "base": "Unit", "accessibility": "public",
                  "attributes": [{ "name": "Track", "args": [{ "name": "manual", "value": true }] }],
                  "interfaces": ["IHasStats", "ILoop", "Medicine.IInstanceIndex", "Medicine.IFindByID<int>"] },
                { "name": "Game.Outer", "kind": "class", "accessibility": "internal" },
                { "name": "Game.Outer.Inner", "kind": "class", "containing": "Game.Outer", "accessibility": "public",
                  "is_sealed": true, "attributes": [{ "name": "Singleton" }] }
            ] }"#,
        )
        .unwrap()
    }

    fn facts(host: &ModelHost, name: &str, marker: MarkerId) -> Result<DeclarationFacts, FactError> {
        let cancel = CancellationToken::new();
        let index = MarkerIndex::build(host, &cancel).unwrap();
        extract_facts(host, &index, &SymbolKey::new(name, 0), marker, &cancel)
    }

    #[test]
    fn test_capabilities_exclude_ancestor_interfaces() {
        let host = host();
        let f = facts(&host, "Game.Enemy", MarkerId::Track).unwrap();
        assert_eq!(f.marked_ancestor.as_ref().map(|t| t.name.as_str()), Some("Game.Unit"));
        assert_eq!(f.capabilities.unmanaged_data, vec![TypeRef::named("Game.Stats")]);
        assert!(f.capabilities.find_by_id.is_empty());
        assert!(f.capabilities.instance_index);
        assert!(f.marked_interfaces.is_empty());
    }

    #[test]
    fn test_interface_walk_survives_cycles_and_diamonds() {
        let host = host();
        let all = all_interfaces(&host, &TypeRef::named("Game.Enemy"), &CancellationToken::new()).unwrap();
        let names: Vec<_> = all.iter().map(|t| t.to_string()).collect();
        assert_eq!(
            names,
            vec![
                "Game.IHasStats",
                "Game.ILoop",
                "Medicine.IInstanceIndex",
                "Medicine.IFindByID<int>",
                "Medicine.IUnmanagedData<Game.Stats>",
                "Game.ILoop2",
                "Game.ITargetable",
            ]
        );
    }

    #[test]
    fn test_mismatch_is_reported_once_on_the_derived_type() {
        let host = host();
        let f = facts(&host, "Game.Enemy", MarkerId::Track).unwrap();
        assert_eq!(f.diagnostics.len(), 1);
        let d = &f.diagnostics[0];
        assert_eq!(d.code, DiagnosticCode::RegistrationModeMismatch);
        assert_eq!(d.location.symbol, "Game.Enemy");
        assert!(d.message.contains("Game.Unit"));

        let base = facts(&host, "Game.Unit", MarkerId::Track).unwrap();
        assert!(base.diagnostics.is_empty());
        assert_eq!(base.marked_interfaces, vec![TypeRef::named("Game.ITargetable")]);
    }

    #[test]
    fn test_nesting_and_effective_accessibility() {
        let host = host();
        let f = facts(&host, "Game.Outer.Inner", MarkerId::Singleton).unwrap();
        assert_eq!(f.accessibility, Accessibility::Internal);
        assert_eq!(f.containing.len(), 1);
        assert_eq!(f.containing[0].name, "Outer");
        assert_eq!(f.namespace.as_deref(), Some("Game"));
        assert!(f.singleton.is_some());
        assert!(f.track.is_none());
    }

    #[test]
    fn test_typed_failures() {
        let host = host();
        assert_eq!(
            facts(&host, "Game.Missing", MarkerId::Track).unwrap_err(),
            FactError::NotATypeDeclaration(SymbolKey::new("Game.Missing", 0))
        );
        assert!(matches!(
            facts(&host, "Game.Stats", MarkerId::Track),
            Err(FactError::InvalidTarget { marker: "Track", .. })
        ));
        let cancel = CancellationToken::new();
        let index = MarkerIndex::build(&host, &cancel).unwrap();
        cancel.cancel();
        assert_eq!(
            extract_facts(&host, &index, &SymbolKey::new("Game.Enemy", 0), MarkerId::Track, &cancel),
            Err(FactError::Cancelled(Cancelled))
        );
    }
}
