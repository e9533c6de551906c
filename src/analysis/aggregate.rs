//! Cross-declaration lookup tables.
//!
//! [`MarkerIndex::build`] makes one pass over every declaration before any driver runs. It validates
//! where each marker is applied, reads every marker's options exactly once, and records the results in
//! [`LookupTable`]s keyed by open definition. Drivers only ever read the index.
//!
//! A declaration whose marker cannot be read is left out of its table (lookups miss and callers fall
//! back to defaults) and the problem is reported once here, as `DG0008` scoped to that declaration.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use derivgen_core::vocab::markers::{self, MarkerTarget};
use derivgen_core::{DiagnosticCode, MarkerId};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::ids::{self, IdCandidate, IdError};
use super::options::{
    self, ConstantsOptions, InjectOptions, OptionError, SingletonOptions, TrackOptions, UnionHeaderOptions,
    UnmanagedAccessOptions,
};
use super::{Cancelled, check_cancelled, layout};
use crate::diagnostics::{Diagnostic, Location};
use crate::host::{AttributeData, SymbolKey, SymbolOracle, TypeDecl, TypeKind, TypeRef, self_type};

/// Settings keyed by declared-symbol identity.
///
/// Keys are open definitions; [`get`](Self::get) accepts either the open definition (`Pool<T>`) or any
/// closed instantiation (`Pool<Enemy>`) and finds the same entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupTable<T> {
    entries: BTreeMap<SymbolKey, T>,
}

impl<T> Default for LookupTable<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<T> LookupTable<T> {
    pub fn insert(&mut self, key: SymbolKey, value: T) {
        self.entries.insert(key, value);
    }

    pub fn get(&self, ty: &TypeRef) -> Option<&T> {
        self.entries.get(&SymbolKey::of(ty))
    }

    pub fn get_key(&self, key: &SymbolKey) -> Option<&T> {
        self.entries.get(key)
    }

    pub fn contains(&self, ty: &TypeRef) -> bool {
        self.get(ty).is_some()
    }

    pub fn contains_key(&self, key: &SymbolKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SymbolKey, &T)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TrackSettings {
    pub options: TrackOptions,
    pub is_interface: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnionHeaderSettings {
    pub options: UnionHeaderOptions,
    /// Resolved dispatch interface.
    pub dispatch: Option<TypeRef>,
    /// Header embedded as this header's first field, for intermediate headers.
    pub parent: Option<SymbolKey>,
    pub declares_type_id: bool,
}

/// One `[Union]` struct embedding a header as its first field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct UnionVariant {
    pub key: SymbolKey,
    /// Header type of the first field.
    pub header: SymbolKey,
    pub header_field: String,
    pub forced_id: Option<u8>,
    pub size: usize,
    pub members: BTreeSet<String>,
}

/// All variants sharing one root-most header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnionFamily {
    pub root: SymbolKey,
    /// Variants in discovery order.
    pub variants: Vec<UnionVariant>,
    /// Ids aligned with `variants`.
    pub ids: Result<Vec<u8>, IdError>,
}

impl UnionFamily {
    pub fn id_of(&self, key: &SymbolKey) -> Option<u8> {
        let pos = self.variants.iter().position(|v| v.key == *key)?;
        self.ids.as_ref().ok()?.get(pos).copied()
    }

    pub fn max_variant_size(&self) -> usize {
        self.variants.iter().map(|v| v.size).max().unwrap_or(0)
    }
}

/// An `[Inject]` method and its options.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct InjectMethod {
    pub name: String,
    pub options: InjectOptions,
}

#[derive(Debug, Clone, Default)]
pub struct MarkerIndex {
    pub tracked: LookupTable<TrackSettings>,
    pub singletons: LookupTable<SingletonOptions>,
    pub union_headers: LookupTable<UnionHeaderSettings>,
    pub families: BTreeMap<SymbolKey, UnionFamily>,
    /// `[Union]` structs whose first field is not a header.
    pub orphan_variants: BTreeSet<SymbolKey>,
    pub unmanaged_access: LookupTable<UnmanagedAccessOptions>,
    pub injectors: LookupTable<Vec<InjectMethod>>,
    pub constants: Option<ConstantsOptions>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Whether `marker` may be applied to a declaration of `kind`.
pub fn accepts(marker: MarkerId, kind: TypeKind) -> bool {
    match markers::target(marker) {
        MarkerTarget::ClassOrInterface => matches!(kind, TypeKind::Class | TypeKind::Interface),
        MarkerTarget::Class => kind == TypeKind::Class,
        MarkerTarget::Struct => kind == TypeKind::Struct,
        MarkerTarget::Method | MarkerTarget::Assembly => false,
    }
}

fn location(decl: &TypeDecl) -> Location {
    Location::symbol(decl.name.clone()).with_file(decl.file.clone())
}

/// `DG0008` for a marker whose arguments could not be read.
pub fn malformed_attribute(location: Location, marker: MarkerId, err: &OptionError) -> Diagnostic {
    Diagnostic::new(
        DiagnosticCode::MalformedMarkerAttribute,
        format!("[{}] on `{}`: {err}", markers::as_str(marker), location.symbol),
        location,
    )
}

/// `DG0005` for a marker on an unsupported declaration.
pub fn invalid_target(location: Location, marker: MarkerId, what: &str) -> Diagnostic {
    Diagnostic::new(
        DiagnosticCode::InvalidMarkerTarget,
        format!("[{}] cannot be applied to {what} `{}`", markers::as_str(marker), location.symbol),
        location,
    )
}

fn kind_name(kind: TypeKind) -> &'static str {
    match kind {
        TypeKind::Class => "class",
        TypeKind::Struct => "struct",
        TypeKind::Interface => "interface",
        TypeKind::Enum => "enum",
    }
}

/// Headers and variants seen during the first sweep, resolved once every header is known.
#[derive(Default)]
struct UnionCandidates<'a> {
    headers: Vec<(&'a TypeDecl, UnionHeaderOptions)>,
    variants: Vec<(&'a TypeDecl, Option<u8>)>,
}

impl MarkerIndex {
    #[tracing::instrument(skip_all, fields(declarations = tracing::field::Empty))]
    pub fn build(oracle: &dyn SymbolOracle, cancel: &CancellationToken) -> Result<Self, Cancelled> {
        let decls = oracle.declarations();
        tracing::Span::current().record("declarations", decls.len());

        let mut index = MarkerIndex::default();
        let mut unions = UnionCandidates::default();

        for &decl in &decls {
            check_cancelled(cancel)?;
            index.read_type_markers(decl, &mut unions);
            index.read_inject_methods(decl);
        }
        index.read_assembly_markers(oracle.assembly_attributes());
        index.resolve_unions(oracle, unions, cancel)?;

        tracing::debug!(
            tracked = index.tracked.len(),
            singletons = index.singletons.len(),
            families = index.families.len(),
            "marker index built"
        );
        Ok(index)
    }

    fn read_type_markers<'a>(&mut self, decl: &'a TypeDecl, unions: &mut UnionCandidates<'a>) {
        let key = SymbolKey::of_decl(decl);
        let mut seen = HashSet::new();
        for attr in &decl.attributes {
            let Some(marker) = attr.marker() else { continue };
            if !seen.insert(marker) || marker == MarkerId::Inject {
                continue;
            }
            if !accepts(marker, decl.kind) {
                if !decl.external {
                    self.diagnostics
                        .push(invalid_target(location(decl), marker, kind_name(decl.kind)));
                }
                continue;
            }
            if let Err(err) = self.read_marker(decl, &key, marker, attr, unions) {
                if !decl.external {
                    self.diagnostics.push(malformed_attribute(location(decl), marker, &err));
                }
            }
        }
    }

    fn read_marker<'a>(
        &mut self,
        decl: &'a TypeDecl,
        key: &SymbolKey,
        marker: MarkerId,
        attr: &AttributeData,
        unions: &mut UnionCandidates<'a>,
    ) -> Result<(), OptionError> {
        match marker {
            MarkerId::Track => {
                let settings = TrackSettings {
                    options: options::track_options(attr)?,
                    is_interface: decl.kind == TypeKind::Interface,
                };
                self.tracked.insert(key.clone(), settings);
            }
            MarkerId::Singleton => self.singletons.insert(key.clone(), options::singleton_options(attr)?),
            MarkerId::UnmanagedAccess => self
                .unmanaged_access
                .insert(key.clone(), options::unmanaged_access_options(attr)?),
            MarkerId::UnionHeader => unions.headers.push((decl, options::union_header_options(attr)?)),
            MarkerId::Union => unions.variants.push((decl, options::union_options(attr)?.id)),
            MarkerId::Inject | MarkerId::GenerateUnityConstants => {}
        }
        Ok(())
    }

    fn read_inject_methods(&mut self, decl: &TypeDecl) {
        let mut methods = Vec::new();
        for method in &decl.methods {
            let Some(attr) = method.attribute(MarkerId::Inject) else {
                continue;
            };
            let loc = location(decl).with_member(method.name.clone());
            if decl.kind != TypeKind::Class {
                if !decl.external {
                    self.diagnostics
                        .push(invalid_target(loc, MarkerId::Inject, &format!("a method of {}", kind_name(decl.kind))));
                }
                continue;
            }
            match options::inject_options(attr) {
                Ok(options) => methods.push(InjectMethod {
                    name: method.name.clone(),
                    options,
                }),
                Err(err) if !decl.external => self.diagnostics.push(malformed_attribute(loc, MarkerId::Inject, &err)),
                Err(_) => {}
            }
        }
        if !methods.is_empty() {
            self.injectors.insert(SymbolKey::of_decl(decl), methods);
        }
    }

    fn read_assembly_markers(&mut self, attributes: &[AttributeData]) {
        for attr in attributes {
            match attr.marker() {
                Some(MarkerId::GenerateUnityConstants) if self.constants.is_none() => {
                    match options::constants_options(attr) {
                        Ok(options) => self.constants = Some(options),
                        Err(err) => self.diagnostics.push(malformed_attribute(
                            Location::assembly(),
                            MarkerId::GenerateUnityConstants,
                            &err,
                        )),
                    }
                }
                Some(MarkerId::GenerateUnityConstants) | None => {}
                Some(other) => self
                    .diagnostics
                    .push(invalid_target(Location::assembly(), other, "the assembly")),
            }
        }
    }

    fn resolve_unions(
        &mut self,
        oracle: &dyn SymbolOracle,
        unions: UnionCandidates<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), Cancelled> {
        let header_keys: HashSet<SymbolKey> = unions.headers.iter().map(|(d, _)| SymbolKey::of_decl(d)).collect();
        let first_header_field = |decl: &TypeDecl| -> Option<(String, SymbolKey)> {
            let (name, ty) = oracle.instance_fields(&self_type(decl)).into_iter().next()?;
            let key = SymbolKey::of(&ty?);
            header_keys.contains(&key).then_some((name, key))
        };

        let mut dispatches: BTreeMap<SymbolKey, Option<TypeRef>> = BTreeMap::new();
        for &(decl, ref options) in &unions.headers {
            check_cancelled(cancel)?;
            let key = SymbolKey::of_decl(decl);
            let dispatch = match &options.dispatch {
                Some(ty) => oracle.resolve_type(&key, ty),
                None => oracle
                    .declarations()
                    .into_iter()
                    .find(|d| d.kind == TypeKind::Interface && d.containing.as_deref() == Some(decl.name.as_str()))
                    .map(self_type),
            };
            dispatches.insert(key, dispatch);
        }

        for &(decl, ref options) in &unions.headers {
            check_cancelled(cancel)?;
            let key = SymbolKey::of_decl(decl);
            let dispatch = dispatches.get(&key).cloned().flatten();
            // A header nests under the one it embeds only if its dispatch interface extends that header's.
            let embedded = first_header_field(decl).map(|(_, parent)| parent);
            let parent = embedded.clone().filter(|parent| {
                match (&dispatch, dispatches.get(parent).and_then(Option::as_ref)) {
                    (Some(own), Some(outer)) => oracle.implements(own, &SymbolKey::of(outer)),
                    _ => true,
                }
            });
            if embedded.is_some() && parent.is_none() {
                tracing::debug!(header = %key, "dispatch interface does not extend the embedded header's; treated as a root");
            }
            let settings = UnionHeaderSettings {
                options: options.clone(),
                dispatch,
                parent,
                declares_type_id: decl.declares_member("TypeID"),
            };
            self.union_headers.insert(key, settings);
        }

        for &(decl, forced_id) in &unions.variants {
            check_cancelled(cancel)?;
            let key = SymbolKey::of_decl(decl);
            let Some((header_field, header)) = first_header_field(decl) else {
                self.orphan_variants.insert(key);
                continue;
            };
            let root = self.root_header(&header);
            let variant = UnionVariant {
                size: layout::estimate_size(oracle, &self_type(decl)),
                members: decl.member_names().map(str::to_string).collect(),
                key,
                header,
                header_field,
                forced_id,
            };
            self.families
                .entry(root.clone())
                .or_insert_with(|| UnionFamily {
                    root,
                    variants: Vec::new(),
                    ids: Ok(Vec::new()),
                })
                .variants
                .push(variant);
        }

        for family in self.families.values_mut() {
            let candidates: Vec<_> = family
                .variants
                .iter()
                .map(|v| IdCandidate::new(v.key.simple_name(), v.forced_id))
                .collect();
            family.ids = ids::assign_ids(&candidates);
        }
        Ok(())
    }

    /// Headers from `header` up to its root, nearest first. Cycles stop at the first repeat.
    pub fn header_chain(&self, header: &SymbolKey) -> Vec<SymbolKey> {
        let mut chain = vec![header.clone()];
        let mut current = header;
        while let Some(parent) = self.union_headers.get_key(current).and_then(|h| h.parent.as_ref()) {
            if chain.contains(parent) {
                break;
            }
            chain.push(parent.clone());
            current = parent;
        }
        chain
    }

    pub fn root_header(&self, header: &SymbolKey) -> SymbolKey {
        self.header_chain(header).pop().unwrap_or_else(|| header.clone())
    }

    /// The family a variant belongs to, with the variant's entry.
    pub fn variant(&self, key: &SymbolKey) -> Option<(&UnionFamily, &UnionVariant)> {
        self.families
            .values()
            .find_map(|family| family.variants.iter().find(|v| v.key == *key).map(|v| (family, v)))
    }
}
