//! Tagged-union families: `[UnionHeader]` structs and their `[Union]` variants.
//!
//! The root header of a family gets the `TypeIDs` enum, `MaxVariantSize`, a `TypeID` field when it does
//! not declare one, and one dispatcher per member of its dispatch interface. A dispatcher switches on
//! the tag and reinterprets `this` as the variant. Variants that do not declare a member go through a
//! generic forwarding helper constrained to the dispatch interface.
//!
//! Each variant gets its `TypeID` constant, `ref` accessors for every header in its chain, and
//! `InitializeHeader`.

use std::collections::{BTreeMap, HashSet};

use derivgen_core::DiagnosticCode;
use derivgen_core::idents;
use derivgen_core::vocab::runtime;
use derivgen_syntax::RefKind;
use tokio_util::sync::CancellationToken;

use super::{
    Driver, DriverContext, GeneratedSource, SourceWriter, UniqueNames, UnitOutput, begin_file, close_blocks,
    hint_name, open_declaration, partial_header, render_type,
};
use crate::analysis::aggregate::{UnionFamily, UnionVariant};
use crate::analysis::facts::{self, ContainingType};
use crate::analysis::{Cancelled, IdError, check_cancelled};
use crate::diagnostics::{Diagnostic, Location};
use crate::host::{SymbolKey, SymbolOracle, TypeDecl, TypeRef, self_type, substitute};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MemberKind {
    Method,
    Property,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParamSignature {
    pub name: String,
    pub ty: TypeRef,
    pub modifier: RefKind,
}

/// A dispatchable member of the dispatch interface or one of its ancestors.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberSignature {
    pub name: String,
    pub kind: MemberKind,
    pub type_params: Vec<String>,
    pub params: Vec<ParamSignature>,
    pub returns: TypeRef,
    /// Distance from the dispatch interface; 0 for its own members.
    pub depth: usize,
}

impl MemberSignature {
    /// Identity for deduplication: two interfaces declaring the same shape produce one dispatcher.
    fn structural_key(&self) -> (String, MemberKind, usize, Vec<(RefKind, TypeRef)>) {
        (
            self.name.clone(),
            self.kind,
            self.type_params.len(),
            self.params.iter().map(|p| (p.modifier, p.ty.clone())).collect(),
        )
    }

    fn is_void(&self) -> bool {
        self.returns.name == "void" && self.returns.args.is_empty()
    }
}

/// Dispatchable members of `dispatch` and every interface it inherits, ordered by depth then member
/// name. When several interfaces declare the same structural signature, the shallowest one wins.
pub fn collect_signatures(
    oracle: &dyn SymbolOracle,
    dispatch: &TypeRef,
    cancel: &CancellationToken,
) -> Result<Vec<MemberSignature>, Cancelled> {
    let mut out = Vec::new();
    let mut keys = HashSet::new();
    let mut seen = HashSet::from([dispatch.clone()]);
    let mut level = vec![dispatch.clone()];
    let mut depth = 0;
    while !level.is_empty() {
        check_cancelled(cancel)?;
        level.sort_by_key(|i| i.to_string());
        let mut next = Vec::new();
        for iface in &level {
            let key = SymbolKey::of(iface);
            if let Some(decl) = oracle.declaration(&key) {
                for sig in declared_signatures(oracle, &key, decl, iface, depth) {
                    if keys.insert(sig.structural_key()) {
                        out.push(sig);
                    }
                }
            }
            for parent in oracle.declared_interfaces(iface) {
                if seen.insert(parent.clone()) {
                    next.push(parent);
                }
            }
        }
        level = next;
        depth += 1;
    }
    out.sort_by(|a, b| (a.depth, &a.name).cmp(&(b.depth, &b.name)));
    Ok(out)
}

fn declared_signatures(
    oracle: &dyn SymbolOracle,
    key: &SymbolKey,
    decl: &TypeDecl,
    iface: &TypeRef,
    depth: usize,
) -> Vec<MemberSignature> {
    let resolve = |ty: &TypeRef, method_params: &[String]| -> TypeRef {
        if ty.args.is_empty() && method_params.contains(&ty.name) {
            return ty.clone();
        }
        match oracle.resolve_type(key, ty) {
            Some(resolved) => substitute(&resolved, &decl.type_params, &iface.args),
            None => ty.clone(),
        }
    };
    let mut sigs = Vec::new();
    for prop in decl.properties.iter().filter(|p| !p.is_static && !p.has_body) {
        sigs.push(MemberSignature {
            name: prop.name.clone(),
            kind: MemberKind::Property,
            type_params: Vec::new(),
            params: Vec::new(),
            returns: resolve(&prop.ty, &[]),
            depth,
        });
    }
    for method in decl.methods.iter().filter(|m| !m.is_static && m.body.is_empty()) {
        sigs.push(MemberSignature {
            name: method.name.clone(),
            kind: MemberKind::Method,
            type_params: method.type_params.clone(),
            params: method
                .params
                .iter()
                .map(|p| ParamSignature {
                    name: p.name.clone(),
                    ty: resolve(&p.ty, &method.type_params),
                    modifier: p.modifier.into(),
                })
                .collect(),
            returns: resolve(&method.returns, &method.type_params),
            depth,
        });
    }
    sigs
}

/// Enum member names for a family's variants, keyed by variant.
fn case_names(family: &UnionFamily, ids: &[u8]) -> BTreeMap<SymbolKey, String> {
    let mut order: Vec<(u8, &UnionVariant)> = ids.iter().copied().zip(&family.variants).collect();
    order.sort_by_key(|(id, _)| *id);
    let mut names = UniqueNames::new();
    names.reserve("Unset");
    order
        .into_iter()
        .map(|(_, v)| {
            let base = idents::sanitize(v.key.simple_name()).unwrap_or_else(|| "Variant".to_string());
            (v.key.clone(), names.allocate(&base))
        })
        .collect()
}

fn family_error(root: &SymbolKey, file: Option<String>, err: &IdError) -> Diagnostic {
    let code = match err {
        IdError::DuplicateForced { .. } => DiagnosticCode::DuplicateForcedUnionId,
        IdError::Capacity { .. } => DiagnosticCode::UnionCapacityExceeded,
        IdError::ReservedId { .. } => DiagnosticCode::MalformedMarkerAttribute,
    };
    Diagnostic::new(
        code,
        format!("union family `{root}`: {err}"),
        Location::symbol(root.name.clone()).with_file(file),
    )
}

fn scope(oracle: &dyn SymbolOracle, decl: &TypeDecl) -> (Option<String>, Vec<ContainingType>) {
    let (containing, _) = facts::nesting(oracle, decl);
    (oracle.namespace_of(&SymbolKey::of_decl(decl)), containing)
}

fn inline_attribute() -> String {
    format!("[{}]", runtime::AGGRESSIVE_INLINING)
}

fn reinterpret(from: &str, to: &str) -> String {
    format!("{}(ref this)", runtime::generic(runtime::UNSAFE_AS, &[from, to]))
}

/// Generate the root header of a family.
#[tracing::instrument(skip_all, fields(symbol = %key))]
pub fn run_header(ctx: &DriverContext<'_>, key: &SymbolKey) -> Result<UnitOutput, Cancelled> {
    check_cancelled(ctx.cancel)?;
    let (Some(decl), Some(settings)) = (ctx.oracle.declaration(key), ctx.index.union_headers.get_key(key)) else {
        return Ok(UnitOutput::default());
    };
    let empty = UnionFamily {
        root: key.clone(),
        variants: Vec::new(),
        ids: Ok(Vec::new()),
    };
    let family = ctx.index.families.get(key).unwrap_or(&empty);
    let ids = match &family.ids {
        Ok(ids) => ids,
        Err(err) => return Ok(UnitOutput::diagnostics(vec![family_error(key, decl.file.clone(), err)])),
    };
    let names = case_names(family, ids);
    let signatures = match &settings.dispatch {
        Some(dispatch) => collect_signatures(ctx.oracle, dispatch, ctx.cancel)?,
        None => Vec::new(),
    };

    let this = render_type(ctx.oracle, &self_type(decl));
    let ids_enum = format!("{this}.TypeIDs");
    let mut w = begin_file(ctx.settings.emit_documentation);
    let (namespace, containing) = scope(ctx.oracle, decl);
    let header = partial_header(decl.kind, decl.simple_name(), &decl.type_params);
    let depth = open_declaration(&mut w, namespace.as_deref(), &containing, &header);

    w.doc("Type tags of every variant in this union family.");
    w.open_block("public enum TypeIDs : byte");
    w.writeln("Unset = 0,");
    let mut cases: Vec<(u8, &UnionVariant)> = ids.iter().copied().zip(&family.variants).collect();
    cases.sort_by_key(|(id, _)| *id);
    for (id, variant) in &cases {
        w.writeln(&format!("{} = {id},", names[&variant.key]));
    }
    w.close_block();

    w.blank_line();
    w.doc("Estimated size in bytes of the largest variant.");
    w.writeln(&format!("public const int MaxVariantSize = {};", family.max_variant_size()));

    if !settings.declares_type_id {
        w.blank_line();
        w.writeln("public TypeIDs TypeID;");
    }

    let dispatch = settings.dispatch.as_ref().map(|d| render_type(ctx.oracle, d));
    for sig in &signatures {
        w.blank_line();
        render_dispatcher(ctx, sig, &this, &ids_enum, &cases, &names, &mut w);
    }
    if let Some(dispatch) = &dispatch {
        for sig in &signatures {
            if cases.iter().any(|(_, v)| !v.members.contains(&sig.name)) {
                w.blank_line();
                render_helper(ctx, sig, dispatch, &mut w);
            }
        }
    }

    close_blocks(&mut w, depth);
    Ok(UnitOutput {
        sources: vec![GeneratedSource {
            hint_name: hint_name(key, Driver::UnionHeader),
            text: w.finish(),
        }],
        diagnostics: Vec::new(),
    })
}

fn param_list(ctx: &DriverContext<'_>, sig: &MemberSignature) -> String {
    sig.params
        .iter()
        .map(|p| match p.modifier.keyword() {
            Some(kw) => format!("{kw} {} {}", render_type(ctx.oracle, &p.ty), p.name),
            None => format!("{} {}", render_type(ctx.oracle, &p.ty), p.name),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn arg_list(sig: &MemberSignature) -> Vec<String> {
    sig.params
        .iter()
        .map(|p| match p.modifier.keyword() {
            Some(kw) => format!("{kw} {}", p.name),
            None => p.name.clone(),
        })
        .collect()
}

fn type_param_suffix(params: &[String]) -> String {
    if params.is_empty() {
        String::new()
    } else {
        format!("<{}>", params.join(", "))
    }
}

/// Expression invoking `sig` on the variant reinterpreted from `this`.
fn variant_call(sig: &MemberSignature, this: &str, variant: &str, declares: bool) -> String {
    let target = reinterpret(this, variant);
    let tps = type_param_suffix(&sig.type_params);
    let args = arg_list(sig);
    match (sig.kind, declares) {
        (MemberKind::Property, true) => format!("{target}.{}", sig.name),
        (MemberKind::Method, true) => format!("{target}.{}{tps}({})", sig.name, args.join(", ")),
        (_, false) => {
            let mut all = vec![format!("ref {target}")];
            all.extend(args);
            format!("{}Dispatch({})", sig.name, all.join(", "))
        }
    }
}

fn render_dispatcher(
    ctx: &DriverContext<'_>,
    sig: &MemberSignature,
    this: &str,
    ids_enum: &str,
    cases: &[(u8, &UnionVariant)],
    names: &BTreeMap<SymbolKey, String>,
    w: &mut SourceWriter,
) {
    let returns = render_type(ctx.oracle, &sig.returns);
    let void = sig.is_void();
    match sig.kind {
        MemberKind::Property => {
            w.open_block(&format!("public {returns} {}", sig.name));
            w.open_block("get");
        }
        MemberKind::Method => {
            w.open_block(&format!(
                "public {returns} {}{}({})",
                sig.name,
                type_param_suffix(&sig.type_params),
                param_list(ctx, sig)
            ));
        }
    }
    w.open_block("switch ((TypeIDs)TypeID)");
    for (_, variant) in cases {
        let variant_ty = render_type(ctx.oracle, &TypeRef::named(variant.key.name.clone()));
        let call = variant_call(sig, this, &variant_ty, variant.members.contains(&sig.name));
        w.writeln(&format!("case {ids_enum}.{}:", names[&variant.key]));
        w.indent();
        if void {
            w.writeln(&format!("{call};"));
            w.writeln("return;");
        } else {
            w.writeln(&format!("return {call};"));
        }
        w.dedent();
    }
    w.writeln("default:");
    w.indent();
    w.writeln(&format!("{}.ThrowUnknownTypeID((int)TypeID);", runtime::UNION_UTILITY));
    w.writeln(if void { "return;" } else { "return default!;" });
    w.dedent();
    w.close_block();
    if sig.kind == MemberKind::Property {
        w.close_block();
    }
    w.close_block();
}

fn render_helper(ctx: &DriverContext<'_>, sig: &MemberSignature, dispatch: &str, w: &mut SourceWriter) {
    let returns = render_type(ctx.oracle, &sig.returns);
    let mut type_params = vec!["TVariant".to_string()];
    type_params.extend(sig.type_params.iter().cloned());
    let mut params = vec!["ref TVariant self".to_string()];
    let own = param_list(ctx, sig);
    if !own.is_empty() {
        params.push(own);
    }
    let body = match sig.kind {
        MemberKind::Property => format!("self.{}", sig.name),
        MemberKind::Method => format!(
            "self.{}{}({})",
            sig.name,
            type_param_suffix(&sig.type_params),
            arg_list(sig).join(", ")
        ),
    };
    w.writeln(&inline_attribute());
    w.writeln(&format!(
        "static {returns} {}Dispatch<{}>({}) where TVariant : struct, {dispatch} => {body};",
        sig.name,
        type_params.join(", "),
        params.join(", ")
    ));
}

/// Generate the members of one `[Union]` variant.
#[tracing::instrument(skip_all, fields(symbol = %key))]
pub fn run_variant(ctx: &DriverContext<'_>, key: &SymbolKey) -> Result<UnitOutput, Cancelled> {
    check_cancelled(ctx.cancel)?;
    let Some(decl) = ctx.oracle.declaration(key) else {
        return Ok(UnitOutput::default());
    };
    if ctx.index.orphan_variants.contains(key) {
        return Ok(UnitOutput::diagnostics(vec![Diagnostic::new(
            DiagnosticCode::UnionVariantWithoutHeader,
            format!("[Union] struct `{key}` must declare a [UnionHeader] struct as its first field"),
            Location::symbol(key.name.clone()).with_file(decl.file.clone()),
        )]));
    }
    let Some((family, variant)) = ctx.index.variant(key) else {
        return Ok(UnitOutput::default());
    };
    // Family-level problems are reported on the root header.
    let Ok(ids) = &family.ids else {
        return Ok(UnitOutput::default());
    };
    let names = case_names(family, ids);
    let Some(case) = names.get(key) else {
        return Ok(UnitOutput::default());
    };

    let this = render_type(ctx.oracle, &self_type(decl));
    let root_ty = render_type(ctx.oracle, &TypeRef::named(family.root.name.clone()));
    let mut w = begin_file(ctx.settings.emit_documentation);
    let (namespace, containing) = scope(ctx.oracle, decl);
    let header = partial_header(decl.kind, decl.simple_name(), &decl.type_params);
    let depth = open_declaration(&mut w, namespace.as_deref(), &containing, &header);

    w.doc(&format!("Type tag of this variant in <see cref=\"{}\"/>.", family.root.simple_name()));
    w.writeln(&format!("public const {root_ty}.TypeIDs TypeID = {root_ty}.TypeIDs.{case};"));

    for header_key in ctx.index.header_chain(&variant.header) {
        let name = header_key.simple_name();
        if variant.members.contains(name) || name == decl.simple_name() {
            continue;
        }
        let header_ty = render_type(ctx.oracle, &TypeRef::named(header_key.name.clone()));
        w.blank_line();
        w.doc(&format!("This variant viewed as its <see cref=\"{name}\"/> header."));
        w.writeln(&format!("[{}]", runtime::UNSCOPED_REF));
        w.open_block(&format!("public ref {header_ty} {name}"));
        w.writeln(&inline_attribute());
        w.writeln(&format!("get => ref {};", reinterpret(&this, &header_ty)));
        w.close_block();
    }

    w.blank_line();
    w.doc("Write this variant's tag into its header.");
    w.open_block("public void InitializeHeader()");
    let tag_ty = root_type_id_type(ctx, &family.root).unwrap_or_else(|| format!("{root_ty}.TypeIDs"));
    w.writeln(&format!("{}.TypeID = ({tag_ty})TypeID;", reinterpret(&this, &root_ty)));
    w.close_block();

    close_blocks(&mut w, depth);
    Ok(UnitOutput {
        sources: vec![GeneratedSource {
            hint_name: hint_name(key, Driver::UnionVariant),
            text: w.finish(),
        }],
        diagnostics: Vec::new(),
    })
}

/// Declared type of the root header's own `TypeID` field.
fn root_type_id_type(ctx: &DriverContext<'_>, root: &SymbolKey) -> Option<String> {
    let decl = ctx.oracle.declaration(root)?;
    let field = decl.fields.iter().find(|f| f.name == "TypeID")?;
    let ty = ctx.oracle.resolve_type(root, &field.ty)?;
    Some(render_type(ctx.oracle, &ty))
}

/// Declarations a header unit reads besides the header itself.
pub fn header_dependencies(ctx: &DriverContext<'_>, key: &SymbolKey) -> Vec<SymbolKey> {
    let mut deps = vec![key.clone()];
    if let Some(dispatch) = ctx.index.union_headers.get_key(key).and_then(|h| h.dispatch.as_ref()) {
        deps.push(SymbolKey::of(dispatch));
    }
    if let Some(family) = ctx.index.families.get(key) {
        deps.extend(family.variants.iter().map(|v| v.key.clone()));
    }
    deps
}

/// Declarations a variant unit reads besides the variant itself.
pub fn variant_dependencies(ctx: &DriverContext<'_>, key: &SymbolKey) -> Vec<SymbolKey> {
    let mut deps = vec![key.clone()];
    if let Some((_, variant)) = ctx.index.variant(key) {
        deps.extend(ctx.index.header_chain(&variant.header));
    }
    deps
}
