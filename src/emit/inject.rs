//! `[Inject]` methods: every `Name = expression;` statement becomes a generated property.
//!
//! The property's type is the resolved type of the expression. When the type cannot be determined the
//! property is typed `object` and `DG0003` is reported, so the rest of the class keeps compiling. An
//! expression without a value (a `void` call) gets no property and reports `DG0011`. When the same name
//! is assigned more than once, the first assignment decides the type.

use std::collections::HashSet;

use derivgen_core::DiagnosticCode;
use derivgen_core::idents;
use derivgen_core::vocab::runtime;
use derivgen_syntax::{Stmt, parser};

use super::{
    Driver, DriverContext, GeneratedSource, UnitOutput, begin_file, close_blocks, hint_name, open_declaration,
    partial_header, render_type,
};
use crate::analysis::aggregate::InjectMethod;
use crate::analysis::facts;
use crate::analysis::{Cancelled, ExpressionResolver, ResolveError, check_cancelled};
use crate::diagnostics::{Diagnostic, Location};
use crate::host::{BindSite, MethodDecl, SymbolKey, TypeDecl, TypeRef};

/// One generated property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectedProperty {
    pub name: String,
    /// `None` when the type could not be determined; rendered as `object`.
    pub ty: Option<TypeRef>,
    pub public: bool,
    pub is_static: bool,
    pub method: String,
}

/// Resolve every assignment in the `[Inject]` methods of `decl`.
pub fn collect_properties(
    ctx: &DriverContext<'_>,
    decl: &TypeDecl,
    methods: &[InjectMethod],
) -> Result<(Vec<InjectedProperty>, Vec<Diagnostic>), Cancelled> {
    let key = SymbolKey::of_decl(decl);
    let resolver = ExpressionResolver::new(ctx.oracle, ctx.index, ctx.cancel);
    let mut properties = Vec::new();
    let mut diagnostics = Vec::new();
    let mut assigned = HashSet::new();

    for inject in methods {
        let Some(method) = decl.methods.iter().find(|m| m.name == inject.name) else {
            continue;
        };
        for (i, statement) in method.body.iter().enumerate() {
            check_cancelled(ctx.cancel)?;
            let location = || {
                Location::symbol(decl.name.clone())
                    .with_member(method.name.clone())
                    .with_file(decl.file.clone())
            };
            let stmt = match parser::parse_statement(statement.text()) {
                Ok(stmt) => stmt,
                Err(err) => {
                    diagnostics.push(Diagnostic::new(
                        DiagnosticCode::UndeterminedExpressionType,
                        format!("could not parse `{}`: {err}", statement.text()),
                        location(),
                    ));
                    continue;
                }
            };
            let Stmt::Assign { target, value } = stmt.node else {
                continue;
            };
            if decl.declares_member(&target.node) || !assigned.insert(target.node.clone()) {
                continue;
            }
            let site = BindSite::at_statement(key.clone(), method.name.clone(), i);
            let ty = match resolver.resolve_assignment(&site, &target.node, &value) {
                Ok(resolution) if resolution.ty.name == "void" => {
                    diagnostics.push(Diagnostic::new(
                        DiagnosticCode::InjectedExpressionHasNoValue,
                        format!("`{}` does not produce a value to assign to `{}`", value.node, target.node),
                        location().with_span(value.span),
                    ));
                    continue;
                }
                Ok(resolution) => Some(resolution.ty),
                Err(ResolveError::Cancelled(c)) => return Err(c),
                Err(err @ ResolveError::Undetermined { .. }) => {
                    diagnostics.push(Diagnostic::new(
                        DiagnosticCode::UndeterminedExpressionType,
                        format!("{err}; `{}` is typed `object`", target.node),
                        location().with_span(value.span),
                    ));
                    None
                }
            };
            properties.push(property(method, inject, target.node, ty));
        }
    }
    Ok((properties, diagnostics))
}

fn property(method: &MethodDecl, inject: &InjectMethod, name: String, ty: Option<TypeRef>) -> InjectedProperty {
    InjectedProperty {
        name,
        ty,
        public: inject.options.public,
        is_static: method.is_static,
        method: method.name.clone(),
    }
}

/// Generate the injected properties of `key`.
#[tracing::instrument(skip_all, fields(symbol = %key))]
pub fn run(ctx: &DriverContext<'_>, key: &SymbolKey) -> Result<UnitOutput, Cancelled> {
    let (Some(decl), Some(methods)) = (ctx.oracle.declaration(key), ctx.index.injectors.get_key(key)) else {
        return Ok(UnitOutput::default());
    };
    let (properties, diagnostics) = collect_properties(ctx, decl, methods)?;
    if properties.is_empty() {
        return Ok(UnitOutput::diagnostics(diagnostics));
    }

    let (containing, _) = facts::nesting(ctx.oracle, decl);
    let namespace = ctx.oracle.namespace_of(key);
    let mut w = begin_file(ctx.settings.emit_documentation);
    let header = partial_header(decl.kind, decl.simple_name(), &decl.type_params);
    let depth = open_declaration(&mut w, namespace.as_deref(), &containing, &header);

    for prop in &properties {
        let ty = prop
            .ty
            .as_ref()
            .map_or_else(|| "object".to_string(), |t| render_type(ctx.oracle, t));
        let field = format!("_{}", idents::lower_first(&prop.name));
        let statik = if prop.is_static { "static " } else { "" };

        w.blank_line();
        w.writeln(&format!("[{}]", runtime::NON_SERIALIZED));
        w.writeln(&format!("{statik}{ty} {field} = default!;"));
        w.blank_line();
        w.doc(&format!("Assigned in <see cref=\"{}\"/>.", prop.method));
        let (access, setter) = if prop.public { ("public", "private set") } else { ("private", "set") };
        w.open_block(&format!("{access} {statik}{ty} {}", prop.name));
        w.writeln(&format!("[{}]", runtime::AGGRESSIVE_INLINING));
        w.writeln(&format!("get => {field};"));
        w.writeln(&format!("{setter} => {field} = value;"));
        w.close_block();
    }

    close_blocks(&mut w, depth);
    Ok(UnitOutput {
        sources: vec![GeneratedSource {
            hint_name: hint_name(key, Driver::Inject),
            text: w.finish(),
        }],
        diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::MarkerIndex;
    use crate::host::ModelHost;
    use crate::settings::GeneratorSettings;
    use tokio_util::sync::CancellationToken;

    const PLAYER: &str = r#"{ "types": [
        { "name": "Game.Enemy", "kind": "class", "base": "UnityEngine.MonoBehaviour",
          "attributes": [{ "name": "Track" }] },
        { "name": "Game.Player", "kind": "class", "base": "UnityEngine.MonoBehaviour",
          "methods": [
            { "name": "Log", "params": [{ "name": "text", "type": "string" }] },
            { "name": "Init", "attributes": [{ "name": "Inject", "args": [{ "value": true }] }], "body": [
              "Body = GetComponent<Rigidbody>()",
              "Enemies = Enemy.Instances",
              "Body = Enemy.Instances",
              "Mystery = Unknown.Thing",
              "Nothing = Log(\"hi\")",
              "Log(\"done\")"
            ] }
          ] }
    ] }"#;

    fn run_player(settings: GeneratorSettings) -> UnitOutput {
        let host = ModelHost::from_json(PLAYER).unwrap();
        let cancel = CancellationToken::new();
        let index = MarkerIndex::build(&host, &cancel).unwrap();
        let ctx = DriverContext {
            oracle: &host,
            index: &index,
            settings: &settings,
            tag_manager: None,
            cancel: &cancel,
        };
        run(&ctx, &SymbolKey::new("Game.Player", 0)).unwrap()
    }

    #[test]
    fn test_first_assignment_decides_the_type() {
        let out = run_player(GeneratorSettings::default().with_documentation(false));
        let text = &out.sources[0].text;
        assert!(text.contains("public global::UnityEngine.Rigidbody Body"));
        assert!(!text.contains("TrackedInstances<global::Game.Enemy> Body"));
        assert!(text.contains("public global::Medicine.TrackedInstances<global::Game.Enemy> Enemies"));
        assert!(text.contains("private set => _enemies = value;"));
    }

    #[test]
    fn test_unresolved_and_valueless_assignments() {
        let out = run_player(GeneratorSettings::default());
        let text = &out.sources[0].text;
        assert!(text.contains("public object Mystery"));
        assert!(!text.contains("Nothing"));
        let codes: Vec<_> = out.diagnostics.iter().map(|d| d.code).collect();
        assert_eq!(
            codes,
            [DiagnosticCode::UndeterminedExpressionType, DiagnosticCode::InjectedExpressionHasNoValue]
        );
        assert_eq!(out.diagnostics[0].location.member.as_deref(), Some("Init"));
    }

    #[test]
    fn test_backing_field_is_not_serialized() {
        let out = run_player(GeneratorSettings::default().with_documentation(false));
        insta::assert_snapshot!(
            out.sources[0]
                .text
                .lines()
                .skip(8)
                .take(9)
                .map(|l| l.strip_prefix("        ").unwrap_or(l))
                .collect::<Vec<_>>()
                .join("\n"),
            @r"
        [global::System.NonSerialized]
        global::UnityEngine.Rigidbody _body = default!;

        public global::UnityEngine.Rigidbody Body
        {
            [global::System.Runtime.CompilerServices.MethodImpl(global::System.Runtime.CompilerServices.MethodImplOptions.AggressiveInlining)]
            get => _body;
            private set => _body = value;
        }
        "
        );
    }
}
