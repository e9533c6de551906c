//! `[UnmanagedAccess]` classes: a nested `Unmanaged` view handing out `ref`s to the unmanaged instance
//! fields, addressed through byte offsets computed once per type.

use derivgen_core::vocab::runtime;

use super::{
    Driver, DriverContext, GeneratedSource, UnitOutput, begin_file, close_blocks, hint_name, open_declaration,
    partial_header, render_type,
};
use crate::analysis::options::UnmanagedAccessOptions;
use crate::analysis::{Cancelled, check_cancelled, facts, layout};
use crate::host::{Accessibility, SymbolKey, TypeDecl, TypeKind, TypeRef, self_type};

/// Name of the generated view struct.
pub const VIEW_NAME: &str = "Unmanaged";

/// Name of the generated offsets holder.
pub const OFFSETS_NAME: &str = "UnmanagedOffsets";

/// An instance field exposed through the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmanagedField {
    pub name: String,
    pub ty: TypeRef,
}

/// Instance fields of `decl` that the view can expose.
pub fn accessible_fields(
    ctx: &DriverContext<'_>,
    decl: &TypeDecl,
    options: &UnmanagedAccessOptions,
) -> Result<Vec<UnmanagedField>, Cancelled> {
    let key = SymbolKey::of_decl(decl);
    let mut fields = Vec::new();
    for field in &decl.fields {
        check_cancelled(ctx.cancel)?;
        if field.is_static || field.is_const {
            continue;
        }
        if !options.include_private && field.accessibility == Accessibility::Private {
            continue;
        }
        let Some(ty) = ctx.oracle.resolve_type(&key, &field.ty) else {
            tracing::debug!(field = %field.name, "field type did not resolve; skipped");
            continue;
        };
        if layout::is_unmanaged(ctx.oracle, &ty) {
            fields.push(UnmanagedField {
                name: field.name.clone(),
                ty,
            });
        }
    }
    Ok(fields)
}

#[tracing::instrument(skip_all, fields(symbol = %key))]
pub fn run(ctx: &DriverContext<'_>, key: &SymbolKey) -> Result<UnitOutput, Cancelled> {
    let (Some(decl), Some(options)) = (ctx.oracle.declaration(key), ctx.index.unmanaged_access.get_key(key)) else {
        return Ok(UnitOutput::default());
    };
    // Other kinds were reported while indexing.
    if decl.kind != TypeKind::Class {
        return Ok(UnitOutput::default());
    }
    let fields = accessible_fields(ctx, decl, options)?;
    let (containing, accessibility) = facts::nesting(ctx.oracle, decl);
    let access = accessibility.keyword();
    let this = render_type(ctx.oracle, &self_type(decl));
    let target = runtime::generic(runtime::UNMANAGED_REF, &[&this]);

    let mut w = begin_file(ctx.settings.emit_documentation);
    let namespace = ctx.oracle.namespace_of(key);
    let header = partial_header(decl.kind, decl.simple_name(), &decl.type_params);
    let depth = open_declaration(&mut w, namespace.as_deref(), &containing, &header);

    w.open_block(&format!("static class {OFFSETS_NAME}"));
    for field in &fields {
        w.writeln(&format!(
            "public static readonly int {0} = {1}(\"{0}\");",
            field.name,
            runtime::generic(runtime::FIELD_OFFSET, &[&this]),
        ));
    }
    w.close_block();

    w.blank_line();
    w.doc("Direct references to the unmanaged fields of an instance.");
    w.open_block(&format!("{access} readonly struct {VIEW_NAME}"));
    w.writeln(&format!("readonly {target} target;"));
    w.blank_line();
    w.writeln(&format!("public {VIEW_NAME}({this} instance) => target = new {target}(instance);"));
    for field in &fields {
        let ty = render_type(ctx.oracle, &field.ty);
        w.blank_line();
        w.open_block(&format!("public ref {ty} {}", field.name));
        w.writeln(&format!("[{}]", runtime::AGGRESSIVE_INLINING));
        if options.safety_checks {
            w.open_block("get");
            w.writeln("if (target.IsNull) throw new global::System.NullReferenceException();");
            w.writeln(&format!("return ref target.Field<{ty}>({OFFSETS_NAME}.{});", field.name));
            w.close_block();
        } else {
            w.writeln(&format!("get => ref target.Field<{ty}>({OFFSETS_NAME}.{});", field.name));
        }
        w.close_block();
    }
    w.close_block();

    w.blank_line();
    w.doc("A view over this instance's unmanaged fields.");
    w.writeln(&format!("{access} {VIEW_NAME} AsUnmanaged() => new {VIEW_NAME}(this);"));

    close_blocks(&mut w, depth);
    tracing::debug!(fields = fields.len(), "unmanaged view generated");
    Ok(UnitOutput {
        sources: vec![GeneratedSource {
            hint_name: hint_name(key, Driver::Unmanaged),
            text: w.finish(),
        }],
        diagnostics: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::MarkerIndex;
    use crate::host::ModelHost;
    use crate::settings::GeneratorSettings;
    use tokio_util::sync::CancellationToken;

    const ENEMY: &str = r#"{ "types": [
        { "name": "Game.Stats", "kind": "struct",
          "fields": [{ "name": "Hp", "type": "int" }, { "name": "Speed", "type": "float" }] },
        { "name": "Game.World", "kind": "class", "accessibility": "internal" },
        { "name": "Game.World.Enemy", "kind": "class", "accessibility": "public", "containing": "Game.World",
          "attributes": [{ "name": "UnmanagedAccess", "args": [{ "value": true }, { "value": false }] }],
          "fields": [
            { "name": "Stats", "type": "Stats", "accessibility": "public" },
            { "name": "Label", "type": "string", "accessibility": "public" },
            { "name": "secret", "type": "int", "accessibility": "private" },
            { "name": "Count", "type": "int", "accessibility": "public", "is_static": true }
          ] },
        { "name": "Game.Bag", "kind": "class", "attributes": [{ "name": "UnmanagedAccess" }],
          "fields": [{ "name": "weight", "type": "float", "accessibility": "private" }] }
    ] }"#;

    fn generate(name: &str) -> UnitOutput {
        let host = ModelHost::from_json(ENEMY).unwrap();
        let cancel = CancellationToken::new();
        let index = MarkerIndex::build(&host, &cancel).unwrap();
        let settings = GeneratorSettings::default().with_documentation(false);
        let ctx = DriverContext {
            oracle: &host,
            index: &index,
            settings: &settings,
            tag_manager: None,
            cancel: &cancel,
        };
        run(&ctx, &SymbolKey::new(name, 0)).unwrap()
    }

    #[test]
    fn test_only_unmanaged_visible_fields_are_exposed() {
        let out = generate("Game.World.Enemy");
        let text = &out.sources[0].text;
        assert!(text.contains("public ref global::Game.Stats Stats"));
        assert!(!text.contains("Label"));
        assert!(!text.contains("secret"));
        assert!(!text.contains("Count"));
    }

    #[test]
    fn test_view_takes_effective_accessibility() {
        let out = generate("Game.World.Enemy");
        let text = &out.sources[0].text;
        assert!(text.contains("internal readonly struct Unmanaged"));
        assert!(text.contains("internal Unmanaged AsUnmanaged() => new Unmanaged(this);"));
        assert!(text.contains("if (target.IsNull) throw new global::System.NullReferenceException();"));
    }

    #[test]
    fn test_private_fields_by_default() {
        let out = generate("Game.Bag");
        assert_eq!(out.sources[0].hint_name, "Game.Bag.Unmanaged.g.cs");
        insta::assert_snapshot!(out.sources[0].text, @r#"
        // <auto-generated/>
        #pragma warning disable
        #nullable enable

        namespace Game
        {
            partial class Bag
            {
                static class UnmanagedOffsets
                {
                    public static readonly int weight = global::Medicine.Internal.FieldOffset.Of<global::Game.Bag>("weight");
                }

                internal readonly struct Unmanaged
                {
                    readonly global::Medicine.Internal.UnmanagedRef<global::Game.Bag> target;

                    public Unmanaged(global::Game.Bag instance) => target = new global::Medicine.Internal.UnmanagedRef<global::Game.Bag>(instance);

                    public ref float weight
                    {
                        [global::System.Runtime.CompilerServices.MethodImpl(global::System.Runtime.CompilerServices.MethodImplOptions.AggressiveInlining)]
                        get => ref target.Field<float>(UnmanagedOffsets.weight);
                    }
                }

                internal Unmanaged AsUnmanaged() => new Unmanaged(this);
            }
        }
        "#);
    }
}
