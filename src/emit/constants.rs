//! `[assembly: GenerateUnityConstants]`: typed tags and layers from the project's tag manager asset.
//!
//! The asset is a YAML document; only its `tags:` and `layers:` sequences are read:
//!
//! ```yaml
//! TagManager:
//!   tags:
//!   - Enemy
//!   layers:
//!   - Default
//!   - TransparentFX
//!   -
//! ```
//!
//! Layer positions are significant (an empty entry is an unused slot), so they are kept.

use derivgen_core::DiagnosticCode;
use derivgen_core::idents;
use derivgen_core::vocab::unity;

use super::{DriverContext, GeneratedSource, UniqueNames, UnitOutput, begin_file, close_blocks};
use crate::analysis::options::ConstantsOptions;
use crate::analysis::{Cancelled, check_cancelled};
use crate::diagnostics::{Diagnostic, Location};

/// Tags and layers read from a tag manager asset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagManager {
    /// Custom tags, in declaration order.
    pub tags: Vec<String>,
    /// `(slot, name)` for every named layer.
    pub layers: Vec<(usize, String)>,
}

impl TagManager {
    /// Read the `tags:` and `layers:` sequences. Unknown keys are ignored.
    pub fn parse(text: &str) -> Self {
        let mut manager = TagManager::default();
        let mut section: Option<&str> = None;
        let mut slot = 0;
        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('%') || trimmed.starts_with("---")
            {
                continue;
            }
            if let Some(item) = trimmed.strip_prefix('-') {
                let value = unquote(item.trim());
                match section {
                    Some("tags") if !value.is_empty() => manager.tags.push(value.to_string()),
                    Some("layers") => {
                        if !value.is_empty() && slot < unity::LAYER_COUNT {
                            manager.layers.push((slot, value.to_string()));
                        }
                        slot += 1;
                    }
                    _ => {}
                }
                continue;
            }
            section = match trimmed.split_once(':') {
                Some(("tags", _)) => Some("tags"),
                Some(("layers", _)) => {
                    slot = 0;
                    Some("layers")
                }
                _ => None,
            };
        }
        manager
    }
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value.strip_prefix(quote).and_then(|v| v.strip_suffix(quote)) {
            return inner;
        }
    }
    value
}

/// Generate the constants class, or report `DG0004` when the asset is missing.
#[tracing::instrument(skip_all)]
pub fn run(ctx: &DriverContext<'_>) -> Result<UnitOutput, Cancelled> {
    check_cancelled(ctx.cancel)?;
    let Some(options) = &ctx.index.constants else {
        return Ok(UnitOutput::default());
    };
    let Some(text) = ctx.tag_manager else {
        let path = ctx
            .settings
            .tag_manager_path
            .as_ref()
            .map_or_else(|| unity::TAG_MANAGER_ASSET.to_string(), |p| p.display().to_string());
        return Ok(UnitOutput::diagnostics(vec![Diagnostic::new(
            DiagnosticCode::MissingProjectSettings,
            format!("tag manager asset `{path}` not found; tag and layer constants are not generated"),
            Location::assembly(),
        )]));
    };
    let manager = TagManager::parse(text);
    tracing::debug!(tags = manager.tags.len(), layers = manager.layers.len(), "tag manager read");
    Ok(UnitOutput {
        sources: vec![GeneratedSource {
            hint_name: hint_name(options),
            text: render(ctx, options, &manager),
        }],
        diagnostics: Vec::new(),
    })
}

fn hint_name(options: &ConstantsOptions) -> String {
    match &options.namespace {
        Some(ns) => format!("{ns}.{}.Constants.g.cs", options.class_name),
        None => format!("{}.Constants.g.cs", options.class_name),
    }
}

fn render(ctx: &DriverContext<'_>, options: &ConstantsOptions, manager: &TagManager) -> String {
    let mut w = begin_file(ctx.settings.emit_documentation);
    let mut depth = 0;
    if let Some(ns) = &options.namespace {
        w.open_block(&format!("namespace {ns}"));
        depth += 1;
    }
    w.doc("Tags and layers defined in the project's tag manager.");
    w.open_block(&format!("public static partial class {}", options.class_name));
    depth += 1;

    w.doc("Every tag, built-in tags first.");
    w.open_block("public enum Tag");
    let mut names = UniqueNames::new();
    let mut seen_tags = Vec::new();
    for tag in unity::BUILTIN_TAGS.iter().copied().chain(manager.tags.iter().map(String::as_str)) {
        if seen_tags.contains(&tag) {
            continue;
        }
        seen_tags.push(tag);
        let Some(ident) = idents::sanitize(tag) else { continue };
        w.writeln(&format!("{},", names.allocate(&ident)));
    }
    w.close_block();

    w.blank_line();
    w.doc("Layer indices.");
    w.open_block("public enum Layer");
    let mut names = UniqueNames::new();
    let layers: Vec<(usize, String)> = manager
        .layers
        .iter()
        .filter_map(|(slot, name)| idents::sanitize(name).map(|ident| (*slot, names.allocate(&ident))))
        .collect();
    for (slot, ident) in &layers {
        w.writeln(&format!("{ident} = {slot},"));
    }
    w.close_block();

    w.blank_line();
    w.doc("Layer bit masks.");
    w.writeln("[global::System.Flags]");
    w.open_block("public enum LayerMask");
    let mut names = UniqueNames::new();
    w.writeln(&format!("{} = 0,", names.allocate("None")));
    for (slot, ident) in &layers {
        w.writeln(&format!("{} = 1 << {slot},", names.allocate(ident)));
    }
    w.close_block();

    close_blocks(&mut w, depth);
    w.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::MarkerIndex;
    use crate::host::ModelHost;
    use crate::settings::GeneratorSettings;
    use tokio_util::sync::CancellationToken;

    const ASSET: &str = "%YAML 1.1\n%TAG !u! tag:unity3d.com,2011:\n--- !u!78 &1\nTagManager:\n  serializedVersion: 2\n  tags:\n  - Enemy\n  - Main Camera\n  - Player\n  layers:\n  - Default\n  - TransparentFX\n  - Ignore Raycast\n  - \n  - Water\n  - None\n  m_SortingLayers:\n  - name: Default\n    uniqueID: 0\n";

    fn generate(tag_manager: Option<&str>) -> UnitOutput {
        let host = ModelHost::from_json(
            r#"{ "assembly_attributes": [{ "name": "GenerateUnityConstants", "args": [{ "value": "Game" }] }] }"#,
        )
        .unwrap();
        let cancel = CancellationToken::new();
        let index = MarkerIndex::build(&host, &cancel).unwrap();
        let settings = GeneratorSettings::default().with_documentation(false);
        let ctx = DriverContext {
            oracle: &host,
            index: &index,
            settings: &settings,
            tag_manager,
            cancel: &cancel,
        };
        run(&ctx).unwrap()
    }

    #[test]
    fn test_parse_keeps_layer_slots() {
        let manager = TagManager::parse(ASSET);
        assert_eq!(manager.tags, ["Enemy", "Main Camera", "Player"]);
        assert_eq!(
            manager.layers,
            [
                (0, "Default".to_string()),
                (1, "TransparentFX".to_string()),
                (2, "Ignore Raycast".to_string()),
                (4, "Water".to_string()),
                (5, "None".to_string()),
            ]
        );
    }

    #[test]
    fn test_missing_asset_is_a_warning() {
        let out = generate(None);
        assert!(out.sources.is_empty());
        assert_eq!(out.diagnostics[0].code, DiagnosticCode::MissingProjectSettings);
        assert!(!out.diagnostics[0].is_error());
    }

    #[test]
    fn test_constants_class() {
        let out = generate(Some(ASSET));
        assert_eq!(out.sources[0].hint_name, "Game.Constants.Constants.g.cs");
        insta::assert_snapshot!(out.sources[0].text, @r"
        // <auto-generated/>
        #pragma warning disable
        #nullable enable

        namespace Game
        {
            public static partial class Constants
            {
                public enum Tag
                {
                    Untagged,
                    Respawn,
                    Finish,
                    EditorOnly,
                    MainCamera,
                    Player,
                    GameController,
                    Enemy,
                    MainCamera_2,
                }

                public enum Layer
                {
                    Default = 0,
                    TransparentFX = 1,
                    IgnoreRaycast = 2,
                    Water = 4,
                    None = 5,
                }

                [global::System.Flags]
                public enum LayerMask
                {
                    None = 0,
                    Default = 1 << 0,
                    TransparentFX = 1 << 1,
                    IgnoreRaycast = 1 << 2,
                    Water = 1 << 4,
                    None_2 = 1 << 5,
                }
            }
        }
        ");
    }
}
