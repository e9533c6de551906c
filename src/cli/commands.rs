//! CLI command implementations
//!
//! All command functions return `CliResult<ExitCode>` instead of calling
//! `process::exit`. Error handling and exits happen in the top-level `run()`.

use std::fs;
use std::path::{Path, PathBuf};

use derivgen_syntax::{Stmt, parser};
use tokio_util::sync::CancellationToken;

use crate::analysis::{Cancelled, ExpressionResolver, MarkerIndex};
use crate::diagnostics::Diagnostic;
use crate::host::{BindSite, ModelHost, SymbolKey, SymbolOracle};
use crate::pipeline::{self, GenerateError, GenerationOutput, PassInputs};

use super::{CliError, CliResult, ExitCode, SettingsArgs};

/// Directory generated sources go to when `--output` is not given.
const DEFAULT_OUTPUT_DIR: &str = "Generated";

// ============================================================================
// Pass setup (shared between generate and check)
// ============================================================================

fn load_model(path: &Path) -> CliResult<ModelHost> {
    ModelHost::load(path).map_err(CliError::report)
}

/// Resolve the pass inputs: model settings, then command-line overrides, then the tag manager asset.
pub fn pass_inputs(host: &ModelHost, args: &SettingsArgs) -> PassInputs {
    let mut settings = host.settings().clone();
    if args.no_docs {
        settings = settings.with_documentation(false);
    }
    if args.always_emit_index {
        settings = settings.with_always_emit_index(true);
    }
    let asset = match &args.tag_manager {
        Some(path) => {
            settings = settings.with_tag_manager_path(path.clone());
            path.clone()
        }
        None => host.tag_manager_path(),
    };
    let tag_manager = match fs::read_to_string(&asset) {
        Ok(text) => Some(text),
        Err(err) => {
            tracing::debug!(path = %asset.display(), %err, "tag manager asset not readable");
            None
        }
    };
    PassInputs { settings, tag_manager }
}

fn run_pass(host: &ModelHost, args: &SettingsArgs) -> CliResult<GenerationOutput> {
    let inputs = pass_inputs(host, args);
    pipeline::generate(host, &inputs, &CancellationToken::new()).map_err(CliError::report)
}

fn cancelled(err: Cancelled) -> CliError {
    CliError::report(GenerateError::from(err))
}

fn report_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        eprintln!("{:?}", miette::Report::new(diagnostic.clone()));
    }
}

fn exit_code_for(output: &GenerationOutput) -> ExitCode {
    if output.has_errors() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Validate output directory path for security.
///
/// Rejects paths containing `..` components.
fn validate_output_dir(out_dir: &Path) -> CliResult<()> {
    for component in out_dir.components() {
        if let std::path::Component::ParentDir = component {
            return Err(CliError::failure(format!(
                "Output directory '{}' contains path traversal (..)",
                out_dir.display()
            )));
        }
    }
    Ok(())
}

// ============================================================================
// Commands
// ============================================================================

/// Run a pass and write every generated source into the output directory.
pub fn generate(model: &Path, output: Option<&Path>, args: &SettingsArgs) -> CliResult<ExitCode> {
    let host = load_model(model)?;
    let out_dir = match output {
        Some(dir) => dir.to_path_buf(),
        None => host
            .root_dir()
            .map_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR), |root| root.join(DEFAULT_OUTPUT_DIR)),
    };
    validate_output_dir(&out_dir)?;

    let result = run_pass(&host, args)?;
    report_diagnostics(&result.diagnostics);

    fs::create_dir_all(&out_dir)
        .map_err(|e| CliError::failure(format!("Cannot create '{}': {}", out_dir.display(), e)))?;
    for source in &result.sources {
        let path = out_dir.join(&source.hint_name);
        fs::write(&path, &source.text)
            .map_err(|e| CliError::failure(format!("Cannot write '{}': {}", path.display(), e)))?;
    }
    println!("Generated {} file(s) in {}", result.sources.len(), out_dir.display());
    Ok(exit_code_for(&result))
}

/// Run a pass and report diagnostics only.
pub fn check(model: &Path, args: &SettingsArgs) -> CliResult<ExitCode> {
    let host = load_model(model)?;
    let result = run_pass(&host, args)?;
    report_diagnostics(&result.diagnostics);
    let errors = result.diagnostics.iter().filter(|d| d.is_error()).count();
    println!(
        "{} source(s), {} error(s), {} warning(s)",
        result.sources.len(),
        errors,
        result.diagnostics.len() - errors
    );
    Ok(exit_code_for(&result))
}

/// Print each union family's variants with their assigned ids.
pub fn union_ids(model: &Path) -> CliResult<ExitCode> {
    let host = load_model(model)?;
    let index = MarkerIndex::build(&host, &CancellationToken::new()).map_err(cancelled)?;
    print!("{}", format_union_ids(&index));
    let failed = index.families.values().any(|f| f.ids.is_err());
    Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

/// One block per family: the root header, then `id  variant` lines.
pub fn format_union_ids(index: &MarkerIndex) -> String {
    let mut out = String::new();
    for family in index.families.values() {
        out.push_str(&format!("{}\n", family.root));
        match &family.ids {
            Ok(ids) => {
                let mut rows: Vec<_> = ids.iter().zip(&family.variants).collect();
                rows.sort_by_key(|(id, _)| **id);
                for (id, variant) in rows {
                    let forced = if variant.forced_id.is_some() { " (forced)" } else { "" };
                    out.push_str(&format!("  {id:>3}  {}{forced}\n", variant.key));
                }
            }
            Err(err) => out.push_str(&format!("  error: {err}\n")),
        }
    }
    for orphan in &index.orphan_variants {
        out.push_str(&format!("{orphan}: no union header\n"));
    }
    out
}

/// Show how each assignment in `method` of `type_name` resolves.
pub fn resolve(model: &Path, type_name: &str, method: &str) -> CliResult<ExitCode> {
    let host = load_model(model)?;
    let cancel = CancellationToken::new();
    let index = MarkerIndex::build(&host, &cancel).map_err(cancelled)?;
    let lines = resolve_lines(&host, &index, &cancel, type_name, method)?;
    for line in lines {
        println!("{line}");
    }
    Ok(ExitCode::SUCCESS)
}

pub fn resolve_lines(
    host: &ModelHost,
    index: &MarkerIndex,
    cancel: &CancellationToken,
    type_name: &str,
    method: &str,
) -> CliResult<Vec<String>> {
    let decl = host
        .declarations()
        .into_iter()
        .find(|d| d.name == type_name)
        .ok_or_else(|| CliError::failure(format!("Type '{type_name}' is not declared in the model")))?;
    let body = &decl
        .methods
        .iter()
        .find(|m| m.name == method)
        .ok_or_else(|| CliError::failure(format!("'{type_name}' has no method '{method}'")))?
        .body;

    let key = SymbolKey::of_decl(decl);
    let resolver = ExpressionResolver::new(host, index, cancel);
    let mut lines = Vec::new();
    for (i, statement) in body.iter().enumerate() {
        let stmt = match parser::parse_statement(statement.text()) {
            Ok(stmt) => stmt,
            Err(err) => {
                lines.push(format!("{}: parse error: {err}", statement.text()));
                continue;
            }
        };
        let Stmt::Assign { target, value } = stmt.node else {
            continue;
        };
        let site = BindSite::at_statement(key.clone(), method.to_string(), i);
        match resolver.resolve_assignment(&site, &target.node, &value) {
            Ok(resolution) => lines.push(format!("{} = {}  [{:?}]", target.node, resolution.ty, resolution.strategy)),
            Err(err) => lines.push(format!("{}: {err}", target.node)),
        }
    }
    Ok(lines)
}
