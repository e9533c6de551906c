//! One generation pass: index the model, fan the units out over a thread pool, and serve unchanged units
//! from the session cache.
//!
//! ## Units
//!
//! A unit is one driver applied to one declaration ([`UnitKey`]). Units are enumerated in declaration
//! order and results are concatenated in that order, so output does not depend on scheduling.
//!
//! ## Caching
//!
//! Each unit is fingerprinted from the declarations it can read (its dependency closure) plus the
//! cross-declaration data it consumes (settings, family ids, tag manager text). A [`GeneratorSession`]
//! keeps the previous pass's results and reuses any unit whose fingerprint is unchanged. A cancelled
//! pass commits nothing.

#![deny(clippy::unwrap_used)]

use derivgen_core::DiagnosticCode;
use rayon::prelude::*;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::analysis::{CacheGate, CacheStats, Cancelled, Fingerprint, MarkerIndex, UnionFamily, check_cancelled};
use crate::diagnostics::{self, Diagnostic, Location};
use crate::emit::{self, Driver, DriverContext, GeneratedSource, UnitOutput};
use crate::host::{SymbolKey, SymbolOracle};
use crate::settings::GeneratorSettings;

/// Symbol used for the assembly-level constants unit.
pub const ASSEMBLY_SYMBOL: &str = "<assembly>";

/// Inputs of a pass besides the model.
#[derive(Debug, Clone, Default)]
pub struct PassInputs {
    pub settings: GeneratorSettings,
    /// Contents of the tag manager asset, if it exists.
    pub tag_manager: Option<String>,
}

impl PassInputs {
    pub fn new(settings: GeneratorSettings) -> Self {
        Self {
            settings,
            tag_manager: None,
        }
    }

    pub fn with_tag_manager(mut self, text: impl Into<String>) -> Self {
        self.tag_manager = Some(text.into());
        self
    }
}

/// Everything a pass produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationOutput {
    pub sources: Vec<GeneratedSource>,
    /// Sorted and de-duplicated.
    pub diagnostics: Vec<Diagnostic>,
    pub stats: CacheStats,
}

impl GenerationOutput {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, miette::Diagnostic)]
pub enum GenerateError {
    #[error("generation was cancelled")]
    #[diagnostic(code(derivgen::pipeline::cancelled))]
    Cancelled,
}

impl From<Cancelled> for GenerateError {
    fn from(_: Cancelled) -> Self {
        GenerateError::Cancelled
    }
}

impl GenerateError {
    /// The error as a reportable diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            GenerateError::Cancelled => Diagnostic::new(
                DiagnosticCode::GenerationCancelled,
                "generation was cancelled before it completed",
                Location::assembly(),
            ),
        }
    }
}

/// Identity of one unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct UnitKey {
    pub driver: Driver,
    pub symbol: SymbolKey,
}

impl UnitKey {
    pub fn new(driver: Driver, symbol: SymbolKey) -> Self {
        Self { driver, symbol }
    }
}

/// Generator state that outlives a single pass.
#[derive(Debug, Default)]
pub struct GeneratorSession {
    cache: CacheGate<UnitKey, UnitOutput>,
}

impl GeneratorSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached units.
    pub fn cached_units(&self) -> usize {
        self.cache.len()
    }

    /// Run a full pass over `oracle`.
    #[tracing::instrument(skip_all, fields(units = tracing::field::Empty))]
    pub fn run(
        &mut self,
        oracle: &dyn SymbolOracle,
        inputs: &PassInputs,
        cancel: &CancellationToken,
    ) -> Result<GenerationOutput, GenerateError> {
        let index = MarkerIndex::build(oracle, cancel)?;
        let units = enumerate_units(oracle, &index);
        tracing::Span::current().record("units", units.len());

        let ctx = DriverContext {
            oracle,
            index: &index,
            settings: &inputs.settings,
            tag_manager: inputs.tag_manager.as_deref(),
            cancel,
        };
        let cache = &self.cache;
        let computed = units
            .into_par_iter()
            .map(|unit| {
                let fingerprint = fingerprint(&ctx, &unit)?;
                let key = unit.clone();
                cache.get_or_materialize(unit, fingerprint, || materialize(&ctx, &key))
            })
            .collect::<Result<Vec<_>, Cancelled>>()?;
        check_cancelled(cancel)?;

        let mut output = GenerationOutput::default();
        for c in &computed {
            output.sources.extend(c.value.sources.iter().cloned());
            output.diagnostics.extend(c.value.diagnostics.iter().cloned());
        }
        output.diagnostics.extend(index.diagnostics.iter().cloned());
        diagnostics::normalize(&mut output.diagnostics);
        output.stats = self.cache.commit(computed);

        tracing::info!(
            sources = output.sources.len(),
            diagnostics = output.diagnostics.len(),
            hits = output.stats.hits,
            misses = output.stats.misses,
            "generation pass finished"
        );
        Ok(output)
    }
}

/// Run one pass without keeping a cache.
pub fn generate(
    oracle: &dyn SymbolOracle,
    inputs: &PassInputs,
    cancel: &CancellationToken,
) -> Result<GenerationOutput, GenerateError> {
    GeneratorSession::new().run(oracle, inputs, cancel)
}

/// Every unit of the pass, in declaration order.
pub fn enumerate_units(oracle: &dyn SymbolOracle, index: &MarkerIndex) -> Vec<UnitKey> {
    let mut units = Vec::new();
    for decl in oracle.declarations() {
        if decl.external {
            continue;
        }
        let key = SymbolKey::of_decl(decl);
        if index.tracked.contains_key(&key) || index.singletons.contains_key(&key) {
            units.push(UnitKey::new(Driver::Tracking, key.clone()));
        }
        if index.injectors.contains_key(&key) {
            units.push(UnitKey::new(Driver::Inject, key.clone()));
        }
        if index.families.contains_key(&key) || is_root_header(index, &key) {
            units.push(UnitKey::new(Driver::UnionHeader, key.clone()));
        }
        if index.variant(&key).is_some() || index.orphan_variants.contains(&key) {
            units.push(UnitKey::new(Driver::UnionVariant, key.clone()));
        }
        if index.unmanaged_access.contains_key(&key) {
            units.push(UnitKey::new(Driver::Unmanaged, key));
        }
    }
    if index.constants.is_some() {
        units.push(UnitKey::new(Driver::Constants, SymbolKey::new(ASSEMBLY_SYMBOL, 0)));
    }
    units
}

fn is_root_header(index: &MarkerIndex, key: &SymbolKey) -> bool {
    index.union_headers.get_key(key).is_some_and(|h| h.parent.is_none())
}

/// Run the driver responsible for `unit`.
pub fn materialize(ctx: &DriverContext<'_>, unit: &UnitKey) -> Result<UnitOutput, Cancelled> {
    match unit.driver {
        Driver::Tracking => emit::tracking::run(ctx, &unit.symbol),
        Driver::Inject => emit::inject::run(ctx, &unit.symbol),
        Driver::UnionHeader => emit::union::run_header(ctx, &unit.symbol),
        Driver::UnionVariant => emit::union::run_variant(ctx, &unit.symbol),
        Driver::Unmanaged => emit::unmanaged::run(ctx, &unit.symbol),
        Driver::Constants => emit::constants::run(ctx),
    }
}

/// Cross-declaration data a unit reads, beyond its dependency closure.
#[derive(Serialize)]
struct UnitExtras<'a> {
    unit: &'a UnitKey,
    settings: &'a GeneratorSettings,
    family: Option<FamilyExtras<'a>>,
    constants: Option<(&'a crate::analysis::options::ConstantsOptions, Option<&'a str>)>,
}

#[derive(Serialize)]
struct FamilyExtras<'a> {
    root: &'a SymbolKey,
    variants: &'a [crate::analysis::UnionVariant],
    ids: Result<&'a Vec<u8>, String>,
}

impl<'a> FamilyExtras<'a> {
    fn of(family: &'a UnionFamily) -> Self {
        Self {
            root: &family.root,
            variants: &family.variants,
            ids: family.ids.as_ref().map_err(ToString::to_string),
        }
    }
}

fn fingerprint(ctx: &DriverContext<'_>, unit: &UnitKey) -> Result<Fingerprint, Cancelled> {
    let (roots, family) = match unit.driver {
        Driver::UnionHeader => (
            emit::union::header_dependencies(ctx, &unit.symbol),
            ctx.index.families.get(&unit.symbol),
        ),
        Driver::UnionVariant => (
            emit::union::variant_dependencies(ctx, &unit.symbol),
            ctx.index.variant(&unit.symbol).map(|(family, _)| family),
        ),
        Driver::Constants => (Vec::new(), None),
        Driver::Tracking | Driver::Inject | Driver::Unmanaged => (vec![unit.symbol.clone()], None),
    };
    let extras = UnitExtras {
        unit,
        settings: ctx.settings,
        family: family.map(FamilyExtras::of),
        constants: match unit.driver {
            Driver::Constants => ctx.index.constants.as_ref().map(|options| (options, ctx.tag_manager)),
            _ => None,
        },
    };
    Fingerprint::of_declarations(ctx.oracle, &roots, &extras, ctx.cancel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ModelHost;

    const GAME: &str = r#"{
        "assembly_attributes": [{ "name": "GenerateUnityConstants" }],
        "types": [
            { "name": "Game.Enemy", "kind": "class", "base": "UnityEngine.MonoBehaviour",
              "attributes": [{ "name": "Track" }, { "name": "UnmanagedAccess" }],
              "fields": [{ "name": "hp", "type": "int" }] },
            { "name": "Game.Player", "kind": "class", "base": "UnityEngine.MonoBehaviour",
              "attributes": [{ "name": "Singleton" }],
              "methods": [{ "name": "Init", "attributes": [{ "name": "Inject" }],
                            "body": ["Enemies = Enemy.Instances"] }] }
        ]
    }"#;

    #[test]
    fn test_units_follow_declaration_order() {
        let host = ModelHost::from_json(GAME).unwrap();
        let index = MarkerIndex::build(&host, &CancellationToken::new()).unwrap();
        let units: Vec<(Driver, String)> = enumerate_units(&host, &index)
            .into_iter()
            .map(|u| (u.driver, u.symbol.name))
            .collect();
        assert_eq!(
            units,
            [
                (Driver::Tracking, "Game.Enemy".to_string()),
                (Driver::Unmanaged, "Game.Enemy".to_string()),
                (Driver::Tracking, "Game.Player".to_string()),
                (Driver::Inject, "Game.Player".to_string()),
                (Driver::Constants, ASSEMBLY_SYMBOL.to_string()),
            ]
        );
    }

    #[test]
    fn test_second_pass_is_served_from_cache() {
        let host = ModelHost::from_json(GAME).unwrap();
        let inputs = PassInputs::default();
        let cancel = CancellationToken::new();
        let mut session = GeneratorSession::new();
        let first = session.run(&host, &inputs, &cancel).unwrap();
        let second = session.run(&host, &inputs, &cancel).unwrap();
        assert_eq!(first.sources, second.sources);
        assert_eq!(first.diagnostics, second.diagnostics);
        assert_eq!(second.stats.misses, 0);
        assert_eq!(second.stats.hits, session.cached_units());
    }

    #[test]
    fn test_changed_settings_invalidate_units() {
        let host = ModelHost::from_json(GAME).unwrap();
        let cancel = CancellationToken::new();
        let mut session = GeneratorSession::new();
        session.run(&host, &PassInputs::default(), &cancel).unwrap();
        let changed = PassInputs::new(GeneratorSettings::default().with_documentation(false));
        let out = session.run(&host, &changed, &cancel).unwrap();
        assert_eq!(out.stats.hits, 0);
    }

    #[test]
    fn test_missing_tag_manager_is_reported_once() {
        let host = ModelHost::from_json(GAME).unwrap();
        let out = generate(&host, &PassInputs::default(), &CancellationToken::new()).unwrap();
        let missing: Vec<_> = out
            .diagnostics
            .iter()
            .filter(|d| d.code == DiagnosticCode::MissingProjectSettings)
            .collect();
        assert_eq!(missing.len(), 1);
        assert!(!out.has_errors());
    }

    #[test]
    fn test_cancelled_pass_commits_nothing() {
        let host = ModelHost::from_json(GAME).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut session = GeneratorSession::new();
        let err = session.run(&host, &PassInputs::default(), &cancel).unwrap_err();
        assert_eq!(err, GenerateError::Cancelled);
        assert_eq!(err.to_diagnostic().code, DiagnosticCode::GenerationCancelled);
        assert_eq!(session.cached_units(), 0);
    }
}
