//! Lifecycle registration for `[Track]` and `[Singleton]` declarations.
//!
//! A unit moves through [`TrackingState`]: facts are extracted (`Analyzed`), a [`TrackingPlan`] is built
//! (`Ready`) unless a hard error stops the unit (`Diagnosed`), and the plan is rendered.
//!
//! The generated `OnEnableINTERNAL` runs the plan's steps in a fixed order: base-class call, own-type
//! registry (singleton, then instances), interface registries, then per-capability registrations.
//! `OnDisableINTERNAL` first unregisters from the owning registry, which yields the slot index the
//! remaining steps need, and then runs the remaining steps in exact reverse.

use std::collections::HashMap;

use derivgen_core::vocab::{runtime, unity};
use derivgen_core::{DiagnosticCode, MarkerId};

use super::{DriverContext, Driver, GeneratedSource, SourceWriter, UnitOutput, begin_file, close_blocks, hint_name,
    open_declaration, partial_header, render_type};
use crate::analysis::facts::{self, DeclarationFacts, FactError};
use crate::analysis::options::TrackOptions;
use crate::analysis::Cancelled;
use crate::diagnostics::Diagnostic;
use crate::host::{SymbolKey, TypeRef};

/// One statement of the generated enable/disable pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    BaseCall,
    SingletonRegister,
    InstanceRegister,
    InterfaceRegister(TypeRef),
    UnmanagedData(TypeRef),
    CustomStorage(TypeRef),
    LookupById(TypeRef),
    TransformAccess,
    InstanceIds,
}

/// A generated accessor member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Accessor {
    Instances,
    Count,
    Instance,
    InstanceIndex,
    EnabledCache,
    Local { name: String, data: TypeRef },
    Storage { name: String, storage: TypeRef },
    FindById(TypeRef),
    TransformAccessArray,
    InstanceIds,
}

/// Modifiers of the generated `OnEnableINTERNAL`/`OnDisableINTERNAL` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// A marked ancestor already declares the pair.
    Override,
    /// Sealed types cannot be derived from.
    Private,
    Virtual,
}

impl Lifecycle {
    pub fn modifiers(self) -> &'static str {
        match self {
            Lifecycle::Override => "protected override",
            Lifecycle::Private => "private",
            Lifecycle::Virtual => "protected virtual",
        }
    }
}

/// How the lifecycle pair gets invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Forwarders {
    /// Inherited from the marked ancestor.
    None,
    /// `OnEnable`/`OnDisable` messages, each only if the type does not declare it.
    Messages { enable: bool, disable: bool },
    /// `RegisterInstance`/`UnregisterInstance` for manual registration.
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingPlan {
    pub facts: DeclarationFacts,
    pub enable: Vec<Step>,
    pub disable: Vec<Step>,
    pub accessors: Vec<Accessor>,
    pub lifecycle: Lifecycle,
    pub forwarders: Forwarders,
    pub diagnostics: Vec<Diagnostic>,
}

impl TrackingPlan {
    fn tracked(&self) -> bool {
        self.facts.track.is_some()
    }

    fn track_options(&self) -> TrackOptions {
        self.facts.track.clone().unwrap_or_default()
    }

    fn has_index_field(&self) -> bool {
        self.accessors.contains(&Accessor::InstanceIndex)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackingState {
    Unconfigured,
    Analyzed(Box<DeclarationFacts>),
    Diagnosed(Vec<Diagnostic>),
    Ready(Box<TrackingPlan>),
}

impl TrackingState {
    /// Extract facts for `key`. Only moves out of `Unconfigured`.
    pub fn analyze(self, ctx: &DriverContext<'_>, key: &SymbolKey) -> Result<Self, Cancelled> {
        if self != TrackingState::Unconfigured {
            return Ok(self);
        }
        let marker = if ctx.index.tracked.get_key(key).is_some() {
            MarkerId::Track
        } else {
            MarkerId::Singleton
        };
        match facts::extract_facts(ctx.oracle, ctx.index, key, marker, ctx.cancel) {
            Ok(facts) if facts.diagnostics.iter().any(Diagnostic::is_error) => {
                Ok(TrackingState::Diagnosed(facts.diagnostics))
            }
            Ok(facts) => Ok(TrackingState::Analyzed(Box::new(facts))),
            Err(FactError::Cancelled(c)) => Err(c),
            Err(err) => {
                // Already reported by the marker index.
                tracing::debug!(symbol = %key, error = %err, "skipping tracking unit");
                Ok(TrackingState::Diagnosed(Vec::new()))
            }
        }
    }

    /// Build the plan. Only moves out of `Analyzed`.
    pub fn plan(self, ctx: &DriverContext<'_>) -> Self {
        match self {
            TrackingState::Analyzed(facts) => TrackingState::Ready(Box::new(build_plan(ctx, *facts))),
            other => other,
        }
    }

    /// Render the unit's output.
    pub fn emit(self, ctx: &DriverContext<'_>) -> UnitOutput {
        match self {
            TrackingState::Ready(plan) => {
                let text = render(ctx, &plan);
                UnitOutput {
                    sources: vec![GeneratedSource {
                        hint_name: hint_name(&plan.facts.key, Driver::Tracking),
                        text,
                    }],
                    diagnostics: plan.diagnostics,
                }
            }
            TrackingState::Diagnosed(diagnostics) => UnitOutput::diagnostics(diagnostics),
            TrackingState::Unconfigured | TrackingState::Analyzed(_) => UnitOutput::default(),
        }
    }
}

/// Generate tracking members for `key`.
#[tracing::instrument(skip_all, fields(symbol = %key))]
pub fn run(ctx: &DriverContext<'_>, key: &SymbolKey) -> Result<UnitOutput, Cancelled> {
    let state = TrackingState::Unconfigured.analyze(ctx, key)?.plan(ctx);
    Ok(state.emit(ctx))
}

fn build_plan(ctx: &DriverContext<'_>, facts: DeclarationFacts) -> TrackingPlan {
    let mut diagnostics = facts.diagnostics.clone();
    let tracked = facts.track.is_some();
    let singleton = facts.singleton.is_some();
    let options = facts.track.clone().unwrap_or_default();

    if facts.is_interface() {
        return TrackingPlan {
            enable: Vec::new(),
            disable: Vec::new(),
            accessors: vec![Accessor::Instances],
            lifecycle: Lifecycle::Virtual,
            forwarders: Forwarders::None,
            diagnostics,
            facts,
        };
    }

    let mut enable = Vec::new();
    if facts.marked_ancestor.is_some() {
        enable.push(Step::BaseCall);
    }
    if singleton {
        enable.push(Step::SingletonRegister);
    }
    if tracked {
        enable.push(Step::InstanceRegister);
    }
    enable.extend(facts.marked_interfaces.iter().cloned().map(Step::InterfaceRegister));
    if tracked {
        let caps = &facts.capabilities;
        enable.extend(caps.unmanaged_data.iter().cloned().map(Step::UnmanagedData));
        enable.extend(caps.custom_storage.iter().cloned().map(Step::CustomStorage));
        enable.extend(caps.find_by_id.iter().cloned().map(Step::LookupById));
        if options.transform_access_array {
            enable.push(Step::TransformAccess);
        }
        if options.instance_id_array {
            enable.push(Step::InstanceIds);
        }
    }

    let owner = if tracked { Step::InstanceRegister } else { Step::SingletonRegister };
    let mut disable = vec![owner.clone()];
    disable.extend(enable.iter().rev().filter(|s| **s != owner).cloned());

    let mut accessors = Vec::new();
    if tracked {
        accessors.push(Accessor::Instances);
        accessors.push(Accessor::Count);
    }
    if singleton {
        accessors.push(Accessor::Instance);
    }
    if tracked && (facts.capabilities.instance_index || ctx.settings.always_emit_index) {
        accessors.push(Accessor::InstanceIndex);
    }
    if tracked && options.cache_enabled_state {
        accessors.push(Accessor::EnabledCache);
    }
    if tracked {
        let mut generated: HashMap<String, TypeRef> = HashMap::new();
        let mut claim = |name: String, source: &TypeRef, diagnostics: &mut Vec<Diagnostic>| -> bool {
            if facts.declares(&name) {
                return false;
            }
            if let Some(first) = generated.get(&name) {
                diagnostics.push(Diagnostic::new(
                    DiagnosticCode::DuplicateGeneratedAccessor,
                    format!("generated property `{name}` for `{source}` collides with the one for `{first}`; skipped"),
                    facts.location(None).with_member(name.clone()),
                ));
                return false;
            }
            generated.insert(name, source.clone());
            true
        };
        for data in &facts.capabilities.unmanaged_data {
            let name = format!("Local{}", data.simple_name());
            if claim(name.clone(), data, &mut diagnostics) {
                accessors.push(Accessor::Local { name, data: data.clone() });
            }
        }
        for storage in &facts.capabilities.custom_storage {
            let name = format!("{}Storage", storage.simple_name());
            if claim(name.clone(), storage, &mut diagnostics) {
                accessors.push(Accessor::Storage {
                    name,
                    storage: storage.clone(),
                });
            }
        }
        accessors.extend(facts.capabilities.find_by_id.iter().cloned().map(Accessor::FindById));
        if options.transform_access_array {
            accessors.push(Accessor::TransformAccessArray);
        }
        if options.instance_id_array {
            accessors.push(Accessor::InstanceIds);
        }
    }

    let lifecycle = if facts.marked_ancestor.is_some() {
        Lifecycle::Override
    } else if facts.is_sealed {
        Lifecycle::Private
    } else {
        Lifecycle::Virtual
    };
    let manual = facts.track.as_ref().is_some_and(|t| t.manual) || facts.singleton.as_ref().is_some_and(|s| s.manual);
    let forwarders = if facts.marked_ancestor.is_some() {
        Forwarders::None
    } else if manual {
        Forwarders::Manual
    } else {
        Forwarders::Messages {
            enable: !facts.declares(unity::ON_ENABLE),
            disable: !facts.declares(unity::ON_DISABLE),
        }
    };

    TrackingPlan {
        facts,
        enable,
        disable,
        accessors,
        lifecycle,
        forwarders,
        diagnostics,
    }
}

const INDEX_FIELD: &str = "instanceIndexINTERNAL";
const ENABLED_FIELD: &str = "enabledINTERNAL";

fn render(ctx: &DriverContext<'_>, plan: &TrackingPlan) -> String {
    let facts = &plan.facts;
    let mut w = begin_file(ctx.settings.emit_documentation);
    let header = partial_header(facts.kind, facts.key.simple_name(), &facts.type_params);
    let depth = open_declaration(&mut w, facts.namespace.as_deref(), &facts.containing, &header);
    let this = render_type(ctx.oracle, &facts.ty);

    for accessor in &plan.accessors {
        w.blank_line();
        render_accessor(ctx, plan, &this, accessor, &mut w);
    }

    if !facts.is_interface() {
        w.blank_line();
        render_lifecycle(ctx, plan, &this, &mut w);
        render_forwarders(plan, &mut w);
    }

    close_blocks(&mut w, depth);
    w.finish()
}

fn hidden(ancestor: Option<&TypeRef>) -> &'static str {
    if ancestor.is_some() { "new " } else { "" }
}

fn getter(w: &mut SourceWriter, signature: &str, body: &str) {
    w.open_block(signature);
    w.writeln(&format!("[{}]", runtime::AGGRESSIVE_INLINING));
    w.writeln(&format!("get => {body};"));
    w.close_block();
}

fn render_accessor(ctx: &DriverContext<'_>, plan: &TrackingPlan, this: &str, accessor: &Accessor, w: &mut SourceWriter) {
    let facts = &plan.facts;
    let name = facts.display_name();
    let options = plan.track_options();
    match accessor {
        Accessor::Instances => {
            w.doc(&format!("Enabled instances of <see cref=\"{}\"/>.", facts.key.simple_name()));
            let new = if facts.is_interface() { "" } else { hidden(facts.tracked_ancestor.as_ref()) };
            let ty = runtime::generic(&format!("global::{}", runtime::TRACKED_INSTANCES), &[this]);
            getter(w, &format!("public static {new}{ty} Instances"), "default");
        }
        Accessor::Count => {
            w.doc(&format!("Number of enabled <see cref=\"{}\"/> instances.", facts.key.simple_name()));
            let registry = runtime::generic(runtime::STORAGE_INSTANCES, &[this]);
            getter(
                w,
                &format!("public static {}int Count", hidden(facts.tracked_ancestor.as_ref())),
                &format!("{registry}.Count"),
            );
        }
        Accessor::Instance => {
            w.doc(&format!("The active <see cref=\"{}\"/>, if one is enabled.", facts.key.simple_name()));
            let slot = runtime::generic(runtime::STORAGE_SINGLETON, &[this]);
            getter(
                w,
                &format!("public static {}{this}? Instance", hidden(facts.singleton_ancestor.as_ref())),
                &format!("{slot}.Instance"),
            );
        }
        Accessor::InstanceIndex => {
            w.writeln(&format!("[{}]", runtime::NON_SERIALIZED));
            w.writeln(&format!("int {INDEX_FIELD} = -1;"));
            w.blank_line();
            w.doc(&format!("Slot of this instance in <see cref=\"Instances\"/> of {name}, or -1 while disabled."));
            getter(
                w,
                &format!("public {}int InstanceIndex", hidden(facts.tracked_ancestor.as_ref())),
                INDEX_FIELD,
            );
        }
        Accessor::EnabledCache => {
            w.writeln(&format!("[{}]", runtime::NON_SERIALIZED));
            w.writeln(&format!("bool {ENABLED_FIELD};"));
            w.blank_line();
            w.doc("Cached enabled state, updated by the generated lifecycle methods.");
            w.open_block("public new bool enabled");
            w.writeln(&format!("[{}]", runtime::AGGRESSIVE_INLINING));
            w.writeln(&format!("get => {ENABLED_FIELD};"));
            w.writeln("set => base.enabled = value;");
            w.close_block();
        }
        Accessor::Local { name, data } => {
            let data_ty = render_type(ctx.oracle, data);
            let array = runtime::generic(runtime::STORAGE_UNMANAGED, &[this, &data_ty]);
            w.doc(&format!("This instance's <see cref=\"{}\"/> payload.", data.simple_name()));
            getter(w, &format!("public ref {data_ty} {name}"), &format!("ref {array}.ElementAt(this)"));
        }
        Accessor::Storage { name, storage } => {
            let storage_ty = render_type(ctx.oracle, storage);
            let registry = runtime::generic(runtime::STORAGE_CUSTOM, &[this, &storage_ty]);
            w.doc(&format!("Shared <see cref=\"{}\"/> of {name}.", storage.simple_name()));
            getter(w, &format!("public {storage_ty} {name}"), &format!("{registry}.Get(this)"));
        }
        Accessor::FindById(id) => {
            let id_ty = render_type(ctx.oracle, id);
            let table = runtime::generic(runtime::STORAGE_LOOKUP_BY_ID, &[this, &id_ty]);
            w.doc("Find the enabled instance with the given id.");
            w.writeln(&format!("[{}]", runtime::AGGRESSIVE_INLINING));
            w.writeln(&format!("public static {this}? FindByID({id_ty} id) => {table}.Find(id);"));
        }
        Accessor::TransformAccessArray => {
            let registry = runtime::generic(runtime::STORAGE_TRANSFORMS, &[this]);
            w.doc(&format!(
                "Transforms of enabled instances, for jobs. Initial capacity {}.",
                options.transform_initial_capacity
            ));
            getter(
                w,
                &format!(
                    "public static {}{} TransformAccessArray",
                    hidden(facts.tracked_ancestor.as_ref()),
                    runtime::TRANSFORM_ACCESS_ARRAY
                ),
                &format!("{registry}.Array"),
            );
        }
        Accessor::InstanceIds => {
            let registry = runtime::generic(runtime::STORAGE_INSTANCE_IDS, &[this]);
            let ty = runtime::generic(runtime::NATIVE_ARRAY, &["int"]);
            w.doc("Instance ids of enabled instances, in slot order.");
            getter(
                w,
                &format!("public static {}{ty} InstanceIDs", hidden(facts.tracked_ancestor.as_ref())),
                &format!("{registry}.Array"),
            );
        }
    }
}

fn render_lifecycle(ctx: &DriverContext<'_>, plan: &TrackingPlan, this: &str, w: &mut SourceWriter) {
    let modifiers = plan.lifecycle.modifiers();

    w.open_block(&format!("{modifiers} void OnEnableINTERNAL()"));
    for step in &plan.enable {
        for line in enable_lines(ctx, plan, this, step) {
            w.writeln(&line);
        }
    }
    w.close_block();
    w.blank_line();

    w.open_block(&format!("{modifiers} void OnDisableINTERNAL()"));
    for step in &plan.disable {
        for line in disable_lines(ctx, plan, this, step) {
            w.writeln(&line);
        }
    }
    w.close_block();
}

fn enable_lines(ctx: &DriverContext<'_>, plan: &TrackingPlan, this: &str, step: &Step) -> Vec<String> {
    let options = plan.track_options();
    match step {
        Step::BaseCall => vec!["base.OnEnableINTERNAL();".to_string()],
        Step::SingletonRegister => {
            let strategy = plan.facts.singleton.as_ref().map(|s| s.strategy).unwrap_or_default();
            vec![format!(
                "{}.Register(this, {}.{});",
                runtime::generic(runtime::STORAGE_SINGLETON, &[this]),
                runtime::SINGLETON_STRATEGY,
                strategy.as_str()
            )]
        }
        Step::InstanceRegister => {
            let registry = runtime::generic(runtime::STORAGE_INSTANCES, &[this]);
            let mut lines = Vec::new();
            if options.cache_enabled_state {
                lines.push(format!("{ENABLED_FIELD} = true;"));
            }
            if plan.has_index_field() {
                lines.push(format!("{INDEX_FIELD} = {registry}.Register(this);"));
            } else {
                lines.push(format!("{registry}.Register(this);"));
            }
            lines
        }
        Step::InterfaceRegister(iface) => vec![format!(
            "{}.Register(this);",
            runtime::generic(runtime::STORAGE_INSTANCES, &[&render_type(ctx.oracle, iface)])
        )],
        Step::UnmanagedData(data) => vec![format!(
            "{}.Register(this);",
            runtime::generic(runtime::STORAGE_UNMANAGED, &[this, &render_type(ctx.oracle, data)])
        )],
        Step::CustomStorage(storage) => vec![format!(
            "{}.Register(this);",
            runtime::generic(runtime::STORAGE_CUSTOM, &[this, &render_type(ctx.oracle, storage)])
        )],
        Step::LookupById(id) => vec![format!(
            "{}.Register(this);",
            runtime::generic(runtime::STORAGE_LOOKUP_BY_ID, &[this, &render_type(ctx.oracle, id)])
        )],
        Step::TransformAccess => vec![format!(
            "{}.Register(this, initialCapacity: {}, desiredJobCount: {});",
            runtime::generic(runtime::STORAGE_TRANSFORMS, &[this]),
            options.transform_initial_capacity,
            options.transform_desired_job_count
        )],
        Step::InstanceIds => vec![format!(
            "{}.Register(this);",
            runtime::generic(runtime::STORAGE_INSTANCE_IDS, &[this])
        )],
    }
}

fn disable_lines(ctx: &DriverContext<'_>, plan: &TrackingPlan, this: &str, step: &Step) -> Vec<String> {
    match step {
        Step::BaseCall => vec!["base.OnDisableINTERNAL();".to_string()],
        Step::SingletonRegister => vec![format!(
            "{}.Unregister(this);",
            runtime::generic(runtime::STORAGE_SINGLETON, &[this])
        )],
        Step::InstanceRegister => {
            let mut lines = vec![format!(
                "int index = {}.Unregister(this);",
                runtime::generic(runtime::STORAGE_INSTANCES, &[this])
            )];
            if plan.has_index_field() {
                lines.push(format!("{INDEX_FIELD} = -1;"));
            }
            if plan.track_options().cache_enabled_state {
                lines.push(format!("{ENABLED_FIELD} = false;"));
            }
            lines
        }
        Step::InterfaceRegister(iface) => vec![format!(
            "{}.Unregister(this);",
            runtime::generic(runtime::STORAGE_INSTANCES, &[&render_type(ctx.oracle, iface)])
        )],
        Step::UnmanagedData(data) => vec![format!(
            "{}.Unregister(this, index);",
            runtime::generic(runtime::STORAGE_UNMANAGED, &[this, &render_type(ctx.oracle, data)])
        )],
        Step::CustomStorage(storage) => vec![format!(
            "{}.Unregister(this);",
            runtime::generic(runtime::STORAGE_CUSTOM, &[this, &render_type(ctx.oracle, storage)])
        )],
        Step::LookupById(id) => vec![format!(
            "{}.Unregister(this);",
            runtime::generic(runtime::STORAGE_LOOKUP_BY_ID, &[this, &render_type(ctx.oracle, id)])
        )],
        Step::TransformAccess => vec![format!(
            "{}.Unregister(index);",
            runtime::generic(runtime::STORAGE_TRANSFORMS, &[this])
        )],
        Step::InstanceIds => vec![format!(
            "{}.Unregister(index);",
            runtime::generic(runtime::STORAGE_INSTANCE_IDS, &[this])
        )],
    }
}

fn render_forwarders(plan: &TrackingPlan, w: &mut SourceWriter) {
    match plan.forwarders {
        Forwarders::None => {}
        Forwarders::Messages { enable, disable } => {
            if enable {
                w.blank_line();
                w.writeln(&format!("void {}() => OnEnableINTERNAL();", unity::ON_ENABLE));
            }
            if disable {
                if !enable {
                    w.blank_line();
                }
                w.writeln(&format!("void {}() => OnDisableINTERNAL();", unity::ON_DISABLE));
            }
        }
        Forwarders::Manual => {
            w.blank_line();
            w.doc("Register this instance. Registration is manual for this type.");
            w.writeln("public void RegisterInstance() => OnEnableINTERNAL();");
            w.blank_line();
            w.doc("Unregister this instance.");
            w.writeln("public void UnregisterInstance() => OnDisableINTERNAL();");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::MarkerIndex;
    use crate::host::ModelHost;
    use crate::settings::GeneratorSettings;
    use tokio_util::sync::CancellationToken;

    fn host() -> ModelHost {
        ModelHost::from_json(
            r#"{ "types": [
                { "name": "Game.Stats", "kind": "struct", "fields": [{ "name": "Hp", "type": "int" }] },
                { "name": "Other.Stats", "kind": "struct", "fields": [{ "name": "Mp", "type": "int" }] },
                { "name": "Game.ITargetable", "kind": "interface", "attributes": [{ "name": "Track" }] },
                { "name": "Game.Enemy", "kind": "class", "base": "UnityEngine.MonoBehaviour",
                  "attributes": [{ "name": "Track", "args": [
                      { "name": "transformAccessArray", "value": true },
                      { "name": "instanceIdArray", "value": true } ] }],
                  "interfaces": ["ITargetable", "Medicine.IUnmanagedData<Stats>", "Medicine.IFindByID<int>"] },
                { "name": "Game.Boss", "kind": "class", "base": "Enemy", "is_sealed": true,
                  "attributes": [{ "name": "Track" }, { "name": "Singleton" }],
                  "interfaces": ["Medicine.IInstanceIndex"] },
                { "name": "Game.Minion", "kind": "class", "base": "Enemy",
                  "attributes": [{ "name": "Track", "args": [{ "name": "manual", "value": true }] }] },
                { "name": "Game.Clash", "kind": "class", "base": "UnityEngine.MonoBehaviour",
                  "attributes": [{ "name": "Track" }],
                  "interfaces": ["Medicine.IUnmanagedData<Game.Stats>", "Medicine.IUnmanagedData<Other.Stats>"] },
                { "name": "Game.Director", "kind": "class", "base": "UnityEngine.MonoBehaviour", "is_sealed": true,
                  "attributes": [{ "name": "Singleton", "args": [{ "name": "manual", "value": true }] }],
                  "methods": [{ "name": "OnEnable" }] }
            ] }"#,
        )
        .unwrap()
    }

    fn state(host: &ModelHost, settings: &GeneratorSettings, name: &str) -> TrackingState {
        let cancel = CancellationToken::new();
        let index = MarkerIndex::build(host, &cancel).unwrap();
        let ctx = DriverContext {
            oracle: host,
            index: &index,
            settings,
            tag_manager: None,
            cancel: &cancel,
        };
        TrackingState::Unconfigured
            .analyze(&ctx, &SymbolKey::new(name, 0))
            .unwrap()
            .plan(&ctx)
    }

    fn plan(host: &ModelHost, name: &str) -> TrackingPlan {
        match state(host, &GeneratorSettings::default(), name) {
            TrackingState::Ready(plan) => *plan,
            other => panic!("expected a plan, got {other:?}"),
        }
    }

    fn text(host: &ModelHost, name: &str) -> String {
        let settings = GeneratorSettings::default().with_documentation(false);
        let cancel = CancellationToken::new();
        let index = MarkerIndex::build(host, &cancel).unwrap();
        let ctx = DriverContext {
            oracle: host,
            index: &index,
            settings: &settings,
            tag_manager: None,
            cancel: &cancel,
        };
        let out = run(&ctx, &SymbolKey::new(name, 0)).unwrap();
        out.sources.into_iter().next().map(|s| s.text).unwrap_or_default()
    }

    #[test]
    fn test_enable_order_and_reverse_disable() {
        let host = host();
        let plan = plan(&host, "Game.Enemy");
        let stats = TypeRef::named("Game.Stats");
        let int = TypeRef::named("int");
        let iface = TypeRef::named("Game.ITargetable");
        assert_eq!(
            plan.enable,
            vec![
                Step::InstanceRegister,
                Step::InterfaceRegister(iface.clone()),
                Step::UnmanagedData(stats.clone()),
                Step::LookupById(int.clone()),
                Step::TransformAccess,
                Step::InstanceIds,
            ]
        );
        assert_eq!(
            plan.disable,
            vec![
                Step::InstanceRegister,
                Step::InstanceIds,
                Step::TransformAccess,
                Step::LookupById(int),
                Step::UnmanagedData(stats),
                Step::InterfaceRegister(iface),
            ]
        );
        assert_eq!(plan.lifecycle, Lifecycle::Virtual);
        assert_eq!(plan.forwarders, Forwarders::Messages { enable: true, disable: true });
    }

    #[test]
    fn test_derived_type_calls_base_first_and_last() {
        let host = host();
        let plan = plan(&host, "Game.Boss");
        assert_eq!(plan.enable.first(), Some(&Step::BaseCall));
        assert_eq!(plan.enable[1..3], [Step::SingletonRegister, Step::InstanceRegister]);
        assert_eq!(plan.disable.first(), Some(&Step::InstanceRegister));
        assert_eq!(plan.disable.last(), Some(&Step::BaseCall));
        assert_eq!(plan.lifecycle, Lifecycle::Override);
        assert_eq!(plan.forwarders, Forwarders::None);
        assert!(plan.accessors.contains(&Accessor::InstanceIndex));

        let text = text(&host, "Game.Boss");
        assert!(text.contains("public static new global::Medicine.TrackedInstances<global::Game.Boss> Instances"));
        assert!(text.contains("protected override void OnEnableINTERNAL()"));
        assert!(text.contains("instanceIndexINTERNAL = global::Medicine.Internal.Storage.Instances<global::Game.Boss>.Register(this);"));
        assert!(!text.contains("void OnEnable()"));
    }

    #[test]
    fn test_static_accessors_hide_only_inherited_members() {
        assert_eq!(hidden(None), "");
        assert_eq!(hidden(Some(&TypeRef::named("Game.Enemy"))), "new ");

        let host = host();
        let base = text(&host, "Game.Enemy");
        assert!(base.contains("public static global::Medicine.TrackedInstances<global::Game.Enemy> Instances"));
        assert!(base.contains("public static int Count"));
        assert!(!base.contains("static new "));

        // Boss inherits tracking from Enemy but is the first singleton in its chain.
        let derived = text(&host, "Game.Boss");
        assert!(derived.contains("public static new int Count"));
        assert!(derived.contains("public static global::Game.Boss? Instance"));
        assert!(!derived.contains("static new global::Game.Boss? Instance"));
    }

    #[test]
    fn test_registration_mismatch_stops_the_unit() {
        let host = host();
        match state(&host, &GeneratorSettings::default(), "Game.Minion") {
            TrackingState::Diagnosed(diagnostics) => {
                assert_eq!(diagnostics.len(), 1);
                assert_eq!(diagnostics[0].code, DiagnosticCode::RegistrationModeMismatch);
            }
            other => panic!("expected diagnostics, got {other:?}"),
        }
    }

    #[test]
    fn test_colliding_payload_accessor_is_skipped() {
        let host = host();
        let plan = plan(&host, "Game.Clash");
        let locals: Vec<_> = plan
            .accessors
            .iter()
            .filter_map(|a| match a {
                Accessor::Local { data, .. } => Some(data.name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(locals, ["Game.Stats"]);
        assert_eq!(plan.diagnostics.len(), 1);
        assert_eq!(plan.diagnostics[0].code, DiagnosticCode::DuplicateGeneratedAccessor);
        // Registration still happens for both payloads.
        assert_eq!(
            plan.enable.iter().filter(|s| matches!(s, Step::UnmanagedData(_))).count(),
            2
        );
    }

    #[test]
    fn test_always_emit_index_setting() {
        let host = host();
        let settings = GeneratorSettings::default().with_always_emit_index(true);
        let TrackingState::Ready(plan) = state(&host, &settings, "Game.Enemy") else {
            panic!("expected a plan");
        };
        assert!(plan.accessors.contains(&Accessor::InstanceIndex));
    }

    #[test]
    fn test_tracked_interface_gets_static_instances_only() {
        let host = host();
        let text = text(&host, "Game.ITargetable");
        assert!(text.contains("partial interface ITargetable"));
        assert!(text.contains("public static global::Medicine.TrackedInstances<global::Game.ITargetable> Instances"));
        assert!(!text.contains("OnEnableINTERNAL"));
    }

    #[test]
    fn test_manual_sealed_singleton() {
        let host = host();
        insta::assert_snapshot!(text(&host, "Game.Director"), @r"
        // <auto-generated/>
        #pragma warning disable
        #nullable enable

        namespace Game
        {
            partial class Director
            {
                public static global::Game.Director? Instance
                {
                    [global::System.Runtime.CompilerServices.MethodImpl(global::System.Runtime.CompilerServices.MethodImplOptions.AggressiveInlining)]
                    get => global::Medicine.Internal.Storage.Singleton<global::Game.Director>.Instance;
                }

                private void OnEnableINTERNAL()
                {
                    global::Medicine.Internal.Storage.Singleton<global::Game.Director>.Register(this, global::Medicine.SingletonStrategy.Replace);
                }

                private void OnDisableINTERNAL()
                {
                    global::Medicine.Internal.Storage.Singleton<global::Game.Director>.Unregister(this);
                }

                public void RegisterInstance() => OnEnableINTERNAL();

                public void UnregisterInstance() => OnDisableINTERNAL();
            }
        }
        ");
    }
}
