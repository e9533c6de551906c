#![deny(clippy::unwrap_used)]
//! Emission drivers.
//!
//! Each driver turns one unit of work (a marked declaration, a union family, or the assembly-level
//! constants request) into zero or more [`GeneratedSource`]s plus diagnostics. Drivers read the shared
//! [`MarkerIndex`] and the symbol oracle through a [`DriverContext`] and never see each other's output.
//!
//! ## Output conventions
//!
//! - Every file starts with [`FILE_HEADER`].
//! - Type references are rendered fully qualified with `global::`, except predefined keywords and type
//!   parameters.
//! - Generated members are added to `partial` redeclarations of the user's types, reopened inside the
//!   same namespace and containing types.

pub mod constants;
pub mod inject;
pub mod tracking;
pub mod union;
pub mod unmanaged;
pub mod writer;

use std::collections::HashSet;
use std::fmt;

use derivgen_core::vocab::unity;
use tokio_util::sync::CancellationToken;

pub use writer::SourceWriter;

use crate::analysis::MarkerIndex;
use crate::analysis::facts::ContainingType;
use crate::diagnostics::Diagnostic;
use crate::host::{SymbolKey, SymbolOracle, TypeKind, TypeRef};
use crate::settings::GeneratorSettings;

/// First lines of every generated file.
pub const FILE_HEADER: &str = "// <auto-generated/>\n#pragma warning disable\n#nullable enable\n";

/// Which driver produces a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub enum Driver {
    Tracking,
    Inject,
    UnionHeader,
    UnionVariant,
    Unmanaged,
    Constants,
}

impl Driver {
    pub fn as_str(self) -> &'static str {
        match self {
            Driver::Tracking => "Tracking",
            Driver::Inject => "Inject",
            Driver::UnionHeader => "UnionHeader",
            Driver::UnionVariant => "Union",
            Driver::Unmanaged => "Unmanaged",
            Driver::Constants => "Constants",
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One generated file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GeneratedSource {
    /// Unique, filesystem-safe file name: `Game.Pool_1.Tracking.g.cs`.
    pub hint_name: String,
    pub text: String,
}

/// Everything one unit produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitOutput {
    pub sources: Vec<GeneratedSource>,
    pub diagnostics: Vec<Diagnostic>,
}

impl UnitOutput {
    pub fn diagnostics(diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            sources: Vec::new(),
            diagnostics,
        }
    }
}

/// Shared read-only inputs of every driver.
#[derive(Clone, Copy)]
pub struct DriverContext<'a> {
    pub oracle: &'a dyn SymbolOracle,
    pub index: &'a MarkerIndex,
    pub settings: &'a GeneratorSettings,
    /// Contents of the tag manager asset, if it could be read.
    pub tag_manager: Option<&'a str>,
    pub cancel: &'a CancellationToken,
}

/// File name for `driver`'s output about `key`.
pub fn hint_name(key: &SymbolKey, driver: Driver) -> String {
    if key.arity == 0 {
        format!("{}.{driver}.g.cs", key.name)
    } else {
        format!("{}_{}.{driver}.g.cs", key.name, key.arity)
    }
}

/// Render a resolved type reference as C# text.
pub fn render_type(oracle: &dyn SymbolOracle, ty: &TypeRef) -> String {
    let mut out = String::new();
    if unity::is_predefined_type(&ty.name) {
        out.push_str(&ty.name);
    } else if oracle.declaration(&SymbolKey::of(ty)).is_some() || ty.name.contains('.') {
        out.push_str("global::");
        out.push_str(&ty.name);
    } else {
        // Type parameter.
        out.push_str(&ty.name);
    }
    if !ty.args.is_empty() {
        let args: Vec<String> = ty.args.iter().map(|a| render_type(oracle, a)).collect();
        out.push('<');
        out.push_str(&args.join(", "));
        out.push('>');
    }
    if ty.nullable {
        out.push('?');
    }
    for _ in 0..ty.array_rank {
        out.push_str("[]");
    }
    out
}

fn kind_keyword(kind: TypeKind) -> &'static str {
    match kind {
        TypeKind::Class => "class",
        TypeKind::Struct => "struct",
        TypeKind::Interface => "interface",
        TypeKind::Enum => "enum",
    }
}

/// `partial class Pool<T>`.
pub fn partial_header(kind: TypeKind, name: &str, type_params: &[String]) -> String {
    if type_params.is_empty() {
        format!("partial {} {name}", kind_keyword(kind))
    } else {
        format!("partial {} {name}<{}>", kind_keyword(kind), type_params.join(", "))
    }
}

/// Open the namespace and containing-type blocks around a declaration, then the declaration's own
/// partial block. Returns how many blocks to close.
pub fn open_declaration(
    w: &mut SourceWriter,
    namespace: Option<&str>,
    containing: &[ContainingType],
    header: &str,
) -> usize {
    let mut opened = 0;
    if let Some(ns) = namespace {
        w.open_block(&format!("namespace {ns}"));
        opened += 1;
    }
    for outer in containing {
        w.open_block(&partial_header(outer.kind, &outer.name, &outer.type_params));
        opened += 1;
    }
    w.open_block(header);
    opened + 1
}

pub fn close_blocks(w: &mut SourceWriter, count: usize) {
    for _ in 0..count {
        w.close_block();
    }
}

/// Start a file: the header comment block followed by an empty line.
pub fn begin_file(documentation: bool) -> SourceWriter {
    let mut w = SourceWriter::new(documentation);
    for line in FILE_HEADER.lines() {
        w.writeln(line);
    }
    w.newline();
    w
}

/// Identifier allocator that keeps generated names unique within one scope.
#[derive(Debug, Default)]
pub struct UniqueNames {
    used: HashSet<String>,
}

impl UniqueNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `name` as taken without allocating it.
    pub fn reserve(&mut self, name: &str) {
        self.used.insert(name.to_string());
    }

    /// Return `base`, or `base_2`, `base_3`, ... if it is already taken.
    pub fn allocate(&mut self, base: &str) -> String {
        if self.used.insert(base.to_string()) {
            return base.to_string();
        }
        let mut n = 2;
        loop {
            let candidate = format!("{base}_{n}");
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ModelHost;
    use derivgen_syntax::parser::parse_type;

    #[test]
    fn test_render_type_qualifies_declared_names() {
        let host = ModelHost::from_json(
            r#"{ "types": [ { "name": "Game.Pool", "kind": "class", "type_params": ["T"] },
                            { "name": "Enemy", "kind": "class" } ] }"#,
        )
        .unwrap();
        let ty = parse_type("Game.Pool<Enemy>[]").unwrap();
        assert_eq!(render_type(&host, &ty), "global::Game.Pool<global::Enemy>[]");
        assert_eq!(render_type(&host, &parse_type("T?").unwrap()), "T?");
        assert_eq!(render_type(&host, &parse_type("int").unwrap()), "int");
    }

    #[test]
    fn test_hint_names_encode_arity() {
        assert_eq!(hint_name(&SymbolKey::new("Game.Pool", 1), Driver::Tracking), "Game.Pool_1.Tracking.g.cs");
        assert_eq!(hint_name(&SymbolKey::new("Game.Shape", 0), Driver::UnionVariant), "Game.Shape.Union.g.cs");
    }

    #[test]
    fn test_declaration_scopes() {
        let mut w = SourceWriter::new(false);
        let outer = ContainingType {
            name: "Outer".to_string(),
            kind: TypeKind::Class,
            type_params: vec!["T".to_string()],
        };
        let depth = open_declaration(&mut w, Some("Game"), &[outer], "partial struct Inner");
        w.writeln("int x;");
        close_blocks(&mut w, depth);
        insta::assert_snapshot!(w.finish(), @r"
        namespace Game
        {
            partial class Outer<T>
            {
                partial struct Inner
                {
                    int x;
                }
            }
        }
        ");
    }

    #[test]
    fn test_unique_names_suffix_repeats() {
        let mut names = UniqueNames::new();
        names.reserve("None");
        assert_eq!(names.allocate("None"), "None_2");
        assert_eq!(names.allocate("Water"), "Water");
        assert_eq!(names.allocate("Water"), "Water_2");
    }
}
