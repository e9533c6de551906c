//! Read-only view of the host compiler's declaration graph.
//!
//! The analysis core only ever talks to a [`SymbolOracle`]: it asks for declarations, supertypes and
//! expression types, and never edits anything. [`ModelHost`] implements the oracle over a JSON model (see
//! [`model`]) merged with a small built-in prelude of engine and BCL declarations.
//!
//! ## Identity
//!
//! Declarations are identified by [`SymbolKey`]: the qualified definition name plus generic arity. Keys
//! are always *open* definitions, so `Game.Pool<Game.Enemy>` and `Game.Pool<T>` map to the same key.

pub mod binder;
pub mod model;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use derivgen_core::vocab::unity;
use derivgen_syntax::{Expr, Span, Spanned, TypeSyntax};

pub use model::{
    Accessibility, AttributeArg, AttributeData, AttributeValue, BodyStatement, FieldDecl, MethodDecl, Model,
    ParamDecl, ParamModifier, PropertyDecl, TypeDecl, TypeKind, TypeRef,
};

use crate::settings::GeneratorSettings;

const PRELUDE: &str = include_str!("prelude.json");

/// Generic arities probed when only a containing type's name is known.
const MAX_ARITY: usize = 8;

const MAX_NESTING: usize = 16;

/// Open-definition identity of a declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct SymbolKey {
    pub name: String,
    pub arity: usize,
}

impl SymbolKey {
    pub fn new(name: impl Into<String>, arity: usize) -> Self {
        Self {
            name: name.into(),
            arity,
        }
    }

    /// Key of the definition behind `ty`, whether `ty` is open or closed.
    pub fn of(ty: &TypeRef) -> Self {
        Self::new(ty.name.clone(), ty.args.len())
    }

    pub fn of_decl(decl: &TypeDecl) -> Self {
        Self::new(decl.name.clone(), decl.type_params.len())
    }

    pub fn simple_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }
}

impl fmt::Display for SymbolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.arity == 0 {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}`{}", self.name, self.arity)
        }
    }
}

/// Position at which an expression is bound: a statement of a method of a declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BindSite {
    pub owner: SymbolKey,
    pub method: Option<String>,
    pub statement: Option<usize>,
}

impl BindSite {
    pub fn in_type(owner: SymbolKey) -> Self {
        Self {
            owner,
            method: None,
            statement: None,
        }
    }

    pub fn at_statement(owner: SymbolKey, method: impl Into<String>, statement: usize) -> Self {
        Self {
            owner,
            method: Some(method.into()),
            statement: Some(statement),
        }
    }
}

/// What a name inside an expression bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolInfo {
    /// A type used as a qualifier (`Enemy` in `Enemy.Instances`).
    Type(TypeRef),
    Field { owner: SymbolKey, name: String, ty: TypeRef },
    Property { owner: SymbolKey, name: String, ty: TypeRef },
    Method { owner: SymbolKey, name: String, returns: TypeRef },
    /// A lambda parameter.
    Local { name: String, ty: TypeRef },
}

/// Narrow read-only interface to the host compiler.
///
/// Implementations must be safe to query from several threads at once; the pipeline fans declarations
/// out over a thread pool.
pub trait SymbolOracle: Send + Sync {
    /// Every declaration in the compilation (including external ones), in declaration order.
    fn declarations(&self) -> Vec<&TypeDecl>;

    fn declaration(&self, key: &SymbolKey) -> Option<&TypeDecl>;

    fn assembly_attributes(&self) -> &[AttributeData];

    /// Resolve a type as written inside `context` to its canonical, fully qualified form.
    fn resolve_type(&self, context: &SymbolKey, ty: &TypeSyntax) -> Option<TypeRef>;

    /// The type the host already recorded for the value of the statement at `site`.
    fn converted_type(&self, site: &BindSite) -> Option<TypeRef>;

    /// Bind `expr` as if it were written at `site`, without committing anything.
    fn speculative_type(&self, site: &BindSite, expr: &Spanned<Expr>) -> Option<TypeRef>;

    /// Type implied by the expression's operation alone (literals, casts, `new`, comparisons).
    fn operation_type(&self, site: &BindSite, expr: &Spanned<Expr>) -> Option<TypeRef>;

    /// Symbols bound by the names in `expr`, keyed by the span of the name (or of the qualified type
    /// expression for type qualifiers). Names that fail to bind are absent.
    fn name_symbols(&self, site: &BindSite, expr: &Spanned<Expr>) -> HashMap<Span, SymbolInfo>;

    /// Base type of `ty` with `ty`'s type arguments substituted.
    fn base_type(&self, ty: &TypeRef) -> Option<TypeRef> {
        let key = SymbolKey::of(ty);
        let decl = self.declaration(&key)?;
        let base = self.resolve_type(&key, decl.base.as_ref()?)?;
        Some(substitute(&base, &decl.type_params, &ty.args))
    }

    /// Interfaces listed directly on `ty`'s declaration, substituted.
    fn declared_interfaces(&self, ty: &TypeRef) -> Vec<TypeRef> {
        let key = SymbolKey::of(ty);
        let Some(decl) = self.declaration(&key) else {
            return Vec::new();
        };
        decl.interfaces
            .iter()
            .filter_map(|i| self.resolve_type(&key, i))
            .map(|i| substitute(&i, &decl.type_params, &ty.args))
            .collect()
    }

    /// Whether `ty` derives from or implements the definition `target`. Closed and open forms of the
    /// same definition both match.
    fn implements(&self, ty: &TypeRef, target: &SymbolKey) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![ty.clone()];
        while let Some(current) = stack.pop() {
            if SymbolKey::of(&current) == *target {
                return true;
            }
            if !visited.insert(current.clone()) {
                continue;
            }
            stack.extend(self.declared_interfaces(&current));
            stack.extend(self.base_type(&current));
        }
        false
    }

    /// The declaration `decl` is nested in, if any.
    fn containing(&self, decl: &TypeDecl) -> Option<&TypeDecl> {
        let outer = decl.containing.as_ref()?;
        (0..=MAX_ARITY).find_map(|arity| self.declaration(&SymbolKey::new(outer.clone(), arity)))
    }

    /// Namespace of a declaration, found through its outermost containing type.
    fn namespace_of(&self, key: &SymbolKey) -> Option<String> {
        let mut decl = self.declaration(key)?;
        for _ in 0..MAX_NESTING {
            match self.containing(decl) {
                Some(outer) => decl = outer,
                None => break,
            }
        }
        decl.name.rsplit_once('.').map(|(ns, _)| ns.to_string())
    }

    /// Instance (non-static, non-const) fields of `ty`, resolved and substituted.
    fn instance_fields(&self, ty: &TypeRef) -> Vec<(String, Option<TypeRef>)> {
        let key = SymbolKey::of(ty);
        let Some(decl) = self.declaration(&key) else {
            return Vec::new();
        };
        decl.fields
            .iter()
            .filter(|f| !f.is_static && !f.is_const)
            .map(|f| {
                let resolved = self
                    .resolve_type(&key, &f.ty)
                    .map(|t| substitute(&t, &decl.type_params, &ty.args));
                (f.name.clone(), resolved)
            })
            .collect()
    }
}

/// Replace type parameters `params` with `args` throughout `ty`.
pub fn substitute(ty: &TypeRef, params: &[String], args: &[TypeRef]) -> TypeRef {
    if params.is_empty() || args.is_empty() {
        return ty.clone();
    }
    if ty.args.is_empty() {
        if let Some(arg) = params.iter().position(|p| *p == ty.name).and_then(|pos| args.get(pos)) {
            let mut replaced = arg.clone();
            replaced.nullable |= ty.nullable;
            replaced.array_rank += ty.array_rank;
            return replaced;
        }
    }
    TypeRef {
        name: ty.name.clone(),
        args: ty.args.iter().map(|a| substitute(a, params, args)).collect(),
        nullable: ty.nullable,
        array_rank: ty.array_rank,
    }
}

/// The instantiation of `key`'s declaration over its own type parameters (`Pool<T>`).
pub fn self_type(decl: &TypeDecl) -> TypeRef {
    TypeRef::generic(
        decl.name.clone(),
        decl.type_params.iter().map(|p| TypeRef::named(p.clone())).collect(),
    )
}

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum ModelError {
    #[error("failed to read model `{path}`")]
    #[diagnostic(code(derivgen::model::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid model: {0}")]
    #[diagnostic(code(derivgen::model::json))]
    Json(#[from] serde_json::Error),

    #[error("type `{0}` is declared more than once")]
    #[diagnostic(code(derivgen::model::duplicate))]
    DuplicateType(SymbolKey),

    #[error("type `{nested}` names unknown containing type `{containing}`")]
    #[diagnostic(code(derivgen::model::containing))]
    UnknownContainingType { nested: String, containing: String },
}

/// [`SymbolOracle`] over a deserialized [`Model`].
#[derive(Debug)]
pub struct ModelHost {
    model: Model,
    index: HashMap<SymbolKey, usize>,
    by_simple_name: HashMap<(String, usize), Vec<usize>>,
    /// `(type, method)` positions of extension methods.
    extensions: Vec<(usize, usize)>,
    root: Option<PathBuf>,
}

impl ModelHost {
    /// Build a host from a model. The built-in prelude is appended; user declarations shadow prelude
    /// declarations with the same key.
    pub fn from_model(mut model: Model) -> Result<Self, ModelError> {
        let prelude: Model = serde_json::from_str(PRELUDE)?;
        let mut seen = HashSet::new();
        for decl in &model.types {
            let key = SymbolKey::of_decl(decl);
            if !seen.insert(key.clone()) {
                return Err(ModelError::DuplicateType(key));
            }
        }
        model
            .types
            .extend(prelude.types.into_iter().filter(|d| !seen.contains(&SymbolKey::of_decl(d))));

        let mut index = HashMap::new();
        let mut by_simple_name: HashMap<(String, usize), Vec<usize>> = HashMap::new();
        let mut extensions = Vec::new();
        for (i, decl) in model.types.iter().enumerate() {
            index.insert(SymbolKey::of_decl(decl), i);
            by_simple_name
                .entry((decl.simple_name().to_string(), decl.type_params.len()))
                .or_default()
                .push(i);
            for (j, method) in decl.methods.iter().enumerate() {
                if method.is_extension && !method.params.is_empty() {
                    extensions.push((i, j));
                }
            }
        }
        for decl in &model.types {
            let Some(containing) = &decl.containing else {
                continue;
            };
            if !model.types.iter().any(|d| d.name == *containing) {
                return Err(ModelError::UnknownContainingType {
                    nested: decl.name.clone(),
                    containing: containing.clone(),
                });
            }
        }

        tracing::debug!(types = model.types.len(), extensions = extensions.len(), "model loaded");
        Ok(Self {
            model,
            index,
            by_simple_name,
            extensions,
            root: None,
        })
    }

    pub fn from_json(text: &str) -> Result<Self, ModelError> {
        let model: Model = serde_json::from_str(text)?;
        Self::from_model(model)
    }

    /// Load a model file. Relative project paths (the tag manager asset) resolve against its directory.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let text = fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut host = Self::from_json(&text)?;
        host.root = path.parent().map(Path::to_path_buf);
        Ok(host)
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn settings(&self) -> &GeneratorSettings {
        &self.model.settings
    }

    pub fn root_dir(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Default location of the tag manager asset for this model.
    pub fn tag_manager_path(&self) -> PathBuf {
        match &self.model.settings.tag_manager_path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => self.root.as_deref().unwrap_or(Path::new(".")).join(path),
            None => self
                .root
                .as_deref()
                .unwrap_or(Path::new("."))
                .join(unity::TAG_MANAGER_ASSET),
        }
    }

    pub(crate) fn extension_methods(&self) -> impl Iterator<Item = (&TypeDecl, &MethodDecl)> {
        self.extensions
            .iter()
            .map(|&(t, m)| (&self.model.types[t], &self.model.types[t].methods[m]))
    }

    fn lookup_qualified(&self, name: &str, arity: usize) -> Option<&TypeDecl> {
        self.index
            .get(&SymbolKey::new(name, arity))
            .map(|&i| &self.model.types[i])
    }

    /// Type parameters visible inside `context`: its own and those of its containing types.
    fn visible_type_params(&self, context: &SymbolKey) -> Vec<String> {
        let mut params = Vec::new();
        let mut current = self.declaration(context);
        let mut depth = 0;
        while let Some(decl) = current {
            params.extend(decl.type_params.iter().cloned());
            depth += 1;
            current = if depth < MAX_NESTING { self.containing(decl) } else { None };
        }
        params
    }

    fn resolve_definition(&self, context: &SymbolKey, name: &str, arity: usize) -> Option<String> {
        let name = name.strip_prefix("global::").unwrap_or(name);
        if self.lookup_qualified(name, arity).is_some() {
            return Some(name.to_string());
        }
        // Nested and namespace-relative lookups, innermost scope first.
        let mut scope = context.name.as_str();
        loop {
            let candidate = format!("{scope}.{name}");
            if self.lookup_qualified(&candidate, arity).is_some() {
                return Some(candidate);
            }
            match scope.rsplit_once('.') {
                Some((outer, _)) => scope = outer,
                None => break,
            }
        }
        if name.contains('.') {
            return None;
        }
        match self.by_simple_name.get(&(name.to_string(), arity)) {
            Some(found) if found.len() == 1 => Some(self.model.types[found[0]].name.clone()),
            _ => None,
        }
    }

    /// Resolve `ty` inside `context` with `extra_params` (a generic method's type parameters) in scope.
    pub(crate) fn resolve_type_with(
        &self,
        context: &SymbolKey,
        ty: &TypeSyntax,
        extra_params: &[String],
    ) -> Option<TypeRef> {
        let args = ty
            .args
            .iter()
            .map(|a| self.resolve_type_with(context, a, extra_params))
            .collect::<Option<Vec<_>>>()?;
        let is_param = |name: &String| extra_params.contains(name) || self.visible_type_params(context).contains(name);
        let name = if ty.args.is_empty() && (unity::is_predefined_type(&ty.name) || is_param(&ty.name)) {
            ty.name.clone()
        } else {
            self.resolve_definition(context, &ty.name, ty.args.len())?
        };
        Some(TypeRef {
            name,
            args,
            nullable: ty.nullable,
            array_rank: ty.array_rank,
        })
    }
}

impl SymbolOracle for ModelHost {
    fn declarations(&self) -> Vec<&TypeDecl> {
        self.model.types.iter().collect()
    }

    fn declaration(&self, key: &SymbolKey) -> Option<&TypeDecl> {
        self.lookup_qualified(&key.name, key.arity)
    }

    fn assembly_attributes(&self) -> &[AttributeData] {
        &self.model.assembly_attributes
    }

    fn resolve_type(&self, context: &SymbolKey, ty: &TypeSyntax) -> Option<TypeRef> {
        self.resolve_type_with(context, ty, &[])
    }

    fn converted_type(&self, site: &BindSite) -> Option<TypeRef> {
        let decl = self.declaration(&site.owner)?;
        let method = decl.methods.iter().find(|m| Some(&m.name) == site.method.as_ref())?;
        let annotated = method.body.get(site.statement?)?.annotation()?;
        self.resolve_type(&site.owner, annotated)
    }

    fn speculative_type(&self, site: &BindSite, expr: &Spanned<Expr>) -> Option<TypeRef> {
        binder::Binder::new(self, site).bind(expr)
    }

    fn operation_type(&self, site: &BindSite, expr: &Spanned<Expr>) -> Option<TypeRef> {
        binder::operation_type(self, site, expr)
    }

    fn name_symbols(&self, site: &BindSite, expr: &Spanned<Expr>) -> HashMap<Span, SymbolInfo> {
        let mut binder = binder::Binder::new(self, site);
        let _ = binder.bind(expr);
        binder.into_symbols()
    }
}
