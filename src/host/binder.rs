//! Speculative expression binder for the model host.
//!
//! Binds one expression tree against the declaration graph: names resolve to lambda parameters, then to
//! members of the owning type (walking its base chain and interfaces), then to types. Invocations pick
//! the first candidate whose arguments fit, inferring method type arguments from argument types and
//! lambda bodies. Extension methods are tried after instance methods.
//!
//! The binder only knows what the model declares. Members that a generator will add later
//! (`Enemy.Instances`, injected properties) do not bind, which is exactly what the expression resolver
//! relies on.

use std::collections::{HashMap, HashSet, VecDeque};

use derivgen_syntax::{BinaryOp, Expr, Literal, SimpleName, Span, Spanned, TypeSyntax, UnaryOp};

use super::{BindSite, MethodDecl, ModelHost, SymbolInfo, SymbolKey, SymbolOracle, TypeDecl, TypeRef, substitute};

const MAX_DEPTH: usize = 64;

/// What a qualifier expression denotes.
enum Qualifier {
    Type(TypeRef),
    Value(TypeRef),
}

pub struct Binder<'a> {
    host: &'a ModelHost,
    site: &'a BindSite,
    locals: Vec<(String, TypeRef)>,
    symbols: HashMap<Span, SymbolInfo>,
    depth: usize,
}

impl<'a> Binder<'a> {
    pub fn new(host: &'a ModelHost, site: &'a BindSite) -> Self {
        Self {
            host,
            site,
            locals: Vec::new(),
            symbols: HashMap::new(),
            depth: 0,
        }
    }

    pub fn into_symbols(self) -> HashMap<Span, SymbolInfo> {
        self.symbols
    }

    /// Type of `expr`, or `None` when any part of it fails to bind.
    pub fn bind(&mut self, expr: &Spanned<Expr>) -> Option<TypeRef> {
        if self.depth > MAX_DEPTH {
            return None;
        }
        self.depth += 1;
        let ty = self.bind_inner(expr);
        self.depth -= 1;
        ty
    }

    fn bind_inner(&mut self, expr: &Spanned<Expr>) -> Option<TypeRef> {
        match &expr.node {
            Expr::Literal(lit) => literal_type(lit),
            Expr::This => self.self_type(),
            Expr::Name(_) | Expr::Member(..) => match self.qualifier(expr)? {
                Qualifier::Value(ty) => Some(ty),
                Qualifier::Type(_) => None,
            },
            Expr::Invoke(callee, args) => self.bind_invocation(callee, args),
            Expr::Index(target, args) => {
                let target_ty = self.bind(target)?;
                for arg in args {
                    self.bind(arg)?;
                }
                if target_ty.array_rank > 0 {
                    let mut element = target_ty;
                    element.array_rank -= 1;
                    return Some(element);
                }
                self.member(&target_ty, "Item").map(|(_, ty)| ty)
            }
            Expr::Cast(ty, operand) => {
                // The operand may be unbindable; the cast alone decides the type.
                let _ = self.bind(operand);
                self.resolve(&ty.node)
            }
            Expr::New(ty, args) => {
                for arg in args {
                    let _ = self.bind(arg);
                }
                self.resolve(&ty.node)
            }
            Expr::Lambda(..) => None,
            Expr::Unary(op, operand) => {
                let ty = self.bind(operand)?;
                match op {
                    UnaryOp::Not => Some(TypeRef::named("bool")),
                    UnaryOp::Neg => Some(ty),
                }
            }
            Expr::Binary(left, op, right) => self.bind_binary(left, *op, right),
            Expr::Paren(inner) => self.bind(inner),
        }
    }

    fn self_type(&self) -> Option<TypeRef> {
        self.host.declaration(&self.site.owner).map(super::self_type)
    }

    fn resolve(&self, ty: &TypeSyntax) -> Option<TypeRef> {
        self.host.resolve_type(&self.site.owner, ty)
    }

    fn bind_binary(&mut self, left: &Spanned<Expr>, op: BinaryOp, right: &Spanned<Expr>) -> Option<TypeRef> {
        // Bind both sides before failing so names on the right are still recorded.
        let (lt, rt) = (self.bind_operand(left), self.bind_operand(right));
        let (lt, rt) = (lt?, rt?);
        if op.is_boolean() {
            return Some(TypeRef::named("bool"));
        }
        match op {
            BinaryOp::Coalesce => {
                let mut ty = lt.or(rt)?;
                ty.nullable = false;
                Some(ty)
            }
            _ => {
                let (lt, rt) = (lt?, rt?);
                if lt.name == "string" || rt.name == "string" {
                    return Some(TypeRef::named("string"));
                }
                promote(&lt, &rt)
            }
        }
    }

    /// Bind a binary operand. `null` binds to "no type" rather than failing.
    fn bind_operand(&mut self, expr: &Spanned<Expr>) -> Option<Option<TypeRef>> {
        if matches!(expr.node, Expr::Literal(Literal::Null)) {
            return Some(None);
        }
        self.bind(expr).map(Some)
    }

    fn qualifier(&mut self, expr: &Spanned<Expr>) -> Option<Qualifier> {
        match &expr.node {
            Expr::Name(name) => {
                if let Some(ty) = self.value_name(name, expr.span) {
                    return Some(Qualifier::Value(ty));
                }
                let ty = self.resolve(&TypeSyntax::generic(name.ident.clone(), name.type_args.clone()))?;
                self.symbols.insert(expr.span, SymbolInfo::Type(ty.clone()));
                Some(Qualifier::Type(ty))
            }
            Expr::Member(target, name) => {
                let Some(qualifier) = self.qualifier(target) else {
                    return self.namespace_path(expr);
                };
                let receiver = match qualifier {
                    Qualifier::Type(ty) => {
                        if let Some(nested) = self.nested_type(&ty, &name.node) {
                            self.symbols.insert(expr.span, SymbolInfo::Type(nested.clone()));
                            return Some(Qualifier::Type(nested));
                        }
                        ty
                    }
                    Qualifier::Value(ty) => ty,
                };
                let (info, ty) = self.member(&receiver, &name.node.ident)?;
                self.symbols.insert(name.span, info);
                Some(Qualifier::Value(ty))
            }
            _ => self.bind(expr).map(Qualifier::Value),
        }
    }

    /// `Game.Enemy` where `Game` is a namespace.
    fn namespace_path(&mut self, expr: &Spanned<Expr>) -> Option<Qualifier> {
        let path = type_path(&expr.node)?;
        let ty = self.resolve(&path)?;
        self.symbols.insert(expr.span, SymbolInfo::Type(ty.clone()));
        Some(Qualifier::Type(ty))
    }

    fn nested_type(&self, outer: &TypeRef, name: &SimpleName) -> Option<TypeRef> {
        let candidate = TypeSyntax::generic(format!("{}.{}", outer.name, name.ident), name.type_args.clone());
        self.resolve(&candidate)
    }

    fn value_name(&mut self, name: &SimpleName, span: Span) -> Option<TypeRef> {
        if name.type_args.is_empty() {
            if let Some((local, ty)) = self.locals.iter().rev().find(|(n, _)| *n == name.ident) {
                let info = SymbolInfo::Local {
                    name: local.clone(),
                    ty: ty.clone(),
                };
                let ty = ty.clone();
                self.symbols.insert(span, info);
                return Some(ty);
            }
        }
        let owner = self.self_type()?;
        let (info, ty) = self.member(&owner, &name.ident)?;
        self.symbols.insert(span, info);
        Some(ty)
    }

    /// Field or property `name` on `ty` or any of its supertypes.
    fn member(&self, ty: &TypeRef, name: &str) -> Option<(SymbolInfo, TypeRef)> {
        if ty.array_rank > 0 {
            return (name == "Length").then(|| {
                let int = TypeRef::named("int");
                let info = SymbolInfo::Property {
                    owner: SymbolKey::new("System.Array", 0),
                    name: name.to_string(),
                    ty: int.clone(),
                };
                (info, int)
            });
        }
        for current in self.supertypes(ty) {
            let key = SymbolKey::of(&current);
            let Some(decl) = self.host.declaration(&key) else {
                continue;
            };
            let found = decl
                .fields
                .iter()
                .find(|f| f.name == name)
                .map(|f| (&f.ty, true))
                .or_else(|| decl.properties.iter().find(|p| p.name == name).map(|p| (&p.ty, false)));
            let Some((declared, is_field)) = found else {
                continue;
            };
            let member_ty = substitute(
                &self.host.resolve_type(&key, declared)?,
                &decl.type_params,
                &current.args,
            );
            let info = if is_field {
                SymbolInfo::Field {
                    owner: key,
                    name: name.to_string(),
                    ty: member_ty.clone(),
                }
            } else {
                SymbolInfo::Property {
                    owner: key,
                    name: name.to_string(),
                    ty: member_ty.clone(),
                }
            };
            return Some((info, member_ty));
        }
        None
    }

    /// `ty` followed by its base chain and interfaces, breadth first, each substituted.
    fn supertypes(&self, ty: &TypeRef) -> Vec<TypeRef> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([strip_nullable(ty)]);
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current.clone()) {
                continue;
            }
            queue.extend(self.host.base_type(&current));
            queue.extend(self.host.declared_interfaces(&current));
            out.push(current);
        }
        out
    }

    fn bind_invocation(&mut self, callee: &Spanned<Expr>, args: &[Spanned<Expr>]) -> Option<TypeRef> {
        match &callee.node {
            Expr::Name(name) => {
                let owner = self.self_type()?;
                self.call_on(&owner, name, callee.span, args)
            }
            Expr::Member(target, name) => {
                let receiver = match self.qualifier(target)? {
                    Qualifier::Type(ty) => return self.call_on(&ty, &name.node, name.span, args),
                    Qualifier::Value(ty) => ty,
                };
                if let Some(ty) = self.call_on(&receiver, &name.node, name.span, args) {
                    return Some(ty);
                }
                self.call_extension(&receiver, &name.node, name.span, args)
            }
            _ => None,
        }
    }

    fn call_on(&mut self, ty: &TypeRef, name: &SimpleName, span: Span, args: &[Spanned<Expr>]) -> Option<TypeRef> {
        let host = self.host;
        for current in self.supertypes(ty) {
            let key = SymbolKey::of(&current);
            let Some(decl) = host.declaration(&key) else {
                continue;
            };
            for method in decl.methods.iter().filter(|m| m.name == name.ident && !m.is_extension) {
                if let Some(returns) = self.try_call(decl, &current, method, &name.type_args, None, args) {
                    self.symbols.insert(
                        span,
                        SymbolInfo::Method {
                            owner: key.clone(),
                            name: name.ident.clone(),
                            returns: returns.clone(),
                        },
                    );
                    return Some(returns);
                }
            }
        }
        None
    }

    fn call_extension(
        &mut self,
        receiver: &TypeRef,
        name: &SimpleName,
        span: Span,
        args: &[Spanned<Expr>],
    ) -> Option<TypeRef> {
        let host = self.host;
        for (decl, method) in host.extension_methods().filter(|(_, m)| m.name == name.ident) {
            let owner = super::self_type(decl);
            if let Some(returns) = self.try_call(decl, &owner, method, &name.type_args, Some(receiver), args) {
                self.symbols.insert(
                    span,
                    SymbolInfo::Method {
                        owner: SymbolKey::of_decl(decl),
                        name: name.ident.clone(),
                        returns: returns.clone(),
                    },
                );
                return Some(returns);
            }
        }
        None
    }

    /// Check one candidate and return its (substituted) return type.
    fn try_call(
        &mut self,
        decl: &TypeDecl,
        declaring: &TypeRef,
        method: &MethodDecl,
        explicit: &[TypeSyntax],
        receiver: Option<&TypeRef>,
        args: &[Spanned<Expr>],
    ) -> Option<TypeRef> {
        let host = self.host;
        let key = SymbolKey::of_decl(decl);
        let tparams = &method.type_params;
        let resolve_member = |ty: &TypeSyntax| {
            host.resolve_type_with(&key, ty, tparams)
                .map(|t| substitute(&t, &decl.type_params, &declaring.args))
        };
        let mut params = method
            .params
            .iter()
            .map(|p| resolve_member(&p.ty))
            .collect::<Option<Vec<_>>>()?;
        let returns = resolve_member(&method.returns)?;

        let mut bindings: HashMap<String, TypeRef> = HashMap::new();
        if !explicit.is_empty() {
            if explicit.len() != tparams.len() {
                return None;
            }
            for (param, arg) in tparams.iter().zip(explicit) {
                bindings.insert(param.clone(), self.resolve(arg)?);
            }
        }
        if let Some(receiver) = receiver {
            let this_param = params.remove(0);
            if !unify(self, &this_param, receiver, tparams, &mut bindings) {
                return None;
            }
        }
        if params.len() != args.len() {
            return None;
        }

        // Plain arguments first so lambdas see as many inferred type arguments as possible.
        for (param, arg) in params.iter().zip(args) {
            if matches!(arg.node, Expr::Lambda(..)) {
                continue;
            }
            if matches!(arg.node, Expr::Literal(Literal::Null)) {
                continue;
            }
            let arg_ty = self.bind(arg)?;
            if !unify(self, param, &arg_ty, tparams, &mut bindings) {
                return None;
            }
        }
        for (param, arg) in params.iter().zip(args) {
            let Expr::Lambda(names, body) = &arg.node else {
                continue;
            };
            let expected = apply(param, tparams, &bindings);
            let is_delegate = matches!(expected.name.as_str(), "System.Func" | "System.Action");
            let inputs = if expected.name == "System.Func" {
                expected.args.len().checked_sub(1)?
            } else {
                expected.args.len()
            };
            if !is_delegate || inputs != names.len() {
                return None;
            }
            if expected.args[..inputs].iter().any(|t| mentions(t, tparams)) {
                return None;
            }
            let pushed = names.len();
            for (name, ty) in names.iter().zip(&expected.args) {
                self.locals.push((name.node.clone(), ty.clone()));
            }
            let body_ty = self.bind(body);
            self.locals.truncate(self.locals.len() - pushed);
            if expected.name == "System.Func" {
                let body_ty = body_ty?;
                if !unify(self, &expected.args[inputs], &body_ty, tparams, &mut bindings) {
                    return None;
                }
            }
        }

        let result = apply(&returns, tparams, &bindings);
        if mentions(&result, tparams) {
            return None;
        }
        Some(result)
    }
}

/// Type implied by an expression's operation alone.
pub fn operation_type(host: &ModelHost, site: &BindSite, expr: &Spanned<Expr>) -> Option<TypeRef> {
    match &expr.node {
        Expr::Literal(lit) => literal_type(lit),
        Expr::Cast(ty, _) | Expr::New(ty, _) => host.resolve_type(&site.owner, &ty.node),
        Expr::Paren(inner) => operation_type(host, site, inner),
        Expr::Unary(UnaryOp::Not, _) => Some(TypeRef::named("bool")),
        Expr::Binary(_, op, _) if op.is_boolean() => Some(TypeRef::named("bool")),
        _ => None,
    }
}

fn literal_type(lit: &Literal) -> Option<TypeRef> {
    let name = match lit {
        Literal::Int(_) => "int",
        Literal::Float(text) if text.ends_with(['f', 'F']) => "float",
        Literal::Float(text) if text.ends_with(['m', 'M']) => "decimal",
        Literal::Float(_) => "double",
        Literal::String(_) => "string",
        Literal::Bool(_) => "bool",
        Literal::Null => return None,
    };
    Some(TypeRef::named(name))
}

fn numeric_rank(name: &str) -> Option<u8> {
    match name {
        "byte" | "sbyte" | "short" | "ushort" | "char" | "int" => Some(1),
        "uint" => Some(2),
        "long" | "ulong" => Some(3),
        "float" => Some(4),
        "double" => Some(5),
        "decimal" => Some(6),
        _ => None,
    }
}

fn promote(left: &TypeRef, right: &TypeRef) -> Option<TypeRef> {
    let (l, r) = (numeric_rank(&left.name)?, numeric_rank(&right.name)?);
    let winner = if l >= r { left } else { right };
    // Arithmetic on small integral types yields `int`.
    if numeric_rank(&winner.name) == Some(1) {
        return Some(TypeRef::named("int"));
    }
    Some(TypeRef::named(winner.name.clone()))
}

fn strip_nullable(ty: &TypeRef) -> TypeRef {
    let mut ty = ty.clone();
    ty.nullable = false;
    ty
}

/// Whether `ty` still mentions one of `params`.
fn mentions(ty: &TypeRef, params: &[String]) -> bool {
    (ty.args.is_empty() && params.contains(&ty.name)) || ty.args.iter().any(|a| mentions(a, params))
}

fn apply(ty: &TypeRef, params: &[String], bindings: &HashMap<String, TypeRef>) -> TypeRef {
    let bound: Vec<String> = params.iter().filter(|p| bindings.contains_key(*p)).cloned().collect();
    let args: Vec<TypeRef> = bound.iter().filter_map(|p| bindings.get(p).cloned()).collect();
    substitute(ty, &bound, &args)
}

/// Unify a parameter type (which may mention `params`) with an argument type, recording inferred type
/// arguments. Implicit reference conversions to supertypes and the usual numeric widenings are accepted.
fn unify(
    binder: &Binder<'_>,
    param: &TypeRef,
    arg: &TypeRef,
    params: &[String],
    bindings: &mut HashMap<String, TypeRef>,
) -> bool {
    if param.args.is_empty() && param.array_rank == 0 && params.contains(&param.name) {
        return match bindings.get(&param.name) {
            Some(bound) => bound == arg || convertible(binder, arg, bound),
            None => {
                bindings.insert(param.name.clone(), arg.clone());
                true
            }
        };
    }
    if param.array_rank > 0 || arg.array_rank > 0 {
        if param.array_rank != arg.array_rank {
            return param.name == "object" && param.array_rank == 0;
        }
        let (mut p, mut a) = (param.clone(), arg.clone());
        p.array_rank = 0;
        a.array_rank = 0;
        return unify(binder, &p, &a, params, bindings);
    }
    if param.name == "object" {
        return true;
    }
    let target = SymbolKey::of(param);
    let Some(matching) = binder.supertypes(arg).into_iter().find(|t| SymbolKey::of(t) == target) else {
        return convertible(binder, arg, param);
    };
    param
        .args
        .iter()
        .zip(&matching.args)
        .all(|(p, a)| unify(binder, p, a, params, bindings))
}

fn convertible(binder: &Binder<'_>, from: &TypeRef, to: &TypeRef) -> bool {
    if from == to || to.name == "object" {
        return true;
    }
    match (numeric_rank(&from.name), numeric_rank(&to.name)) {
        (Some(f), Some(t)) => return f <= t,
        (Some(_), None) | (None, Some(_)) => return false,
        (None, None) => {}
    }
    binder.supertypes(from).iter().any(|t| t == to)
}

/// `A.B.C` as a type, for namespace-qualified references.
fn type_path(expr: &Expr) -> Option<TypeSyntax> {
    match expr {
        Expr::Name(name) => Some(TypeSyntax::generic(name.ident.clone(), name.type_args.clone())),
        Expr::Member(target, name) => {
            let prefix = type_path(&target.node)?;
            if !prefix.args.is_empty() {
                return None;
            }
            Some(TypeSyntax::generic(
                format!("{}.{}", prefix.name, name.node.ident),
                name.node.type_args.clone(),
            ))
        }
        _ => None,
    }
}
