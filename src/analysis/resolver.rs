//! Expression type resolution for expressions the host cannot bind on its own.
//!
//! Injected initializers routinely mention members that do not exist yet because this generator is
//! about to produce them (`Enemy.Instances`, `Body.mass` where `Body` is itself injected). The host
//! reports no type for those. [`ExpressionResolver`] recovers one:
//!
//! 1. Ask the host directly: the converted type, then a speculative bind at the same position, then the
//!    operation-based type.
//! 2. Collect the names in the expression that bound to nothing, in source order.
//! 3. Infer a type for each: `T.Instances` on a tracked `T`, `T.Instance` on a singleton `T`, or the
//!    resolved type of a sibling `[Inject]` assignment to the same name (recursively, cycle-guarded).
//! 4. Rebind a copy of the expression with an explicit cast around the inferred name and return the
//!    first type that comes back.
//!
//! The host model is never modified; every rewrite is a disposable copy.
//!
//! Names are tried strictly in source order, so when two unresolved names could each rescue the
//! expression the leftmost one wins even if a later one would give a different type.

use std::collections::{HashMap, HashSet};

use derivgen_core::MarkerId;
use derivgen_core::vocab::runtime;
use derivgen_syntax::parser::parse_statement;
use derivgen_syntax::visit::{self, NameRef};
use derivgen_syntax::{Expr, Span, Spanned, Stmt, rewrite};
use tokio_util::sync::CancellationToken;

use super::aggregate::MarkerIndex;
use super::{Cancelled, check_cancelled};
use crate::host::{BindSite, SymbolInfo, SymbolOracle, TypeDecl, TypeRef, self_type};

/// Which step produced a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    ConvertedType,
    SpeculativeBinding,
    OperationType,
    /// `T.Instances` on a tracked type.
    InstancesPattern,
    /// `T.Instance` on a singleton type.
    InstancePattern,
    /// Type of a sibling `[Inject]` assignment to the same name.
    SiblingAssignment,
}

/// A type inferred for one unresolved name, and the span the synthetic cast wraps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inference {
    pub ident: String,
    pub span: Span,
    pub ty: TypeRef,
    pub strategy: Strategy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub ty: TypeRef,
    pub strategy: Strategy,
    /// Inferences applied to get `ty`; empty when the host resolved the expression directly.
    pub inferences: Vec<Inference>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("could not determine expression type of `{expression}`")]
    Undetermined { expression: String },

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

pub struct ExpressionResolver<'a> {
    oracle: &'a dyn SymbolOracle,
    index: &'a MarkerIndex,
    cancel: &'a CancellationToken,
}

impl<'a> ExpressionResolver<'a> {
    pub fn new(oracle: &'a dyn SymbolOracle, index: &'a MarkerIndex, cancel: &'a CancellationToken) -> Self {
        Self { oracle, index, cancel }
    }

    /// Resolve `expr` as written at `site`.
    #[tracing::instrument(skip_all, fields(owner = %site.owner, method = ?site.method))]
    pub fn resolve(&self, site: &BindSite, expr: &Spanned<Expr>) -> Result<Resolution, ResolveError> {
        self.resolve_guarded(site, expr, &mut HashSet::new())
    }

    /// Resolve the value of `target = expr`. `target` itself is never inferred from its own assignment.
    pub fn resolve_assignment(
        &self,
        site: &BindSite,
        target: &str,
        expr: &Spanned<Expr>,
    ) -> Result<Resolution, ResolveError> {
        let mut visiting = HashSet::from([target.to_string()]);
        self.resolve_guarded(site, expr, &mut visiting)
    }

    fn resolve_guarded(
        &self,
        site: &BindSite,
        expr: &Spanned<Expr>,
        visiting: &mut HashSet<String>,
    ) -> Result<Resolution, ResolveError> {
        check_cancelled(self.cancel)?;
        if let Some(resolution) = self.straightforward(site, expr) {
            return Ok(resolution);
        }

        let symbols = self.oracle.name_symbols(site, expr);
        let mut unresolved = Vec::new();
        visit::for_each_name(expr, &mut |name| {
            let bound = match name {
                NameRef::Bare { span, .. } => symbols.contains_key(&span),
                NameRef::Member { span, access_span, .. } => {
                    symbols.contains_key(&span) || symbols.contains_key(&access_span)
                }
            };
            if !bound {
                unresolved.push(name);
            }
        });

        let mut inferences = Vec::new();
        for name in unresolved {
            check_cancelled(self.cancel)?;
            let Some(inference) = self.infer(site, name, &symbols, visiting)? else {
                continue;
            };
            tracing::trace!(ident = %inference.ident, ty = %inference.ty, "inferred");
            if let Some(ty) = self.rebind(site, expr, std::slice::from_ref(&inference)) {
                return Ok(Resolution {
                    ty,
                    strategy: inference.strategy,
                    inferences: vec![inference],
                });
            }
            inferences.push(inference);
        }

        // No single cast was enough; try them all at once.
        if inferences.len() > 1 {
            if let Some(ty) = self.rebind(site, expr, &inferences) {
                return Ok(Resolution {
                    ty,
                    strategy: inferences[0].strategy,
                    inferences,
                });
            }
        }

        Err(ResolveError::Undetermined {
            expression: expr.node.to_string(),
        })
    }

    fn straightforward(&self, site: &BindSite, expr: &Spanned<Expr>) -> Option<Resolution> {
        let direct = |ty: TypeRef, strategy: Strategy| Resolution {
            ty,
            strategy,
            inferences: Vec::new(),
        };
        if let Some(ty) = self.oracle.converted_type(site) {
            return Some(direct(ty, Strategy::ConvertedType));
        }
        if let Some(ty) = self.oracle.speculative_type(site, expr) {
            return Some(direct(ty, Strategy::SpeculativeBinding));
        }
        self.oracle
            .operation_type(site, expr)
            .map(|ty| direct(ty, Strategy::OperationType))
    }

    fn rebind(&self, site: &BindSite, expr: &Spanned<Expr>, inferences: &[Inference]) -> Option<TypeRef> {
        let mut rewritten = expr.clone();
        for inference in inferences {
            rewritten = rewrite::insert_cast(&rewritten, inference.span, &inference.ty)?;
        }
        self.oracle.speculative_type(site, &rewritten)
    }

    fn infer(
        &self,
        site: &BindSite,
        name: NameRef<'_>,
        symbols: &HashMap<Span, SymbolInfo>,
        visiting: &mut HashSet<String>,
    ) -> Result<Option<Inference>, ResolveError> {
        let ident = name.ident();
        let owner = self.oracle.declaration(&site.owner);

        // The type a `.Instances`/`.Instance` access is made on: the qualifier, or the owner for a bare name.
        let (qualifier, cast_span) = match name {
            NameRef::Member { target, access_span, .. } => match symbols.get(&target.span) {
                Some(SymbolInfo::Type(ty)) => (Some(ty.clone()), access_span),
                _ => (None, access_span),
            },
            NameRef::Bare { span, .. } => (owner.map(self_type), span),
        };

        if let Some(ty) = qualifier {
            let pattern = match ident {
                "Instances" if self.index.tracked.contains(&ty) => Some((
                    TypeRef::generic(runtime::TRACKED_INSTANCES, vec![ty]),
                    Strategy::InstancesPattern,
                )),
                "Instance" if self.index.singletons.contains(&ty) => Some((ty, Strategy::InstancePattern)),
                _ => None,
            };
            if let Some((ty, strategy)) = pattern {
                return Ok(Some(Inference {
                    ident: ident.to_string(),
                    span: cast_span,
                    ty,
                    strategy,
                }));
            }
        }

        // Sibling assignments only describe the owner's own members: a bare name or `this.Name`.
        let own_member = match name {
            NameRef::Bare { .. } => true,
            NameRef::Member { target, .. } => matches!(target.node, Expr::This),
        };
        let Some(owner) = owner.filter(|_| own_member) else {
            return Ok(None);
        };
        Ok(self.sibling_type(site, owner, ident, visiting)?.map(|ty| Inference {
            ident: ident.to_string(),
            span: cast_span,
            ty,
            strategy: Strategy::SiblingAssignment,
        }))
    }

    /// Resolved type of the first `[Inject]` assignment to `ident` in the owner.
    fn sibling_type(
        &self,
        site: &BindSite,
        owner: &TypeDecl,
        ident: &str,
        visiting: &mut HashSet<String>,
    ) -> Result<Option<TypeRef>, ResolveError> {
        if !visiting.insert(ident.to_string()) {
            return Ok(None);
        }
        let result = self.scan_siblings(site, owner, ident, visiting);
        visiting.remove(ident);
        result
    }

    fn scan_siblings(
        &self,
        site: &BindSite,
        owner: &TypeDecl,
        ident: &str,
        visiting: &mut HashSet<String>,
    ) -> Result<Option<TypeRef>, ResolveError> {
        for method in owner.methods.iter().filter(|m| m.has_attribute(MarkerId::Inject)) {
            for (i, statement) in method.body.iter().enumerate() {
                let Ok(parsed) = parse_statement(statement.text()) else {
                    continue;
                };
                let Stmt::Assign { target, value } = parsed.node else {
                    continue;
                };
                if target.node != ident {
                    continue;
                }
                let sibling = BindSite::at_statement(site.owner.clone(), method.name.clone(), i);
                // First assignment wins, whether or not it resolves.
                return match self.resolve_guarded(&sibling, &value, visiting) {
                    Ok(resolution) => Ok(Some(resolution.ty)),
                    Err(ResolveError::Undetermined { .. }) => Ok(None),
                    Err(err) => Err(err),
                };
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{ModelHost, SymbolKey};
    use derivgen_syntax::parser::parse_expression;

    fn host() -> ModelHost {
        ModelHost::from_json(
            r#"{ "types": [
                { "name": "Game.Enemy", "kind": "class", "base": "UnityEngine.MonoBehaviour",
                  "attributes": [{ "name": "Track" }],
                  "fields": [{ "name": "Health", "type": "int" }] },
                { "name": "Game.Director", "kind": "class", "base": "UnityEngine.MonoBehaviour",
                  "attributes": [{ "name": "Singleton" }] },
                { "name": "Game.Player", "kind": "class", "base": "UnityEngine.MonoBehaviour",
                  "methods": [{ "name": "Init", "attributes": [{ "name": "Inject" }], "body": [
                      "Body = GetComponent<Rigidbody>()",
                      "Mass = Body.mass * 2",
                      "Enemies = Enemy.Instances",
                      "Boss = Director.Instance",
                      { "text": "Camera = FindCamera()", "type": "UnityEngine.Camera" },
                      "Ping = Pong",
                      "Pong = Ping",
                      "Health = Enemy.Instances.Select(x => x.Health).First()"
                  ] }] }
            ] }"#,
        )
        .unwrap()
    }

    fn resolve(host: &ModelHost, statement: usize, text: &str) -> Result<Resolution, ResolveError> {
        let cancel = CancellationToken::new();
        let index = MarkerIndex::build(host, &cancel).unwrap();
        let resolver = ExpressionResolver::new(host, &index, &cancel);
        let site = BindSite::at_statement(SymbolKey::new("Game.Player", 0), "Init", statement);
        resolver.resolve(&site, &parse_expression(text).unwrap())
    }

    #[test]
    fn test_host_resolution_comes_first() {
        let host = host();
        let r = resolve(&host, 0, "GetComponent<Rigidbody>()").unwrap();
        assert_eq!(r.ty.name, "UnityEngine.Rigidbody");
        assert_eq!(r.strategy, Strategy::SpeculativeBinding);
        assert!(r.inferences.is_empty());

        let r = resolve(&host, 4, "FindCamera()").unwrap();
        assert_eq!(r.strategy, Strategy::ConvertedType);
        assert_eq!(r.ty.name, "UnityEngine.Camera");
    }

    #[test]
    fn test_instances_pattern_on_tracked_type() {
        let host = host();
        let r = resolve(&host, 2, "Enemy.Instances").unwrap();
        assert_eq!(r.ty.to_string(), "Medicine.TrackedInstances<Game.Enemy>");
        assert_eq!(r.strategy, Strategy::InstancesPattern);
        assert_eq!(r.inferences[0].span, Span::new(0, 15));
    }

    #[test]
    fn test_instance_pattern_on_singleton() {
        let host = host();
        let r = resolve(&host, 3, "Director.Instance").unwrap();
        assert_eq!(r.ty.name, "Game.Director");
        assert_eq!(r.strategy, Strategy::InstancePattern);
    }

    #[test]
    fn test_sibling_assignment_is_followed() {
        let host = host();
        let r = resolve(&host, 1, "Body.mass * 2").unwrap();
        assert_eq!(r.ty.name, "float");
        assert_eq!(r.strategy, Strategy::SiblingAssignment);
        assert_eq!(r.inferences[0].ty.name, "UnityEngine.Rigidbody");
        assert_eq!(r.inferences[0].span, Span::new(0, 4));
    }

    #[test]
    fn test_inference_feeds_lambda_binding() {
        let host = host();
        let r = resolve(&host, 7, "Enemy.Instances.Select(x => x.Health).First()").unwrap();
        assert_eq!(r.ty.name, "int");
    }

    #[test]
    fn test_assignment_cycle_is_undetermined() {
        let host = host();
        assert_eq!(
            resolve(&host, 5, "Pong"),
            Err(ResolveError::Undetermined {
                expression: "Pong".to_string()
            })
        );
    }

    #[test]
    fn test_unresolved_names_are_tried_in_source_order() {
        // Neither cast is enough alone; both are applied and recorded left to right, and the leftmost
        // inference names the strategy.
        let host = host();
        let r = resolve(&host, 0, "Body ?? Enemy.Instances").unwrap();
        let idents: Vec<_> = r.inferences.iter().map(|i| i.ident.as_str()).collect();
        assert_eq!(idents, vec!["Body", "Instances"]);
        assert_eq!(r.strategy, Strategy::SiblingAssignment);
        assert_eq!(r.ty.name, "UnityEngine.Rigidbody");
    }

    #[test]
    fn test_cancelled_resolution() {
        let host = host();
        let cancel = CancellationToken::new();
        let index = MarkerIndex::build(&host, &cancel).unwrap();
        cancel.cancel();
        let resolver = ExpressionResolver::new(&host, &index, &cancel);
        let site = BindSite::at_statement(SymbolKey::new("Game.Player", 0), "Init", 2);
        assert_eq!(
            resolver.resolve(&site, &parse_expression("Enemy.Instances").unwrap()),
            Err(ResolveError::Cancelled(Cancelled))
        );
    }
}
