//! Disposable tree rewrites used for speculative rebinding.
//!
//! Rewrites never touch the input tree: they clone it and return the modified copy. Synthetic nodes reuse
//! the span of the node they wrap, so positions reported against the rewritten tree still point into the
//! original text.

use crate::ast::*;

/// Return a copy of `expr` in which the node spanning exactly `target` is wrapped as `((ty)node)`.
///
/// Returns `None` when no node has that span.
pub fn insert_cast(expr: &Spanned<Expr>, target: Span, ty: &TypeSyntax) -> Option<Spanned<Expr>> {
    if !expr.span.contains(target) {
        return None;
    }
    let mut copy = expr.clone();
    if wrap_in_place(&mut copy, target, ty) {
        Some(copy)
    } else {
        None
    }
}

fn wrap_in_place(expr: &mut Spanned<Expr>, target: Span, ty: &TypeSyntax) -> bool {
    if expr.span == target {
        let span = expr.span;
        let original = std::mem::replace(&mut expr.node, Expr::This);
        let cast = Expr::Cast(Spanned::new(ty.clone(), span), Box::new(Spanned::new(original, span)));
        expr.node = Expr::Paren(Box::new(Spanned::new(cast, span)));
        return true;
    }
    if !expr.span.contains(target) {
        return false;
    }
    match &mut expr.node {
        Expr::Name(_) | Expr::Literal(_) | Expr::This => false,
        Expr::Member(inner, _)
        | Expr::Cast(_, inner)
        | Expr::Unary(_, inner)
        | Expr::Paren(inner)
        | Expr::Lambda(_, inner) => wrap_in_place(inner, target, ty),
        Expr::Invoke(callee, args) | Expr::Index(callee, args) => {
            wrap_in_place(callee, target, ty) || args.iter_mut().any(|a| wrap_in_place(a, target, ty))
        }
        Expr::New(_, args) => args.iter_mut().any(|a| wrap_in_place(a, target, ty)),
        Expr::Binary(left, _, right) => wrap_in_place(left, target, ty) || wrap_in_place(right, target, ty),
    }
}
