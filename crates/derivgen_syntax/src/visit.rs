//! Source-order traversal helpers.

use crate::ast::*;

/// One identifier occurrence inside an expression tree.
#[derive(Debug, Clone, Copy)]
pub enum NameRef<'a> {
    /// An unqualified name (`Body`, `GetComponent<Rigidbody>`).
    Bare { name: &'a SimpleName, span: Span },
    /// The name part of a member access (`Instances` in `Enemy.Instances`).
    Member {
        name: &'a SimpleName,
        span: Span,
        target: &'a Spanned<Expr>,
        access_span: Span,
    },
}

impl<'a> NameRef<'a> {
    pub fn ident(&self) -> &'a str {
        match self {
            NameRef::Bare { name, .. } | NameRef::Member { name, .. } => &name.ident,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            NameRef::Bare { span, .. } | NameRef::Member { span, .. } => *span,
        }
    }
}

/// Visit every identifier occurrence in source order. Lambda parameter declarations are not visited;
/// references to them in the body are.
pub fn for_each_name<'a>(expr: &'a Spanned<Expr>, f: &mut impl FnMut(NameRef<'a>)) {
    match &expr.node {
        Expr::Name(name) => f(NameRef::Bare { name, span: expr.span }),
        Expr::Literal(_) | Expr::This => {}
        Expr::Member(target, name) => {
            for_each_name(target, f);
            f(NameRef::Member {
                name: &name.node,
                span: name.span,
                target,
                access_span: expr.span,
            });
        }
        Expr::Invoke(callee, args) | Expr::Index(callee, args) => {
            for_each_name(callee, f);
            for arg in args {
                for_each_name(arg, f);
            }
        }
        Expr::Cast(_, operand) | Expr::Unary(_, operand) | Expr::Paren(operand) => for_each_name(operand, f),
        Expr::New(_, args) => {
            for arg in args {
                for_each_name(arg, f);
            }
        }
        Expr::Lambda(_, body) => for_each_name(body, f),
        Expr::Binary(left, _, right) => {
            for_each_name(left, f);
            for_each_name(right, f);
        }
    }
}

/// Visit every type written in the tree: cast and `new` targets and explicit generic arguments.
pub fn for_each_type<'a>(expr: &'a Spanned<Expr>, f: &mut impl FnMut(&'a TypeSyntax)) {
    match &expr.node {
        Expr::Name(name) => name.type_args.iter().for_each(&mut *f),
        Expr::Member(_, name) => name.node.type_args.iter().for_each(&mut *f),
        Expr::Cast(ty, _) | Expr::New(ty, _) => f(&ty.node),
        _ => {}
    }
    for child in children(expr) {
        for_each_type(child, f);
    }
}

/// Find the node with exactly `span`, if any.
pub fn find_by_span(expr: &Spanned<Expr>, span: Span) -> Option<&Spanned<Expr>> {
    if expr.span == span {
        return Some(expr);
    }
    if !expr.span.contains(span) {
        return None;
    }
    children(expr).into_iter().find_map(|child| find_by_span(child, span))
}

/// Direct sub-expressions in source order.
pub fn children(expr: &Spanned<Expr>) -> Vec<&Spanned<Expr>> {
    match &expr.node {
        Expr::Name(_) | Expr::Literal(_) | Expr::This => Vec::new(),
        Expr::Member(target, _) => vec![target.as_ref()],
        Expr::Invoke(callee, args) | Expr::Index(callee, args) => {
            std::iter::once(callee.as_ref()).chain(args.iter()).collect()
        }
        Expr::Cast(_, operand) | Expr::Unary(_, operand) | Expr::Paren(operand) | Expr::Lambda(_, operand) => {
            vec![operand.as_ref()]
        }
        Expr::New(_, args) => args.iter().collect(),
        Expr::Binary(left, _, right) => vec![left.as_ref(), right.as_ref()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_expression;

    #[test]
    fn test_names_are_visited_in_source_order() {
        let e = parse_expression("Enemy.Instances.Select(x => x.Health)").unwrap();
        let mut seen = Vec::new();
        for_each_name(&e, &mut |n| seen.push(n.ident().to_string()));
        assert_eq!(seen, vec!["Enemy", "Instances", "Select", "x", "Health"]);
    }

    #[test]
    fn test_member_ref_points_at_its_access() {
        let e = parse_expression("Enemy.Instances").unwrap();
        let mut access = None;
        for_each_name(&e, &mut |n| {
            if let NameRef::Member { access_span, target, .. } = n {
                access = Some((access_span, target.span));
            }
        });
        assert_eq!(access, Some((Span::new(0, 15), Span::new(0, 5))));
    }

    #[test]
    fn test_types_are_collected_from_casts_and_generic_names() {
        let e = parse_expression("((Game.Enemy)o).GetComponent<Rigidbody>()").unwrap();
        let mut seen = Vec::new();
        for_each_type(&e, &mut |t| seen.push(t.name.clone()));
        assert_eq!(seen, vec!["Rigidbody", "Game.Enemy"]);
    }

    #[test]
    fn test_find_by_span() {
        let e = parse_expression("a.b(c)").unwrap();
        let found = find_by_span(&e, Span::new(4, 5)).expect("argument should be found");
        assert!(matches!(&found.node, Expr::Name(n) if n.ident == "c"));
        assert!(find_by_span(&e, Span::new(1, 2)).is_none());
    }
}
