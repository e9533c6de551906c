#[cfg(test)]
/// Parser unit tests.
///
/// These focus on the forms the binder relies on and on the ambiguity rules (generic arguments
/// vs comparison, cast vs parenthesized expression, lambda vs parenthesized expression).
mod tests {
    use super::*;

    fn expr(source: &str) -> Expr {
        parse_expression(source).unwrap().node
    }

    #[test]
    fn test_generic_invocation() {
        match expr("GetComponent<Rigidbody>()") {
            Expr::Invoke(callee, args) => {
                assert!(args.is_empty());
                let name = callee.node.as_name().expect("callee should be a name");
                assert_eq!(name.ident, "GetComponent");
                assert_eq!(name.type_args, vec![TypeSyntax::named("Rigidbody")]);
            }
            other => panic!("expected invocation, got {other:?}"),
        }
    }

    #[test]
    fn test_less_than_is_comparison_when_not_followed_by_call() {
        match expr("a < b") {
            Expr::Binary(_, BinaryOp::Lt, _) => {}
            other => panic!("expected comparison, got {other:?}"),
        }
    }

    #[test]
    fn test_member_generic_invocation() {
        match expr("transform.GetComponentInChildren<Animator>()") {
            Expr::Invoke(callee, _) => match &callee.node {
                Expr::Member(_, name) => assert_eq!(name.node.type_args.len(), 1),
                other => panic!("expected member, got {other:?}"),
            },
            other => panic!("expected invocation, got {other:?}"),
        }
    }

    #[test]
    fn test_cast_vs_parenthesized() {
        assert!(matches!(expr("(Rigidbody)x"), Expr::Cast(..)));
        assert!(matches!(expr("(a) + b"), Expr::Binary(..)));
        assert!(matches!(expr("(a)"), Expr::Paren(..)));
    }

    #[test]
    fn test_lambda_forms() {
        assert!(matches!(expr("x => x.Health"), Expr::Lambda(p, _) if p.len() == 1));
        assert!(matches!(expr("(a, b) => a"), Expr::Lambda(p, _) if p.len() == 2));
        assert!(matches!(expr("() => 1"), Expr::Lambda(p, _) if p.is_empty()));
    }

    #[test]
    fn test_coalesce_is_right_associative() {
        match expr("a ?? b ?? c") {
            Expr::Binary(left, BinaryOp::Coalesce, right) => {
                assert!(matches!(left.node, Expr::Name(_)));
                assert!(matches!(right.node, Expr::Binary(_, BinaryOp::Coalesce, _)));
            }
            other => panic!("expected coalesce, got {other:?}"),
        }
    }

    #[test]
    fn test_arithmetic_precedence() {
        match expr("a + b * c") {
            Expr::Binary(_, BinaryOp::Add, right) => {
                assert!(matches!(right.node, Expr::Binary(_, BinaryOp::Mul, _)));
            }
            other => panic!("expected addition at the root, got {other:?}"),
        }
    }

    #[test]
    fn test_new_with_generic_type() {
        match expr("new List<int>()") {
            Expr::New(ty, args) => {
                assert_eq!(ty.node.name, "List");
                assert_eq!(ty.node.args, vec![TypeSyntax::named("int")]);
                assert!(args.is_empty());
            }
            other => panic!("expected object creation, got {other:?}"),
        }
    }

    #[test]
    fn test_assignment_statement_drops_this() {
        let stmt = parse_statement("this.Body = GetComponent<Rigidbody>();").unwrap();
        match stmt.node {
            Stmt::Assign { target, value } => {
                assert_eq!(target.node, "Body");
                assert!(matches!(value.node, Expr::Invoke(..)));
            }
            other => panic!("expected assignment, got {other:?}"),
        }
    }

    #[test]
    fn test_equality_is_not_assignment() {
        let stmt = parse_statement("a == b").unwrap();
        assert!(matches!(stmt.node, Stmt::Expr(_)));
    }

    #[test]
    fn test_type_syntax_forms() {
        let ty = parse_type("global::Game.Pool<Game.Enemy, int>[]").unwrap();
        assert_eq!(ty.name, "Game.Pool");
        assert_eq!(ty.args.len(), 2);
        assert_eq!(ty.array_rank, 1);
        assert!(parse_type("int?").unwrap().nullable);
    }

    #[test]
    fn test_spans_cover_nodes() {
        let e = parse_expression("Foo.Instances").unwrap();
        assert_eq!(e.span, Span::new(0, 13));
        match e.node {
            Expr::Member(target, name) => {
                assert_eq!(target.span, Span::new(0, 3));
                assert_eq!(name.span, Span::new(4, 13));
            }
            other => panic!("expected member access, got {other:?}"),
        }
    }

    #[test]
    fn test_trailing_tokens_are_an_error() {
        let err = parse_expression("a b").unwrap_err();
        assert!(err.message.contains("end of input"), "{}", err.message);
    }

    #[test]
    fn test_unclosed_invocation_is_an_error() {
        assert!(parse_expression("Foo(").is_err());
    }
}
