//! Canonical text rendering.
//!
//! The printer is used for fingerprints (so whitespace differences in the source never invalidate a
//! cache entry), for diagnostics, and for doc comments in emitted code. Parenthesization follows the
//! tree: explicit `Paren` nodes print their parentheses, and binary operands are wrapped only when
//! precedence requires it.

use std::fmt;

use crate::ast::*;

impl fmt::Display for TypeSyntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.args.is_empty() {
            f.write_str("<")?;
            write_joined(f, &self.args)?;
            f.write_str(">")?;
        }
        if self.nullable {
            f.write_str("?")?;
        }
        for _ in 0..self.array_rank {
            f.write_str("[]")?;
        }
        Ok(())
    }
}

impl fmt::Display for SimpleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.ident)?;
        if !self.type_args.is_empty() {
            f.write_str("<")?;
            write_joined(f, &self.type_args)?;
            f.write_str(">")?;
        }
        Ok(())
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(v) => write!(f, "{v}"),
            Literal::Float(text) => f.write_str(text),
            Literal::String(s) => {
                f.write_str("\"")?;
                for c in s.chars() {
                    match c {
                        '"' => f.write_str("\\\"")?,
                        '\\' => f.write_str("\\\\")?,
                        '\n' => f.write_str("\\n")?,
                        '\t' => f.write_str("\\t")?,
                        '\r' => f.write_str("\\r")?,
                        '\0' => f.write_str("\\0")?,
                        other => write!(f, "{other}")?,
                    }
                }
                f.write_str("\"")
            }
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Null => f.write_str("null"),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Name(name) => write!(f, "{name}"),
            Expr::Literal(lit) => write!(f, "{lit}"),
            Expr::This => f.write_str("this"),
            Expr::Member(target, name) => write!(f, "{}.{}", target.node, name.node),
            Expr::Invoke(callee, args) => {
                write!(f, "{}(", callee.node)?;
                write_joined_nodes(f, args)?;
                f.write_str(")")
            }
            Expr::Index(target, args) => {
                write!(f, "{}[", target.node)?;
                write_joined_nodes(f, args)?;
                f.write_str("]")
            }
            Expr::Cast(ty, operand) => write!(f, "({}){}", ty.node, operand.node),
            Expr::New(ty, args) => {
                write!(f, "new {}(", ty.node)?;
                write_joined_nodes(f, args)?;
                f.write_str(")")
            }
            Expr::Lambda(params, body) => {
                if params.len() == 1 {
                    write!(f, "{} => {}", params[0].node, body.node)
                } else {
                    f.write_str("(")?;
                    for (i, p) in params.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        f.write_str(&p.node)?;
                    }
                    write!(f, ") => {}", body.node)
                }
            }
            Expr::Unary(op, operand) => {
                let sym = match op {
                    UnaryOp::Not => "!",
                    UnaryOp::Neg => "-",
                };
                write!(f, "{sym}{}", operand.node)
            }
            Expr::Binary(left, op, right) => {
                write_operand(f, &left.node, *op, false)?;
                write!(f, " {} ", op.as_str())?;
                write_operand(f, &right.node, *op, true)
            }
            Expr::Paren(inner) => write!(f, "({})", inner.node),
        }
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::Assign { target, value } => write!(f, "{} = {}", target.node, value.node),
            Stmt::Expr(expr) => write!(f, "{}", expr.node),
        }
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, operand: &Expr, parent: BinaryOp, is_right: bool) -> fmt::Result {
    let needs_parens = match operand {
        Expr::Binary(_, child, _) => {
            child.precedence() < parent.precedence()
                || (child.precedence() == parent.precedence() && is_right != parent.is_right_assoc())
        }
        Expr::Lambda(..) => true,
        _ => false,
    };
    if needs_parens {
        write!(f, "({operand})")
    } else {
        write!(f, "{operand}")
    }
}

fn write_joined<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn write_joined_nodes<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[Spanned<T>]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item.node)?;
    }
    Ok(())
}
