//! Expression and type syntax for declaration-graph bodies: lexer, parser, AST, printer, rewriting.
//!
//! The model host stores initializer statements (`Rigidbody = GetComponent<Rigidbody>();`) and member
//! types (`Medicine.IUnmanagedData<Game.Stats>`) as text. This crate turns that text into spanned trees
//! the binder and the expression type resolver can walk, prints trees back in canonical form, and builds
//! the disposable rewritten copies used for speculative rebinding.
//!
//! ## Notes
//! - This crate is syntax-only: it does not resolve names or types.
//! - Spans are byte offsets into the parsed text; every node of a parsed tree has a distinct span, which
//!   is what [`rewrite`] uses to address sub-expressions.
//!
//! ## Examples
//! ```rust
//! use derivgen_syntax::parser;
//!
//! let stmt = parser::parse_statement("Body = GetComponent<Rigidbody>();").unwrap();
//! assert_eq!(stmt.node.to_string(), "Body = GetComponent<Rigidbody>()");
//! ```

pub mod ast;
pub mod diagnostics;
pub mod lexer;
pub mod parser;
pub mod print;
pub mod rewrite;
pub mod visit;

pub use ast::{BinaryOp, Expr, Ident, Literal, RefKind, SimpleName, Span, Spanned, Stmt, TypeSyntax, UnaryOp};
pub use diagnostics::SyntaxError;
