//! Parser for body statements, expressions and type references.
//!
//! ## Examples
//!
//! ```rust
//! use derivgen_syntax::parser;
//!
//! let expr = parser::parse_expression("Enemy.Instances.Select(e => e.Health)").unwrap();
//! assert_eq!(expr.node.to_string(), "Enemy.Instances.Select(e => e.Health)");
//!
//! let ty = parser::parse_type("global::Medicine.IUnmanagedData<Game.Stats>").unwrap();
//! assert_eq!(ty.name, "Medicine.IUnmanagedData");
//! ```

use crate::ast::*;
use crate::diagnostics::SyntaxError;
use crate::lexer::{self, Keyword, Punct, Token, TokenKind};

// NOTE: This module is split across multiple files using `include!` to keep all parser
// methods in the same Rust module while avoiding a single large source file.

include!("parser/core.rs");
include!("parser/types.rs");
include!("parser/expr.rs");
include!("parser/stmts.rs");
include!("parser/api.rs");
include!("parser/tests.rs");
