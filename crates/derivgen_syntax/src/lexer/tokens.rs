//! Token types for the body-expression lexer.

use crate::ast::Span;

/// Reserved words the parser cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    New,
    This,
    True,
    False,
    Null,
    Ref,
    Out,
    In,
}

impl Keyword {
    pub fn lookup(s: &str) -> Option<Keyword> {
        Some(match s {
            "new" => Keyword::New,
            "this" => Keyword::This,
            "true" => Keyword::True,
            "false" => Keyword::False,
            "null" => Keyword::Null,
            "ref" => Keyword::Ref,
            "out" => Keyword::Out,
            "in" => Keyword::In,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Punct {
    Dot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Lt,
    Gt,
    LtEq,
    GtEq,
    Assign,
    EqEq,
    NotEq,
    Arrow,
    Question,
    QuestionQuestion,
    Bang,
    Plus,
    Minus,
    Star,
    Slash,
    AndAnd,
    OrOr,
    Semicolon,
    ColonColon,
}

/// Kind of token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Keyword(Keyword),
    Punct(Punct),
    Ident(String),
    Int(i64),
    Float(String),
    String(String),
    Eof,
}

/// A token with its kind and source span.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

impl TokenKind {
    pub fn is_punct(&self, p: Punct) -> bool {
        matches!(self, TokenKind::Punct(q) if *q == p)
    }

    pub fn is_keyword(&self, k: Keyword) -> bool {
        matches!(self, TokenKind::Keyword(q) if *q == k)
    }
}
