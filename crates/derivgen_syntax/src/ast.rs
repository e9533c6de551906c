//! Syntax tree definitions for body expressions and type references.

/// Source location span (byte offsets into the parsed text).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn contains(self, other: Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// A node with source location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }
}

pub type Ident = String;

/// A type reference as written: `Game.Pool<Game.Enemy>[]`, `int?`, `T`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeSyntax {
    /// Dotted name without any `global::` prefix.
    pub name: String,
    pub args: Vec<TypeSyntax>,
    pub nullable: bool,
    /// Number of `[]` suffixes.
    pub array_rank: u8,
}

impl TypeSyntax {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            nullable: false,
            array_rank: 0,
        }
    }

    pub fn generic(name: impl Into<String>, args: Vec<TypeSyntax>) -> Self {
        Self {
            args,
            ..Self::named(name)
        }
    }

    /// Last segment of the dotted name.
    pub fn simple_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }
}

/// An identifier with optional explicit type arguments: `GetComponent<Rigidbody>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SimpleName {
    pub ident: Ident,
    pub type_args: Vec<TypeSyntax>,
}

impl SimpleName {
    pub fn plain(ident: impl Into<Ident>) -> Self {
        Self {
            ident: ident.into(),
            type_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Literal {
    Int(i64),
    /// Kept as written so trees stay `Eq + Hash`.
    Float(String),
    String(String),
    Bool(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Coalesce,
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Coalesce => "??",
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::LtEq => "<=",
            BinaryOp::GtEq => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }

    /// Binding power; higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Coalesce => 1,
            BinaryOp::Or => 2,
            BinaryOp::And => 3,
            BinaryOp::Eq | BinaryOp::NotEq => 4,
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::LtEq | BinaryOp::GtEq => 5,
            BinaryOp::Add | BinaryOp::Sub => 6,
            BinaryOp::Mul | BinaryOp::Div => 7,
        }
    }

    /// `??` is right-associative, everything else is left-associative.
    pub fn is_right_assoc(self) -> bool {
        matches!(self, BinaryOp::Coalesce)
    }

    /// Whether the result is `bool` regardless of operand types.
    pub fn is_boolean(self) -> bool {
        !matches!(
            self,
            BinaryOp::Coalesce | BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div
        )
    }
}

/// Parameter passing mode for member signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum RefKind {
    #[default]
    Value,
    Ref,
    Out,
    In,
}

impl RefKind {
    pub fn keyword(self) -> Option<&'static str> {
        match self {
            RefKind::Value => None,
            RefKind::Ref => Some("ref"),
            RefKind::Out => Some("out"),
            RefKind::In => Some("in"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    Name(SimpleName),
    Literal(Literal),
    This,
    Member(Box<Spanned<Expr>>, Spanned<SimpleName>),
    Invoke(Box<Spanned<Expr>>, Vec<Spanned<Expr>>),
    Index(Box<Spanned<Expr>>, Vec<Spanned<Expr>>),
    Cast(Spanned<TypeSyntax>, Box<Spanned<Expr>>),
    New(Spanned<TypeSyntax>, Vec<Spanned<Expr>>),
    Lambda(Vec<Spanned<Ident>>, Box<Spanned<Expr>>),
    Unary(UnaryOp, Box<Spanned<Expr>>),
    Binary(Box<Spanned<Expr>>, BinaryOp, Box<Spanned<Expr>>),
    Paren(Box<Spanned<Expr>>),
}

impl Expr {
    /// The bare identifier, if this is an unqualified name.
    pub fn as_name(&self) -> Option<&SimpleName> {
        match self {
            Expr::Name(n) => Some(n),
            _ => None,
        }
    }
}

/// A body statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Stmt {
    /// `Name = value` (a leading `this.` on the target is dropped by the parser).
    Assign {
        target: Spanned<Ident>,
        value: Spanned<Expr>,
    },
    Expr(Spanned<Expr>),
}
