/// Parser core: token cursor and small matching helpers.
///
/// ## Notes
/// - This file is `include!`'d into `crate::parser`.
/// - The parser is single-pass with bounded backtracking: generic argument lists, casts and lambdas are
///   detected by saving `pos`, trying the longer form, and restoring on failure.
pub struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    /// Create a parser over a token stream that ends with `Eof`.
    pub fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[(self.pos + offset).min(last)]
    }

    fn advance(&mut self) -> &Token {
        let idx = self.pos.min(self.tokens.len().saturating_sub(1));
        if !self.is_at_end() {
            self.pos += 1;
        }
        &self.tokens[idx]
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn check_punct(&self, p: Punct) -> bool {
        self.peek().kind.is_punct(p)
    }

    fn match_punct(&mut self, p: Punct) -> bool {
        if self.check_punct(p) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, p: Punct, what: &str) -> Result<Span, SyntaxError> {
        if self.check_punct(p) {
            Ok(self.advance().span)
        } else {
            Err(self.unexpected(what))
        }
    }

    fn match_keyword(&mut self, k: Keyword) -> bool {
        if self.peek().kind.is_keyword(k) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn previous_span(&self) -> Span {
        if self.pos == 0 {
            return self.peek().span;
        }
        self.tokens[self.pos - 1].span
    }

    fn unexpected(&self, expected: &str) -> SyntaxError {
        let tok = self.peek();
        let found = match &tok.kind {
            TokenKind::Eof => "end of input".to_string(),
            TokenKind::Ident(name) => format!("identifier '{name}'"),
            other => format!("{other:?}"),
        };
        SyntaxError::new(format!("expected {expected}, found {found}"), tok.span)
    }

    fn identifier(&mut self) -> Result<Spanned<Ident>, SyntaxError> {
        match &self.peek().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                let span = self.advance().span;
                Ok(Spanned::new(name, span))
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    /// Skip an optional `global::` alias qualifier.
    fn skip_global_alias(&mut self) {
        if matches!(&self.peek().kind, TokenKind::Ident(n) if n == "global") && self.peek_at(1).kind.is_punct(Punct::ColonColon)
        {
            self.advance();
            self.advance();
        }
    }

    fn expect_end(&mut self) -> Result<(), SyntaxError> {
        self.match_punct(Punct::Semicolon);
        if self.is_at_end() {
            Ok(())
        } else {
            Err(self.unexpected("end of input"))
        }
    }
}
