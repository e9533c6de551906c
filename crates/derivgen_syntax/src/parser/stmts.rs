/// Statement parsing: `[this.]Name = expr;` or a bare expression statement.
impl<'a> Parser<'a> {
    fn statement(&mut self) -> Result<Spanned<Stmt>, SyntaxError> {
        let start = self.peek().span;
        let this_prefixed = self.peek().kind.is_keyword(Keyword::This)
            && self.peek_at(1).kind.is_punct(Punct::Dot)
            && matches!(self.peek_at(2).kind, TokenKind::Ident(_))
            && self.peek_at(3).kind.is_punct(Punct::Assign);
        let plain = matches!(self.peek().kind, TokenKind::Ident(_)) && self.peek_at(1).kind.is_punct(Punct::Assign);

        if this_prefixed || plain {
            if this_prefixed {
                self.match_keyword(Keyword::This);
                self.advance();
            }
            let target = self.identifier()?;
            self.expect_punct(Punct::Assign, "'='")?;
            let value = self.expression()?;
            let span = start.merge(value.span);
            return Ok(Spanned::new(Stmt::Assign { target, value }, span));
        }

        let expr = self.expression()?;
        let span = expr.span;
        Ok(Spanned::new(Stmt::Expr(expr), span))
    }
}
