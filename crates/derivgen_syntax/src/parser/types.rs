/// Type reference parsing: `global::A.B<C, D>?[]`.
impl<'a> Parser<'a> {
    fn type_syntax(&mut self) -> Result<Spanned<TypeSyntax>, SyntaxError> {
        let start = self.peek().span;
        self.skip_global_alias();
        let first = self.identifier()?;
        let mut name = first.node;
        while self.check_punct(Punct::Dot) && matches!(self.peek_at(1).kind, TokenKind::Ident(_)) {
            self.advance();
            let segment = self.identifier()?;
            name.push('.');
            name.push_str(&segment.node);
        }

        let mut args = Vec::new();
        if self.match_punct(Punct::Lt) {
            loop {
                args.push(self.type_syntax()?.node);
                if !self.match_punct(Punct::Comma) {
                    break;
                }
            }
            self.expect_punct(Punct::Gt, "'>' to close type arguments")?;
        }

        let nullable = self.match_punct(Punct::Question);
        let mut array_rank = 0u8;
        while self.check_punct(Punct::LBracket) && self.peek_at(1).kind.is_punct(Punct::RBracket) {
            self.advance();
            self.advance();
            array_rank = array_rank.saturating_add(1);
        }

        let span = start.merge(self.previous_span());
        Ok(Spanned::new(
            TypeSyntax {
                name,
                args,
                nullable,
                array_rank,
            },
            span,
        ))
    }

    /// Try to read `<T, U>` after a name in expression position.
    ///
    /// Succeeds only when the list is well formed and followed by a token that cannot continue a
    /// comparison (the same disambiguation rule C# uses); otherwise the cursor is restored.
    fn try_type_args(&mut self) -> Option<Vec<TypeSyntax>> {
        if !self.check_punct(Punct::Lt) {
            return None;
        }
        let saved = self.pos;
        self.advance();
        let mut args = Vec::new();
        loop {
            match self.type_syntax() {
                Ok(ty) => args.push(ty.node),
                Err(_) => {
                    self.pos = saved;
                    return None;
                }
            }
            if !self.match_punct(Punct::Comma) {
                break;
            }
        }
        if !self.match_punct(Punct::Gt) {
            self.pos = saved;
            return None;
        }
        let follows = match &self.peek().kind {
            TokenKind::Eof => true,
            TokenKind::Punct(p) => matches!(
                p,
                Punct::LParen
                    | Punct::RParen
                    | Punct::RBracket
                    | Punct::Dot
                    | Punct::Comma
                    | Punct::Semicolon
                    | Punct::EqEq
                    | Punct::NotEq
                    | Punct::AndAnd
                    | Punct::OrOr
                    | Punct::QuestionQuestion
                    | Punct::Question
                    | Punct::LBracket
            ),
            _ => false,
        };
        if follows {
            Some(args)
        } else {
            self.pos = saved;
            None
        }
    }
}
