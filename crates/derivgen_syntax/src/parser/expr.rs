/// Expression parsing.
///
/// Precedence ladder: lambda -> binary (precedence climbing over [`BinaryOp::precedence`]) -> unary / cast
/// -> postfix (member access, invocation, element access) -> primary.
impl<'a> Parser<'a> {
    fn expression(&mut self) -> Result<Spanned<Expr>, SyntaxError> {
        if let Some(lambda) = self.try_lambda()? {
            return Ok(lambda);
        }
        self.binary(0)
    }

    fn try_lambda(&mut self) -> Result<Option<Spanned<Expr>>, SyntaxError> {
        let start = self.peek().span;
        // x => body
        if matches!(self.peek().kind, TokenKind::Ident(_)) && self.peek_at(1).kind.is_punct(Punct::Arrow) {
            let param = self.identifier()?;
            self.advance();
            let body = self.expression()?;
            let span = start.merge(body.span);
            return Ok(Some(Spanned::new(Expr::Lambda(vec![param], Box::new(body)), span)));
        }
        // (a, b) => body
        if !self.check_punct(Punct::LParen) {
            return Ok(None);
        }
        let mut offset = 1;
        let mut expect_ident = true;
        loop {
            let kind = &self.peek_at(offset).kind;
            match kind {
                TokenKind::Punct(Punct::RParen) if expect_ident && offset != 1 => return Ok(None),
                TokenKind::Punct(Punct::RParen) => break,
                TokenKind::Ident(_) if expect_ident => expect_ident = false,
                TokenKind::Punct(Punct::Comma) if !expect_ident => expect_ident = true,
                _ => return Ok(None),
            }
            offset += 1;
        }
        if !self.peek_at(offset + 1).kind.is_punct(Punct::Arrow) {
            return Ok(None);
        }
        self.advance();
        let mut params = Vec::new();
        while !self.check_punct(Punct::RParen) {
            params.push(self.identifier()?);
            self.match_punct(Punct::Comma);
        }
        self.advance();
        self.expect_punct(Punct::Arrow, "'=>'")?;
        let body = self.expression()?;
        let span = start.merge(body.span);
        Ok(Some(Spanned::new(Expr::Lambda(params, Box::new(body)), span)))
    }

    fn binary_op(&self) -> Option<BinaryOp> {
        let TokenKind::Punct(p) = self.peek().kind else {
            return None;
        };
        Some(match p {
            Punct::QuestionQuestion => BinaryOp::Coalesce,
            Punct::OrOr => BinaryOp::Or,
            Punct::AndAnd => BinaryOp::And,
            Punct::EqEq => BinaryOp::Eq,
            Punct::NotEq => BinaryOp::NotEq,
            Punct::Lt => BinaryOp::Lt,
            Punct::Gt => BinaryOp::Gt,
            Punct::LtEq => BinaryOp::LtEq,
            Punct::GtEq => BinaryOp::GtEq,
            Punct::Plus => BinaryOp::Add,
            Punct::Minus => BinaryOp::Sub,
            Punct::Star => BinaryOp::Mul,
            Punct::Slash => BinaryOp::Div,
            _ => return None,
        })
    }

    fn binary(&mut self, min_prec: u8) -> Result<Spanned<Expr>, SyntaxError> {
        let mut left = self.unary()?;
        while let Some(op) = self.binary_op() {
            let prec = op.precedence();
            if prec < min_prec {
                break;
            }
            self.advance();
            let next_min = if op.is_right_assoc() { prec } else { prec + 1 };
            let right = self.binary(next_min)?;
            let span = left.span.merge(right.span);
            left = Spanned::new(Expr::Binary(Box::new(left), op, Box::new(right)), span);
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Spanned<Expr>, SyntaxError> {
        let start = self.peek().span;
        let op = if self.match_punct(Punct::Bang) {
            Some(UnaryOp::Not)
        } else if self.match_punct(Punct::Minus) {
            Some(UnaryOp::Neg)
        } else {
            None
        };
        if let Some(op) = op {
            let operand = self.unary()?;
            let span = start.merge(operand.span);
            return Ok(Spanned::new(Expr::Unary(op, Box::new(operand)), span));
        }
        if let Some(cast) = self.try_cast()? {
            return Ok(cast);
        }
        self.postfix()
    }

    /// `(Type)operand`, recognised only when the token after `)` can start an operand.
    fn try_cast(&mut self) -> Result<Option<Spanned<Expr>>, SyntaxError> {
        if !self.check_punct(Punct::LParen) {
            return Ok(None);
        }
        let saved = self.pos;
        let start = self.advance().span;
        let ty = match self.type_syntax() {
            Ok(ty) if self.check_punct(Punct::RParen) => ty,
            _ => {
                self.pos = saved;
                return Ok(None);
            }
        };
        let casts = match &self.peek_at(1).kind {
            TokenKind::Ident(_) | TokenKind::Int(_) | TokenKind::Float(_) | TokenKind::String(_) => true,
            TokenKind::Keyword(k) => matches!(
                k,
                Keyword::This | Keyword::New | Keyword::True | Keyword::False | Keyword::Null
            ),
            TokenKind::Punct(p) => matches!(p, Punct::LParen | Punct::Bang),
            TokenKind::Eof => false,
        };
        if !casts {
            self.pos = saved;
            return Ok(None);
        }
        self.advance();
        let operand = self.unary()?;
        let span = start.merge(operand.span);
        Ok(Some(Spanned::new(Expr::Cast(ty, Box::new(operand)), span)))
    }

    fn postfix(&mut self) -> Result<Spanned<Expr>, SyntaxError> {
        let mut expr = self.primary()?;
        loop {
            if self.match_punct(Punct::Dot) {
                let ident = self.identifier()?;
                let type_args = self.try_type_args().unwrap_or_default();
                let name_span = ident.span.merge(self.previous_span());
                let name = Spanned::new(
                    SimpleName {
                        ident: ident.node,
                        type_args,
                    },
                    name_span,
                );
                let span = expr.span.merge(name_span);
                expr = Spanned::new(Expr::Member(Box::new(expr), name), span);
            } else if self.check_punct(Punct::LParen) {
                self.advance();
                let args = self.arguments(Punct::RParen)?;
                let span = expr.span.merge(self.previous_span());
                expr = Spanned::new(Expr::Invoke(Box::new(expr), args), span);
            } else if self.check_punct(Punct::LBracket) {
                self.advance();
                let args = self.arguments(Punct::RBracket)?;
                let span = expr.span.merge(self.previous_span());
                expr = Spanned::new(Expr::Index(Box::new(expr), args), span);
            } else {
                break;
            }
        }
        Ok(expr)
    }

    /// Comma-separated arguments up to and including `close`.
    fn arguments(&mut self, close: Punct) -> Result<Vec<Spanned<Expr>>, SyntaxError> {
        let mut args = Vec::new();
        if self.match_punct(close) {
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            if self.match_punct(close) {
                return Ok(args);
            }
            self.expect_punct(Punct::Comma, "',' between arguments")?;
        }
    }

    fn primary(&mut self) -> Result<Spanned<Expr>, SyntaxError> {
        let start = self.peek().span;
        let kind = self.peek().kind.clone();
        match kind {
            TokenKind::Int(v) => {
                self.advance();
                Ok(Spanned::new(Expr::Literal(Literal::Int(v)), start))
            }
            TokenKind::Float(text) => {
                self.advance();
                Ok(Spanned::new(Expr::Literal(Literal::Float(text)), start))
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(Spanned::new(Expr::Literal(Literal::String(s)), start))
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                Ok(Spanned::new(Expr::Literal(Literal::Bool(true)), start))
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                Ok(Spanned::new(Expr::Literal(Literal::Bool(false)), start))
            }
            TokenKind::Keyword(Keyword::Null) => {
                self.advance();
                Ok(Spanned::new(Expr::Literal(Literal::Null), start))
            }
            TokenKind::Keyword(Keyword::This) => {
                self.advance();
                Ok(Spanned::new(Expr::This, start))
            }
            TokenKind::Keyword(Keyword::New) => {
                self.advance();
                let ty = self.type_syntax()?;
                self.expect_punct(Punct::LParen, "'(' after type in object creation")?;
                let args = self.arguments(Punct::RParen)?;
                let span = start.merge(self.previous_span());
                Ok(Spanned::new(Expr::New(ty, args), span))
            }
            TokenKind::Punct(Punct::LParen) => {
                self.advance();
                let inner = self.expression()?;
                self.expect_punct(Punct::RParen, "')'")?;
                let span = start.merge(self.previous_span());
                Ok(Spanned::new(Expr::Paren(Box::new(inner)), span))
            }
            TokenKind::Ident(_) => {
                self.skip_global_alias();
                let ident = self.identifier()?;
                let type_args = self.try_type_args().unwrap_or_default();
                let span = start.merge(self.previous_span());
                Ok(Spanned::new(
                    Expr::Name(SimpleName {
                        ident: ident.node,
                        type_args,
                    }),
                    span,
                ))
            }
            _ => Err(self.unexpected("expression")),
        }
    }
}
