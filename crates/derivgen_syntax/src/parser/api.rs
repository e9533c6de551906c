/// Parse a full expression fragment.
///
/// ## Errors
/// Returns the first lexing or parsing error; trailing tokens are an error.
pub fn parse_expression(source: &str) -> Result<Spanned<Expr>, SyntaxError> {
    let tokens = lexer::lex(source)?;
    let mut parser = Parser::new(&tokens);
    let expr = parser.expression()?;
    parser.expect_end()?;
    Ok(expr)
}

/// Parse one body statement. A trailing `;` is optional.
#[tracing::instrument(level = "trace", skip_all, fields(source_len = source.len()))]
pub fn parse_statement(source: &str) -> Result<Spanned<Stmt>, SyntaxError> {
    let tokens = lexer::lex(source)?;
    let mut parser = Parser::new(&tokens);
    let stmt = parser.statement()?;
    parser.expect_end()?;
    Ok(stmt)
}

/// Parse a type reference such as `Medicine.IUnmanagedData<Game.Stats>`.
pub fn parse_type(source: &str) -> Result<TypeSyntax, SyntaxError> {
    let tokens = lexer::lex(source)?;
    let mut parser = Parser::new(&tokens);
    let ty = parser.type_syntax()?;
    parser.expect_end()?;
    Ok(ty.node)
}
