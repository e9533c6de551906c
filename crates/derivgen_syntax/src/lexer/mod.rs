//! Lexer for body expressions and type references.
//!
//! Handles identifiers (including `@`-escaped ones), integer and float literals, double-quoted strings
//! with the usual escapes, and the punctuation the expression grammar needs. `>>` is never produced so
//! nested generic argument lists close cleanly.

pub mod tokens;

pub use tokens::{Keyword, Punct, Token, TokenKind};

use crate::ast::Span;
use crate::diagnostics::SyntaxError;

/// Lexer over a single body fragment.
pub struct Lexer<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            tokens: Vec::new(),
        }
    }

    /// Tokenize the whole fragment. The stream always ends with `Eof`.
    pub fn tokenize(mut self) -> Result<Vec<Token>, SyntaxError> {
        while let Some(&(start, c)) = self.chars.peek() {
            if c.is_whitespace() {
                self.chars.next();
                continue;
            }
            if c == '/' && self.source[start..].starts_with("//") {
                self.skip_line_comment();
                continue;
            }
            self.scan_token(start, c)?;
        }
        let end = self.source.len();
        self.tokens.push(Token::new(TokenKind::Eof, Span::new(end, end)));
        Ok(self.tokens)
    }

    fn skip_line_comment(&mut self) {
        while let Some((_, c)) = self.chars.next() {
            if c == '\n' {
                break;
            }
        }
    }

    fn position(&mut self) -> usize {
        self.chars.peek().map(|(i, _)| *i).unwrap_or(self.source.len())
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        let end = self.position();
        self.tokens.push(Token::new(kind, Span::new(start, end)));
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.chars.peek().map(|(_, c)| *c) == Some(expected) {
            self.chars.next();
            true
        } else {
            false
        }
    }

    fn scan_token(&mut self, start: usize, c: char) -> Result<(), SyntaxError> {
        if c.is_alphabetic() || c == '_' || c == '@' {
            return self.scan_identifier(start);
        }
        if c.is_ascii_digit() {
            return self.scan_number(start);
        }
        if c == '"' {
            return self.scan_string(start);
        }

        self.chars.next();
        let punct = match c {
            '.' => Punct::Dot,
            ',' => Punct::Comma,
            '(' => Punct::LParen,
            ')' => Punct::RParen,
            '[' => Punct::LBracket,
            ']' => Punct::RBracket,
            ';' => Punct::Semicolon,
            '+' => Punct::Plus,
            '-' => Punct::Minus,
            '*' => Punct::Star,
            '/' => Punct::Slash,
            '<' if self.eat('=') => Punct::LtEq,
            '<' => Punct::Lt,
            '>' if self.eat('=') => Punct::GtEq,
            '>' => Punct::Gt,
            '=' if self.eat('=') => Punct::EqEq,
            '=' if self.eat('>') => Punct::Arrow,
            '=' => Punct::Assign,
            '!' if self.eat('=') => Punct::NotEq,
            '!' => Punct::Bang,
            '?' if self.eat('?') => Punct::QuestionQuestion,
            '?' => Punct::Question,
            '&' if self.eat('&') => Punct::AndAnd,
            '|' if self.eat('|') => Punct::OrOr,
            ':' if self.eat(':') => Punct::ColonColon,
            other => {
                return Err(SyntaxError::new(
                    format!("unexpected character '{other}'"),
                    Span::new(start, start + other.len_utf8()),
                ));
            }
        };
        self.push(TokenKind::Punct(punct), start);
        Ok(())
    }

    fn scan_identifier(&mut self, start: usize) -> Result<(), SyntaxError> {
        let verbatim = self.eat('@');
        let name_start = self.position();
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.chars.next();
            } else {
                break;
            }
        }
        let end = self.position();
        let text = &self.source[name_start..end];
        if text.is_empty() {
            return Err(SyntaxError::new("expected identifier after '@'", Span::new(start, end)));
        }
        let kind = match Keyword::lookup(text) {
            Some(k) if !verbatim => TokenKind::Keyword(k),
            _ => TokenKind::Ident(text.to_string()),
        };
        self.push(kind, start);
        Ok(())
    }

    fn scan_number(&mut self, start: usize) -> Result<(), SyntaxError> {
        let mut is_float = false;
        while let Some(&(i, c)) = self.chars.peek() {
            if c.is_ascii_digit() || c == '_' {
                self.chars.next();
            } else if c == '.' && !is_float && self.source[i + 1..].starts_with(|d: char| d.is_ascii_digit()) {
                is_float = true;
                self.chars.next();
            } else {
                break;
            }
        }
        // Suffixes: 1f, 2.5d, 10L, 3u
        let digits_end = self.position();
        let mut suffix_float = false;
        if let Some(&(_, c)) = self.chars.peek() {
            match c {
                'f' | 'F' | 'd' | 'D' | 'm' | 'M' => {
                    suffix_float = true;
                    self.chars.next();
                }
                'l' | 'L' | 'u' | 'U' => {
                    self.chars.next();
                }
                _ => {}
            }
        }
        let text = self.source[start..digits_end].replace('_', "");
        if is_float || suffix_float {
            let written = self.source[start..self.position()].to_string();
            self.push(TokenKind::Float(written), start);
            return Ok(());
        }
        let value = text
            .parse::<i64>()
            .map_err(|_| SyntaxError::new(format!("integer literal '{text}' is out of range"), Span::new(start, digits_end)))?;
        self.push(TokenKind::Int(value), start);
        Ok(())
    }

    fn scan_string(&mut self, start: usize) -> Result<(), SyntaxError> {
        self.chars.next();
        let mut value = String::new();
        loop {
            let Some((i, c)) = self.chars.next() else {
                return Err(SyntaxError::new(
                    "unterminated string literal",
                    Span::new(start, self.source.len()),
                ));
            };
            match c {
                '"' => break,
                '\\' => {
                    let Some((_, esc)) = self.chars.next() else {
                        return Err(SyntaxError::new("unterminated escape sequence", Span::new(i, i + 1)));
                    };
                    value.push(match esc {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '0' => '\0',
                        other => other,
                    });
                }
                other => value.push(other),
            }
        }
        self.push(TokenKind::String(value), start);
        Ok(())
    }
}

/// Tokenize a fragment.
#[tracing::instrument(level = "trace", skip_all, fields(source_len = source.len()))]
pub fn lex(source: &str) -> Result<Vec<Token>, SyntaxError> {
    Lexer::new(source).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_generic_close_is_two_tokens() {
        let k = kinds("A<B<C>>");
        assert_eq!(
            k,
            vec![
                TokenKind::Ident("A".into()),
                TokenKind::Punct(Punct::Lt),
                TokenKind::Ident("B".into()),
                TokenKind::Punct(Punct::Lt),
                TokenKind::Ident("C".into()),
                TokenKind::Punct(Punct::Gt),
                TokenKind::Punct(Punct::Gt),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_arrow_and_coalesce() {
        let k = kinds("x => a ?? b");
        assert!(k.contains(&TokenKind::Punct(Punct::Arrow)));
        assert!(k.contains(&TokenKind::Punct(Punct::QuestionQuestion)));
    }

    #[test]
    fn test_numbers_and_suffixes() {
        assert_eq!(kinds("42")[0], TokenKind::Int(42));
        assert_eq!(kinds("1.5f")[0], TokenKind::Float("1.5f".into()));
        assert_eq!(kinds("2f")[0], TokenKind::Float("2f".into()));
        assert_eq!(kinds("10L")[0], TokenKind::Int(10));
    }

    #[test]
    fn test_member_access_on_int_is_not_float() {
        let k = kinds("1.ToString()");
        assert_eq!(k[0], TokenKind::Int(1));
        assert_eq!(k[1], TokenKind::Punct(Punct::Dot));
    }

    #[test]
    fn test_verbatim_identifier_is_not_keyword() {
        assert_eq!(kinds("@this")[0], TokenKind::Ident("this".into()));
        assert_eq!(kinds("this")[0], TokenKind::Keyword(Keyword::This));
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(kinds(r#""a\"b\n""#)[0], TokenKind::String("a\"b\n".into()));
    }

    #[test]
    fn test_unexpected_character_is_reported_with_span() {
        let err = lex("a # b").unwrap_err();
        assert_eq!(err.span, Span::new(2, 3));
    }

    #[test]
    fn test_line_comment_is_skipped() {
        assert_eq!(kinds("a // trailing"), vec![TokenKind::Ident("a".into()), TokenKind::Eof]);
    }
}
