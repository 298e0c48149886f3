//! Visibility expression lexer — splits an expression into terms and operators.

use super::VisibilityParseError;

/// A token from the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// Unescaped term text. Empty for punctuation.
    pub text: String,
}

/// Source span (byte offsets).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// Token kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Bare or quoted authorization token.
    Term,
    And,
    Or,
    LParen,
    RParen,
    Eof,
}

fn is_bare_term_char(c: char) -> bool {
    !matches!(c, '&' | '|' | '(' | ')' | '"') && !c.is_whitespace()
}

/// Tokenize a visibility expression.
pub fn tokenize(input: &str) -> Result<Vec<Token>, VisibilityParseError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(pos, ch)) = chars.peek() {
        match ch {
            c if c.is_whitespace() => { chars.next(); }

            '&' => { chars.next(); tokens.push(punct(TokenKind::And, pos)); }
            '|' => { chars.next(); tokens.push(punct(TokenKind::Or, pos)); }
            '(' => { chars.next(); tokens.push(punct(TokenKind::LParen, pos)); }
            ')' => { chars.next(); tokens.push(punct(TokenKind::RParen, pos)); }

            // Quoted term: only \" and \\ are valid escapes
            '"' => {
                chars.next();
                let start = pos;
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some((esc_pos, '\\')) => match chars.next() {
                            Some((_, '"')) => s.push('"'),
                            Some((_, '\\')) => s.push('\\'),
                            Some((_, other)) => {
                                return Err(VisibilityParseError::new(
                                    input,
                                    esc_pos,
                                    format!("invalid escape sequence '\\{other}'"),
                                ));
                            }
                            None => {
                                return Err(VisibilityParseError::new(
                                    input,
                                    esc_pos,
                                    "dangling escape at end of input",
                                ));
                            }
                        },
                        Some((end, '"')) => {
                            if s.is_empty() {
                                return Err(VisibilityParseError::new(input, start, "empty quoted term"));
                            }
                            tokens.push(Token {
                                kind: TokenKind::Term,
                                span: Span { start, end: end + 1 },
                                text: s,
                            });
                            break;
                        }
                        Some((_, c)) => s.push(c),
                        None => {
                            return Err(VisibilityParseError::new(input, start, "unterminated quoted term"));
                        }
                    }
                }
            }

            // Bare term
            _ => {
                let start = pos;
                let mut end = pos;
                let mut s = String::new();
                while let Some(&(p, c)) = chars.peek() {
                    if !is_bare_term_char(c) {
                        break;
                    }
                    s.push(c);
                    end = p + c.len_utf8();
                    chars.next();
                }
                tokens.push(Token {
                    kind: TokenKind::Term,
                    span: Span { start, end },
                    text: s,
                });
            }
        }
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        span: Span { start: input.len(), end: input.len() },
        text: String::new(),
    });

    Ok(tokens)
}

fn punct(kind: TokenKind, pos: usize) -> Token {
    Token {
        kind,
        span: Span { start: pos, end: pos + 1 },
        text: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input).unwrap().iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_simple_and() {
        assert_eq!(kinds("a&b"), vec![
            TokenKind::Term,
            TokenKind::And,
            TokenKind::Term,
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn test_grouping_and_whitespace() {
        assert_eq!(kinds(" ( a | b ) & c "), vec![
            TokenKind::LParen,
            TokenKind::Term,
            TokenKind::Or,
            TokenKind::Term,
            TokenKind::RParen,
            TokenKind::And,
            TokenKind::Term,
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn test_bare_term_allows_punctuation() {
        let tokens = tokenize("admin:read/x.y-z").unwrap();
        assert_eq!(tokens[0].text, "admin:read/x.y-z");
        assert_eq!(tokens[0].span, Span { start: 0, end: 16 });
    }

    #[test]
    fn test_quoted_term_escapes() {
        let tokens = tokenize(r#""a \"b\" \\ c&d""#).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Term);
        assert_eq!(tokens[0].text, r#"a "b" \ c&d"#);
    }

    #[test]
    fn test_invalid_escape() {
        let err = tokenize(r#""a\nb""#).unwrap_err();
        assert_eq!(err.position, 2);
    }

    #[test]
    fn test_unterminated_quote() {
        assert!(tokenize(r#""abc"#).is_err());
    }

    #[test]
    fn test_empty_quote() {
        assert!(tokenize(r#""""#).is_err());
    }

    #[test]
    fn test_multibyte_term_span() {
        let tokens = tokenize("größe").unwrap();
        assert_eq!(tokens[0].text, "größe");
        assert_eq!(tokens[0].span.end, "größe".len());
    }
}
