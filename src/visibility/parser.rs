//! Visibility recursive descent parser.
//!
//! Grammar:
//!
//! ```text
//! expr := term ( '&' term )*
//!       | term ( '|' term )*
//! term := TERM | '(' expr ')'
//! ```
//!
//! `&` and `|` may not share one parenthesis level: `a&b|c` is rejected,
//! `(a&b)|c` is accepted. An empty input is the always-true expression.

use super::ast::{Node, VisibilityExpression};
use super::lexer::{Token, TokenKind};
use super::VisibilityParseError;

/// Parser state — wraps a token slice with cursor.
struct Parser<'t> {
    input: &'t str,
    tokens: &'t [Token],
    pos: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    And,
    Or,
}

impl<'t> Parser<'t> {
    fn new(input: &'t str, tokens: &'t [Token]) -> Self {
        Self { input, tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn advance(&mut self) -> &Token {
        let tok = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn error(&self, msg: impl Into<String>) -> VisibilityParseError {
        VisibilityParseError::new(self.input, self.peek().span.start, msg)
    }
}

/// Parse a token stream into an expression.
pub fn parse_expression(input: &str, tokens: &[Token]) -> Result<VisibilityExpression, VisibilityParseError> {
    let mut p = Parser::new(input, tokens);

    if p.at(TokenKind::Eof) {
        return Ok(VisibilityExpression::from_root(Node::Always));
    }

    let root = parse_expr(&mut p)?;
    if !p.at(TokenKind::Eof) {
        return Err(p.error(format!("unexpected {:?} after expression", p.peek_kind())));
    }

    Ok(VisibilityExpression::from_root(root))
}

fn parse_expr(p: &mut Parser) -> Result<Node, VisibilityParseError> {
    let first = parse_term(p)?;
    let mut op: Option<Op> = None;
    let mut children = vec![first];

    loop {
        let next = match p.peek_kind() {
            TokenKind::And => Op::And,
            TokenKind::Or => Op::Or,
            TokenKind::RParen | TokenKind::Eof => break,
            TokenKind::Term | TokenKind::LParen => {
                return Err(p.error("expected '&' or '|' between terms"));
            }
        };
        match op {
            Some(current) if current != next => {
                return Err(p.error("cannot mix '&' and '|' without parentheses"));
            }
            _ => op = Some(next),
        }
        p.advance();
        children.push(parse_term(p)?);
    }

    Ok(match op {
        None => children.pop().unwrap_or(Node::Always),
        Some(op) => combine(op, children),
    })
}

/// Build an AND/OR node, flattening children that use the same operator.
fn combine(op: Op, children: Vec<Node>) -> Node {
    let mut flat = Vec::with_capacity(children.len());
    for child in children {
        match (op, child) {
            (Op::And, Node::And(inner)) | (Op::Or, Node::Or(inner)) => flat.extend(inner),
            (_, other) => flat.push(other),
        }
    }
    match op {
        Op::And => Node::And(flat),
        Op::Or => Node::Or(flat),
    }
}

fn parse_term(p: &mut Parser) -> Result<Node, VisibilityParseError> {
    match p.peek_kind() {
        TokenKind::Term => {
            let text = p.advance().text.clone();
            Ok(Node::Term(text))
        }
        TokenKind::LParen => {
            p.advance();
            if p.at(TokenKind::RParen) {
                return Err(p.error("empty parentheses"));
            }
            let inner = parse_expr(p)?;
            if !p.at(TokenKind::RParen) {
                return Err(p.error("expected ')'"));
            }
            p.advance();
            Ok(inner)
        }
        TokenKind::Eof => Err(p.error("unexpected end of expression")),
        kind => Err(p.error(format!("expected term, got {kind:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::super::parse;
    use hashbrown::HashSet;

    fn held(tokens: &[&str]) -> HashSet<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_empty_is_always() {
        assert!(parse("").unwrap().is_always());
        assert!(parse("   ").unwrap().is_always());
    }

    #[test]
    fn test_single_term() {
        let expr = parse("admin").unwrap();
        assert!(expr.evaluate(&held(&["admin"])));
        assert!(!expr.evaluate(&held(&["user"])));
    }

    #[test]
    fn test_grouped_and_or() {
        let expr = parse("a&(b|c)").unwrap();
        assert!(expr.evaluate(&held(&["a", "b"])));
        assert!(!expr.evaluate(&held(&["a"])));
        assert!(!expr.evaluate(&held(&["b", "c"])));
    }

    #[test]
    fn test_mixed_operators_rejected() {
        let err = parse("a&b|c").unwrap_err();
        assert_eq!(err.position, 3);
        assert!(err.message.contains("mix"));
        assert!(parse("a|b&c").is_err());
    }

    #[test]
    fn test_mixed_operators_with_grouping() {
        assert!(parse("(a&b)|c").is_ok());
        assert!(parse("a&(b|c)").is_ok());
        assert!(parse("((a|b)&(c|d))|e").is_ok());
    }

    #[test]
    fn test_same_operator_chain_flattens() {
        let expr = parse("a&(b&c)&d").unwrap();
        assert_eq!(expr.to_string(), "a&b&c&d");
    }

    #[test]
    fn test_left_associative_chain() {
        let expr = parse("a|b|c").unwrap();
        assert!(expr.evaluate(&held(&["c"])));
        assert!(!expr.evaluate(&held(&["d"])));
    }

    #[test]
    fn test_malformed_inputs() {
        for bad in ["&", "a&", "|a", "(a", "a)", "()", "a b", "(a)(b)", "a&&b", "a&()"] {
            assert!(parse(bad).is_err(), "expected parse error for {bad:?}");
        }
    }

    #[test]
    fn test_quoted_term_with_operators() {
        let expr = parse(r#""a&b"|c"#).unwrap();
        assert!(expr.evaluate(&held(&["a&b"])));
        assert!(!expr.evaluate(&held(&["a", "b"])));
    }

    #[test]
    fn test_redundant_parentheses() {
        let expr = parse("((a))").unwrap();
        assert!(expr.evaluate(&held(&["a"])));
    }
}
