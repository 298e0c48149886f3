//! Visibility AST and its evaluator.
//!
//! Expressions are only ever built by [`super::parse`]; the node type is
//! crate-private so callers cannot assemble an unparsed tree.

use std::fmt;

use hashbrown::HashSet;

/// A parsed boolean expression over authorization tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityExpression {
    root: Node,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Node {
    /// Empty expression: readable by everyone.
    Always,
    Term(String),
    And(Vec<Node>),
    Or(Vec<Node>),
}

impl VisibilityExpression {
    pub(crate) fn from_root(root: Node) -> Self {
        Self { root }
    }

    /// True for the empty (public) expression.
    pub fn is_always(&self) -> bool {
        matches!(self.root, Node::Always)
    }

    /// All distinct tokens referenced by the expression, in first-seen order.
    pub fn terms(&self) -> Vec<&str> {
        fn walk<'a>(node: &'a Node, out: &mut Vec<&'a str>) {
            match node {
                Node::Always => {}
                Node::Term(t) => {
                    if !out.contains(&t.as_str()) {
                        out.push(t);
                    }
                }
                Node::And(children) | Node::Or(children) => {
                    for c in children {
                        walk(c, out);
                    }
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.root, &mut out);
        out
    }

    /// Evaluate against a held token set.
    pub fn evaluate(&self, held: &HashSet<String>) -> bool {
        VisibilityEvaluator::new(held).evaluate(self)
    }
}

/// Evaluates expressions against one caller's token set.
///
/// Tokens are compared byte-for-byte: no case folding, no trimming.
#[derive(Debug, Clone, Copy)]
pub struct VisibilityEvaluator<'a> {
    held: &'a HashSet<String>,
}

impl<'a> VisibilityEvaluator<'a> {
    pub fn new(held: &'a HashSet<String>) -> Self {
        Self { held }
    }

    pub fn evaluate(&self, expr: &VisibilityExpression) -> bool {
        self.eval_node(&expr.root)
    }

    fn eval_node(&self, node: &Node) -> bool {
        match node {
            Node::Always => true,
            Node::Term(t) => self.held.contains(t.as_str()),
            Node::And(children) => children.iter().all(|c| self.eval_node(c)),
            Node::Or(children) => children.iter().any(|c| self.eval_node(c)),
        }
    }
}

// ============================================================================
// Display (re-serializes with minimal quoting)
// ============================================================================

fn needs_quotes(term: &str) -> bool {
    term.chars().any(|c| matches!(c, '&' | '|' | '(' | ')' | '"' | '\\') || c.is_whitespace())
}

fn fmt_node(node: &Node, f: &mut fmt::Formatter<'_>, nested: bool) -> fmt::Result {
    match node {
        Node::Always => Ok(()),
        Node::Term(t) if needs_quotes(t) => {
            write!(f, "\"{}\"", t.replace('\\', "\\\\").replace('"', "\\\""))
        }
        Node::Term(t) => write!(f, "{t}"),
        Node::And(children) | Node::Or(children) => {
            let op = if matches!(node, Node::And(_)) { "&" } else { "|" };
            if nested { write!(f, "(")?; }
            for (i, c) in children.iter().enumerate() {
                if i > 0 { write!(f, "{op}")?; }
                fmt_node(c, f, true)?;
            }
            if nested { write!(f, ")")?; }
            Ok(())
        }
    }
}

impl fmt::Display for VisibilityExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_node(&self.root, f, false)
    }
}
