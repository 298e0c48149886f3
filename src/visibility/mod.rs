//! # Visibility Expressions
//!
//! Boolean labels over opaque authorization tokens. Every vertex, edge and
//! individual property value carries one; a caller sees the cell only when
//! its [`Authorizations`] satisfy the expression.
//!
//! Pure functions plus one shared memo table ([`VisibilityCache`]).
//! No I/O, no storage dependency.

pub mod ast;
pub mod authorizations;
pub mod lexer;
pub mod parser;

use std::fmt;
use std::sync::{Arc, LazyLock, OnceLock};

use hashbrown::HashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub use ast::{VisibilityEvaluator, VisibilityExpression};
pub use authorizations::Authorizations;

/// Parse a visibility expression.
pub fn parse(text: &str) -> Result<VisibilityExpression, VisibilityParseError> {
    let tokens = lexer::tokenize(text)?;
    parser::parse_expression(text, &tokens)
}

// ============================================================================
// Parse error
// ============================================================================

/// A malformed visibility expression.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid visibility {expression:?} at position {position}: {message}")]
pub struct VisibilityParseError {
    pub expression: String,
    pub position: usize,
    pub message: String,
}

impl VisibilityParseError {
    pub fn new(expression: &str, position: usize, message: impl Into<String>) -> Self {
        Self {
            expression: expression.to_string(),
            position,
            message: message.into(),
        }
    }
}

// ============================================================================
// Visibility
// ============================================================================

/// Canonical visibility string with a lazily parsed expression.
///
/// Equality and hashing use the string only: `a&b` and `b&a` are different
/// visibilities even though they admit the same callers.
#[derive(Clone, Default)]
pub struct Visibility {
    text: Arc<str>,
    parsed: OnceLock<Arc<VisibilityExpression>>,
}

impl Visibility {
    pub fn new(text: impl AsRef<str>) -> Self {
        Self {
            text: Arc::from(text.as_ref()),
            parsed: OnceLock::new(),
        }
    }

    /// The public visibility.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from a storage column visibility, unwrapping `[...]` if present.
    pub fn from_column(column_visibility: &str) -> Self {
        let inner = column_visibility
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .unwrap_or(column_visibility);
        Self::new(inner)
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Parsed expression, memoized on this instance and in the process-wide cache.
    pub fn expression(&self) -> Result<Arc<VisibilityExpression>, VisibilityParseError> {
        self.expression_in(VisibilityCache::global())
    }

    /// Parsed expression, memoized on this instance and in `cache`.
    pub fn expression_in(&self, cache: &VisibilityCache) -> Result<Arc<VisibilityExpression>, VisibilityParseError> {
        if let Some(expr) = self.parsed.get() {
            return Ok(expr.clone());
        }
        let expr = cache.get_or_parse(&self.text)?;
        let _ = self.parsed.set(expr.clone());
        Ok(expr)
    }

    /// Fails if the text is not a well-formed expression.
    pub fn validate(&self) -> Result<(), VisibilityParseError> {
        if self.is_empty() {
            return Ok(());
        }
        self.expression().map(|_| ())
    }
}

impl PartialEq for Visibility {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for Visibility {}

impl std::hash::Hash for Visibility {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

impl PartialOrd for Visibility {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Visibility {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.text.cmp(&other.text)
    }
}

impl fmt::Debug for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Visibility({:?})", &*self.text)
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl From<&str> for Visibility {
    fn from(v: &str) -> Self { Visibility::new(v) }
}

impl From<String> for Visibility {
    fn from(v: String) -> Self { Visibility::new(v) }
}

impl Serialize for Visibility {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

impl<'de> Deserialize<'de> for Visibility {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(Visibility::new(text))
    }
}

// ============================================================================
// VisibilityCache
// ============================================================================

/// Default number of distinct expressions kept by a cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

static GLOBAL_CACHE: LazyLock<Arc<VisibilityCache>> =
    LazyLock::new(|| Arc::new(VisibilityCache::new(DEFAULT_CACHE_CAPACITY)));

/// Memo table from canonical visibility string to parsed expression.
///
/// Racing writers store identical values, so readers never observe a
/// different answer no matter who wins. Parse failures are not cached.
pub struct VisibilityCache {
    capacity: usize,
    entries: RwLock<HashMap<Arc<str>, Arc<VisibilityExpression>>>,
}

impl VisibilityCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// The process-wide cache used when no graph-specific cache is given.
    pub fn global() -> &'static Arc<VisibilityCache> {
        &GLOBAL_CACHE
    }

    pub fn get_or_parse(&self, text: &str) -> Result<Arc<VisibilityExpression>, VisibilityParseError> {
        if let Some(expr) = self.entries.read().get(text) {
            return Ok(expr.clone());
        }

        let expr = Arc::new(parse(text)?);

        let mut entries = self.entries.write();
        if entries.len() >= self.capacity && !entries.contains_key(text) {
            tracing::debug!(capacity = self.capacity, "visibility cache full, clearing");
            entries.clear();
        }
        let stored = entries.entry(Arc::from(text)).or_insert_with(|| expr.clone());
        Ok(stored.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl fmt::Debug for VisibilityCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisibilityCache")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}
