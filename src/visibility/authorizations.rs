//! Authorizations — the token set a caller holds.

use std::fmt;
use std::sync::Arc;

use hashbrown::HashSet;

use super::{Visibility, VisibilityCache, VisibilityEvaluator};
use crate::Result;

/// Immutable set of authorization tokens.
///
/// Cloning is cheap; clones share the token set and the parse cache.
#[derive(Clone)]
pub struct Authorizations {
    tokens: Arc<HashSet<String>>,
    cache: Arc<VisibilityCache>,
}

impl Authorizations {
    /// Authorizations backed by the process-wide visibility cache.
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_cache(tokens, VisibilityCache::global().clone())
    }

    /// Authorizations that memoize parses in `cache`.
    pub fn with_cache<I, S>(tokens: I, cache: Arc<VisibilityCache>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: Arc::new(tokens.into_iter().map(Into::into).collect()),
            cache,
        }
    }

    /// No tokens: only public cells are readable.
    pub fn none() -> Self {
        Self::new(std::iter::empty::<String>())
    }

    /// Whether this caller may read a cell labelled `visibility`.
    ///
    /// The empty visibility is readable without touching the parser.
    /// A malformed expression is an error, never an implicit allow or deny.
    pub fn can_read(&self, visibility: &Visibility) -> Result<bool> {
        if visibility.is_empty() {
            return Ok(true);
        }
        let expr = visibility.expression_in(&self.cache)?;
        Ok(VisibilityEvaluator::new(&self.tokens).evaluate(&expr))
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }

    /// Held tokens, sorted.
    pub fn tokens(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.tokens.iter().map(String::as_str).collect();
        out.sort_unstable();
        out
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn cache(&self) -> &Arc<VisibilityCache> {
        &self.cache
    }
}

impl PartialEq for Authorizations {
    fn eq(&self, other: &Self) -> bool {
        self.tokens == other.tokens
    }
}

impl Eq for Authorizations {}

impl fmt::Debug for Authorizations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Authorizations").field(&self.tokens()).finish()
    }
}

impl fmt::Display for Authorizations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.tokens().join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_empty_visibility_always_readable() {
        assert!(Authorizations::none().can_read(&Visibility::empty()).unwrap());
        assert!(Authorizations::new(["a"]).can_read(&Visibility::new("")).unwrap());
    }

    #[test]
    fn test_empty_visibility_skips_parser() {
        let cache = Arc::new(VisibilityCache::new(8));
        let auths = Authorizations::with_cache(["a"], cache.clone());
        auths.can_read(&Visibility::empty()).unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_can_read_expression() {
        let auths = Authorizations::new(["a", "b"]);
        assert!(auths.can_read(&Visibility::new("a&(b|c)")).unwrap());
        assert!(!auths.can_read(&Visibility::new("c")).unwrap());
        assert!(!Authorizations::new(["a"]).can_read(&Visibility::new("a&(b|c)")).unwrap());
    }

    #[test]
    fn test_malformed_visibility_is_error() {
        let auths = Authorizations::new(["a", "b", "c"]);
        let err = auths.can_read(&Visibility::new("a&b|c")).unwrap_err();
        assert!(matches!(err, Error::VisibilityParse(_)));
    }

    #[test]
    fn test_display_sorted() {
        let auths = Authorizations::new(["b", "a"]);
        assert_eq!(auths.to_string(), "[a, b]");
    }

    #[test]
    fn test_concurrent_cache_population() {
        let cache = Arc::new(VisibilityCache::new(64));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let auths = Authorizations::with_cache(["x"], cache.clone());
                std::thread::spawn(move || {
                    (0..50).all(|_| auths.can_read(&Visibility::new("x|y")).unwrap())
                })
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap());
        }
        assert_eq!(cache.len(), 1);
    }
}
