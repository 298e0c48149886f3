//! # Graph Queries
//!
//! ```text
//! GraphQuery ──▶ SearchIndex::candidates ──▶ Some(ids) ──▶ fetch + decode
//!                                        └─▶ None      ──▶ scan + decode
//!            ──▶ re-check query string and has-containers
//!            ──▶ skip / limit
//! ```
//!
//! Decoding already hides what the caller cannot read; the re-check then
//! runs only on readable property instances.

pub mod index;
pub mod predicate;

pub use index::{NoSearchIndex, SearchIndex};
pub use predicate::{Compare, GeoCompare, HasContainer, Predicate, TextPredicate};

use smallvec::SmallVec;

use crate::model::*;
use crate::storage::StorageBackend;
use crate::visibility::Authorizations;
use crate::{Graph, Result};

/// Query string that matches everything.
pub const MATCH_ALL: &str = "*";

/// Everything a query carries, as seen by a [`SearchIndex`].
#[derive(Debug, Clone)]
pub struct QueryParameters {
    pub query_string: Option<String>,
    pub has: SmallVec<[HasContainer; 4]>,
    pub skip: usize,
    pub limit: Option<usize>,
    pub authorizations: Authorizations,
}

impl QueryParameters {
    pub fn new(authorizations: Authorizations) -> Self {
        Self {
            query_string: None,
            has: SmallVec::new(),
            skip: 0,
            limit: None,
            authorizations,
        }
    }

    /// Query string and every has-container hold.
    pub fn matches(&self, element: &Element) -> bool {
        self.matches_query_string(element) && self.has.iter().all(|h| h.is_match(element))
    }

    fn matches_query_string(&self, element: &Element) -> bool {
        let needle = match self.query_string.as_deref() {
            None | Some(MATCH_ALL) => return true,
            Some(q) => q.to_lowercase(),
        };
        element
            .properties()
            .filter_map(|p| p.value().as_str())
            .any(|s| s.to_lowercase().contains(&needle))
    }

    /// Re-check, then skip and limit.
    pub fn apply<E: GraphElement>(&self, candidates: Vec<E>) -> Vec<E> {
        let matched = candidates
            .into_iter()
            .filter(|e| self.matches(e.element()))
            .skip(self.skip);
        match self.limit {
            Some(limit) => matched.take(limit).collect(),
            None => matched.collect(),
        }
    }
}

/// Builder for one query against a [`Graph`].
pub struct GraphQuery<'g, B: StorageBackend> {
    graph: &'g Graph<B>,
    params: QueryParameters,
}

impl<'g, B: StorageBackend> GraphQuery<'g, B> {
    pub(crate) fn new(graph: &'g Graph<B>, authorizations: Authorizations) -> Self {
        Self {
            graph,
            params: QueryParameters::new(authorizations),
        }
    }

    pub fn has(mut self, name: impl Into<String>, predicate: impl Into<Predicate>, value: impl Into<Value>) -> Self {
        self.params.has.push(HasContainer::new(name, predicate, value));
        self
    }

    /// Shorthand for `has(name, Compare::Equal, value)`.
    pub fn has_value(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.has(name, Compare::Equal, value)
    }

    pub fn search(mut self, query_string: impl Into<String>) -> Self {
        self.params.query_string = Some(query_string.into());
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.params.skip = skip;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.params.limit = Some(limit);
        self
    }

    pub fn parameters(&self) -> &QueryParameters {
        &self.params
    }

    pub async fn vertices(&self) -> Result<Vec<Vertex>> {
        let auths = &self.params.authorizations;
        let found = match self.candidates(ElementType::Vertex).await? {
            Some(ids) => self.graph.get_vertices(&ids, auths).await?,
            None => self.graph.vertices(auths).await?,
        };
        Ok(self.finish(found))
    }

    pub async fn edges(&self) -> Result<Vec<Edge>> {
        let auths = &self.params.authorizations;
        let found = match self.candidates(ElementType::Edge).await? {
            Some(ids) => self.graph.get_edges(&ids, auths).await?,
            None => self.graph.edges(auths).await?,
        };
        Ok(self.finish(found))
    }

    async fn candidates(&self, element_type: ElementType) -> Result<Option<Vec<ElementId>>> {
        let candidates = self.graph.search_index().candidates(element_type, &self.params).await?;
        match &candidates {
            Some(ids) => tracing::debug!(kind = %element_type, candidates = ids.len(), "index candidates"),
            None => tracing::debug!(kind = %element_type, "no index candidates, scanning"),
        }
        Ok(candidates)
    }

    fn finish<E: GraphElement>(&self, found: Vec<E>) -> Vec<E> {
        let total = found.len();
        let out = self.params.apply(found);
        tracing::trace!(decoded = total, returned = out.len(), "query re-check");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visibility::Visibility;

    fn element(id: &str, name: &str) -> Vertex {
        let p = Property::new("", "name", name, Metadata::new(), Visibility::empty());
        Vertex::new(Element::new(id, Visibility::empty(), vec![p]), Default::default(), Default::default())
    }

    #[test]
    fn test_query_string_match_all() {
        let mut params = QueryParameters::new(Authorizations::none());
        assert!(params.matches(&element("v1", "Ada")));
        params.query_string = Some(MATCH_ALL.into());
        assert!(params.matches(&element("v1", "Ada")));
        params.query_string = Some("ADA".into());
        assert!(params.matches(&element("v1", "Ada Lovelace")));
        assert!(!params.matches(&element("v1", "Grace")));
    }

    #[test]
    fn test_skip_and_limit_after_filter() {
        let mut params = QueryParameters::new(Authorizations::none());
        params.has.push(HasContainer::new("name", TextPredicate::Contains, "a"));
        params.skip = 1;
        params.limit = Some(1);
        let out = params.apply(vec![
            element("v1", "Ada"),
            element("v2", "Bob"),
            element("v3", "Grace"),
            element("v4", "Alan"),
        ]);
        let ids: Vec<&str> = out.iter().map(|v| v.id().as_str()).collect();
        assert_eq!(ids, vec!["v3"]);
    }
}
