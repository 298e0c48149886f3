//! Search index oracle.
//!
//! An index only proposes candidate ids. Every candidate is still fetched,
//! decoded under the caller's authorizations and re-checked against the
//! query, so an index that returns too much never leaks anything.

use async_trait::async_trait;

use super::QueryParameters;
use crate::model::{ElementId, ElementType};
use crate::Result;

#[async_trait]
pub trait SearchIndex: Send + Sync + 'static {
    /// Candidate ids for `query`, or `None` to fall back to a full scan.
    async fn candidates(&self, element_type: ElementType, query: &QueryParameters) -> Result<Option<Vec<ElementId>>>;
}

/// No index: every query scans.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSearchIndex;

#[async_trait]
impl SearchIndex for NoSearchIndex {
    async fn candidates(&self, _element_type: ElementType, _query: &QueryParameters) -> Result<Option<Vec<ElementId>>> {
        Ok(None)
    }
}
