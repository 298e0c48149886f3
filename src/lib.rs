//! # cellgraph — Property Graph with Cell-Level Visibility
//!
//! Every vertex, every edge and every individual property value carries its
//! own visibility expression over opaque authorization tokens. A caller only
//! ever sees the cells its [`Authorizations`] can read.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `StorageBackend` is the contract between the graph and a column store
//! 2. **Clean DTOs**: `Vertex`, `Edge`, `Property`, `Value` cross all boundaries
//! 3. **Parser owns nothing**: visibility text → AST is a pure function
//! 4. **Decode is the trust boundary**: unreadable cells never leave the decoder
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cellgraph::{ElementMutation, Graph, Value, Visibility};
//!
//! # async fn example() -> cellgraph::Result<()> {
//! let graph = Graph::open_memory().await?;
//!
//! let ada = graph
//!     .prepare_vertex(None, Visibility::empty())
//!     .set_property("name", "Ada", Visibility::empty())
//!     .set_property("salary", 100, Visibility::new("hr"))
//!     .save(&graph)
//!     .await?;
//!
//! let public = graph.create_authorizations(Vec::<String>::new());
//! let seen = graph.get_vertex(ada.id(), &public).await?.unwrap();
//! assert_eq!(seen.property_value("name"), Some(&Value::from("Ada")));
//! assert!(seen.property_value("salary").is_none());
//! # Ok(())
//! # }
//! ```
//!
//! ## Storage Backends
//!
//! | Backend | Description |
//! |---------|-------------|
//! | Memory | In-memory sorted column table for testing/embedding |

// ============================================================================
// Modules
// ============================================================================

pub mod config;
pub mod id;
pub mod model;
pub mod mutation;
pub mod query;
pub mod storage;
pub mod visibility;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::GraphConfig;
pub use id::{IdGenerator, SequentialIdGenerator};
pub use model::{
    Direction, Edge, EdgeInfo, Element, ElementId, ElementType, GeoCircle, GeoPoint, GraphElement,
    LargeValueRef, LargeValueStore, Metadata, Path, Property, PropertyIdentity, Value, Vertex,
};
pub use mutation::{
    EdgeBuilder, ElementMutation, ExistingElementMutation, MutationPlan, VertexBuilder, DEFAULT_KEY,
};
pub use query::{Compare, GeoCompare, GraphQuery, HasContainer, Predicate, SearchIndex, TextPredicate};
pub use storage::{MemoryBackend, StorageBackend, StoredElement, ValueCodec};
pub use visibility::{Authorizations, Visibility, VisibilityCache, VisibilityParseError};

use query::NoSearchIndex;
use storage::columns::row_key;
use storage::{EdgeKind, ElementEncoder, ElementKind, JsonValueCodec, RowDecoder, VertexKind};

// ============================================================================
// Top-level Graph handle
// ============================================================================

/// The primary entry point. A `Graph` wraps a storage backend and owns the
/// codec, the visibility parse cache, id generation and the search index.
pub struct Graph<B: StorageBackend> {
    backend: B,
    config: GraphConfig,
    codec: Arc<dyn ValueCodec>,
    encoder: ElementEncoder,
    visibility_cache: Arc<VisibilityCache>,
    ids: Arc<dyn IdGenerator>,
    search_index: Arc<dyn SearchIndex>,
}

impl<B: StorageBackend> Graph<B> {
    /// Create a Graph with the given backend and default configuration.
    pub fn with_backend(backend: B) -> Self {
        Self::build(backend, GraphConfig::default())
    }

    pub fn with_config(backend: B, config: GraphConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(backend, config))
    }

    fn build(backend: B, config: GraphConfig) -> Self {
        let codec: Arc<dyn ValueCodec> = Arc::new(JsonValueCodec);
        let encoder = ElementEncoder::new(codec.clone())
            .with_large_values(backend.large_values(), config.large_value_threshold);
        Self {
            visibility_cache: Arc::new(VisibilityCache::new(config.visibility_cache_capacity)),
            ids: Arc::new(SequentialIdGenerator::new(config.id_prefix.clone())),
            search_index: Arc::new(NoSearchIndex),
            backend,
            config,
            codec,
            encoder,
        }
    }

    pub fn with_codec(mut self, codec: Arc<dyn ValueCodec>) -> Self {
        self.encoder = ElementEncoder::new(codec.clone())
            .with_large_values(self.backend.large_values(), self.config.large_value_threshold);
        self.codec = codec;
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_search_index(mut self, index: Arc<dyn SearchIndex>) -> Self {
        self.search_index = index;
        self
    }

    /// Access the underlying backend (for advanced use).
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn visibility_cache(&self) -> &Arc<VisibilityCache> {
        &self.visibility_cache
    }

    pub fn search_index(&self) -> &Arc<dyn SearchIndex> {
        &self.search_index
    }

    /// Authorizations that share this graph's parse cache.
    pub fn create_authorizations<I, S>(&self, tokens: I) -> Authorizations
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Authorizations::with_cache(tokens, self.visibility_cache.clone())
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Builder for a new vertex. `None` generates an id.
    pub fn prepare_vertex(&self, id: Option<ElementId>, visibility: Visibility) -> VertexBuilder {
        VertexBuilder::new(id.unwrap_or_else(|| self.ids.next_id()), visibility)
    }

    /// Create a vertex with no properties.
    pub async fn add_vertex(&self, id: Option<ElementId>, visibility: Visibility) -> Result<Vertex> {
        self.prepare_vertex(id, visibility).save(self).await
    }

    /// Builder for a new edge between two existing vertices.
    pub fn prepare_edge(
        &self,
        id: Option<ElementId>,
        out_vertex: &Vertex,
        in_vertex: &Vertex,
        label: impl Into<String>,
        visibility: Visibility,
    ) -> EdgeBuilder {
        EdgeBuilder::new(
            id.unwrap_or_else(|| self.ids.next_id()),
            out_vertex.id().clone(),
            in_vertex.id().clone(),
            label,
            visibility,
        )
    }

    pub async fn add_edge(
        &self,
        id: Option<ElementId>,
        out_vertex: &Vertex,
        in_vertex: &Vertex,
        label: impl Into<String>,
        visibility: Visibility,
    ) -> Result<Edge> {
        self.prepare_edge(id, out_vertex, in_vertex, label, visibility)
            .save(self)
            .await
    }

    /// Apply a planned mutation. Returns the element as planned.
    pub async fn save_mutation<E: StoredElement>(&self, plan: MutationPlan<E>) -> Result<E> {
        if plan.is_empty() {
            return Ok(plan.element);
        }
        let ops = self.encoder.mutation(&plan)?;
        tracing::debug!(
            id = %plan.element.element().id(),
            writes = plan.writes.len(),
            retractions = plan.retractions.len(),
            "saving mutation"
        );
        self.write(ops).await?;
        Ok(plan.element)
    }

    /// Tombstone an edge and drop its adjacency cells on both endpoints.
    pub async fn remove_edge(&self, edge: &Edge) -> Result<()> {
        let ops = self.encoder.remove_element(edge)?;
        tracing::debug!(id = %edge.id(), "removing edge");
        self.write(ops).await
    }

    /// Remove a vertex and every incident edge `authorizations` can see.
    pub async fn remove_vertex(&self, vertex: &Vertex, authorizations: &Authorizations) -> Result<()> {
        let edge_ids = vertex.edge_ids(Direction::Both, None);
        for edge in self.get_edges(&edge_ids, authorizations).await? {
            self.remove_edge(&edge).await?;
        }
        let ops = self.encoder.remove_element(vertex)?;
        tracing::debug!(id = %vertex.id(), edges = edge_ids.len(), "removing vertex");
        self.write(ops).await
    }

    pub(crate) async fn write_new<E: StoredElement>(&self, element: &E) -> Result<()> {
        let ops = self.encoder.new_element(element)?;
        tracing::debug!(id = %element.element().id(), kind = %E::TYPE, cells = ops.len(), "writing new element");
        self.write(ops).await
    }

    async fn write(&self, ops: Vec<storage::ColumnOp>) -> Result<()> {
        self.backend.write(ops).await?;
        if self.config.auto_flush {
            self.backend.flush().await?;
        }
        Ok(())
    }

    pub async fn flush(&self) -> Result<()> {
        self.backend.flush().await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.backend.shutdown().await
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub async fn get_vertex(&self, id: &ElementId, authorizations: &Authorizations) -> Result<Option<Vertex>> {
        self.fetch(VertexKind, id, authorizations).await
    }

    pub async fn get_edge(&self, id: &ElementId, authorizations: &Authorizations) -> Result<Option<Edge>> {
        self.fetch(EdgeKind, id, authorizations).await
    }

    /// The readable subset of `ids`, in id order. Unknown ids are skipped.
    pub async fn get_vertices(&self, ids: &[ElementId], authorizations: &Authorizations) -> Result<Vec<Vertex>> {
        self.fetch_many(VertexKind, ids, authorizations).await
    }

    /// The readable subset of `ids`, in the order requested. Repeated ids
    /// appear once, at their first position.
    pub async fn get_vertices_in_order(
        &self,
        ids: &[ElementId],
        authorizations: &Authorizations,
    ) -> Result<Vec<Vertex>> {
        let mut by_id: HashMap<ElementId, Vertex> = self
            .get_vertices(ids, authorizations)
            .await?
            .into_iter()
            .map(|v| (v.id().clone(), v))
            .collect();
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    pub async fn get_edges(&self, ids: &[ElementId], authorizations: &Authorizations) -> Result<Vec<Edge>> {
        self.fetch_many(EdgeKind, ids, authorizations).await
    }

    /// Every vertex `authorizations` can see.
    pub async fn vertices(&self, authorizations: &Authorizations) -> Result<Vec<Vertex>> {
        self.scan(VertexKind, authorizations).await
    }

    pub async fn edges(&self, authorizations: &Authorizations) -> Result<Vec<Edge>> {
        self.scan(EdgeKind, authorizations).await
    }

    /// Whether `authorizations` satisfies `visibility`.
    pub fn is_visibility_valid(&self, visibility: &Visibility, authorizations: &Authorizations) -> Result<bool> {
        authorizations.can_read(visibility)
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    /// Ids of the readable edges whose endpoints both lie in `vertex_ids`.
    pub async fn find_related_edges(
        &self,
        vertex_ids: &[ElementId],
        authorizations: &Authorizations,
    ) -> Result<Vec<ElementId>> {
        let wanted: BTreeSet<&ElementId> = vertex_ids.iter().collect();
        let mut related = BTreeSet::new();
        for vertex in self.get_vertices(vertex_ids, authorizations).await? {
            for (edge_id, info) in vertex.out_edges() {
                if wanted.contains(&info.vertex_id) {
                    related.insert(edge_id.clone());
                }
            }
        }
        Ok(related.into_iter().collect())
    }

    /// Every simple path from `source` to `dest` of at most `max_hops`
    /// edges, following readable adjacency in either direction. Shortest
    /// paths come first.
    pub async fn find_paths(
        &self,
        source: &Vertex,
        dest: &Vertex,
        max_hops: usize,
        authorizations: &Authorizations,
    ) -> Result<Vec<Path>> {
        let mut found = Vec::new();
        let mut stack = vec![(source.clone(), Path::single(source.id().clone()))];

        while let Some((vertex, path)) = stack.pop() {
            if path.len() >= max_hops {
                continue;
            }
            let mut neighbours = vertex.vertex_ids(Direction::Both, None);
            neighbours.retain(|id| !path.contains(id));
            for next in self.get_vertices(&neighbours, authorizations).await? {
                let extended = path.extended(next.id().clone());
                if next.id() == dest.id() {
                    found.push(extended);
                } else {
                    stack.push((next, extended));
                }
            }
        }

        found.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        found.dedup();
        tracing::debug!(source = %source.id(), dest = %dest.id(), max_hops, paths = found.len(), "found paths");
        Ok(found)
    }

    /// Start a query evaluated under `authorizations`.
    pub fn query(&self, authorizations: &Authorizations) -> GraphQuery<'_, B> {
        GraphQuery::new(self, authorizations.clone())
    }

    fn decoder<'a, K: ElementKind>(&'a self, kind: K, authorizations: &'a Authorizations) -> RowDecoder<'a, K> {
        RowDecoder::new(kind, self.codec.as_ref(), authorizations).with_large_values(self.backend.large_values())
    }

    async fn fetch<K: ElementKind>(
        &self,
        kind: K,
        id: &ElementId,
        authorizations: &Authorizations,
    ) -> Result<Option<K::Output>> {
        let row = self.backend.read_row(&row_key(kind.element_type(), id)).await?;
        self.decoder(kind, authorizations).decode(&row)
    }

    async fn fetch_many<K: ElementKind>(
        &self,
        kind: K,
        ids: &[ElementId],
        authorizations: &Authorizations,
    ) -> Result<Vec<K::Output>> {
        let keys: Vec<String> = ids.iter().map(|id| row_key(kind.element_type(), id)).collect();
        let entries = self.backend.read_rows(&keys).await?;
        self.decoder(kind, authorizations).decode_all(entries)
    }

    async fn scan<K: ElementKind>(&self, kind: K, authorizations: &Authorizations) -> Result<Vec<K::Output>> {
        let entries = self.backend.scan_prefix(kind.row_key_prefix()).await?;
        self.decoder(kind, authorizations).decode_all(entries)
    }
}

/// In-memory graph for testing and embedding.
impl Graph<storage::MemoryBackend> {
    pub async fn open_memory() -> Result<Self> {
        Ok(Self::with_backend(storage::MemoryBackend::new()))
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    VisibilityParse(#[from] VisibilityParseError),

    #[error("Invalid property column qualifier {0:?}: missing separator")]
    InvalidPropertyColumn(String),

    #[error("Invalid property metadata: expected map, got {found}")]
    InvalidMetadata { found: String },

    #[error("Row key {row_key:?} is not a {element_type} row")]
    UnknownRowKeyPrefix { element_type: ElementType, row_key: String },

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Property not found: key {key:?}, name {name:?}")]
    PropertyNotFound { key: String, name: String },

    #[error("Ambiguous property: key {key:?}, name {name:?} matches several instances")]
    AmbiguousProperty { key: String, name: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
