//! # Mutations
//!
//! Backend-agnostic edit builders.
//!
//! - [`VertexBuilder`] / [`EdgeBuilder`] stage the properties of a new element.
//! - [`ExistingElementMutation`] stages edits to an element that was already
//!   read: new or replaced properties, visibility and metadata alterations,
//!   and an element-level visibility change.
//!
//! All builders are chainable values with no internal synchronization.
//! Nothing touches storage until `save`.

pub mod existing;

pub use existing::{
    AlterPropertyMetadata, AlterPropertyVisibility, ExistingElementMutation, MutationPlan,
    PropertyTarget,
};

use crate::model::*;
use crate::storage::StorageBackend;
use crate::visibility::Visibility;
use crate::{Graph, Result};

/// Key of single-valued properties.
pub const DEFAULT_KEY: &str = "";

/// Staging operations shared by every builder.
///
/// Staging an instance whose identity `(key, name, visibility)` is already
/// staged replaces it; instances differing in key or visibility coexist.
pub trait ElementMutation: Sized {
    fn stage(self, property: Property) -> Self;

    fn staged_properties(&self) -> &[Property];

    fn set_property(self, name: impl Into<String>, value: impl Into<Value>, visibility: Visibility) -> Self {
        self.add_property_value(DEFAULT_KEY, name, value, visibility)
    }

    fn set_property_with_metadata(
        self,
        name: impl Into<String>,
        value: impl Into<Value>,
        metadata: Metadata,
        visibility: Visibility,
    ) -> Self {
        self.add_property_value_with_metadata(DEFAULT_KEY, name, value, metadata, visibility)
    }

    fn add_property_value(
        self,
        key: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<Value>,
        visibility: Visibility,
    ) -> Self {
        self.add_property_value_with_metadata(key, name, value, Metadata::new(), visibility)
    }

    fn add_property_value_with_metadata(
        self,
        key: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<Value>,
        metadata: Metadata,
        visibility: Visibility,
    ) -> Self {
        self.stage(Property::new(key, name, value, metadata, visibility))
    }
}

/// Staged properties, last write per identity wins.
#[derive(Debug, Clone, Default)]
pub(crate) struct PropertyStage {
    properties: Vec<Property>,
}

impl PropertyStage {
    pub(crate) fn push(&mut self, property: Property) {
        match self.properties.iter_mut().find(|p| p.identity() == property.identity()) {
            Some(slot) => *slot = property,
            None => self.properties.push(property),
        }
    }

    pub(crate) fn as_slice(&self) -> &[Property] {
        &self.properties
    }

    pub(crate) fn into_vec(self) -> Vec<Property> {
        self.properties
    }
}

// ============================================================================
// New elements
// ============================================================================

/// Builder for a vertex that does not exist yet.
#[derive(Debug, Clone)]
pub struct VertexBuilder {
    id: ElementId,
    visibility: Visibility,
    staged: PropertyStage,
}

impl VertexBuilder {
    pub fn new(id: impl Into<ElementId>, visibility: Visibility) -> Self {
        Self {
            id: id.into(),
            visibility,
            staged: PropertyStage::default(),
        }
    }

    pub fn id(&self) -> &ElementId {
        &self.id
    }

    /// The vertex this builder describes, without adjacency.
    pub fn build(self) -> Vertex {
        let element = Element::new(self.id, self.visibility, self.staged.into_vec());
        Vertex::new(element, Default::default(), Default::default())
    }

    pub async fn save<B: StorageBackend>(self, graph: &Graph<B>) -> Result<Vertex> {
        let vertex = self.build();
        graph.write_new(&vertex).await?;
        Ok(vertex)
    }
}

impl ElementMutation for VertexBuilder {
    fn stage(mut self, property: Property) -> Self {
        self.staged.push(property);
        self
    }

    fn staged_properties(&self) -> &[Property] {
        self.staged.as_slice()
    }
}

/// Builder for an edge that does not exist yet.
#[derive(Debug, Clone)]
pub struct EdgeBuilder {
    id: ElementId,
    out_vertex_id: ElementId,
    in_vertex_id: ElementId,
    label: String,
    visibility: Visibility,
    staged: PropertyStage,
}

impl EdgeBuilder {
    pub fn new(
        id: impl Into<ElementId>,
        out_vertex_id: impl Into<ElementId>,
        in_vertex_id: impl Into<ElementId>,
        label: impl Into<String>,
        visibility: Visibility,
    ) -> Self {
        Self {
            id: id.into(),
            out_vertex_id: out_vertex_id.into(),
            in_vertex_id: in_vertex_id.into(),
            label: label.into(),
            visibility,
            staged: PropertyStage::default(),
        }
    }

    pub fn id(&self) -> &ElementId {
        &self.id
    }

    pub fn build(self) -> Edge {
        let element = Element::new(self.id, self.visibility, self.staged.into_vec());
        Edge::new(element, self.out_vertex_id, self.in_vertex_id, self.label)
    }

    /// Writes the edge row and the adjacency columns on both endpoint rows.
    pub async fn save<B: StorageBackend>(self, graph: &Graph<B>) -> Result<Edge> {
        let edge = self.build();
        graph.write_new(&edge).await?;
        Ok(edge)
    }
}

impl ElementMutation for EdgeBuilder {
    fn stage(mut self, property: Property) -> Self {
        self.staged.push(property);
        self
    }

    fn staged_properties(&self) -> &[Property] {
        self.staged.as_slice()
    }
}
