//! Vertex in the property graph.

use std::collections::{BTreeMap, HashMap};
use std::ops::Deref;

use serde::{Deserialize, Serialize};

use super::{Direction, Element, ElementId, ElementType, GraphElement, Value};
use crate::{Error, Result};

/// Adjacency summary stored on a vertex row for one incident edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeInfo {
    pub label: String,
    /// The vertex at the other end of the edge.
    pub vertex_id: ElementId,
}

impl EdgeInfo {
    pub fn new(label: impl Into<String>, vertex_id: impl Into<ElementId>) -> Self {
        Self {
            label: label.into(),
            vertex_id: vertex_id.into(),
        }
    }

    /// Map form used in adjacency column values.
    pub fn to_value(&self) -> Value {
        let mut m = HashMap::new();
        m.insert("label".to_string(), Value::from(self.label.as_str()));
        m.insert("vertexId".to_string(), Value::from(self.vertex_id.as_str()));
        Value::Map(m)
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        let map = value.as_map().ok_or_else(|| {
            Error::Codec(format!("edge info must be a map, found {}", value.type_name()))
        })?;
        let field = |name: &str| -> Result<&str> {
            map.get(name)
                .and_then(Value::as_str)
                .ok_or_else(|| Error::Codec(format!("edge info missing string field {name:?}")))
        };
        Ok(Self::new(field("label")?, field("vertexId")?))
    }
}

/// A vertex: element base plus in/out adjacency keyed by edge id.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    element: Element,
    out_edges: BTreeMap<ElementId, EdgeInfo>,
    in_edges: BTreeMap<ElementId, EdgeInfo>,
}

impl Vertex {
    pub fn new(
        element: Element,
        out_edges: BTreeMap<ElementId, EdgeInfo>,
        in_edges: BTreeMap<ElementId, EdgeInfo>,
    ) -> Self {
        Self { element, out_edges, in_edges }
    }

    pub fn out_edges(&self) -> &BTreeMap<ElementId, EdgeInfo> {
        &self.out_edges
    }

    pub fn in_edges(&self) -> &BTreeMap<ElementId, EdgeInfo> {
        &self.in_edges
    }

    /// Incident edge ids, optionally restricted to one label.
    pub fn edge_ids(&self, dir: Direction, label: Option<&str>) -> Vec<ElementId> {
        self.adjacent(dir, label).map(|(id, _)| id.clone()).collect()
    }

    /// Ids of neighbouring vertices, optionally restricted to one label.
    pub fn vertex_ids(&self, dir: Direction, label: Option<&str>) -> Vec<ElementId> {
        self.adjacent(dir, label).map(|(_, info)| info.vertex_id.clone()).collect()
    }

    fn adjacent<'a>(
        &'a self,
        dir: Direction,
        label: Option<&'a str>,
    ) -> impl Iterator<Item = (&'a ElementId, &'a EdgeInfo)> + 'a {
        let out = matches!(dir, Direction::Outgoing | Direction::Both)
            .then(|| self.out_edges.iter())
            .into_iter()
            .flatten();
        let inc = matches!(dir, Direction::Incoming | Direction::Both)
            .then(|| self.in_edges.iter())
            .into_iter()
            .flatten();
        out.chain(inc)
            .filter(move |(_, info)| label.is_none_or(|l| info.label == l))
    }
}

impl Deref for Vertex {
    type Target = Element;

    fn deref(&self) -> &Element {
        &self.element
    }
}

impl GraphElement for Vertex {
    const TYPE: ElementType = ElementType::Vertex;

    fn element(&self) -> &Element {
        &self.element
    }

    fn with_element(&self, element: Element) -> Self {
        Self {
            element,
            out_edges: self.out_edges.clone(),
            in_edges: self.in_edges.clone(),
        }
    }
}
