//! Edge (directed, labelled) in the property graph.

use std::ops::Deref;

use super::{Direction, Element, ElementId, ElementType, GraphElement};

/// An edge: element base plus endpoints and label.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    element: Element,
    out_vertex_id: ElementId,
    in_vertex_id: ElementId,
    label: String,
}

impl Edge {
    pub fn new(
        element: Element,
        out_vertex_id: impl Into<ElementId>,
        in_vertex_id: impl Into<ElementId>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            element,
            out_vertex_id: out_vertex_id.into(),
            in_vertex_id: in_vertex_id.into(),
            label: label.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn out_vertex_id(&self) -> &ElementId {
        &self.out_vertex_id
    }

    pub fn in_vertex_id(&self) -> &ElementId {
        &self.in_vertex_id
    }

    /// Endpoint on the given side. `Both` has no single answer.
    pub fn vertex_id(&self, dir: Direction) -> Option<&ElementId> {
        match dir {
            Direction::Outgoing => Some(&self.out_vertex_id),
            Direction::Incoming => Some(&self.in_vertex_id),
            Direction::Both => None,
        }
    }

    /// The "other" end of the edge from the given vertex.
    pub fn other_vertex_id(&self, from: &ElementId) -> Option<&ElementId> {
        if *from == self.out_vertex_id { Some(&self.in_vertex_id) }
        else if *from == self.in_vertex_id { Some(&self.out_vertex_id) }
        else { None }
    }
}

impl Deref for Edge {
    type Target = Element;

    fn deref(&self) -> &Element {
        &self.element
    }
}

impl GraphElement for Edge {
    const TYPE: ElementType = ElementType::Edge;

    fn element(&self) -> &Element {
        &self.element
    }

    fn with_element(&self, element: Element) -> Self {
        Self {
            element,
            out_vertex_id: self.out_vertex_id.clone(),
            in_vertex_id: self.in_vertex_id.clone(),
            label: self.label.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visibility::Visibility;

    #[test]
    fn test_other_vertex() {
        let e = Edge::new(Element::new("e1", Visibility::empty(), vec![]), "a", "b", "knows");
        assert_eq!(e.other_vertex_id(&"a".into()), Some(&ElementId::from("b")));
        assert_eq!(e.other_vertex_id(&"b".into()), Some(&ElementId::from("a")));
        assert_eq!(e.other_vertex_id(&"c".into()), None);
        assert_eq!(e.vertex_id(Direction::Both), None);
    }
}
