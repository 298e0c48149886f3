//! Path — the vertex ids visited from a source to a destination.

use serde::{Deserialize, Serialize};

use super::ElementId;

/// A path through the graph: `source -> ... -> destination`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Path {
    vertex_ids: Vec<ElementId>,
}

impl Path {
    pub fn single(vertex_id: ElementId) -> Self {
        Self { vertex_ids: vec![vertex_id] }
    }

    /// Number of hops.
    pub fn len(&self) -> usize {
        self.vertex_ids.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn vertex_ids(&self) -> &[ElementId] {
        &self.vertex_ids
    }

    pub fn start(&self) -> Option<&ElementId> {
        self.vertex_ids.first()
    }

    pub fn end(&self) -> Option<&ElementId> {
        self.vertex_ids.last()
    }

    pub fn contains(&self, vertex_id: &ElementId) -> bool {
        self.vertex_ids.contains(vertex_id)
    }

    /// A copy of this path extended by one hop.
    pub fn extended(&self, vertex_id: ElementId) -> Self {
        let mut vertex_ids = Vec::with_capacity(self.vertex_ids.len() + 1);
        vertex_ids.extend(self.vertex_ids.iter().cloned());
        vertex_ids.push(vertex_id);
        Self { vertex_ids }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hops_and_ends() {
        let p = Path::single("a".into());
        assert!(p.is_empty());
        let p = p.extended("b".into()).extended("c".into());
        assert_eq!(p.len(), 2);
        assert_eq!(p.start(), Some(&ElementId::from("a")));
        assert_eq!(p.end(), Some(&ElementId::from("c")));
        assert!(p.contains(&"b".into()));
    }
}
