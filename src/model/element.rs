//! Element base shared by vertices and edges.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Property, PropertyIdentity, Value};
use crate::mutation::ExistingElementMutation;
use crate::visibility::{Authorizations, Visibility};
use crate::Result;

/// Opaque element identifier (the row key without its type prefix).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(pub String);

impl ElementId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ElementId {
    fn from(v: &str) -> Self { ElementId(v.to_string()) }
}

impl From<String> for ElementId {
    fn from(v: String) -> Self { ElementId(v) }
}

/// Vertex or edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    Vertex,
    Edge,
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementType::Vertex => f.write_str("vertex"),
            ElementType::Edge => f.write_str("edge"),
        }
    }
}

/// Traversal direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

/// Id, element-level visibility and the property instances of one element.
///
/// The element visibility gates existence; each property is gated by its
/// own visibility independently.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    id: ElementId,
    visibility: Visibility,
    properties: BTreeMap<PropertyIdentity, Property>,
}

impl Element {
    pub fn new(
        id: impl Into<ElementId>,
        visibility: Visibility,
        properties: impl IntoIterator<Item = Property>,
    ) -> Self {
        Self {
            id: id.into(),
            visibility,
            properties: properties
                .into_iter()
                .map(|p| (p.identity().clone(), p))
                .collect(),
        }
    }

    pub fn id(&self) -> &ElementId {
        &self.id
    }

    pub fn visibility(&self) -> &Visibility {
        &self.visibility
    }

    /// All property instances, ordered by identity.
    pub fn properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.values()
    }

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    /// All instances sharing `name`.
    pub fn properties_named<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a Property> {
        self.properties.values().filter(move |p| p.name() == name)
    }

    /// Exact instance lookup.
    pub fn get(&self, identity: &PropertyIdentity) -> Option<&Property> {
        self.properties.get(identity)
    }

    /// First instance with this key and name, in identity order.
    pub fn property(&self, key: &str, name: &str) -> Option<&Property> {
        self.properties.values().find(|p| p.key() == key && p.name() == name)
    }

    /// First value with this name, in identity order.
    pub fn property_value(&self, name: &str) -> Option<&Value> {
        self.properties_named(name).next().map(Property::value)
    }

    pub fn property_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.properties_named(name).map(Property::value)
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.properties_named(name).next().is_some()
    }

    /// Copy keeping only the properties `authorizations` can read.
    pub fn visible_to(&self, authorizations: &Authorizations) -> Result<Element> {
        let mut properties = BTreeMap::new();
        for (identity, property) in &self.properties {
            if authorizations.can_read(property.visibility())? {
                properties.insert(identity.clone(), property.clone());
            }
        }
        Ok(Element {
            id: self.id.clone(),
            visibility: self.visibility.clone(),
            properties,
        })
    }
}

/// Common behaviour of [`super::Vertex`] and [`super::Edge`].
pub trait GraphElement: Clone + Send + Sync + 'static {
    const TYPE: ElementType;

    fn element(&self) -> &Element;

    /// Same adjacency/endpoints, replaced id-visibility-properties base.
    fn with_element(&self, element: Element) -> Self;

    /// Start staging edits against this element as read.
    fn prepare_mutation(&self) -> ExistingElementMutation<Self> {
        ExistingElementMutation::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Metadata;

    fn prop(key: &str, name: &str, value: &str, vis: &str) -> Property {
        Property::new(key, name, value, Metadata::new(), Visibility::new(vis))
    }

    #[test]
    fn test_multi_valued_properties() {
        let e = Element::new("v1", Visibility::empty(), vec![
            prop("", "name", "a", ""),
            prop("k2", "name", "b", ""),
            prop("", "name", "c", "secret"),
            prop("", "age", "d", ""),
        ]);
        assert_eq!(e.property_count(), 4);
        assert_eq!(e.properties_named("name").count(), 3);
        assert_eq!(e.property("k2", "name").unwrap().value(), &Value::from("b"));
    }

    #[test]
    fn test_same_identity_collapses() {
        let e = Element::new("v1", Visibility::empty(), vec![
            prop("", "name", "a", ""),
            prop("", "name", "b", ""),
        ]);
        assert_eq!(e.property_count(), 1);
        assert_eq!(e.property_value("name"), Some(&Value::from("b")));
    }

    #[test]
    fn test_visible_to_filters_properties() {
        let e = Element::new("v1", Visibility::empty(), vec![
            prop("", "public", "x", ""),
            prop("", "private", "y", "secret"),
        ]);
        let visible = e.visible_to(&Authorizations::none()).unwrap();
        assert!(visible.has_property("public"));
        assert!(!visible.has_property("private"));

        let all = e.visible_to(&Authorizations::new(["secret"])).unwrap();
        assert_eq!(all.property_count(), 2);
    }
}
