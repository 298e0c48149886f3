//! Edits to an element that has already been read.
//!
//! Planning applies the staged operations in a fixed order against the
//! element as the caller saw it:
//!
//! 1. merge staged new/replacement properties,
//! 2. apply visibility alterations,
//! 3. apply metadata alterations.
//!
//! An alteration whose target was staged in the same mutation re-targets the
//! staged write. Nothing is retracted for an instance that was never stored.

use std::collections::{BTreeMap, BTreeSet};

use super::{ElementMutation, PropertyStage, DEFAULT_KEY};
use crate::model::*;
use crate::storage::StorageBackend;
use crate::visibility::Visibility;
use crate::{Error, Graph, Result};

/// Which property instance an alteration applies to.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyTarget {
    /// Resolved by `(key, name)` at plan time; must match exactly one instance.
    Lookup { key: String, name: String },
    Exact(PropertyIdentity),
}

impl PropertyTarget {
    fn resolve(&self, properties: &BTreeMap<PropertyIdentity, Property>) -> Result<PropertyIdentity> {
        match self {
            PropertyTarget::Exact(identity) => {
                if properties.contains_key(identity) {
                    Ok(identity.clone())
                } else {
                    Err(Error::PropertyNotFound {
                        key: identity.key.clone(),
                        name: identity.name.clone(),
                    })
                }
            }
            PropertyTarget::Lookup { key, name } => {
                let mut matches = properties.keys().filter(|id| id.key == *key && id.name == *name);
                let found = matches.next().ok_or_else(|| Error::PropertyNotFound {
                    key: key.clone(),
                    name: name.clone(),
                })?;
                if matches.next().is_some() {
                    return Err(Error::AmbiguousProperty {
                        key: key.clone(),
                        name: name.clone(),
                    });
                }
                Ok(found.clone())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlterPropertyVisibility {
    pub target: PropertyTarget,
    pub visibility: Visibility,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlterPropertyMetadata {
    pub target: PropertyTarget,
    pub metadata_key: String,
    pub value: Value,
}

/// Result of planning a mutation: what the element becomes and which
/// property instances must be written or retracted to get there.
#[derive(Debug, Clone)]
pub struct MutationPlan<E> {
    /// The element after the mutation.
    pub element: E,
    /// Instances to write (value and metadata columns).
    pub writes: Vec<Property>,
    /// Stored instances to delete.
    pub retractions: Vec<PropertyIdentity>,
    pub previous_visibility: Visibility,
    /// Set when the element visibility changes.
    pub new_visibility: Option<Visibility>,
}

impl<E> MutationPlan<E> {
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.retractions.is_empty() && self.new_visibility.is_none()
    }
}

/// Staged edits against one existing vertex or edge.
#[derive(Debug, Clone)]
pub struct ExistingElementMutation<E: GraphElement> {
    element: E,
    staged: PropertyStage,
    new_visibility: Option<Visibility>,
    visibility_alterations: Vec<AlterPropertyVisibility>,
    metadata_alterations: Vec<AlterPropertyMetadata>,
}

impl<E: GraphElement> ExistingElementMutation<E> {
    pub fn new(element: E) -> Self {
        Self {
            element,
            staged: PropertyStage::default(),
            new_visibility: None,
            visibility_alterations: Vec::new(),
            metadata_alterations: Vec::new(),
        }
    }

    pub fn element(&self) -> &E {
        &self.element
    }

    pub fn alter_property_visibility(self, name: impl Into<String>, visibility: Visibility) -> Self {
        self.alter_property_visibility_by_key(DEFAULT_KEY, name, visibility)
    }

    pub fn alter_property_visibility_by_key(
        self,
        key: impl Into<String>,
        name: impl Into<String>,
        visibility: Visibility,
    ) -> Self {
        let target = PropertyTarget::Lookup { key: key.into(), name: name.into() };
        self.push_visibility(target, visibility)
    }

    /// Alter exactly this instance, old visibility included.
    pub fn alter_property_visibility_of(self, property: &Property, visibility: Visibility) -> Self {
        self.push_visibility(PropertyTarget::Exact(property.identity().clone()), visibility)
    }

    pub fn alter_property_metadata(
        self,
        name: impl Into<String>,
        metadata_key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.alter_property_metadata_by_key(DEFAULT_KEY, name, metadata_key, value)
    }

    pub fn alter_property_metadata_by_key(
        self,
        key: impl Into<String>,
        name: impl Into<String>,
        metadata_key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        let target = PropertyTarget::Lookup { key: key.into(), name: name.into() };
        self.push_metadata(target, metadata_key.into(), value.into())
    }

    pub fn alter_property_metadata_of(
        self,
        property: &Property,
        metadata_key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.push_metadata(PropertyTarget::Exact(property.identity().clone()), metadata_key.into(), value.into())
    }

    pub fn alter_element_visibility(mut self, visibility: Visibility) -> Self {
        self.new_visibility = Some(visibility);
        self
    }

    pub fn visibility_alterations(&self) -> &[AlterPropertyVisibility] {
        &self.visibility_alterations
    }

    pub fn metadata_alterations(&self) -> &[AlterPropertyMetadata] {
        &self.metadata_alterations
    }

    fn push_visibility(mut self, target: PropertyTarget, visibility: Visibility) -> Self {
        self.visibility_alterations.push(AlterPropertyVisibility { target, visibility });
        self
    }

    fn push_metadata(mut self, target: PropertyTarget, metadata_key: String, value: Value) -> Self {
        self.metadata_alterations.push(AlterPropertyMetadata { target, metadata_key, value });
        self
    }

    /// Resolve every staged operation against the element.
    pub fn plan(&self) -> Result<MutationPlan<E>> {
        let base = self.element.element();
        let stored: BTreeSet<PropertyIdentity> = base.properties().map(|p| p.identity().clone()).collect();
        let mut merged: BTreeMap<PropertyIdentity, Property> =
            base.properties().map(|p| (p.identity().clone(), p.clone())).collect();
        let mut writes: BTreeMap<PropertyIdentity, Property> = BTreeMap::new();
        let mut retractions: BTreeSet<PropertyIdentity> = BTreeSet::new();

        for property in self.staged.as_slice() {
            merged.insert(property.identity().clone(), property.clone());
            writes.insert(property.identity().clone(), property.clone());
        }

        for alteration in &self.visibility_alterations {
            let old = alteration.target.resolve(&merged)?;
            let Some(property) = merged.remove(&old) else {
                continue;
            };
            writes.remove(&old);
            if stored.contains(&old) {
                retractions.insert(old);
            }
            let moved = property.with_visibility(alteration.visibility.clone());
            retractions.remove(moved.identity());
            merged.insert(moved.identity().clone(), moved.clone());
            writes.insert(moved.identity().clone(), moved);
        }

        for alteration in &self.metadata_alterations {
            let identity = alteration.target.resolve(&merged)?;
            let Some(property) = merged.get(&identity) else {
                continue;
            };
            let updated = property.with_metadata_entry(alteration.metadata_key.clone(), alteration.value.clone());
            merged.insert(identity.clone(), updated.clone());
            writes.insert(identity, updated);
        }

        let previous_visibility = base.visibility().clone();
        let new_visibility = self
            .new_visibility
            .clone()
            .filter(|v| *v != previous_visibility);
        let visibility = new_visibility.clone().unwrap_or_else(|| previous_visibility.clone());

        let element = self
            .element
            .with_element(Element::new(base.id().clone(), visibility, merged.into_values()));

        Ok(MutationPlan {
            element,
            writes: writes.into_values().collect(),
            retractions: retractions.into_iter().collect(),
            previous_visibility,
            new_visibility,
        })
    }

    pub async fn save<B: StorageBackend>(self, graph: &Graph<B>) -> Result<E>
    where
        E: crate::storage::StoredElement,
    {
        let plan = self.plan()?;
        graph.save_mutation(plan).await
    }
}

impl<E: GraphElement> ElementMutation for ExistingElementMutation<E> {
    fn stage(mut self, property: Property) -> Self {
        self.staged.push(property);
        self
    }

    fn staged_properties(&self) -> &[Property] {
        self.staged.as_slice()
    }
}
