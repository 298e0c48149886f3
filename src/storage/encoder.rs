//! # Element Encoder
//!
//! Write-side mirror of [`super::decoder`]. Turns new elements, mutation
//! plans and removals into [`ColumnOp`]s using the same key scheme the
//! decoder reads.
//!
//! Within one batch all deletes precede all puts, so a retraction and a
//! write of the same cell leave the write in place.

use std::sync::Arc;

use bytes::Bytes;

use super::codec::ValueCodec;
use super::columns::*;
use crate::model::*;
use crate::mutation::MutationPlan;
use crate::visibility::Visibility;
use crate::{Error, Result};

/// Default payload size above which `Bytes` values go to the large-value store.
pub const DEFAULT_LARGE_VALUE_THRESHOLD: usize = 64 * 1024;

// ============================================================================
// StoredElement
// ============================================================================

/// Columns an element owns besides its properties.
pub trait StoredElement: GraphElement {
    /// Existence signal plus kind-specific columns, all under `visibility`.
    /// May include cells on other rows (edge adjacency on vertex rows).
    fn structural_columns(&self, visibility: &Visibility, codec: &dyn ValueCodec) -> Result<Vec<ColumnEntry>>;
}

impl StoredElement for Vertex {
    fn structural_columns(&self, visibility: &Visibility, _codec: &dyn ValueCodec) -> Result<Vec<ColumnEntry>> {
        let row = row_key(ElementType::Vertex, self.id());
        Ok(vec![ColumnEntry::new(row, CF_VERTEX_SIGNAL, "", visibility.as_str(), Bytes::new())])
    }
}

impl StoredElement for Edge {
    fn structural_columns(&self, visibility: &Visibility, codec: &dyn ValueCodec) -> Result<Vec<ColumnEntry>> {
        let row = row_key(ElementType::Edge, self.id());
        let vis = visibility.as_str();
        let out_row = row_key(ElementType::Vertex, self.out_vertex_id());
        let in_row = row_key(ElementType::Vertex, self.in_vertex_id());
        let out_info = codec.encode(&EdgeInfo::new(self.label(), self.in_vertex_id().clone()).to_value())?;
        let in_info = codec.encode(&EdgeInfo::new(self.label(), self.out_vertex_id().clone()).to_value())?;
        Ok(vec![
            ColumnEntry::new(row.clone(), CF_EDGE_SIGNAL, self.label(), vis, Bytes::new()),
            ColumnEntry::new(row.clone(), CF_OUT_VERTEX, self.out_vertex_id().as_str(), vis, Bytes::new()),
            ColumnEntry::new(row, CF_IN_VERTEX, self.in_vertex_id().as_str(), vis, Bytes::new()),
            ColumnEntry::new(out_row, CF_OUT_EDGE, self.id().as_str(), vis, out_info),
            ColumnEntry::new(in_row, CF_IN_EDGE, self.id().as_str(), vis, in_info),
        ])
    }
}

// ============================================================================
// ElementEncoder
// ============================================================================

pub struct ElementEncoder {
    codec: Arc<dyn ValueCodec>,
    large_values: Option<Arc<dyn LargeValueStore>>,
    large_value_threshold: usize,
}

impl ElementEncoder {
    pub fn new(codec: Arc<dyn ValueCodec>) -> Self {
        Self {
            codec,
            large_values: None,
            large_value_threshold: DEFAULT_LARGE_VALUE_THRESHOLD,
        }
    }

    pub fn with_large_values(mut self, store: Option<Arc<dyn LargeValueStore>>, threshold: usize) -> Self {
        self.large_values = store;
        self.large_value_threshold = threshold;
        self
    }

    pub fn codec(&self) -> &dyn ValueCodec {
        self.codec.as_ref()
    }

    /// Value and metadata columns of one property instance.
    pub fn put_property(&self, row: &str, property: &Property) -> Result<Vec<ColumnOp>> {
        if property.name().contains(VALUE_SEPARATOR) {
            return Err(Error::InvalidArgument(format!(
                "property name {:?} contains the reserved separator",
                property.name()
            )));
        }
        property.visibility().validate()?;

        let qualifier = property_qualifier(property.name(), property.key());
        let vis = property.visibility().as_str();
        let value = self.encode_value(property.value())?;
        let metadata = if property.metadata().is_empty() {
            Bytes::new()
        } else {
            self.codec.encode(&Value::Map(property.metadata().clone()))?
        };
        Ok(vec![
            ColumnOp::Put(ColumnEntry::new(row, CF_PROPERTY, qualifier.clone(), vis, value)),
            ColumnOp::Put(ColumnEntry::new(row, CF_PROPERTY_METADATA, qualifier, vis, metadata)),
        ])
    }

    /// Deletes for both columns of one property instance.
    pub fn delete_property(&self, row: &str, identity: &PropertyIdentity) -> Vec<ColumnOp> {
        let qualifier = property_qualifier(&identity.name, &identity.key);
        [CF_PROPERTY, CF_PROPERTY_METADATA]
            .into_iter()
            .map(|family| {
                ColumnOp::Delete(ColumnKey {
                    row: row.to_string(),
                    family: family.to_string(),
                    qualifier: qualifier.clone(),
                    visibility: identity.visibility.as_str().to_string(),
                })
            })
            .collect()
    }

    /// Every column of a freshly created element.
    ///
    /// Starts by deleting the row's tombstone so an id removed earlier can be
    /// created again; the cells the tombstone shadowed stay gone.
    pub fn new_element<E: StoredElement>(&self, element: &E) -> Result<Vec<ColumnOp>> {
        let base = element.element();
        base.visibility().validate()?;
        let row = row_key(E::TYPE, base.id());
        let mut ops = vec![ColumnOp::Delete(ColumnEntry::tombstone(row.as_str()).key())];
        ops.extend(
            element
                .structural_columns(base.visibility(), self.codec.as_ref())?
                .into_iter()
                .map(ColumnOp::Put),
        );
        for property in base.properties() {
            ops.extend(self.put_property(&row, property)?);
        }
        Ok(ops)
    }

    /// Columns for a planned mutation of an existing element.
    pub fn mutation<E: StoredElement>(&self, plan: &MutationPlan<E>) -> Result<Vec<ColumnOp>> {
        let element = &plan.element;
        let row = row_key(E::TYPE, element.element().id());
        let mut deletes = Vec::new();
        let mut puts = Vec::new();

        if let Some(visibility) = &plan.new_visibility {
            visibility.validate()?;
            for old in element.structural_columns(&plan.previous_visibility, self.codec.as_ref())? {
                deletes.push(ColumnOp::Delete(old.key()));
            }
            for new in element.structural_columns(visibility, self.codec.as_ref())? {
                puts.push(ColumnOp::Put(new));
            }
        }
        for identity in &plan.retractions {
            deletes.extend(self.delete_property(&row, identity));
        }
        for property in &plan.writes {
            puts.extend(self.put_property(&row, property)?);
        }

        deletes.extend(puts);
        Ok(deletes)
    }

    /// Tombstone for an element row. Edges also drop their adjacency cells.
    pub fn remove_element<E: StoredElement>(&self, element: &E) -> Result<Vec<ColumnOp>> {
        let base = element.element();
        let row = row_key(E::TYPE, base.id());
        let mut ops = Vec::new();
        if E::TYPE == ElementType::Edge {
            for entry in element.structural_columns(base.visibility(), self.codec.as_ref())? {
                if entry.row != row {
                    ops.push(ColumnOp::Delete(entry.key()));
                }
            }
        }
        ops.push(ColumnOp::Put(ColumnEntry::tombstone(row)));
        Ok(ops)
    }

    fn encode_value(&self, value: &Value) -> Result<Bytes> {
        if let (Value::Bytes(payload), Some(store)) = (value, &self.large_values) {
            if payload.len() > self.large_value_threshold {
                let locator = store.put(payload)?;
                tracing::debug!(%locator, len = payload.len(), "stored large value out of band");
                let reference = LargeValueRef::new(locator, payload.len() as u64);
                return self.codec.encode(&Value::LargeValueRef(reference));
            }
        }
        self.codec.encode(value)
    }
}
