//! Column key scheme shared by the decoder and the encoder.
//!
//! These constants are the on-disk contract. Changing any of them makes
//! previously written rows undecodable.

use bytes::Bytes;

use crate::model::{ElementId, ElementType};

pub const VERTEX_ROW_KEY_PREFIX: &str = "V";
pub const EDGE_ROW_KEY_PREFIX: &str = "E";

/// Property values. Qualifier: `name VALUE_SEPARATOR instance-id`.
pub const CF_PROPERTY: &str = "PROP";
/// Property metadata. Same qualifier and visibility as the value column.
pub const CF_PROPERTY_METADATA: &str = "PROPMETA";

/// Vertex existence signal. Empty qualifier, empty value.
pub const CF_VERTEX_SIGNAL: &str = "V";
/// Vertex adjacency. Qualifier: edge id; value: codec map `{label, vertexId}`.
pub const CF_OUT_EDGE: &str = "EOUT";
pub const CF_IN_EDGE: &str = "EIN";

/// Edge existence signal. Qualifier: label.
pub const CF_EDGE_SIGNAL: &str = "E";
/// Edge endpoints. Qualifier: vertex id.
pub const CF_OUT_VERTEX: &str = "VOUT";
pub const CF_IN_VERTEX: &str = "VIN";

pub const DELETE_ROW_COLUMN_FAMILY: &str = "D";
pub const DELETE_ROW_COLUMN_QUALIFIER: &str = "D";
pub const DELETE_ROW_VALUE: &[u8] = b"DEL_ROW";

pub const VALUE_SEPARATOR: char = '\u{1f}';

pub fn row_key_prefix(element_type: ElementType) -> &'static str {
    match element_type {
        ElementType::Vertex => VERTEX_ROW_KEY_PREFIX,
        ElementType::Edge => EDGE_ROW_KEY_PREFIX,
    }
}

pub fn row_key(element_type: ElementType, id: &ElementId) -> String {
    format!("{}{}", row_key_prefix(element_type), id)
}

// ============================================================================
// Column entries
// ============================================================================

/// Sort key of one stored cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnKey {
    pub row: String,
    pub family: String,
    pub qualifier: String,
    pub visibility: String,
}

/// One cell as it comes out of (or goes into) a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnEntry {
    pub row: String,
    pub family: String,
    pub qualifier: String,
    /// Column visibility as stored; may be wrapped in `[...]`.
    pub visibility: String,
    pub value: Bytes,
}

impl ColumnEntry {
    pub fn new(
        row: impl Into<String>,
        family: impl Into<String>,
        qualifier: impl Into<String>,
        visibility: impl Into<String>,
        value: impl Into<Bytes>,
    ) -> Self {
        Self {
            row: row.into(),
            family: family.into(),
            qualifier: qualifier.into(),
            visibility: visibility.into(),
            value: value.into(),
        }
    }

    pub fn key(&self) -> ColumnKey {
        ColumnKey {
            row: self.row.clone(),
            family: self.family.clone(),
            qualifier: self.qualifier.clone(),
            visibility: self.visibility.clone(),
        }
    }

    pub fn is_tombstone(&self) -> bool {
        self.family == DELETE_ROW_COLUMN_FAMILY
            && self.qualifier == DELETE_ROW_COLUMN_QUALIFIER
            && self.value.as_ref() == DELETE_ROW_VALUE
    }

    /// Tombstone marking `row` deleted.
    pub fn tombstone(row: impl Into<String>) -> Self {
        Self::new(
            row,
            DELETE_ROW_COLUMN_FAMILY,
            DELETE_ROW_COLUMN_QUALIFIER,
            "",
            Bytes::from_static(DELETE_ROW_VALUE),
        )
    }
}

/// A single write against the column store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnOp {
    Put(ColumnEntry),
    Delete(ColumnKey),
}

/// `name SEP instance-id`.
pub fn property_qualifier(name: &str, instance_id: &str) -> String {
    format!("{name}{VALUE_SEPARATOR}{instance_id}")
}

/// Split a property qualifier at the first separator into `(name, instance-id)`.
pub fn split_property_qualifier(qualifier: &str) -> Option<(&str, &str)> {
    qualifier.split_once(VALUE_SEPARATOR)
}
