//! # Row Decoder
//!
//! Rebuilds one element from the column entries of one row.
//!
//! ```text
//! row columns ──▶ tombstone? ──▶ absent
//!             ──▶ unreadable? ──▶ skipped
//!             ──▶ PROP / PROPMETA ──▶ joined on (qualifier, visibility)
//!             ──▶ signal ──▶ element visibility
//!             ──▶ anything else ──▶ ElementKind strategy
//! end of row: no signal ──▶ absent, otherwise ElementKind::finish
//! ```
//!
//! Single pass, no assumption about column order within the row.

use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::iter::Peekable;
use std::sync::Arc;

use super::codec::ValueCodec;
use super::columns::*;
use crate::model::*;
use crate::visibility::{Authorizations, Visibility};
use crate::{Error, Result};

// ============================================================================
// Element kind strategy
// ============================================================================

/// Element-type specific part of decoding.
///
/// Gets first refusal on every column outside the property families,
/// including the existence signal, and assembles the final element.
pub trait ElementKind: Send + Sync {
    type Output: GraphElement;
    type State: Default;

    fn element_type(&self) -> ElementType;

    fn signal_family(&self) -> &'static str;

    fn row_key_prefix(&self) -> &'static str {
        row_key_prefix(self.element_type())
    }

    /// Does this column family belong to this element kind?
    fn accepts(&self, family: &str) -> bool;

    /// Fold one readable column into the side state.
    fn accumulate(
        &self,
        state: &mut Self::State,
        entry: &ColumnEntry,
        codec: &dyn ValueCodec,
    ) -> Result<()>;

    fn finish(&self, element: Element, state: Self::State) -> Result<Self::Output>;
}

/// Vertex rows: adjacency columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct VertexKind;

#[derive(Debug, Default)]
pub struct VertexState {
    out_edges: BTreeMap<ElementId, EdgeInfo>,
    in_edges: BTreeMap<ElementId, EdgeInfo>,
}

impl ElementKind for VertexKind {
    type Output = Vertex;
    type State = VertexState;

    fn element_type(&self) -> ElementType {
        ElementType::Vertex
    }

    fn signal_family(&self) -> &'static str {
        CF_VERTEX_SIGNAL
    }

    fn accepts(&self, family: &str) -> bool {
        family == CF_OUT_EDGE || family == CF_IN_EDGE || family == CF_VERTEX_SIGNAL
    }

    fn accumulate(&self, state: &mut VertexState, entry: &ColumnEntry, codec: &dyn ValueCodec) -> Result<()> {
        let target = match entry.family.as_str() {
            CF_OUT_EDGE => &mut state.out_edges,
            CF_IN_EDGE => &mut state.in_edges,
            _ => return Ok(()),
        };
        let info = EdgeInfo::from_value(&codec.decode(&entry.value)?)?;
        target.insert(ElementId::from(entry.qualifier.as_str()), info);
        Ok(())
    }

    fn finish(&self, element: Element, state: VertexState) -> Result<Vertex> {
        Ok(Vertex::new(element, state.out_edges, state.in_edges))
    }
}

/// Edge rows: label (on the signal column) and endpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct EdgeKind;

#[derive(Debug, Default)]
pub struct EdgeState {
    label: Option<String>,
    out_vertex_id: Option<ElementId>,
    in_vertex_id: Option<ElementId>,
}

impl ElementKind for EdgeKind {
    type Output = Edge;
    type State = EdgeState;

    fn element_type(&self) -> ElementType {
        ElementType::Edge
    }

    fn signal_family(&self) -> &'static str {
        CF_EDGE_SIGNAL
    }

    fn accepts(&self, family: &str) -> bool {
        family == CF_EDGE_SIGNAL || family == CF_OUT_VERTEX || family == CF_IN_VERTEX
    }

    fn accumulate(&self, state: &mut EdgeState, entry: &ColumnEntry, _codec: &dyn ValueCodec) -> Result<()> {
        let qualifier = entry.qualifier.clone();
        match entry.family.as_str() {
            CF_EDGE_SIGNAL => state.label = Some(qualifier),
            CF_OUT_VERTEX => state.out_vertex_id = Some(qualifier.into()),
            CF_IN_VERTEX => state.in_vertex_id = Some(qualifier.into()),
            _ => {}
        }
        Ok(())
    }

    fn finish(&self, element: Element, state: EdgeState) -> Result<Edge> {
        let missing = |what: &str| Error::StorageError(format!("edge {} row has no {what} column", element.id()));
        let label = state.label.ok_or_else(|| missing("label"))?;
        let out_vertex_id = state.out_vertex_id.ok_or_else(|| missing("out-vertex"))?;
        let in_vertex_id = state.in_vertex_id.ok_or_else(|| missing("in-vertex"))?;
        Ok(Edge::new(element, out_vertex_id, in_vertex_id, label))
    }
}

// ============================================================================
// RowDecoder
// ============================================================================

struct PendingProperty {
    name: String,
    key: String,
    value: Value,
    visibility: Visibility,
}

/// Decodes rows of one element kind for one caller.
pub struct RowDecoder<'a, K: ElementKind> {
    kind: K,
    codec: &'a dyn ValueCodec,
    authorizations: &'a Authorizations,
    large_values: Option<Arc<dyn LargeValueStore>>,
}

impl<'a, K: ElementKind> RowDecoder<'a, K> {
    pub fn new(kind: K, codec: &'a dyn ValueCodec, authorizations: &'a Authorizations) -> Self {
        Self {
            kind,
            codec,
            authorizations,
            large_values: None,
        }
    }

    /// Store used to bind large-value references found in property columns.
    pub fn with_large_values(mut self, store: Option<Arc<dyn LargeValueStore>>) -> Self {
        self.large_values = store;
        self
    }

    /// Decode one row.
    ///
    /// `Ok(None)` means the row is not a live element this caller can see:
    /// it is tombstoned, empty, or its existence signal was absent or
    /// unreadable. Malformed columns are errors, never `None`.
    pub fn decode<I>(&self, row: I) -> Result<Option<K::Output>>
    where
        I: IntoIterator,
        I::Item: Borrow<ColumnEntry>,
    {
        let mut row_key: Option<String> = None;
        let mut id: Option<ElementId> = None;
        let mut visibility: Option<Visibility> = None;
        let mut values: HashMap<JoinKey, PendingProperty> = HashMap::new();
        let mut metadata: HashMap<JoinKey, Metadata> = HashMap::new();
        let mut state = K::State::default();

        for entry in row {
            let entry: &ColumnEntry = entry.borrow();

            match &row_key {
                None => {
                    id = Some(self.id_from_row_key(&entry.row)?);
                    row_key = Some(entry.row.clone());
                }
                Some(expected) if *expected != entry.row => {
                    return Err(Error::StorageError(format!(
                        "column for row {:?} found while decoding row {expected:?}",
                        entry.row
                    )));
                }
                Some(_) => {}
            }

            if entry.is_tombstone() {
                tracing::trace!(row = %entry.row, "row is tombstoned");
                return Ok(None);
            }

            let column_visibility = Visibility::from_column(&entry.visibility);
            if !self.authorizations.can_read(&column_visibility)? {
                tracing::trace!(row = %entry.row, family = %entry.family, "skipping unreadable column");
                continue;
            }

            match entry.family.as_str() {
                CF_PROPERTY => {
                    let (name, key) = split_qualifier(&entry.qualifier)?;
                    let value = self.decode_value(&entry.value)?;
                    values.insert(
                        join_key(&entry.qualifier, &column_visibility),
                        PendingProperty {
                            name: name.to_string(),
                            key: key.to_string(),
                            value,
                            visibility: column_visibility,
                        },
                    );
                }
                CF_PROPERTY_METADATA => {
                    split_qualifier(&entry.qualifier)?;
                    let map = self.decode_metadata(&entry.value)?;
                    metadata.insert(join_key(&entry.qualifier, &column_visibility), map);
                }
                family => {
                    if family == self.kind.signal_family() {
                        visibility = Some(column_visibility);
                    }
                    if self.kind.accepts(family) {
                        self.kind.accumulate(&mut state, entry, self.codec)?;
                    } else {
                        tracing::trace!(row = %entry.row, family, "ignoring unknown column family");
                    }
                }
            }
        }

        let Some(id) = id else {
            return Ok(None);
        };
        let Some(visibility) = visibility else {
            tracing::debug!(%id, kind = %self.kind.element_type(), "row has no readable existence signal");
            return Ok(None);
        };

        let mut properties = Vec::with_capacity(values.len());
        for (join, pending) in values {
            let meta = metadata.remove(&join).unwrap_or_default();
            properties.push(Property::new(pending.key, pending.name, pending.value, meta, pending.visibility));
        }
        for (qualifier, visibility) in metadata.keys() {
            tracing::debug!(%id, %qualifier, %visibility, "metadata without a matching property value");
        }

        let element = Element::new(id, visibility, properties);
        self.kind.finish(element, state).map(Some)
    }

    fn id_from_row_key(&self, row_key: &str) -> Result<ElementId> {
        row_key
            .strip_prefix(self.kind.row_key_prefix())
            .map(ElementId::from)
            .ok_or_else(|| Error::UnknownRowKeyPrefix {
                element_type: self.kind.element_type(),
                row_key: row_key.to_string(),
            })
    }

    fn decode_value(&self, bytes: &[u8]) -> Result<Value> {
        match self.codec.decode(bytes)? {
            Value::LargeValueRef(r) => match &self.large_values {
                Some(store) => Ok(Value::LargeValueRef(r.bind(store.clone()))),
                None => Err(Error::StorageError(format!(
                    "large value {} found but no large-value store is configured",
                    r.locator()
                ))),
            },
            other => Ok(other),
        }
    }

    fn decode_metadata(&self, bytes: &[u8]) -> Result<Metadata> {
        if bytes.is_empty() {
            return Ok(Metadata::new());
        }
        match self.codec.decode(bytes)? {
            Value::Map(m) => Ok(m),
            other => Err(Error::InvalidMetadata {
                found: other.type_name().to_string(),
            }),
        }
    }
}

fn split_qualifier(qualifier: &str) -> Result<(&str, &str)> {
    split_property_qualifier(qualifier).ok_or_else(|| Error::InvalidPropertyColumn(qualifier.to_string()))
}

/// Value and metadata cells pair up on byte-identical qualifier and visibility.
type JoinKey = (String, String);

fn join_key(qualifier: &str, visibility: &Visibility) -> JoinKey {
    (qualifier.to_string(), visibility.as_str().to_string())
}

// ============================================================================
// Row grouping
// ============================================================================

/// Splits a sorted multi-row column stream into one batch per row.
pub struct RowGroups<I: Iterator<Item = ColumnEntry>> {
    inner: Peekable<I>,
}

impl<I: Iterator<Item = ColumnEntry>> Iterator for RowGroups<I> {
    type Item = Vec<ColumnEntry>;

    fn next(&mut self) -> Option<Vec<ColumnEntry>> {
        let first = self.inner.next()?;
        let mut row = vec![first];
        while let Some(next) = self.inner.next_if(|e| e.row == row[0].row) {
            row.push(next);
        }
        Some(row)
    }
}

pub fn group_rows<I: IntoIterator<Item = ColumnEntry>>(entries: I) -> RowGroups<I::IntoIter> {
    RowGroups {
        inner: entries.into_iter().peekable(),
    }
}

impl<'a, K: ElementKind> RowDecoder<'a, K> {
    /// Decode every row of a sorted stream, dropping absent ones.
    pub fn decode_all<I: IntoIterator<Item = ColumnEntry>>(&self, entries: I) -> Result<Vec<K::Output>> {
        let mut out = Vec::new();
        for row in group_rows(entries) {
            if let Some(element) = self.decode(&row)? {
                out.push(element);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::codec::JsonValueCodec;
    use bytes::Bytes;
    use pretty_assertions::assert_eq;

    fn enc(v: Value) -> Bytes {
        JsonValueCodec.encode(&v).unwrap()
    }

    fn signal(row: &str, vis: &str) -> ColumnEntry {
        ColumnEntry::new(row, CF_VERTEX_SIGNAL, "", vis, Bytes::new())
    }

    fn prop(row: &str, name: &str, key: &str, vis: &str, v: Value) -> ColumnEntry {
        ColumnEntry::new(row, CF_PROPERTY, property_qualifier(name, key), vis, enc(v))
    }

    fn meta(row: &str, name: &str, key: &str, vis: &str, bytes: Bytes) -> ColumnEntry {
        ColumnEntry::new(row, CF_PROPERTY_METADATA, property_qualifier(name, key), vis, bytes)
    }

    fn decode_vertex(row: &[ColumnEntry], auths: &Authorizations) -> Result<Option<Vertex>> {
        RowDecoder::new(VertexKind, &JsonValueCodec, auths).decode(row)
    }

    #[test]
    fn test_vertex_with_metadata() {
        let mut m = HashMap::new();
        m.insert("lang".to_string(), Value::from("en"));
        let row = vec![
            signal("Vv1", ""),
            prop("Vv1", "title", "id1", "", Value::from("Hello")),
            meta("Vv1", "title", "id1", "", enc(Value::Map(m.clone()))),
        ];
        let v = decode_vertex(&row, &Authorizations::none()).unwrap().unwrap();
        assert_eq!(v.id(), &ElementId::from("v1"));
        assert_eq!(v.property_count(), 1);
        let p = v.properties_named("title").next().unwrap();
        assert_eq!(p.key(), "id1");
        assert_eq!(p.metadata(), &m);
    }

    #[test]
    fn test_interleaved_order() {
        let mut m = HashMap::new();
        m.insert("lang".to_string(), Value::from("en"));
        let row = vec![
            meta("Vv1", "title", "id1", "", enc(Value::Map(m.clone()))),
            prop("Vv1", "title", "id1", "", Value::from("Hello")),
            signal("Vv1", ""),
        ];
        let v = decode_vertex(&row, &Authorizations::none()).unwrap().unwrap();
        assert_eq!(v.property_value("title"), Some(&Value::from("Hello")));
        assert_eq!(v.properties().next().unwrap().metadata(), &m);
    }

    #[test]
    fn test_tombstone_wins() {
        let row = vec![
            signal("Vv1", ""),
            prop("Vv1", "name", "", "", Value::from("x")),
            ColumnEntry::tombstone("Vv1"),
        ];
        assert!(decode_vertex(&row, &Authorizations::none()).unwrap().is_none());
    }

    #[test]
    fn test_tombstone_honored_when_unreadable() {
        let mut tomb = ColumnEntry::tombstone("Vv1");
        tomb.visibility = "admin".into();
        let row = vec![signal("Vv1", ""), tomb];
        assert!(decode_vertex(&row, &Authorizations::none()).unwrap().is_none());
    }

    #[test]
    fn test_missing_signal_is_absent() {
        let row = vec![prop("Vv1", "name", "", "", Value::from("x"))];
        assert!(decode_vertex(&row, &Authorizations::none()).unwrap().is_none());
    }

    #[test]
    fn test_unreadable_signal_is_absent() {
        let row = vec![signal("Vv1", "secret"), prop("Vv1", "name", "", "", Value::from("x"))];
        assert!(decode_vertex(&row, &Authorizations::none()).unwrap().is_none());
        let v = decode_vertex(&row, &Authorizations::new(["secret"])).unwrap().unwrap();
        assert_eq!(v.visibility().as_str(), "secret");
    }

    #[test]
    fn test_empty_row_is_absent() {
        assert!(decode_vertex(&[], &Authorizations::none()).unwrap().is_none());
    }

    #[test]
    fn test_unreadable_property_hidden() {
        let row = vec![
            signal("Vv1", ""),
            prop("Vv1", "public", "", "", Value::from("a")),
            prop("Vv1", "private", "", "secret", Value::from("b")),
        ];
        let v = decode_vertex(&row, &Authorizations::none()).unwrap().unwrap();
        assert!(v.has_property("public"));
        assert!(!v.has_property("private"));
    }

    #[test]
    fn test_multi_valued_instances_survive() {
        let row = vec![
            signal("Vv1", ""),
            prop("Vv1", "name", "", "", Value::from("a")),
            prop("Vv1", "name", "k2", "", Value::from("b")),
            prop("Vv1", "name", "", "x", Value::from("c")),
        ];
        let v = decode_vertex(&row, &Authorizations::new(["x"])).unwrap().unwrap();
        assert_eq!(v.properties_named("name").count(), 3);
    }

    #[test]
    fn test_colons_in_key_and_visibility_stay_distinct() {
        let row = vec![
            signal("Vv1", ""),
            prop("Vv1", "n", "k", "x:y", Value::from("first")),
            prop("Vv1", "n", "k:x", "y", Value::from("second")),
            meta("Vv1", "n", "k:x", "y", Bytes::new()),
        ];
        let v = decode_vertex(&row, &Authorizations::new(["x:y", "y"])).unwrap().unwrap();
        let mut found: Vec<_> = v
            .properties_named("n")
            .map(|p| (p.key().to_string(), p.visibility().as_str().to_string(), p.value().clone()))
            .collect();
        found.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            found,
            vec![
                ("k".to_string(), "x:y".to_string(), Value::from("first")),
                ("k:x".to_string(), "y".to_string(), Value::from("second")),
            ]
        );
    }

    #[test]
    fn test_metadata_join_requires_identical_visibility() {
        let mut m = HashMap::new();
        m.insert("lang".to_string(), Value::from("en"));
        let row = vec![
            signal("Vv1", ""),
            prop("Vv1", "title", "id1", "a", Value::from("Hello")),
            meta("Vv1", "title", "id1", "b", enc(Value::Map(m))),
        ];
        let v = decode_vertex(&row, &Authorizations::new(["a", "b"])).unwrap().unwrap();
        assert!(v.properties().next().unwrap().metadata().is_empty());
    }

    #[test]
    fn test_bracketed_column_visibility() {
        let row = vec![signal("Vv1", "[a]"), prop("Vv1", "n", "", "[a]", Value::from("x"))];
        let v = decode_vertex(&row, &Authorizations::new(["a"])).unwrap().unwrap();
        assert_eq!(v.visibility().as_str(), "a");
        assert_eq!(v.properties().next().unwrap().visibility().as_str(), "a");
    }

    #[test]
    fn test_zero_length_metadata_is_empty_map() {
        let row = vec![
            signal("Vv1", ""),
            prop("Vv1", "n", "", "", Value::from("x")),
            meta("Vv1", "n", "", "", Bytes::new()),
        ];
        let v = decode_vertex(&row, &Authorizations::none()).unwrap().unwrap();
        assert!(v.properties().next().unwrap().metadata().is_empty());
    }

    #[test]
    fn test_non_map_metadata_is_error() {
        let row = vec![
            signal("Vv1", ""),
            meta("Vv1", "n", "", "", enc(Value::from("not a map"))),
        ];
        let err = decode_vertex(&row, &Authorizations::none()).unwrap_err();
        assert!(matches!(err, Error::InvalidMetadata { .. }));
    }

    #[test]
    fn test_qualifier_without_separator_is_error() {
        let row = vec![
            signal("Vv1", ""),
            ColumnEntry::new("Vv1", CF_PROPERTY, "name", "", enc(Value::from("x"))),
        ];
        let err = decode_vertex(&row, &Authorizations::none()).unwrap_err();
        assert!(matches!(err, Error::InvalidPropertyColumn(q) if q == "name"));
    }

    #[test]
    fn test_unknown_row_prefix_is_error() {
        let row = vec![ColumnEntry::new("Xv1", CF_VERTEX_SIGNAL, "", "", Bytes::new())];
        let err = decode_vertex(&row, &Authorizations::none()).unwrap_err();
        assert!(matches!(err, Error::UnknownRowKeyPrefix { element_type: ElementType::Vertex, .. }));
    }

    #[test]
    fn test_malformed_column_visibility_is_error() {
        let row = vec![signal("Vv1", "a&b|c")];
        let err = decode_vertex(&row, &Authorizations::new(["a"])).unwrap_err();
        assert!(matches!(err, Error::VisibilityParse(_)));
    }

    #[test]
    fn test_vertex_adjacency() {
        let row = vec![
            signal("Vv1", ""),
            ColumnEntry::new("Vv1", CF_OUT_EDGE, "e1", "", enc(EdgeInfo::new("knows", "v2").to_value())),
            ColumnEntry::new("Vv1", CF_IN_EDGE, "e2", "hidden", enc(EdgeInfo::new("knows", "v3").to_value())),
        ];
        let v = decode_vertex(&row, &Authorizations::none()).unwrap().unwrap();
        assert_eq!(v.out_edges().len(), 1);
        assert!(v.in_edges().is_empty());
        assert_eq!(v.out_edges()[&ElementId::from("e1")].vertex_id, ElementId::from("v2"));
    }

    #[test]
    fn test_edge_row() {
        let row = vec![
            ColumnEntry::new("Ee1", CF_EDGE_SIGNAL, "knows", "", Bytes::new()),
            ColumnEntry::new("Ee1", CF_OUT_VERTEX, "v1", "", Bytes::new()),
            ColumnEntry::new("Ee1", CF_IN_VERTEX, "v2", "", Bytes::new()),
            prop("Ee1", "since", "", "", Value::Int(2020)),
        ];
        let auths = Authorizations::none();
        let e = RowDecoder::new(EdgeKind, &JsonValueCodec, &auths).decode(&row).unwrap().unwrap();
        assert_eq!(e.label(), "knows");
        assert_eq!(e.out_vertex_id(), &ElementId::from("v1"));
        assert_eq!(e.in_vertex_id(), &ElementId::from("v2"));
        assert_eq!(e.property_value("since"), Some(&Value::Int(2020)));
    }

    #[test]
    fn test_edge_row_missing_endpoint_is_error() {
        let row = vec![
            ColumnEntry::new("Ee1", CF_EDGE_SIGNAL, "knows", "", Bytes::new()),
            ColumnEntry::new("Ee1", CF_OUT_VERTEX, "v1", "", Bytes::new()),
        ];
        let auths = Authorizations::none();
        assert!(RowDecoder::new(EdgeKind, &JsonValueCodec, &auths).decode(&row).is_err());
    }

    #[test]
    fn test_large_value_without_store_is_error() {
        let row = vec![
            signal("Vv1", ""),
            prop("Vv1", "blob", "", "", Value::LargeValueRef(LargeValueRef::new("l1", 10))),
        ];
        assert!(decode_vertex(&row, &Authorizations::none()).is_err());
    }

    #[test]
    fn test_mixed_rows_rejected() {
        let row = vec![signal("Vv1", ""), signal("Vv2", "")];
        assert!(decode_vertex(&row, &Authorizations::none()).is_err());
    }

    #[test]
    fn test_decode_all_groups_rows() {
        let entries = vec![
            signal("Vv1", ""),
            prop("Vv1", "n", "", "", Value::from("a")),
            prop("Vv2", "n", "", "", Value::from("orphan")),
            signal("Vv3", ""),
        ];
        let auths = Authorizations::none();
        let decoded = RowDecoder::new(VertexKind, &JsonValueCodec, &auths).decode_all(entries).unwrap();
        let ids: Vec<&str> = decoded.iter().map(|v| v.id().as_str()).collect();
        assert_eq!(ids, vec!["v1", "v3"]);
    }
}
