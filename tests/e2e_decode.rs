//! End-to-end tests for element reconstruction.
//!
//! Raw cells are written straight into a MemoryBackend, then read back
//! through `Graph` so the decoder sees exactly what a real column store
//! would hand it.

use std::collections::HashMap;

use bytes::Bytes;
use cellgraph::storage::columns::*;
use cellgraph::storage::{ColumnEntry, ColumnOp, JsonValueCodec, ValueCodec};
use cellgraph::{
    Authorizations, ElementId, ElementMutation, Graph, MemoryBackend, StorageBackend, Value, Visibility,
};
use pretty_assertions::assert_eq;

fn enc(v: Value) -> Bytes {
    JsonValueCodec.encode(&v).unwrap()
}

async fn write_raw(graph: &Graph<MemoryBackend>, entries: Vec<ColumnEntry>) {
    graph
        .backend()
        .write(entries.into_iter().map(ColumnOp::Put).collect())
        .await
        .unwrap();
    graph.flush().await.unwrap();
}

// ============================================================================
// 1. The worked example: one property with metadata, no tokens held
// ============================================================================

#[tokio::test]
async fn test_vertex_with_property_metadata() {
    let graph = Graph::open_memory().await.unwrap();
    let mut meta = HashMap::new();
    meta.insert("lang".to_string(), Value::from("en"));
    write_raw(
        &graph,
        vec![
            ColumnEntry::new("Vv1", CF_VERTEX_SIGNAL, "", "", Bytes::new()),
            ColumnEntry::new("Vv1", CF_PROPERTY, property_qualifier("title", "id1"), "", enc(Value::from("Hello"))),
            ColumnEntry::new("Vv1", CF_PROPERTY_METADATA, property_qualifier("title", "id1"), "", enc(Value::Map(meta.clone()))),
        ],
    )
    .await;

    let v = graph
        .get_vertex(&ElementId::from("v1"), &Authorizations::none())
        .await
        .unwrap()
        .unwrap();
    let props: Vec<_> = v.properties().collect();
    assert_eq!(props.len(), 1);
    assert_eq!(props[0].name(), "title");
    assert_eq!(props[0].key(), "id1");
    assert_eq!(props[0].metadata(), &meta);
}

// ============================================================================
// 2. Existence and tombstones
// ============================================================================

#[tokio::test]
async fn test_tombstone_hides_live_columns() {
    let graph = Graph::open_memory().await.unwrap();
    let mut tombstone = ColumnEntry::tombstone("Vv1");
    tombstone.visibility = "admin".into();
    write_raw(
        &graph,
        vec![
            ColumnEntry::new("Vv1", CF_VERTEX_SIGNAL, "", "", Bytes::new()),
            ColumnEntry::new("Vv1", CF_PROPERTY, property_qualifier("name", ""), "", enc(Value::from("x"))),
            tombstone,
        ],
    )
    .await;

    for auths in [Authorizations::none(), Authorizations::new(["admin"])] {
        assert!(graph.get_vertex(&"v1".into(), &auths).await.unwrap().is_none());
    }
    assert!(graph.vertices(&Authorizations::none()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_row_without_signal_is_absent() {
    let graph = Graph::open_memory().await.unwrap();
    write_raw(
        &graph,
        vec![ColumnEntry::new("Vv1", CF_PROPERTY, property_qualifier("name", ""), "", enc(Value::from("x")))],
    )
    .await;
    assert!(graph.get_vertex(&"v1".into(), &Authorizations::none()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_unreadable_element_is_absent() {
    let graph = Graph::open_memory().await.unwrap();
    graph
        .prepare_vertex(Some("v1".into()), Visibility::new("a&b"))
        .set_property("name", "x", Visibility::empty())
        .save(&graph)
        .await
        .unwrap();

    assert!(graph.get_vertex(&"v1".into(), &Authorizations::new(["a"])).await.unwrap().is_none());
    assert!(graph.get_vertex(&"v1".into(), &Authorizations::new(["a", "b"])).await.unwrap().is_some());
}

// ============================================================================
// 3. Cell-level filtering and multi-valued properties
// ============================================================================

#[tokio::test]
async fn test_cell_level_property_filtering() {
    let graph = Graph::open_memory().await.unwrap();
    graph
        .prepare_vertex(Some("v1".into()), Visibility::empty())
        .set_property("name", "Ada", Visibility::empty())
        .set_property("salary", 100, Visibility::new("hr"))
        .set_property("ssn", "123", Visibility::new("hr&pii"))
        .save(&graph)
        .await
        .unwrap();

    let names = |v: &cellgraph::Vertex| {
        let mut n: Vec<String> = v.properties().map(|p| p.name().to_string()).collect();
        n.sort();
        n
    };

    let public = graph.get_vertex(&"v1".into(), &Authorizations::none()).await.unwrap().unwrap();
    assert_eq!(names(&public), vec!["name"]);

    let hr = graph.get_vertex(&"v1".into(), &Authorizations::new(["hr"])).await.unwrap().unwrap();
    assert_eq!(names(&hr), vec!["name", "salary"]);

    let all = graph.get_vertex(&"v1".into(), &Authorizations::new(["hr", "pii"])).await.unwrap().unwrap();
    assert_eq!(names(&all), vec!["name", "salary", "ssn"]);
}

#[tokio::test]
async fn test_multi_valued_round_trip() {
    let graph = Graph::open_memory().await.unwrap();
    let mut meta = HashMap::new();
    meta.insert("source".to_string(), Value::from("import"));
    let written = graph
        .prepare_vertex(Some("v1".into()), Visibility::empty())
        .set_property("name", "Ada", Visibility::empty())
        .set_property("name", "Ada L.", Visibility::empty())
        .add_property_value("alt", "name", "Countess", Visibility::empty())
        .set_property_with_metadata("name", "A. Lovelace", meta, Visibility::new("a"))
        .save(&graph)
        .await
        .unwrap();
    assert_eq!(written.properties_named("name").count(), 3);

    let read = graph
        .get_vertex(&"v1".into(), &Authorizations::new(["a"]))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(read, written);
    assert_eq!(read.property("", "name").map(|p| p.value().clone()), Some(Value::from("Ada L.")));
}

// ============================================================================
// 4. Edges and adjacency
// ============================================================================

#[tokio::test]
async fn test_edge_and_adjacency_visibility() {
    let graph = Graph::open_memory().await.unwrap();
    let a = graph.add_vertex(Some("a".into()), Visibility::empty()).await.unwrap();
    let b = graph.add_vertex(Some("b".into()), Visibility::empty()).await.unwrap();
    graph.add_edge(Some("e1".into()), &a, &b, "knows", Visibility::empty()).await.unwrap();
    graph.add_edge(Some("e2".into()), &a, &b, "audits", Visibility::new("sec")).await.unwrap();

    let public = Authorizations::none();
    let a_public = graph.get_vertex(&"a".into(), &public).await.unwrap().unwrap();
    assert_eq!(a_public.edge_ids(cellgraph::Direction::Outgoing, None), vec![ElementId::from("e1")]);
    assert!(graph.get_edge(&"e2".into(), &public).await.unwrap().is_none());

    let sec = Authorizations::new(["sec"]);
    let a_sec = graph.get_vertex(&"a".into(), &sec).await.unwrap().unwrap();
    assert_eq!(a_sec.out_edges().len(), 2);
    let b_sec = graph.get_vertex(&"b".into(), &sec).await.unwrap().unwrap();
    assert_eq!(b_sec.vertex_ids(cellgraph::Direction::Incoming, Some("audits")), vec![ElementId::from("a")]);

    let e2 = graph.get_edge(&"e2".into(), &sec).await.unwrap().unwrap();
    assert_eq!(e2.label(), "audits");
    assert_eq!(e2.out_vertex_id(), &ElementId::from("a"));
    assert_eq!(e2.in_vertex_id(), &ElementId::from("b"));
}

// ============================================================================
// 5. Malformed rows are errors, not absences
// ============================================================================

#[tokio::test]
async fn test_malformed_rows_surface_errors() {
    let graph = Graph::open_memory().await.unwrap();
    write_raw(
        &graph,
        vec![
            ColumnEntry::new("Vbad", CF_VERTEX_SIGNAL, "", "", Bytes::new()),
            ColumnEntry::new("Vbad", CF_PROPERTY_METADATA, property_qualifier("n", ""), "", enc(Value::Int(3))),
            ColumnEntry::new("Vq", CF_VERTEX_SIGNAL, "", "", Bytes::new()),
            ColumnEntry::new("Vq", CF_PROPERTY, "no-separator", "", enc(Value::Int(3))),
        ],
    )
    .await;

    let auths = Authorizations::none();
    assert!(matches!(
        graph.get_vertex(&"bad".into(), &auths).await,
        Err(cellgraph::Error::InvalidMetadata { .. })
    ));
    assert!(matches!(
        graph.get_vertex(&"q".into(), &auths).await,
        Err(cellgraph::Error::InvalidPropertyColumn(_))
    ));
}

// ============================================================================
// 6. Large values
// ============================================================================

#[tokio::test]
async fn test_large_value_round_trip() {
    let config = cellgraph::GraphConfig {
        large_value_threshold: 8,
        ..Default::default()
    };
    let graph = Graph::with_config(MemoryBackend::new(), config).unwrap();
    let payload: Vec<u8> = (0..64u8).collect();
    graph
        .prepare_vertex(Some("v1".into()), Visibility::empty())
        .set_property("blob", payload.clone(), Visibility::empty())
        .set_property("small", vec![1u8, 2], Visibility::empty())
        .save(&graph)
        .await
        .unwrap();

    let v = graph.get_vertex(&"v1".into(), &Authorizations::none()).await.unwrap().unwrap();
    let blob = v.property_value("blob").and_then(Value::as_large_value).unwrap();
    assert_eq!(blob.len(), 64);
    assert!(blob.is_restartable());
    assert_eq!(blob.read_to_vec().unwrap(), payload);
    assert_eq!(blob.read_to_vec().unwrap(), payload);
    assert_eq!(v.property_value("small"), Some(&Value::Bytes(vec![1, 2])));
}
