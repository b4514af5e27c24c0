use metagraph_core::error::SchemaError;
use metagraph_core::graph::EntityGraph;
use metagraph_core::providers::ProviderCache;
use metagraph_core::schema::Schema;
use metagraph_core::view::GraphView;
use std::sync::Arc;

const ORDERS: &str = r#"{
  "version": "1",
  "types": [
    { "name": "Order", "entity": true, "data_contract": true,
      "metadata": "OrderMetadata",
      "members": [
        { "name": "Id", "type": "i32" },
        { "name": "RowVersion", "type": "bytes", "timestamp": true, "concurrency_check": true },
        { "name": "LineItems", "type": "LineItem", "collection": true,
          "composition": true,
          "association": { "name": "LineItems", "this_key": ["Id"],
                           "other_key": ["OrderId"], "foreign_key": false } }
      ] },
    { "name": "OrderMetadata",
      "members": [ { "name": "Id", "type": "i32", "key": true } ] },
    { "name": "LineItem", "data_contract": true, "known_types": ["GiftItem"],
      "members": [
        { "name": "Id", "type": "i32", "key": true },
        { "name": "OrderId", "type": "i32" },
        { "name": "Order", "type": "Order",
          "association": { "name": "LineItems", "this_key": ["OrderId"],
                           "other_key": ["Id"], "foreign_key": true } },
        { "name": "Price", "type": "decimal", "modifier": "virtual" }
      ] },
    { "name": "GiftItem", "base": "LineItem", "data_contract": true,
      "members": [
        { "name": "Price", "type": "decimal", "modifier": "override" },
        { "name": "Message", "type": "MaybeText" }
      ] },
    { "name": "MaybeText", "kind": "nullable", "inner": "string" }
  ]
}"#;

#[test]
fn test_load_schema_file_and_build() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("orders.json");
    std::fs::write(&path, ORDERS).unwrap();

    let schema = Schema::load(&path).unwrap();
    let mut graph = EntityGraph::new(schema, Arc::new(ProviderCache::new())).with_roots(["Order"]);
    graph.initialize().unwrap();

    let names: Vec<_> = graph
        .entity_types()
        .unwrap()
        .iter()
        .map(|n| n.name.clone())
        .collect();
    assert_eq!(names, vec!["Order", "LineItem", "GiftItem"]);
    let gift_parents = graph.parent_associations("GiftItem").unwrap();
    assert_eq!(gift_parents.len(), 1);
    assert_eq!(gift_parents[0].to_string(), "Order.LineItems");
}

#[test]
fn test_export_view_roundtrip() {
    let tmp = tempfile::tempdir().unwrap();
    let schema = Schema::from_json(ORDERS).unwrap();
    let mut graph = EntityGraph::new(schema, Arc::new(ProviderCache::new())).with_roots(["Order"]);
    graph.initialize().unwrap();

    let view = graph.view().unwrap();
    let out = tmp.path().join("out").join("graph.json");
    view.save(&out, true).unwrap();
    let loaded = GraphView::load(&out).unwrap();
    assert_eq!(loaded, view);

    let order = loaded.entity("Order").unwrap();
    assert_eq!(order.keys, vec!["Id"]);
    assert_eq!(order.metadata_provider.as_deref(), Some("OrderMetadata"));
    let line = loaded.entity("LineItem").unwrap();
    assert_eq!(line.known_types, vec!["GiftItem"]);
    assert_eq!(line.derived, vec!["GiftItem"]);
    let gift = loaded.entity("GiftItem").unwrap();
    assert_eq!(gift.root, "LineItem");
    assert_eq!(gift.base.as_deref(), Some("LineItem"));
    assert!(gift.keys.is_empty());
}

#[test]
fn test_schema_document_roundtrip() {
    let schema = Schema::from_json(ORDERS).unwrap();
    let json = schema.to_json().unwrap();
    let reparsed = Schema::from_json(&json).unwrap();
    assert_eq!(reparsed.to_document().types, schema.to_document().types);
}

#[test]
fn test_rejects_wrong_version() {
    let json = ORDERS.replacen(r#""version": "1""#, r#""version": "2""#, 1);
    let err = Schema::from_json(&json).unwrap_err();
    assert!(matches!(
        err,
        SchemaError::VersionMismatch { ref found, .. } if found == "2"
    ));
}

#[test]
fn test_load_reports_path_on_bad_json() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("broken.json");
    std::fs::write(&path, "{ \"version\": ").unwrap();

    let err = Schema::load(&path).unwrap_err();
    assert!(format!("{err:#}").contains("broken.json"));
}
