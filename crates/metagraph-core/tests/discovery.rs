use metagraph_core::graph::EntityGraph;
use metagraph_core::providers::ProviderCache;
use metagraph_core::registry::StructuralRule;
use metagraph_core::schema::{MemberDescriptor, Schema, TypeDescriptor};
use std::sync::Arc;

fn id() -> MemberDescriptor {
    MemberDescriptor::new("Id", "i32").key()
}

fn shop() -> Schema {
    Schema::new([
        TypeDescriptor::class("Customer")
            .member(id())
            .member(MemberDescriptor::new("Orders", "OrderList"))
            .member(MemberDescriptor::new("Address", "Address"))
            .member(MemberDescriptor::new("Vault", "Vault"))
            .member(MemberDescriptor::new("Audit", "AuditLog").excluded()),
        TypeDescriptor::collection("OrderList", "Order"),
        TypeDescriptor::class("Order")
            .member(id())
            .member(MemberDescriptor::new("Note", "MaybeNote")),
        TypeDescriptor::nullable("MaybeNote", "Note"),
        TypeDescriptor::class("Note").member(id()),
        TypeDescriptor::class("Address").member(MemberDescriptor::new("Street", "string")),
        TypeDescriptor::class("Vault").hidden().member(id()),
        TypeDescriptor::class("AuditLog").member(id()),
    ])
    .unwrap()
}

#[test]
fn test_discovery_reaches_fixpoint_through_collections() {
    let mut graph = EntityGraph::new(shop(), Arc::new(ProviderCache::new())).with_roots(["Customer"]);
    graph.initialize().unwrap();

    let names: Vec<_> = graph
        .entity_types()
        .unwrap()
        .iter()
        .map(|n| n.name.clone())
        .collect();
    // Address has no key; Note sits behind a nullable wrapper; AuditLog is only
    // reachable through an excluded member.
    assert_eq!(names, vec!["Customer", "Order"]);
}

#[test]
fn test_hidden_candidate_is_skipped_with_diagnostic() {
    let mut graph = EntityGraph::new(shop(), Arc::new(ProviderCache::new())).with_roots(["Customer"]);
    graph.initialize().unwrap();

    let diagnostics = graph.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].type_name, "Vault");
    assert_eq!(diagnostics[0].rule, StructuralRule::NotVisible);
    assert!(diagnostics[0].to_string().contains("not visible"));
}

#[test]
fn test_invalid_roots_become_diagnostics() {
    let mut graph = EntityGraph::new(shop(), Arc::new(ProviderCache::new()))
        .with_roots(["OrderList", "MaybeNote", "string", "Customer"]);
    graph.initialize().unwrap();

    let rules: Vec<_> = graph.diagnostics().iter().map(|d| d.rule).collect();
    assert_eq!(
        rules,
        vec![
            StructuralRule::Collection,
            StructuralRule::NullableWrapper,
            StructuralRule::Primitive,
            StructuralRule::NotVisible,
        ]
    );
    assert_eq!(graph.entity_types().unwrap().len(), 2);
}

#[test]
fn test_graphs_share_provider_cache() {
    let schema = Schema::new([
        TypeDescriptor::class("Order")
            .entity()
            .metadata("OrderMetadata")
            .member(id()),
        TypeDescriptor::class("OrderMetadata").member(MemberDescriptor::new("Id", "i32")),
    ])
    .unwrap();
    let cache = Arc::new(ProviderCache::new());

    let mut first = EntityGraph::new(schema.clone(), Arc::clone(&cache)).with_roots(["Order"]);
    let mut second = EntityGraph::new(schema, Arc::clone(&cache)).with_roots(["Order"]);
    first.initialize().unwrap();
    second.initialize().unwrap();

    assert_eq!(cache.len(), 1);
    assert_eq!(cache.providers_for("Order"), vec!["OrderMetadata"]);
}

#[test]
fn test_metadata_provider_supplies_key() {
    let schema = Schema::new([
        TypeDescriptor::class("Product")
            .metadata("ProductMetadata")
            .member(MemberDescriptor::new("Sku", "string")),
        TypeDescriptor::class("ProductMetadata").member(MemberDescriptor::new("Sku", "string").key()),
        TypeDescriptor::class("Catalog")
            .member(id())
            .member(MemberDescriptor::new("Products", "Product").many()),
    ])
    .unwrap();
    let mut graph = EntityGraph::new(schema, Arc::new(ProviderCache::new())).with_roots(["Catalog"]);
    graph.initialize().unwrap();

    let keys: Vec<_> = graph
        .key_members("Product")
        .unwrap()
        .iter()
        .map(|m| m.name.clone())
        .collect();
    assert_eq!(keys, vec!["Sku"]);
}

#[test]
fn test_discovery_unwraps_collection_of_collection_type() {
    let schema = Schema::new([
        TypeDescriptor::class("Customer")
            .member(id())
            .member(MemberDescriptor::new("Orders", "OrderList").many()),
        TypeDescriptor::collection("OrderList", "Order"),
        TypeDescriptor::class("Order").member(id()),
    ])
    .unwrap();
    let mut graph = EntityGraph::new(schema, Arc::new(ProviderCache::new())).with_roots(["Customer"]);
    graph.initialize().unwrap();

    let names: Vec<_> = graph
        .entity_types()
        .unwrap()
        .iter()
        .map(|n| n.name.clone())
        .collect();
    assert_eq!(names, vec!["Customer", "Order"]);
    assert!(graph.diagnostics().is_empty());
}
