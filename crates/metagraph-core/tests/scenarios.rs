use metagraph_core::error::{GraphError, ValidationError};
use metagraph_core::graph::EntityGraph;
use metagraph_core::model::{AssociationSpec, PropertyRef};
use metagraph_core::providers::ProviderCache;
use metagraph_core::schema::{MemberDescriptor, Schema, TypeDescriptor};
use std::sync::Arc;

fn graph(types: Vec<TypeDescriptor>, roots: &[&str]) -> EntityGraph<Schema> {
    let schema = Schema::new(types).unwrap();
    EntityGraph::new(schema, Arc::new(ProviderCache::new())).with_roots(roots.iter().copied())
}

fn names(nodes: &[&metagraph_core::registry::TypeNode]) -> Vec<String> {
    nodes.iter().map(|n| n.name.clone()).collect()
}

fn order_schema(line_item_fk: bool, order_fk: bool) -> Vec<TypeDescriptor> {
    let mut order_side = AssociationSpec::new("LineItems", ["Id"], ["OrderId"]);
    order_side.foreign_key = order_fk;
    let mut item_side = AssociationSpec::new("LineItems", ["OrderId"], ["Id"]);
    item_side.foreign_key = line_item_fk;
    vec![
        TypeDescriptor::class("Order")
            .entity()
            .member(MemberDescriptor::new("Id", "i32").key())
            .member(
                MemberDescriptor::new("LineItems", "LineItem")
                    .many()
                    .composition()
                    .association(order_side),
            ),
        TypeDescriptor::class("LineItem")
            .entity()
            .member(MemberDescriptor::new("Id", "i32").key())
            .member(MemberDescriptor::new("OrderId", "i32"))
            .member(MemberDescriptor::new("Order", "Order").association(item_side)),
    ]
}

#[test]
fn test_abstract_root_with_known_derived_type() {
    let mut g = graph(
        vec![
            TypeDescriptor::class("Base")
                .abstract_type()
                .known_type("Derived")
                .member(MemberDescriptor::new("Id", "i32").key()),
            TypeDescriptor::class("Derived").base("Base"),
        ],
        &["Base"],
    );
    g.initialize().unwrap();

    assert_eq!(names(&g.entity_types().unwrap()), vec!["Base", "Derived"]);
    let closure: Vec<_> = g.known_types("Base").unwrap().iter().cloned().collect();
    assert_eq!(closure, vec!["Derived"]);
    assert!(g.known_types("Derived").unwrap().is_empty());
    assert_eq!(g.root_entity_type("Derived").unwrap().name, "Base");
    assert_eq!(g.entity_base_type("Derived").unwrap().unwrap().name, "Base");
    assert!(g.entity_base_type("Base").unwrap().is_none());
    assert_eq!(names(&g.entity_derived_types("Base").unwrap()), vec!["Derived"]);
}

#[test]
fn test_order_line_items_pair_passes() {
    let mut g = graph(order_schema(true, false), &["Order"]);
    g.initialize().unwrap();

    assert_eq!(names(&g.entity_types().unwrap()), vec!["Order", "LineItem"]);
    assert_eq!(
        g.parent_associations("LineItem").unwrap(),
        &[PropertyRef {
            owner: "Order".to_string(),
            name: "LineItems".to_string(),
        }]
    );
    assert!(g.parent_associations("Order").unwrap().is_empty());
}

#[test]
fn test_order_line_items_both_foreign_key_conflict() {
    let mut g = graph(order_schema(true, true), &["Order"]);
    let err = g.initialize().unwrap_err();

    let GraphError::Validation(inner) = &err else {
        panic!("expected validation error, got {err:?}");
    };
    assert!(matches!(
        inner,
        ValidationError::ForeignKeyConflict { both: true, .. }
    ));
    let msg = err.to_string();
    assert!(msg.contains("association FK conflict"), "{msg}");
    assert!(msg.contains("'LineItems'"), "{msg}");
}

#[test]
fn test_key_presence_across_three_levels() {
    let mut g = graph(
        vec![
            TypeDescriptor::class("Base")
                .entity()
                .known_type("Mid")
                .known_type("Leaf")
                .member(MemberDescriptor::new("Id", "i32").key()),
            TypeDescriptor::class("Mid").base("Base"),
            TypeDescriptor::class("Leaf")
                .base("Mid")
                .member(MemberDescriptor::new("Code", "string").key()),
        ],
        &["Base"],
    );
    g.initialize().unwrap();

    let keys = |ty: &str| -> Vec<String> {
        g.key_members(ty)
            .unwrap()
            .iter()
            .map(|m| m.name.clone())
            .collect()
    };
    assert_eq!(keys("Base"), vec!["Id"]);
    assert!(keys("Mid").is_empty());
    assert_eq!(keys("Leaf"), vec!["Code"]);
}
