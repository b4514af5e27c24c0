//! Composition fixup: inherit parent associations down the entity hierarchy.
//!
//! Lists live in an arena. A derived type without parent associations of its
//! own takes its base's slot rather than a copy, so both types resolve to the
//! same list. Lists are only appended to while their owner is being fixed, and
//! an owner is always fixed before any derived type can share its slot, so a
//! shared list never changes after it is shared.

use crate::model::PropertyRef;
use crate::registry::{EntityId, EntityRegistry};
use std::collections::HashSet;
use tracing::debug;

/// Arena index of a composition list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListId(usize);

#[derive(Debug, Clone, Default)]
pub struct CompositionTable {
    lists: Vec<Vec<PropertyRef>>,
    slots: Vec<Option<ListId>>,
}

impl CompositionTable {
    /// Seed lists from the registry's directly discovered parent associations.
    pub fn new(registry: &EntityRegistry) -> Self {
        let mut table = Self::default();
        for node in registry.nodes() {
            let own = registry.own_parent_associations(node.id);
            if own.is_empty() {
                table.slots.push(None);
            } else {
                table.slots.push(Some(ListId(table.lists.len())));
                table.lists.push(own.to_vec());
            }
        }
        table
    }

    /// Seed from the registry and run the fixup over every registered type.
    pub fn build(registry: &EntityRegistry) -> Self {
        let mut table = Self::new(registry);
        table.fixup(registry);
        table
    }

    /// Merge inherited entries into every type, in any order.
    pub fn fixup(&mut self, registry: &EntityRegistry) {
        let mut visited = HashSet::new();
        for node in registry.nodes() {
            self.fix(registry, node.id, &mut visited);
        }
        debug!(
            "composition fixup finished: {} lists over {} types",
            self.lists.len(),
            self.slots.len()
        );
    }

    fn fix(
        &mut self,
        registry: &EntityRegistry,
        id: EntityId,
        visited: &mut HashSet<EntityId>,
    ) -> Option<ListId> {
        if !visited.insert(id) {
            return self.slots[id.index()];
        }

        let name = &registry.node(id).name;
        let Some(base) = registry.entity_base_type(name) else {
            return self.slots[id.index()];
        };
        let Some(inherited) = self.fix(registry, base.id, visited) else {
            return self.slots[id.index()];
        };

        match self.slots[id.index()] {
            None => self.slots[id.index()] = Some(inherited),
            Some(own) if own != inherited => {
                let entries = self.lists[inherited.0].clone();
                let list = &mut self.lists[own.0];
                for entry in entries {
                    if !list.contains(&entry) {
                        list.push(entry);
                    }
                }
            }
            Some(_) => {}
        }
        self.slots[id.index()]
    }

    /// Parent associations of `id`, including inherited ones.
    pub fn parent_associations(&self, id: EntityId) -> &[PropertyRef] {
        self.slots
            .get(id.index())
            .copied()
            .flatten()
            .map(|list| self.lists[list.0].as_slice())
            .unwrap_or_default()
    }

    /// The arena slot backing `id`'s list, if it has one.
    pub fn list_id(&self, id: EntityId) -> Option<ListId> {
        self.slots.get(id.index()).copied().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AssociationSpec;
    use crate::providers::ProviderCache;
    use crate::schema::{MemberDescriptor, Schema, TypeDescriptor};
    use std::sync::Arc;

    fn composed(name: &str, target: &str) -> MemberDescriptor {
        MemberDescriptor::new(name, target)
            .many()
            .composition()
            .association(AssociationSpec::new(name, ["Id"], ["ParentId"]))
    }

    fn schema() -> Schema {
        Schema::new([
            TypeDescriptor::class("Order")
                .member(MemberDescriptor::new("Id", "i32").key())
                .member(composed("Items", "Item")),
            TypeDescriptor::class("Invoice")
                .member(MemberDescriptor::new("Id", "i32").key())
                .member(composed("Special", "SpecialItem")),
            TypeDescriptor::class("Item")
                .known_type("SpecialItem")
                .known_type("PlainItem")
                .member(MemberDescriptor::new("Id", "i32").key()),
            TypeDescriptor::class("SpecialItem").base("Item"),
            TypeDescriptor::class("PlainItem").base("Item"),
        ])
        .unwrap()
    }

    fn registry(roots: &[&str]) -> EntityRegistry {
        let schema = schema();
        let mut reg = EntityRegistry::new(Arc::new(ProviderCache::new()));
        for root in roots {
            reg.add_entity_type(&schema, root).unwrap();
        }
        reg.discover(&schema).unwrap();
        reg
    }

    #[test]
    fn test_derived_without_entries_shares_base_list() {
        let reg = registry(&["Order"]);
        let table = CompositionTable::build(&reg);
        let item = reg.id_of("Item").unwrap();
        let plain = reg.id_of("PlainItem").unwrap();
        assert_eq!(table.list_id(item), table.list_id(plain));
        assert_eq!(
            table.parent_associations(plain),
            &[PropertyRef {
                owner: "Order".to_string(),
                name: "Items".to_string()
            }]
        );
    }

    #[test]
    fn test_derived_with_entries_appends_inherited() {
        let reg = registry(&["Invoice", "Order"]);
        let table = CompositionTable::build(&reg);
        let special = reg.id_of("SpecialItem").unwrap();
        let item = reg.id_of("Item").unwrap();
        assert_ne!(table.list_id(special), table.list_id(item));
        let names: Vec<_> = table
            .parent_associations(special)
            .iter()
            .map(|p| p.to_string())
            .collect();
        assert_eq!(names, vec!["Invoice.Special", "Order.Items"]);
    }

    #[test]
    fn test_type_without_composition_has_empty_list() {
        let reg = registry(&["Order"]);
        let table = CompositionTable::build(&reg);
        let order = reg.id_of("Order").unwrap();
        assert!(table.parent_associations(order).is_empty());
        assert!(table.list_id(order).is_none());
    }
}
