//! Known-type closure: every registered subtype a type must be ready to see.

use crate::registry::{EntityId, EntityRegistry};
use std::collections::BTreeSet;
use tracing::debug;

/// Per-type known-type closure, indexed by [`EntityId`].
#[derive(Debug, Clone, Default)]
pub struct KnownTypeClosure {
    sets: Vec<BTreeSet<String>>,
}

impl KnownTypeClosure {
    /// Compute the closure over the current registry contents.
    ///
    /// Pass 1 keeps each type's declared-or-inherited known types that are
    /// registered and derive from it. Pass 2 pushes every direct set up to all
    /// registered ancestors.
    pub fn compute(registry: &EntityRegistry) -> Self {
        let direct: Vec<BTreeSet<String>> = registry
            .nodes()
            .map(|node| {
                node.known_types
                    .iter()
                    .filter(|k| {
                        *k != &node.name
                            && registry.contains(k)
                            && registry.is_assignable_from(&node.name, k)
                    })
                    .cloned()
                    .collect()
            })
            .collect();

        let mut sets = direct.clone();
        for node in registry.nodes() {
            let declared = &direct[node.id.index()];
            if declared.is_empty() {
                continue;
            }
            let mut current = registry.entity_base_type(&node.name);
            while let Some(base) = current {
                sets[base.id.index()].extend(declared.iter().cloned());
                current = registry.entity_base_type(&base.name);
            }
        }

        debug!(
            "computed known-type closure for {} entity types",
            sets.len()
        );
        Self { sets }
    }

    pub fn get(&self, id: EntityId) -> &BTreeSet<String> {
        &self.sets[id.index()]
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use crate::providers::ProviderCache;
    use crate::registry::EntityRegistry;
    use crate::schema::{MemberDescriptor, Schema, TypeDescriptor};
    use std::sync::Arc;

    fn hierarchy() -> Schema {
        Schema::new([
            TypeDescriptor::class("Animal")
                .entity()
                .abstract_type()
                .known_type("Dog")
                .member(MemberDescriptor::new("Id", "i32").key()),
            TypeDescriptor::class("Dog").base("Animal").known_type("Puppy"),
            TypeDescriptor::class("Puppy").base("Dog"),
            TypeDescriptor::class("Rock").entity(),
        ])
        .unwrap()
    }

    #[test]
    fn test_closure_propagates_to_ancestors() {
        let schema = hierarchy();
        let mut reg = EntityRegistry::new(Arc::new(ProviderCache::new()));
        reg.add_entity_type(&schema, "Animal").unwrap();
        let closure = reg.known_type_closure();
        let animal = reg.id_of("Animal").unwrap();
        let dog = reg.id_of("Dog").unwrap();
        let puppy = reg.id_of("Puppy").unwrap();
        assert_eq!(
            closure.get(animal).iter().collect::<Vec<_>>(),
            vec!["Dog", "Puppy"]
        );
        assert_eq!(closure.get(dog).iter().collect::<Vec<_>>(), vec!["Puppy"]);
        assert!(closure.get(puppy).is_empty());
    }

    #[test]
    fn test_closure_recomputed_after_late_registration() {
        let schema = hierarchy();
        let mut reg = EntityRegistry::new(Arc::new(ProviderCache::new()));
        reg.add_entity_type(&schema, "Rock").unwrap();
        assert_eq!(reg.known_type_closure().len(), 1);

        reg.add_entity_type(&schema, "Animal").unwrap();
        let closure = reg.known_type_closure();
        assert_eq!(closure.len(), 4);
        let animal = reg.id_of("Animal").unwrap();
        assert!(closure.get(animal).contains("Puppy"));
    }
}
