//! Entity registry: discovery of the closed set of entity types.
//!
//! Types live in an arena addressed by [`EntityId`], assigned in registration
//! order. Nodes are immutable once registered; only the known-type closure
//! cache is dropped and rebuilt when a later registration changes the set.

use crate::closure::KnownTypeClosure;
use crate::error::SchemaError;
use crate::introspect::{self, TypeInfo, TypeIntrospector};
use crate::model::{PropertyDescriptor, PropertyRef, Redeclaration, TypeClass};
use crate::providers::ProviderCache;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

/// Stable arena index of a registered entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(usize);

impl EntityId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A registered entity type.
#[derive(Debug, Clone)]
pub struct TypeNode {
    pub id: EntityId,
    pub name: String,
    /// Full base chain, nearest first, including non-entity types.
    pub ancestors: Vec<String>,
    pub is_abstract: bool,
    pub data_contract: bool,
    pub metadata_provider: Option<String>,
    /// Flattened member set.
    pub members: Vec<PropertyDescriptor>,
    pub redeclarations: Vec<Redeclaration>,
    /// Known-type targets declared on this type or inherited.
    pub known_types: Vec<String>,
}

impl TypeNode {
    pub fn member(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.members.iter().find(|m| m.name == name)
    }
}

/// Structural rule a candidate entity type failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructuralRule {
    NotVisible,
    NullableWrapper,
    Primitive,
    Collection,
    NoDefaultConstructor,
}

impl std::fmt::Display for StructuralRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotVisible => write!(f, "type is not visible"),
            Self::NullableWrapper => write!(f, "type is a nullable wrapper"),
            Self::Primitive => write!(f, "type is a primitive"),
            Self::Collection => write!(f, "type is a collection"),
            Self::NoDefaultConstructor => write!(f, "concrete type has no default constructor"),
        }
    }
}

/// Non-fatal discovery diagnostic: a candidate was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub type_name: String,
    pub rule: StructuralRule,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'{}' is not a valid entity type: {}", self.type_name, self.rule)
    }
}

fn structural_violation(info: &TypeInfo) -> Option<StructuralRule> {
    if !info.visible {
        return Some(StructuralRule::NotVisible);
    }
    match info.class {
        TypeClass::Nullable => return Some(StructuralRule::NullableWrapper),
        TypeClass::Primitive => return Some(StructuralRule::Primitive),
        TypeClass::Collection => return Some(StructuralRule::Collection),
        TypeClass::Object => {}
    }
    if !info.is_abstract && !info.default_constructible {
        return Some(StructuralRule::NoDefaultConstructor);
    }
    None
}

#[derive(Debug)]
pub struct EntityRegistry {
    nodes: Vec<TypeNode>,
    by_name: HashMap<String, EntityId>,
    diagnostics: Vec<Diagnostic>,
    rejected: HashSet<String>,
    /// Composition parent associations discovered for each child type.
    parent_associations: HashMap<EntityId, Vec<PropertyRef>>,
    providers: Arc<ProviderCache>,
    closure: OnceLock<KnownTypeClosure>,
}

impl EntityRegistry {
    pub fn new(providers: Arc<ProviderCache>) -> Self {
        Self {
            nodes: Vec::new(),
            by_name: HashMap::new(),
            diagnostics: Vec::new(),
            rejected: HashSet::new(),
            parent_associations: HashMap::new(),
            providers,
            closure: OnceLock::new(),
        }
    }

    /// Add `ty` if it classifies as an entity, either by annotation or by
    /// declaring a key. Returns true if this call registered it.
    pub fn try_add_entity_type<I: TypeIntrospector + ?Sized>(
        &mut self,
        introspector: &I,
        ty: &str,
    ) -> Result<bool, SchemaError> {
        if self.contains(ty) || self.rejected.contains(ty) {
            return Ok(false);
        }
        let info = introspector.type_info(ty)?;
        if info.excluded || info.class != TypeClass::Object {
            return Ok(false);
        }
        if !info.entity {
            let flat = introspect::flatten_members(introspector, ty)?;
            if !flat.members.iter().any(|m| m.is_key && !m.is_excluded) {
                return Ok(false);
            }
        }
        self.add_entity_type(introspector, ty)
    }

    /// Register `ty` after structural validation, then pull in its known types.
    /// A structurally invalid type is skipped with a diagnostic.
    pub fn add_entity_type<I: TypeIntrospector + ?Sized>(
        &mut self,
        introspector: &I,
        ty: &str,
    ) -> Result<bool, SchemaError> {
        if self.contains(ty) || self.rejected.contains(ty) {
            return Ok(false);
        }
        let info = introspector.type_info(ty)?;
        if let Some(rule) = structural_violation(&info) {
            let diagnostic = Diagnostic {
                type_name: ty.to_string(),
                rule,
            };
            warn!("skipping entity candidate: {}", diagnostic);
            self.rejected.insert(ty.to_string());
            self.diagnostics.push(diagnostic);
            return Ok(false);
        }

        let flat = introspect::flatten_members(introspector, ty)?;
        let id = EntityId(self.nodes.len());
        let node = TypeNode {
            id,
            name: info.name.clone(),
            ancestors: introspect::ancestors(introspector, ty)?,
            is_abstract: info.is_abstract,
            data_contract: info.data_contract,
            metadata_provider: info.metadata_provider.clone(),
            members: flat.members,
            redeclarations: flat.redeclarations,
            known_types: introspector.known_types(ty)?,
        };
        let known_types = node.known_types.clone();
        self.nodes.push(node);
        self.by_name.insert(ty.to_string(), id);
        self.closure.take();
        debug!("registered entity type '{}'", ty);

        if let Some(provider) = &info.metadata_provider {
            if self.providers.register(ty, provider) {
                debug!("registered metadata provider '{}' for '{}'", provider, ty);
            } else {
                debug!("metadata provider '{}' for '{}' already registered", provider, ty);
            }
        }

        for target in known_types {
            if target == ty {
                continue;
            }
            if introspect::is_assignable_from(introspector, ty, &target)? {
                self.add_entity_type(introspector, &target)?;
            } else {
                debug!("ignoring known type '{}' on '{}': not a derived type", target, ty);
            }
        }
        Ok(true)
    }

    /// Walk members of every registered type until no new entity types appear.
    pub fn discover<I: TypeIntrospector + ?Sized>(
        &mut self,
        introspector: &I,
    ) -> Result<(), SchemaError> {
        let mut next = 0;
        while next < self.nodes.len() {
            let members: Vec<PropertyDescriptor> = self.nodes[next]
                .members
                .iter()
                .filter(|m| !m.is_excluded)
                .cloned()
                .collect();
            for member in members {
                self.try_add_entity_type(introspector, &member.element)?;
                if member.is_composition && member.is_association() {
                    self.record_parent_association(&member);
                }
            }
            next += 1;
        }
        debug!(
            "discovery finished: {} entity types, {} skipped",
            self.nodes.len(),
            self.diagnostics.len()
        );
        Ok(())
    }

    fn record_parent_association(&mut self, member: &PropertyDescriptor) {
        let Some(child) = self.id_of(&member.element) else {
            return;
        };
        let entry = self.parent_associations.entry(child).or_default();
        let property = member.to_ref();
        if !entry.contains(&property) {
            entry.push(property);
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, ty: &str) -> bool {
        self.by_name.contains_key(ty)
    }

    pub fn id_of(&self, ty: &str) -> Option<EntityId> {
        self.by_name.get(ty).copied()
    }

    pub fn node(&self, id: EntityId) -> &TypeNode {
        &self.nodes[id.0]
    }

    pub fn get(&self, ty: &str) -> Option<&TypeNode> {
        self.id_of(ty).map(|id| self.node(id))
    }

    /// Registered types in registration order.
    pub fn nodes(&self) -> impl Iterator<Item = &TypeNode> {
        self.nodes.iter()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Parent associations discovered directly for `id`, before inheritance.
    pub fn own_parent_associations(&self, id: EntityId) -> &[PropertyRef] {
        self.parent_associations
            .get(&id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Whether `derived` is `base` or a registered type inheriting from it.
    pub fn is_assignable_from(&self, base: &str, derived: &str) -> bool {
        base == derived
            || self
                .get(derived)
                .is_some_and(|node| node.ancestors.iter().any(|a| a == base))
    }

    /// Least-derived registered ancestor of `ty`, or `ty` itself.
    pub fn root_entity_type(&self, ty: &str) -> Option<&TypeNode> {
        let node = self.get(ty)?;
        Some(
            node.ancestors
                .iter()
                .rev()
                .find_map(|a| self.get(a))
                .unwrap_or(node),
        )
    }

    /// Nearest registered ancestor of `ty`, skipping non-entity intermediates.
    pub fn entity_base_type(&self, ty: &str) -> Option<&TypeNode> {
        self.get(ty)?.ancestors.iter().find_map(|a| self.get(a))
    }

    /// All registered types strictly derived from `ty`.
    pub fn entity_derived_types(&self, ty: &str) -> Vec<&TypeNode> {
        self.nodes
            .iter()
            .filter(|n| n.ancestors.iter().any(|a| a == ty))
            .collect()
    }

    pub fn is_root(&self, ty: &str) -> bool {
        self.contains(ty) && self.entity_base_type(ty).is_none()
    }

    /// Key members that count for `ty`: the whole hierarchy for a root type,
    /// only its own declarations for a derived type.
    pub fn key_members(&self, ty: &str) -> Vec<&PropertyDescriptor> {
        let Some(node) = self.get(ty) else {
            return Vec::new();
        };
        let root = self.is_root(ty);
        node.members
            .iter()
            .filter(|m| m.is_key && !m.is_excluded && (root || m.owner == node.name))
            .collect()
    }

    /// Known-type closure over the current registry, computed on first access.
    pub fn known_type_closure(&self) -> &KnownTypeClosure {
        self.closure.get_or_init(|| KnownTypeClosure::compute(self))
    }
}
