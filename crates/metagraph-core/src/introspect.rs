//! The type introspector seam and the inheritance walks built on top of it.
//!
//! The engine never reflects over a live type system. Everything it knows about
//! a type comes through [`TypeIntrospector`], implemented in this crate by
//! [`crate::schema::Schema`] and by whatever adapter a host language provides.

use crate::error::SchemaError;
use crate::model::{PropertyDescriptor, Redeclaration, TypeClass};
use std::collections::{HashMap, HashSet};

/// Type-level facts reported by an introspector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    pub name: String,
    pub base: Option<String>,
    pub class: TypeClass,
    pub visible: bool,
    pub is_abstract: bool,
    pub default_constructible: bool,
    /// Explicitly annotated as an entity.
    pub entity: bool,
    /// Explicitly excluded from entity discovery.
    pub excluded: bool,
    pub data_contract: bool,
    /// Metadata-extension provider attached to this type, if any.
    pub metadata_provider: Option<String>,
}

/// Source of type information consumed by the registry.
pub trait TypeIntrospector {
    fn type_info(&self, ty: &str) -> Result<TypeInfo, SchemaError>;

    /// Members declared directly on `ty`, with metadata-provider attributes merged in.
    fn declared_members(&self, ty: &str) -> Result<Vec<PropertyDescriptor>, SchemaError>;

    /// Known-type targets declared on `ty` or inherited from its base types.
    fn known_types(&self, ty: &str) -> Result<Vec<String>, SchemaError>;
}

/// Base chain of `ty`, nearest first. Fails on inheritance cycles.
pub fn ancestors<I: TypeIntrospector + ?Sized>(
    introspector: &I,
    ty: &str,
) -> Result<Vec<String>, SchemaError> {
    let mut chain = Vec::new();
    let mut seen = HashSet::from([ty.to_string()]);
    let mut current = introspector.type_info(ty)?.base;
    while let Some(base) = current {
        if !seen.insert(base.clone()) {
            return Err(SchemaError::InheritanceCycle(base));
        }
        current = introspector.type_info(&base)?.base;
        chain.push(base);
    }
    Ok(chain)
}

/// Whether `derived` is `base` or inherits from it.
pub fn is_assignable_from<I: TypeIntrospector + ?Sized>(
    introspector: &I,
    base: &str,
    derived: &str,
) -> Result<bool, SchemaError> {
    if base == derived {
        return Ok(true);
    }
    Ok(ancestors(introspector, derived)?.iter().any(|a| a == base))
}

/// The flattened member set of a type.
#[derive(Debug, Clone, Default)]
pub struct FlattenedMembers {
    /// One entry per member name, base members first; re-declarations replace in place.
    pub members: Vec<PropertyDescriptor>,
    pub redeclarations: Vec<Redeclaration>,
}

/// Flatten the members of `ty` and all of its base types.
pub fn flatten_members<I: TypeIntrospector + ?Sized>(
    introspector: &I,
    ty: &str,
) -> Result<FlattenedMembers, SchemaError> {
    let mut chain = ancestors(introspector, ty)?;
    chain.reverse();
    chain.push(ty.to_string());

    let mut flat = FlattenedMembers::default();
    let mut by_name: HashMap<String, usize> = HashMap::new();
    for owner in &chain {
        for member in introspector.declared_members(owner)? {
            if let Some(&idx) = by_name.get(&member.name) {
                let hidden = &flat.members[idx];
                flat.redeclarations.push(Redeclaration {
                    name: member.name.clone(),
                    owner: member.owner.clone(),
                    modifier: member.modifier,
                    base_owner: hidden.owner.clone(),
                    base_modifier: hidden.modifier,
                });
                flat.members[idx] = member;
            } else {
                by_name.insert(member.name.clone(), flat.members.len());
                flat.members.push(member);
            }
        }
    }
    Ok(flat)
}
