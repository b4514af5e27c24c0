//! Structural validation of the finished entity graph.
//!
//! Every registered type is checked in registration order, one rule at a time
//! (see [`crate::error::Rule`]). The first violation is returned and aborts the build.

use crate::error::ValidationError;
use crate::model::{AssociationSpec, MemberModifier, PropertyDescriptor, TypeClass};
use crate::registry::{EntityRegistry, TypeNode};
use std::collections::HashSet;
use tracing::debug;

/// Validate every registered entity type.
pub fn validate(registry: &EntityRegistry) -> Result<(), ValidationError> {
    for node in registry.nodes() {
        TypeValidator { registry, node }.run()?;
    }
    debug!("validated {} entity types", registry.len());
    Ok(())
}

struct TypeValidator<'a> {
    registry: &'a EntityRegistry,
    node: &'a TypeNode,
}

impl TypeValidator<'_> {
    fn run(&self) -> Result<(), ValidationError> {
        self.check_keys()?;
        self.check_version_member()?;
        self.check_association_structure()?;
        self.check_association_pairs()?;
        self.check_polymorphism()?;
        self.check_known_types()?;
        self.check_data_contract()
    }

    fn ty(&self) -> String {
        self.node.name.clone()
    }

    fn members(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.node.members.iter().filter(|m| !m.is_excluded)
    }

    fn associations(&self) -> impl Iterator<Item = (&PropertyDescriptor, &AssociationSpec)> {
        self.members()
            .filter_map(|m| m.association.as_ref().map(|a| (m, a)))
    }

    fn check_keys(&self) -> Result<(), ValidationError> {
        if self.registry.is_root(&self.node.name)
            && self.registry.key_members(&self.node.name).is_empty()
        {
            return Err(ValidationError::MissingKey { ty: self.ty() });
        }
        Ok(())
    }

    fn check_version_member(&self) -> Result<(), ValidationError> {
        let mut versions = self.members().filter(|m| m.is_version());
        if let (Some(first), Some(second)) = (versions.next(), versions.next()) {
            return Err(ValidationError::MultipleVersionMembers {
                ty: self.ty(),
                first: first.name.clone(),
                second: second.name.clone(),
            });
        }
        Ok(())
    }

    /// Whether the association target is assignable to or from this type.
    fn is_self_reference(&self, member: &PropertyDescriptor) -> bool {
        self.registry
            .is_assignable_from(&member.element, &self.node.name)
            || self
                .registry
                .is_assignable_from(&self.node.name, &member.element)
    }

    /// The member on the target type that shares this association's name.
    fn reciprocal<'t>(
        member: &PropertyDescriptor,
        association: &AssociationSpec,
        target: &'t TypeNode,
    ) -> Option<(&'t PropertyDescriptor, &'t AssociationSpec)> {
        target
            .members
            .iter()
            .filter(|o| !o.is_excluded)
            .filter(|o| !(o.owner == member.owner && o.name == member.name))
            .find_map(|o| {
                o.association
                    .as_ref()
                    .filter(|a| a.name == association.name)
                    .map(|a| (o, a))
            })
    }

    fn check_association_structure(&self) -> Result<(), ValidationError> {
        let mut reported = HashSet::new();
        for member in self.members() {
            let Some(association) = &member.association else {
                if member.is_composition {
                    return Err(ValidationError::CompositionWithoutAssociation {
                        ty: self.ty(),
                        member: member.name.clone(),
                    });
                }
                continue;
            };

            if association.name.trim().is_empty() {
                return Err(ValidationError::EmptyAssociationName {
                    ty: self.ty(),
                    member: member.name.clone(),
                });
            }
            if association.this_key.is_empty() || association.other_key.is_empty() {
                return Err(ValidationError::EmptyAssociationKeys {
                    ty: self.ty(),
                    member: member.name.clone(),
                    association: association.name.clone(),
                });
            }
            if association.this_key.len() != association.other_key.len() {
                return Err(ValidationError::MismatchedAssociationKeys {
                    ty: self.ty(),
                    member: member.name.clone(),
                    association: association.name.clone(),
                    this_len: association.this_key.len(),
                    other_len: association.other_key.len(),
                });
            }
            if let Some(key) = association
                .this_key
                .iter()
                .find(|k| self.node.member(k).is_none())
            {
                return Err(ValidationError::MissingThisKey {
                    ty: self.ty(),
                    member: member.name.clone(),
                    association: association.name.clone(),
                    key: key.clone(),
                });
            }

            if reported.insert(association.name.as_str()) {
                let named: Vec<_> = self
                    .associations()
                    .filter(|(_, a)| a.name == association.name)
                    .collect();
                let count = named.len();
                // Two members may share a name only as the two ends of a self-reference.
                let pair = count == 2
                    && named.iter().all(|(m, _)| self.is_self_reference(m))
                    && named[0].1.foreign_key != named[1].1.foreign_key;
                if count > 1 && !pair {
                    return Err(ValidationError::NonUniqueAssociation {
                        ty: self.ty(),
                        association: association.name.clone(),
                        count,
                    });
                }
            }

            if association.foreign_key
                && member.is_collection
                && !self.has_fk_conflict(member, association)
            {
                return Err(ValidationError::ForeignKeyNotSingleton {
                    ty: self.ty(),
                    member: member.name.clone(),
                    association: association.name.clone(),
                });
            }
            if member.is_required {
                return Err(ValidationError::RequiredAssociation {
                    ty: self.ty(),
                    member: member.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Both ends of a registered pair claim the foreign key. Reported by the
    /// pair check instead of the singleton check.
    fn has_fk_conflict(&self, member: &PropertyDescriptor, association: &AssociationSpec) -> bool {
        self.registry
            .get(&member.element)
            .and_then(|target| Self::reciprocal(member, association, target))
            .is_some_and(|(_, other)| other.foreign_key == association.foreign_key)
    }

    fn check_association_pairs(&self) -> Result<(), ValidationError> {
        for (member, association) in self.associations() {
            let Some(target) = self.registry.get(&member.element) else {
                if member.element_class != TypeClass::Object {
                    return Err(ValidationError::NonEntityAssociationTarget {
                        ty: self.ty(),
                        member: member.name.clone(),
                        target: member.element.clone(),
                    });
                }
                debug!(
                    "association '{}' on '{}.{}' targets unregistered type '{}'",
                    association.name, self.node.name, member.name, member.element
                );
                continue;
            };

            if let Some((other, other_association)) = Self::reciprocal(member, association, target) {
                if other_association.foreign_key == association.foreign_key {
                    return Err(ValidationError::ForeignKeyConflict {
                        ty: self.ty(),
                        member: member.name.clone(),
                        association: association.name.clone(),
                        other_ty: target.name.clone(),
                        other_member: other.name.clone(),
                        both: association.foreign_key,
                    });
                }
                if !self
                    .registry
                    .is_assignable_from(&other.element, &self.node.name)
                {
                    return Err(ValidationError::ReciprocalTypeMismatch {
                        ty: self.ty(),
                        association: association.name.clone(),
                        other_ty: target.name.clone(),
                        other_member: other.name.clone(),
                        element: other.element.clone(),
                    });
                }
            }

            if let Some(key) = association
                .other_key
                .iter()
                .find(|k| target.member(k).is_none())
            {
                return Err(ValidationError::MissingOtherKey {
                    ty: self.ty(),
                    member: member.name.clone(),
                    association: association.name.clone(),
                    target: target.name.clone(),
                    key: key.clone(),
                });
            }
        }
        Ok(())
    }

    fn check_polymorphism(&self) -> Result<(), ValidationError> {
        // Re-declarations made by registered ancestors are reported against those types.
        let local = self
            .node
            .redeclarations
            .iter()
            .filter(|r| r.owner == self.node.name || !self.registry.contains(&r.owner));
        for redeclaration in local {
            let ok = match redeclaration.modifier {
                MemberModifier::Override => redeclaration.base_modifier.is_overridable(),
                // A non-virtual member may only stand in for an abstract one.
                MemberModifier::Plain | MemberModifier::New => {
                    redeclaration.base_modifier == MemberModifier::Abstract
                }
                MemberModifier::Virtual | MemberModifier::Abstract => true,
            };
            if ok {
                continue;
            }
            let ty = self.ty();
            let member = redeclaration.name.clone();
            let base = redeclaration.base_owner.clone();
            return Err(if redeclaration.modifier == MemberModifier::Override {
                ValidationError::InvalidOverride { ty, member, base }
            } else {
                ValidationError::IllegalShadowing { ty, member, base }
            });
        }
        Ok(())
    }

    fn check_known_types(&self) -> Result<(), ValidationError> {
        let name = &self.node.name;
        let declared: HashSet<&str> = self.node.known_types.iter().map(String::as_str).collect();

        if self.registry.is_root(name) {
            for derived in self.registry.entity_derived_types(name) {
                if !declared.contains(derived.name.as_str()) {
                    return Err(ValidationError::MissingKnownType {
                        ty: self.ty(),
                        derived: derived.name.clone(),
                    });
                }
            }
        }

        if self.node.is_abstract {
            let has_concrete = self.node.known_types.iter().any(|k| {
                k != name
                    && self
                        .registry
                        .get(k)
                        .is_some_and(|n| !n.is_abstract && self.registry.is_assignable_from(name, k))
            });
            if !has_concrete {
                return Err(ValidationError::AbstractWithoutConcreteKnownType { ty: self.ty() });
            }
        }
        Ok(())
    }

    fn check_data_contract(&self) -> Result<(), ValidationError> {
        if self.node.data_contract {
            return Ok(());
        }
        let marked = self
            .node
            .ancestors
            .iter()
            .filter_map(|a| self.registry.get(a))
            .find(|a| a.data_contract);
        match marked {
            Some(ancestor) => Err(ValidationError::MissingDataContract {
                ty: self.ty(),
                ancestor: ancestor.name.clone(),
            }),
            None => Ok(()),
        }
    }
}
