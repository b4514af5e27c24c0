//! Error types for schema loading, graph validation and graph queries.

use serde::Serialize;

/// Errors raised while loading a schema description or introspecting a type.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("schema version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: String, found: String },
    #[error("type '{0}' is declared more than once")]
    DuplicateType(String),
    #[error("type '{0}' clashes with the built-in primitive of the same name")]
    BuiltinRedeclared(String),
    #[error("type '{ty}' declares member '{member}' more than once")]
    DuplicateMember { ty: String, member: String },
    #[error("type '{referrer}' references unknown type '{name}'")]
    UnknownReference { referrer: String, name: String },
    #[error("unknown type '{0}'")]
    UnknownType(String),
    #[error("type '{ty}' cannot derive from non-class type '{base}'")]
    InvalidBase { ty: String, base: String },
    #[error("inheritance cycle through type '{0}'")]
    InheritanceCycle(String),
    #[error("schema document parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Validation rule categories, in the order they are checked per type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    KeyPresence,
    VersionMember,
    AssociationStructure,
    AssociationPair,
    Polymorphism,
    KnownTypes,
    DataContract,
}

impl std::fmt::Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::KeyPresence => write!(f, "key presence"),
            Self::VersionMember => write!(f, "version member"),
            Self::AssociationStructure => write!(f, "association structure"),
            Self::AssociationPair => write!(f, "association pair"),
            Self::Polymorphism => write!(f, "polymorphism"),
            Self::KnownTypes => write!(f, "known types"),
            Self::DataContract => write!(f, "data contract"),
        }
    }
}

/// A fatal graph validation failure. The first one found aborts initialization.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("entity type '{ty}' has no key member")]
    MissingKey { ty: String },
    #[error("entity type '{ty}' has more than one version member ('{first}' and '{second}')")]
    MultipleVersionMembers {
        ty: String,
        first: String,
        second: String,
    },
    #[error("association member '{ty}.{member}' has an empty association name")]
    EmptyAssociationName { ty: String, member: String },
    #[error("association '{association}' on '{ty}.{member}' must name both this-side and other-side keys")]
    EmptyAssociationKeys {
        ty: String,
        member: String,
        association: String,
    },
    #[error("association '{association}' on '{ty}.{member}' has {this_len} this-side key(s) but {other_len} other-side key(s)")]
    MismatchedAssociationKeys {
        ty: String,
        member: String,
        association: String,
        this_len: usize,
        other_len: usize,
    },
    #[error("association '{association}' on '{ty}.{member}' names this-side key '{key}' which is not a member of '{ty}'")]
    MissingThisKey {
        ty: String,
        member: String,
        association: String,
        key: String,
    },
    #[error("association name '{association}' is used by {count} members of '{ty}'")]
    NonUniqueAssociation {
        ty: String,
        association: String,
        count: usize,
    },
    #[error("foreign key association '{association}' on '{ty}.{member}' must reference a single entity, not a collection")]
    ForeignKeyNotSingleton {
        ty: String,
        member: String,
        association: String,
    },
    #[error("association member '{ty}.{member}' cannot be marked required")]
    RequiredAssociation { ty: String, member: String },
    #[error("composition member '{ty}.{member}' must also be an association")]
    CompositionWithoutAssociation { ty: String, member: String },
    #[error(
        "association FK conflict on '{association}': '{ty}.{member}' and '{other_ty}.{other_member}' {}",
        fk_conflict_detail(.both)
    )]
    ForeignKeyConflict {
        ty: String,
        member: String,
        association: String,
        other_ty: String,
        other_member: String,
        both: bool,
    },
    #[error("association '{association}' reciprocal '{other_ty}.{other_member}' references '{element}', which is not assignable from '{ty}'")]
    ReciprocalTypeMismatch {
        ty: String,
        association: String,
        other_ty: String,
        other_member: String,
        element: String,
    },
    #[error("association '{association}' on '{ty}.{member}' names other-side key '{key}' which is not a member of '{target}'")]
    MissingOtherKey {
        ty: String,
        member: String,
        association: String,
        target: String,
        key: String,
    },
    #[error("association member '{ty}.{member}' targets '{target}', which is not an entity type")]
    NonEntityAssociationTarget {
        ty: String,
        member: String,
        target: String,
    },
    #[error("member '{ty}.{member}' hides the implemented member declared on '{base}'")]
    IllegalShadowing {
        ty: String,
        member: String,
        base: String,
    },
    #[error("member '{ty}.{member}' overrides non-virtual member declared on '{base}'")]
    InvalidOverride {
        ty: String,
        member: String,
        base: String,
    },
    #[error("root entity type '{ty}' does not declare derived type '{derived}' as a known type")]
    MissingKnownType { ty: String, derived: String },
    #[error("abstract entity type '{ty}' declares no concrete derived type as a known type")]
    AbstractWithoutConcreteKnownType { ty: String },
    #[error("entity type '{ty}' must carry a data contract because its base '{ancestor}' does")]
    MissingDataContract { ty: String, ancestor: String },
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn fk_conflict_detail(both: &bool) -> &'static str {
    if *both {
        "are both marked foreign key"
    } else {
        "are both missing a foreign key"
    }
}

impl ValidationError {
    /// The rule category this violation belongs to.
    pub fn rule(&self) -> Rule {
        match self {
            Self::MissingKey { .. } => Rule::KeyPresence,
            Self::MultipleVersionMembers { .. } => Rule::VersionMember,
            Self::EmptyAssociationName { .. }
            | Self::EmptyAssociationKeys { .. }
            | Self::MismatchedAssociationKeys { .. }
            | Self::MissingThisKey { .. }
            | Self::NonUniqueAssociation { .. }
            | Self::ForeignKeyNotSingleton { .. }
            | Self::RequiredAssociation { .. }
            | Self::CompositionWithoutAssociation { .. } => Rule::AssociationStructure,
            Self::ForeignKeyConflict { .. }
            | Self::ReciprocalTypeMismatch { .. }
            | Self::MissingOtherKey { .. }
            | Self::NonEntityAssociationTarget { .. } => Rule::AssociationPair,
            Self::IllegalShadowing { .. } | Self::InvalidOverride { .. } => Rule::Polymorphism,
            Self::MissingKnownType { .. } | Self::AbstractWithoutConcreteKnownType { .. } => {
                Rule::KnownTypes
            }
            Self::MissingDataContract { .. } => Rule::DataContract,
        }
    }

    /// The entity type the violation was reported against.
    pub fn type_name(&self) -> &str {
        match self {
            Self::MissingKey { ty }
            | Self::MultipleVersionMembers { ty, .. }
            | Self::EmptyAssociationName { ty, .. }
            | Self::EmptyAssociationKeys { ty, .. }
            | Self::MismatchedAssociationKeys { ty, .. }
            | Self::MissingThisKey { ty, .. }
            | Self::NonUniqueAssociation { ty, .. }
            | Self::ForeignKeyNotSingleton { ty, .. }
            | Self::RequiredAssociation { ty, .. }
            | Self::CompositionWithoutAssociation { ty, .. }
            | Self::ForeignKeyConflict { ty, .. }
            | Self::ReciprocalTypeMismatch { ty, .. }
            | Self::MissingOtherKey { ty, .. }
            | Self::NonEntityAssociationTarget { ty, .. }
            | Self::IllegalShadowing { ty, .. }
            | Self::InvalidOverride { ty, .. }
            | Self::MissingKnownType { ty, .. }
            | Self::AbstractWithoutConcreteKnownType { ty }
            | Self::MissingDataContract { ty, .. } => ty,
        }
    }
}

/// Errors surfaced by the entity graph build sequence and its queries.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("entity graph has not been initialized")]
    NotInitialized,
    #[error("entity graph is invalid after a failed initialization")]
    Invalidated,
    #[error("type '{0}' is not a registered entity type")]
    UnregisteredType(String),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("graph validation failed: {0}")]
    Validation(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fk_conflict_message_names_association() {
        let err = ValidationError::ForeignKeyConflict {
            ty: "Order".to_string(),
            member: "LineItems".to_string(),
            association: "LineItems".to_string(),
            other_ty: "LineItem".to_string(),
            other_member: "Order".to_string(),
            both: true,
        };
        let msg = err.to_string();
        assert!(msg.contains("association FK conflict"));
        assert!(msg.contains("'LineItems'"));
        assert!(msg.contains("both marked foreign key"));
        assert_eq!(err.rule(), Rule::AssociationPair);
        assert_eq!(err.type_name(), "Order");
    }

    #[test]
    fn test_graph_error_wraps_validation() {
        let err: GraphError = ValidationError::MissingKey {
            ty: "Base".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "graph validation failed: entity type 'Base' has no key member"
        );
    }
}
