//! Member-level data model shared by the introspector, registry and validator.

use serde::{Deserialize, Serialize};

/// Primitive/collection classification of a type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeClass {
    /// A user-defined class; the only classification that may become an entity.
    #[default]
    Object,
    Primitive,
    Collection,
    /// A nullable wrapper around another type.
    Nullable,
}

/// Declared dispatch marker of a member, used to detect illegal re-declarations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberModifier {
    /// Non-virtual, concretely implemented.
    #[default]
    Plain,
    Virtual,
    Abstract,
    Override,
    /// Explicitly hides an inherited member.
    New,
}

impl MemberModifier {
    /// Whether a derived member may legally override a member with this modifier.
    pub fn is_overridable(self) -> bool {
        matches!(self, Self::Virtual | Self::Abstract | Self::Override)
    }
}

/// A named relation between two entity types expressed via key member pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationSpec {
    pub name: String,
    /// Key member names on the declaring type.
    #[serde(default)]
    pub this_key: Vec<String>,
    /// Key member names on the target type, paired by position with `this_key`.
    #[serde(default)]
    pub other_key: Vec<String>,
    /// Whether the declaring side holds the foreign key.
    #[serde(default)]
    pub foreign_key: bool,
}

impl AssociationSpec {
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        this_key: impl IntoIterator<Item = S>,
        other_key: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            name: name.into(),
            this_key: this_key.into_iter().map(Into::into).collect(),
            other_key: other_key.into_iter().map(Into::into).collect(),
            foreign_key: false,
        }
    }

    /// Mark the declaring side as the foreign-key holder.
    #[must_use]
    pub fn foreign_key(mut self) -> Self {
        self.foreign_key = true;
        self
    }
}

/// One member of a type as seen by the engine, with collections already unwrapped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub name: String,
    /// The type that declares this member.
    pub owner: String,
    /// Declared value type.
    pub ty: String,
    /// Element type: `ty` itself, or the item type when the member is a collection.
    pub element: String,
    pub element_class: TypeClass,
    pub is_collection: bool,
    pub is_key: bool,
    pub is_excluded: bool,
    pub is_timestamp: bool,
    pub is_concurrency_check: bool,
    pub is_required: bool,
    pub is_composition: bool,
    pub modifier: MemberModifier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub association: Option<AssociationSpec>,
}

impl PropertyDescriptor {
    pub fn is_association(&self) -> bool {
        self.association.is_some()
    }

    /// Timestamp + concurrency-check members carry the row version.
    pub fn is_version(&self) -> bool {
        self.is_timestamp && self.is_concurrency_check
    }

    pub fn to_ref(&self) -> PropertyRef {
        PropertyRef {
            owner: self.owner.clone(),
            name: self.name.clone(),
        }
    }
}

/// Identity of a member: its declaring type plus its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PropertyRef {
    pub owner: String,
    pub name: String,
}

impl std::fmt::Display for PropertyRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.owner, self.name)
    }
}

/// A member that re-declares a member inherited from a base type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redeclaration {
    pub name: String,
    pub owner: String,
    pub modifier: MemberModifier,
    pub base_owner: String,
    pub base_modifier: MemberModifier,
}
