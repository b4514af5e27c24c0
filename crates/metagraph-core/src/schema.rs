//! Explicit schema descriptions and the introspector built from them.
//!
//! A schema document is the upfront description of every type a service
//! exposes: its base type, classification, flags, known-type declarations and
//! members. Documents are JSON; the same structures double as a builder API.

use crate::error::SchemaError;
use crate::introspect::{TypeInfo, TypeIntrospector};
use crate::model::{AssociationSpec, MemberModifier, PropertyDescriptor, TypeClass};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

const CURRENT_VERSION: &str = "1";

/// Primitive type names that never need a declaration.
pub const BUILTIN_PRIMITIVES: &[&str] = &[
    "bool", "char", "u8", "i8", "u16", "i16", "u32", "i32", "u64", "i64", "f32", "f64",
    "decimal", "string", "bytes", "guid", "date", "datetime", "timespan", "uri",
];

fn default_true() -> bool {
    true
}

fn is_true(value: &bool) -> bool {
    *value
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// A complete schema document as read from disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDocument {
    pub version: String,
    #[serde(default)]
    pub types: Vec<TypeDescriptor>,
}

/// How a described type is classified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    #[default]
    Class,
    Primitive,
    Collection,
    Nullable,
}

impl From<TypeKind> for TypeClass {
    fn from(kind: TypeKind) -> Self {
        match kind {
            TypeKind::Class => Self::Object,
            TypeKind::Primitive => Self::Primitive,
            TypeKind::Collection => Self::Collection,
            TypeKind::Nullable => Self::Nullable,
        }
    }
}

/// Description of one type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    #[serde(default)]
    pub kind: TypeKind,
    /// Wrapped type of a collection or nullable type.
    #[serde(default, alias = "inner", skip_serializing_if = "Option::is_none")]
    pub element: Option<String>,
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub visible: bool,
    #[serde(default, rename = "abstract", skip_serializing_if = "is_false")]
    pub is_abstract: bool,
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub default_constructible: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub entity: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub excluded: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub data_contract: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub known_types: Vec<String>,
    /// Metadata-extension provider whose members contribute attributes to this type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<MemberDescriptor>,
}

impl TypeDescriptor {
    fn with_kind(name: impl Into<String>, kind: TypeKind, element: Option<String>) -> Self {
        Self {
            name: name.into(),
            base: None,
            kind,
            element,
            visible: true,
            is_abstract: false,
            default_constructible: true,
            entity: false,
            excluded: false,
            data_contract: false,
            known_types: Vec::new(),
            metadata: None,
            members: Vec::new(),
        }
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self::with_kind(name, TypeKind::Class, None)
    }

    pub fn primitive(name: impl Into<String>) -> Self {
        Self::with_kind(name, TypeKind::Primitive, None)
    }

    pub fn collection(name: impl Into<String>, element: impl Into<String>) -> Self {
        Self::with_kind(name, TypeKind::Collection, Some(element.into()))
    }

    pub fn nullable(name: impl Into<String>, inner: impl Into<String>) -> Self {
        Self::with_kind(name, TypeKind::Nullable, Some(inner.into()))
    }

    #[must_use]
    pub fn base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    #[must_use]
    pub fn entity(mut self) -> Self {
        self.entity = true;
        self
    }

    #[must_use]
    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    #[must_use]
    pub fn without_default_constructor(mut self) -> Self {
        self.default_constructible = false;
        self
    }

    #[must_use]
    pub fn excluded(mut self) -> Self {
        self.excluded = true;
        self
    }

    #[must_use]
    pub fn data_contract(mut self) -> Self {
        self.data_contract = true;
        self
    }

    #[must_use]
    pub fn known_type(mut self, ty: impl Into<String>) -> Self {
        self.known_types.push(ty.into());
        self
    }

    #[must_use]
    pub fn metadata(mut self, provider: impl Into<String>) -> Self {
        self.metadata = Some(provider.into());
        self
    }

    #[must_use]
    pub fn member(mut self, member: MemberDescriptor) -> Self {
        self.members.push(member);
        self
    }
}

/// Description of one member of a type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    /// The member holds a collection of `ty`.
    #[serde(default, skip_serializing_if = "is_false")]
    pub collection: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub key: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub excluded: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub timestamp: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub concurrency_check: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub composition: bool,
    #[serde(default)]
    pub modifier: MemberModifier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub association: Option<AssociationSpec>,
}

impl MemberDescriptor {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            collection: false,
            key: false,
            excluded: false,
            timestamp: false,
            concurrency_check: false,
            required: false,
            composition: false,
            modifier: MemberModifier::Plain,
            association: None,
        }
    }

    #[must_use]
    pub fn many(mut self) -> Self {
        self.collection = true;
        self
    }

    #[must_use]
    pub fn key(mut self) -> Self {
        self.key = true;
        self
    }

    #[must_use]
    pub fn excluded(mut self) -> Self {
        self.excluded = true;
        self
    }

    /// Mark as the row-version member (timestamp + concurrency check).
    #[must_use]
    pub fn version(mut self) -> Self {
        self.timestamp = true;
        self.concurrency_check = true;
        self
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn composition(mut self) -> Self {
        self.composition = true;
        self
    }

    #[must_use]
    pub fn modifier(mut self, modifier: MemberModifier) -> Self {
        self.modifier = modifier;
        self
    }

    #[must_use]
    pub fn association(mut self, association: AssociationSpec) -> Self {
        self.association = Some(association);
        self
    }

    /// Fold attributes from a metadata-provider member of the same name.
    fn merge_metadata(&mut self, extra: &Self) {
        self.key |= extra.key;
        self.excluded |= extra.excluded;
        self.timestamp |= extra.timestamp;
        self.concurrency_check |= extra.concurrency_check;
        self.required |= extra.required;
        self.composition |= extra.composition;
        if self.association.is_none() {
            self.association.clone_from(&extra.association);
        }
    }
}

/// A validated set of type descriptions, usable as a [`TypeIntrospector`].
#[derive(Debug, Clone, Default)]
pub struct Schema {
    types: BTreeMap<String, TypeDescriptor>,
}

impl Schema {
    /// Build a schema from descriptors, checking references and inheritance.
    pub fn new(types: impl IntoIterator<Item = TypeDescriptor>) -> Result<Self, SchemaError> {
        let mut map = BTreeMap::new();
        for ty in types {
            if is_builtin(&ty.name) {
                return Err(SchemaError::BuiltinRedeclared(ty.name));
            }
            if map.contains_key(&ty.name) {
                return Err(SchemaError::DuplicateType(ty.name));
            }
            map.insert(ty.name.clone(), ty);
        }
        let schema = Self { types: map };
        schema.check()?;
        Ok(schema)
    }

    pub fn from_document(doc: SchemaDocument) -> Result<Self, SchemaError> {
        if doc.version != CURRENT_VERSION {
            return Err(SchemaError::VersionMismatch {
                expected: CURRENT_VERSION.to_string(),
                found: doc.version,
            });
        }
        Self::new(doc.types)
    }

    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let doc: SchemaDocument = serde_json::from_str(json)?;
        Self::from_document(doc)
    }

    /// Snapshot this schema back into document form.
    pub fn to_document(&self) -> SchemaDocument {
        SchemaDocument {
            version: CURRENT_VERSION.to_string(),
            types: self.types.values().cloned().collect(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.to_document())
            .context("failed to serialize schema document")
    }

    /// Load a schema document from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read schema from {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("invalid schema in {}", path.display()))
    }

    pub fn get(&self, name: &str) -> Option<&TypeDescriptor> {
        self.types.get(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    fn contains(&self, name: &str) -> bool {
        is_builtin(name) || self.types.contains_key(name)
    }

    fn check(&self) -> Result<(), SchemaError> {
        for ty in self.types.values() {
            let mut refs: Vec<&String> = Vec::new();
            refs.extend(&ty.base);
            refs.extend(&ty.element);
            refs.extend(&ty.metadata);
            refs.extend(&ty.known_types);
            refs.extend(ty.members.iter().map(|m| &m.ty));
            for name in refs {
                if !self.contains(name) {
                    return Err(SchemaError::UnknownReference {
                        referrer: ty.name.clone(),
                        name: name.clone(),
                    });
                }
            }

            if let Some(base) = &ty.base
                && self.types.get(base).is_none_or(|b| b.kind != TypeKind::Class)
            {
                return Err(SchemaError::InvalidBase {
                    ty: ty.name.clone(),
                    base: base.clone(),
                });
            }

            let mut names = HashSet::new();
            for member in &ty.members {
                if !names.insert(member.name.as_str()) {
                    return Err(SchemaError::DuplicateMember {
                        ty: ty.name.clone(),
                        member: member.name.clone(),
                    });
                }
            }
        }

        for name in self.types.keys() {
            crate::introspect::ancestors(self, name)?;
        }
        Ok(())
    }

    fn descriptor(&self, ty: &str) -> Result<&TypeDescriptor, SchemaError> {
        self.types
            .get(ty)
            .ok_or_else(|| SchemaError::UnknownType(ty.to_string()))
    }

    fn class_of(&self, ty: &str) -> TypeClass {
        match self.types.get(ty) {
            Some(desc) => desc.kind.into(),
            None => TypeClass::Primitive,
        }
    }

    fn property(&self, owner: &str, member: &MemberDescriptor) -> PropertyDescriptor {
        // Nested collection types unwrap down to their innermost element.
        let mut element = member.ty.clone();
        let mut is_collection = member.collection;
        let mut seen = HashSet::new();
        while let Some(item) = self
            .types
            .get(&element)
            .filter(|d| d.kind == TypeKind::Collection)
            .and_then(|d| d.element.clone())
        {
            if !seen.insert(element.clone()) {
                break;
            }
            element = item;
            is_collection = true;
        }

        PropertyDescriptor {
            name: member.name.clone(),
            owner: owner.to_string(),
            ty: member.ty.clone(),
            element_class: self.class_of(&element),
            element,
            is_collection,
            is_key: member.key,
            is_excluded: member.excluded,
            is_timestamp: member.timestamp,
            is_concurrency_check: member.concurrency_check,
            is_required: member.required,
            is_composition: member.composition,
            modifier: member.modifier,
            association: member.association.clone(),
        }
    }
}

fn is_builtin(name: &str) -> bool {
    BUILTIN_PRIMITIVES.contains(&name)
}

impl TypeIntrospector for Schema {
    fn type_info(&self, ty: &str) -> Result<TypeInfo, SchemaError> {
        if is_builtin(ty) {
            return Ok(TypeInfo {
                name: ty.to_string(),
                base: None,
                class: TypeClass::Primitive,
                visible: true,
                is_abstract: false,
                default_constructible: true,
                entity: false,
                excluded: false,
                data_contract: false,
                metadata_provider: None,
            });
        }
        let desc = self.descriptor(ty)?;
        Ok(TypeInfo {
            name: desc.name.clone(),
            base: desc.base.clone(),
            class: desc.kind.into(),
            visible: desc.visible,
            is_abstract: desc.is_abstract,
            default_constructible: desc.default_constructible,
            entity: desc.entity,
            excluded: desc.excluded,
            data_contract: desc.data_contract,
            metadata_provider: desc.metadata.clone(),
        })
    }

    fn declared_members(&self, ty: &str) -> Result<Vec<PropertyDescriptor>, SchemaError> {
        if is_builtin(ty) {
            return Ok(Vec::new());
        }
        let desc = self.descriptor(ty)?;
        let provider = match &desc.metadata {
            Some(name) => Some(self.descriptor(name)?),
            None => None,
        };

        let mut members = Vec::with_capacity(desc.members.len());
        for member in &desc.members {
            let mut merged = member.clone();
            if let Some(extra) = provider.and_then(|p| p.members.iter().find(|m| m.name == member.name)) {
                merged.merge_metadata(extra);
            }
            members.push(self.property(&desc.name, &merged));
        }
        Ok(members)
    }

    fn known_types(&self, ty: &str) -> Result<Vec<String>, SchemaError> {
        let mut seen = HashSet::new();
        let mut known = Vec::new();
        let mut current = Some(ty.to_string());
        while let Some(name) = current {
            if is_builtin(&name) {
                break;
            }
            let desc = self.descriptor(&name)?;
            for target in &desc.known_types {
                if seen.insert(target.clone()) {
                    known.push(target.clone());
                }
            }
            current = desc.base.clone();
        }
        Ok(known)
    }
}
