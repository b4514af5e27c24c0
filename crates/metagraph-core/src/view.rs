//! Serializable snapshot of a finished entity graph, for downstream generators.

use crate::composition::CompositionTable;
use crate::model::{PropertyDescriptor, PropertyRef};
use crate::registry::{Diagnostic, EntityRegistry};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphView {
    pub entities: Vec<EntityView>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

/// Everything a generator needs to know about one entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityView {
    pub name: String,
    /// Least-derived registered ancestor (the type itself for a root).
    pub root: String,
    /// Nearest registered base type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub derived: Vec<String>,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub data_contract: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_provider: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub known_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parent_associations: Vec<PropertyRef>,
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub members: Vec<PropertyDescriptor>,
}

impl GraphView {
    pub(crate) fn build(registry: &EntityRegistry, composition: &CompositionTable) -> Self {
        let closure = registry.known_type_closure();
        let entities = registry
            .nodes()
            .map(|node| EntityView {
                name: node.name.clone(),
                root: registry
                    .root_entity_type(&node.name)
                    .map_or_else(|| node.name.clone(), |r| r.name.clone()),
                base: registry.entity_base_type(&node.name).map(|b| b.name.clone()),
                derived: registry
                    .entity_derived_types(&node.name)
                    .into_iter()
                    .map(|d| d.name.clone())
                    .collect(),
                is_abstract: node.is_abstract,
                data_contract: node.data_contract,
                metadata_provider: node.metadata_provider.clone(),
                known_types: closure.get(node.id).iter().cloned().collect(),
                parent_associations: composition.parent_associations(node.id).to_vec(),
                keys: registry
                    .key_members(&node.name)
                    .into_iter()
                    .map(|k| k.name.clone())
                    .collect(),
                members: node
                    .members
                    .iter()
                    .filter(|m| !m.is_excluded)
                    .cloned()
                    .collect(),
            })
            .collect();
        Self {
            entities,
            diagnostics: registry.diagnostics().to_vec(),
        }
    }

    pub fn entity(&self, name: &str) -> Option<&EntityView> {
        self.entities.iter().find(|e| e.name == name)
    }

    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let json = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(json)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("failed to parse graph view")
    }

    /// Write the view to `path`, creating parent directories if needed.
    pub fn save(&self, path: &Path, pretty: bool) -> Result<()> {
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create directory {}", dir.display()))?;
        }
        let json = self.to_json(pretty)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write graph view to {}", path.display()))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read graph view from {}", path.display()))?;
        Self::from_json(&json)
    }
}
