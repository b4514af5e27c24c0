//! The entity graph: owns the build sequence and serves the finished metadata.
//!
//! `initialize` runs root registration, member discovery, composition fixup
//! and validation exactly once. Queries fail until it has succeeded, and a
//! graph whose build failed stays unusable.

use crate::closure::KnownTypeClosure;
use crate::composition::CompositionTable;
use crate::error::GraphError;
use crate::introspect::TypeIntrospector;
use crate::model::{PropertyDescriptor, PropertyRef};
use crate::providers::ProviderCache;
use crate::registry::{Diagnostic, EntityRegistry, TypeNode};
use crate::validate;
use crate::view::GraphView;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuildState {
    Pending,
    Ready,
    Failed,
}

pub struct EntityGraph<I> {
    introspector: I,
    roots: Vec<String>,
    registry: EntityRegistry,
    composition: CompositionTable,
    state: BuildState,
}

impl<I: TypeIntrospector> EntityGraph<I> {
    pub fn new(introspector: I, providers: Arc<ProviderCache>) -> Self {
        Self {
            introspector,
            roots: Vec::new(),
            registry: EntityRegistry::new(providers),
            composition: CompositionTable::default(),
            state: BuildState::Pending,
        }
    }

    /// Add root entity types registered at the start of `initialize`.
    #[must_use]
    pub fn with_roots<S: Into<String>>(mut self, roots: impl IntoIterator<Item = S>) -> Self {
        self.roots.extend(roots.into_iter().map(Into::into));
        self
    }

    pub fn introspector(&self) -> &I {
        &self.introspector
    }

    /// Build and validate the graph. A second call after success is a no-op.
    pub fn initialize(&mut self) -> Result<(), GraphError> {
        match self.state {
            BuildState::Ready => {
                debug!("entity graph already initialized");
                return Ok(());
            }
            BuildState::Failed => return Err(GraphError::Invalidated),
            BuildState::Pending => {}
        }

        match self.build() {
            Ok(()) => {
                self.state = BuildState::Ready;
                info!(
                    "entity graph ready: {} entity types, {} skipped candidates",
                    self.registry.len(),
                    self.registry.diagnostics().len()
                );
                Ok(())
            }
            Err(e) => {
                self.state = BuildState::Failed;
                Err(e)
            }
        }
    }

    fn build(&mut self) -> Result<(), GraphError> {
        for root in &self.roots {
            self.registry.add_entity_type(&self.introspector, root)?;
        }
        self.registry.discover(&self.introspector)?;
        self.composition = CompositionTable::build(&self.registry);
        validate::validate(&self.registry)?;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.state == BuildState::Ready
    }

    fn ready(&self) -> Result<(), GraphError> {
        match self.state {
            BuildState::Ready => Ok(()),
            BuildState::Pending => Err(GraphError::NotInitialized),
            BuildState::Failed => Err(GraphError::Invalidated),
        }
    }

    fn node(&self, ty: &str) -> Result<&TypeNode, GraphError> {
        self.ready()?;
        self.registry
            .get(ty)
            .ok_or_else(|| GraphError::UnregisteredType(ty.to_string()))
    }

    /// The underlying registry, once the graph is ready.
    pub fn registry(&self) -> Result<&EntityRegistry, GraphError> {
        self.ready()?;
        Ok(&self.registry)
    }

    /// Candidates skipped during discovery. Available even after a failed build.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.registry.diagnostics()
    }

    /// Registered entity types in registration order.
    pub fn entity_types(&self) -> Result<Vec<&TypeNode>, GraphError> {
        self.ready()?;
        Ok(self.registry.nodes().collect())
    }

    pub fn root_entity_type(&self, ty: &str) -> Result<&TypeNode, GraphError> {
        self.node(ty)?;
        self.registry
            .root_entity_type(ty)
            .ok_or_else(|| GraphError::UnregisteredType(ty.to_string()))
    }

    /// Nearest registered base type, or `None` for a root.
    pub fn entity_base_type(&self, ty: &str) -> Result<Option<&TypeNode>, GraphError> {
        self.node(ty)?;
        Ok(self.registry.entity_base_type(ty))
    }

    pub fn entity_derived_types(&self, ty: &str) -> Result<Vec<&TypeNode>, GraphError> {
        self.node(ty)?;
        Ok(self.registry.entity_derived_types(ty))
    }

    /// Every registered subtype `ty` must be ready to see.
    pub fn known_types(&self, ty: &str) -> Result<&BTreeSet<String>, GraphError> {
        let node = self.node(ty)?;
        Ok(self.closure().get(node.id))
    }

    fn closure(&self) -> &KnownTypeClosure {
        self.registry.known_type_closure()
    }

    /// Composition parent associations pointing at `ty`, inherited ones included.
    pub fn parent_associations(&self, ty: &str) -> Result<&[PropertyRef], GraphError> {
        let node = self.node(ty)?;
        Ok(self.composition.parent_associations(node.id))
    }

    pub fn key_members(&self, ty: &str) -> Result<Vec<&PropertyDescriptor>, GraphError> {
        self.node(ty)?;
        Ok(self.registry.key_members(ty))
    }

    /// Serializable snapshot of the finished graph.
    pub fn view(&self) -> Result<GraphView, GraphError> {
        self.ready()?;
        Ok(GraphView::build(&self.registry, &self.composition))
    }
}
